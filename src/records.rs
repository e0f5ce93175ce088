//! Grant records as the engine sees them.
//!
//! A [`GrantRecord`] is one funded project with its review-section
//! classification and the publications it produced. Records are decoded from
//! JSON by [`crate::parser`] and are immutable from then on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InvalidRecord;

/// Sentinel the source data uses for "no deeper classification".
pub const NOT_APPLICABLE: &str = "N/A";

/// A publication attributed to a grant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub citation_count: Option<f64>,
    #[serde(default)]
    pub journal_title: Option<String>,
}

impl Product {
    /// Citation count with missing data counted as zero.
    pub fn citations(&self) -> f64 {
        self.citation_count.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrantRecord {
    pub title: String,
    pub primary_section: String,
    pub secondary_section: Option<String>,
    pub tertiary_section: Option<String>,
    pub institution: Option<String>,
    pub award_amount: f64,
    pub products: Vec<Product>,
    pub start_year: i32,
    pub keywords: Vec<String>,
}

impl GrantRecord {
    /// Checks the invariants every record must hold before it is folded into
    /// any aggregate.
    pub fn validate(&self) -> Result<(), InvalidRecord> {
        if !self.award_amount.is_finite() {
            return Err(InvalidRecord::NonFiniteAward);
        }
        if self.award_amount < 0.0 {
            return Err(InvalidRecord::NegativeAward(self.award_amount));
        }
        if self.primary_section.trim().is_empty() || self.primary_section == NOT_APPLICABLE {
            return Err(InvalidRecord::MissingPrimarySection);
        }
        if self.secondary_section.is_none() && self.tertiary_section.is_some() {
            return Err(InvalidRecord::SkippedLevel);
        }
        for (index, product) in self.products.iter().enumerate() {
            if let Some(value) = product.citation_count {
                if !value.is_finite() || value < 0.0 {
                    return Err(InvalidRecord::InvalidCitationCount { index, value });
                }
            }
        }
        Ok(())
    }

    /// Value of the field a grouping key selects, if the record has one.
    pub fn level(&self, key: GroupingKey) -> Option<&str> {
        match key {
            GroupingKey::Primary => Some(self.primary_section.as_str()),
            GroupingKey::Secondary => self.secondary_section.as_deref(),
            GroupingKey::Tertiary => self.tertiary_section.as_deref(),
            GroupingKey::Institution => self.institution.as_deref(),
        }
    }

    pub fn paper_count(&self) -> u64 {
        self.products.len() as u64
    }

    pub fn citation_total(&self) -> f64 {
        self.products.iter().map(Product::citations).sum()
    }

    /// Review-section path from the primary section down to the deepest
    /// classified level.
    pub fn section_path(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_section.as_str())
            .chain(self.secondary_section.as_deref())
            .chain(self.tertiary_section.as_deref())
    }
}

/// Field a flat aggregation groups records by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingKey {
    #[default]
    Primary,
    Secondary,
    Tertiary,
    Institution,
}

impl GroupingKey {
    /// Name of the corresponding field in the source JSON.
    pub fn field_name(&self) -> &'static str {
        match self {
            GroupingKey::Primary => "Primary_Review_Section",
            GroupingKey::Secondary => "Secondary_Review_Section",
            GroupingKey::Tertiary => "Tertiary_Review_Section",
            GroupingKey::Institution => "Institution",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupingKey::Primary => "primary",
            GroupingKey::Secondary => "secondary",
            GroupingKey::Tertiary => "tertiary",
            GroupingKey::Institution => "institution",
        }
    }
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupingKey::Institution => f.write_str("institution"),
            level => write!(f, "{} review section", level.as_str()),
        }
    }
}

impl FromStr for GroupingKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" | "primary_review_section" => Ok(GroupingKey::Primary),
            "secondary" | "secondary_review_section" => Ok(GroupingKey::Secondary),
            "tertiary" | "tertiary_review_section" => Ok(GroupingKey::Tertiary),
            "institution" => Ok(GroupingKey::Institution),
            other => Err(format!("unknown grouping key: {other}")),
        }
    }
}

/// Inclusive range of grant start years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Smallest range covering every record's start year.
    pub fn covering<'a, I>(records: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a GrantRecord>,
    {
        records.into_iter().fold(None, |range, r| {
            let year = r.start_year;
            Some(match range {
                None => Self::new(year, year),
                Some(Self { start, end }) => Self::new(start.min(year), end.max(year)),
            })
        })
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }

    /// Number of years covered, counting both ends.
    pub fn span(&self) -> u32 {
        self.end.abs_diff(self.start).saturating_add(1)
    }
}
