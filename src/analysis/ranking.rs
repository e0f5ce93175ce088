//! Funding-efficiency rankings over scored groups.

use serde::Serialize;
use std::str::FromStr;

use crate::analysis::types::GroupAggregate;
use crate::analysis::utility::per_million;

/// Budget-size filter applied before display.
///
/// | Range   | Groups kept                         |
/// |---------|-------------------------------------|
/// | `top10` | 10 largest by fund, descending      |
/// | `top50` | 50 largest by fund, descending      |
/// | `all`   | every group, in the original order  |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BudgetRange {
    Top10,
    Top50,
    #[default]
    All,
}

impl FromStr for BudgetRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top10" => Ok(BudgetRange::Top10),
            "top50" => Ok(BudgetRange::Top50),
            "all" => Ok(BudgetRange::All),
            other => Err(format!("unknown budget range: {other}")),
        }
    }
}

pub fn filter_by_budget(groups: &[GroupAggregate], range: BudgetRange) -> Vec<GroupAggregate> {
    let limit = match range {
        BudgetRange::Top10 => 10,
        BudgetRange::Top50 => 50,
        BudgetRange::All => return groups.to_vec(),
    };
    let mut sorted = groups.to_vec();
    sorted.sort_by(|a, b| b.fund.total_cmp(&a.fund));
    sorted.truncate(limit);
    sorted
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rankings {
    /// Papers per million of funding.
    pub papers_per_million: Vec<RankingEntry>,
    /// Citation score per million of funding.
    pub score_per_million: Vec<RankingEntry>,
}

/// Ranks groups with at least `min_projects` projects and a non-zero fund.
pub fn rank(groups: &[GroupAggregate], min_projects: u64, top_n: usize) -> Rankings {
    let eligible: Vec<&GroupAggregate> = groups
        .iter()
        .filter(|g| g.projects >= min_projects)
        .collect();

    Rankings {
        papers_per_million: top_by(&eligible, |g| g.total_papers as f64, top_n),
        score_per_million: top_by(&eligible, |g| g.score, top_n),
    }
}

fn top_by(
    groups: &[&GroupAggregate],
    metric: impl Fn(&GroupAggregate) -> f64,
    top_n: usize,
) -> Vec<RankingEntry> {
    let mut entries: Vec<RankingEntry> = groups
        .iter()
        .filter_map(|g| {
            per_million(metric(*g), g.fund).map(|value| RankingEntry {
                name: g.key.clone(),
                value,
            })
        })
        .collect();
    entries.sort_by(|a, b| b.value.total_cmp(&a.value));
    entries.truncate(top_n);
    entries
}
