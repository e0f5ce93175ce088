//! Keyword frequencies for the current view.

use serde::Serialize;
use std::collections::HashMap;

use crate::records::{GrantRecord, GroupingKey, YearRange};

/// Number of start years in the full source dataset (2003 through 2023).
pub const FULL_DATASET_YEARS: u32 = 21;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordCount {
    pub word: String,
    pub count: u64,
}

/// Minimum count a keyword needs to be shown, scaled by how many years the
/// view covers. Deeper levels hold fewer grants, so the base shrinks.
pub fn keyword_threshold(level: GroupingKey, years: YearRange) -> f64 {
    let base = match level {
        GroupingKey::Primary | GroupingKey::Institution => 500.0,
        GroupingKey::Secondary => 50.0,
        GroupingKey::Tertiary => 10.0,
    };
    base * f64::from(years.span()) / f64::from(FULL_DATASET_YEARS)
}

/// Counts keywords over `records` and keeps those seen at least `min_count`
/// times, most frequent first, ties broken alphabetically.
pub fn frequent_keywords<'a, I>(records: I, min_count: f64) -> Vec<KeywordCount>
where
    I: IntoIterator<Item = &'a GrantRecord>,
{
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for record in records {
        for word in &record.keywords {
            *counts.entry(word.as_str()).or_default() += 1;
        }
    }

    let mut out: Vec<KeywordCount> = counts
        .into_iter()
        .filter(|(_, count)| *count as f64 >= min_count)
        .map(|(word, count)| KeywordCount {
            word: word.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(keywords: &[&str]) -> GrantRecord {
        GrantRecord {
            title: "t".into(),
            primary_section: "P".into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_threshold_scales_with_span() {
        let full = YearRange::new(2003, 2023);
        assert_eq!(keyword_threshold(GroupingKey::Primary, full), 500.0);
        assert_eq!(keyword_threshold(GroupingKey::Tertiary, full), 10.0);
        let three = YearRange::new(2019, 2021);
        assert!((keyword_threshold(GroupingKey::Secondary, three) - 50.0 * 3.0 / 21.0).abs() < 1e-12);
    }

    #[test]
    fn test_frequent_keywords() {
        let records = vec![
            grant(&["graphene", "catalysis"]),
            grant(&["graphene", "spintronics"]),
            grant(&["catalysis", "graphene"]),
            grant(&["spintronics"]),
        ];
        let words = frequent_keywords(&records, 2.0);
        assert_eq!(
            words,
            vec![
                KeywordCount {
                    word: "graphene".into(),
                    count: 3
                },
                KeywordCount {
                    word: "catalysis".into(),
                    count: 2
                },
                KeywordCount {
                    word: "spintronics".into(),
                    count: 2
                },
            ]
        );
        assert!(frequent_keywords(&records, 4.0).is_empty());
    }
}
