//! Flat hierarchy builder: folds grant records into one accumulator per value
//! of the grouping key, in first-seen order.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::analysis::estimate::{ObservedStats, estimate};
use crate::analysis::types::GroupAggregate;
use crate::config::{BuildOptions, MissingLevelPolicy, ValidationMode};
use crate::error::{EngineError, InvalidRecord, RecordError};
use crate::records::{GrantRecord, GroupingKey};
use crate::stats::{CorpusStatistics, LogCitationSums};

/// Raw totals of one group before estimation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupTotals {
    pub key: String,
    pub projects: u64,
    pub fund: f64,
    pub sums: LogCitationSums,
}

impl GroupTotals {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Default::default()
        }
    }

    fn add_record(&mut self, record: &GrantRecord) {
        self.projects += 1;
        self.fund += record.award_amount;
        self.sums += LogCitationSums::from_products(&record.products);
    }

    fn merge(&mut self, other: &GroupTotals) {
        self.projects += other.projects;
        self.fund += other.fund;
        self.sums += other.sums;
    }

    /// Attaches the shrinkage estimate for this group under `prior`.
    pub fn score(&self, prior: &CorpusStatistics) -> GroupAggregate {
        let per_paper = estimate(&ObservedStats::from(&self.sums), prior);
        GroupAggregate {
            key: self.key.clone(),
            projects: self.projects,
            total_papers: self.sums.papers,
            total_citations: self.sums.citations,
            sum_log_citation: self.sums.sum_log,
            sum_squared_log_citation: self.sums.sum_squared_log,
            fund: self.fund,
            estimated_citations_per_paper: per_paper,
            score: per_paper * self.sums.papers as f64,
        }
    }
}

/// Output of [`build`].
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBuild {
    pub key: GroupingKey,
    pub groups: Vec<GroupTotals>,
    /// Records left out, with the position they had in the builder's input.
    pub skipped: Vec<RecordError>,
}

impl GroupBuild {
    pub fn score(&self, prior: &CorpusStatistics) -> Vec<GroupAggregate> {
        self.groups.iter().map(|g| g.score(prior)).collect()
    }

    /// Sum over every group.
    pub fn totals(&self) -> GroupTotals {
        let mut total = GroupTotals::new("total");
        for g in &self.groups {
            total.merge(g);
        }
        total
    }

    /// Combines builds of disjoint record sets. Groups keep the first-seen
    /// order of `self`, followed by keys only `other` has seen.
    pub fn merge(mut self, other: GroupBuild) -> GroupBuild {
        let mut index: HashMap<String, usize> = self
            .groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.key.clone(), i))
            .collect();

        for group in other.groups {
            match index.get(&group.key) {
                Some(&i) => self.groups[i].merge(&group),
                None => {
                    index.insert(group.key.clone(), self.groups.len());
                    self.groups.push(group);
                }
            }
        }
        self.skipped.extend(other.skipped);
        self
    }
}

/// Validates a record according to `options`.
///
/// Returns `Ok(true)` when the record may be folded, `Ok(false)` when it was
/// skipped (and recorded), or the error in strict mode.
pub(crate) fn admit(
    index: usize,
    record: &GrantRecord,
    options: &BuildOptions,
    skipped: &mut Vec<RecordError>,
) -> Result<bool, EngineError> {
    let Err(reason) = record.validate() else {
        return Ok(true);
    };
    let err = RecordError::new(index, Some(&record.title), reason);
    match options.validation {
        ValidationMode::Strict => Err(err.into()),
        ValidationMode::Lenient => {
            warn!(index, title = %record.title, reason = %err.reason, "Skipping invalid record");
            skipped.push(err);
            Ok(false)
        }
    }
}

/// Groups `records` by `key`, accumulating fund, paper count and citation
/// sums per group in first-seen order.
///
/// Records without a value for `key` follow `options.missing_level`; under
/// [`MissingLevelPolicy::Exclude`] they are reported in
/// [`GroupBuild::skipped`] but never fail the build.
pub fn build<'a, I>(
    records: I,
    key: GroupingKey,
    options: &BuildOptions,
) -> Result<GroupBuild, EngineError>
where
    I: IntoIterator<Item = &'a GrantRecord>,
{
    let mut groups: Vec<GroupTotals> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut skipped = Vec::new();
    let mut excluded = 0usize;

    for (i, record) in records.into_iter().enumerate() {
        if !admit(i, record, options, &mut skipped)? {
            continue;
        }

        let group_key = match (record.level(key), &options.missing_level) {
            (Some(value), _) => value,
            (None, MissingLevelPolicy::Bucket(name)) => name.as_str(),
            (None, MissingLevelPolicy::Exclude) => {
                excluded += 1;
                warn!(index = i, title = %record.title, %key, "Excluding record without grouping level");
                skipped.push(RecordError::new(
                    i,
                    Some(&record.title),
                    InvalidRecord::MissingLevel(key),
                ));
                continue;
            }
        };

        let slot = match index.get(group_key) {
            Some(&slot) => slot,
            None => {
                index.insert(group_key.to_string(), groups.len());
                groups.push(GroupTotals::new(group_key));
                groups.len() - 1
            }
        };
        groups[slot].add_record(record);
    }

    debug!(
        %key,
        groups = groups.len(),
        excluded,
        skipped = skipped.len(),
        "Grouped records"
    );

    Ok(GroupBuild {
        key,
        groups,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Product;

    fn grant(title: &str, primary: &str, secondary: Option<&str>, fund: f64, cites: &[f64]) -> GrantRecord {
        GrantRecord {
            title: title.into(),
            primary_section: primary.into(),
            secondary_section: secondary.map(str::to_string),
            award_amount: fund,
            products: cites
                .iter()
                .map(|&c| Product {
                    citation_count: Some(c),
                    journal_title: None,
                })
                .collect(),
            start_year: 2020,
            ..Default::default()
        }
    }

    fn sample() -> Vec<GrantRecord> {
        vec![
            grant("a", "Physics", Some("Optics"), 100.0, &[1.0, 3.0]),
            grant("b", "Biology", None, 50.0, &[0.0]),
            grant("c", "Physics", Some("Plasma"), 25.0, &[]),
            grant("d", "Biology", Some("Genetics"), 10.0, &[7.0, 7.0, 2.0]),
        ]
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let build = build(&sample(), GroupingKey::Primary, &BuildOptions::default()).unwrap();
        let keys: Vec<_> = build.groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["Physics", "Biology"]);

        let physics = &build.groups[0];
        assert_eq!(physics.projects, 2);
        assert_eq!(physics.fund, 125.0);
        assert_eq!(physics.sums.papers, 2);
        assert_eq!(physics.sums.citations, 4.0);
        assert!(build.skipped.is_empty());
    }

    #[test]
    fn test_missing_level_excluded_by_default() {
        let build = build(&sample(), GroupingKey::Secondary, &BuildOptions::default()).unwrap();
        let keys: Vec<_> = build.groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["Optics", "Plasma", "Genetics"]);
        assert_eq!(build.skipped.len(), 1);
        assert_eq!(build.skipped[0].index, 1);
        assert_eq!(
            build.skipped[0].reason,
            InvalidRecord::MissingLevel(GroupingKey::Secondary)
        );
    }

    #[test]
    fn test_missing_level_bucket_policy() {
        let options = BuildOptions {
            missing_level: MissingLevelPolicy::Bucket("Unclassified".into()),
            ..Default::default()
        };
        let build = build(&sample(), GroupingKey::Secondary, &options).unwrap();
        let keys: Vec<_> = build.groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["Optics", "Unclassified", "Plasma", "Genetics"]);
        assert!(build.skipped.is_empty());
        assert_eq!(build.totals().fund, 185.0);
    }

    #[test]
    fn test_lenient_mode_skips_invalid_records() {
        let mut records = sample();
        records[2].award_amount = -5.0;
        let build = build(&records, GroupingKey::Primary, &BuildOptions::default()).unwrap();
        assert_eq!(build.skipped.len(), 1);
        assert_eq!(build.skipped[0].reason, InvalidRecord::NegativeAward(-5.0));
        assert_eq!(build.totals().fund, 160.0);
        assert_eq!(build.totals().projects, 3);
    }

    #[test]
    fn test_strict_mode_fails_on_invalid_record() {
        let mut records = sample();
        records[3].award_amount = -1.0;
        let err = build(&records, GroupingKey::Primary, &BuildOptions::strict()).unwrap_err();
        match err {
            EngineError::InvalidRecord(e) => {
                assert_eq!(e.index, 3);
                assert_eq!(e.title.as_deref(), Some("d"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_strict_mode_still_excludes_missing_levels() {
        let build = build(&sample(), GroupingKey::Secondary, &BuildOptions::strict()).unwrap();
        assert_eq!(build.groups.len(), 3);
    }

    #[test]
    fn test_totals_conserve_input() {
        let records = sample();
        let build = build(&records, GroupingKey::Primary, &BuildOptions::default()).unwrap();
        let totals = build.totals();
        let fund: f64 = records.iter().map(|r| r.award_amount).sum();
        let papers: u64 = records.iter().map(|r| r.paper_count()).sum();
        let citations: f64 = records.iter().map(|r| r.citation_total()).sum();
        assert_eq!(totals.fund, fund);
        assert_eq!(totals.sums.papers, papers);
        assert_eq!(totals.sums.citations, citations);
    }

    #[test]
    fn test_merge_of_disjoint_shards_matches_single_build() {
        let records = sample();
        let options = BuildOptions::default();
        let whole = build(&records, GroupingKey::Primary, &options).unwrap();
        let left = build(&records[..2], GroupingKey::Primary, &options).unwrap();
        let right = build(&records[2..], GroupingKey::Primary, &options).unwrap();
        let merged = left.merge(right);

        assert_eq!(merged.groups.len(), whole.groups.len());
        for (m, w) in merged.groups.iter().zip(&whole.groups) {
            assert_eq!(m.key, w.key);
            assert_eq!(m.projects, w.projects);
            assert_eq!(m.fund, w.fund);
            assert_eq!(m.sums.papers, w.sums.papers);
            assert!((m.sums.sum_log - w.sums.sum_log).abs() < 1e-12);
        }
    }

    #[test]
    fn test_score_multiplies_estimate_by_papers() {
        let prior = CorpusStatistics::new(1.0, 1.0).unwrap();
        let build = build(&sample(), GroupingKey::Primary, &BuildOptions::default()).unwrap();
        for g in build.score(&prior) {
            assert!((g.score - g.estimated_citations_per_paper * g.total_papers as f64).abs() < 1e-12);
        }
    }

    #[test]
    fn test_group_without_papers_gets_prior_estimate() {
        let prior = CorpusStatistics::new(1.0, 1.0).unwrap();
        let records = vec![grant("x", "Chemistry", None, 5.0, &[])];
        let build = build(&records, GroupingKey::Primary, &BuildOptions::default()).unwrap();
        let scored = build.score(&prior);
        assert_eq!(scored[0].estimated_citations_per_paper, 1f64.exp_m1());
        assert_eq!(scored[0].score, 0.0);
    }

    #[test]
    fn test_build_is_idempotent() {
        let records = sample();
        let options = BuildOptions::default();
        let first = build(&records, GroupingKey::Primary, &options).unwrap();
        let second = build(&records, GroupingKey::Primary, &options).unwrap();
        assert_eq!(first, second);
    }
}
