use chrono::Utc;
use tracing::info;

use crate::analysis::group::build;
use crate::analysis::keywords::{KeywordCount, frequent_keywords, keyword_threshold};
use crate::analysis::navigation::NavigationState;
use crate::analysis::tree::{TreeBuild, build_tree};
use crate::analysis::types::{AggregateReport, SkippedRecord};
use crate::config::BuildOptions;
use crate::error::{EngineError, RecordError};
use crate::parser::ParsedRecords;
use crate::records::{GrantRecord, GroupingKey, YearRange};
use crate::stats::CorpusStatistics;

/// Which slice of the corpus a host is looking at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct View {
    pub navigation: NavigationState,
    pub years: Option<YearRange>,
    /// Groups by this key instead of the one the navigation level implies.
    pub key: Option<GroupingKey>,
}

impl View {
    pub fn grouping_key(&self) -> GroupingKey {
        self.key.unwrap_or_else(|| self.navigation.grouping_key())
    }

    pub fn contains(&self, record: &GrantRecord) -> bool {
        self.navigation.contains(record)
            && self.years.is_none_or(|y| y.contains(record.start_year))
    }
}

/// Computes the corpus prior, then groups and scores the records in `view`.
///
/// The prior is taken over the whole corpus, never over the view, and a
/// prior failure is returned before any group is scored.
pub fn aggregate(
    corpus: &[GrantRecord],
    view: &View,
    options: &BuildOptions,
) -> Result<AggregateReport, EngineError> {
    let prior = CorpusStatistics::from_records(corpus)?;
    info!(
        mean = prior.mean_log_citation,
        variance = prior.variance_log_citation,
        papers = prior.papers,
        "Corpus prior computed"
    );
    aggregate_with_prior(corpus, view, options, prior)
}

/// [`aggregate`] over decoded input. Records the decoder rejected are
/// reported in `skipped` alongside the ones the builder left out, every index
/// a position in the original input.
pub fn aggregate_parsed(
    parsed: &ParsedRecords,
    view: &View,
    options: &BuildOptions,
) -> Result<AggregateReport, EngineError> {
    let mut report = aggregate(&parsed.records, view, options)?;
    for skipped in &mut report.skipped {
        skipped.index = parsed.input_index(skipped.index);
    }
    report
        .skipped
        .extend(parsed.rejected.iter().map(SkippedRecord::from));
    report.skipped.sort_by_key(|s| s.index);
    Ok(report)
}

/// Same as [`aggregate`] with a prior computed earlier over the same corpus.
#[tracing::instrument(
    skip_all,
    fields(key = %view.grouping_key(), breadcrumb = %view.navigation.breadcrumb())
)]
pub fn aggregate_with_prior(
    corpus: &[GrantRecord],
    view: &View,
    options: &BuildOptions,
    prior: CorpusStatistics,
) -> Result<AggregateReport, EngineError> {
    let key = view.grouping_key();
    let scope = scoped(corpus, |r| view.contains(r));
    let mut grouped = build(scope.iter().map(|&(_, r)| r), key, options)?;
    to_corpus_positions(&mut grouped.skipped, &scope);
    let groups = grouped.score(&prior);

    info!(
        groups = groups.len(),
        skipped = grouped.skipped.len(),
        "Aggregation complete"
    );

    Ok(AggregateReport {
        generated_at: Utc::now(),
        key,
        breadcrumb: view.navigation.breadcrumb(),
        navigation: view.navigation.clone(),
        years: view.years,
        prior,
        groups,
        skipped: grouped.skipped.iter().map(SkippedRecord::from).collect(),
    })
}

/// Full section tree over the records that start inside `years`.
pub fn hierarchy(
    corpus: &[GrantRecord],
    years: Option<YearRange>,
    options: &BuildOptions,
) -> Result<TreeBuild, EngineError> {
    let scope = scoped(corpus, |r| years.is_none_or(|y| y.contains(r.start_year)));
    let mut tree = build_tree(scope.iter().map(|&(_, r)| r), options)?;
    to_corpus_positions(&mut tree.skipped, &scope);
    Ok(tree)
}

/// Records of `corpus` that `keep` accepts, with their corpus positions.
fn scoped(
    corpus: &[GrantRecord],
    keep: impl Fn(&GrantRecord) -> bool,
) -> Vec<(usize, &GrantRecord)> {
    corpus.iter().enumerate().filter(|(_, r)| keep(r)).collect()
}

/// Builders number skipped records by their position in the scope they saw.
fn to_corpus_positions(skipped: &mut [RecordError], scope: &[(usize, &GrantRecord)]) {
    for err in skipped {
        if let Some(&(position, _)) = scope.get(err.index) {
            err.index = position;
        }
    }
}

/// Frequent keywords in `view`. Without a year range the threshold scales
/// with the years the corpus spans.
pub fn keywords(corpus: &[GrantRecord], view: &View) -> Vec<KeywordCount> {
    let Some(years) = view.years.or_else(|| YearRange::covering(corpus)) else {
        return Vec::new();
    };
    let threshold = keyword_threshold(view.navigation.level(), years);
    frequent_keywords(corpus.iter().filter(|r| view.contains(r)), threshold)
}
