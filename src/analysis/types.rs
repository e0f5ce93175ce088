//! Data types produced by the aggregation pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analysis::navigation::NavigationState;
use crate::error::RecordError;
use crate::records::{GroupingKey, YearRange};
use crate::stats::CorpusStatistics;

/// One group of a flat aggregation with its citation estimate attached.
///
/// Serializes as `{ key, value: { papers, citation_count, fund, projects, score, ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "AggregateEntry")]
pub struct GroupAggregate {
    pub key: String,
    pub projects: u64,
    pub total_papers: u64,
    pub total_citations: f64,
    pub sum_log_citation: f64,
    pub sum_squared_log_citation: f64,
    pub fund: f64,
    pub estimated_citations_per_paper: f64,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct AggregateEntry {
    pub key: String,
    pub value: AggregateValue,
}

#[derive(Debug, Serialize)]
pub struct AggregateValue {
    pub papers: u64,
    pub citation_count: f64,
    pub fund: f64,
    pub projects: u64,
    pub score: f64,
    pub estimated_citations_per_paper: f64,
}

impl From<GroupAggregate> for AggregateEntry {
    fn from(g: GroupAggregate) -> Self {
        AggregateEntry {
            key: g.key,
            value: AggregateValue {
                papers: g.total_papers,
                citation_count: g.total_citations,
                fund: g.fund,
                projects: g.projects,
                score: g.score,
                estimated_citations_per_paper: g.estimated_citations_per_paper,
            },
        }
    }
}

/// A record left out of a build, as reported to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRecord {
    pub index: usize,
    pub title: Option<String>,
    pub reason: String,
}

impl From<&RecordError> for SkippedRecord {
    fn from(e: &RecordError) -> Self {
        SkippedRecord {
            index: e.index,
            title: e.title.clone(),
            reason: e.reason.to_string(),
        }
    }
}

/// Complete result of one aggregation run.
#[derive(Debug, Serialize)]
pub struct AggregateReport {
    pub generated_at: DateTime<Utc>,
    pub key: GroupingKey,
    pub breadcrumb: String,
    pub navigation: NavigationState,
    pub years: Option<YearRange>,
    pub prior: CorpusStatistics,
    pub groups: Vec<GroupAggregate>,
    pub skipped: Vec<SkippedRecord>,
}
