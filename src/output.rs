//! Output formatting and persistence for aggregation results.
//!
//! Supports pretty-printed JSON to a file or stdout, and CSV append of
//! aggregate rows.

use anyhow::Result;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::analysis::types::GroupAggregate;
use csv::WriterBuilder;

/// Flat CSV row for one scored group.
#[derive(Debug, Serialize)]
struct AggregateRow<'a> {
    key: &'a str,
    papers: u64,
    citation_count: f64,
    fund: f64,
    projects: u64,
    score: f64,
    estimated_citations_per_paper: f64,
}

impl<'a> From<&'a GroupAggregate> for AggregateRow<'a> {
    fn from(g: &'a GroupAggregate) -> Self {
        AggregateRow {
            key: &g.key,
            papers: g.total_papers,
            citation_count: g.total_citations,
            fund: g.fund,
            projects: g.projects,
            score: g.score,
            estimated_citations_per_paper: g.estimated_citations_per_paper,
        }
    }
}

/// Writes `value` as pretty JSON to `path`, or to stdout when `path` is `None`.
pub fn write_json(path: Option<&str>, value: &impl Serialize) -> Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => {
            if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(path, body)?;
            info!(path, "Wrote JSON output");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{body}")?;
        }
    }
    Ok(())
}

/// Appends one row per group to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_aggregates(path: &str, groups: &[GroupAggregate]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = groups.len(), "Appending CSV rows");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for group in groups {
        writer.serialize(AggregateRow::from(group))?;
    }
    writer.flush()?;

    Ok(())
}
