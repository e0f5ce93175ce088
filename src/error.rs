//! Error taxonomy for the aggregation engine.
//!
//! Record-level problems are [`InvalidRecord`] reasons wrapped in a
//! [`RecordError`] that remembers where the record sat in the input. They are
//! collected in lenient mode and only become an [`EngineError`] in strict mode.

use thiserror::Error;

use crate::records::GroupingKey;

/// Why a single grant record could not be used.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidRecord {
    #[error("award amount {0} is negative")]
    NegativeAward(f64),

    #[error("award amount is not a finite number")]
    NonFiniteAward,

    #[error("primary review section is missing")]
    MissingPrimarySection,

    #[error("tertiary review section present without a secondary section")]
    SkippedLevel,

    #[error("products is not a sequence")]
    ProductsNotSequence,

    #[error("product {index} has invalid citation count {value}")]
    InvalidCitationCount { index: usize, value: f64 },

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("record has no {0} to group by")]
    MissingLevel(GroupingKey),
}

/// An [`InvalidRecord`] located in the input sequence.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("record {index} ({}): {reason}", title.as_deref().unwrap_or("untitled"))]
pub struct RecordError {
    pub index: usize,
    pub title: Option<String>,
    pub reason: InvalidRecord,
}

impl RecordError {
    pub fn new(index: usize, title: Option<&str>, reason: InvalidRecord) -> Self {
        Self {
            index,
            title: title.map(str::to_string),
            reason,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Raised only in strict mode; lenient builds collect these instead.
    #[error("invalid record: {0}")]
    InvalidRecord(RecordError),

    /// The corpus cannot support a prior: fewer than two papers with citation
    /// data, or zero variance of the log-citation values.
    #[error(
        "insufficient corpus data: {papers_with_citations} papers with citation data, log-citation variance {variance}"
    )]
    InsufficientCorpusData {
        papers_with_citations: u64,
        variance: f64,
    },

    #[error("failed to decode records: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<RecordError> for EngineError {
    fn from(e: RecordError) -> Self {
        EngineError::InvalidRecord(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_display_uses_title() {
        let err = RecordError::new(3, Some("Quantum dots"), InvalidRecord::NegativeAward(-5.0));
        assert_eq!(
            err.to_string(),
            "record 3 (Quantum dots): award amount -5 is negative"
        );
    }

    #[test]
    fn test_record_error_display_without_title() {
        let err = RecordError::new(0, None, InvalidRecord::ProductsNotSequence);
        assert_eq!(err.to_string(), "record 0 (untitled): products is not a sequence");
    }

    #[test]
    fn test_missing_level_display() {
        let reason = InvalidRecord::MissingLevel(GroupingKey::Secondary);
        assert_eq!(reason.to_string(), "record has no secondary review section to group by");
    }
}
