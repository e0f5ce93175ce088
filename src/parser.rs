//! JSON decoder for grant records.
//!
//! Input is an array of grant objects:
//! ```json
//! [{
//!   "Title": "...",
//!   "Primary_Review_Section": "...",
//!   "Secondary_Review_Section": "..." | "N/A",
//!   "Tertiary_Review_Section": "..." | "N/A",
//!   "Overall_Award_Amount": 1200000,
//!   "Start_Year": 2019,
//!   "products": [{ "citation_count": 3, "journal_title": "..." }]
//! }]
//! ```
//! Each element is decoded on its own so one malformed grant does not take
//! the rest of the file down with it.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ValidationMode;
use crate::error::{EngineError, InvalidRecord, RecordError};
use crate::records::{GrantRecord, NOT_APPLICABLE, Product};

#[derive(Debug, Deserialize)]
struct RawGrant {
    #[serde(rename = "Title", default)]
    title: Option<String>,
    #[serde(rename = "Primary_Review_Section", default)]
    primary: Option<String>,
    #[serde(rename = "Secondary_Review_Section", default)]
    secondary: Option<String>,
    #[serde(rename = "Tertiary_Review_Section", default)]
    tertiary: Option<String>,
    #[serde(rename = "Institution", default)]
    institution: Option<String>,
    #[serde(rename = "Overall_Award_Amount")]
    award_amount: f64,
    #[serde(rename = "Start_Year")]
    start_year: i32,
    #[serde(default)]
    products: Option<Value>,
    #[serde(rename = "1st_Keyword", default)]
    keyword_1: Option<String>,
    #[serde(rename = "2nd_Keyword", default)]
    keyword_2: Option<String>,
    #[serde(rename = "3rd_Keyword", default)]
    keyword_3: Option<String>,
}

/// Records decoded from one input, with the ones that were rejected.
#[derive(Debug, Default)]
pub struct ParsedRecords {
    pub records: Vec<GrantRecord>,
    pub rejected: Vec<RecordError>,
    /// Input position of each entry in `records`.
    pub positions: Vec<usize>,
}

impl ParsedRecords {
    /// Position in the input of the record at `index` in `records`.
    pub fn input_index(&self, index: usize) -> usize {
        self.positions.get(index).copied().unwrap_or(index)
    }
}

/// Decodes a JSON array of grant objects.
///
/// # Errors
///
/// Returns [`EngineError::Json`] if the input is not a JSON array, and in
/// [`ValidationMode::Strict`] the first rejected record.
pub fn parse_records(bytes: &[u8], mode: ValidationMode) -> Result<ParsedRecords, EngineError> {
    let values: Vec<Value> = serde_json::from_slice(bytes)?;
    parse_values(values, mode)
}

/// Decodes already-parsed JSON values, e.g. pages from the research API.
pub fn parse_values(values: Vec<Value>, mode: ValidationMode) -> Result<ParsedRecords, EngineError> {
    let mut parsed = ParsedRecords::default();

    for (index, value) in values.into_iter().enumerate() {
        match decode_grant(index, value) {
            Ok(record) => {
                parsed.records.push(record);
                parsed.positions.push(index);
            }
            Err(err) if mode == ValidationMode::Strict => return Err(err.into()),
            Err(err) => {
                warn!(index, reason = %err.reason, "Rejected grant record");
                parsed.rejected.push(err);
            }
        }
    }

    debug!(
        records = parsed.records.len(),
        rejected = parsed.rejected.len(),
        "Parsed grant records"
    );
    Ok(parsed)
}

fn decode_grant(index: usize, value: Value) -> Result<GrantRecord, RecordError> {
    let title = value.get("Title").and_then(Value::as_str).map(str::to_string);
    let fail = |reason: InvalidRecord| RecordError {
        index,
        title: title.clone(),
        reason,
    };

    let raw: RawGrant =
        serde_json::from_value(value).map_err(|e| fail(InvalidRecord::Malformed(e.to_string())))?;

    let products = match raw.products {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(serde_json::from_value::<Product>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| fail(InvalidRecord::Malformed(e.to_string())))?,
        _ => return Err(fail(InvalidRecord::ProductsNotSequence)),
    };

    let record = GrantRecord {
        title: raw.title.unwrap_or_default(),
        primary_section: classified(raw.primary).unwrap_or_default(),
        secondary_section: classified(raw.secondary),
        tertiary_section: classified(raw.tertiary),
        institution: classified(raw.institution),
        award_amount: raw.award_amount,
        products,
        start_year: raw.start_year,
        keywords: [raw.keyword_1, raw.keyword_2, raw.keyword_3]
            .into_iter()
            .flatten()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
    };

    record.validate().map_err(fail)?;
    Ok(record)
}

/// Maps the "no classification" spellings to `None`.
fn classified(level: Option<String>) -> Option<String> {
    level
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != NOT_APPLICABLE)
}
