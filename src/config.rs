//! Engine configuration.
//!
//! Stored as a plain JSON object on disk; every field is optional:
//! ```json
//! {
//!   "validation": "strict",
//!   "missing_level": { "bucket": "Unclassified" },
//!   "min_projects": 10,
//!   "top_n": 10
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// What to do with a record that fails validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Skip the record, log it and report it alongside the result.
    #[default]
    Lenient,
    /// Fail the whole build on the first invalid record.
    Strict,
}

/// What to do with a record that lacks the level being grouped by.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingLevelPolicy {
    #[default]
    Exclude,
    /// Fold such records into a group with this name.
    Bucket(String),
}

/// Options consumed by the hierarchy builders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub validation: ValidationMode,
    pub missing_level: MissingLevelPolicy,
}

impl BuildOptions {
    pub fn strict() -> Self {
        Self {
            validation: ValidationMode::Strict,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub validation: ValidationMode,
    pub missing_level: MissingLevelPolicy,
    /// Groups with fewer projects are left out of rankings.
    pub min_projects: u64,
    /// Length of each ranking list.
    pub top_n: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validation: ValidationMode::default(),
            missing_level: MissingLevelPolicy::default(),
            min_projects: 10,
            top_n: 10,
        }
    }
}

impl EngineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path}"))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            validation: self.validation,
            missing_level: self.missing_level.clone(),
        }
    }
}
