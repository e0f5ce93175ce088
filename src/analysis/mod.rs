//! Grant aggregation and citation scoring.
//!
//! Records are folded into groups ([`group`]) or a full section tree
//! ([`tree`]), each group gets a shrinkage estimate of citations per paper
//! ([`estimate`]) against a prior computed over the whole corpus, and the
//! results can be ranked, reshaped per year and uploaded as JSON to S3.

pub mod estimate;
pub mod group;
pub mod keywords;
pub mod navigation;
pub mod pipeline;
pub mod publish;
pub mod ranking;
pub mod timeline;
pub mod tree;
pub mod types;
pub mod utility;
