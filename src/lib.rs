pub mod analysis;
pub mod config;
pub mod error;
pub mod fetch;
pub mod output;
pub mod parser;
pub mod records;
pub mod stats;
