//! CLI entry point for the grant impact engine.
//!
//! Loads grant records from a file or the research API, then builds the
//! section tree, scored aggregates, rankings, timelines or keyword tables.

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use grant_impact::analysis::navigation::NavigationState;
use grant_impact::analysis::pipeline::{self, View};
use grant_impact::analysis::publish::{object_key, write_json_to_s3};
use grant_impact::analysis::ranking::{BudgetRange, filter_by_budget, rank};
use grant_impact::analysis::timeline::{by_secondary_section, yearly_trees};
use grant_impact::config::{EngineConfig, ValidationMode};
use grant_impact::fetch::{BasicClient, fetch_bytes, fetch_paged};
use grant_impact::output::{append_aggregates, write_json};
use grant_impact::parser::{ParsedRecords, parse_records, parse_values};
use grant_impact::records::{GrantRecord, GroupingKey, YearRange};
use grant_impact::stats::CorpusStatistics;
use serde_json::json;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "grant_impact")]
#[command(about = "Aggregate research grants and estimate their citation impact", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Path to a JSON file, or URL to fetch
    #[arg(value_name = "FILE_OR_URL")]
    source: String,

    /// Treat a URL source as the paged research API and fetch it with this page size
    #[arg(long)]
    page_size: Option<u64>,

    /// Maximum number of concurrent page downloads
    #[arg(short, long, default_value_t = 5)]
    concurrency: usize,

    /// Fail on the first invalid record instead of skipping it
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// JSON engine config file
    #[arg(long)]
    config: Option<String>,
}

#[derive(Args)]
struct ViewArgs {
    /// Restrict to grants starting in or after this year
    #[arg(long)]
    start_year: Option<i32>,

    /// Restrict to grants starting in or before this year
    #[arg(long)]
    end_year: Option<i32>,

    /// Drill into this primary review section
    #[arg(long)]
    primary: Option<String>,

    /// Drill into this secondary review section (needs --primary)
    #[arg(long, requires = "primary")]
    secondary: Option<String>,

    /// Group by this key instead of the next level down
    #[arg(short, long)]
    key: Option<GroupingKey>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the full section tree
    Tree {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long)]
        start_year: Option<i32>,

        #[arg(long)]
        end_year: Option<i32>,

        /// File to write JSON to (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Group records and score each group's citation impact
    Aggregate {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        view: ViewArgs,

        /// File to write JSON to (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// CSV file to append aggregate rows to
        #[arg(long)]
        csv: Option<String>,

        /// Optional: S3 bucket to upload the aggregate JSON to
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Optional: Gzip compress the JSON before uploading to S3
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Rank groups by papers and citation score per million of funding
    Rank {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        view: ViewArgs,

        /// Keep only the largest groups by fund: top10, top50 or all
        #[arg(short, long, default_value = "all")]
        budget: BudgetRange,

        /// Minimum number of projects for a group to be ranked
        #[arg(long)]
        min_projects: Option<u64>,

        #[arg(short, long)]
        output: Option<String>,
    },
    /// Year-by-year series for every secondary review section
    Timeline {
        #[command(flatten)]
        input: InputArgs,

        #[arg(short, long)]
        output: Option<String>,
    },
    /// Most frequent keywords in a view
    Keywords {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        view: ViewArgs,

        #[arg(short, long)]
        output: Option<String>,
    },
    /// Print the corpus-wide citation prior
    Stats {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/grant_impact.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("grant_impact.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tree {
            input,
            start_year,
            end_year,
            output,
        } => {
            let (config, corpus) = load(&input).await?;
            let years = year_range(&corpus.records, start_year, end_year);
            let tree = pipeline::hierarchy(&corpus.records, years, &config.build_options())?;
            log_skipped(tree.skipped.len() + corpus.rejected.len());
            write_json(output.as_deref(), &tree.root)?;
        }
        Commands::Aggregate {
            input,
            view,
            output,
            csv,
            s3_bucket,
            gzip,
        } => {
            let (config, corpus) = load(&input).await?;
            let view = view.resolve(&corpus.records);
            let report = pipeline::aggregate_parsed(&corpus, &view, &config.build_options())?;
            log_skipped(report.skipped.len());

            if let Some(path) = &csv {
                append_aggregates(path, &report.groups)?;
                info!(path = %path, rows = report.groups.len(), "Appended aggregate rows");
            }
            if let Some(bucket) = &s3_bucket {
                let s3_config = aws_config::load_from_env().await;
                let s3 = aws_sdk_s3::Client::new(&s3_config);
                let key = object_key(report.key.as_str(), gzip);
                write_json_to_s3(&s3, bucket, &key, &report.groups, gzip).await?;
            }
            write_json(output.as_deref(), &report)?;
        }
        Commands::Rank {
            input,
            view,
            budget,
            min_projects,
            output,
        } => {
            let (config, corpus) = load(&input).await?;
            let view = view.resolve(&corpus.records);
            let report = pipeline::aggregate(&corpus.records, &view, &config.build_options())?;
            let groups = filter_by_budget(&report.groups, budget);
            let rankings = rank(
                &groups,
                min_projects.unwrap_or(config.min_projects),
                config.top_n,
            );
            write_json(output.as_deref(), &rankings)?;
        }
        Commands::Timeline { input, output } => {
            let (config, corpus) = load(&input).await?;
            let (trees, skipped) = yearly_trees(&corpus.records, &config.build_options())?;
            log_skipped(skipped.len());
            write_json(output.as_deref(), &by_secondary_section(&trees))?;
        }
        Commands::Keywords {
            input,
            view,
            output,
        } => {
            let (_, corpus) = load(&input).await?;
            let view = view.resolve(&corpus.records);
            let words = pipeline::keywords(&corpus.records, &view);
            info!(words = words.len(), breadcrumb = %view.navigation.breadcrumb(), "Keywords counted");
            write_json(output.as_deref(), &words)?;
        }
        Commands::Stats { input } => {
            let (_, corpus) = load(&input).await?;
            let prior = CorpusStatistics::from_records(&corpus.records)?;
            write_json(
                None,
                &json!({
                    "records": corpus.records.len(),
                    "rejected": corpus.rejected.len(),
                    "years": YearRange::covering(&corpus.records),
                    "prior": prior,
                }),
            )?;
        }
    }

    Ok(())
}

impl ViewArgs {
    fn resolve(self, corpus: &[GrantRecord]) -> View {
        let navigation = match (&self.primary, &self.secondary) {
            (Some(primary), Some(secondary)) => NavigationState::within_secondary(primary, secondary),
            (Some(primary), None) => NavigationState::within_primary(primary),
            _ => NavigationState::root(),
        };
        let (navigation, key) = match self.key {
            Some(GroupingKey::Institution) => (navigation.by_institution(), None),
            key => (navigation, key),
        };
        View {
            navigation,
            years: year_range(corpus, self.start_year, self.end_year),
            key,
        }
    }
}

/// Year filter from optional bounds. A missing bound is taken from the corpus.
fn year_range(corpus: &[GrantRecord], start: Option<i32>, end: Option<i32>) -> Option<YearRange> {
    if start.is_none() && end.is_none() {
        return None;
    }
    let covering = YearRange::covering(corpus);
    let start = start.or(covering.map(|c| c.start))?;
    let end = end.or(covering.map(|c| c.end))?;
    Some(YearRange::new(start, end))
}

/// Reads the config and decodes every record from the source.
async fn load(input: &InputArgs) -> Result<(EngineConfig, ParsedRecords)> {
    let mut config = match &input.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if input.strict {
        config.validation = ValidationMode::Strict;
    }

    let parsed = match input.page_size {
        Some(page_size) => {
            if !input.source.starts_with("http") {
                bail!("--page-size needs a URL source, got {}", input.source);
            }
            let client = Arc::new(BasicClient::new());
            let values = fetch_paged(client, &input.source, page_size, input.concurrency).await?;
            parse_values(values, config.validation)?
        }
        None => parse_records(&fetcher(&input.source).await?, config.validation)?,
    };

    info!(
        records = parsed.records.len(),
        rejected = parsed.rejected.len(),
        source = %input.source,
        "Records loaded"
    );
    Ok((config, parsed))
}

/// Loads record data from a local file path or fetches it over HTTP.
#[tracing::instrument(fields(source = %url))]
async fn fetcher(url: &str) -> Result<Vec<u8>> {
    let bytes = if url.starts_with("http") {
        let client = BasicClient::new();
        fetch_bytes(&client, url).await?
    } else {
        std::fs::read(url)?
    };
    Ok(bytes)
}

fn log_skipped(count: usize) {
    if count > 0 {
        warn!(count, "Records left out of the result");
    }
}
