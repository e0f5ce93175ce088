//! Paged download from the research API.
//!
//! The API reports its record count at `{base}/sections-count` and serves
//! records at `{base}/all?page=P&pageSize=S`, pages numbered from 1.

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, info};

use super::{HttpClient, fetch_bytes};

#[derive(Debug, Deserialize)]
pub struct SectionsCount {
    pub count: u64,
}

pub fn count_url(base: &str) -> String {
    format!("{}/sections-count", base.trim_end_matches('/'))
}

pub fn page_url(base: &str, page: u64, page_size: u64) -> String {
    format!(
        "{}/all?page={page}&pageSize={page_size}",
        base.trim_end_matches('/')
    )
}

/// Pages needed to cover `total` records. Zero when `page_size` is zero.
pub fn page_count(total: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

/// Fetches every page concurrently, at most `concurrency` at a time, and
/// concatenates the rows in page order.
#[tracing::instrument(skip(client))]
pub async fn fetch_paged<C: HttpClient + 'static>(
    client: Arc<C>,
    base: &str,
    page_size: u64,
    concurrency: usize,
) -> Result<Vec<Value>> {
    let bytes = fetch_bytes(client.as_ref(), &count_url(base)).await?;
    let SectionsCount { count } = serde_json::from_slice(&bytes)?;
    let pages = page_count(count, page_size);
    info!(count, pages, "Fetching paged records");

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = Vec::new();

    // A permit is taken before spawning, so the page count the server reports
    // never turns into that many tasks up front.
    for page in 1..=pages {
        let permit = semaphore.clone().acquire_owned().await?;
        let client = client.clone();
        let url = page_url(base, page, page_size);
        let page_span = tracing::debug_span!("fetch_page", page);

        tasks.push(tokio::spawn(
            async move {
                let _permit = permit;
                let bytes = fetch_bytes(client.as_ref(), &url).await?;
                let rows: Vec<Value> = serde_json::from_slice(&bytes)?;
                debug!(rows = rows.len(), "Page fetched");
                anyhow::Ok(rows)
            }
            .instrument(page_span),
        ));
    }

    let mut records = Vec::new();
    for task in tasks {
        records.extend(task.await??);
    }

    info!(records = records.len(), "Paged fetch complete");
    Ok(records)
}
