// src/ingest/mod.rs
pub mod normalize;
pub mod providers;
pub mod retry;
pub mod types;

use std::time::Instant;

use anyhow::{Context, Result};
use futures::future::join_all;
use metrics::{counter, histogram};
use tracing::{info, warn};

use crate::config::{RankerConfig, SourceKind};
use crate::error::SourceError;
use crate::ingest::providers::{http_client, AdapterLimits, RedditAdapter, RssAdapter};
use crate::ingest::retry::RetryPolicy;
use crate::ingest::types::{RawArticle, SourceAdapter};

/// What one source produced during a run.
#[derive(Debug)]
pub struct SourceOutcome {
    pub source_id: String,
    pub result: Result<Vec<RawArticle>, SourceError>,
    pub elapsed_ms: f64,
}

/// Fetch every adapter concurrently, each under `policy`. One outcome per
/// adapter, in adapter order; a failing source never affects the others.
pub async fn fetch_all(
    adapters: &[Box<dyn SourceAdapter>],
    policy: &RetryPolicy,
) -> Vec<SourceOutcome> {
    let tasks = adapters.iter().map(|adapter| async move {
        let source_id = adapter.source_id().to_string();
        let t0 = Instant::now();
        let result = policy.fetch(adapter.as_ref()).await;
        let elapsed_ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ranker_fetch_ms", "source" => source_id.clone()).record(elapsed_ms);

        match &result {
            Ok(items) => {
                counter!("ranker_raw_articles_total").increment(items.len() as u64);
                info!(source = %source_id, items = items.len(), elapsed_ms, "source ok");
            }
            Err(e) => {
                counter!("ranker_source_failures_total", "source" => source_id.clone())
                    .increment(1);
                warn!(source = %source_id, error = %e, "source failed for this run");
            }
        }

        SourceOutcome {
            source_id,
            result,
            elapsed_ms,
        }
    });
    join_all(tasks).await
}

/// Adapters for every enabled `[[sources]]` entry. Entries with a `fixture`
/// path read that file instead of the network.
pub fn build_adapters(cfg: &RankerConfig) -> Result<Vec<Box<dyn SourceAdapter>>> {
    let limits = AdapterLimits {
        max_items: Some(cfg.fetch.max_articles_per_source).filter(|n| *n > 0),
        lookback: Some(cfg.fetch.lookback_hours)
            .filter(|h| *h > 0)
            .map(chrono::Duration::hours),
    };
    let timeout = cfg.fetch.timeout();
    let mut client: Option<reqwest::Client> = None;

    let mut out: Vec<Box<dyn SourceAdapter>> = Vec::new();
    for spec in cfg.enabled_sources() {
        let adapter: Box<dyn SourceAdapter> = match &spec.fixture {
            Some(path) => {
                let body = std::fs::read_to_string(path).with_context(|| {
                    format!("reading fixture for source {} at {}", spec.id, path.display())
                })?;
                match spec.kind {
                    SourceKind::Rss => {
                        Box::new(RssAdapter::from_fixture(&spec.id, &body).with_limits(limits))
                    }
                    SourceKind::Reddit => {
                        Box::new(RedditAdapter::from_fixture(&spec.id, &body).with_limits(limits))
                    }
                }
            }
            None => {
                let c = match &client {
                    Some(c) => c.clone(),
                    None => {
                        let c = http_client(&cfg.fetch.user_agent, timeout)?;
                        client = Some(c.clone());
                        c
                    }
                };
                match spec.kind {
                    SourceKind::Rss => Box::new(
                        RssAdapter::http(&spec.id, &spec.url, c, timeout).with_limits(limits),
                    ),
                    SourceKind::Reddit => Box::new(
                        RedditAdapter::http(&spec.id, &spec.url, c, timeout).with_limits(limits),
                    ),
                }
            }
        };
        out.push(adapter);
    }
    Ok(out)
}
