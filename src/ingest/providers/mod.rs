// src/ingest/providers/mod.rs
//! Concrete source adapters.
//!
//! Every adapter runs in one of two modes: `Fixture` parses a string captured
//! ahead of time (tests, offline runs), `Http` downloads the body with a shared
//! `reqwest` client. Parsing is identical in both modes.

pub mod reddit;
pub mod rss;

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::SourceError;
use crate::ingest::types::{PublishedAt, RawArticle};

pub use reddit::RedditAdapter;
pub use rss::RssAdapter;

/// Where an adapter gets its body from.
#[derive(Clone, Debug)]
pub enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        url: String,
        timeout: Duration,
    },
}

impl Mode {
    pub(crate) async fn body(&self, source_id: &str) -> Result<String, SourceError> {
        match self {
            Mode::Fixture(body) => Ok(body.clone()),
            Mode::Http {
                client,
                url,
                timeout,
            } => http_get(client, url, source_id, *timeout).await,
        }
    }
}

/// Adapter-side caps applied after parsing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AdapterLimits {
    /// Keep at most this many items (feed order). `None` keeps all.
    pub max_items: Option<usize>,
    /// Drop items with an exact timestamp older than `now - lookback`.
    pub lookback: Option<chrono::Duration>,
}

impl AdapterLimits {
    pub(crate) fn apply(&self, items: Vec<RawArticle>, now: DateTime<Utc>) -> Vec<RawArticle> {
        let cutoff = self.lookback.map(|lb| now - lb);
        let kept = items.into_iter().filter(|it| match (&it.published, cutoff) {
            (PublishedAt::Exact(ts), Some(cut)) => *ts >= cut,
            _ => true,
        });
        match self.max_items {
            Some(n) => kept.take(n).collect(),
            None => kept.collect(),
        }
    }
}

/// Shared HTTP client for all adapters of a run.
pub fn http_client(user_agent: &str, timeout: Duration) -> anyhow::Result<reqwest::Client> {
    use anyhow::Context;
    reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .timeout(timeout)
        .build()
        .context("building http client")
}

async fn http_get(
    client: &reqwest::Client,
    url: &str,
    source_id: &str,
    timeout: Duration,
) -> Result<String, SourceError> {
    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            SourceError::Timeout {
                source_id: source_id.to_string(),
                after: timeout,
            }
        } else {
            SourceError::unavailable(source_id, e)
        }
    };

    let resp = client.get(url).send().await.map_err(map_err)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(SourceError::unavailable(source_id, format!("HTTP {status}")));
    }
    resp.text().await.map_err(map_err)
}
