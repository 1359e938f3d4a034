// src/ingest/providers/reddit.rs
//! Reddit listing (`/r/<sub>/hot.json`).
//!
//! Link posts only; self posts and stickies are skipped. `score` becomes the
//! `upvotes` metric and `num_comments` the `comments` metric. Non-numeric
//! counters are treated as absent, and a post that cannot be read at all is
//! skipped without failing the listing.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{AdapterLimits, Mode};
use crate::error::SourceError;
use crate::ingest::types::{PublishedAt, RawArticle, SourceAdapter};

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    title: Option<String>,
    url: Option<String>,
    score: Option<Value>,
    num_comments: Option<Value>,
    created_utc: Option<Value>,
    #[serde(default)]
    is_self: bool,
    #[serde(default)]
    stickied: bool,
}

pub fn parse_listing(source_id: &str, json: &str) -> Result<Vec<RawArticle>, SourceError> {
    let listing: Listing = serde_json::from_str(json)
        .map_err(|e| SourceError::unavailable(source_id, format!("unparseable listing: {e}")))?;

    Ok(listing
        .data
        .children
        .into_iter()
        .enumerate()
        .filter_map(|(i, c)| match serde_json::from_value::<Child>(c) {
            Ok(c) => Some(c.data),
            Err(e) => {
                warn!(source = %source_id, index = i, error = %e, "skipping unreadable post");
                None
            }
        })
        .filter(|p| !p.is_self && !p.stickied)
        .map(|p| {
            let mut raw = RawArticle::new(source_id);
            raw.title = p.title;
            raw.url = p.url;
            raw.published = number(&p.created_utc)
                .filter(|t| t.is_finite())
                .map(|t| PublishedAt::from_unix(t as i64))
                .unwrap_or_default();
            if let Some(s) = number(&p.score) {
                raw = raw.with_metric("upvotes", s);
            }
            if let Some(c) = number(&p.num_comments) {
                raw = raw.with_metric("comments", c);
            }
            raw
        })
        .collect())
}

fn number(v: &Option<Value>) -> Option<f64> {
    v.as_ref().and_then(Value::as_f64)
}

pub struct RedditAdapter {
    id: String,
    mode: Mode,
    limits: AdapterLimits,
}

impl RedditAdapter {
    pub fn from_fixture(id: impl Into<String>, content: &str) -> Self {
        Self {
            id: id.into(),
            mode: Mode::Fixture(content.to_string()),
            limits: AdapterLimits::default(),
        }
    }

    pub fn http(
        id: impl Into<String>,
        url: impl Into<String>,
        client: reqwest::Client,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            id: id.into(),
            mode: Mode::Http {
                client,
                url: url.into(),
                timeout,
            },
            limits: AdapterLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: AdapterLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    async fn fetch(&self) -> Result<Vec<RawArticle>, SourceError> {
        let body = self.mode.body(&self.id).await?;
        let items = parse_listing(&self.id, &body)?;
        let parsed = items.len();
        let out = self.limits.apply(items, Utc::now());
        debug!(source = %self.id, parsed, kept = out.len(), "reddit listing parsed");
        Ok(out)
    }

    fn source_id(&self) -> &str {
        &self.id
    }
}
