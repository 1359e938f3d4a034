// src/ingest/providers/rss.rs
//! RSS 2.0 and Atom feeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};
use tracing::debug;

use super::{AdapterLimits, Mode};
use crate::error::SourceError;
use crate::ingest::types::{PublishedAt, RawArticle, SourceAdapter};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(default)]
    link: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// RFC 2822 via `time` first (what feeds mostly emit), then the generic classifier.
fn parse_pub_date(ts: &str) -> PublishedAt {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), 0))
        .map(PublishedAt::Exact)
        .unwrap_or_else(|| PublishedAt::from_text(ts))
}

/// Parse an RSS 2.0 or Atom document into raw records. Items are kept even
/// when empty; the normalizer decides what is malformed.
pub fn parse_feed(source_id: &str, xml: &str) -> Result<Vec<RawArticle>, SourceError> {
    let rss_err = match from_str::<Rss>(xml) {
        Ok(rss) => {
            return Ok(rss
                .channel
                .item
                .into_iter()
                .map(|it| {
                    let mut raw = RawArticle::new(source_id);
                    raw.title = it.title;
                    raw.url = it.link.map(|l| l.trim().to_string());
                    raw.published = it
                        .pub_date
                        .as_deref()
                        .map(parse_pub_date)
                        .unwrap_or_default();
                    raw
                })
                .collect())
        }
        Err(e) => e,
    };

    if !xml.contains("<feed") {
        return Err(SourceError::unavailable(
            source_id,
            format!("unparseable feed: {rss_err}"),
        ));
    }

    match from_str::<AtomFeed>(xml) {
        Ok(feed) => Ok(feed
            .entry
            .into_iter()
            .map(|e| {
                let href = e
                    .link
                    .iter()
                    .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
                    .or_else(|| e.link.first())
                    .and_then(|l| l.href.clone());
                let mut raw = RawArticle::new(source_id);
                raw.title = e.title.map(|t| t.value);
                raw.url = href;
                raw.published = e
                    .published
                    .or(e.updated)
                    .as_deref()
                    .map(PublishedAt::from_text)
                    .unwrap_or_default();
                raw
            })
            .collect()),
        Err(_) => Err(SourceError::unavailable(
            source_id,
            format!("unparseable feed: {rss_err}"),
        )),
    }
}

pub struct RssAdapter {
    id: String,
    mode: Mode,
    limits: AdapterLimits,
}

impl RssAdapter {
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
impl SourceAdapter for RssAdapter {
    async fn fetch(&self) -> Result<Vec<RawArticle>, SourceError> {
        let body = self.mode.body(&self.id).await?;
        let items = parse_feed(&self.id, &body)?;
        let parsed = items.len();
        let out = self.limits.apply(items, Utc::now());
        debug!(source = %self.id, parsed, kept = out.len(), "rss feed parsed");
        Ok(out)
    }

    fn source_id(&self) -> &str {
        &self.id
    }
}
