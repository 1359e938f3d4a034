// src/ingest/types.rs
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// When a source says the item was published.
///
/// Adapters pick the variant at their boundary; downstream code never inspects
/// source-specific date formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PublishedAt {
    Exact(DateTime<Utc>),
    /// Free text such as "3 hours ago" or "yesterday", resolved at ingestion.
    Relative(String),
    #[default]
    Unknown,
}

impl PublishedAt {
    /// Classify a date string: RFC 2822 / RFC 3339 become `Exact`, anything that
    /// reads like "N units ago" becomes `Relative`, the rest `Unknown`.
    pub fn from_text(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return Self::Unknown;
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
            return Self::Exact(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Self::Exact(dt.with_timezone(&Utc));
        }
        let lower = s.to_ascii_lowercase();
        if lower.ends_with(" ago") || lower == "yesterday" || lower == "just now" {
            return Self::Relative(s.to_string());
        }
        Self::Unknown
    }

    pub fn from_unix(secs: i64) -> Self {
        DateTime::<Utc>::from_timestamp(secs, 0)
            .map(Self::Exact)
            .unwrap_or_default()
    }
}

/// One record as produced by a source adapter. Untrusted: every field may be
/// missing or junk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
    pub source_id: String,
    pub title: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub published: PublishedAt,
    /// Sparse engagement counters, e.g. `upvotes`, `comments`, `shares`.
    #[serde(default)]
    pub raw_metrics: BTreeMap<String, f64>,
}

impl RawArticle {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            title: None,
            url: None,
            published: PublishedAt::Unknown,
            raw_metrics: BTreeMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_published(mut self, published: PublishedAt) -> Self {
        self.published = published;
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.raw_metrics.insert(name.into(), value);
        self
    }
}

#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawArticle>, SourceError>;
    fn source_id(&self) -> &str;
}
