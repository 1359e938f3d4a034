// src/model.rs
//! Canonical article shape shared by the normalizer, deduplicator, scorer and store.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sub-scores and combined rank score, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scores {
    pub impact: f64,
    pub virality: f64,
    pub controversy: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Hash of `canonical_url`; see [`article_id`].
    pub id: String,
    pub title: String,
    pub canonical_url: String,
    pub source_ids: BTreeSet<String>,
    /// Earliest known publication time.
    pub published_at: DateTime<Utc>,
    /// Set when `published_at` was defaulted to ingestion time.
    #[serde(default)]
    pub approximate_time: bool,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub scores: Scores,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// Ids of articles folded into this one by the title heuristic.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub aliases: BTreeSet<String>,
}

impl Article {
    /// Metric value, or 0 when absent or malformed.
    pub fn metric(&self, name: &str) -> f64 {
        self.metrics
            .get(name)
            .copied()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(0.0)
    }
}

/// Stable id for a canonical URL: first 16 bytes of its SHA-256, hex encoded.
pub fn article_id(canonical_url: &str) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write as _;

    let digest = Sha256::digest(canonical_url.as_bytes());
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
