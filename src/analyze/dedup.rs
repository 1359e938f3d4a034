//! Near-duplicate story detection and the merge policy.
//!
//! Two articles are the same story when their canonical URLs match, or when
//! their titles are close enough (edit-distance ratio or significant-token
//! overlap) and they were published within a short window of each other.
//!
//! Similarity metrics:
//! - normalized Levenshtein ratio in [0.0, 1.0] over lower-cased alphanumeric text
//! - Jaccard overlap of significant tokens (stop words and short words removed)

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::Article;

/// Thresholds for the title heuristic. All of them are tunable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Edit-distance ratio at or above which titles match.
    #[serde(default = "default_title_similarity")]
    pub title_similarity: f64,
    /// Token Jaccard overlap at or above which titles match.
    #[serde(default = "default_token_overlap")]
    pub token_overlap: f64,
    /// Maximum publication gap for a title match, in hours.
    #[serde(default = "default_time_window_hours")]
    pub time_window_hours: i64,
    /// Titles with fewer significant tokens never match on overlap alone.
    #[serde(default = "default_min_tokens")]
    pub min_tokens: usize,
}

fn default_title_similarity() -> f64 {
    0.90
}
fn default_token_overlap() -> f64 {
    0.80
}
fn default_time_window_hours() -> i64 {
    6
}
fn default_min_tokens() -> usize {
    3
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            title_similarity: default_title_similarity(),
            token_overlap: default_token_overlap(),
            time_window_hours: default_time_window_hours(),
            min_tokens: default_min_tokens(),
        }
    }
}

/// Fold `incoming` into `existing`. The result keeps the existing id.
///
/// - source ids: union
/// - metrics: per-metric maximum
/// - published_at: earliest (its approximate flag travels with it)
/// - title: the longest candidate
/// - first/last seen: min/max
///
/// Scores are left for the caller to recompute.
pub fn merge(existing: Option<Article>, incoming: Article) -> Article {
    let Some(mut base) = existing else {
        return incoming;
    };

    if incoming.id != base.id {
        base.aliases.insert(incoming.id.clone());
    }
    base.aliases.extend(incoming.aliases);
    base.aliases.remove(&base.id);

    base.source_ids.extend(incoming.source_ids);

    for (name, value) in incoming.metrics {
        base.metrics
            .entry(name)
            .and_modify(|cur| {
                if value > *cur || cur.is_nan() {
                    *cur = value;
                }
            })
            .or_insert(value);
    }

    if incoming.published_at < base.published_at {
        base.published_at = incoming.published_at;
        base.approximate_time = incoming.approximate_time;
    } else if incoming.published_at == base.published_at {
        base.approximate_time = base.approximate_time && incoming.approximate_time;
    }

    if incoming.title.chars().count() > base.title.chars().count() {
        base.title = incoming.title;
    }

    base.first_seen_at = base.first_seen_at.min(incoming.first_seen_at);
    base.last_seen_at = base.last_seen_at.max(incoming.last_seen_at);
    base
}

/// Merge two articles that were stored separately and later found to match.
/// The one created first keeps its id; ties go to the smaller id.
pub fn merge_retroactive(a: Article, b: Article) -> Article {
    let (older, younger) = if (a.first_seen_at, &a.id) <= (b.first_seen_at, &b.id) {
        (a, b)
    } else {
        (b, a)
    };
    merge(Some(older), younger)
}

/// Same story test: identical canonical URL, or similar titles within the window.
pub fn is_same_story(a: &Article, b: &Article, cfg: &DedupConfig) -> bool {
    if a.canonical_url == b.canonical_url {
        return true;
    }

    let gap_secs = (a.published_at - b.published_at).num_seconds().abs();
    if gap_secs > cfg.time_window_hours.saturating_mul(3600) {
        return false;
    }

    if title_similarity(&a.title, &b.title) >= cfg.title_similarity {
        return true;
    }

    let ta = significant_tokens(&a.title);
    let tb = significant_tokens(&b.title);
    if ta.len() < cfg.min_tokens || tb.len() < cfg.min_tokens {
        return false;
    }
    jaccard(&ta, &tb) >= cfg.token_overlap
}

/// Normalized Levenshtein ratio of the compare-forms of two titles.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let na = compare_form(a);
    let nb = compare_form(b);
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&na, &nb)
}

/// Jaccard overlap of significant tokens; 0 when either side has none.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    jaccard(&significant_tokens(a), &significant_tokens(b))
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    inter / union
}

/// Lowercase, punctuation to spaces, whitespace collapsed.
pub(crate) fn compare_form(s: &str) -> String {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "into", "that", "this", "its", "are", "was", "has",
    "have", "will", "new", "after", "over", "amid", "about", "says", "said", "how", "why", "what",
    "you", "your", "not", "but", "out", "who",
];

fn significant_tokens(title: &str) -> BTreeSet<String> {
    compare_form(title)
        .split(' ')
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}
