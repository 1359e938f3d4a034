// src/ingest/normalize.rs
//! Raw record → canonical [`Article`].
//!
//! URL canonicalization, title cleanup and timestamp resolution. Only a record
//! with neither a title nor a URL is rejected; every other gap gets a default.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::IngestError;
use crate::ingest::types::{PublishedAt, RawArticle};
use crate::model::{article_id, Article, Scores};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Query keys dropped from URLs. A trailing `*` makes the entry a prefix.
    #[serde(default = "default_tracking_params")]
    pub tracking_params: Vec<String>,
    /// Publisher names stripped from the end of titles ("… - TechCrunch").
    #[serde(default = "default_title_suffixes")]
    pub title_suffixes: Vec<String>,
    #[serde(default = "default_max_title_chars")]
    pub max_title_chars: usize,
    /// Exact timestamps further in the future than this are treated as unknown.
    #[serde(default = "default_future_tolerance_minutes")]
    pub future_tolerance_minutes: i64,
}

fn default_tracking_params() -> Vec<String> {
    [
        "utm_*", "ref", "ref_*", "fbclid", "gclid", "mc_cid", "mc_eid", "_hsenc", "_hsmi",
        "igshid", "cmpid",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_title_suffixes() -> Vec<String> {
    [
        "TechCrunch",
        "The Verge",
        "WIRED",
        "Reuters",
        "YourStory",
        "Inc42",
        "Inc42 Media",
        "Entrackr",
        "Mint",
        "Livemint",
        "Moneycontrol",
        "Crunchbase News",
        "The Information",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_title_chars() -> usize {
    300
}

fn default_future_tolerance_minutes() -> i64 {
    60
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            tracking_params: default_tracking_params(),
            title_suffixes: default_title_suffixes(),
            max_title_chars: default_max_title_chars(),
            future_tolerance_minutes: default_future_tolerance_minutes(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    cfg: NormalizeConfig,
}

impl Normalizer {
    pub fn new(cfg: NormalizeConfig) -> Self {
        Self { cfg }
    }

    /// Clean one raw record. `now` is the ingestion time; it resolves relative
    /// timestamps and seeds `first_seen_at` / `last_seen_at`.
    pub fn normalize(&self, raw: RawArticle, now: DateTime<Utc>) -> Result<Article, IngestError> {
        let source_id = match raw.source_id.trim() {
            "" => "unknown".to_string(),
            s => s.to_string(),
        };

        let title = raw
            .title
            .as_deref()
            .map(|t| clean_title(t, &self.cfg.title_suffixes, self.cfg.max_title_chars))
            .filter(|t| !t.is_empty());
        let canonical = raw
            .url
            .as_deref()
            .and_then(|u| canonical_url(u, &self.cfg.tracking_params));

        let (title, canonical_url) = match (title, canonical) {
            (Some(t), Some(u)) => (t, u),
            (Some(t), None) => {
                let key = format!("title:{}", title_key(&t));
                (t, key)
            }
            (None, Some(u)) => (u.clone(), u),
            (None, None) => {
                return Err(IngestError::MalformedInput {
                    source_id,
                    reason: "missing both title and url".to_string(),
                })
            }
        };

        let (published_at, approximate_time) =
            resolve_published(&raw.published, now, self.cfg.future_tolerance_minutes);

        Ok(Article {
            id: article_id(&canonical_url),
            title,
            canonical_url,
            source_ids: BTreeSet::from([source_id]),
            published_at,
            approximate_time,
            metrics: clean_metrics(raw.raw_metrics),
            scores: Scores::default(),
            first_seen_at: now,
            last_seen_at: now,
            aliases: BTreeSet::new(),
        })
    }
}

/// Canonical form `host[:port]/path[?query]`: scheme, default port, fragment,
/// tracking params and trailing slash removed; host lower-cased.
/// Returns `None` for anything that is not an http(s) URL with a host.
pub fn canonical_url(raw: &str, tracking_params: &[String]) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = match Url::parse(trimmed) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{trimmed}")).ok()?
        }
        Err(_) => return None,
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();

    let mut out = host;
    if let Some(port) = parsed.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push_str(parsed.path().trim_end_matches('/'));

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k, tracking_params))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !kept.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish();
        out.push('?');
        out.push_str(&query);
    }
    Some(out)
}

fn is_tracking_param(key: &str, tracking_params: &[String]) -> bool {
    let k = key.to_ascii_lowercase();
    tracking_params.iter().any(|p| {
        let p = p.to_ascii_lowercase();
        match p.strip_suffix('*') {
            Some(prefix) => k.starts_with(prefix),
            None => k == p,
        }
    })
}

/// Title cleanup: decode entities, drop tags, fold whitespace and typographic
/// quotes, strip a trailing " - Publisher" suffix, cap the length.
pub fn clean_title(s: &str, suffixes: &[String], max_chars: usize) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (incl. NBSP)
    out = out.split_whitespace().collect::<Vec<_>>().join(" ");

    // 5) Publisher suffix
    out = strip_publisher_suffix(out, suffixes);

    // 6) Length cap
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect::<String>().trim_end().to_string();
    }
    out
}

fn strip_publisher_suffix(title: String, suffixes: &[String]) -> String {
    const SEPARATORS: [&str; 4] = [" - ", " | ", " – ", " — "];
    for suffix in suffixes {
        for sep in SEPARATORS {
            let tail = format!("{sep}{suffix}");
            if title.len() <= tail.len() {
                continue;
            }
            let cut = title.len() - tail.len();
            if title.is_char_boundary(cut) && title[cut..].eq_ignore_ascii_case(&tail) {
                return title[..cut].trim_end().to_string();
            }
        }
    }
    title
}

/// Lowercase alphanumeric words joined by `-`; stable key for URL-less records.
fn title_key(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Drops invalid values and lower-cases names; names that collide after
/// folding keep the larger value.
fn clean_metrics(raw: BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    for (k, v) in raw {
        let k = k.trim().to_ascii_lowercase();
        if k.is_empty() || !v.is_finite() || v < 0.0 {
            continue;
        }
        out.entry(k)
            .and_modify(|cur: &mut f64| *cur = cur.max(v))
            .or_insert(v);
    }
    out
}

/// Returns the publication time and whether it is approximate.
fn resolve_published(
    published: &PublishedAt,
    now: DateTime<Utc>,
    future_tolerance_minutes: i64,
) -> (DateTime<Utc>, bool) {
    match published {
        PublishedAt::Exact(dt) => {
            if *dt > now + Duration::minutes(future_tolerance_minutes) {
                (now, true)
            } else {
                (*dt, false)
            }
        }
        PublishedAt::Relative(text) => match parse_relative(text, now) {
            Some(dt) => (dt, false),
            None => (now, true),
        },
        PublishedAt::Unknown => (now, true),
    }
}

/// "3 hours ago", "an hour ago", "yesterday", "just now".
pub fn parse_relative(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let t = text.trim().to_ascii_lowercase();
    match t.as_str() {
        "just now" | "now" => return Some(now),
        "yesterday" => return Some(now - Duration::days(1)),
        _ => {}
    }

    static RE_REL: OnceCell<Regex> = OnceCell::new();
    let re = RE_REL.get_or_init(|| {
        Regex::new(r"^(an?|\d+)\s+(second|sec|minute|min|hour|hr|day|week|month|year)s?\s+ago$")
            .expect("relative time regex")
    });
    let caps = re.captures(&t)?;
    let n: i64 = match &caps[1] {
        "a" | "an" => 1,
        digits => digits.parse().ok()?,
    };
    let unit = match &caps[2] {
        "second" | "sec" => Duration::seconds(1),
        "minute" | "min" => Duration::minutes(1),
        "hour" | "hr" => Duration::hours(1),
        "day" => Duration::days(1),
        "week" => Duration::weeks(1),
        "month" => Duration::days(30),
        "year" => Duration::days(365),
        _ => return None,
    };
    let offset = unit.checked_mul(i32::try_from(n).ok()?)?;
    now.checked_sub_signed(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    fn tracking() -> Vec<String> {
        default_tracking_params()
    }

    #[test]
    fn canonical_url_strips_tracking_and_scheme() {
        let a = canonical_url(
            "https://TechCrunch.com/2025/06/10/startup-x/?utm_source=twitter&utm_medium=social",
            &tracking(),
        );
        let b = canonical_url("http://techcrunch.com:80/2025/06/10/startup-x", &tracking());
        assert_eq!(a.as_deref(), Some("techcrunch.com/2025/06/10/startup-x"));
        assert_eq!(a, b);
    }

    #[test]
    fn canonical_url_keeps_meaningful_query_and_custom_port() {
        let u = canonical_url("https://example.com:8443/read?id=42&ref=hn#comments", &tracking());
        assert_eq!(u.as_deref(), Some("example.com:8443/read?id=42"));
    }

    #[test]
    fn canonical_url_accepts_schemeless_and_rejects_junk() {
        assert_eq!(
            canonical_url("inc42.com/buzz/x/", &tracking()).as_deref(),
            Some("inc42.com/buzz/x")
        );
        assert_eq!(canonical_url("mailto:tips@example.com", &tracking()), None);
        assert_eq!(canonical_url("   ", &tracking()), None);
    }

    #[test]
    fn title_cleanup_strips_suffix_and_entities() {
        let t = clean_title(
            "  Startup&nbsp;X   raises <b>$10M</b> - TechCrunch ",
            &default_title_suffixes(),
            300,
        );
        assert_eq!(t, "Startup X raises $10M");
    }

    #[test]
    fn title_cleanup_keeps_title_that_is_only_a_suffix() {
        let t = clean_title("TechCrunch", &default_title_suffixes(), 300);
        assert_eq!(t, "TechCrunch");
    }

    #[test]
    fn relative_times_resolve_against_now() {
        assert_eq!(parse_relative("3 hours ago", now()), Some(now() - Duration::hours(3)));
        assert_eq!(parse_relative("an hour ago", now()), Some(now() - Duration::hours(1)));
        assert_eq!(parse_relative("Yesterday", now()), Some(now() - Duration::days(1)));
        assert_eq!(parse_relative("2 weeks ago", now()), Some(now() - Duration::weeks(2)));
        assert_eq!(parse_relative("soon", now()), None);
    }

    #[test]
    fn missing_title_and_url_is_malformed() {
        let n = Normalizer::default();
        let err = n.normalize(RawArticle::new("yourstory"), now()).unwrap_err();
        assert!(matches!(err, IngestError::MalformedInput { .. }));
    }

    #[test]
    fn missing_fields_get_defaults() {
        let n = Normalizer::default();

        let url_only = n
            .normalize(RawArticle::new("wired").with_url("https://wired.com/story/x"), now())
            .unwrap();
        assert_eq!(url_only.title, "wired.com/story/x");
        assert!(url_only.approximate_time);
        assert_eq!(url_only.published_at, now());

        let title_only = n
            .normalize(RawArticle::new("  ").with_title("Big Layoffs at Foo"), now())
            .unwrap();
        assert_eq!(title_only.canonical_url, "title:big-layoffs-at-foo");
        assert!(title_only.source_ids.contains("unknown"));
    }

    #[test]
    fn invalid_metrics_are_dropped() {
        let n = Normalizer::default();
        let a = n
            .normalize(
                RawArticle::new("hn")
                    .with_title("t")
                    .with_metric("Upvotes", 10.0)
                    .with_metric("comments", -3.0)
                    .with_metric("shares", f64::INFINITY),
                now(),
            )
            .unwrap();
        assert_eq!(a.metrics.len(), 1);
        assert_eq!(a.metrics.get("upvotes"), Some(&10.0));
    }

    #[test]
    fn metric_names_differing_in_case_keep_the_max() {
        let n = Normalizer::default();
        let a = n
            .normalize(
                RawArticle::new("hn")
                    .with_title("t")
                    .with_metric("Upvotes", 90.0)
                    .with_metric("upvotes", 10.0)
                    .with_metric(" COMMENTS ", 4.0)
                    .with_metric("comments", 7.0),
                now(),
            )
            .unwrap();
        assert_eq!(a.metrics.get("upvotes"), Some(&90.0));
        assert_eq!(a.metrics.get("comments"), Some(&7.0));
        assert_eq!(a.metrics.len(), 2);
    }

    #[test]
    fn far_future_timestamp_is_approximate() {
        let n = Normalizer::default();
        let a = n
            .normalize(
                RawArticle::new("hn")
                    .with_title("t")
                    .with_published(PublishedAt::Exact(now() + Duration::days(2))),
                now(),
            )
            .unwrap();
        assert!(a.approximate_time);
        assert_eq!(a.published_at, now());
    }
}
