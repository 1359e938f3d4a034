// src/config/mod.rs
//! Ranker configuration.
//!
//! Lookup order (first hit wins):
//! 1) explicit path (`--config`)
//! 2) `$NEWS_RANKER_CONFIG`
//! 3) `config/ranker.toml`
//! 4) `config/ranker.json`
//! 5) built-in defaults
//!
//! Every section is optional; missing keys fall back to defaults. The config is
//! read once per run and never mutated afterwards.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::analyze::dedup::DedupConfig;
use crate::analyze::scoring::ScoringConfig;
use crate::analyze::topics::{default_topics, TopicRule};
use crate::ingest::normalize::NormalizeConfig;
use crate::ingest::retry::RetryPolicy;
use crate::source_weights::SourceWeightsConfig;

pub const ENV_PATH: &str = "NEWS_RANKER_CONFIG";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankerConfig {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub authority: SourceWeightsConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceSpec>,
    #[serde(default = "default_topics")]
    pub topics: Vec<TopicRule>,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            fetch: FetchSettings::default(),
            normalize: NormalizeConfig::default(),
            dedup: DedupConfig::default(),
            scoring: ScoringConfig::default(),
            authority: SourceWeightsConfig::default(),
            sources: default_sources(),
            topics: default_topics(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Articles published before `now - retention_days` are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_editions_dir")]
    pub editions_dir: PathBuf,
    /// Entries written to a daily edition.
    #[serde(default = "default_edition_size")]
    pub edition_size: usize,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/articles.json")
}
fn default_retention_days() -> i64 {
    7
}
fn default_editions_dir() -> PathBuf {
    PathBuf::from("data/editions")
}
fn default_edition_size() -> usize {
    25
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            retention_days: default_retention_days(),
            editions_dir: default_editions_dir(),
            edition_size: default_edition_size(),
        }
    }
}

impl StoreSettings {
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FetchSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    #[serde(default = "default_max_articles")]
    pub max_articles_per_source: usize,
    /// Items with an exact timestamp older than this are dropped by adapters.
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    45
}
fn default_max_retries() -> u32 {
    2
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_backoff_max_ms() -> u64 {
    8_000
}
fn default_jitter_ms() -> u64 {
    250
}
fn default_max_articles() -> usize {
    15
}
fn default_lookback_hours() -> i64 {
    48
}
fn default_user_agent() -> String {
    format!("tech-news-ranker/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            jitter_ms: default_jitter_ms(),
            max_articles_per_source: default_max_articles(),
            lookback_hours: default_lookback_hours(),
            user_agent: default_user_agent(),
        }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: self.timeout(),
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms.max(self.backoff_base_ms)),
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rss,
    Reddit,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub kind: SourceKind,
    pub url: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Read the body from this file instead of the network.
    #[serde(default)]
    pub fixture: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

impl SourceSpec {
    fn new(id: &str, name: &str, kind: SourceKind, url: &str, category: &str) -> Self {
        Self {
            id: id.to_string(),
            name: Some(name.to_string()),
            kind,
            url: url.to_string(),
            category: Some(category.to_string()),
            enabled: true,
            fixture: None,
        }
    }
}

pub fn default_sources() -> Vec<SourceSpec> {
    use SourceKind::{Reddit, Rss};
    vec![
        SourceSpec::new("yourstory", "YourStory", Rss, "https://yourstory.com/feed", "india"),
        SourceSpec::new("inc42", "Inc42", Rss, "https://inc42.com/feed", "india"),
        SourceSpec::new("entrackr", "Entrackr", Rss, "https://entrackr.com/feed", "india"),
        SourceSpec::new(
            "livemint",
            "Livemint",
            Rss,
            "https://www.livemint.com/rss/technology",
            "india",
        ),
        SourceSpec::new(
            "moneycontrol",
            "Moneycontrol",
            Rss,
            "https://www.moneycontrol.com/rss/technology.xml",
            "india",
        ),
        SourceSpec::new(
            "reddit_indianstartups",
            "r/indianstartups",
            Reddit,
            "https://www.reddit.com/r/indianstartups/hot.json?limit=25",
            "india",
        ),
        SourceSpec::new("techcrunch", "TechCrunch", Rss, "https://techcrunch.com/feed", "global"),
        SourceSpec::new("wired", "Wired", Rss, "https://wired.com/feed/rss", "global"),
        SourceSpec::new(
            "crunchbase",
            "Crunchbase News",
            Rss,
            "https://news.crunchbase.com/feed",
            "global",
        ),
        SourceSpec::new(
            "theverge",
            "The Verge",
            Rss,
            "https://theverge.com/rss/index.xml",
            "global",
        ),
        SourceSpec::new(
            "reuters_tech",
            "Reuters Technology",
            Rss,
            "https://www.reuters.com/arc/outboundfeeds/rss/?outputType=xml",
            "global",
        ),
        SourceSpec::new(
            "reddit_technology",
            "r/technology",
            Reddit,
            "https://www.reddit.com/r/technology/hot.json?limit=25",
            "global",
        ),
        SourceSpec::new(
            "reddit_startups",
            "r/startups",
            Reddit,
            "https://www.reddit.com/r/startups/hot.json?limit=25",
            "global",
        ),
    ]
}

impl RankerConfig {
    /// Range and consistency checks. Run once right after loading.
    pub fn validate(&self) -> Result<()> {
        self.scoring
            .weights
            .validate()
            .map_err(|e| anyhow!("[scoring.weights] {e}"))?;

        for (name, v) in [
            ("dedup.title_similarity", self.dedup.title_similarity),
            ("dedup.token_overlap", self.dedup.token_overlap),
            (
                "scoring.virality.cross_source_weight",
                self.scoring.virality.cross_source_weight,
            ),
            ("authority.default_weight", self.authority.default_weight),
        ] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                bail!("{name} must be within [0, 1], got {v}");
            }
        }
        if self.dedup.time_window_hours < 0 {
            bail!("dedup.time_window_hours must not be negative");
        }
        if self.store.retention_days < 1 {
            bail!(
                "store.retention_days must be at least 1, got {}",
                self.store.retention_days
            );
        }
        if self.scoring.virality.metric_saturation <= 0.0 {
            bail!("scoring.virality.metric_saturation must be positive");
        }
        if self.scoring.impact.half_life_hours <= 0.0 {
            bail!("scoring.impact.half_life_hours must be positive");
        }
        if self.fetch.timeout_secs == 0 {
            bail!("fetch.timeout_secs must be positive");
        }

        let mut seen = std::collections::BTreeSet::new();
        for s in &self.sources {
            if s.id.trim().is_empty() {
                bail!("source with empty id");
            }
            if !seen.insert(s.id.as_str()) {
                bail!("duplicate source id `{}`", s.id);
            }
        }
        Ok(())
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceSpec> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Source id → category for every configured source, enabled or not, so
    /// stored stories from a disabled source keep their category.
    pub fn source_categories(&self) -> BTreeMap<String, String> {
        self.sources
            .iter()
            .filter_map(|s| s.category.as_ref().map(|c| (s.id.clone(), c.clone())))
            .collect()
    }
}

/// Load and validate from an explicit path. TOML or JSON by extension.
pub fn load_from(path: &Path) -> Result<RankerConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse(&content, &ext).with_context(|| format!("parsing {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validating {}", path.display()))?;
    Ok(cfg)
}

/// Load using the lookup order documented at module level.
pub fn load(explicit: Option<&Path>) -> Result<RankerConfig> {
    if let Some(p) = explicit {
        return load_from(p);
    }
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!(
            "{ENV_PATH} points to non-existent path {}",
            pb.display()
        ));
    }
    let toml_p = PathBuf::from("config/ranker.toml");
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from("config/ranker.json");
    if json_p.exists() {
        return load_from(&json_p);
    }
    let cfg = RankerConfig::default();
    cfg.validate()?;
    Ok(cfg)
}

fn parse(s: &str, ext: &str) -> Result<RankerConfig> {
    match ext {
        "json" => Ok(serde_json::from_str(s)?),
        _ => Ok(toml::from_str(s)?),
    }
}
