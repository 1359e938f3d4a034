//! # Source Weights
//!
//! Configurable mapping from news sources (e.g. "techcrunch", "r/startups",
//! "Reuters Technology") to authority weights in the range `[0.0, 1.0]`.
//! The scorer uses it for the authority half of the impact sub-score.
//!
//! - Loaded as the `[authority]` section of the ranker config.
//! - Case-insensitive lookup with normalization of punctuation, dashes, etc.
//! - Aliases map display names and subreddit spellings to canonical ids.
//! - Fallback order: aliases → exact match → substring match → default.
//! - `default_seed()` covers the sources shipped in the default config.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Authority table, loaded from config or defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceWeightsConfig {
    /// Weight used when no entry matches.
    #[serde(default = "default_default_weight")]
    pub default_weight: f64,
    /// Explicit weights for canonical source ids.
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    /// Aliases mapping non-canonical names → canonical ids.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_default_weight() -> f64 {
    0.50
}

impl Default for SourceWeightsConfig {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl SourceWeightsConfig {
    /// Get the weight for a given source id or display name.
    ///
    /// Steps:
    /// 1. Alias lookup (normalized) → canonical → weight.
    /// 2. Exact weight match.
    /// 3. Substring fallback (e.g. "Reuters Technology" → "reuters").
    /// 4. Default weight.
    pub fn weight_for(&self, source: &str) -> f64 {
        let s = normalize(source);

        // 1) Alias resolution.
        if let Some(canon) = self.aliases.get(&s) {
            let c = normalize(canon);
            if let Some(&w) = self.weights.get(&c) {
                return clamp01(w);
            }
        }

        // 2) Exact weight match.
        if let Some(&w) = self.weights.get(&s) {
            return clamp01(w);
        }

        // 3) Substring fallback. Longest key wins so the result does not depend
        //    on map iteration order.
        let mut best: Option<(usize, f64)> = None;
        for (k, &w) in &self.weights {
            if !k.is_empty() && s.contains(k.as_str()) && best.map_or(true, |(len, _)| k.len() > len) {
                best = Some((k.len(), w));
            }
        }
        if let Some((_, w)) = best {
            return clamp01(w);
        }

        // 4) Default.
        clamp01(self.default_weight)
    }

    /// Highest authority among a set of sources; default weight for an empty set.
    pub fn max_weight_for<'a, I>(&self, sources: I) -> f64
    where
        I: IntoIterator<Item = &'a String>,
    {
        sources
            .into_iter()
            .map(|s| self.weight_for(s))
            .fold(None, |acc: Option<f64>, w| Some(acc.map_or(w, |a| a.max(w))))
            .unwrap_or_else(|| clamp01(self.default_weight))
    }

    /// Built-in seed for the default source roster.
    pub fn default_seed() -> Self {
        let mut weights = HashMap::new();
        let mut aliases = HashMap::new();

        for (k, v) in [
            ("reuters tech", 0.90),
            ("reuters", 0.90),
            ("theinformation", 0.88),
            ("techcrunch", 0.85),
            ("livemint", 0.80),
            ("wired", 0.78),
            ("theverge", 0.78),
            ("moneycontrol", 0.75),
            ("crunchbase", 0.75),
            ("inc42", 0.72),
            ("entrackr", 0.70),
            ("yourstory", 0.70),
            ("hackernews", 0.65),
            ("reddit technology", 0.45),
            ("reddit startups", 0.40),
            ("reddit indianstartups", 0.40),
        ] {
            weights.insert(k.to_string(), v);
        }

        for (a, c) in [
            ("reuters technology", "reuters tech"),
            ("the information", "theinformation"),
            ("tc", "techcrunch"),
            ("mint", "livemint"),
            ("the verge", "theverge"),
            ("verge", "theverge"),
            ("crunchbase news", "crunchbase"),
            ("hacker news", "hackernews"),
            ("hn", "hackernews"),
            ("r technology", "reddit technology"),
            ("r startups", "reddit startups"),
            ("r indianstartups", "reddit indianstartups"),
        ] {
            aliases.insert(a.to_string(), c.to_string());
        }

        Self {
            default_weight: default_default_weight(),
            weights,
            aliases,
        }
    }
}

/// Normalize input string: lowercase, replace punctuation/dashes with spaces,
/// collapse multiple spaces into one.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_ascii_lowercase();

    // Replace common separators with spaces.
    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }

    // Replace disruptive punctuation/whitespace with spaces.
    out = out.replace(['\n', '\r', '\t', '.', ',', '’', '\''], " ");

    // Collapse multiple spaces.
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clamp to [0.0, 1.0]; NaN maps to 0.
fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
