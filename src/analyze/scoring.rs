//! Deterministic article scoring and ranking.
//!
//! Three sub-scores, each in `[0, 100]`:
//! - `impact`      : source authority blended with recency decay
//! - `virality`    : log-scaled engagement plus cross-source pickup
//! - `controversy` : comment/upvote ratio plus controversy keywords
//!
//! Total = w_impact*impact + w_virality*virality + w_controversy*controversy.
//!
//! Scoring reads only the article, load-time config and the reference instant
//! `as_of`. Age is `as_of - published_at`, so re-scoring an unchanged article
//! at the same instant always yields the same result.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::dedup::compare_form;
use super::weights::ScoreWeights;
use crate::model::{Article, Scores};
use crate::source_weights::SourceWeightsConfig;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImpactParams {
    #[serde(default = "default_authority_weight")]
    pub authority_weight: f64,
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,
    /// Age at which the recency term halves.
    #[serde(default = "default_half_life_hours")]
    pub half_life_hours: f64,
    /// Age band used instead of the raw age when the timestamp is approximate.
    #[serde(default = "default_approx_min")]
    pub approximate_age_min_hours: f64,
    #[serde(default = "default_approx_max")]
    pub approximate_age_max_hours: f64,
}

fn default_authority_weight() -> f64 {
    0.6
}
fn default_recency_weight() -> f64 {
    0.4
}
fn default_half_life_hours() -> f64 {
    24.0
}
fn default_approx_min() -> f64 {
    6.0
}
fn default_approx_max() -> f64 {
    24.0
}

impl Default for ImpactParams {
    fn default() -> Self {
        Self {
            authority_weight: default_authority_weight(),
            recency_weight: default_recency_weight(),
            half_life_hours: default_half_life_hours(),
            approximate_age_min_hours: default_approx_min(),
            approximate_age_max_hours: default_approx_max(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViralityParams {
    /// Relative weight per engagement metric; normalized to sum 1.
    #[serde(default = "default_metric_weights")]
    pub metric_weights: BTreeMap<String, f64>,
    /// Metric value that maps to a full log-scaled contribution.
    #[serde(default = "default_metric_saturation")]
    pub metric_saturation: f64,
    /// Share of virality taken by cross-source pickup.
    #[serde(default = "default_cross_source_weight")]
    pub cross_source_weight: f64,
    /// Number of sources that maps to full cross-source pickup.
    #[serde(default = "default_source_saturation")]
    pub source_saturation: usize,
}

fn default_metric_weights() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("upvotes".to_string(), 0.40),
        ("comments".to_string(), 0.35),
        ("shares".to_string(), 0.25),
    ])
}
fn default_metric_saturation() -> f64 {
    5_000.0
}
fn default_cross_source_weight() -> f64 {
    0.25
}
fn default_source_saturation() -> usize {
    5
}

impl Default for ViralityParams {
    fn default() -> Self {
        Self {
            metric_weights: default_metric_weights(),
            metric_saturation: default_metric_saturation(),
            cross_source_weight: default_cross_source_weight(),
            source_saturation: default_source_saturation(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControversyParams {
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    /// Keyword score added per matched keyword (capped at 1).
    #[serde(default = "default_keyword_step")]
    pub keyword_step: f64,
    #[serde(default = "default_ratio_weight")]
    pub ratio_weight: f64,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,
    /// Comment/upvote ratio that maps to a full ratio score.
    #[serde(default = "default_ratio_saturation")]
    pub ratio_saturation: f64,
    /// Below this many upvotes+comments the ratio is noise and scores 0.
    #[serde(default = "default_min_engagement")]
    pub min_engagement: f64,
    #[serde(default = "default_upvote_metric")]
    pub upvote_metric: String,
    #[serde(default = "default_comment_metric")]
    pub comment_metric: String,
}

fn default_keywords() -> Vec<String> {
    [
        "controversy",
        "debate",
        "dispute",
        "conflict",
        "criticism",
        "backlash",
        "outrage",
        "protest",
        "boycott",
        "lawsuit",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_keyword_step() -> f64 {
    0.2
}
fn default_ratio_weight() -> f64 {
    0.6
}
fn default_keyword_weight() -> f64 {
    0.4
}
fn default_ratio_saturation() -> f64 {
    1.0
}
fn default_min_engagement() -> f64 {
    5.0
}
fn default_upvote_metric() -> String {
    "upvotes".into()
}
fn default_comment_metric() -> String {
    "comments".into()
}

impl Default for ControversyParams {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            keyword_step: default_keyword_step(),
            ratio_weight: default_ratio_weight(),
            keyword_weight: default_keyword_weight(),
            ratio_saturation: default_ratio_saturation(),
            min_engagement: default_min_engagement(),
            upvote_metric: default_upvote_metric(),
            comment_metric: default_comment_metric(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: ScoreWeights,
    #[serde(default)]
    pub impact: ImpactParams,
    #[serde(default)]
    pub virality: ViralityParams,
    #[serde(default)]
    pub controversy: ControversyParams,
}

/// Scores articles against a fixed config. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Scorer {
    cfg: ScoringConfig,
    authority: SourceWeightsConfig,
    retention: Duration,
    keywords: Vec<String>,
}

impl Scorer {
    pub fn new(cfg: ScoringConfig, authority: SourceWeightsConfig, retention: Duration) -> Self {
        let keywords = cfg
            .controversy
            .keywords
            .iter()
            .map(|k| compare_form(k))
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            cfg,
            authority,
            retention,
            keywords,
        }
    }

    /// Scores of `a` as of `as_of`.
    pub fn score(&self, a: &Article, as_of: DateTime<Utc>) -> Scores {
        let impact = clamp100(self.impact(a, as_of));
        let virality = clamp100(self.virality(a));
        let controversy = clamp100(self.controversy(a));
        let total = clamp100(self.cfg.weights.combine(impact, virality, controversy));
        Scores {
            impact,
            virality,
            controversy,
            total,
        }
    }

    fn impact(&self, a: &Article, as_of: DateTime<Utc>) -> f64 {
        let p = &self.cfg.impact;
        let age = as_of - a.published_at;
        if age > self.retention {
            return 0.0;
        }

        let raw_age_h = age.num_seconds().max(0) as f64 / 3600.0;
        let age_h = if a.approximate_time {
            let lo = p.approximate_age_min_hours.max(0.0);
            let hi = p.approximate_age_max_hours.max(lo);
            raw_age_h.clamp(lo, hi)
        } else {
            raw_age_h
        };

        let recency = 0.5f64.powf(age_h / p.half_life_hours.max(1e-6));
        let authority = self.authority.max_weight_for(&a.source_ids);
        100.0 * weighted_mean(authority, p.authority_weight, recency, p.recency_weight)
    }

    fn virality(&self, a: &Article) -> f64 {
        let p = &self.cfg.virality;

        let total_w: f64 = p
            .metric_weights
            .values()
            .filter(|w| w.is_finite() && **w > 0.0)
            .sum();
        let engagement = if total_w > 0.0 {
            p.metric_weights
                .iter()
                .filter(|(_, w)| w.is_finite() && **w > 0.0)
                .map(|(name, w)| (w / total_w) * log_scale(a.metric(name), p.metric_saturation))
                .sum::<f64>()
        } else {
            0.0
        };

        let n = a.source_ids.len();
        let cross_source = if n <= 1 {
            0.0
        } else {
            let span = p.source_saturation.saturating_sub(1).max(1) as f64;
            ((n - 1) as f64 / span).min(1.0)
        };

        let s = clamp01(p.cross_source_weight);
        100.0 * ((1.0 - s) * engagement + s * cross_source)
    }

    fn controversy(&self, a: &Article) -> f64 {
        let p = &self.cfg.controversy;

        let up = a.metric(&p.upvote_metric);
        let comments = a.metric(&p.comment_metric);
        let ratio_score = if up + comments < p.min_engagement {
            0.0
        } else if up <= 0.0 {
            1.0
        } else {
            ((comments / up) / p.ratio_saturation.max(1e-6)).min(1.0)
        };

        let haystack = format!(" {} ", compare_form(&a.title));
        let hits = self
            .keywords
            .iter()
            .filter(|k| haystack.contains(&format!(" {k} ")))
            .count();
        let keyword_score = (hits as f64 * p.keyword_step.max(0.0)).min(1.0);

        100.0 * weighted_mean(ratio_score, p.ratio_weight, keyword_score, p.keyword_weight)
    }
}

/// Rank order: total desc, earlier published first, more sources first, id asc.
pub fn compare_rank(a: &Article, b: &Article) -> Ordering {
    b.scores
        .total
        .total_cmp(&a.scores.total)
        .then_with(|| a.published_at.cmp(&b.published_at))
        .then_with(|| b.source_ids.len().cmp(&a.source_ids.len()))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn rank(articles: &mut [Article]) {
    articles.sort_by(compare_rank);
}

/// `ln(1+x) / ln(1+saturation)`, capped at 1.
fn log_scale(x: f64, saturation: f64) -> f64 {
    if saturation <= 0.0 || x <= 0.0 {
        return 0.0;
    }
    (x.ln_1p() / saturation.ln_1p()).min(1.0)
}

fn weighted_mean(x: f64, wx: f64, y: f64, wy: f64) -> f64 {
    let wx = wx.max(0.0);
    let wy = wy.max(0.0);
    let denom = wx + wy;
    if denom <= 0.0 {
        return 0.0;
    }
    (x * wx + y * wy) / denom
}

fn clamp01(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn clamp100(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::article_id;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::BTreeSet;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    fn scorer() -> Scorer {
        Scorer::new(
            ScoringConfig::default(),
            SourceWeightsConfig::default_seed(),
            Duration::days(7),
        )
    }

    fn art(title: &str, sources: &[&str], age_h: i64) -> Article {
        Article {
            id: article_id(title),
            title: title.into(),
            canonical_url: title.into(),
            source_ids: sources.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            published_at: t0() - Duration::hours(age_h),
            approximate_time: false,
            metrics: BTreeMap::new(),
            scores: Scores::default(),
            first_seen_at: t0(),
            last_seen_at: t0(),
            aliases: BTreeSet::new(),
        }
    }

    #[test]
    fn recency_decays_monotonically() {
        let s = scorer();
        let fresh = s.score(&art("x", &["techcrunch"], 0), t0()).impact;
        let day = s.score(&art("x", &["techcrunch"], 24), t0()).impact;
        let week = s.score(&art("x", &["techcrunch"], 24 * 6), t0()).impact;
        assert!(fresh > day && day > week, "{fresh} {day} {week}");
    }

    #[test]
    fn impact_is_zero_past_retention() {
        let s = scorer();
        assert_eq!(s.score(&art("x", &["reuters"], 24 * 8), t0()).impact, 0.0);
    }

    #[test]
    fn impact_decays_as_reference_instant_advances() {
        let s = scorer();
        // first and last seen at t0; only the reference instant moves
        let a = art("x", &["techcrunch"], 0);
        let fresh = s.score(&a, t0()).impact;
        let later = s.score(&a, t0() + Duration::hours(40)).impact;
        assert!(later < fresh, "{later} {fresh}");
        assert_eq!(s.score(&a, t0() + Duration::days(8)).impact, 0.0);
    }

    #[test]
    fn authority_raises_impact() {
        let s = scorer();
        let strong = s.score(&art("x", &["reuters"], 2), t0()).impact;
        let weak = s.score(&art("x", &["some_blog"], 2), t0()).impact;
        assert!(strong > weak);
    }

    #[test]
    fn approximate_time_is_dampened_both_ways() {
        let s = scorer();
        let mut just_now = art("x", &["techcrunch"], 0);
        just_now.approximate_time = true;
        let mut exact_now = just_now.clone();
        exact_now.approximate_time = false;
        assert!(s.score(&just_now, t0()).impact < s.score(&exact_now, t0()).impact);

        let mut old = art("x", &["techcrunch"], 72);
        old.approximate_time = true;
        let mut exact_old = old.clone();
        exact_old.approximate_time = false;
        assert!(s.score(&old, t0()).impact > s.score(&exact_old, t0()).impact);
    }

    #[test]
    fn one_huge_metric_cannot_dominate() {
        let s = scorer();
        let mut a = art("x", &["hn"], 1);
        a.metrics.insert("upvotes".into(), 10_000_000.0);
        let v = s.score(&a, t0()).virality;
        assert!(v <= 100.0 * 0.75 * 0.40 + 1e-9, "virality {v}");
    }

    #[test]
    fn cross_source_pickup_adds_virality() {
        let s = scorer();
        let one = s.score(&art("x", &["a"], 1), t0()).virality;
        let three = s.score(&art("x", &["a", "b", "c"], 1), t0()).virality;
        assert_eq!(one, 0.0);
        assert!(three > one);
    }

    #[test]
    fn controversy_from_ratio_and_keywords() {
        let s = scorer();
        let mut heated = art("Lawsuit sparks backlash over app", &["hn"], 1);
        heated.metrics.insert("upvotes".into(), 10.0);
        heated.metrics.insert("comments".into(), 40.0);
        let calm = art("Company ships update", &["hn"], 1);
        let c = s.score(&heated, t0()).controversy;
        assert!((c - 76.0).abs() < 1e-6, "controversy {c}");
        assert_eq!(s.score(&calm, t0()).controversy, 0.0);
    }

    #[test]
    fn malformed_metrics_contribute_nothing() {
        let s = scorer();
        let mut a = art("x", &["hn"], 1);
        a.metrics.insert("upvotes".into(), -50.0);
        a.metrics.insert("comments".into(), f64::NAN);
        let sc = s.score(&a, t0());
        assert_eq!(sc.virality, 0.0);
        assert_eq!(sc.controversy, 0.0);
        assert!(sc.total.is_finite());
    }

    #[test]
    fn scoring_is_idempotent_and_in_range() {
        let s = scorer();
        let mut a = art("Boycott debate grows", &["techcrunch", "wired"], 3);
        a.metrics.insert("upvotes".into(), 1234.0);
        a.metrics.insert("comments".into(), 987.0);
        a.metrics.insert("shares".into(), 55.0);
        let first = s.score(&a, t0());
        assert_eq!(first, s.score(&a, t0()));
        for v in [first.impact, first.virality, first.controversy, first.total] {
            assert!((0.0..=100.0).contains(&v));
        }
    }

    #[test]
    fn ties_break_on_published_then_sources_then_id() {
        let mut a = art("a", &["x"], 1);
        let mut b = art("b", &["x"], 5);
        a.scores.total = 80.0;
        b.scores.total = 80.0;
        let mut v = vec![a.clone(), b.clone()];
        rank(&mut v);
        assert_eq!(v[0].id, b.id);

        let mut c = art("c", &["x", "y"], 1);
        c.scores.total = 80.0;
        let mut v = vec![a.clone(), c.clone()];
        rank(&mut v);
        assert_eq!(v[0].id, c.id);
    }
}
