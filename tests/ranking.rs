// tests/ranking.rs
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, TimeZone, Utc};

use tech_news_ranker::analyze::dedup::DedupConfig;
use tech_news_ranker::analyze::scoring::ScoringConfig;
use tech_news_ranker::model::article_id;
use tech_news_ranker::source_weights::SourceWeightsConfig;
use tech_news_ranker::{Article, ArticleStore, Scorer, Scores, TimeWindow};

fn t(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, h, 0, 0).unwrap()
}

fn scorer() -> Scorer {
    Scorer::new(
        ScoringConfig::default(),
        SourceWeightsConfig::default_seed(),
        Duration::days(7),
    )
}

/// Article seen `age_h` hours after publication.
fn seen(url: &str, title: &str, published: DateTime<Utc>, age_h: i64) -> Article {
    Article {
        id: article_id(url),
        title: title.into(),
        canonical_url: url.into(),
        source_ids: BTreeSet::from(["techcrunch".to_string()]),
        published_at: published,
        approximate_time: false,
        metrics: BTreeMap::from([("upvotes".to_string(), 120.0)]),
        scores: Scores::default(),
        first_seen_at: published + Duration::hours(age_h),
        last_seen_at: published + Duration::hours(age_h),
        aliases: BTreeSet::new(),
    }
}

#[test]
fn fresh_story_outranks_one_not_seen_for_a_day() {
    let now = t(12) + Duration::days(1);
    let mut store = ArticleStore::in_memory(scorer(), DedupConfig::default());
    // first and last sighting 40h ago; never refreshed since
    let old = seen("a.com/old", "Chip export rules tighten", now - Duration::hours(40), 0);
    let new = seen("b.com/new", "Robotics firm opens new lab", now - Duration::hours(1), 1);
    store.upsert(old);
    store.upsert(new);
    store.rescore_at(now);

    let ranked = store.snapshot_all();
    assert_eq!(ranked[0].canonical_url, "b.com/new");
    assert!(ranked[0].scores.impact > ranked[1].scores.impact);
}

#[test]
fn equal_totals_rank_earlier_publication_first() {
    let mut store = ArticleStore::in_memory(scorer(), DedupConfig::default());
    store.rescore_at(t(10));
    // approximate times inside the minimum age band score alike
    let mut late = seen("a.com/late", "Quantum startup opens lab", t(9), 1);
    late.approximate_time = true;
    let mut early = seen("b.com/early", "Payments firm expands to Brazil", t(8), 2);
    early.approximate_time = true;
    let late = store.upsert(late);
    let early = store.upsert(early);
    assert_eq!(late.scores.total, early.scores.total);

    let snap = store.snapshot(TimeWindow::day(t(0).date_naive()));
    let ids: Vec<_> = snap.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![early.id.as_str(), late.id.as_str()]);
}

#[test]
fn scoring_is_idempotent_and_bounded_across_a_store() {
    let mut store = ArticleStore::in_memory(scorer(), DedupConfig::default());
    let mut a = seen("c.com/1", "Lawsuit debate over app store fees", t(6), 30);
    a.metrics.insert("comments".into(), 5_000.0);
    a.metrics.insert("shares".into(), f64::INFINITY);
    a.source_ids.insert("reddit_technology".into());
    store.upsert(a);
    store.upsert(seen("d.com/2", "Fresh funding news", t(10), 0));
    store.rescore_at(t(14));

    let s = scorer();
    for a in store.snapshot_all() {
        assert_eq!(s.score(&a, t(14)), a.scores);
        for v in [a.scores.impact, a.scores.virality, a.scores.controversy, a.scores.total] {
            assert!((0.0..=100.0).contains(&v), "{v}");
        }
    }
}

#[test]
fn snapshot_serializes_round_trip() {
    let mut store = ArticleStore::in_memory(scorer(), DedupConfig::default());
    store.upsert(seen("a.com/1", "Chip export rules tighten", t(7), 1));
    store.upsert(seen("a.com/2", "Robotics firm raises seed round", t(8), 3));
    let snap = store.snapshot_all();

    let json = serde_json::to_string(&snap).unwrap();
    let back: Vec<Article> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, snap);
}

#[test]
fn purge_leaves_nothing_before_horizon() {
    let mut store = ArticleStore::in_memory(scorer(), DedupConfig::default());
    for (i, day) in [1u32, 3, 5, 8, 9].iter().enumerate() {
        let ts = Utc.with_ymd_and_hms(2025, 6, *day, 12, 0, 0).unwrap();
        store.upsert(seen(
            &format!("e.com/{i}"),
            &format!("Story number {i} of the week {day}"),
            ts,
            1,
        ));
    }
    let horizon = Utc.with_ymd_and_hms(2025, 6, 4, 0, 0, 0).unwrap();
    store.purge(horizon);
    assert_eq!(store.len(), 3);
    assert!(store.articles().all(|a| a.published_at >= horizon));
}
