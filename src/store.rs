// src/store.rs
//! Rolling article store.
//!
//! Holds at most one article per id, keeps every article scored against the
//! current config as of one reference instant (`as_of`), and persists the whole set as one JSON document. Writes go
//! to a temp file which is fsynced and renamed over the old document, so a
//! crash leaves either the previous or the new snapshot on disk.
//!
//! A `<path>.lock` file marks the single writer. It is created with
//! `create_new` and removed when the store is dropped.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analyze::dedup::{is_same_story, merge, merge_retroactive, DedupConfig};
use crate::analyze::scoring::{rank, Scorer};
use crate::error::StoreError;
use crate::model::Article;

const DOC_VERSION: u32 = 1;

/// Published-at range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// One UTC calendar day.
    pub fn day(date: NaiveDate) -> Self {
        let start = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        Self {
            start,
            end: start + chrono::Duration::days(1),
        }
    }

    /// The last `days` days up to and including `now`.
    pub fn trailing(now: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: now - chrono::Duration::days(days),
            end: now + chrono::Duration::seconds(1),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    saved_at: DateTime<Utc>,
    /// Reference instant the stored scores were computed at.
    #[serde(default)]
    scored_at: Option<DateTime<Utc>>,
    #[serde(default)]
    articles: BTreeMap<String, Article>,
}

#[derive(Debug)]
struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    fn acquire(store_path: &Path) -> Result<Self, StoreError> {
        let path = lock_path(store_path);
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut f) => {
                let _ = writeln!(f, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StoreError::Locked { path })
            }
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove store lock");
        }
    }
}

fn lock_path(store_path: &Path) -> PathBuf {
    let mut s = store_path.as_os_str().to_owned();
    s.push(".lock");
    PathBuf::from(s)
}

fn tmp_path(store_path: &Path) -> PathBuf {
    let mut s = store_path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

#[derive(Debug)]
pub struct ArticleStore {
    path: Option<PathBuf>,
    articles: BTreeMap<String, Article>,
    /// Retired id → id it was merged into.
    aliases: BTreeMap<String, String>,
    scorer: Scorer,
    dedup: DedupConfig,
    /// Scoring reference. Unset until `rescore_at`; an unset store scores each
    /// article as of its own last sighting.
    as_of: Option<DateTime<Utc>>,
    _lock: Option<StoreLock>,
}

impl ArticleStore {
    /// Store with no backing file; `save` is a no-op.
    pub fn in_memory(scorer: Scorer, dedup: DedupConfig) -> Self {
        Self {
            path: None,
            articles: BTreeMap::new(),
            aliases: BTreeMap::new(),
            scorer,
            dedup,
            as_of: None,
            _lock: None,
        }
    }

    /// Take the writer lock and load the document at `path` (empty if missing).
    /// Loaded articles are re-scored against the current config.
    pub fn open(
        path: impl Into<PathBuf>,
        scorer: Scorer,
        dedup: DedupConfig,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        let lock = StoreLock::acquire(&path)?;
        let (articles, as_of) = read_document(&path)?;
        Ok(Self::from_articles(
            Some(path),
            articles,
            as_of,
            scorer,
            dedup,
            Some(lock),
        ))
    }

    /// Load without taking the lock. The result is detached from the file:
    /// `save` is a no-op. For read-only queries while a run may be writing.
    pub fn load_detached(
        path: &Path,
        scorer: Scorer,
        dedup: DedupConfig,
    ) -> Result<Self, StoreError> {
        let (articles, as_of) = read_document(path)?;
        Ok(Self::from_articles(None, articles, as_of, scorer, dedup, None))
    }

    fn from_articles(
        path: Option<PathBuf>,
        articles: BTreeMap<String, Article>,
        as_of: Option<DateTime<Utc>>,
        scorer: Scorer,
        dedup: DedupConfig,
        lock: Option<StoreLock>,
    ) -> Self {
        let mut store = Self {
            path,
            articles,
            aliases: BTreeMap::new(),
            scorer,
            dedup,
            as_of,
            _lock: lock,
        };
        store.rebuild_aliases();
        store.rescore_all();
        debug!(articles = store.articles.len(), "store loaded");
        store
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    /// Look up by id, following merge aliases.
    pub fn get(&self, id: &str) -> Option<&Article> {
        self.articles
            .get(id)
            .or_else(|| self.aliases.get(id).and_then(|t| self.articles.get(t)))
    }

    pub fn articles(&self) -> impl Iterator<Item = &Article> {
        self.articles.values()
    }

    /// Insert a new article or merge it into the stored story it matches
    /// (same id, a retired alias, or a near-duplicate title). Returns the
    /// stored article after merge and re-scoring.
    pub fn upsert(&mut self, incoming: Article) -> Article {
        let target = self.resolve_target(&incoming);

        let mut stored = match target.and_then(|id| self.articles.remove(&id)) {
            Some(existing) => {
                let merged = merge(Some(existing), incoming);
                counter!("ranker_merged_total").increment(1);
                debug!(id = %merged.id, sources = merged.source_ids.len(), "article merged");
                merged
            }
            None => incoming,
        };

        stored.scores = self.scorer.score(&stored, self.reference(&stored));
        for alias in &stored.aliases {
            self.aliases.insert(alias.clone(), stored.id.clone());
        }
        self.articles.insert(stored.id.clone(), stored.clone());
        stored
    }

    fn resolve_target(&self, incoming: &Article) -> Option<String> {
        if self.articles.contains_key(&incoming.id) {
            return Some(incoming.id.clone());
        }
        if let Some(t) = self.aliases.get(&incoming.id) {
            if self.articles.contains_key(t) {
                return Some(t.clone());
            }
        }
        self.articles
            .values()
            .filter(|a| is_same_story(a, incoming, &self.dedup))
            .min_by(|a, b| (a.first_seen_at, &a.id).cmp(&(b.first_seen_at, &b.id)))
            .map(|a| a.id.clone())
    }

    /// Fold together stored articles that match each other (e.g. first seen
    /// on different days). The earliest-created id survives. Returns the number
    /// of articles folded away.
    ///
    /// Candidates are scanned in publication order and only compared with
    /// neighbours inside the dedup time window.
    pub fn reconcile(&mut self) -> usize {
        let window = chrono::Duration::hours(self.dedup.time_window_hours.max(0));
        let mut folded = 0usize;
        loop {
            let ordered: Vec<&Article> = {
                let mut v: Vec<&Article> = self.articles.values().collect();
                v.sort_by(|a, b| (a.published_at, &a.id).cmp(&(b.published_at, &b.id)));
                v
            };

            let mut pair: Option<(String, String)> = None;
            'outer: for (i, a) in ordered.iter().enumerate() {
                let neighbours = ordered[i + 1..]
                    .iter()
                    .take_while(|b| b.published_at - a.published_at <= window);
                for b in neighbours {
                    if is_same_story(a, b, &self.dedup) {
                        pair = Some((a.id.clone(), b.id.clone()));
                        break 'outer;
                    }
                }
            }

            let Some((keep, drop)) = pair else { break };
            let (Some(a), Some(b)) = (self.articles.remove(&keep), self.articles.remove(&drop))
            else {
                break;
            };
            let mut merged = merge_retroactive(a, b);
            merged.scores = self.scorer.score(&merged, self.reference(&merged));
            for alias in &merged.aliases {
                self.aliases.insert(alias.clone(), merged.id.clone());
            }
            info!(kept = %merged.id, retired = %drop, "retroactive merge");
            counter!("ranker_merged_total").increment(1);
            self.articles.insert(merged.id.clone(), merged);
            folded += 1;
        }
        folded
    }

    /// Articles published within `window`, ranked.
    pub fn snapshot(&self, window: TimeWindow) -> Vec<Article> {
        let mut out: Vec<Article> = self
            .articles
            .values()
            .filter(|a| window.contains(a.published_at))
            .cloned()
            .collect();
        rank(&mut out);
        out
    }

    /// Every stored article, ranked.
    pub fn snapshot_all(&self) -> Vec<Article> {
        let mut out: Vec<Article> = self.articles.values().cloned().collect();
        rank(&mut out);
        out
    }

    /// Drop articles published before `horizon`. Returns how many were removed.
    pub fn purge(&mut self, horizon: DateTime<Utc>) -> usize {
        let before = self.articles.len();
        self.articles.retain(|_, a| a.published_at >= horizon);
        let removed = before - self.articles.len();
        if removed > 0 {
            self.rebuild_aliases();
            counter!("ranker_purged_total").increment(removed as u64);
            info!(removed, horizon = %horizon, "purged articles past retention");
        }
        removed
    }

    /// Persist atomically. No-op for in-memory stores.
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let doc = StoreDocument {
            version: DOC_VERSION,
            saved_at: Utc::now(),
            scored_at: self.as_of,
            articles: self.articles.clone(),
        };
        let body = serde_json::to_vec_pretty(&doc)?;
        write_atomic(path, &body)?;
        gauge!("ranker_store_articles").set(self.articles.len() as f64);
        info!(path = %path.display(), articles = self.articles.len(), "store saved");
        Ok(())
    }

    /// Re-score every article as of `now` and keep `now` as the reference
    /// for later upserts, so ages in one store are comparable.
    pub fn rescore_at(&mut self, now: DateTime<Utc>) {
        self.as_of = Some(now);
        self.rescore_all();
    }

    fn reference(&self, a: &Article) -> DateTime<Utc> {
        self.as_of.unwrap_or(a.last_seen_at)
    }

    fn rescore_all(&mut self) {
        let as_of = self.as_of;
        for a in self.articles.values_mut() {
            a.scores = self.scorer.score(a, as_of.unwrap_or(a.last_seen_at));
        }
    }

    fn rebuild_aliases(&mut self) {
        self.aliases = self
            .articles
            .values()
            .flat_map(|a| a.aliases.iter().map(move |al| (al.clone(), a.id.clone())))
            .collect();
    }
}

type Loaded = (BTreeMap<String, Article>, Option<DateTime<Utc>>);

fn read_document(path: &Path) -> Result<Loaded, StoreError> {
    match fs::read_to_string(path) {
        Ok(s) => {
            let doc: StoreDocument =
                serde_json::from_str(&s).map_err(|source| StoreError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                })?;
            if doc.version != DOC_VERSION {
                warn!(path = %path.display(), version = doc.version, "unexpected store version");
            }
            Ok((doc.articles, doc.scored_at))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok((BTreeMap::new(), None)),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Write `bytes` to `<path>.tmp`, fsync, then rename over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    }
    let tmp = tmp_path(path);
    {
        let mut f = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        f.write_all(bytes).map_err(|e| StoreError::io(&tmp, e))?;
        f.sync_all().map_err(|e| StoreError::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::scoring::ScoringConfig;
    use crate::model::{article_id, Scores};
    use crate::source_weights::SourceWeightsConfig;
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeSet;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap()
    }

    fn scorer() -> Scorer {
        Scorer::new(
            ScoringConfig::default(),
            SourceWeightsConfig::default_seed(),
            Duration::days(7),
        )
    }

    fn art(url: &str, title: &str, source: &str, published: DateTime<Utc>) -> Article {
        Article {
            id: article_id(url),
            title: title.into(),
            canonical_url: url.into(),
            source_ids: BTreeSet::from([source.to_string()]),
            published_at: published,
            approximate_time: false,
            metrics: BTreeMap::new(),
            scores: Scores::default(),
            first_seen_at: published,
            last_seen_at: published,
            aliases: BTreeSet::new(),
        }
    }

    #[test]
    fn upsert_same_url_merges_and_rescores() {
        let mut s = ArticleStore::in_memory(scorer(), DedupConfig::default());
        let mut a = art("tc.com/x", "Startup X raises $10M", "A", t0());
        a.metrics.insert("upvotes".into(), 50.0);
        let mut b = art("tc.com/x", "Startup X raises $10M", "B", t0());
        b.metrics.insert("comments".into(), 30.0);

        let first = s.upsert(a);
        let merged = s.upsert(b);
        assert_eq!(s.len(), 1);
        assert_eq!(merged.id, first.id);
        assert_eq!(merged.source_ids.len(), 2);
        assert!(merged.scores.virality > first.scores.virality);
    }

    #[test]
    fn near_duplicate_title_merges_under_earlier_id_and_alias_resolves() {
        let mut s = ArticleStore::in_memory(scorer(), DedupConfig::default());
        let a = art("a.com/1", "Acme acquires Widget Co for $2B", "A", t0());
        let b = art(
            "b.com/2",
            "Acme acquires Widget Co for $2 B",
            "B",
            t0() + Duration::hours(1),
        );
        let out = s.upsert(a.clone());
        let merged = s.upsert(b.clone());
        assert_eq!(s.len(), 1);
        assert_eq!(merged.id, out.id);
        assert_eq!(s.get(&b.id).map(|x| x.id.as_str()), Some(a.id.as_str()));

        // the same URL arriving again lands on the surviving id
        let again = s.upsert(art("b.com/2", "Acme acquires Widget Co for $2 B", "C", t0()));
        assert_eq!(again.id, a.id);
        assert_eq!(again.source_ids.len(), 3);
    }

    #[test]
    fn purge_drops_only_articles_before_horizon() {
        let mut s = ArticleStore::in_memory(scorer(), DedupConfig::default());
        s.upsert(art("a.com/old", "Old news story here", "A", t0() - Duration::days(9)));
        s.upsert(art("a.com/new", "Brand new story today", "A", t0()));
        let horizon = t0() - Duration::days(7);
        assert_eq!(s.purge(horizon), 1);
        assert!(s.articles().all(|a| a.published_at >= horizon));
        assert_eq!(s.purge(horizon), 0);
    }

    #[test]
    fn snapshot_filters_window_and_ranks() {
        let mut s = ArticleStore::in_memory(scorer(), DedupConfig::default());
        s.upsert(art("a.com/1", "Reuters breaks a story", "reuters", t0()));
        s.upsert(art("a.com/2", "Blog post on something", "someblog", t0()));
        s.upsert(art("a.com/3", "Yesterday's roundup", "reuters", t0() - Duration::days(1)));

        let day = TimeWindow::day(t0().date_naive());
        let snap = s.snapshot(day);
        assert_eq!(snap.len(), 2);
        assert!(snap[0].scores.total >= snap[1].scores.total);
        assert_eq!(snap[0].canonical_url, "a.com/1");
        assert_eq!(s.snapshot_all().len(), 3);
    }

    #[test]
    fn reconcile_folds_late_matches_into_oldest() {
        let cfg = DedupConfig::default();
        let mut s = ArticleStore::in_memory(scorer(), cfg.clone());
        // stored with a strict config so they do not merge on upsert
        s.dedup.title_similarity = 1.1;
        s.dedup.token_overlap = 1.1;
        let older = art("a.com/1", "Acme acquires Widget Co for $2B", "A", t0());
        let mut younger = art("b.com/2", "Acme acquires Widget Co for $2 B", "B", t0());
        younger.first_seen_at = t0() + Duration::days(1);
        s.upsert(older.clone());
        s.upsert(younger.clone());
        assert_eq!(s.len(), 2);

        s.dedup = cfg;
        assert_eq!(s.reconcile(), 1);
        assert_eq!(s.len(), 1);
        assert!(s.get(&older.id).is_some());
        assert_eq!(s.get(&younger.id).map(|a| a.id.clone()), Some(older.id));
    }

    #[test]
    fn save_and_reopen_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("articles.json");
        let snap = {
            let mut s = ArticleStore::open(&path, scorer(), DedupConfig::default()).unwrap();
            let mut a = art("tc.com/x", "Startup X raises $10M", "A", t0());
            a.metrics.insert("upvotes".into(), 50.0);
            s.upsert(a);
            s.upsert(art("tc.com/y", "Another startup story", "B", t0()));
            s.save().unwrap();
            s.snapshot_all()
        };
        assert!(!lock_path(&path).exists());

        let s = ArticleStore::open(&path, scorer(), DedupConfig::default()).unwrap();
        assert_eq!(s.snapshot_all(), snap);
    }

    #[test]
    fn detached_load_ignores_lock_and_never_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("articles.json");
        let mut w = ArticleStore::open(&path, scorer(), DedupConfig::default()).unwrap();
        w.upsert(art("tc.com/x", "Startup X raises $10M", "A", t0()));
        w.save().unwrap();

        let mut r = ArticleStore::load_detached(&path, scorer(), DedupConfig::default()).unwrap();
        assert_eq!(r.len(), 1);
        r.purge(t0() + Duration::days(1));
        r.save().unwrap();
        drop(w);
        let again = ArticleStore::load_detached(&path, scorer(), DedupConfig::default()).unwrap();
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn reference_instant_is_persisted() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("articles.json");
        let snap = {
            let mut s = ArticleStore::open(&path, scorer(), DedupConfig::default()).unwrap();
            s.upsert(art("tc.com/x", "Startup X raises $10M", "techcrunch", t0()));
            s.rescore_at(t0() + Duration::hours(30));
            s.save().unwrap();
            s.snapshot_all()
        };
        let s = ArticleStore::open(&path, scorer(), DedupConfig::default()).unwrap();
        assert_eq!(s.snapshot_all(), snap);

        let fresh = scorer().score(&snap[0], t0());
        assert!(snap[0].scores.impact < fresh.impact);
    }

    #[test]
    fn unknown_fields_are_ignored_on_read() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("articles.json");
        let doc = serde_json::json!({
            "version": 1,
            "saved_at": "2025-06-10T09:00:00Z",
            "retention_days": 7,
            "renderer": { "theme": "dark" },
            "articles": {
                "abc123": {
                    "id": "abc123",
                    "title": "Startup X raises $10M",
                    "canonical_url": "tc.com/x",
                    "source_ids": ["techcrunch"],
                    "published_at": "2025-06-10T08:00:00Z",
                    "first_seen_at": "2025-06-10T08:05:00Z",
                    "last_seen_at": "2025-06-10T08:05:00Z",
                    "metrics": { "upvotes": 50.0 },
                    "scores": { "impact": 1.0, "virality": 2.0, "controversy": 0.0, "total": 1.0, "legacy": 9 },
                    "sentiment": "neutral",
                    "image_url": null
                }
            }
        });
        fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        let detached =
            ArticleStore::load_detached(&path, scorer(), DedupConfig::default()).unwrap();
        assert_eq!(detached.len(), 1);
        let a = detached.get("abc123").unwrap();
        assert_eq!(a.title, "Startup X raises $10M");
        assert_eq!(a.metrics.get("upvotes"), Some(&50.0));

        let opened = ArticleStore::open(&path, scorer(), DedupConfig::default()).unwrap();
        assert_eq!(opened.snapshot_all(), detached.snapshot_all());
    }

    #[test]
    fn reconcile_ignores_matches_outside_the_window() {
        let mut s = ArticleStore::in_memory(scorer(), DedupConfig::default());
        s.dedup.title_similarity = 1.1;
        s.dedup.token_overlap = 1.1;
        s.upsert(art("a.com/1", "Acme acquires Widget Co for $2B", "A", t0()));
        s.upsert(art(
            "b.com/2",
            "Acme acquires Widget Co for $2 B",
            "B",
            t0() + Duration::hours(30),
        ));
        s.dedup = DedupConfig::default();
        assert_eq!(s.reconcile(), 0);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn second_writer_is_locked_out() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("articles.json");
        let _first = ArticleStore::open(&path, scorer(), DedupConfig::default()).unwrap();
        let err = ArticleStore::open(&path, scorer(), DedupConfig::default()).unwrap_err();
        assert!(matches!(err, StoreError::Locked { .. }));
    }

    #[test]
    fn corrupt_document_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("articles.json");
        fs::write(&path, "{ not json").unwrap();
        let err = ArticleStore::open(&path, scorer(), DedupConfig::default()).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        // lock released on the error path
        assert!(!lock_path(&path).exists());
    }
}
