// src/edition.rs
//! Daily editions: the ranked hand-off for the site renderer, one JSON file
//! per day (`edition_YYYY-MM-DD.json`), plus read-side queries over the archive.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analyze::topics::{summarize, Tagger};
use crate::error::StoreError;
use crate::model::{Article, Scores};
use crate::store::write_atomic;

const PREFIX: &str = "edition_";
const SUFFIX: &str = ".json";
const SUMMARY_TOP: usize = 5;
const STATS_TOP_SOURCES: usize = 10;
const STATS_TOP_TAGS: usize = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EditionEntry {
    pub rank: usize,
    pub id: String,
    pub title: String,
    /// Absent for title-only stories.
    pub url: Option<String>,
    pub sources: Vec<String>,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub approximate_time: bool,
    pub scores: Scores,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    /// Topic tags followed by source categories.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edition {
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub total_articles: usize,
    pub articles: Vec<EditionEntry>,
}

impl Edition {
    /// Build from an already ranked slice, keeping at most `limit` entries.
    pub fn build(
        date: NaiveDate,
        ranked: &[Article],
        tagger: &Tagger,
        limit: usize,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let articles: Vec<EditionEntry> = ranked
            .iter()
            .take(limit)
            .enumerate()
            .map(|(i, a)| {
                let topics = tagger.tags_for(&a.title);
                let categories = tagger.categories_for(&a.source_ids);
                let summary = summarize(&topics, &categories, a.source_ids.len());
                let mut tags = topics;
                for c in &categories {
                    if !tags.contains(c) {
                        tags.push(c.clone());
                    }
                }
                EditionEntry {
                    rank: i + 1,
                    id: a.id.clone(),
                    title: a.title.clone(),
                    url: public_url(&a.canonical_url),
                    sources: a.source_ids.iter().cloned().collect(),
                    published_at: a.published_at,
                    approximate_time: a.approximate_time,
                    scores: a.scores,
                    metrics: a.metrics.clone(),
                    tags,
                    categories,
                    summary,
                }
            })
            .collect();
        Self {
            date,
            generated_at,
            total_articles: articles.len(),
            articles,
        }
    }
}

/// Canonical URLs drop the scheme; editions link over https.
fn public_url(canonical: &str) -> Option<String> {
    if canonical.starts_with("title:") {
        None
    } else {
        Some(format!("https://{canonical}"))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EditionSummary {
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub total_articles: usize,
    pub top_stories: Vec<EditionEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchHit {
    pub date: NaiveDate,
    pub entry: EditionEntry,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ArchiveStats {
    pub total_editions: usize,
    pub total_articles: usize,
    /// (oldest, newest)
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub top_sources: Vec<(String, usize)>,
    pub top_tags: Vec<(String, usize)>,
}

/// Directory of edition files.
#[derive(Clone, Debug)]
pub struct EditionArchive {
    dir: PathBuf,
}

impl EditionArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{PREFIX}{}{SUFFIX}", date.format("%Y-%m-%d")))
    }

    /// Write atomically, replacing any edition for the same date.
    pub fn write(&self, edition: &Edition) -> Result<PathBuf, StoreError> {
        let path = self.path_for(edition.date);
        let body = serde_json::to_vec_pretty(edition)?;
        write_atomic(&path, &body)?;
        info!(path = %path.display(), articles = edition.total_articles, "edition written");
        Ok(path)
    }

    /// Available dates, newest first. A missing directory is an empty archive.
    pub fn list(&self) -> Result<Vec<NaiveDate>, StoreError> {
        let rd = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };
        let mut dates = BTreeSet::new();
        for entry in rd {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name
                .strip_prefix(PREFIX)
                .and_then(|s| s.strip_suffix(SUFFIX))
            else {
                continue;
            };
            if let Ok(d) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                dates.insert(d);
            }
        }
        Ok(dates.into_iter().rev().collect())
    }

    pub fn load(&self, date: NaiveDate) -> Result<Option<Edition>, StoreError> {
        let path = self.path_for(date);
        let s = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_json::from_str(&s)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { path, source })
    }

    pub fn summary(&self, date: NaiveDate) -> Result<Option<EditionSummary>, StoreError> {
        Ok(self.load(date)?.map(|e| EditionSummary {
            date: e.date,
            generated_at: e.generated_at,
            total_articles: e.total_articles,
            top_stories: e.articles.into_iter().take(SUMMARY_TOP).collect(),
        }))
    }

    /// Case-insensitive title search across every edition, newest first.
    /// Unreadable editions are skipped with a warning.
    pub fn search(&self, query: &str, min_score: f64) -> Result<Vec<SearchHit>, StoreError> {
        let needle = query.trim().to_lowercase();
        let mut hits = Vec::new();
        for (date, edition) in self.editions()? {
            for entry in edition.articles {
                if entry.scores.total < min_score {
                    continue;
                }
                if needle.is_empty() || entry.title.to_lowercase().contains(&needle) {
                    hits.push(SearchHit { date, entry });
                }
            }
        }
        Ok(hits)
    }

    pub fn statistics(&self) -> Result<ArchiveStats, StoreError> {
        let editions = self.editions()?;
        if editions.is_empty() {
            return Ok(ArchiveStats::default());
        }

        let mut sources: BTreeMap<String, usize> = BTreeMap::new();
        let mut tags: BTreeMap<String, usize> = BTreeMap::new();
        let mut total_articles = 0usize;
        for (_, e) in &editions {
            for entry in &e.articles {
                total_articles += 1;
                for s in &entry.sources {
                    *sources.entry(s.clone()).or_default() += 1;
                }
                for t in &entry.tags {
                    *tags.entry(t.clone()).or_default() += 1;
                }
            }
        }

        let newest = editions.first().map(|(d, _)| *d);
        let oldest = editions.last().map(|(d, _)| *d);
        Ok(ArchiveStats {
            total_editions: editions.len(),
            total_articles,
            date_range: oldest.zip(newest),
            top_sources: top_n(sources, STATS_TOP_SOURCES),
            top_tags: top_n(tags, STATS_TOP_TAGS),
        })
    }

    fn editions(&self) -> Result<Vec<(NaiveDate, Edition)>, StoreError> {
        let mut out = Vec::new();
        for date in self.list()? {
            match self.load(date) {
                Ok(Some(e)) => out.push((date, e)),
                Ok(None) => {}
                Err(e) => warn!(date = %date, error = %e, "skipping unreadable edition"),
            }
        }
        Ok(out)
    }
}

/// Highest counts first; equal counts by name.
fn top_n(counts: BTreeMap<String, usize>, n: usize) -> Vec<(String, usize)> {
    let mut v: Vec<(String, usize)> = counts.into_iter().collect();
    v.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    v.truncate(n);
    v
}
