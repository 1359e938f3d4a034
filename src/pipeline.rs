// src/pipeline.rs
//! One ingestion run.
//!
//! Order:
//! 1) purge articles past retention, re-score the rest as of `now`
//! 2) fetch all sources concurrently (bounded retries per source)
//! 3) normalize → dedup/merge → score → upsert, sequentially, in source order
//! 4) reconcile stored near-duplicates
//! 5) save the store durably
//!
//! Bad records and failed sources only add to the warning count. A store that
//! cannot be written fails the run.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tracing::{info, warn};

use crate::analyze::topics::Tagger;
use crate::config::RankerConfig;
use crate::edition::{Edition, EditionArchive};
use crate::error::PipelineError;
use crate::ingest::fetch_all;
use crate::ingest::normalize::Normalizer;
use crate::ingest::retry::RetryPolicy;
use crate::ingest::types::SourceAdapter;
use crate::metrics::ensure_metrics_described;
use crate::store::{ArticleStore, TimeWindow};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub sources_ok: usize,
    pub sources_failed: Vec<String>,
    pub fetched: usize,
    pub malformed: usize,
    /// Normalized records published before the retention horizon.
    pub stale: usize,
    pub inserted: usize,
    pub merged: usize,
    pub reconciled: usize,
    pub purged: usize,
    pub stored: usize,
    /// Per-record and per-source problems; never fatal.
    pub warnings: usize,
}

#[derive(Clone, Debug)]
pub struct Pipeline {
    normalizer: Normalizer,
    policy: RetryPolicy,
    retention: chrono::Duration,
}

impl Pipeline {
    pub fn new(normalizer: Normalizer, policy: RetryPolicy, retention: chrono::Duration) -> Self {
        Self {
            normalizer,
            policy,
            retention,
        }
    }

    pub fn from_config(cfg: &RankerConfig) -> Self {
        Self::new(
            Normalizer::new(cfg.normalize.clone()),
            cfg.fetch.retry_policy(),
            cfg.store.retention(),
        )
    }

    pub async fn run(
        &self,
        store: &mut ArticleStore,
        adapters: &[Box<dyn SourceAdapter>],
        now: DateTime<Utc>,
    ) -> Result<RunReport, PipelineError> {
        ensure_metrics_described();
        let mut report = RunReport::default();

        let horizon = now - self.retention;
        report.purged = store.purge(horizon);
        store.rescore_at(now);

        let outcomes = fetch_all(adapters, &self.policy).await;

        for outcome in outcomes {
            let items = match outcome.result {
                Ok(items) => items,
                Err(_) => {
                    report.sources_failed.push(outcome.source_id);
                    report.warnings += 1;
                    continue;
                }
            };
            report.sources_ok += 1;
            report.fetched += items.len();

            for raw in items {
                let article = match self.normalizer.normalize(raw, now) {
                    Ok(a) => a,
                    Err(e) => {
                        counter!("ranker_malformed_total").increment(1);
                        warn!(source = %outcome.source_id, error = %e, "dropping malformed record");
                        report.malformed += 1;
                        report.warnings += 1;
                        continue;
                    }
                };
                if article.published_at < horizon {
                    report.stale += 1;
                    continue;
                }
                let before = store.len();
                store.upsert(article);
                if store.len() > before {
                    report.inserted += 1;
                } else {
                    report.merged += 1;
                }
            }
        }

        report.reconciled = store.reconcile();

        if let Err(e) = store.save() {
            tracing::error!(error = %e, "store write failed");
            return Err(PipelineError::StoreWriteFailure(e));
        }
        report.stored = store.len();

        gauge!("ranker_last_run_ts").set(now.timestamp() as f64);
        info!(
            sources_ok = report.sources_ok,
            sources_failed = report.sources_failed.len(),
            fetched = report.fetched,
            inserted = report.inserted,
            merged = report.merged,
            purged = report.purged,
            warnings = report.warnings,
            stored = report.stored,
            "run finished"
        );
        Ok(report)
    }
}

/// Snapshot `window`, keep the top `limit`, tag and write it as the edition
/// for `date`.
pub fn publish_edition(
    store: &ArticleStore,
    archive: &EditionArchive,
    tagger: &Tagger,
    date: NaiveDate,
    window: TimeWindow,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<PathBuf, PipelineError> {
    let ranked = store.snapshot(window);
    let edition = Edition::build(date, &ranked, tagger, limit, now);
    archive
        .write(&edition)
        .map_err(PipelineError::StoreWriteFailure)
}
