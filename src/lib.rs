// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod config;
pub mod edition;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod source_weights;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::analyze::{Scorer, ScoringConfig};
pub use crate::config::RankerConfig;
pub use crate::error::{IngestError, PipelineError, SourceError, StoreError};
pub use crate::ingest::normalize::Normalizer;
pub use crate::ingest::retry::RetryPolicy;
pub use crate::ingest::types::{PublishedAt, RawArticle, SourceAdapter};
pub use crate::model::{Article, Scores};
pub use crate::pipeline::{Pipeline, RunReport};
pub use crate::store::{ArticleStore, TimeWindow};

/// Scorer wired from a loaded config.
pub fn scorer_from_config(cfg: &RankerConfig) -> Scorer {
    Scorer::new(
        cfg.scoring.clone(),
        cfg.authority.clone(),
        cfg.store.retention(),
    )
}

/// Open the configured store as the single writer.
pub fn open_store(cfg: &RankerConfig) -> Result<ArticleStore, StoreError> {
    ArticleStore::open(&cfg.store.path, scorer_from_config(cfg), cfg.dedup.clone())
}
