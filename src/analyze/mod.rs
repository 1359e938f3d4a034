// src/analyze/mod.rs
//! Story analysis: dedup, scoring and topic tags.

pub mod dedup;
pub mod scoring;
pub mod topics;
pub mod weights;

pub use dedup::{is_same_story, merge, merge_retroactive, DedupConfig};
pub use scoring::{compare_rank, rank, Scorer, ScoringConfig};
pub use topics::{Tagger, TopicRule};
pub use weights::ScoreWeights;
