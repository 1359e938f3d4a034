//! Sub-score weights for the total rank score.
//!
//! Config shape (`[scoring.weights]`):
//! ```toml
//! impact = 0.35
//! virality = 0.50
//! controversy = 0.15
//! ```
//!
//! Loaded once with the rest of the config; the three weights must sum to 1 so
//! the total stays in `[0, 100]`.

use serde::{Deserialize, Serialize};

const SUM_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub impact: f64,
    pub virality: f64,
    pub controversy: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            impact: 0.35,
            virality: 0.50,
            controversy: 0.15,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.impact + self.virality + self.controversy
    }

    /// Each weight in `[0, 1]`, sum equal to 1 within a small tolerance.
    pub fn validate(&self) -> Result<(), String> {
        for (name, w) in [
            ("impact", self.impact),
            ("virality", self.virality),
            ("controversy", self.controversy),
        ] {
            if !w.is_finite() || !(0.0..=1.0).contains(&w) {
                return Err(format!("weight `{name}` must be within [0, 1], got {w}"));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(format!("score weights must sum to 1, got {sum}"));
        }
        Ok(())
    }

    pub fn combine(&self, impact: f64, virality: f64, controversy: f64) -> f64 {
        self.impact * impact + self.virality * virality + self.controversy * controversy
    }
}
