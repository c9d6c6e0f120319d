//! Scoring output models.

use crate::table::Table;
use serde::{Deserialize, Serialize};

/// Relative weight of each scoring component. The four weights sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub capacity_fit: f64,
    pub location: f64,
    pub occasion: f64,
    pub size_efficiency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            capacity_fit: 0.40,
            location: 0.30,
            occasion: 0.20,
            size_efficiency: 0.10,
        }
    }
}

/// Per-component scores, each in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub capacity_fit: f64,
    pub location: f64,
    pub occasion: f64,
    pub size_efficiency: f64,
}

impl ScoreBreakdown {
    /// Weighted total in [0, 100], rounded to two decimals
    pub fn total(&self, weights: &ScoringWeights) -> f64 {
        let raw = self.capacity_fit * weights.capacity_fit
            + self.location * weights.location
            + self.occasion * weights.occasion
            + self.size_efficiency * weights.size_efficiency;
        (raw.clamp(0.0, 100.0) * 100.0).round() / 100.0
    }
}

/// A ranked candidate table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableAssignmentResult {
    pub table: Table,
    /// Weighted score in [0, 100]
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    /// Human-readable justifications, for display only
    pub reasons: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = ScoringWeights::default();
        let sum = w.capacity_fit + w.location + w.occasion + w.size_efficiency;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_is_weighted_and_rounded() {
        let breakdown = ScoreBreakdown {
            capacity_fit: 100.0,
            location: 50.0,
            occasion: 50.0,
            size_efficiency: 100.0 / 3.0,
        };
        // 40 + 15 + 10 + 3.333...
        assert_eq!(breakdown.total(&ScoringWeights::default()), 68.33);
    }

    #[test]
    fn test_total_perfect_score() {
        let breakdown = ScoreBreakdown {
            capacity_fit: 100.0,
            location: 100.0,
            occasion: 100.0,
            size_efficiency: 100.0,
        };
        assert_eq!(breakdown.total(&ScoringWeights::default()), 100.0);
    }
}
