//! Cross-engine result arbitration

use std::collections::BTreeMap;

use serde::Serialize;

use super::types::EngineResult;

/// Engine id reported when no engine produced usable text
pub const NO_ENGINE: &str = "none";

/// Scoring weights for choosing between engine results
///
/// `score = confidence_weight * confidence
///        + length_weight * min(chars / length_cap, 1.0)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArbitrationWeights {
    pub confidence_weight: f64,
    pub length_weight: f64,
    /// Character count at which the length term saturates
    pub length_cap: f64,
}

impl Default for ArbitrationWeights {
    fn default() -> Self {
        Self {
            confidence_weight: 0.7,
            length_weight: 0.3,
            length_cap: 100.0,
        }
    }
}

/// Outcome of arbitration over one image
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitratedResult {
    pub text: String,
    pub confidence: f64,
    pub chosen_engine_id: String,
    pub all_engine_results: BTreeMap<String, EngineResult>,
}

impl ArbitratedResult {
    pub fn has_winner(&self) -> bool {
        self.chosen_engine_id != NO_ENGINE
    }
}

/// Picks the best of several engine results
#[derive(Debug, Clone, Default)]
pub struct ResultArbitrator {
    weights: ArbitrationWeights,
}

impl ResultArbitrator {
    pub fn new(weights: ArbitrationWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ArbitrationWeights {
        &self.weights
    }

    /// Score a single result
    pub fn score(&self, result: &EngineResult) -> f64 {
        let w = &self.weights;
        let chars = result.extracted_text.chars().count() as f64;
        let length_score = if w.length_cap > 0.0 {
            (chars / w.length_cap).min(1.0)
        } else {
            1.0
        };
        w.confidence_weight * result.confidence + w.length_weight * length_score
    }

    /// Choose among results given in invocation order
    ///
    /// Results with an error or no text never win. Ties go to the earlier
    /// result. When nothing is usable the result is empty with zero
    /// confidence and `chosen_engine_id == "none"`.
    pub fn choose(&self, results: &[EngineResult]) -> ArbitratedResult {
        let all_engine_results: BTreeMap<String, EngineResult> = results
            .iter()
            .map(|r| (r.engine_id.clone(), r.clone()))
            .collect();

        let mut best: Option<(&EngineResult, f64)> = None;
        for result in results.iter().filter(|r| r.is_usable()) {
            let score = self.score(result);
            tracing::debug!("Engine {} scored {:.4}", result.engine_id, score);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((result, score)),
            }
        }

        match best {
            Some((winner, _)) => ArbitratedResult {
                text: winner.extracted_text.clone(),
                confidence: winner.confidence,
                chosen_engine_id: winner.engine_id.clone(),
                all_engine_results,
            },
            None => ArbitratedResult {
                text: String::new(),
                confidence: 0.0,
                chosen_engine_id: NO_ENGINE.to_string(),
                all_engine_results,
            },
        }
    }
}
