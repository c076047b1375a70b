//! Per-learner performance tracking used for weighted voting.

use serde::{Deserialize, Serialize};

/// Metric a learner's [`Evaluator`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceMetric {
    /// Weighted count of correct predictions, scaled by 100.
    ///
    /// Not divided by the number of instances seen, so learners that have
    /// been alive longer carry more weight than younger, possibly more
    /// accurate ones.
    #[default]
    Accuracy,
}

/// Running aggregate of weighted-correct predictions for one learner.
///
/// # Example
///
/// ```
/// use adaforest::online::Evaluator;
///
/// let mut eval = Evaluator::default();
/// eval.update(1, 1, 2.0);
/// eval.update(0, 1, 1.0);
/// assert!((eval.performance() - 200.0).abs() < 1e-9);
/// assert!((eval.normalized_accuracy() - 2.0 / 3.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluator {
    metric: PerformanceMetric,
    aggregation: f64,
    weight_seen: f64,
}

impl Evaluator {
    /// Scale applied to the aggregate by [`PerformanceMetric::Accuracy`]
    pub const ACCURACY_SCALE: f64 = 100.0;

    /// Create a blank evaluator for `metric`
    #[must_use]
    pub fn new(metric: PerformanceMetric) -> Self {
        Self {
            metric,
            aggregation: 0.0,
            weight_seen: 0.0,
        }
    }

    /// Record one prediction. Non-positive weights are ignored.
    pub fn update(&mut self, predicted: usize, actual: usize, weight: f64) {
        if weight > 0.0 {
            self.weight_seen += weight;
            if predicted == actual {
                self.aggregation += weight;
            }
        }
    }

    /// Performance scalar used to weight this learner's votes
    #[must_use]
    pub fn performance(&self) -> f64 {
        match self.metric {
            PerformanceMetric::Accuracy => self.aggregation * Self::ACCURACY_SCALE,
        }
    }

    /// Weighted-correct over weight seen, in [0, 1]; 0.0 before any update
    #[must_use]
    pub fn normalized_accuracy(&self) -> f64 {
        if self.weight_seen > 0.0 {
            self.aggregation / self.weight_seen
        } else {
            0.0
        }
    }

    /// Raw weighted-correct aggregate
    #[must_use]
    pub fn aggregation(&self) -> f64 {
        self.aggregation
    }

    /// Total positive weight passed to [`Evaluator::update`]
    #[must_use]
    pub fn weight_seen(&self) -> f64 {
        self.weight_seen
    }

    /// Configured metric
    #[must_use]
    pub fn metric(&self) -> PerformanceMetric {
        self.metric
    }

    /// Zero the aggregate and the weight counter
    pub fn reset(&mut self) {
        self.aggregation = 0.0;
        self.weight_seen = 0.0;
    }
}
