//! Drift-adaptive online ensemble learning.
//!
//! This module holds the Adaptive Random Forest ensemble manager and the
//! pieces it is built from: per-learner evaluators, change detectors,
//! Poisson resampling streams and the base-learner state machine.
//!
//! # References
//!
//! - [Gomes et al. 2017] "Adaptive random forests for evolving data stream classification"
//! - [Oza & Russell 2001] "Online Bagging and Boosting"
//! - [Bifet & Gavalda 2007] ADWIN for adaptive windowing

pub mod config;
pub mod drift;
pub mod evaluator;
pub mod forest;
pub mod learner;
pub mod resample;
pub mod votes;

use std::collections::BTreeSet;

use crate::error::{ForestError, Result};
use crate::primitives::Matrix;

pub use config::{ArfBuilder, ArfConfig, MaxFeatures};
pub use drift::{Adwin, ChangeDetector, Ddm, DetectorConfig};
pub use evaluator::{Evaluator, PerformanceMetric};
pub use forest::AdaptiveRandomForest;
pub use learner::{BaseLearner, DetectionPolicy, LearnerState};
pub use resample::ResampleStreams;
pub use votes::{Votes, DEFAULT_LABEL};

/// Incrementally trainable classifier used as an ensemble member.
///
/// Labels are class indices. Implementations only need the single-instance
/// methods; batch helpers are provided.
///
/// # Example
///
/// ```rust,ignore
/// use adaforest::online::StreamClassifier;
///
/// for (x, y) in stream {
///     let before = model.predict(&x);
///     model.partial_fit(&x, y, 1.0)?;
/// }
/// ```
pub trait StreamClassifier: Send {
    /// Train on one instance with the given weight
    ///
    /// # Errors
    ///
    /// Returns an error if the instance does not match the model's shape.
    fn partial_fit(&mut self, x: &[f64], y: usize, weight: f64) -> Result<()>;

    /// Class votes for one instance; empty before any training
    fn votes(&self, x: &[f64]) -> Votes;

    /// Predicted label for one instance
    fn predict(&self, x: &[f64]) -> usize {
        self.votes(x).argmax().unwrap_or(DEFAULT_LABEL)
    }

    /// Untrained classifier with the same configuration
    #[must_use]
    fn new_instance(&self) -> Self
    where
        Self: Sized;

    /// Forget everything learned so far
    fn reset(&mut self);

    /// Train on a batch with per-row weights
    ///
    /// # Errors
    ///
    /// Returns an error on mismatched batch lengths or if any row fails.
    fn partial_fit_batch(&mut self, x: &Matrix<f64>, y: &[usize], weights: &[f64]) -> Result<()> {
        if y.len() != x.n_rows() {
            return Err(ForestError::dimension_mismatch("labels", x.n_rows(), y.len()));
        }
        if weights.len() != x.n_rows() {
            return Err(ForestError::dimension_mismatch(
                "weights",
                x.n_rows(),
                weights.len(),
            ));
        }
        for ((row, &label), &weight) in x.rows().zip(y).zip(weights) {
            self.partial_fit(row, label, weight)?;
        }
        Ok(())
    }

    /// Predict every row of a batch
    fn predict_batch(&self, x: &Matrix<f64>) -> Vec<usize> {
        x.rows().map(|row| self.predict(row)).collect()
    }
}

/// What a base classifier needs to know when the ensemble is initialized.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnerContext {
    /// Position of the learner in the ensemble
    pub index: usize,
    /// Feature count of the first instance seen
    pub n_features: usize,
    /// Resolved feature-subsample size
    pub max_features: usize,
    /// Indices of categorical features
    pub nominal_attributes: BTreeSet<usize>,
    /// Seed derived from the ensemble's root seed and `index`
    pub seed: u64,
}

/// Builds the base classifier of each ensemble member at lazy initialization.
pub trait ClassifierFactory: Send + Sync {
    /// Classifier type produced
    type Classifier: StreamClassifier;

    /// Build the classifier for one ensemble slot
    fn build(&self, ctx: &LearnerContext) -> Self::Classifier;
}

impl<C, F> ClassifierFactory for F
where
    C: StreamClassifier,
    F: Fn(&LearnerContext) -> C + Send + Sync,
{
    type Classifier = C;

    fn build(&self, ctx: &LearnerContext) -> C {
        self(ctx)
    }
}
