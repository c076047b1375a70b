//! Adaptive Random Forest ensemble manager.
//!
//! Each arriving instance is first used to evaluate every member (prediction
//! before training), then handed to each member `k ~ Poisson(lambda)` times
//! as a single weighted update. Members detect drift on their own error
//! stream and replace themselves; see [`BaseLearner`].
//!
//! # Example
//!
//! ```
//! use adaforest::online::ArfBuilder;
//! use adaforest::primitives::Matrix;
//!
//! let mut forest = ArfBuilder::new()
//!     .n_estimators(3)
//!     .random_state(42)
//!     .build()
//!     .expect("valid configuration");
//!
//! let x = Matrix::from_rows(&[vec![0.0, 0.1], vec![5.0, 5.1]]).expect("equal rows");
//! for _ in 0..20 {
//!     forest.partial_fit(&x, &[0, 1], None).expect("shapes match");
//! }
//! assert_eq!(forest.predict(&x), vec![0, 1]);
//! ```

use std::fmt;

use rand::rngs::StdRng;
use rayon::prelude::*;
use rand_distr::Poisson;
use tracing::info;

use super::config::ArfConfig;
use super::learner::BaseLearner;
use super::resample::{self, ResampleStreams};
use super::votes::{Votes, DEFAULT_LABEL};
use super::{ClassifierFactory, LearnerContext, StreamClassifier};
use crate::classification::SubspaceNaiveBayesFactory;
use crate::error::{ForestError, Result};
use crate::primitives::Matrix;

/// Drift-adaptive online bagging ensemble.
pub struct AdaptiveRandomForest<F: ClassifierFactory> {
    config: ArfConfig,
    factory: F,
    learners: Vec<BaseLearner<F::Classifier>>,
    streams: ResampleStreams,
    n_features: Option<usize>,
    max_features: Option<usize>,
    instances_seen: u64,
    train_weight_seen: f64,
}

impl AdaptiveRandomForest<SubspaceNaiveBayesFactory> {
    /// Create a forest of naive Bayes subspace members.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHyperparameter` if the configuration is invalid.
    pub fn new(config: ArfConfig) -> Result<Self> {
        Self::with_factory(config, SubspaceNaiveBayesFactory::default())
    }
}

impl<F: ClassifierFactory> AdaptiveRandomForest<F> {
    /// Create a forest whose members are built by `factory` at the first
    /// trained instance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHyperparameter` if the configuration is invalid.
    pub fn with_factory(config: ArfConfig, factory: F) -> Result<Self> {
        config.validate()?;
        let root_seed = config.random_state.unwrap_or_else(rand::random);
        let streams = ResampleStreams::new(root_seed, config.lambda, config.n_estimators)?;
        Ok(Self {
            config,
            factory,
            learners: Vec::new(),
            streams,
            n_features: None,
            max_features: None,
            instances_seen: 0,
            train_weight_seen: 0.0,
        })
    }

    /// Train on a batch.
    ///
    /// `weights` may be `None` (1.0 each), a single weight applied to every
    /// row, or one weight per row. Rows with weight 0 are skipped.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the labels or weights don't match the
    /// row count, or if the feature count differs from the one the ensemble
    /// was initialized with. Returns `InvalidHyperparameter` for negative or
    /// non-finite weights. Nothing is trained when an error is returned
    /// before the first row.
    pub fn partial_fit(
        &mut self,
        x: &Matrix<f64>,
        y: &[usize],
        weights: Option<&[f64]>,
    ) -> Result<()> {
        let n_rows = x.n_rows();
        if y.len() != n_rows {
            return Err(ForestError::dimension_mismatch("labels", n_rows, y.len()));
        }
        let weights = row_weights(weights, n_rows)?;
        if n_rows > 0 {
            self.check_features(x.n_cols())?;
        }

        for ((row, &label), &weight) in x.rows().zip(y).zip(&weights) {
            if weight == 0.0 {
                continue;
            }
            self.instances_seen += 1;
            self.train_weight_seen += weight;
            self.train_instance(row, label, weight)?;
        }
        Ok(())
    }

    /// Train on a single instance.
    ///
    /// # Errors
    ///
    /// See [`AdaptiveRandomForest::partial_fit`].
    pub fn partial_fit_instance(&mut self, x: &[f64], y: usize, weight: f64) -> Result<()> {
        check_weight(weight)?;
        self.check_features(x.len())?;
        if weight == 0.0 {
            return Ok(());
        }
        self.instances_seen += 1;
        self.train_weight_seen += weight;
        self.train_instance(x, y, weight)
    }

    fn check_features(&self, n_features: usize) -> Result<()> {
        match self.n_features {
            Some(expected) if expected != n_features => Err(ForestError::dimension_mismatch(
                "features",
                expected,
                n_features,
            )),
            None if n_features == 0 => Err(ForestError::empty_input("instance has no features")),
            _ => Ok(()),
        }
    }

    fn train_instance(&mut self, x: &[f64], y: usize, weight: f64) -> Result<()> {
        if self.learners.is_empty() {
            self.init_ensemble(x.len());
        }

        let instances_seen = self.instances_seen;
        let (poisson, streams) = self.streams.split_mut();
        if self.config.parallel {
            self.learners
                .par_iter_mut()
                .zip(streams.par_iter_mut())
                .try_for_each(|(learner, rng)| {
                    train_learner(learner, rng, poisson, x, y, weight, instances_seen)
                })
        } else {
            self.learners
                .iter_mut()
                .zip(streams.iter_mut())
                .try_for_each(|(learner, rng)| {
                    train_learner(learner, rng, poisson, x, y, weight, instances_seen)
                })
        }
    }

    fn init_ensemble(&mut self, n_features: usize) {
        let max_features = self.config.max_features.resolve(n_features);
        let nominal_attributes = self.config.nominal_attributes.clone().unwrap_or_default();
        let policy = self.config.detection_policy();
        let root_seed = self.streams.root_seed();

        let learners: Vec<_> = (0..self.config.n_estimators)
            .map(|index| {
                let ctx = LearnerContext {
                    index,
                    n_features,
                    max_features,
                    nominal_attributes: nominal_attributes.clone(),
                    seed: resample::classifier_seed(root_seed, index),
                };
                BaseLearner::new(
                    index,
                    self.factory.build(&ctx),
                    self.instances_seen,
                    self.config.metric,
                    policy,
                )
            })
            .collect();

        info!(
            n_estimators = learners.len(),
            n_features,
            max_features,
            parallel = self.config.parallel,
            "initialized adaptive random forest"
        );

        self.learners = learners;
        self.n_features = Some(n_features);
        self.max_features = Some(max_features);
    }

    /// Combined votes of all members for one instance.
    ///
    /// Members with no votes are skipped. Each member's votes are
    /// normalized to sum 1 and, with weighted voting, scaled by its
    /// evaluator performance before being summed.
    #[must_use]
    pub fn get_votes_for_instance(&self, x: &[f64]) -> Votes {
        let mut combined = Votes::new();
        for learner in &self.learners {
            let mut votes = learner.votes(x);
            if votes.is_empty() || votes.total() <= 0.0 {
                continue;
            }
            votes.normalize();
            if self.config.weighted_vote {
                votes.scale(learner.evaluator().performance());
            }
            combined.merge(&votes);
        }
        combined
    }

    /// Predicted label for one instance; [`DEFAULT_LABEL`] when no member
    /// has voted.
    #[must_use]
    pub fn predict_instance(&self, x: &[f64]) -> usize {
        self.get_votes_for_instance(x)
            .argmax()
            .unwrap_or(DEFAULT_LABEL)
    }

    /// Predicted label for every row
    #[must_use]
    pub fn predict(&self, x: &Matrix<f64>) -> Vec<usize> {
        x.rows().map(|row| self.predict_instance(row)).collect()
    }

    /// Combined votes of every row normalized to sum 1 (empty when no
    /// member has voted)
    #[must_use]
    pub fn predict_proba(&self, x: &Matrix<f64>) -> Vec<Votes> {
        x.rows()
            .map(|row| {
                let mut votes = self.get_votes_for_instance(row);
                votes.normalize();
                votes
            })
            .collect()
    }

    /// Fraction of rows predicted correctly.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `y` doesn't match the row count, or
    /// `EmptyInput` for an empty batch.
    pub fn score(&self, x: &Matrix<f64>, y: &[usize]) -> Result<f64> {
        if y.len() != x.n_rows() {
            return Err(ForestError::dimension_mismatch("labels", x.n_rows(), y.len()));
        }
        if y.is_empty() {
            return Err(ForestError::empty_input("cannot score an empty batch"));
        }
        let correct = self
            .predict(x)
            .iter()
            .zip(y)
            .filter(|(predicted, actual)| predicted == actual)
            .count();
        Ok(correct as f64 / y.len() as f64)
    }

    /// Drop every member and counter.
    ///
    /// The resampling streams restart from the root seed, so retraining on
    /// the same stream reproduces the same model.
    pub fn reset(&mut self) {
        self.learners.clear();
        self.n_features = None;
        self.max_features = None;
        self.instances_seen = 0;
        self.train_weight_seen = 0.0;
        self.streams.reseed(self.config.n_estimators);
    }

    /// Ensemble members (empty before the first trained instance)
    #[must_use]
    pub fn learners(&self) -> &[BaseLearner<F::Classifier>] {
        &self.learners
    }

    /// Number of trained instances (zero-weight rows excluded)
    #[must_use]
    pub fn instances_seen(&self) -> u64 {
        self.instances_seen
    }

    /// Sum of the weights of trained instances
    #[must_use]
    pub fn train_weight_seen(&self) -> f64 {
        self.train_weight_seen
    }

    /// Resolved feature subsample size
    #[must_use]
    pub fn max_features(&self) -> Option<usize> {
        self.max_features
    }

    /// Feature count fixed at initialization
    #[must_use]
    pub fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    /// Root seed of the resampling streams
    #[must_use]
    pub fn root_seed(&self) -> u64 {
        self.streams.root_seed()
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &ArfConfig {
        &self.config
    }

    /// Drifts detected across all current members
    #[must_use]
    pub fn total_drifts(&self) -> u64 {
        self.learners.iter().map(BaseLearner::drift_count).sum()
    }

    /// Warnings detected across all current members
    #[must_use]
    pub fn total_warnings(&self) -> u64 {
        self.learners.iter().map(BaseLearner::warning_count).sum()
    }
}

impl<F: ClassifierFactory> fmt::Debug for AdaptiveRandomForest<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveRandomForest")
            .field("config", &self.config)
            .field("n_learners", &self.learners.len())
            .field("n_features", &self.n_features)
            .field("max_features", &self.max_features)
            .field("instances_seen", &self.instances_seen)
            .field("train_weight_seen", &self.train_weight_seen)
            .finish_non_exhaustive()
    }
}

/// Evaluate, draw and train one member on one instance.
fn train_learner<C: StreamClassifier>(
    learner: &mut BaseLearner<C>,
    rng: &mut StdRng,
    poisson: &Poisson<f64>,
    x: &[f64],
    y: usize,
    weight: f64,
    instances_seen: u64,
) -> Result<()> {
    let prediction = learner.predict(x);
    learner.evaluator_mut().update(prediction, y, weight);

    let k = resample::sample(poisson, rng);
    if k > 0 {
        learner.partial_fit(x, y, k as f64, instances_seen)?;
    }
    Ok(())
}

fn check_weight(weight: f64) -> Result<()> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(())
    } else {
        Err(ForestError::invalid_hyperparameter(
            "weight",
            weight,
            "finite and >= 0",
        ))
    }
}

/// Expand the optional weight argument to one weight per row
fn row_weights(weights: Option<&[f64]>, n_rows: usize) -> Result<Vec<f64>> {
    let expanded = match weights {
        None => vec![1.0; n_rows],
        Some(&[single]) => vec![single; n_rows],
        Some(per_row) if per_row.len() == n_rows => per_row.to_vec(),
        Some(other) => {
            return Err(ForestError::dimension_mismatch(
                "weights",
                n_rows,
                other.len(),
            ))
        }
    };
    expanded.iter().copied().try_for_each(check_weight)?;
    Ok(expanded)
}

#[cfg(test)]
#[path = "forest_tests.rs"]
mod tests;
