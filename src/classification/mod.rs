//! Incremental base classifiers for the streaming ensemble.
//!
//! [`SubspaceNaiveBayes`] is a naive Bayes model trained one weighted
//! instance at a time and restricted to a random subset of the features.
//! Each ensemble member draws its own subset, which gives the forest the
//! random-subspace diversity of ARF without inducing trees.
//!
//! # Example
//!
//! ```
//! use adaforest::classification::SubspaceNaiveBayes;
//! use adaforest::online::StreamClassifier;
//!
//! let mut model = SubspaceNaiveBayes::new(2, 2, 42);
//! for _ in 0..10 {
//!     model.partial_fit(&[0.0, 0.0], 0, 1.0).expect("two features");
//!     model.partial_fit(&[4.0, 4.0], 1, 1.0).expect("two features");
//! }
//! assert_eq!(model.predict(&[0.2, -0.1]), 0);
//! assert_eq!(model.predict(&[3.9, 4.3]), 1);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{ForestError, Result};
use crate::online::resample::mix_seed;
use crate::online::{ClassifierFactory, LearnerContext, StreamClassifier, Votes};

/// Variance floor for Gaussian likelihoods
const MIN_VARIANCE: f64 = 1e-12;

/// Weighted running mean and variance (West's incremental update).
#[derive(Debug, Clone, Default)]
struct GaussianEstimator {
    weight: f64,
    mean: f64,
    m2: f64,
}

impl GaussianEstimator {
    fn update(&mut self, value: f64, weight: f64) {
        self.weight += weight;
        let delta = value - self.mean;
        self.mean += delta * weight / self.weight;
        self.m2 += weight * delta * (value - self.mean);
    }

    fn log_likelihood(&self, value: f64, var_smoothing: f64) -> f64 {
        let variance = (self.m2 / self.weight + var_smoothing).max(MIN_VARIANCE);
        let diff = value - self.mean;
        -0.5 * (2.0 * std::f64::consts::PI * variance).ln() - diff * diff / (2.0 * variance)
    }
}

/// Weighted value counts of a categorical feature.
#[derive(Debug, Clone, Default)]
struct NominalEstimator {
    counts: BTreeMap<i64, f64>,
    total: f64,
}

impl NominalEstimator {
    fn update(&mut self, value: f64, weight: f64) {
        *self.counts.entry(value.round() as i64).or_insert(0.0) += weight;
        self.total += weight;
    }

    /// Laplace-smoothed; one extra slot is reserved for unseen values
    fn log_likelihood(&self, value: f64) -> f64 {
        let count = self.counts.get(&(value.round() as i64)).copied().unwrap_or(0.0);
        let n_values = self.counts.len() as f64 + 1.0;
        ((count + 1.0) / (self.total + n_values)).ln()
    }
}

#[derive(Debug, Clone)]
enum FeatureEstimator {
    Numeric(GaussianEstimator),
    Nominal(NominalEstimator),
}

/// Per-class statistics over the subspace features.
#[derive(Debug, Clone)]
struct ClassStats {
    weight: f64,
    features: Vec<FeatureEstimator>,
}

impl ClassStats {
    fn new(subspace: &[usize], nominal: &BTreeSet<usize>) -> Self {
        let features = subspace
            .iter()
            .map(|feature| {
                if nominal.contains(feature) {
                    FeatureEstimator::Nominal(NominalEstimator::default())
                } else {
                    FeatureEstimator::Numeric(GaussianEstimator::default())
                }
            })
            .collect();
        Self {
            weight: 0.0,
            features,
        }
    }
}

/// Incremental naive Bayes over a random feature subspace.
///
/// Numeric features use a weighted Gaussian per class; features marked as
/// nominal use Laplace-smoothed frequency tables. Votes are the class
/// posteriors scaled by the total training weight, so a model that has seen
/// more data speaks louder before the ensemble normalizes it.
#[derive(Debug, Clone)]
pub struct SubspaceNaiveBayes {
    n_features: usize,
    max_features: usize,
    seed: u64,
    generation: u64,
    nominal_attributes: BTreeSet<usize>,
    var_smoothing: f64,
    subspace: Vec<usize>,
    classes: BTreeMap<usize, ClassStats>,
}

impl SubspaceNaiveBayes {
    /// Creates an untrained model looking at `max_features` of
    /// `n_features` features, chosen from `seed`.
    #[must_use]
    pub fn new(n_features: usize, max_features: usize, seed: u64) -> Self {
        let mut model = Self {
            n_features,
            max_features: max_features.min(n_features),
            seed,
            generation: 0,
            nominal_attributes: BTreeSet::new(),
            var_smoothing: 1e-9,
            subspace: Vec::new(),
            classes: BTreeMap::new(),
        };
        model.draw_subspace();
        model
    }

    /// Marks features as categorical.
    ///
    /// Values of categorical features are rounded to the nearest integer.
    #[must_use]
    pub fn with_nominal_attributes(mut self, nominal: BTreeSet<usize>) -> Self {
        self.nominal_attributes = nominal;
        self.classes.clear();
        self
    }

    /// Sets the value added to every Gaussian variance.
    #[must_use]
    pub fn with_var_smoothing(mut self, var_smoothing: f64) -> Self {
        self.var_smoothing = var_smoothing;
        self
    }

    /// Sorted indices of the features this model looks at
    #[must_use]
    pub fn subspace(&self) -> &[usize] {
        &self.subspace
    }

    /// Number of classes seen so far
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Training weight seen for `label`
    #[must_use]
    pub fn class_weight(&self, label: usize) -> f64 {
        self.classes.get(&label).map_or(0.0, |stats| stats.weight)
    }

    /// Total training weight
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.classes.values().map(|stats| stats.weight).sum()
    }

    /// Number of subspace draws since construction
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn draw_subspace(&mut self) {
        let mut rng = StdRng::seed_from_u64(mix_seed(self.seed, self.generation));
        let mut subspace =
            rand::seq::index::sample(&mut rng, self.n_features, self.max_features).into_vec();
        subspace.sort_unstable();
        self.subspace = subspace;
    }

    fn log_posteriors(&self, x: &[f64]) -> Vec<(usize, f64)> {
        let total = self.total_weight();
        self.classes
            .iter()
            .map(|(&label, stats)| {
                let mut log_prob = (stats.weight / total).ln();
                for (&feature, estimator) in self.subspace.iter().zip(&stats.features) {
                    let Some(&value) = x.get(feature) else {
                        continue;
                    };
                    if !value.is_finite() {
                        continue;
                    }
                    log_prob += match estimator {
                        FeatureEstimator::Numeric(gaussian) => {
                            gaussian.log_likelihood(value, self.var_smoothing)
                        }
                        FeatureEstimator::Nominal(counts) => counts.log_likelihood(value),
                    };
                }
                (label, log_prob)
            })
            .collect()
    }
}

impl StreamClassifier for SubspaceNaiveBayes {
    /// Non-positive weights are ignored.
    fn partial_fit(&mut self, x: &[f64], y: usize, weight: f64) -> Result<()> {
        if x.len() != self.n_features {
            return Err(ForestError::dimension_mismatch(
                "features",
                self.n_features,
                x.len(),
            ));
        }
        if weight <= 0.0 {
            return Ok(());
        }

        let subspace = &self.subspace;
        let nominal = &self.nominal_attributes;
        let stats = self
            .classes
            .entry(y)
            .or_insert_with(|| ClassStats::new(subspace, nominal));
        stats.weight += weight;
        for (&feature, estimator) in subspace.iter().zip(stats.features.iter_mut()) {
            let value = x[feature];
            if !value.is_finite() {
                continue;
            }
            match estimator {
                FeatureEstimator::Numeric(gaussian) => gaussian.update(value, weight),
                FeatureEstimator::Nominal(counts) => counts.update(value, weight),
            }
        }
        Ok(())
    }

    fn votes(&self, x: &[f64]) -> Votes {
        if self.classes.is_empty() {
            return Votes::new();
        }
        let log_posteriors = self.log_posteriors(x);
        let max_log = log_posteriors
            .iter()
            .map(|&(_, log_prob)| log_prob)
            .fold(f64::NEG_INFINITY, f64::max);
        if !max_log.is_finite() {
            return Votes::new();
        }

        let mut votes: Votes = log_posteriors
            .into_iter()
            .map(|(label, log_prob)| (label, (log_prob - max_log).exp()))
            .collect();
        votes.normalize();
        votes.scale(self.total_weight());
        votes
    }

    fn new_instance(&self) -> Self {
        let mut model = Self {
            classes: BTreeMap::new(),
            generation: self.generation + 1,
            subspace: Vec::new(),
            ..self.clone()
        };
        model.draw_subspace();
        model
    }

    fn reset(&mut self) {
        self.classes.clear();
        self.generation += 1;
        self.draw_subspace();
    }
}

/// Builds a [`SubspaceNaiveBayes`] for every ensemble slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubspaceNaiveBayesFactory {
    var_smoothing: f64,
}

impl SubspaceNaiveBayesFactory {
    /// Factory with the default variance smoothing
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the variance smoothing handed to every model
    #[must_use]
    pub fn with_var_smoothing(mut self, var_smoothing: f64) -> Self {
        self.var_smoothing = var_smoothing;
        self
    }
}

impl Default for SubspaceNaiveBayesFactory {
    fn default() -> Self {
        Self { var_smoothing: 1e-9 }
    }
}

impl ClassifierFactory for SubspaceNaiveBayesFactory {
    type Classifier = SubspaceNaiveBayes;

    fn build(&self, ctx: &LearnerContext) -> SubspaceNaiveBayes {
        SubspaceNaiveBayes::new(ctx.n_features, ctx.max_features, ctx.seed)
            .with_nominal_attributes(ctx.nominal_attributes.clone())
            .with_var_smoothing(self.var_smoothing)
    }
}
