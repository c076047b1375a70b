//! Ensemble configuration.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::drift::DetectorConfig;
use super::evaluator::PerformanceMetric;
use super::forest::AdaptiveRandomForest;
use super::learner::DetectionPolicy;
use super::ClassifierFactory;
use crate::classification::SubspaceNaiveBayesFactory;
use crate::error::{ForestError, Result};

/// How many features each base classifier may look at.
///
/// Resolved once from the feature count of the first trained instance.
///
/// # Example
///
/// ```
/// use adaforest::online::MaxFeatures;
///
/// assert_eq!(MaxFeatures::Auto.resolve(10), 3);
/// assert_eq!(MaxFeatures::Fraction(0.4).resolve(10), 4);
/// assert_eq!(MaxFeatures::Count(-3).resolve(10), 7);
/// assert_eq!(MaxFeatures::Count(15).resolve(10), 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Same as `Sqrt`
    #[default]
    Auto,
    /// round(sqrt(n))
    Sqrt,
    /// round(log2(n))
    Log2,
    /// Exact count; negative values count back from `n`
    Count(i64),
    /// round(f * n) for f in (0, 1)
    Fraction(f64),
    /// Every feature
    All,
}

impl MaxFeatures {
    /// Subsample size for `n_features` features, always in `1..=n_features`
    /// (0 only when `n_features` is 0).
    #[must_use]
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        let n_i = n_features as i64;
        let sqrt = n.sqrt().round() as i64;

        let mut size = match *self {
            Self::Auto | Self::Sqrt => sqrt,
            Self::Log2 => n.log2().round() as i64,
            Self::Count(count) => count,
            Self::Fraction(f) if f > 0.0 && f < 1.0 => (f * n).round() as i64,
            Self::Fraction(f) => {
                warn!(fraction = f, "max_features fraction outside (0, 1), using sqrt");
                sqrt
            }
            Self::All => n_i,
        };

        if size < 0 {
            size += n_i;
        }
        if size <= 0 {
            size = 1;
        }
        if size > n_i {
            size = n_i;
        }
        size as usize
    }
}

impl FromStr for MaxFeatures {
    type Err = Infallible;

    /// Parses `auto`, `sqrt`, `log2`, `all`/`none`, an integer or a
    /// fraction. Anything else falls back to `Auto`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        let parsed = match value.as_str() {
            "auto" => Self::Auto,
            "sqrt" => Self::Sqrt,
            "log2" => Self::Log2,
            "all" | "none" => Self::All,
            other => {
                if let Ok(count) = other.parse::<i64>() {
                    Self::Count(count)
                } else if let Ok(fraction) = other.parse::<f64>() {
                    Self::Fraction(fraction)
                } else {
                    warn!(value = s, "unknown max_features value, using sqrt");
                    Self::Auto
                }
            }
        };
        Ok(parsed)
    }
}

/// Configuration of an [`AdaptiveRandomForest`].
///
/// Defaults: 10 learners, `Auto` subspace, weighted vote, lambda 6,
/// ADWIN(0.001) drift detection and ADWIN(0.01) warning detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArfConfig {
    /// Number of ensemble members
    pub n_estimators: usize,
    /// Feature subsample size per member
    pub max_features: MaxFeatures,
    /// Weight each member's vote by its evaluator performance
    pub weighted_vote: bool,
    /// Mean of the Poisson resampling distribution
    pub lambda: f64,
    /// Metric used for weighted voting
    pub metric: PerformanceMetric,
    /// Drift detector prototype; `None` disables drift handling
    pub drift_detector: Option<DetectorConfig>,
    /// Warning detector prototype; `None` disables background learners
    pub warning_detector: Option<DetectorConfig>,
    /// Indices of categorical features
    pub nominal_attributes: Option<BTreeSet<usize>>,
    /// Root seed; drawn from OS entropy when absent
    pub random_state: Option<u64>,
    /// Train members on the rayon thread pool
    pub parallel: bool,
}

impl Default for ArfConfig {
    fn default() -> Self {
        Self {
            n_estimators: 10,
            max_features: MaxFeatures::Auto,
            weighted_vote: true,
            lambda: 6.0,
            metric: PerformanceMetric::Accuracy,
            drift_detector: Some(DetectorConfig::adwin(0.001)),
            warning_detector: Some(DetectorConfig::adwin(0.01)),
            nominal_attributes: None,
            random_state: None,
            parallel: false,
        }
    }
}

impl ArfConfig {
    /// Check hyperparameters.
    ///
    /// A warning detector without a drift detector is accepted but never
    /// fed; this is reported as a warning.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHyperparameter` for zero learners, a lambda that is
    /// not finite and positive, or invalid detector parameters.
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ForestError::invalid_hyperparameter(
                "n_estimators",
                self.n_estimators,
                ">= 1",
            ));
        }
        if !(self.lambda.is_finite() && self.lambda > 0.0) {
            return Err(ForestError::invalid_hyperparameter(
                "lambda",
                self.lambda,
                "finite and > 0",
            ));
        }
        if let Some(detector) = &self.drift_detector {
            detector.validate()?;
        }
        if let Some(detector) = &self.warning_detector {
            detector.validate()?;
        }
        if self.warning_detector.is_some() && self.drift_detector.is_none() {
            warn!("warning detector configured without a drift detector; it will never be fed");
        }
        Ok(())
    }

    /// Detector prototypes handed to every learner
    #[must_use]
    pub fn detection_policy(&self) -> DetectionPolicy {
        DetectionPolicy::new(self.drift_detector, self.warning_detector)
    }

    /// Parse and validate a JSON configuration. Missing fields take their
    /// default values.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` for malformed JSON and the errors of
    /// [`ArfConfig::validate`].
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builder for [`AdaptiveRandomForest`]
#[derive(Debug, Clone, Default)]
pub struct ArfBuilder {
    config: ArfConfig,
}

impl ArfBuilder {
    /// Create a builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of ensemble members
    #[must_use]
    pub fn n_estimators(mut self, n: usize) -> Self {
        self.config.n_estimators = n;
        self
    }

    /// Set feature subsample policy
    #[must_use]
    pub fn max_features(mut self, max_features: MaxFeatures) -> Self {
        self.config.max_features = max_features;
        self
    }

    /// Enable/disable performance-weighted voting
    #[must_use]
    pub fn weighted_vote(mut self, enable: bool) -> Self {
        self.config.weighted_vote = enable;
        self
    }

    /// Set Poisson resampling mean
    #[must_use]
    pub fn lambda(mut self, lambda: f64) -> Self {
        self.config.lambda = lambda;
        self
    }

    /// Set voting metric
    #[must_use]
    pub fn metric(mut self, metric: PerformanceMetric) -> Self {
        self.config.metric = metric;
        self
    }

    /// Set drift detector prototype (`None` disables drift handling)
    #[must_use]
    pub fn drift_detector(mut self, detector: Option<DetectorConfig>) -> Self {
        self.config.drift_detector = detector;
        self
    }

    /// Set warning detector prototype (`None` disables background learners)
    #[must_use]
    pub fn warning_detector(mut self, detector: Option<DetectorConfig>) -> Self {
        self.config.warning_detector = detector;
        self
    }

    /// Mark features as categorical
    #[must_use]
    pub fn nominal_attributes(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.config.nominal_attributes = Some(indices.into_iter().collect());
        self
    }

    /// Set root seed
    #[must_use]
    pub fn random_state(mut self, seed: u64) -> Self {
        self.config.random_state = Some(seed);
        self
    }

    /// Draw the root seed once from `rng`
    #[must_use]
    pub fn random_state_from_rng<R: RngCore + ?Sized>(mut self, rng: &mut R) -> Self {
        self.config.random_state = Some(rng.next_u64());
        self
    }

    /// Enable/disable parallel member training
    #[must_use]
    pub fn parallel(mut self, enable: bool) -> Self {
        self.config.parallel = enable;
        self
    }

    /// Finish with a validated configuration
    ///
    /// # Errors
    ///
    /// See [`ArfConfig::validate`].
    pub fn build_config(self) -> Result<ArfConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build a forest of [`SubspaceNaiveBayes`](crate::classification::SubspaceNaiveBayes) members
    ///
    /// # Errors
    ///
    /// See [`ArfConfig::validate`].
    pub fn build(self) -> Result<AdaptiveRandomForest<SubspaceNaiveBayesFactory>> {
        AdaptiveRandomForest::new(self.config)
    }

    /// Build a forest whose members come from `factory`
    ///
    /// # Errors
    ///
    /// See [`ArfConfig::validate`].
    pub fn build_with_factory<F: ClassifierFactory>(
        self,
        factory: F,
    ) -> Result<AdaptiveRandomForest<F>> {
        AdaptiveRandomForest::with_factory(self.config, factory)
    }
}
