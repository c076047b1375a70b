//! Base learner: one ensemble member and its drift/warning state machine.
//!
//! A learner is `Active` until its warning detector fires, at which point a
//! background learner starts training in parallel (`Shadowing`). When the
//! drift detector fires the learner is reset: the background learner is
//! promoted if there is one, otherwise the classifier is reset in place.

use tracing::debug;

use super::drift::{ChangeDetector, DetectorConfig};
use super::evaluator::{Evaluator, PerformanceMetric};
use super::votes::Votes;
use super::StreamClassifier;
use crate::error::Result;

/// Which detectors a learner runs. `None` disables that path for the
/// learner's whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DetectionPolicy {
    /// Drift detector prototype
    pub drift: Option<DetectorConfig>,
    /// Warning detector prototype
    pub warning: Option<DetectorConfig>,
}

impl DetectionPolicy {
    /// Policy with the given drift and warning prototypes
    #[must_use]
    pub fn new(drift: Option<DetectorConfig>, warning: Option<DetectorConfig>) -> Self {
        Self { drift, warning }
    }

    /// No drift and no warning detection
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }
}

/// Coarse state of a learner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnerState {
    /// No background learner
    Active,
    /// A background learner is training in parallel
    Shadowing,
}

/// One ensemble member.
#[derive(Debug)]
pub struct BaseLearner<C> {
    index: usize,
    classifier: C,
    created_on: u64,
    is_background: bool,
    evaluator: Evaluator,
    metric: PerformanceMetric,
    policy: DetectionPolicy,
    drift_detector: Option<Box<dyn ChangeDetector>>,
    warning_detector: Option<Box<dyn ChangeDetector>>,
    last_drift_on: u64,
    last_warning_on: u64,
    drift_count: u64,
    warning_count: u64,
    background: Option<Box<BaseLearner<C>>>,
}

impl<C: StreamClassifier> BaseLearner<C> {
    /// Create a foreground learner
    ///
    /// # Arguments
    /// * `index` - Position in the ensemble
    /// * `classifier` - Untrained base classifier
    /// * `instances_seen` - Ensemble instance counter at creation
    /// * `metric` - Metric of the learner's evaluator
    /// * `policy` - Detector prototypes
    #[must_use]
    pub fn new(
        index: usize,
        classifier: C,
        instances_seen: u64,
        metric: PerformanceMetric,
        policy: DetectionPolicy,
    ) -> Self {
        Self::build(index, classifier, instances_seen, metric, policy, false)
    }

    fn build(
        index: usize,
        classifier: C,
        instances_seen: u64,
        metric: PerformanceMetric,
        policy: DetectionPolicy,
        is_background: bool,
    ) -> Self {
        Self {
            index,
            classifier,
            created_on: instances_seen,
            is_background,
            evaluator: Evaluator::new(metric),
            metric,
            policy,
            drift_detector: policy.drift.as_ref().map(DetectorConfig::build),
            warning_detector: policy.warning.as_ref().map(DetectorConfig::build),
            last_drift_on: 0,
            last_warning_on: 0,
            drift_count: 0,
            warning_count: 0,
            background: None,
        }
    }

    /// Train on one instance and run the detectors.
    ///
    /// The background learner (if any) is trained with weight 1. Detectors
    /// are fed only when a drift detector is configured and this learner is
    /// not itself a background learner.
    ///
    /// # Errors
    ///
    /// Propagates classifier training errors.
    pub fn partial_fit(
        &mut self,
        x: &[f64],
        y: usize,
        weight: f64,
        instances_seen: u64,
    ) -> Result<()> {
        self.classifier.partial_fit(x, y, weight)?;

        if let Some(background) = self.background.as_mut() {
            background.classifier.partial_fit(x, y, 1.0)?;
        }

        if self.is_background || self.drift_detector.is_none() {
            return Ok(());
        }

        let error = self.classifier.predict(x) != y;

        let warning_fired = match self.warning_detector.as_mut() {
            Some(detector) => {
                detector.add_element(error);
                detector.detected_change()
            }
            None => false,
        };
        if warning_fired {
            self.start_background(instances_seen);
        }

        let drift_fired = match self.drift_detector.as_mut() {
            Some(detector) => {
                detector.add_element(error);
                detector.detected_change()
            }
            None => false,
        };
        if drift_fired {
            self.last_drift_on = instances_seen;
            self.drift_count += 1;
            debug!(
                learner = self.index,
                instances_seen,
                drifts = self.drift_count,
                "drift detected"
            );
            self.reset(instances_seen);
        }

        Ok(())
    }

    fn start_background(&mut self, instances_seen: u64) {
        self.last_warning_on = instances_seen;
        self.warning_count += 1;
        debug!(
            learner = self.index,
            instances_seen,
            replaced = self.background.is_some(),
            "warning detected, starting background learner"
        );

        let classifier = self.classifier.new_instance();
        self.background = Some(Box::new(Self::build(
            self.index,
            classifier,
            instances_seen,
            self.metric,
            self.policy,
            true,
        )));

        if let Some(detector) = self.warning_detector.as_mut() {
            detector.reset();
        }
    }

    /// Replace this learner after a drift.
    ///
    /// Promotes the background learner's classifier, detectors and creation
    /// time if one exists; otherwise resets the classifier and drift
    /// detector in place. The evaluator is refreshed in both cases.
    pub fn reset(&mut self, instances_seen: u64) {
        match self.background.take() {
            Some(background) => {
                let BaseLearner {
                    classifier,
                    created_on,
                    drift_detector,
                    warning_detector,
                    ..
                } = *background;
                self.classifier = classifier;
                self.created_on = created_on;
                self.drift_detector = drift_detector;
                self.warning_detector = warning_detector;
                debug!(learner = self.index, created_on, "background learner promoted");
            }
            None => {
                self.classifier.reset();
                self.created_on = instances_seen;
                if let Some(detector) = self.drift_detector.as_mut() {
                    detector.reset();
                }
                debug!(learner = self.index, instances_seen, "learner reset in place");
            }
        }
        self.evaluator = Evaluator::new(self.metric);
    }

    /// Predicted label of the active classifier
    pub fn predict(&self, x: &[f64]) -> usize {
        self.classifier.predict(x)
    }

    /// Votes of the active classifier
    pub fn votes(&self, x: &[f64]) -> Votes {
        self.classifier.votes(x)
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> LearnerState {
        if self.background.is_some() {
            LearnerState::Shadowing
        } else {
            LearnerState::Active
        }
    }
}

impl<C> BaseLearner<C> {
    /// Position in the ensemble
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Active classifier
    #[must_use]
    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Instance counter when the active classifier started training
    #[must_use]
    pub fn created_on(&self) -> u64 {
        self.created_on
    }

    /// Whether this is a background (shadow) learner
    #[must_use]
    pub fn is_background(&self) -> bool {
        self.is_background
    }

    /// Performance evaluator
    #[must_use]
    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Mutable performance evaluator
    pub fn evaluator_mut(&mut self) -> &mut Evaluator {
        &mut self.evaluator
    }

    /// Pending background learner
    #[must_use]
    pub fn background(&self) -> Option<&BaseLearner<C>> {
        self.background.as_deref()
    }

    /// Whether a drift detector is configured
    #[must_use]
    pub fn has_drift_detector(&self) -> bool {
        self.drift_detector.is_some()
    }

    /// Whether a warning detector is configured
    #[must_use]
    pub fn has_warning_detector(&self) -> bool {
        self.warning_detector.is_some()
    }

    /// Drift detector, if configured
    #[must_use]
    pub fn drift_detector(&self) -> Option<&dyn ChangeDetector> {
        self.drift_detector.as_deref()
    }

    /// Warning detector, if configured
    #[must_use]
    pub fn warning_detector(&self) -> Option<&dyn ChangeDetector> {
        self.warning_detector.as_deref()
    }

    /// Instance counter of the last drift (0 if none)
    #[must_use]
    pub fn last_drift_on(&self) -> u64 {
        self.last_drift_on
    }

    /// Instance counter of the last warning (0 if none)
    #[must_use]
    pub fn last_warning_on(&self) -> u64 {
        self.last_warning_on
    }

    /// Number of drifts detected
    #[must_use]
    pub fn drift_count(&self) -> u64 {
        self.drift_count
    }

    /// Number of warnings detected
    #[must_use]
    pub fn warning_count(&self) -> u64 {
        self.warning_count
    }
}

#[cfg(test)]
#[path = "learner_tests.rs"]
mod tests;
