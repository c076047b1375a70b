//! Change detectors over a stream of prediction errors.
//!
//! Each base learner owns up to two detectors: a sensitive one that raises a
//! warning (and starts a background learner) and a conservative one that
//! confirms drift (and resets or promotes). Both consume the same error bit.
//!
//! # References
//!
//! - [Bifet & Gavalda 2007] "Learning from Time-Changing Data with Adaptive Windowing"
//! - [Gama et al. 2004] "Learning with Drift Detection"

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{ForestError, Result};

/// Monitor over a binary stream (`true` = error, `false` = correct).
pub trait ChangeDetector: std::fmt::Debug + Send {
    /// Feed one error bit
    fn add_element(&mut self, error: bool);

    /// Whether the most recent element triggered a change
    fn detected_change(&self) -> bool;

    /// Forget all statistics
    fn reset(&mut self);

    /// Elements seen since the last reset
    fn n_seen(&self) -> u64;
}

/// Detector prototype. Every learner builds its own fresh detector from it.
///
/// # Example
///
/// ```
/// use adaforest::online::drift::{ChangeDetector, DetectorConfig};
///
/// let config = DetectorConfig::adwin(0.001);
/// let mut detector = config.build();
/// detector.add_element(false);
/// assert!(!detector.detected_change());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectorConfig {
    /// Adaptive windowing
    Adwin {
        /// Confidence parameter in (0, 1); smaller is less sensitive
        delta: f64,
        /// Elements between two window scans
        clock: u32,
    },
    /// Drift Detection Method
    Ddm {
        /// Elements before any detection is attempted
        min_samples: usize,
        /// Standard deviations above the minimum for the warning zone
        warning_level: f64,
        /// Standard deviations above the minimum for a change
        drift_level: f64,
    },
}

impl DetectorConfig {
    /// ADWIN with the given delta and the default clock (32)
    #[must_use]
    pub fn adwin(delta: f64) -> Self {
        Self::Adwin {
            delta,
            clock: Adwin::DEFAULT_CLOCK,
        }
    }

    /// DDM with the usual 30 / 2.0 / 3.0 parameters
    #[must_use]
    pub fn ddm() -> Self {
        Self::Ddm {
            min_samples: Ddm::DEFAULT_MIN_SAMPLES,
            warning_level: 2.0,
            drift_level: 3.0,
        }
    }

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHyperparameter` for a delta outside (0, 1), a zero
    /// clock, or DDM levels that are not `0 < warning <= drift`.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Adwin { delta, clock } => {
                if !(delta > 0.0 && delta < 1.0) {
                    return Err(ForestError::invalid_hyperparameter(
                        "adwin.delta",
                        delta,
                        "in (0, 1)",
                    ));
                }
                if clock == 0 {
                    return Err(ForestError::invalid_hyperparameter(
                        "adwin.clock",
                        clock,
                        ">= 1",
                    ));
                }
            }
            Self::Ddm {
                warning_level,
                drift_level,
                ..
            } => {
                if !(warning_level > 0.0 && drift_level >= warning_level) {
                    return Err(ForestError::invalid_hyperparameter(
                        "ddm.levels",
                        format!("warning={warning_level}, drift={drift_level}"),
                        "0 < warning_level <= drift_level",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Build a fresh detector
    #[must_use]
    pub fn build(&self) -> Box<dyn ChangeDetector> {
        match *self {
            Self::Adwin { delta, clock } => Box::new(Adwin::with_clock(delta, clock)),
            Self::Ddm {
                min_samples,
                warning_level,
                drift_level,
            } => Box::new(Ddm::with_levels(min_samples, warning_level, drift_level)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    total: f64,
    count: usize,
}

/// ADWIN (ADaptive WINdowing) drift detector.
///
/// Keeps a window of recent error bits compressed into an exponential
/// histogram. Row `i` holds buckets of `2^i` elements, oldest at the front;
/// every bucket in row `i + 1` is older than every bucket in row `i`.
/// Every `clock` elements the window is scanned for a split into an older and
/// a newer part whose means differ by more than the Bernstein bound; each such
/// cut drops the oldest bucket.
#[derive(Debug, Clone)]
pub struct Adwin {
    delta: f64,
    clock: u32,
    max_buckets: usize,
    min_window: usize,
    rows: Vec<VecDeque<Bucket>>,
    total: f64,
    width: usize,
    ticks: u64,
    n_seen: u64,
    change: bool,
}

impl Adwin {
    /// Default scan interval
    pub const DEFAULT_CLOCK: u32 = 32;

    /// Create ADWIN with custom confidence parameter and the default clock
    #[must_use]
    pub fn new(delta: f64) -> Self {
        Self::with_clock(delta, Self::DEFAULT_CLOCK)
    }

    /// Create ADWIN with custom confidence parameter and scan interval
    #[must_use]
    pub fn with_clock(delta: f64, clock: u32) -> Self {
        Self {
            delta,
            clock: clock.max(1),
            max_buckets: 5,
            min_window: 5,
            rows: vec![VecDeque::new()],
            total: 0.0,
            width: 0,
            ticks: 0,
            n_seen: 0,
            change: false,
        }
    }

    /// Current window length
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Error rate over the current window
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.width == 0 {
            0.0
        } else {
            self.total / self.width as f64
        }
    }

    fn insert_element(&mut self, value: f64) {
        self.rows[0].push_back(Bucket {
            total: value,
            count: 1,
        });
        self.total += value;
        self.width += 1;
        self.compress_buckets();
    }

    fn compress_buckets(&mut self) {
        let mut row = 0;
        while row < self.rows.len() && self.rows[row].len() > self.max_buckets {
            if let (Some(b1), Some(b2)) = (self.rows[row].pop_front(), self.rows[row].pop_front()) {
                if row + 1 == self.rows.len() {
                    self.rows.push(VecDeque::new());
                }
                self.rows[row + 1].push_back(Bucket {
                    total: b1.total + b2.total,
                    count: b1.count + b2.count,
                });
            }
            row += 1;
        }
    }

    fn delete_oldest(&mut self) {
        for row in (0..self.rows.len()).rev() {
            if let Some(bucket) = self.rows[row].pop_front() {
                self.total -= bucket.total;
                self.width -= bucket.count;
                return;
            }
        }
    }

    fn bernstein_cut(&self, n0: usize, n1: usize, mean0: f64, mean1: f64, variance: f64) -> bool {
        let slack = self.min_window as f64 - 1.0;
        let m = 1.0 / (n0 as f64 - slack) + 1.0 / (n1 as f64 - slack);
        let dd = (2.0 * (self.width as f64).ln() / self.delta).ln();
        let epsilon = (2.0 * m * variance * dd).sqrt() + 2.0 / 3.0 * dd * m;
        (mean0 - mean1).abs() > epsilon
    }

    fn find_cut(&self) -> bool {
        let n = self.width as f64;
        let p = self.total / n;
        let variance = p * (1.0 - p);

        let mut n0 = 0usize;
        let mut u0 = 0.0f64;
        for row in self.rows.iter().rev() {
            for bucket in row {
                n0 += bucket.count;
                u0 += bucket.total;
                let n1 = self.width - n0;
                if n1 == 0 {
                    return false;
                }
                if n0 > self.min_window && n1 > self.min_window {
                    let mean0 = u0 / n0 as f64;
                    let mean1 = (self.total - u0) / n1 as f64;
                    if self.bernstein_cut(n0, n1, mean0, mean1, variance) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

impl ChangeDetector for Adwin {
    fn add_element(&mut self, error: bool) {
        self.insert_element(if error { 1.0 } else { 0.0 });
        self.n_seen += 1;
        self.ticks += 1;
        self.change = false;

        if self.ticks % u64::from(self.clock) != 0 {
            return;
        }
        while self.width > 2 * self.min_window && self.find_cut() {
            self.delete_oldest();
            self.change = true;
        }
    }

    fn detected_change(&self) -> bool {
        self.change
    }

    fn reset(&mut self) {
        self.rows = vec![VecDeque::new()];
        self.total = 0.0;
        self.width = 0;
        self.ticks = 0;
        self.n_seen = 0;
        self.change = false;
    }

    fn n_seen(&self) -> u64 {
        self.n_seen
    }
}

/// Drift Detection Method (DDM).
///
/// Tracks the running error rate `p` and its deviation
/// `s = sqrt(p(1-p)/n)`; a change fires when `p + s` exceeds the best
/// `p_min + drift_level * s_min` seen so far. The detector restarts on the
/// element after a change.
#[derive(Debug, Clone)]
pub struct Ddm {
    min_samples: usize,
    warning_level: f64,
    drift_level: f64,
    n: u64,
    p: f64,
    s: f64,
    min_p: f64,
    min_s: f64,
    min_ps: f64,
    warning: bool,
    change: bool,
}

impl Ddm {
    /// Default minimum number of elements before detection
    pub const DEFAULT_MIN_SAMPLES: usize = 30;

    /// Create DDM with default levels
    #[must_use]
    pub fn new() -> Self {
        Self::with_levels(Self::DEFAULT_MIN_SAMPLES, 2.0, 3.0)
    }

    /// Create DDM with custom minimum sample count and levels
    #[must_use]
    pub fn with_levels(min_samples: usize, warning_level: f64, drift_level: f64) -> Self {
        Self {
            min_samples,
            warning_level,
            drift_level,
            n: 0,
            p: 0.0,
            s: 0.0,
            min_p: f64::MAX,
            min_s: f64::MAX,
            min_ps: f64::MAX,
            warning: false,
            change: false,
        }
    }

    /// Whether the last element fell into the warning zone
    #[must_use]
    pub fn in_warning_zone(&self) -> bool {
        self.warning
    }

    /// Current running error rate
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        self.p
    }
}

impl Default for Ddm {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeDetector for Ddm {
    fn add_element(&mut self, error: bool) {
        if self.change {
            self.reset();
        }

        self.n += 1;
        let bit = if error { 1.0 } else { 0.0 };
        self.p += (bit - self.p) / self.n as f64;
        self.s = (self.p * (1.0 - self.p) / self.n as f64).sqrt();
        self.warning = false;

        if self.n < self.min_samples as u64 {
            return;
        }

        if self.p + self.s <= self.min_ps {
            self.min_p = self.p;
            self.min_s = self.s;
            self.min_ps = self.p + self.s;
        }

        if self.p + self.s > self.min_p + self.drift_level * self.min_s {
            self.change = true;
        } else if self.p + self.s > self.min_p + self.warning_level * self.min_s {
            self.warning = true;
        }
    }

    fn detected_change(&self) -> bool {
        self.change
    }

    fn reset(&mut self) {
        *self = Self::with_levels(self.min_samples, self.warning_level, self.drift_level);
    }

    fn n_seen(&self) -> u64 {
        self.n
    }
}

#[cfg(test)]
#[path = "drift_tests.rs"]
mod tests;
