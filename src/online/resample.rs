//! Online bagging: per-learner Poisson resampling streams.
//!
//! Every ensemble member owns an independent generator derived from the root
//! seed and its index. A member draws exactly once per trained instance, so
//! the draw sequence of one member never depends on how many members exist
//! or in which order (or on which thread) they are visited.
//!
//! # References
//!
//! - [Oza & Russell 2001] "Online Bagging and Boosting"

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Poisson};

use crate::error::{ForestError, Result};

/// SplitMix64 finalizer
#[must_use]
pub(crate) fn mix_seed(seed: u64, salt: u64) -> u64 {
    let mut z = seed.wrapping_add(salt.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Salt separating resampling seeds from classifier seeds
const RESAMPLE_DOMAIN: u64 = 0x5EED_0001;
/// Salt for seeds handed to base classifiers
const CLASSIFIER_DOMAIN: u64 = 0x5EED_0002;

/// Seed handed to the base classifier of learner `index`
#[must_use]
pub(crate) fn classifier_seed(root_seed: u64, index: usize) -> u64 {
    mix_seed(mix_seed(root_seed, CLASSIFIER_DOMAIN), index as u64)
}

/// One Poisson sub-stream per ensemble member.
#[derive(Debug, Clone)]
pub struct ResampleStreams {
    root_seed: u64,
    poisson: Poisson<f64>,
    streams: Vec<StdRng>,
}

impl ResampleStreams {
    /// Create `n_streams` sub-streams drawing from `Poisson(lambda)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHyperparameter` if `lambda` is not finite and positive.
    pub fn new(root_seed: u64, lambda: f64, n_streams: usize) -> Result<Self> {
        if !(lambda.is_finite() && lambda > 0.0) {
            return Err(ForestError::invalid_hyperparameter(
                "lambda",
                lambda,
                "finite and > 0",
            ));
        }
        let poisson = Poisson::new(lambda)
            .map_err(|_| ForestError::invalid_hyperparameter("lambda", lambda, "finite and > 0"))?;
        let mut streams = Self {
            root_seed,
            poisson,
            streams: Vec::with_capacity(n_streams),
        };
        streams.reseed(n_streams);
        Ok(streams)
    }

    /// Root seed every sub-stream derives from
    #[must_use]
    pub fn root_seed(&self) -> u64 {
        self.root_seed
    }

    /// Number of sub-streams
    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// True if there are no sub-streams
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Rebuild all sub-streams from the root seed
    pub fn reseed(&mut self, n_streams: usize) {
        let base = mix_seed(self.root_seed, RESAMPLE_DOMAIN);
        self.streams = (0..n_streams)
            .map(|index| StdRng::seed_from_u64(mix_seed(base, index as u64)))
            .collect();
    }

    /// Draw the next multiplicity for member `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn draw(&mut self, index: usize) -> u64 {
        sample(&self.poisson, &mut self.streams[index])
    }

    /// Borrow every sub-stream mutably, paired with the shared distribution
    pub(crate) fn split_mut(&mut self) -> (&Poisson<f64>, &mut [StdRng]) {
        (&self.poisson, &mut self.streams)
    }
}

/// Draw one multiplicity from `rng`
pub(crate) fn sample(poisson: &Poisson<f64>, rng: &mut StdRng) -> u64 {
    // Poisson samples are non-negative integers carried as f64
    poisson.sample(rng) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_lambda_rejected() {
        assert!(ResampleStreams::new(1, 0.0, 3).is_err());
        assert!(ResampleStreams::new(1, -1.0, 3).is_err());
        assert!(ResampleStreams::new(1, f64::NAN, 3).is_err());
        assert!(ResampleStreams::new(1, f64::INFINITY, 3).is_err());
    }

    #[test]
    fn test_same_seed_same_draws() {
        let mut a = ResampleStreams::new(42, 6.0, 4).expect("valid lambda");
        let mut b = ResampleStreams::new(42, 6.0, 4).expect("valid lambda");
        for _ in 0..50 {
            for i in 0..4 {
                assert_eq!(a.draw(i), b.draw(i));
            }
        }
    }

    #[test]
    fn test_streams_independent_of_visit_order() {
        let mut forward = ResampleStreams::new(7, 6.0, 3).expect("valid lambda");
        let mut backward = ResampleStreams::new(7, 6.0, 3).expect("valid lambda");

        let mut fwd = vec![Vec::new(); 3];
        let mut bwd = vec![Vec::new(); 3];
        for _ in 0..20 {
            for i in 0..3 {
                fwd[i].push(forward.draw(i));
            }
            for i in (0..3).rev() {
                bwd[i].push(backward.draw(i));
            }
        }
        assert_eq!(fwd, bwd);
    }

    #[test]
    fn test_member_stream_independent_of_ensemble_size() {
        let mut small = ResampleStreams::new(9, 6.0, 2).expect("valid lambda");
        let mut large = ResampleStreams::new(9, 6.0, 10).expect("valid lambda");
        for _ in 0..20 {
            assert_eq!(small.draw(1), large.draw(1));
        }
    }

    #[test]
    fn test_reseed_restarts_sequence() {
        let mut streams = ResampleStreams::new(3, 6.0, 2).expect("valid lambda");
        let first: Vec<u64> = (0..10).map(|_| streams.draw(0)).collect();
        streams.reseed(2);
        let again: Vec<u64> = (0..10).map(|_| streams.draw(0)).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn test_mean_close_to_lambda() {
        let mut streams = ResampleStreams::new(11, 6.0, 1).expect("valid lambda");
        let n = 5000;
        let sum: u64 = (0..n).map(|_| streams.draw(0)).sum();
        let mean = sum as f64 / n as f64;
        assert!((mean - 6.0).abs() < 0.3, "mean={mean}");
    }

    #[test]
    fn test_mix_seed_spreads_indices() {
        assert_ne!(mix_seed(0, 0), mix_seed(0, 1));
        assert_ne!(classifier_seed(5, 0), classifier_seed(5, 1));
        assert_ne!(classifier_seed(5, 0), mix_seed(mix_seed(5, RESAMPLE_DOMAIN), 0));
    }
}
