//! Adaforest: drift-adaptive random forests for streaming classification.
//!
//! The ensemble learns from one instance at a time, never stores the
//! stream, and replaces members whose error rate drifts. Each member is
//! trained on a Poisson-resampled copy of the stream (online bagging),
//! watches its own errors with a warning and a drift detector, grows a
//! background replacement on warning and swaps it in on drift.
//!
//! # Quick Start
//!
//! ```
//! use adaforest::prelude::*;
//!
//! let mut forest = ArfBuilder::new()
//!     .n_estimators(5)
//!     .random_state(7)
//!     .build()
//!     .expect("valid configuration");
//!
//! let x = Matrix::from_rows(&[
//!     vec![0.0, 0.2, 0.1],
//!     vec![3.0, 3.1, 2.9],
//! ])
//! .expect("rows have equal length");
//! let y = [0, 1];
//!
//! for _ in 0..25 {
//!     forest.partial_fit(&x, &y, None).expect("shapes match");
//! }
//! assert_eq!(forest.predict(&x), vec![0, 1]);
//! assert!(forest.score(&x, &y).expect("non-empty batch") > 0.99);
//! ```
//!
//! # Modules
//!
//! - [`online`]: the ensemble manager, base learners, change detectors,
//!   evaluators and resampling streams
//! - [`classification`]: incremental base classifiers
//! - [`primitives`]: the instance batch [`Matrix`]
//! - [`error`]: [`ForestError`] and [`Result`]
//!
//! # Degraded input
//!
//! Prediction never fails: an ensemble with no votes (for instance before
//! any training) answers [`online::DEFAULT_LABEL`]. An unknown feature
//! subsample policy falls back to the square root of the feature count.
//! Batch shape mismatches and invalid hyperparameters are errors.
//!
//! # Logging
//!
//! The crate emits [`tracing`] events and installs no subscriber:
//! `info` when the ensemble is initialized, `debug` on every warning,
//! drift, promotion and in-place reset, `warn` for suspicious
//! configuration.

pub mod classification;
pub mod error;
/// Drift-adaptive online ensemble learning
pub mod online;
pub mod prelude;
pub mod primitives;

pub use error::{ForestError, Result};
pub use primitives::Matrix;
