//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use adaforest::prelude::*;
//! ```

pub use crate::classification::{SubspaceNaiveBayes, SubspaceNaiveBayesFactory};
pub use crate::error::{ForestError, Result};
pub use crate::online::{
    AdaptiveRandomForest, ArfBuilder, ArfConfig, ChangeDetector, ClassifierFactory,
    DetectorConfig, LearnerContext, MaxFeatures, PerformanceMetric, StreamClassifier, Votes,
    DEFAULT_LABEL,
};
pub use crate::primitives::Matrix;
