//! Instance batch primitives.
//!
//! Streams arrive as small row-major batches of feature values; one row is
//! one instance.

mod matrix;

pub use matrix::Matrix;
