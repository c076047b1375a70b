//! Matrix type for batches of stream instances.

use serde::{Deserialize, Serialize};

/// A 2D matrix of feature values (row-major storage, one instance per row).
///
/// # Examples
///
/// ```
/// use adaforest::primitives::Matrix;
///
/// let m = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("data length matches rows * cols");
/// assert_eq!(m.shape(), (2, 3));
/// assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T: Copy> Matrix<T> {
    /// Creates a new matrix from a vector of data.
    ///
    /// # Errors
    ///
    /// Returns an error if data length doesn't match rows * cols.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, &'static str> {
        if data.len() != rows * cols {
            return Err("Data length must equal rows * cols");
        }
        Ok(Self { data, rows, cols })
    }

    /// Creates a matrix from a slice of equally sized rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows have different lengths.
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self, &'static str> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err("All rows must have the same length");
        }
        let data: Vec<T> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Ok(Self {
            data,
            rows: rows.len(),
            cols,
        })
    }

    /// Creates a single-row matrix holding one instance.
    #[must_use]
    pub fn from_instance(instance: &[T]) -> Self {
        Self {
            data: instance.to_vec(),
            rows: 1,
            cols: instance.len(),
        }
    }

    /// Returns the shape as (rows, cols).
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.cols
    }

    /// Gets element at (row, col).
    ///
    /// # Panics
    ///
    /// Panics if indices are out of bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.cols + col]
    }

    /// Returns a row as a slice.
    ///
    /// # Panics
    ///
    /// Panics if `row_idx` is out of bounds.
    #[must_use]
    pub fn row(&self, row_idx: usize) -> &[T] {
        let start = row_idx * self.cols;
        &self.data[start..start + self.cols]
    }

    /// Iterates over the rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        (0..self.rows).map(move |i| self.row(i))
    }

    /// Returns the underlying data as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

#[cfg(test)]
#[path = "matrix_tests.rs"]
mod tests;
