//! Coordinate-list sparse matrices for constraint Jacobians.
//!
//! A constraint row touches at most two bodies, so `J` and `J̇` carry at most
//! six non-zeros per row regardless of how many bodies exist.
//!
//! # Sparsity Pattern
//!
//! For a system with N bodies and R constraint rows:
//! - Rows: R (one per scalar constraint)
//! - Columns: 3 * N (x, y, θ per body)
//!
//! Entries are appended row by row during assembly. Duplicate `(row, col)`
//! entries are summed by the products.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CooMatrix;
use planar_types::{Result, SimError};

/// A single `(row, column, value)` non-zero.
pub type Triplet = (usize, usize, f64);

/// Sparse matrix in coordinate (COO) format.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    coo: CooMatrix<f64>,
}

impl SparseMatrix {
    /// Create an empty matrix with the given shape.
    #[must_use]
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            coo: CooMatrix::new(nrows, ncols),
        }
    }

    /// Build a matrix from triplets.
    ///
    /// Exact zeros are skipped. Fails on the first entry outside the shape.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[Triplet]) -> Result<Self> {
        let mut matrix = Self::new(nrows, ncols);
        for &(row, col, value) in triplets {
            matrix.push(row, col, value)?;
        }
        Ok(matrix)
    }

    /// Append one entry.
    pub fn push(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        if row >= self.nrows() || col >= self.ncols() {
            return Err(SimError::IndexOutOfBounds {
                row,
                col,
                nrows: self.nrows(),
                ncols: self.ncols(),
            });
        }
        if value != 0.0 {
            self.coo.push(row, col, value);
        }
        Ok(())
    }

    /// Append a batch of entries.
    pub fn extend(&mut self, triplets: &[Triplet]) -> Result<()> {
        for &(row, col, value) in triplets {
            self.push(row, col, value)?;
        }
        Ok(())
    }

    /// Get the number of rows.
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.coo.nrows()
    }

    /// Get the number of columns.
    #[must_use]
    pub fn ncols(&self) -> usize {
        self.coo.ncols()
    }

    /// Get the number of stored entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.coo.nnz()
    }

    /// Iterate over the stored entries in insertion order.
    pub fn triplets(&self) -> impl Iterator<Item = Triplet> + '_ {
        self.coo.triplet_iter().map(|(row, col, &value)| (row, col, value))
    }

    /// Compute `M * v`.
    pub fn mul_vec(&self, v: &DVector<f64>) -> Result<DVector<f64>> {
        if v.len() != self.ncols() {
            return Err(SimError::dimension_mismatch(
                "mul_vec",
                self.ncols(),
                v.len(),
            ));
        }

        let mut result = DVector::zeros(self.nrows());
        for (row, col, &value) in self.coo.triplet_iter() {
            result[row] += value * v[col];
        }
        Ok(result)
    }

    /// Compute `Mᵀ * v` without forming the transpose.
    pub fn mul_transpose_vec(&self, v: &DVector<f64>) -> Result<DVector<f64>> {
        if v.len() != self.nrows() {
            return Err(SimError::dimension_mismatch(
                "mul_transpose_vec",
                self.nrows(),
                v.len(),
            ));
        }

        let mut result = DVector::zeros(self.ncols());
        for (row, col, &value) in self.coo.triplet_iter() {
            result[col] += value * v[row];
        }
        Ok(result)
    }

    /// Convert to a dense matrix (for testing or small systems).
    #[must_use]
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.nrows(), self.ncols());
        for (row, col, &value) in self.coo.triplet_iter() {
            dense[(row, col)] += value;
        }
        dense
    }

    /// Get the underlying COO matrix.
    #[must_use]
    pub const fn coo(&self) -> &CooMatrix<f64> {
        &self.coo
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sparse_creation() {
        let triplets = vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 2, 4.0)];
        let matrix = SparseMatrix::from_triplets(2, 3, &triplets).unwrap();

        assert_eq!(matrix.nrows(), 2);
        assert_eq!(matrix.ncols(), 3);
        assert_eq!(matrix.nnz(), 4);
        assert_eq!(matrix.triplets().collect::<Vec<_>>(), triplets);
    }

    #[test]
    fn test_zeros_skipped() {
        let matrix = SparseMatrix::from_triplets(2, 2, &[(0, 0, 0.0), (1, 1, 5.0)]).unwrap();
        assert_eq!(matrix.nnz(), 1);
    }

    #[test]
    fn test_out_of_bounds_push() {
        let mut matrix = SparseMatrix::new(2, 3);
        let err = matrix.push(2, 0, 1.0).unwrap_err();
        assert_eq!(
            err,
            SimError::IndexOutOfBounds {
                row: 2,
                col: 0,
                nrows: 2,
                ncols: 3
            }
        );
        assert!(matrix.push(0, 3, 1.0).is_err());
        assert_eq!(matrix.nnz(), 0);
    }

    #[test]
    fn test_sparse_mul_vec() {
        let triplets = vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 1, 4.0)];
        let matrix = SparseMatrix::from_triplets(2, 2, &triplets).unwrap();
        let v = DVector::from_vec(vec![1.0, 2.0]);

        let result = matrix.mul_vec(&v).unwrap();

        // [1 2] [1]   [5]
        // [3 4] [2] = [11]
        assert_relative_eq!(result[0], 5.0, epsilon = 1e-10);
        assert_relative_eq!(result[1], 11.0, epsilon = 1e-10);
    }

    #[test]
    fn test_sparse_transpose_mul() {
        let triplets = vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 1, 4.0)];
        let matrix = SparseMatrix::from_triplets(2, 2, &triplets).unwrap();
        let v = DVector::from_vec(vec![1.0, 2.0]);

        let result = matrix.mul_transpose_vec(&v).unwrap();

        // [1 3] [1]   [7]
        // [2 4] [2] = [10]
        assert_relative_eq!(result[0], 7.0, epsilon = 1e-10);
        assert_relative_eq!(result[1], 10.0, epsilon = 1e-10);
    }

    #[test]
    fn test_product_dimension_checks() {
        let matrix = SparseMatrix::new(2, 3);
        assert!(
            matrix
                .mul_vec(&DVector::zeros(2))
                .unwrap_err()
                .is_dimension_mismatch()
        );
        assert!(matrix.mul_vec(&DVector::zeros(3)).is_ok());
        assert!(matrix.mul_transpose_vec(&DVector::zeros(3)).is_err());
        assert!(matrix.mul_transpose_vec(&DVector::zeros(2)).is_ok());
    }

    #[test]
    fn test_duplicates_accumulate() {
        let matrix = SparseMatrix::from_triplets(1, 1, &[(0, 0, 1.5), (0, 0, 2.5)]).unwrap();
        assert_relative_eq!(matrix.to_dense()[(0, 0)], 4.0);
        assert_relative_eq!(matrix.mul_vec(&DVector::from_element(1, 2.0)).unwrap()[0], 8.0);
    }

    #[test]
    fn test_to_dense() {
        let matrix = SparseMatrix::from_triplets(2, 3, &[(0, 2, 1.0), (1, 0, -2.0)]).unwrap();
        let dense = matrix.to_dense();
        assert_eq!(dense.nrows(), 2);
        assert_eq!(dense.ncols(), 3);
        assert_eq!(dense[(0, 2)], 1.0);
        assert_eq!(dense[(1, 0)], -2.0);
        assert_eq!(dense[(0, 0)], 0.0);
    }
}
