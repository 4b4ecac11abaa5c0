//! Property-based tests for the vector and sparse-matrix primitives.
//!
//! Run with: cargo test -p planar-constraint -- proptest

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use approx::relative_eq;
use nalgebra::DVector;
use planar_constraint::{ConstraintForceSolver, LinearOperator, SparseMatrix, Triplet, vector};
use planar_types::SolverConfig;
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_vector(len: usize) -> impl Strategy<Value = DVector<f64>> {
    prop::collection::vec(-1.0e3..1.0e3f64, len).prop_map(DVector::from_vec)
}

/// Two vectors of the same random length.
fn arb_pair() -> impl Strategy<Value = (DVector<f64>, DVector<f64>)> {
    (0usize..32).prop_flat_map(|len| (arb_vector(len), arb_vector(len)))
}

/// A random sparse matrix with its shape and a compatible vector for each product.
fn arb_sparse() -> impl Strategy<Value = (usize, usize, Vec<Triplet>, DVector<f64>, DVector<f64>)> {
    (1usize..8, 1usize..12).prop_flat_map(|(nrows, ncols)| {
        let entry = (0..nrows, 0..ncols, -10.0..10.0f64);
        (
            Just(nrows),
            Just(ncols),
            prop::collection::vec(entry, 0..24),
            arb_vector(ncols),
            arb_vector(nrows),
        )
    })
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn proptest_add_sub_round_trip((a, b) in arb_pair()) {
        let sum = vector::add(&a, &b).unwrap();
        let back = vector::sub(&sum, &b).unwrap();
        for (x, y) in back.iter().zip(a.iter()) {
            prop_assert!(relative_eq!(*x, *y, epsilon = 1e-9, max_relative = 1e-12));
        }
    }

    #[test]
    fn proptest_mismatched_lengths_fail(
        a in (0usize..16).prop_flat_map(arb_vector),
        extra in 1usize..4,
    ) {
        let b = DVector::zeros(a.len() + extra);
        prop_assert!(vector::add(&a, &b).unwrap_err().is_dimension_mismatch());
        prop_assert!(vector::sub(&a, &b).unwrap_err().is_dimension_mismatch());
        prop_assert!(vector::dot(&a, &b).unwrap_err().is_dimension_mismatch());
        prop_assert!(vector::component_mul(&a, &b).unwrap_err().is_dimension_mismatch());
    }

    #[test]
    fn proptest_dot_is_symmetric((a, b) in arb_pair()) {
        let ab = vector::dot(&a, &b).unwrap();
        let ba = vector::dot(&b, &a).unwrap();
        prop_assert!(relative_eq!(ab, ba, epsilon = 1e-9));
    }

    #[test]
    fn proptest_sparse_products_match_dense(
        (nrows, ncols, triplets, x, y) in arb_sparse()
    ) {
        let sparse = SparseMatrix::from_triplets(nrows, ncols, &triplets).unwrap();
        let dense = sparse.to_dense();

        let mx = sparse.mul_vec(&x).unwrap();
        let expected = &dense * &x;
        for (a, b) in mx.iter().zip(expected.iter()) {
            prop_assert!(relative_eq!(*a, *b, epsilon = 1e-8, max_relative = 1e-10));
        }

        let mty = sparse.mul_transpose_vec(&y).unwrap();
        let expected = dense.transpose() * &y;
        for (a, b) in mty.iter().zip(expected.iter()) {
            prop_assert!(relative_eq!(*a, *b, epsilon = 1e-8, max_relative = 1e-10));
        }
    }

    #[test]
    fn proptest_transpose_adjoint(
        (nrows, ncols, triplets, x, y) in arb_sparse()
    ) {
        // y · (M x) == (Mᵀ y) · x
        let sparse = SparseMatrix::from_triplets(nrows, ncols, &triplets).unwrap();
        let lhs = y.dot(&sparse.mul_vec(&x).unwrap());
        let rhs = sparse.mul_transpose_vec(&y).unwrap().dot(&x);
        prop_assert!(relative_eq!(lhs, rhs, epsilon = 1e-6, max_relative = 1e-9));
    }

    #[test]
    fn proptest_resize_keeps_prefix(
        v in (0usize..16).prop_flat_map(arb_vector),
        len in 0usize..24,
    ) {
        let mut resized = v.clone();
        vector::resize_zero_extend(&mut resized, len);
        prop_assert_eq!(resized.len(), len);
        for i in 0..len {
            let expected = if i < v.len() { v[i] } else { 0.0 };
            prop_assert_eq!(resized[i], expected);
        }
    }

    #[test]
    fn proptest_cg_solves_diagonally_dominant_systems(
        diag in prop::collection::vec(1.0..10.0f64, 1..12),
        b_seed in prop::collection::vec(-5.0..5.0f64, 12),
    ) {
        let n = diag.len();
        let a = nalgebra::DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                diag[i] + 1.0
            } else if i.abs_diff(j) == 1 {
                0.5
            } else {
                0.0
            }
        });
        let b = DVector::from_iterator(n, b_seed.into_iter().take(n));
        let mut x = DVector::zeros(n);

        let mut solver = ConstraintForceSolver::new(SolverConfig::stiff());
        let report = solver.solve_operator(&a, &b, &mut x).unwrap();

        prop_assert!(report.converged);
        let residual = (&b - LinearOperator::apply(&a, &x).unwrap()).norm();
        prop_assert!(residual < 1e-7);
    }
}
