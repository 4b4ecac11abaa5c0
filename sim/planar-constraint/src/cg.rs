//! Conjugate Gradient solver for the multiplier system.
//!
//! Solves `A·λ = b` where `A = J·W·Jᵀ` is symmetric positive semi-definite
//! and only available as a matrix-vector product through [`LinearOperator`].
//!
//! # Algorithm
//!
//! ```text
//! 1. r_0 = b - A * λ_0, return if r_0 · r_0 < ε²
//! 2. budget = extended if r_0 · r_0 > 1, else default
//! 3. p_0 = r_0
//! 4. For k = 0, 1, 2, ... < budget:
//!    α_k = (r_k · r_k) / (p_k · A * p_k)
//!    λ_{k+1} = λ_k + α_k * p_k
//!    r_{k+1} = b - A * λ_{k+1}
//!    stop if r_{k+1} · r_{k+1} < ε²
//!    β_k = (r_{k+1} · r_{k+1}) / (r_k · r_k)
//!    p_{k+1} = r_{k+1} + β_k * p_k
//! ```
//!
//! The residual is recomputed from scratch every iteration instead of being
//! updated incrementally. This costs one extra operator application per
//! iteration and keeps the residual from drifting over long sessions.
//!
//! # Warm Starting
//!
//! [`ConstraintForceSolver::solve`] seeds λ with the multipliers kept by the
//! [`ConstraintManager`], so a system that changed little since the previous
//! substep often converges in a handful of iterations.
//!
//! Non-convergence is never an error. The report says so, the residual is
//! added to the accumulated error, and a warning is logged.

use nalgebra::{DMatrix, DVector};
use planar_types::{Result, SimError, SolverConfig};
use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::manager::ConstraintManager;

/// A square operator known only through its action on vectors.
pub trait LinearOperator {
    /// Dimension of the (square) operator.
    fn dim(&self) -> usize;

    /// Compute `A * x`.
    fn apply(&self, x: &DVector<f64>) -> Result<DVector<f64>>;
}

impl LinearOperator for DMatrix<f64> {
    fn dim(&self) -> usize {
        self.nrows()
    }

    fn apply(&self, x: &DVector<f64>) -> Result<DVector<f64>> {
        if !self.is_square() {
            return Err(SimError::dimension_mismatch(
                "operator shape",
                self.nrows(),
                self.ncols(),
            ));
        }
        if x.len() != self.ncols() {
            return Err(SimError::dimension_mismatch(
                "operator apply",
                self.ncols(),
                x.len(),
            ));
        }
        Ok(self * x)
    }
}

/// Outcome of one solve.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolveReport {
    /// Number of CG iterations used.
    pub iterations: usize,
    /// `‖b - A·λ₀‖` before iterating.
    pub initial_residual: f64,
    /// `‖b - A·λ‖` at exit.
    pub residual: f64,
    /// Whether the residual fell below the tolerance.
    pub converged: bool,
    /// Whether the extended iteration budget was used.
    pub extended_budget: bool,
}

impl SolveReport {
    /// Report for an empty system.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            iterations: 0,
            initial_residual: 0.0,
            residual: 0.0,
            converged: true,
            extended_budget: false,
        }
    }

    /// Final over initial residual.
    #[must_use]
    pub fn convergence_ratio(&self) -> f64 {
        if self.initial_residual > 1e-15 {
            self.residual / self.initial_residual
        } else {
            0.0
        }
    }
}

/// Conjugate Gradient solver for Lagrange multipliers.
#[derive(Debug, Clone, Default)]
pub struct ConstraintForceSolver {
    config: SolverConfig,
    accumulated_error: f64,
    unconverged_solves: usize,
    last_report: Option<SolveReport>,
}

impl ConstraintForceSolver {
    /// Create a new solver with the given configuration.
    #[must_use]
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Replace the configuration. Accumulated diagnostics are kept.
    pub fn set_config(&mut self, config: SolverConfig) {
        self.config = config;
    }

    /// Sum of final residual norms over every solve so far.
    #[must_use]
    pub const fn accumulated_error(&self) -> f64 {
        self.accumulated_error
    }

    /// Number of solves that hit their iteration budget.
    #[must_use]
    pub const fn unconverged_solves(&self) -> usize {
        self.unconverged_solves
    }

    /// Report of the most recent solve.
    #[must_use]
    pub const fn last_report(&self) -> Option<&SolveReport> {
        self.last_report.as_ref()
    }

    /// Clear the accumulated diagnostics.
    pub fn reset_stats(&mut self) {
        self.accumulated_error = 0.0;
        self.unconverged_solves = 0;
        self.last_report = None;
    }

    /// Solve for the manager's multipliers in place.
    ///
    /// With warm starting the previous multipliers seed the iteration;
    /// otherwise it starts from zero.
    pub fn solve(&mut self, manager: &mut ConstraintManager) -> Result<SolveReport> {
        let mut lambda = if self.config.warm_starting {
            manager.lambda().clone()
        } else {
            DVector::zeros(manager.lambda().len())
        };
        let report = self.solve_operator(&*manager, manager.rhs(), &mut lambda)?;
        manager.set_lambda(lambda)?;
        Ok(report)
    }

    /// Solve `op * x = b`, starting from and overwriting `x`.
    ///
    /// # Errors
    ///
    /// Returns a dimension error if `b` or `x` disagree with `op.dim()`.
    pub fn solve_operator<A>(
        &mut self,
        op: &A,
        b: &DVector<f64>,
        x: &mut DVector<f64>,
    ) -> Result<SolveReport>
    where
        A: LinearOperator + ?Sized,
    {
        let n = op.dim();
        if b.len() != n {
            return Err(SimError::dimension_mismatch("solve rhs", n, b.len()));
        }
        if x.len() != n {
            return Err(SimError::dimension_mismatch("solve guess", n, x.len()));
        }
        if n == 0 {
            let report = SolveReport::empty();
            self.last_report = Some(report);
            return Ok(report);
        }

        let tol_sq = self.config.tolerance * self.config.tolerance;

        let mut r = b - op.apply(x)?;
        let mut r_dot_r = r.dot(&r);
        let initial_residual = r_dot_r.sqrt();

        // Already satisfied
        if r_dot_r < tol_sq {
            return Ok(self.finish(0, initial_residual, initial_residual, true, false));
        }

        let extended_budget = r_dot_r > 1.0;
        let budget = if extended_budget {
            debug!(
                initial_residual,
                budget = self.config.extended_iterations,
                "large initial residual, extending iteration budget"
            );
            self.config.extended_iterations
        } else {
            self.config.max_iterations
        };

        let mut p = r.clone();
        let mut converged = false;
        let mut iterations = 0;

        for k in 0..budget {
            let ap = op.apply(&p)?;
            let p_dot_ap = p.dot(&ap);
            if p_dot_ap.abs() < 1e-30 {
                // Breakdown: p is nearly A-orthogonal to itself
                break;
            }
            let alpha = r_dot_r / p_dot_ap;
            x.axpy(alpha, &p, 1.0);
            iterations = k + 1;

            r = b - op.apply(x)?;
            let r_dot_r_new = r.dot(&r);
            if r_dot_r_new < tol_sq {
                r_dot_r = r_dot_r_new;
                converged = true;
                break;
            }

            let beta = r_dot_r_new / r_dot_r;
            r_dot_r = r_dot_r_new;
            p = &r + beta * &p;
        }

        let residual = r_dot_r.sqrt();
        if !converged {
            warn!(
                iterations,
                residual,
                tolerance = self.config.tolerance,
                "constraint solver did not converge"
            );
        }

        Ok(self.finish(
            iterations,
            initial_residual,
            residual,
            converged,
            extended_budget,
        ))
    }

    fn finish(
        &mut self,
        iterations: usize,
        initial_residual: f64,
        residual: f64,
        converged: bool,
        extended_budget: bool,
    ) -> SolveReport {
        self.accumulated_error += residual;
        if !converged {
            self.unconverged_solves += 1;
        }
        let report = SolveReport {
            iterations,
            initial_residual,
            residual,
            converged,
            extended_budget,
        };
        self.last_report = Some(report);
        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spd() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.0, 1.0, 3.0, 1.0, 0.0, 1.0, 2.0])
    }

    #[test]
    fn test_cg_solve_simple_system() {
        let a = spd();
        let b = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let mut x = DVector::zeros(3);

        let mut solver = ConstraintForceSolver::new(SolverConfig::stiff());
        let report = solver.solve_operator(&a, &b, &mut x).unwrap();

        assert!(report.converged);
        assert!(report.iterations <= 6);
        assert_relative_eq!(&a * &x, b, epsilon = 1e-6);
        assert!(report.residual < 1e-7);
    }

    #[test]
    fn test_already_converged_returns_immediately() {
        let a = spd();
        let expected = DVector::from_vec(vec![0.5, -0.25, 1.0]);
        let b = &a * &expected;
        let mut x = expected.clone();

        let mut solver = ConstraintForceSolver::default();
        let report = solver.solve_operator(&a, &b, &mut x).unwrap();

        assert_eq!(report.iterations, 0);
        assert!(report.converged);
        assert_eq!(x, expected);
    }

    #[test]
    fn test_extended_budget_for_large_residual() {
        let a = spd();
        let mut solver = ConstraintForceSolver::default();

        let mut x = DVector::zeros(3);
        let report = solver
            .solve_operator(&a, &DVector::from_vec(vec![10.0, 0.0, 0.0]), &mut x)
            .unwrap();
        assert!(report.extended_budget);

        let mut x = DVector::zeros(3);
        let report = solver
            .solve_operator(&a, &DVector::from_vec(vec![0.1, 0.0, 0.0]), &mut x)
            .unwrap();
        assert!(!report.extended_budget);
    }

    #[test]
    fn test_non_convergence_is_reported() {
        let n = 40;
        let a = DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                10f64.powi(i32::try_from(i % 8).unwrap())
            } else {
                0.0
            }
        });
        let b = DVector::from_element(n, 1.0);
        let mut x = DVector::zeros(n);

        let config = SolverConfig::stiff().with_iterations(2, 2);
        let mut solver = ConstraintForceSolver::new(config);
        let report = solver.solve_operator(&a, &b, &mut x).unwrap();

        assert!(!report.converged);
        assert_eq!(report.iterations, 2);
        assert_eq!(solver.unconverged_solves(), 1);
        assert_relative_eq!(solver.accumulated_error(), report.residual);
        assert_relative_eq!(report.residual, (&b - &a * &x).norm(), epsilon = 1e-9);
    }

    #[test]
    fn test_accumulated_error_sums_residuals() {
        let a = spd();
        let mut solver = ConstraintForceSolver::new(SolverConfig::soft());
        let mut total = 0.0;
        for scale in [0.1, 0.2, 0.3] {
            let b = DVector::from_vec(vec![scale, 0.0, -scale]);
            let mut x = DVector::zeros(3);
            total += solver.solve_operator(&a, &b, &mut x).unwrap().residual;
        }
        assert_relative_eq!(solver.accumulated_error(), total);

        solver.reset_stats();
        assert_eq!(solver.accumulated_error(), 0.0);
        assert!(solver.last_report().is_none());
    }

    #[test]
    fn test_dimension_checks() {
        let a = spd();
        let mut solver = ConstraintForceSolver::default();
        let mut x = DVector::zeros(3);
        assert!(
            solver
                .solve_operator(&a, &DVector::zeros(2), &mut x)
                .unwrap_err()
                .is_dimension_mismatch()
        );
        let mut short = DVector::zeros(2);
        assert!(
            solver
                .solve_operator(&a, &DVector::zeros(3), &mut short)
                .is_err()
        );
    }

    #[test]
    fn test_empty_system() {
        let a = DMatrix::<f64>::zeros(0, 0);
        let mut x = DVector::zeros(0);
        let mut solver = ConstraintForceSolver::default();
        let report = solver
            .solve_operator(&a, &DVector::zeros(0), &mut x)
            .unwrap();
        assert_eq!(report, SolveReport::empty());
        assert_eq!(solver.accumulated_error(), 0.0);
    }

    #[test]
    fn test_singular_system_breaks_down_cleanly() {
        // Redundant rows: A is singular but b is in its range
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let b = DVector::from_vec(vec![2.0, 2.0]);
        let mut x = DVector::zeros(2);

        let mut solver = ConstraintForceSolver::default();
        let report = solver.solve_operator(&a, &b, &mut x).unwrap();
        assert!(report.converged);
        assert_relative_eq!(x[0] + x[1], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_convergence_ratio() {
        let report = SolveReport {
            iterations: 3,
            initial_residual: 2.0,
            residual: 0.5,
            converged: true,
            extended_budget: false,
        };
        assert_relative_eq!(report.convergence_ratio(), 0.25);
        assert_eq!(SolveReport::empty().convergence_ratio(), 0.0);
    }
}
