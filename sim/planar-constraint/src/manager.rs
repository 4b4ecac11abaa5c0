//! Assembly of the global constraint system.
//!
//! Every substep the [`ConstraintManager`] flattens the live bodies into
//! generalized vectors and evaluates every constraint row against them:
//!
//! ```text
//! q, q̇, Q, W   3N-vectors, (x, y, θ) interleaved per body
//! C, Ċ         R-vectors, one entry per constraint row
//! J, J̇         R × 3N sparse matrices
//! b = -J̇·q̇ - J·(W⊙Q) - k_s·C - k_d·Ċ
//! ```
//!
//! The system matrix `A = J·W·Jᵀ` is never formed. [`ConstraintManager`]
//! implements [`LinearOperator`] and applies it as three sparse/diagonal
//! products instead.
//!
//! The multiplier vector λ is the only state that outlives a rebuild. It
//! seeds the next solve and its length tracks the constraint count.

use nalgebra::DVector;
use planar_types::{Body, BodyHandle, InverseMassModel, Result, SimError, Stabilization};
use slotmap::{SecondaryMap, SlotMap};
use tracing::trace;

use crate::cg::LinearOperator;
use crate::constraint::{Constraint, ConstraintHandle, ConstraintInput};
use crate::sparse::{SparseMatrix, Triplet};
use crate::vector;

/// Assembles `J`, `J̇`, `b` and owns the warm-start multipliers.
#[derive(Debug, Clone)]
pub struct ConstraintManager {
    stabilization: Stabilization,
    inverse_mass: InverseMassModel,
    columns: SecondaryMap<BodyHandle, usize>,
    bodies: Vec<BodyHandle>,
    rows: Vec<ConstraintHandle>,
    q: DVector<f64>,
    qdot: DVector<f64>,
    forces: DVector<f64>,
    weights: DVector<f64>,
    values: DVector<f64>,
    velocities: DVector<f64>,
    rhs: DVector<f64>,
    jacobian: SparseMatrix,
    jacobian_dot: SparseMatrix,
    lambda: DVector<f64>,
    scratch: Vec<Triplet>,
}

impl Default for ConstraintManager {
    fn default() -> Self {
        Self::new(Stabilization::default(), InverseMassModel::default())
    }
}

impl ConstraintManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new(stabilization: Stabilization, inverse_mass: InverseMassModel) -> Self {
        Self {
            stabilization,
            inverse_mass,
            columns: SecondaryMap::new(),
            bodies: Vec::new(),
            rows: Vec::new(),
            q: DVector::zeros(0),
            qdot: DVector::zeros(0),
            forces: DVector::zeros(0),
            weights: DVector::zeros(0),
            values: DVector::zeros(0),
            velocities: DVector::zeros(0),
            rhs: DVector::zeros(0),
            jacobian: SparseMatrix::new(0, 0),
            jacobian_dot: SparseMatrix::new(0, 0),
            lambda: DVector::zeros(0),
            scratch: Vec::new(),
        }
    }

    /// Baumgarte gains used for `b`.
    #[must_use]
    pub const fn stabilization(&self) -> Stabilization {
        self.stabilization
    }

    /// Change the Baumgarte gains. Takes effect at the next rebuild.
    pub fn set_stabilization(&mut self, stabilization: Stabilization) {
        self.stabilization = stabilization;
    }

    /// Inverse-mass model used for `W`.
    #[must_use]
    pub const fn inverse_mass_model(&self) -> InverseMassModel {
        self.inverse_mass
    }

    /// Change the inverse-mass model. Takes effect at the next rebuild.
    pub fn set_inverse_mass_model(&mut self, model: InverseMassModel) {
        self.inverse_mass = model;
    }

    /// Rebuild the whole system from the current bodies and constraints.
    ///
    /// Rows follow the constraint iteration order and column blocks follow
    /// the body iteration order. Each constraint is evaluated exactly once, in
    /// the order value, value-dot, Jacobian row, Jacobian-dot row.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::StaleBody`] if a constraint references a body that
    /// is not in `bodies`, or a dimension error if assembly is inconsistent.
    pub fn rebuild(
        &mut self,
        bodies: &SlotMap<BodyHandle, Body>,
        constraints: &mut SlotMap<ConstraintHandle, Constraint>,
        dt: f64,
    ) -> Result<()> {
        let n = bodies.len();
        let dof = 3 * n;
        let nrows = constraints.len();

        self.columns.clear();
        self.bodies.clear();
        self.q = DVector::zeros(dof);
        self.qdot = DVector::zeros(dof);
        self.forces = DVector::zeros(dof);
        self.weights = DVector::zeros(dof);

        for (index, (handle, body)) in bodies.iter().enumerate() {
            let c = 3 * index;
            self.columns.insert(handle, index);
            self.bodies.push(handle);

            self.q[c] = body.position.x;
            self.q[c + 1] = body.position.y;
            self.q[c + 2] = body.angle;
            self.qdot[c] = body.velocity.x;
            self.qdot[c + 1] = body.velocity.y;
            self.qdot[c + 2] = body.angular_velocity;
            self.forces[c] = body.force.x;
            self.forces[c + 1] = body.force.y;
            self.forces[c + 2] = body.torque;

            let w = body.inverse_mass();
            self.weights[c] = w;
            self.weights[c + 1] = w;
            self.weights[c + 2] = match self.inverse_mass {
                InverseMassModel::Uniform => w,
                InverseMassModel::PerAxis => body.inverse_inertia(),
            };
        }

        self.rows.clear();
        self.values = DVector::zeros(nrows);
        self.velocities = DVector::zeros(nrows);
        self.jacobian = SparseMatrix::new(nrows, dof);
        self.jacobian_dot = SparseMatrix::new(nrows, dof);

        let input = ConstraintInput::new(&self.q, &self.qdot, dt, &self.columns);
        for (row, (handle, constraint)) in constraints.iter_mut().enumerate() {
            self.rows.push(handle);
            self.values[row] = constraint.value(&input)?;
            self.velocities[row] = constraint.value_dot(&input)?;

            self.scratch.clear();
            constraint.jacobian_row(&input, row, &mut self.scratch)?;
            self.jacobian.extend(&self.scratch)?;

            self.scratch.clear();
            constraint.jacobian_dot_row(&input, row, &mut self.scratch)?;
            self.jacobian_dot.extend(&self.scratch)?;
        }

        vector::resize_zero_extend(&mut self.lambda, nrows);

        let weighted_forces = vector::component_mul(&self.weights, &self.forces)?;
        let velocity_term = self.jacobian_dot.mul_vec(&self.qdot)?;
        let force_term = self.jacobian.mul_vec(&weighted_forces)?;
        let feedback = &self.values * self.stabilization.position_gain
            + &self.velocities * self.stabilization.velocity_gain;
        self.rhs = -vector::add(&vector::add(&velocity_term, &force_term)?, &feedback)?;

        trace!(
            bodies = n,
            rows = nrows,
            jacobian_nnz = self.jacobian.nnz(),
            jacobian_dot_nnz = self.jacobian_dot.nnz(),
            "assembled constraint system"
        );

        Ok(())
    }

    /// Generalized constraint force `Qhat = Jᵀ·λ`.
    pub fn constraint_forces(&self) -> Result<DVector<f64>> {
        self.jacobian.mul_transpose_vec(&self.lambda)
    }

    /// Number of constraint rows in the last assembly.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Body handles in column-block order.
    #[must_use]
    pub fn body_handles(&self) -> &[BodyHandle] {
        &self.bodies
    }

    /// Constraint handles in row order.
    #[must_use]
    pub fn row_handles(&self) -> &[ConstraintHandle] {
        &self.rows
    }

    /// Generalized positions.
    #[must_use]
    pub const fn q(&self) -> &DVector<f64> {
        &self.q
    }

    /// Generalized velocities.
    #[must_use]
    pub const fn qdot(&self) -> &DVector<f64> {
        &self.qdot
    }

    /// Generalized applied forces.
    #[must_use]
    pub const fn forces(&self) -> &DVector<f64> {
        &self.forces
    }

    /// Per-coordinate inverse masses `W`.
    #[must_use]
    pub const fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    /// Constraint values `C`.
    #[must_use]
    pub const fn values(&self) -> &DVector<f64> {
        &self.values
    }

    /// Constraint velocities `Ċ`.
    #[must_use]
    pub const fn velocities(&self) -> &DVector<f64> {
        &self.velocities
    }

    /// `‖C‖` from the last assembly.
    #[must_use]
    pub fn constraint_error(&self) -> f64 {
        self.values.norm()
    }

    /// `‖Ċ‖` from the last assembly.
    #[must_use]
    pub fn constraint_velocity_error(&self) -> f64 {
        self.velocities.norm()
    }

    /// The Jacobian `J`.
    #[must_use]
    pub const fn jacobian(&self) -> &SparseMatrix {
        &self.jacobian
    }

    /// The Jacobian time derivative `J̇`.
    #[must_use]
    pub const fn jacobian_dot(&self) -> &SparseMatrix {
        &self.jacobian_dot
    }

    /// Right-hand side `b`.
    #[must_use]
    pub const fn rhs(&self) -> &DVector<f64> {
        &self.rhs
    }

    /// Current multipliers.
    #[must_use]
    pub const fn lambda(&self) -> &DVector<f64> {
        &self.lambda
    }

    /// Replace the multipliers.
    ///
    /// # Errors
    ///
    /// The new vector must match the current multiplier length.
    pub fn set_lambda(&mut self, lambda: DVector<f64>) -> Result<()> {
        if lambda.len() != self.lambda.len() {
            return Err(SimError::dimension_mismatch(
                "set_lambda",
                self.lambda.len(),
                lambda.len(),
            ));
        }
        self.lambda = lambda;
        Ok(())
    }

    /// Grow with zeros or truncate the multipliers to `len`.
    pub fn resize_lambda(&mut self, len: usize) {
        vector::resize_zero_extend(&mut self.lambda, len);
    }

    /// Zero the multipliers, keeping their length.
    pub fn reset_lambda(&mut self) {
        self.lambda.fill(0.0);
    }
}

impl LinearOperator for ConstraintManager {
    fn dim(&self) -> usize {
        self.jacobian.nrows()
    }

    /// `A·x = J·(W ⊙ (Jᵀ·x))`.
    fn apply(&self, x: &DVector<f64>) -> Result<DVector<f64>> {
        let spread = self.jacobian.mul_transpose_vec(x)?;
        let scaled = vector::component_mul(&self.weights, &spread)?;
        self.jacobian.mul_vec(&scaled)
    }
}
