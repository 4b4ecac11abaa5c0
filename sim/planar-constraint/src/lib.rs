//! Constraint assembly and multiplier solving for planar dynamics.
//!
//! This crate turns a set of bodies and holonomic equality constraints into
//! constraint forces:
//!
//! - [`Constraint`] - Six single-row constraint variants with value, rate and Jacobian rows
//! - [`ConstraintManager`] - Assembles `J`, `J̇` and `b`, applies `A = J·W·Jᵀ` implicitly
//! - [`ConstraintForceSolver`] - Warm-started Conjugate Gradient for `A·λ = b`
//! - [`SparseMatrix`] - Coordinate-list matrix with checked products
//!
//! # Lagrange Multiplier Formulation
//!
//! For constraints `C(q) = 0` the multipliers λ satisfy
//!
//! ```text
//! J·W·Jᵀ·λ = -J̇·q̇ - J·W·Q - k_s·C - k_d·Ċ
//! ```
//!
//! and the generalized constraint force is `Qhat = Jᵀ·λ`. The Baumgarte terms
//! `k_s·C` and `k_d·Ċ` pull drifted constraints back toward the manifold.
//!
//! # Example
//!
//! ```
//! use planar_constraint::{
//!     Constraint, ConstraintForceSolver, ConstraintManager, FixedCoordinate, Link,
//! };
//! use planar_types::{Body, SolverConfig, Vector2};
//! use slotmap::SlotMap;
//!
//! let mut bodies = SlotMap::with_key();
//! let pivot = bodies.insert(Body::new(Vector2::new(0.0, 0.0), 1.0));
//! let bob = bodies.insert(Body::new(Vector2::new(1.0, 0.0), 1.0));
//! bodies[bob].apply_force(Vector2::new(0.0, -10.0));
//!
//! let mut constraints = SlotMap::with_key();
//! constraints.insert(Constraint::FixedX(FixedCoordinate::new(pivot, 0.0)));
//! constraints.insert(Constraint::FixedY(FixedCoordinate::new(pivot, 0.0)));
//! constraints.insert(Constraint::Link(Link::new(pivot, bob, 1.0)));
//!
//! let mut manager = ConstraintManager::default();
//! manager.rebuild(&bodies, &mut constraints, 1.0 / 120.0)?;
//!
//! let mut solver = ConstraintForceSolver::new(SolverConfig::stiff());
//! let report = solver.solve(&mut manager)?;
//! assert!(report.converged);
//!
//! let forces = manager.constraint_forces()?;
//! assert_eq!(forces.len(), 6);
//! # Ok::<(), planar_types::SimError>(())
//! ```

#![doc(html_root_url = "https://docs.rs/planar-constraint/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Error docs added where non-obvious
    clippy::many_single_char_names,    // Math notation (q, b, r, p, x)
)]

pub mod cg;
pub mod constraint;
pub mod manager;
pub mod sparse;
pub mod vector;

pub use cg::{ConstraintForceSolver, LinearOperator, SolveReport};
pub use constraint::{
    Attachment, Constraint, ConstraintHandle, ConstraintInput, FixedCoordinate, FixedOmega,
    FixedRotation, Link, OffsetLink,
};
pub use manager::ConstraintManager;
pub use sparse::{SparseMatrix, Triplet};

// Re-export the shared types
pub use planar_types::{BodyHandle, Result, SimError};
