//! Planar constrained rigid-body simulation.
//!
//! This crate ties the constraint solver to bodies and applied forces:
//!
//! - [`PhysicsState`] - Owns bodies, constraints and generators; steps the system
//! - [`ForceGenerator`] - Gravity, wind, damping and springs
//! - [`Diagnostics`] - Energy, constraint residuals and solver statistics
//! - [`EntityHit`] - Result of picking queries
//!
//! # Substep Pipeline
//!
//! Each substep accumulates applied forces, solves for the constraint
//! multipliers, feeds `Jᵀ·λ` back into the force accumulators and integrates
//! every body with semi-implicit Euler. See [`PhysicsState::step`].
//!
//! # Handles
//!
//! Bodies, constraints and generators are addressed by generational handles.
//! Removing a body also removes every constraint and generator that refers to
//! it, so no handle held by the simulation ever dangles.

#![doc(html_root_url = "https://docs.rs/planar-core/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod diagnostics;
pub mod force;
mod query;
mod state;

pub use diagnostics::Diagnostics;
pub use force::{
    ForceGenerator, GeneratorHandle, Gravity, LinearDamping, MIN_SEPARATION, MouseSpring,
    SpringJoint, Wind,
};
pub use query::EntityHit;
pub use state::{FixedPos, PhysicsState};

// Re-export the layers below
pub use planar_constraint::{
    Attachment, Constraint, ConstraintHandle, FixedCoordinate, FixedOmega, FixedRotation, Link,
    OffsetLink, SolveReport,
};
pub use planar_types::{
    Body, BodyHandle, DVector, InverseMassModel, PhysicsConfig, Result, SimError, SolverConfig,
    Stabilization, Vector2,
};
