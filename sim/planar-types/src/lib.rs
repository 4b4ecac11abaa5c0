//! Core types for planar constrained dynamics.
//!
//! This crate provides the foundational types shared by the solver and the
//! orchestration layer:
//!
//! - [`Body`] - Translational and rotational state with a semi-implicit integrator
//! - [`BodyHandle`] - Stable generational reference to a body
//! - [`PhysicsConfig`] - Generator strengths, stabilization gains, solver budget
//! - [`SimError`] - Error taxonomy for assembly and stepping
//!
//! # Coordinate System
//!
//! - X: right
//! - Y: up (gravity acts along -Y)
//! - θ: counter-clockwise, radians
//!
//! Each body owns three generalized coordinates `(x, y, θ)`. The global
//! coordinate vector interleaves them per body in body iteration order.
//!
//! # Example
//!
//! ```
//! use planar_types::{Body, Vector2};
//!
//! let mut body = Body::new(Vector2::new(0.0, 1.0), 2.0);
//! body.apply_force(Vector2::new(0.0, -19.62));
//! body.integrate_translation(0.1);
//!
//! assert!((body.velocity.y + 0.981).abs() < 1e-12);
//! assert_eq!(body.force, Vector2::zeros());
//! ```

#![doc(html_root_url = "https://docs.rs/planar-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod config;
mod error;

pub use body::{Body, DEFAULT_INERTIA_RADIUS, DEFAULT_RADIUS};
pub use config::{InverseMassModel, PhysicsConfig, SolverConfig, Stabilization};
pub use error::SimError;

// Re-export nalgebra types for convenience
pub use nalgebra::{DVector, Vector2};

slotmap::new_key_type! {
    /// Stable reference to a body.
    ///
    /// Handles carry a generation counter, so a handle to a removed body never
    /// aliases a body inserted later into the same slot.
    pub struct BodyHandle;
}

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
