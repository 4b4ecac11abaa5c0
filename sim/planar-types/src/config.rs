//! Configuration types for simulation.
//!
//! [`PhysicsConfig`] gathers every runtime tunable of the engine in one place:
//! generator strengths, Baumgarte gains, solver budget, and the inverse-mass
//! model used when assembling the constraint system. It is owned by the
//! orchestrating state and updated through setters, never through globals.
//!
//! Two stabilization/tolerance sets are in circulation for this kind of
//! solver, so both are exposed as presets:
//!
//! | Preset | k_s | k_d | ε |
//! |--------|-----|-----|---|
//! | [`PhysicsConfig::stiff`] (default) | 300 | 40 | 1e-7 |
//! | [`PhysicsConfig::soft`] | 30 | 20 | 1e-2 |

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Main configuration for a simulation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhysicsConfig {
    /// Gravity magnitude (acts along -y).
    pub gravity: f64,
    /// Linear damping coefficient (force per unit velocity).
    pub linear_damping: f64,
    /// Stiffness of spring joints.
    pub spring_stiffness: f64,
    /// Stiffness of the user-interaction spring.
    pub interaction_stiffness: f64,
    /// Velocity damping of the user-interaction spring.
    pub interaction_damping: f64,
    /// Target angular velocity of angular motors (rad/s).
    pub motor_velocity: f64,
    /// Baumgarte stabilization gains.
    pub stabilization: Stabilization,
    /// Constraint force solver settings.
    pub solver: SolverConfig,
    /// Inverse-mass model for the rotational rows of the system.
    pub inverse_mass: InverseMassModel,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            linear_damping: 0.5,
            spring_stiffness: 50.0,
            interaction_stiffness: 100.0,
            interaction_damping: 10.0,
            motor_velocity: 1.0,
            stabilization: Stabilization::stiff(),
            solver: SolverConfig::stiff(),
            inverse_mass: InverseMassModel::Uniform,
        }
    }
}

impl PhysicsConfig {
    /// Stiff stabilization with a tight solver tolerance (the default).
    #[must_use]
    pub fn stiff() -> Self {
        Self::default()
    }

    /// Soft stabilization with a loose solver tolerance.
    #[must_use]
    pub fn soft() -> Self {
        Self {
            stabilization: Stabilization::soft(),
            solver: SolverConfig::soft(),
            ..Default::default()
        }
    }

    /// Set the gravity magnitude.
    #[must_use]
    pub fn with_gravity(mut self, gravity: f64) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable gravity.
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = 0.0;
        self
    }

    /// Set the linear damping coefficient.
    #[must_use]
    pub fn with_linear_damping(mut self, coefficient: f64) -> Self {
        self.linear_damping = coefficient;
        self
    }

    /// Set the spring joint stiffness.
    #[must_use]
    pub fn with_spring_stiffness(mut self, stiffness: f64) -> Self {
        self.spring_stiffness = stiffness;
        self
    }

    /// Set the angular motor target velocity.
    #[must_use]
    pub fn with_motor_velocity(mut self, velocity: f64) -> Self {
        self.motor_velocity = velocity;
        self
    }

    /// Set the stabilization gains.
    #[must_use]
    pub fn with_stabilization(mut self, stabilization: Stabilization) -> Self {
        self.stabilization = stabilization;
        self
    }

    /// Set the solver configuration.
    #[must_use]
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Set the inverse-mass model.
    #[must_use]
    pub fn with_inverse_mass(mut self, model: InverseMassModel) -> Self {
        self.inverse_mass = model;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.gravity.is_finite() {
            return Err(crate::SimError::invalid_config("gravity must be finite"));
        }

        for (name, value) in [
            ("linear_damping", self.linear_damping),
            ("spring_stiffness", self.spring_stiffness),
            ("interaction_stiffness", self.interaction_stiffness),
            ("interaction_damping", self.interaction_damping),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(crate::SimError::invalid_config(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }

        if !self.motor_velocity.is_finite() {
            return Err(crate::SimError::invalid_config(
                "motor_velocity must be finite",
            ));
        }

        self.stabilization.validate()?;
        self.solver.validate()?;

        Ok(())
    }
}

/// Baumgarte stabilization gains.
///
/// The constraint right-hand side carries `-k_s * C - k_d * Ċ` so that
/// drift decays like a damped spring instead of accumulating.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stabilization {
    /// Position gain `k_s`.
    pub position_gain: f64,
    /// Velocity gain `k_d`.
    pub velocity_gain: f64,
}

impl Default for Stabilization {
    fn default() -> Self {
        Self::stiff()
    }
}

impl Stabilization {
    /// Create stabilization gains.
    #[must_use]
    pub const fn new(position_gain: f64, velocity_gain: f64) -> Self {
        Self {
            position_gain,
            velocity_gain,
        }
    }

    /// `k_s = 300`, `k_d = 40`.
    #[must_use]
    pub const fn stiff() -> Self {
        Self::new(300.0, 40.0)
    }

    /// `k_s = 30`, `k_d = 20`.
    #[must_use]
    pub const fn soft() -> Self {
        Self::new(30.0, 20.0)
    }

    /// No stabilization (pure acceleration-level constraints).
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Validate the gains.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.position_gain.is_finite() || self.position_gain < 0.0 {
            return Err(crate::SimError::invalid_config(
                "position_gain must be finite and non-negative",
            ));
        }
        if !self.velocity_gain.is_finite() || self.velocity_gain < 0.0 {
            return Err(crate::SimError::invalid_config(
                "velocity_gain must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// Configuration for the constraint force solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Convergence tolerance on the residual norm `‖b - A·λ‖`.
    pub tolerance: f64,
    /// Iteration budget for an ordinary solve.
    pub max_iterations: usize,
    /// Iteration budget when the initial squared residual exceeds 1.
    pub extended_iterations: usize,
    /// Seed each solve with the previous multipliers.
    pub warm_starting: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::stiff()
    }
}

impl SolverConfig {
    /// Tight tolerance (`1e-7`), 64/128 iterations.
    #[must_use]
    pub const fn stiff() -> Self {
        Self {
            tolerance: 1e-7,
            max_iterations: 64,
            extended_iterations: 128,
            warm_starting: true,
        }
    }

    /// Loose tolerance (`1e-2`), 64/128 iterations.
    #[must_use]
    pub const fn soft() -> Self {
        Self {
            tolerance: 1e-2,
            ..Self::stiff()
        }
    }

    /// Set the tolerance.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set both iteration budgets.
    #[must_use]
    pub const fn with_iterations(mut self, max_iterations: usize, extended: usize) -> Self {
        self.max_iterations = max_iterations;
        self.extended_iterations = extended;
        self
    }

    /// Enable or disable warm starting.
    #[must_use]
    pub const fn with_warm_starting(mut self, enabled: bool) -> Self {
        self.warm_starting = enabled;
        self
    }

    /// Validate the solver configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(crate::SimError::invalid_config(
                "tolerance must be positive and finite",
            ));
        }

        if self.max_iterations == 0 {
            return Err(crate::SimError::invalid_config(
                "max_iterations must be at least 1",
            ));
        }

        if self.extended_iterations < self.max_iterations {
            return Err(crate::SimError::invalid_config(
                "extended_iterations cannot be smaller than max_iterations",
            ));
        }

        Ok(())
    }
}

/// Which inverse mass the rotational row of each body carries in `W`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InverseMassModel {
    /// The linear inverse mass is repeated on the x, y and θ rows.
    ///
    /// Angular constraint forces are then solved against `1/m` while the
    /// integrator applies them against `1/I`; the mismatch is kept for
    /// behavioral compatibility.
    #[default]
    Uniform,
    /// The θ row carries the inverse moment of inertia.
    PerAxis,
}
