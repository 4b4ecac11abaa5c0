//! Planar body state and its integrator.
//!
//! A [`Body`] carries three degrees of freedom: position `(x, y)` and
//! orientation `θ`. Forces and torques are accumulated between integration
//! calls and cleared as soon as they have been used.

use nalgebra::Vector2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default visualization and picking radius.
pub const DEFAULT_RADIUS: f64 = 0.1;

/// Nominal radius used to derive the moment of inertia (`I = ½·m·r²`).
pub const DEFAULT_INERTIA_RADIUS: f64 = 1.0;

/// A planar body with translational and rotational state.
///
/// Mass properties are private so the cached inverses can't go stale.
/// A body with infinite mass is static: its inverse mass and inverse inertia
/// are zero, so neither applied nor constraint forces move it.
///
/// # Example
///
/// ```
/// use planar_types::{Body, Vector2};
///
/// let body = Body::new(Vector2::new(1.0, 2.0), 4.0)
///     .with_velocity(Vector2::new(1.0, 0.0))
///     .with_angular_velocity(2.0);
///
/// assert_eq!(body.mass(), 4.0);
/// assert_eq!(body.inverse_mass(), 0.25);
/// // ½·4·1² + ½·(½·4·1²)·2²
/// assert!((body.kinetic_energy() - 6.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Body {
    /// Position of the center.
    pub position: Vector2<f64>,
    /// Linear velocity.
    pub velocity: Vector2<f64>,
    /// Force accumulator, cleared by [`Body::integrate_translation`].
    pub force: Vector2<f64>,
    /// Orientation in radians.
    pub angle: f64,
    /// Angular velocity in rad/s.
    pub angular_velocity: f64,
    /// Torque accumulator, cleared by [`Body::integrate_rotation`].
    pub torque: f64,
    /// Radius used for picking and drawing.
    pub radius: f64,
    mass: f64,
    inv_mass: f64,
    inertia: f64,
    inv_inertia: f64,
}

impl Body {
    /// Create a body at rest.
    ///
    /// The moment of inertia is derived from the mass and
    /// [`DEFAULT_INERTIA_RADIUS`].
    #[must_use]
    pub fn new(position: Vector2<f64>, mass: f64) -> Self {
        let mut body = Self {
            position,
            velocity: Vector2::zeros(),
            force: Vector2::zeros(),
            angle: 0.0,
            angular_velocity: 0.0,
            torque: 0.0,
            radius: DEFAULT_RADIUS,
            mass,
            inv_mass: 0.0,
            inertia: 0.0,
            inv_inertia: 0.0,
        };
        body.set_mass(mass);
        body
    }

    /// Create a static body (infinite mass).
    #[must_use]
    pub fn fixed(position: Vector2<f64>) -> Self {
        Self::new(position, f64::INFINITY)
    }

    /// Set the initial velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vector2<f64>) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set the initial angle.
    #[must_use]
    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    /// Set the initial angular velocity.
    #[must_use]
    pub fn with_angular_velocity(mut self, angular_velocity: f64) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    /// Set the picking radius.
    #[must_use]
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Derive the moment of inertia from a different nominal radius.
    #[must_use]
    pub fn with_inertia_radius(mut self, radius: f64) -> Self {
        self.set_inertia(0.5 * self.mass * radius * radius);
        self
    }

    /// Mass.
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Cached reciprocal of the mass (zero for static bodies).
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        self.inv_mass
    }

    /// Moment of inertia about the center.
    #[must_use]
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Cached reciprocal of the moment of inertia (zero for static bodies).
    #[must_use]
    pub fn inverse_inertia(&self) -> f64 {
        self.inv_inertia
    }

    /// Whether the body has infinite mass.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.inv_mass == 0.0
    }

    /// Change the mass, rederiving inertia from [`DEFAULT_INERTIA_RADIUS`].
    pub fn set_mass(&mut self, mass: f64) {
        self.mass = mass;
        self.inv_mass = reciprocal(mass);
        self.set_inertia(0.5 * mass * DEFAULT_INERTIA_RADIUS * DEFAULT_INERTIA_RADIUS);
    }

    fn set_inertia(&mut self, inertia: f64) {
        self.inertia = inertia;
        self.inv_inertia = reciprocal(inertia);
    }

    /// Check that the mass properties and radius are usable.
    ///
    /// Mass must be positive; infinity is accepted and makes the body static.
    pub fn validate(&self) -> crate::Result<()> {
        if self.mass.is_nan() || self.mass <= 0.0 {
            return Err(crate::SimError::invalid_mass(format!(
                "mass must be positive, got {}",
                self.mass
            )));
        }
        if self.inertia.is_nan() || self.inertia <= 0.0 {
            return Err(crate::SimError::invalid_mass(format!(
                "inertia must be positive, got {}",
                self.inertia
            )));
        }
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(crate::SimError::invalid_mass(format!(
                "radius must be finite and non-negative, got {}",
                self.radius
            )));
        }
        Ok(())
    }

    /// Add a force to the accumulator.
    pub fn apply_force(&mut self, force: Vector2<f64>) {
        self.force += force;
    }

    /// Add a torque to the accumulator.
    pub fn apply_torque(&mut self, torque: f64) {
        self.torque += torque;
    }

    /// Zero both accumulators.
    pub fn clear_forces(&mut self) {
        self.force = Vector2::zeros();
        self.torque = 0.0;
    }

    /// Advance position by one semi-implicit Euler step.
    ///
    /// Velocity is updated first and the new velocity moves the position.
    /// The force accumulator is cleared afterwards.
    pub fn integrate_translation(&mut self, dt: f64) {
        self.velocity += self.force * (self.inv_mass * dt);
        self.position += self.velocity * dt;
        self.force = Vector2::zeros();
    }

    /// Advance orientation by one semi-implicit Euler step.
    pub fn integrate_rotation(&mut self, dt: f64) {
        self.angular_velocity += self.torque * self.inv_inertia * dt;
        self.angle += self.angular_velocity * dt;
        self.torque = 0.0;
    }

    /// `½·m·|v|² + ½·I·ω²`, zero for static bodies.
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        if self.is_static() {
            return 0.0;
        }
        0.5 * self.mass * self.velocity.norm_squared()
            + 0.5 * self.inertia * self.angular_velocity * self.angular_velocity
    }

    /// Whether `point` lies within the picking radius.
    #[must_use]
    pub fn contains_point(&self, point: &Vector2<f64>) -> bool {
        (point - self.position).norm_squared() <= self.radius * self.radius
    }

    /// Whether every state component is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.velocity.iter().all(|v| v.is_finite())
            && self.angle.is_finite()
            && self.angular_velocity.is_finite()
    }
}

fn reciprocal(value: f64) -> f64 {
    if value.is_infinite() {
        0.0
    } else {
        1.0 / value
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_body_mass_properties() {
        let body = Body::new(Vector2::new(1.0, 2.0), 2.0);
        assert_relative_eq!(body.mass(), 2.0);
        assert_relative_eq!(body.inverse_mass(), 0.5);
        assert_relative_eq!(body.inertia(), 1.0);
        assert_relative_eq!(body.inverse_inertia(), 1.0);
        assert_relative_eq!(body.radius, DEFAULT_RADIUS);
        assert!(!body.is_static());
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_fixed_body() {
        let mut body = Body::fixed(Vector2::new(3.0, 4.0));
        assert!(body.is_static());
        assert_eq!(body.inverse_mass(), 0.0);
        assert_eq!(body.inverse_inertia(), 0.0);
        assert!(body.validate().is_ok());

        body.apply_force(Vector2::new(100.0, 100.0));
        body.apply_torque(50.0);
        body.integrate_translation(0.1);
        body.integrate_rotation(0.1);

        assert_eq!(body.position, Vector2::new(3.0, 4.0));
        assert_eq!(body.angle, 0.0);
        assert_eq!(body.kinetic_energy(), 0.0);
    }

    #[test]
    fn test_invalid_mass_rejected() {
        assert!(Body::new(Vector2::zeros(), 0.0).validate().is_err());
        assert!(Body::new(Vector2::zeros(), -1.0).validate().is_err());
        assert!(Body::new(Vector2::zeros(), f64::NAN).validate().is_err());
        assert!(
            Body::new(Vector2::zeros(), 1.0)
                .with_radius(f64::NAN)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_translation_is_semi_implicit() {
        let mut body = Body::new(Vector2::zeros(), 2.0);
        body.apply_force(Vector2::new(4.0, 0.0));
        body.integrate_translation(0.5);

        // v = 4/2·0.5 = 1, x uses the updated velocity
        assert_relative_eq!(body.velocity.x, 1.0);
        assert_relative_eq!(body.position.x, 0.5);
        assert_eq!(body.force, Vector2::zeros());

        // No force: coasts
        body.integrate_translation(0.5);
        assert_relative_eq!(body.velocity.x, 1.0);
        assert_relative_eq!(body.position.x, 1.0);
    }

    #[test]
    fn test_rotation_is_semi_implicit() {
        let mut body = Body::new(Vector2::zeros(), 2.0);
        body.apply_torque(2.0);
        body.integrate_rotation(0.5);

        // I = 1, ω = 2·0.5 = 1, θ = 0.5
        assert_relative_eq!(body.angular_velocity, 1.0);
        assert_relative_eq!(body.angle, 0.5);
        assert_eq!(body.torque, 0.0);
    }

    #[test]
    fn test_inertia_radius() {
        let body = Body::new(Vector2::zeros(), 2.0).with_inertia_radius(2.0);
        assert_relative_eq!(body.inertia(), 4.0);
        assert_relative_eq!(body.inverse_inertia(), 0.25);
    }

    #[test]
    fn test_kinetic_energy() {
        let body = Body::new(Vector2::zeros(), 2.0)
            .with_velocity(Vector2::new(3.0, 4.0))
            .with_angular_velocity(2.0);
        // ½·2·25 + ½·1·4
        assert_relative_eq!(body.kinetic_energy(), 27.0);
    }

    #[test]
    fn test_contains_point() {
        let body = Body::new(Vector2::new(1.0, 1.0), 1.0).with_radius(0.5);
        assert!(body.contains_point(&Vector2::new(1.2, 1.2)));
        assert!(body.contains_point(&Vector2::new(1.5, 1.0)));
        assert!(!body.contains_point(&Vector2::new(2.0, 1.0)));
    }

    #[test]
    fn test_is_finite() {
        let mut body = Body::new(Vector2::zeros(), 1.0);
        assert!(body.is_finite());
        body.velocity.x = f64::NAN;
        assert!(!body.is_finite());
    }
}
