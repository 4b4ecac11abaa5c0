//! Force generators.
//!
//! A [`ForceGenerator`] adds forces to body accumulators and knows nothing
//! about constraints. Each variant also reports the potential energy
//! associated with it, so the orchestrator can track total system energy.
//!
//! | Variant | Force | Energy |
//! |---------|-------|--------|
//! | [`Gravity`] | `(0, -m·g)` | `Σ m·g·y` |
//! | [`Wind`] | constant `F` | `-Σ F·p` |
//! | [`LinearDamping`] | `-c·v` | none (dissipative) |
//! | [`SpringJoint`] | Hooke spring between two bodies | `½·k·(ℓ - ℓ₀)²` |
//! | [`MouseSpring`] | damped spring to a free anchor | `½·k·|anchor - p|²` |
//!
//! Uniform fields skip static bodies.

use nalgebra::Vector2;
use planar_types::{Body, BodyHandle, PhysicsConfig};
use slotmap::SlotMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Separation substituted for coincident spring endpoints.
pub const MIN_SEPARATION: f64 = 1e-9;

slotmap::new_key_type! {
    /// Stable reference to a force generator.
    pub struct GeneratorHandle;
}

/// Uniform gravitational field along -y.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gravity {
    /// Gravitational acceleration magnitude.
    pub magnitude: f64,
}

impl Gravity {
    fn apply(&self, bodies: &mut SlotMap<BodyHandle, Body>) {
        for body in bodies.values_mut().filter(|b| !b.is_static()) {
            let weight = body.mass() * self.magnitude;
            body.apply_force(Vector2::new(0.0, -weight));
        }
    }

    fn energy(&self, bodies: &SlotMap<BodyHandle, Body>) -> f64 {
        bodies
            .values()
            .filter(|b| !b.is_static())
            .map(|b| b.mass() * self.magnitude * b.position.y)
            .sum()
    }
}

/// Constant force applied to every body.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Wind {
    /// Force per body.
    pub force: Vector2<f64>,
}

impl Wind {
    fn apply(&self, bodies: &mut SlotMap<BodyHandle, Body>) {
        for body in bodies.values_mut().filter(|b| !b.is_static()) {
            body.apply_force(self.force);
        }
    }

    fn energy(&self, bodies: &SlotMap<BodyHandle, Body>) -> f64 {
        -bodies
            .values()
            .filter(|b| !b.is_static())
            .map(|b| self.force.dot(&b.position))
            .sum::<f64>()
    }
}

/// Velocity-proportional drag.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearDamping {
    /// Force per unit velocity.
    pub coefficient: f64,
}

impl LinearDamping {
    fn apply(&self, bodies: &mut SlotMap<BodyHandle, Body>) {
        for body in bodies.values_mut().filter(|b| !b.is_static()) {
            let drag = -body.velocity * self.coefficient;
            body.apply_force(drag);
        }
    }
}

/// Hooke spring between two body centers.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpringJoint {
    /// First body.
    pub a: BodyHandle,
    /// Second body.
    pub b: BodyHandle,
    /// Spring constant.
    pub stiffness: f64,
    /// Unstretched length.
    pub rest_length: f64,
}

impl SpringJoint {
    /// Create a spring.
    #[must_use]
    pub const fn new(a: BodyHandle, b: BodyHandle, stiffness: f64, rest_length: f64) -> Self {
        Self {
            a,
            b,
            stiffness,
            rest_length,
        }
    }

    fn separation(&self, bodies: &SlotMap<BodyHandle, Body>) -> Option<Vector2<f64>> {
        let pa = bodies.get(self.a)?.position;
        let pb = bodies.get(self.b)?.position;
        Some(pb - pa)
    }

    fn apply(&self, bodies: &mut SlotMap<BodyHandle, Body>) {
        let Some(d) = self.separation(bodies) else {
            return;
        };
        let length = d.norm().max(MIN_SEPARATION);
        // Force on b; a receives the reaction.
        let force = d * (-self.stiffness * (length - self.rest_length) / length);
        if let Some(b) = bodies.get_mut(self.b) {
            b.apply_force(force);
        }
        if let Some(a) = bodies.get_mut(self.a) {
            a.apply_force(-force);
        }
    }

    fn energy(&self, bodies: &SlotMap<BodyHandle, Body>) -> f64 {
        self.separation(bodies).map_or(0.0, |d| {
            let stretch = d.norm() - self.rest_length;
            0.5 * self.stiffness * stretch * stretch
        })
    }
}

/// Damped spring pulling one body toward a free anchor point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MouseSpring {
    /// Grabbed body.
    pub body: BodyHandle,
    /// Anchor position.
    pub anchor: Vector2<f64>,
    /// Spring constant.
    pub stiffness: f64,
    /// Velocity damping.
    pub damping: f64,
}

impl MouseSpring {
    /// Create an interaction spring.
    #[must_use]
    pub const fn new(body: BodyHandle, anchor: Vector2<f64>, stiffness: f64, damping: f64) -> Self {
        Self {
            body,
            anchor,
            stiffness,
            damping,
        }
    }

    /// Add the spring force to the grabbed body.
    pub fn apply(&self, bodies: &mut SlotMap<BodyHandle, Body>) {
        if let Some(body) = bodies.get_mut(self.body) {
            let force =
                (self.anchor - body.position) * self.stiffness - body.velocity * self.damping;
            body.apply_force(force);
        }
    }

    /// Potential energy stored in the spring.
    #[must_use]
    pub fn energy(&self, bodies: &SlotMap<BodyHandle, Body>) -> f64 {
        bodies.get(self.body).map_or(0.0, |body| {
            0.5 * self.stiffness * (self.anchor - body.position).norm_squared()
        })
    }
}

/// An applier of external or internal forces.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ForceGenerator {
    /// Uniform gravity.
    Gravity(Gravity),
    /// Constant force field.
    Wind(Wind),
    /// Velocity drag.
    LinearDamping(LinearDamping),
    /// Spring between two bodies.
    SpringJoint(SpringJoint),
    /// Spring to a free anchor.
    MouseSpring(MouseSpring),
}

impl ForceGenerator {
    /// Gravity with the given magnitude.
    #[must_use]
    pub const fn gravity(magnitude: f64) -> Self {
        Self::Gravity(Gravity { magnitude })
    }

    /// Constant force field.
    #[must_use]
    pub const fn wind(force: Vector2<f64>) -> Self {
        Self::Wind(Wind { force })
    }

    /// Linear drag with the given coefficient.
    #[must_use]
    pub const fn linear_damping(coefficient: f64) -> Self {
        Self::LinearDamping(LinearDamping { coefficient })
    }

    /// Short name of the variant.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Gravity(_) => "gravity",
            Self::Wind(_) => "wind",
            Self::LinearDamping(_) => "linear_damping",
            Self::SpringJoint(_) => "spring_joint",
            Self::MouseSpring(_) => "mouse_spring",
        }
    }

    /// Add this generator's forces to the body accumulators.
    pub fn apply(&self, bodies: &mut SlotMap<BodyHandle, Body>) {
        match self {
            Self::Gravity(g) => g.apply(bodies),
            Self::Wind(w) => w.apply(bodies),
            Self::LinearDamping(d) => d.apply(bodies),
            Self::SpringJoint(s) => s.apply(bodies),
            Self::MouseSpring(m) => m.apply(bodies),
        }
    }

    /// Potential energy associated with this generator.
    #[must_use]
    pub fn energy(&self, bodies: &SlotMap<BodyHandle, Body>) -> f64 {
        match self {
            Self::Gravity(g) => g.energy(bodies),
            Self::Wind(w) => w.energy(bodies),
            Self::LinearDamping(_) => 0.0,
            Self::SpringJoint(s) => s.energy(bodies),
            Self::MouseSpring(m) => m.energy(bodies),
        }
    }

    /// Whether the generator references `body` by handle.
    ///
    /// Field generators act on every body but reference none.
    #[must_use]
    pub fn involves(&self, body: BodyHandle) -> bool {
        match self {
            Self::Gravity(_) | Self::Wind(_) | Self::LinearDamping(_) => false,
            Self::SpringJoint(s) => s.a == body || s.b == body,
            Self::MouseSpring(m) => m.body == body,
        }
    }

    /// Pull the tunables this variant shares with the configuration.
    pub fn retune(&mut self, config: &PhysicsConfig) {
        match self {
            Self::Gravity(g) => g.magnitude = config.gravity,
            Self::LinearDamping(d) => d.coefficient = config.linear_damping,
            Self::SpringJoint(s) => s.stiffness = config.spring_stiffness,
            Self::MouseSpring(m) => {
                m.stiffness = config.interaction_stiffness;
                m.damping = config.interaction_damping;
            }
            Self::Wind(_) => {}
        }
    }
}
