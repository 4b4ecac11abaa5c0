//! Holonomic equality constraints.
//!
//! Each [`Constraint`] occupies exactly one row of the global system and
//! exposes four evaluations against the global coordinate vectors:
//!
//! | Evaluation | Meaning |
//! |------------|---------|
//! | [`Constraint::value`] | `C(q)`, zero when satisfied |
//! | [`Constraint::value_dot`] | `Ċ(q, q̇)` |
//! | [`Constraint::jacobian_row`] | `∂C/∂q` entries |
//! | [`Constraint::jacobian_dot_row`] | `∂Ċ/∂q` entries |
//!
//! # Evaluation Order
//!
//! [`OffsetLink`] and [`FixedOmega`] carry angle-tracking state. The offset
//! link advances its attachments inside `value`; the motor advances its
//! previous angle inside `jacobian_dot_row`. The assembler therefore calls
//! the four evaluations once per substep, in table order. Calling `value` or
//! `jacobian_dot_row` again with unchanged angles is harmless: a zero angle
//! delta leaves the tracked state unchanged.

use std::f64::consts::TAU;

use nalgebra::{DVector, Vector2};
use planar_types::{BodyHandle, Result, SimError};
use slotmap::SecondaryMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::sparse::Triplet;

slotmap::new_key_type! {
    /// Stable reference to a constraint.
    pub struct ConstraintHandle;
}

/// Read-only view of the assembled generalized state.
///
/// `columns` maps every live body to its block index in `q`; the body's
/// `(x, y, θ)` coordinates sit at `3 * index ..= 3 * index + 2`.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintInput<'a> {
    /// Generalized positions.
    pub q: &'a DVector<f64>,
    /// Generalized velocities.
    pub qdot: &'a DVector<f64>,
    /// Substep length.
    pub dt: f64,
    /// Body block indices.
    pub columns: &'a SecondaryMap<BodyHandle, usize>,
}

impl<'a> ConstraintInput<'a> {
    /// Bundle the assembled state for evaluation.
    #[must_use]
    pub fn new(
        q: &'a DVector<f64>,
        qdot: &'a DVector<f64>,
        dt: f64,
        columns: &'a SecondaryMap<BodyHandle, usize>,
    ) -> Self {
        Self {
            q,
            qdot,
            dt,
            columns,
        }
    }

    /// First column (`x`) of a body's block.
    pub fn column(&self, body: BodyHandle) -> Result<usize> {
        let index = self
            .columns
            .get(body)
            .copied()
            .ok_or(SimError::StaleBody(body))?;
        let column = 3 * index;
        let required = column + 3;
        if self.q.len() < required {
            return Err(SimError::dimension_mismatch(
                "constraint input q",
                required,
                self.q.len(),
            ));
        }
        if self.qdot.len() != self.q.len() {
            return Err(SimError::dimension_mismatch(
                "constraint input qdot",
                self.q.len(),
                self.qdot.len(),
            ));
        }
        Ok(column)
    }

    /// Position of a body.
    pub fn position(&self, body: BodyHandle) -> Result<Vector2<f64>> {
        let c = self.column(body)?;
        Ok(Vector2::new(self.q[c], self.q[c + 1]))
    }

    /// Linear velocity of a body.
    pub fn velocity(&self, body: BodyHandle) -> Result<Vector2<f64>> {
        let c = self.column(body)?;
        Ok(Vector2::new(self.qdot[c], self.qdot[c + 1]))
    }

    /// Angle of a body.
    pub fn angle(&self, body: BodyHandle) -> Result<f64> {
        let c = self.column(body)?;
        Ok(self.q[c + 2])
    }

    /// Angular velocity of a body.
    pub fn angular_velocity(&self, body: BodyHandle) -> Result<f64> {
        let c = self.column(body)?;
        Ok(self.qdot[c + 2])
    }
}

/// Pins one coordinate of one body to a target value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FixedCoordinate {
    /// Constrained body.
    pub body: BodyHandle,
    /// Target coordinate value.
    pub target: f64,
}

impl FixedCoordinate {
    /// Create a coordinate pin.
    #[must_use]
    pub const fn new(body: BodyHandle, target: f64) -> Self {
        Self { body, target }
    }
}

/// Distance constraint between two body centers.
///
/// `C = ½·(|p_b - p_a|² - l₀²)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Link {
    /// First body.
    pub a: BodyHandle,
    /// Second body.
    pub b: BodyHandle,
    /// Rest length `l₀`.
    pub rest_length: f64,
}

impl Link {
    /// Create a distance constraint.
    #[must_use]
    pub const fn new(a: BodyHandle, b: BodyHandle, rest_length: f64) -> Self {
        Self { a, b, rest_length }
    }
}

/// An anchor point fixed in a body's frame.
///
/// The offset is stored in world orientation. Whenever the body's angle is
/// observed to change, the accumulated rotation advances by the delta and the
/// offset is recomputed from the offset captured at creation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Attachment {
    /// Body carrying the anchor.
    pub body: BodyHandle,
    rest_offset: Vector2<f64>,
    offset: Vector2<f64>,
    prev_angle: f64,
    accumulated: f64,
}

impl Attachment {
    /// Anchor `offset` (world frame) on `body`, whose current angle is `angle`.
    #[must_use]
    pub fn new(body: BodyHandle, offset: Vector2<f64>, angle: f64) -> Self {
        Self {
            body,
            rest_offset: offset,
            offset,
            prev_angle: angle,
            accumulated: 0.0,
        }
    }

    /// Current world-frame offset from the body center.
    #[must_use]
    pub const fn offset(&self) -> Vector2<f64> {
        self.offset
    }

    /// World-frame offset for a body currently at `angle`, without recording it.
    #[must_use]
    pub fn offset_at(&self, angle: f64) -> Vector2<f64> {
        let delta = angle - self.prev_angle;
        if delta == 0.0 {
            return self.offset;
        }
        rotate(&self.rest_offset, self.accumulated + delta)
    }

    /// Body angle seen at the last evaluation.
    #[must_use]
    pub const fn prev_angle(&self) -> f64 {
        self.prev_angle
    }

    /// Rotation accumulated since creation.
    #[must_use]
    pub const fn accumulated_angle(&self) -> f64 {
        self.accumulated
    }

    /// Rotate the offset to follow the body's angle.
    pub fn track(&mut self, angle: f64) {
        let delta = angle - self.prev_angle;
        if delta == 0.0 {
            return;
        }
        self.accumulated += delta;
        self.prev_angle = angle;
        self.offset = rotate(&self.rest_offset, self.accumulated);
    }
}

/// Distance constraint between two anchors that rotate with their bodies.
///
/// `C = ½·(|d|² - l₀²)` with `d = (p_b + r_b) - (p_a + r_a)`. Because
/// `∂r/∂θ = perp(r)`, the rows carry angular entries as well as linear ones.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OffsetLink {
    /// First anchor.
    pub a: Attachment,
    /// Second anchor.
    pub b: Attachment,
    /// Rest length `l₀` between the anchors.
    pub rest_length: f64,
}

impl OffsetLink {
    /// Create an offset link.
    #[must_use]
    pub const fn new(a: Attachment, b: Attachment, rest_length: f64) -> Self {
        Self { a, b, rest_length }
    }

    fn separation(&self, input: &ConstraintInput<'_>) -> Result<Vector2<f64>> {
        let pa = input.position(self.a.body)?;
        let pb = input.position(self.b.body)?;
        Ok((pb + self.b.offset) - (pa + self.a.offset))
    }

    fn separation_rate(&self, input: &ConstraintInput<'_>) -> Result<Vector2<f64>> {
        let va = input.velocity(self.a.body)?;
        let vb = input.velocity(self.b.body)?;
        let wa = input.angular_velocity(self.a.body)?;
        let wb = input.angular_velocity(self.b.body)?;
        Ok(vb + perp(&self.b.offset) * wb - va - perp(&self.a.offset) * wa)
    }
}

/// Pins a body's angle to a target.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FixedRotation {
    /// Constrained body.
    pub body: BodyHandle,
    /// Target angle.
    pub target: f64,
}

impl FixedRotation {
    /// Create an angle pin.
    #[must_use]
    pub const fn new(body: BodyHandle, target: f64) -> Self {
        Self { body, target }
    }
}

/// Drives a body's angular velocity toward a target (an angular motor).
///
/// `C = ((θ - θ_prev) - ω_target·dt) mod 2π` and `Ċ = ω - ω_target`.
/// Evaluating the Jacobian-dot row sets `θ_prev = θ`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FixedOmega {
    /// Constrained body.
    pub body: BodyHandle,
    /// Target angular velocity.
    pub velocity: f64,
    prev_angle: f64,
}

impl FixedOmega {
    /// Create a motor for a body whose current angle is `angle`.
    #[must_use]
    pub const fn new(body: BodyHandle, velocity: f64, angle: f64) -> Self {
        Self {
            body,
            velocity,
            prev_angle: angle,
        }
    }

    /// Angle recorded at the last Jacobian-dot evaluation.
    #[must_use]
    pub const fn prev_angle(&self) -> f64 {
        self.prev_angle
    }
}

/// A single-row holonomic constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Constraint {
    /// Pin the x coordinate.
    FixedX(FixedCoordinate),
    /// Pin the y coordinate.
    FixedY(FixedCoordinate),
    /// Center-to-center distance.
    Link(Link),
    /// Anchor-to-anchor distance with rotating anchors.
    OffsetLink(OffsetLink),
    /// Pin the angle.
    FixedRotation(FixedRotation),
    /// Drive the angular velocity.
    FixedOmega(FixedOmega),
}

impl Constraint {
    /// Short name of the variant.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::FixedX(_) => "fixed_x",
            Self::FixedY(_) => "fixed_y",
            Self::Link(_) => "link",
            Self::OffsetLink(_) => "offset_link",
            Self::FixedRotation(_) => "fixed_rotation",
            Self::FixedOmega(_) => "fixed_omega",
        }
    }

    /// Bodies referenced by the constraint.
    #[must_use]
    pub const fn bodies(&self) -> (BodyHandle, Option<BodyHandle>) {
        match self {
            Self::FixedX(c) | Self::FixedY(c) => (c.body, None),
            Self::Link(c) => (c.a, Some(c.b)),
            Self::OffsetLink(c) => (c.a.body, Some(c.b.body)),
            Self::FixedRotation(c) => (c.body, None),
            Self::FixedOmega(c) => (c.body, None),
        }
    }

    /// Whether the constraint references `body`.
    #[must_use]
    pub fn involves(&self, body: BodyHandle) -> bool {
        let (first, second) = self.bodies();
        first == body || second == Some(body)
    }

    /// Constraint value `C`.
    ///
    /// For [`OffsetLink`] this first rotates both anchors to the current
    /// body angles.
    pub fn value(&mut self, input: &ConstraintInput<'_>) -> Result<f64> {
        match self {
            Self::FixedX(c) => Ok(input.position(c.body)?.x - c.target),
            Self::FixedY(c) => Ok(input.position(c.body)?.y - c.target),
            Self::Link(c) => {
                let d = input.position(c.b)? - input.position(c.a)?;
                Ok(0.5 * (d.norm_squared() - c.rest_length * c.rest_length))
            }
            Self::OffsetLink(c) => {
                c.a.track(input.angle(c.a.body)?);
                c.b.track(input.angle(c.b.body)?);
                let d = c.separation(input)?;
                Ok(0.5 * (d.norm_squared() - c.rest_length * c.rest_length))
            }
            Self::FixedRotation(c) => Ok((input.angle(c.body)? - c.target) % TAU),
            Self::FixedOmega(c) => {
                let step = input.angle(c.body)? - c.prev_angle;
                Ok((step - c.velocity * input.dt) % TAU)
            }
        }
    }

    /// Time derivative `Ċ`.
    pub fn value_dot(&self, input: &ConstraintInput<'_>) -> Result<f64> {
        match self {
            Self::FixedX(c) => Ok(input.velocity(c.body)?.x),
            Self::FixedY(c) => Ok(input.velocity(c.body)?.y),
            Self::Link(c) => {
                let d = input.position(c.b)? - input.position(c.a)?;
                let dv = input.velocity(c.b)? - input.velocity(c.a)?;
                Ok(d.dot(&dv))
            }
            Self::OffsetLink(c) => Ok(c.separation(input)?.dot(&c.separation_rate(input)?)),
            Self::FixedRotation(c) => input.angular_velocity(c.body),
            Self::FixedOmega(c) => Ok(input.angular_velocity(c.body)? - c.velocity),
        }
    }

    /// Append the `∂C/∂q` entries of this row to `out`.
    pub fn jacobian_row(
        &self,
        input: &ConstraintInput<'_>,
        row: usize,
        out: &mut Vec<Triplet>,
    ) -> Result<()> {
        match self {
            Self::FixedX(c) => out.push((row, input.column(c.body)?, 1.0)),
            Self::FixedY(c) => out.push((row, input.column(c.body)? + 1, 1.0)),
            Self::Link(c) => {
                let d = input.position(c.b)? - input.position(c.a)?;
                push_linear(out, row, input.column(c.a)?, -d);
                push_linear(out, row, input.column(c.b)?, d);
            }
            Self::OffsetLink(c) => {
                let d = c.separation(input)?;
                let ca = input.column(c.a.body)?;
                let cb = input.column(c.b.body)?;
                push_linear(out, row, ca, -d);
                out.push((row, ca + 2, -d.dot(&perp(&c.a.offset))));
                push_linear(out, row, cb, d);
                out.push((row, cb + 2, d.dot(&perp(&c.b.offset))));
            }
            Self::FixedRotation(c) => out.push((row, input.column(c.body)? + 2, 1.0)),
            Self::FixedOmega(c) => out.push((row, input.column(c.body)? + 2, 1.0)),
        }
        Ok(())
    }

    /// Append the `∂Ċ/∂q` entries of this row to `out`.
    ///
    /// For [`FixedOmega`] this records the current angle as the previous one.
    pub fn jacobian_dot_row(
        &mut self,
        input: &ConstraintInput<'_>,
        row: usize,
        out: &mut Vec<Triplet>,
    ) -> Result<()> {
        match self {
            Self::FixedX(_) | Self::FixedY(_) | Self::FixedRotation(_) => {}
            Self::Link(c) => {
                let dv = input.velocity(c.b)? - input.velocity(c.a)?;
                push_linear(out, row, input.column(c.a)?, -dv);
                push_linear(out, row, input.column(c.b)?, dv);
            }
            Self::OffsetLink(c) => {
                let d = c.separation(input)?;
                let dd = c.separation_rate(input)?;
                let ca = input.column(c.a.body)?;
                let cb = input.column(c.b.body)?;
                let wa = input.angular_velocity(c.a.body)?;
                let wb = input.angular_velocity(c.b.body)?;
                let ra = c.a.offset;
                let rb = c.b.offset;
                push_linear(out, row, ca, -dd);
                out.push((row, ca + 2, -(dd.dot(&perp(&ra)) - wa * d.dot(&ra))));
                push_linear(out, row, cb, dd);
                out.push((row, cb + 2, dd.dot(&perp(&rb)) - wb * d.dot(&rb)));
            }
            Self::FixedOmega(c) => {
                c.prev_angle = input.angle(c.body)?;
            }
        }
        Ok(())
    }
}

/// Counter-clockwise perpendicular, `∂(R(θ)·r)/∂θ` at the current angle.
fn perp(v: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(-v.y, v.x)
}

fn rotate(v: &Vector2<f64>, angle: f64) -> Vector2<f64> {
    let (sin, cos) = angle.sin_cos();
    Vector2::new(cos * v.x - sin * v.y, sin * v.x + cos * v.y)
}

fn push_linear(out: &mut Vec<Triplet>, row: usize, column: usize, value: Vector2<f64>) {
    out.push((row, column, value.x));
    out.push((row, column + 1, value.y));
}
