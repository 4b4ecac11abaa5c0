//! Spatial lookups for picking bodies and links.

use nalgebra::Vector2;
use planar_constraint::{Constraint, ConstraintHandle};
use planar_types::BodyHandle;

use crate::state::PhysicsState;

/// The closest entity to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityHit {
    /// A body, with the distance from the point to its disk.
    Body {
        /// The body.
        handle: BodyHandle,
        /// Distance to the disk boundary, zero inside.
        distance: f64,
    },
    /// A link segment, with the closest point on it.
    Link {
        /// The link constraint.
        handle: ConstraintHandle,
        /// Projection of the point onto the segment.
        contact: Vector2<f64>,
        /// Distance from the point to `contact`.
        distance: f64,
    },
}

impl EntityHit {
    /// Distance from the query point.
    #[must_use]
    pub const fn distance(&self) -> f64 {
        match self {
            Self::Body { distance, .. } | Self::Link { distance, .. } => *distance,
        }
    }
}

/// Closest point to `p` on the segment `a`–`b`.
fn project_onto_segment(p: &Vector2<f64>, a: &Vector2<f64>, b: &Vector2<f64>) -> Vector2<f64> {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq == 0.0 {
        return *a;
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

impl PhysicsState {
    /// The body whose disk contains `point`, nearest center first.
    #[must_use]
    pub fn body_at_point(&self, point: Vector2<f64>) -> Option<BodyHandle> {
        self.bodies()
            .filter(|(_, body)| body.contains_point(&point))
            .map(|(handle, body)| (handle, (point - body.position).norm_squared()))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(handle, _)| handle)
    }

    /// World-frame endpoints of a link-like constraint.
    ///
    /// Offset anchors follow the bodies' current angles.
    #[must_use]
    pub fn link_endpoints(&self, handle: ConstraintHandle) -> Option<(Vector2<f64>, Vector2<f64>)> {
        match self.constraint(handle)? {
            Constraint::Link(link) => Some((self.position(link.a)?, self.position(link.b)?)),
            Constraint::OffsetLink(link) => {
                let a = self.body(link.a.body)?;
                let b = self.body(link.b.body)?;
                Some((
                    a.position + link.a.offset_at(a.angle),
                    b.position + link.b.offset_at(b.angle),
                ))
            }
            _ => None,
        }
    }

    /// The closest body or link to `point`.
    ///
    /// Body distance is measured to the disk, link distance to the segment.
    /// A body wins a tie with a link.
    #[must_use]
    pub fn nearest_entity(&self, point: Vector2<f64>) -> Option<EntityHit> {
        let body = self
            .bodies()
            .map(|(handle, body)| EntityHit::Body {
                handle,
                distance: ((point - body.position).norm() - body.radius).max(0.0),
            })
            .min_by(|a, b| a.distance().total_cmp(&b.distance()));

        let link = self
            .constraints()
            .filter_map(|(handle, _)| {
                let (a, b) = self.link_endpoints(handle)?;
                let contact = project_onto_segment(&point, &a, &b);
                Some(EntityHit::Link {
                    handle,
                    contact,
                    distance: (point - contact).norm(),
                })
            })
            .min_by(|a, b| a.distance().total_cmp(&b.distance()));

        match (body, link) {
            (Some(body), Some(link)) if link.distance() < body.distance() => Some(link),
            (Some(body), _) => Some(body),
            (None, link) => link,
        }
    }
}
