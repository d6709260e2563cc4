//! Ground-plane geometry for attack volumes.
//!
//! Positions are `glam::Vec2` on the world's ground plane. Actors are
//! treated as circles of a fixed collision radius, so every area test is
//! "does the area, inflated by that radius, contain the actor's centre".

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Minimum length treated as a usable direction.
const DIRECTION_EPSILON: f32 = 1e-4;

/// Normalizes `v`, or returns `fallback` when `v` is (nearly) zero.
#[must_use]
pub fn unit_or(v: Vec2, fallback: Vec2) -> Vec2 {
    if v.length_squared() < DIRECTION_EPSILON * DIRECTION_EPSILON {
        fallback
    } else {
        v.normalize()
    }
}

/// Transforms a facing-relative offset into world space.
///
/// `offset.x` runs along `facing`, `offset.y` to its left.
#[must_use]
pub fn local_to_world(anchor: Vec2, facing: Vec2, offset: Vec2) -> Vec2 {
    anchor + unit_or(facing, Vec2::X).rotate(offset)
}

/// Dot product of `forward` with the unit direction from `from` to `to`.
///
/// Coincident points yield `0.0`.
#[must_use]
pub fn facing_dot(forward: Vec2, from: Vec2, to: Vec2) -> f32 {
    let dir = unit_or(to - from, Vec2::ZERO);
    unit_or(forward, Vec2::ZERO).dot(dir)
}

/// Shortest distance from `point` to the segment `a`-`b`.
#[must_use]
pub fn segment_distance(point: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}

/// A positioned attack volume in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HitArea {
    /// Disc around a centre.
    Circle {
        /// Centre in world space.
        center: Vec2,
        /// Radius in world units.
        radius: f32,
    },
    /// Rectangle oriented along a facing.
    Box {
        /// Centre in world space.
        center: Vec2,
        /// Unit facing of the long axis.
        facing: Vec2,
        /// Half extent along the facing.
        half_length: f32,
        /// Half extent across the facing.
        half_width: f32,
    },
    /// Thick line segment (charges, beams, thrusts).
    Segment {
        /// Segment start.
        start: Vec2,
        /// Segment end.
        end: Vec2,
        /// Half thickness.
        half_width: f32,
    },
    /// Circular sector (sweeps).
    Cone {
        /// Apex of the cone.
        apex: Vec2,
        /// Unit direction of the cone axis.
        direction: Vec2,
        /// Reach from the apex.
        radius: f32,
        /// Half opening angle in radians.
        half_angle: f32,
    },
}

impl HitArea {
    /// Create a circular area.
    #[must_use]
    pub const fn circle(center: Vec2, radius: f32) -> Self {
        Self::Circle { center, radius }
    }

    /// Create a segment area.
    #[must_use]
    pub const fn segment(start: Vec2, end: Vec2, half_width: f32) -> Self {
        Self::Segment {
            start,
            end,
            half_width,
        }
    }

    /// Create an oriented box area.
    #[must_use]
    pub fn oriented_box(center: Vec2, facing: Vec2, half_length: f32, half_width: f32) -> Self {
        Self::Box {
            center,
            facing: unit_or(facing, Vec2::X),
            half_length,
            half_width,
        }
    }

    /// Create a cone area.
    #[must_use]
    pub fn cone(apex: Vec2, direction: Vec2, radius: f32, half_angle: f32) -> Self {
        Self::Cone {
            apex,
            direction: unit_or(direction, Vec2::X),
            radius,
            half_angle,
        }
    }

    /// Reference point of the area (centre, start or apex).
    #[must_use]
    pub fn anchor(&self) -> Vec2 {
        match *self {
            Self::Circle { center, .. } | Self::Box { center, .. } => center,
            Self::Segment { start, .. } => start,
            Self::Cone { apex, .. } => apex,
        }
    }

    /// Check whether a circle at `point` with `radius` touches the area.
    #[must_use]
    pub fn overlaps(&self, point: Vec2, radius: f32) -> bool {
        match *self {
            Self::Circle {
                center,
                radius: area_radius,
            } => point.distance_squared(center) <= (area_radius + radius).powi(2),
            Self::Box {
                center,
                facing,
                half_length,
                half_width,
            } => {
                // Closest point on the box in its local frame. Degenerate
                // extents collapse to zero so the clamp bounds stay ordered.
                let half_length = half_length.max(0.0);
                let half_width = half_width.max(0.0);
                let rel = point - center;
                let local = Vec2::new(rel.dot(facing), rel.dot(facing.perp()));
                let closest = Vec2::new(
                    local.x.clamp(-half_length, half_length),
                    local.y.clamp(-half_width, half_width),
                );
                local.distance_squared(closest) <= radius * radius
            },
            Self::Segment {
                start,
                end,
                half_width,
            } => segment_distance(point, start, end) <= half_width + radius,
            Self::Cone {
                apex,
                direction,
                radius: reach,
                half_angle,
            } => {
                let rel = point - apex;
                let dist = rel.length();
                if dist > reach + radius {
                    return false;
                }
                if dist <= radius {
                    return true;
                }
                let cos = direction.dot(rel / dist).clamp(-1.0, 1.0);
                cos.acos() <= half_angle
            },
        }
    }

    /// Linear damage falloff for `point`: 1.0 at the centre of a circle,
    /// 0.0 at its rim. Non-circular areas do not fall off.
    #[must_use]
    pub fn falloff(&self, point: Vec2) -> f32 {
        match *self {
            Self::Circle { center, radius } if radius > 0.0 => {
                (1.0 - point.distance(center) / radius).max(0.0)
            },
            _ => 1.0,
        }
    }
}
