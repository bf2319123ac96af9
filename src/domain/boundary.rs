//! Arena boundary shapes.
//!
//! The world integrates every body the same way and delegates containment to a
//! [`BoundaryPolicy`], so circular and square arenas share one [`World`](super::World) type.

use serde::{Deserialize, Serialize};

use super::Position;

/// Containment strategy of an arena.
///
/// `clearance` is the radius of the body being checked: a body is contained when all of it lies
/// inside the arena. Pass `0.0` for points.
pub trait BoundaryPolicy {
    fn contains(&self, position: Position, clearance: f64) -> bool;

    /// Closest position for which [`contains`](Self::contains) holds. Positions already inside
    /// are returned unchanged.
    fn project(&self, position: Position, clearance: f64) -> Position;

    /// Distance from `origin` along the unit `direction` to the arena wall, if it is within
    /// `max_range`.
    fn intersect_with_ray(&self, origin: Position, direction: Position, max_range: f64)
        -> Option<f64>;

    /// Geometric centre of the arena.
    fn center(&self) -> Position;

    /// Largest body radius that still fits in the arena.
    fn max_clearance(&self) -> f64;
}

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct CircularBoundary {
    center: Position,
    radius: f64,
}

impl CircularBoundary {
    pub const fn new(center: Position, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl BoundaryPolicy for CircularBoundary {
    fn contains(&self, position: Position, clearance: f64) -> bool {
        self.center.distance(position) + clearance <= self.radius
    }

    fn project(&self, position: Position, clearance: f64) -> Position {
        let offset = position - self.center;
        let distance = offset.norm();
        let limit = (self.radius - clearance).max(0.0);
        if distance <= limit {
            position
        } else {
            self.center + offset * (limit / distance)
        }
    }

    fn intersect_with_ray(
        &self,
        origin: Position,
        direction: Position,
        max_range: f64,
    ) -> Option<f64> {
        let offset = origin - self.center;
        let b = offset.dot(direction);
        let c = offset.dot(offset) - self.radius * self.radius;
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }
        let root = discriminant.sqrt();
        // From inside the arena the near root is negative and the wall is the far root.
        let t = if -b - root >= 0.0 { -b - root } else { -b + root };
        (t >= 0.0 && t <= max_range).then_some(t)
    }

    fn center(&self) -> Position {
        self.center
    }

    fn max_clearance(&self) -> f64 {
        self.radius
    }
}

/// Axis-aligned square arena covering `[0, size] × [0, size]`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SquareBoundary {
    size: f64,
}

impl SquareBoundary {
    pub const fn new(size: f64) -> Self {
        Self { size }
    }

    pub fn size(&self) -> f64 {
        self.size
    }
}

impl BoundaryPolicy for SquareBoundary {
    fn contains(&self, position: Position, clearance: f64) -> bool {
        let (lo, hi) = (clearance, self.size - clearance);
        (lo..=hi).contains(&position.x()) && (lo..=hi).contains(&position.y())
    }

    fn project(&self, position: Position, clearance: f64) -> Position {
        let lo = clearance.min(self.size / 2.0);
        let hi = self.size - lo;
        Position::new(position.x().clamp(lo, hi), position.y().clamp(lo, hi))
    }

    fn intersect_with_ray(
        &self,
        origin: Position,
        direction: Position,
        max_range: f64,
    ) -> Option<f64> {
        let axis = |o: f64, d: f64| {
            if d > 0.0 {
                (self.size - o) / d
            } else if d < 0.0 {
                -o / d
            } else {
                f64::INFINITY
            }
        };
        let t = axis(origin.x(), direction.x())
            .min(axis(origin.y(), direction.y()))
            .max(0.0);
        (t <= max_range).then_some(t)
    }

    fn center(&self) -> Position {
        Position::new(self.size / 2.0, self.size / 2.0)
    }

    fn max_clearance(&self) -> f64 {
        self.size / 2.0
    }
}

/// Runtime-selected boundary, used when the arena shape comes from configuration.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Boundary {
    Circular(CircularBoundary),
    Square(SquareBoundary),
}

impl Boundary {
    pub fn circular(center: Position, radius: f64) -> Self {
        Boundary::Circular(CircularBoundary::new(center, radius))
    }

    pub fn square(size: f64) -> Self {
        Boundary::Square(SquareBoundary::new(size))
    }

    fn policy(&self) -> &dyn BoundaryPolicy {
        match self {
            Boundary::Circular(boundary) => boundary,
            Boundary::Square(boundary) => boundary,
        }
    }
}

impl BoundaryPolicy for Boundary {
    fn contains(&self, position: Position, clearance: f64) -> bool {
        self.policy().contains(position, clearance)
    }

    fn project(&self, position: Position, clearance: f64) -> Position {
        self.policy().project(position, clearance)
    }

    fn intersect_with_ray(
        &self,
        origin: Position,
        direction: Position,
        max_range: f64,
    ) -> Option<f64> {
        self.policy().intersect_with_ray(origin, direction, max_range)
    }

    fn center(&self) -> Position {
        self.policy().center()
    }

    fn max_clearance(&self) -> f64 {
        self.policy().max_clearance()
    }
}

impl From<CircularBoundary> for Boundary {
    fn from(value: CircularBoundary) -> Self {
        Boundary::Circular(value)
    }
}

impl From<SquareBoundary> for Boundary {
    fn from(value: SquareBoundary) -> Self {
        Boundary::Square(value)
    }
}
