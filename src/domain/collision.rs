//! Collision detection and ray intersection for circular bodies.

use serde::{Deserialize, Serialize};

use super::Position;

pub trait HasCollision {
    fn shape(&self) -> Circle;
}

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Circle {
    pub position: Position,
    pub radius: f64,
}

impl Circle {
    pub const fn new(position: Position, radius: f64) -> Self {
        Self { position, radius }
    }

    pub fn contains(&self, position: Position) -> bool {
        self.position.distance(position) <= self.radius
    }

    /// Overlap depth with another circle, `None` if the circles do not touch.
    pub fn penetration(&self, other: &Circle) -> Option<f64> {
        let depth = self.radius + other.radius - self.position.distance(other.position);
        (depth > 0.0).then_some(depth)
    }

    /// Distance along a ray to the first point of this circle.
    ///
    /// `direction` must be a unit vector. The line parameter is solved in closed form from
    /// `|origin + t * direction - center|² = r²`; only hits with `0 <= t <= max_range` count.
    /// A ray starting inside the circle hits it immediately at `t = 0`.
    pub fn intersect_with_ray(
        &self,
        origin: Position,
        direction: Position,
        max_range: f64,
    ) -> Option<f64> {
        let offset = origin - self.position;
        let c = offset.dot(offset) - self.radius * self.radius;
        if c <= 0.0 {
            return Some(0.0);
        }
        let b = offset.dot(direction);
        if b > 0.0 {
            // Circle lies behind the ray origin.
            return None;
        }
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }
        let t = -b - discriminant.sqrt();
        (t >= 0.0 && t <= max_range).then_some(t)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    const EPSILON: f64 = 1e-12;

    #[test]
    fn test_circle_penetration() {
        let a = Circle::new(Position::new(0.0, 0.0), 1.0);
        let b = Circle::new(Position::new(1.5, 0.0), 1.0);
        assert_abs_diff_eq!(a.penetration(&b).unwrap(), 0.5);
        assert_eq!(a.penetration(&Circle::new(Position::new(5.0, 0.0), 1.0)), None);
    }

    #[rstest]
    #[case::straight_ahead(Position::new(0.0, 0.0), Position::new(1.0, 0.0), Some(2.0))]
    #[case::behind(Position::new(0.0, 0.0), Position::new(-1.0, 0.0), None)]
    #[case::miss(Position::new(0.0, 0.0), Position::new(0.0, 1.0), None)]
    #[case::inside(Position::new(3.2, 0.0), Position::new(0.0, 1.0), Some(0.0))]
    #[case::out_of_range(Position::new(-20.0, 0.0), Position::new(1.0, 0.0), None)]
    fn test_circle_intersect_with_ray(
        #[case] origin: Position,
        #[case] direction: Position,
        #[case] expected: Option<f64>,
    ) {
        let circle = Circle::new(Position::new(3.0, 0.0), 1.0);
        let result = circle.intersect_with_ray(origin, direction, 10.0);
        match (result, expected) {
            (Some(r), Some(e)) => assert_abs_diff_eq!(r, e, epsilon = EPSILON),
            _ => assert_eq!(result, expected),
        }
    }

    #[test]
    fn test_circle_intersect_with_ray_tangent() {
        let circle = Circle::new(Position::new(3.0, 1.0), 1.0);
        let t = circle
            .intersect_with_ray(Position::new(0.0, 0.0), Position::new(1.0, 0.0), 10.0)
            .unwrap();
        assert_abs_diff_eq!(t, 3.0, epsilon = EPSILON);
    }
}
