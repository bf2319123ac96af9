//! Circular bodies living in a [`World`](super::World) and their kinematic state.

use serde::{Deserialize, Serialize};

use super::{Angle, Circle, HasCollision, Position, Velocity};

/// Kinematic record of a point-mass body: position, heading, linear and angular velocity.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct EntityState {
    pub position: Position,
    pub heading: Angle,
    pub velocity: Velocity,
    pub angular_velocity: f64,
}

impl EntityState {
    /// State at rest at the given pose.
    pub fn at(x: f64, y: f64, heading: f64) -> Self {
        Self {
            position: Position::new(x, y),
            heading: Angle::new(heading),
            ..Self::default()
        }
    }

    pub fn with_heading(self, heading: Angle) -> Self {
        Self { heading, ..self }
    }

    pub fn with_velocity(self, velocity: Velocity) -> Self {
        Self { velocity, ..self }
    }

    pub fn with_angular_velocity(self, angular_velocity: f64) -> Self {
        Self {
            angular_velocity,
            ..self
        }
    }

    /// Forward Euler step over `dt` seconds. The resulting heading is wrapped into `(-π, π]`.
    pub fn integrated(&self, dt: f64) -> Self {
        Self {
            position: self.position + self.velocity.displacement(dt),
            heading: Angle::new(self.heading.radians() + self.angular_velocity * dt).normalized(),
            ..*self
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.velocity.is_finite()
            && self.heading.radians().is_finite()
            && self.angular_velocity.is_finite()
    }

    /// Flat `[x, y, heading, vx, vy, angular_velocity]` layout used by observation builders.
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.position.x(),
            self.position.y(),
            self.heading.radians(),
            self.velocity.x(),
            self.velocity.y(),
            self.angular_velocity,
        ]
    }
}

/// Opaque RGBA colour carried for renderers.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Color(pub [u8; 4]);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum Movability {
    /// Integrated every step.
    #[default]
    Movable,
    /// Fixed in place; acts as an obstacle for movable bodies and sensors.
    Unmovable,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    id: String,
    radius: f64,
    movability: Movability,
    color: Color,
}

impl Entity {
    pub fn new(id: impl Into<String>, radius: f64, movability: Movability) -> Self {
        Self {
            id: id.into(),
            radius,
            movability,
            color: Color::default(),
        }
    }

    pub fn with_color(self, color: Color) -> Self {
        Self { color, ..self }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn movability(&self) -> Movability {
        self.movability
    }

    pub fn is_static(&self) -> bool {
        self.movability == Movability::Unmovable
    }
}

/// Static circular obstacle ("block").
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Obstacle {
    position: Position,
    radius: f64,
}

impl Obstacle {
    pub const fn new(position: Position, radius: f64) -> Self {
        Self { position, radius }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl HasCollision for Obstacle {
    fn shape(&self) -> Circle {
        Circle::new(self.position, self.radius)
    }
}
