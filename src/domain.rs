//! The domain module holds the continuous arena engine: geometry helpers, entity state, the
//! [`World`] with its integrator and containment rules, the ray-cast sensor and the engagement
//! helper used to build relative observations.
//!
//! Nothing here knows about rewards or episodes; scenarios are layered on top in
//! [`crate::scenario`].

mod basis;
mod boundary;
mod collision;
mod engagement;
mod entity;
mod sensor;
mod world;

pub use basis::{
    euclidean_distance, normalize_angle, remap, velocity_from_heading, wrapped_difference, Angle,
    Position, Velocity,
};
pub use boundary::{Boundary, BoundaryPolicy, CircularBoundary, SquareBoundary};
pub use collision::{Circle, HasCollision};
pub use engagement::{Engagement, EngagementRate, NOT_VISIBLE};
pub use entity::{Color, Entity, EntityState, Movability, Obstacle};
pub use sensor::{nearest_by_class, CastOptions, Pose, RaySensor};
pub use world::{World, WorldConfig, WorldError};
