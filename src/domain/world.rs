//! World holding the bodies of one arena, their kinematic state and the static obstacles.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::{
    Boundary, BoundaryPolicy, Circle, Entity, EntityState, HasCollision, Obstacle, Position,
};

/// Overlap with an obstacle that is left over from floating point error after a push-out.
const CONTACT_TOLERANCE: f64 = 1e-9;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorldError {
    #[error("entity {0:?} already exists")]
    DuplicateEntity(String),
    #[error("unknown entity {0:?}")]
    UnknownEntity(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("non-finite state of entity {id:?}")]
    NonFiniteState { id: String },
}

#[derive(Clone, Debug, PartialEq)]
struct Body {
    entity: Entity,
    state: EntityState,
    active: bool,
}

impl HasCollision for Body {
    fn shape(&self) -> Circle {
        Circle::new(self.state.position, self.entity.radius())
    }
}

impl Body {
    fn is_moving(&self) -> bool {
        self.active && !self.entity.is_static()
    }
}

/// Arena configuration as loaded by a host.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    pub boundary: Boundary,
    pub enable_agent_collisions: bool,
}

impl WorldConfig {
    pub fn build(&self) -> Result<World<Boundary>, WorldError> {
        World::new(self.boundary, self.enable_agent_collisions)
    }
}

/// Container of entities, static obstacles and a boundary.
///
/// Entities keep their insertion order, which is also the order used for collision resolution
/// and for breaking sensor ties. Cloning a world is a deep copy.
#[derive(Clone, Debug, PartialEq)]
pub struct World<B = Boundary> {
    boundary: B,
    bodies: IndexMap<String, Body>,
    obstacles: Vec<Obstacle>,
    enable_agent_collisions: bool,
}

impl<B: BoundaryPolicy + Clone> World<B> {
    pub fn new(boundary: B, enable_agent_collisions: bool) -> Result<Self, WorldError> {
        let clearance = boundary.max_clearance();
        if !(clearance.is_finite() && clearance > 0.0) || !boundary.center().is_finite() {
            return Err(WorldError::InvalidConfig(format!(
                "boundary size must be positive and finite, got {clearance}"
            )));
        }
        Ok(Self {
            boundary,
            bodies: IndexMap::new(),
            obstacles: vec![],
            enable_agent_collisions,
        })
    }

    pub fn boundary(&self) -> &B {
        &self.boundary
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn enable_agent_collisions(&self) -> bool {
        self.enable_agent_collisions
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) -> Result<(), WorldError> {
        if !(obstacle.radius().is_finite() && obstacle.radius() > 0.0)
            || !obstacle.position().is_finite()
        {
            return Err(WorldError::InvalidConfig(format!(
                "invalid obstacle {obstacle:?}"
            )));
        }
        self.obstacles.push(obstacle);
        Ok(())
    }

    /// Registers an entity. Without an initial state it starts at rest in the arena centre.
    pub fn add_entity(
        &mut self,
        entity: Entity,
        initial_state: Option<EntityState>,
    ) -> Result<(), WorldError> {
        if self.bodies.contains_key(entity.id()) {
            return Err(WorldError::DuplicateEntity(entity.id().to_owned()));
        }
        let radius = entity.radius();
        if !(radius.is_finite() && radius > 0.0 && radius <= self.boundary.max_clearance()) {
            return Err(WorldError::InvalidConfig(format!(
                "entity {:?} radius {radius} does not fit the arena",
                entity.id()
            )));
        }
        let state = initial_state.unwrap_or_else(|| {
            let center = self.boundary.center();
            EntityState::at(center.x(), center.y(), 0.0)
        });
        debug!(id = entity.id(), radius, is_static = entity.is_static(), "add entity");
        self.bodies.insert(
            entity.id().to_owned(),
            Body {
                entity,
                state,
                active: true,
            },
        );
        Ok(())
    }

    pub fn entity(&self, id: &str) -> Result<&Entity, WorldError> {
        self.body(id).map(|b| &b.entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = (&Entity, &EntityState)> {
        self.bodies.values().map(|b| (&b.entity, &b.state))
    }

    pub fn get_state(&self, id: &str) -> Result<EntityState, WorldError> {
        self.body(id).map(|b| b.state)
    }

    pub fn set_state(&mut self, id: &str, state: EntityState) -> Result<(), WorldError> {
        self.body_mut(id)?.state = state;
        Ok(())
    }

    pub fn is_active(&self, id: &str) -> Result<bool, WorldError> {
        self.body(id).map(|b| b.active)
    }

    /// Inactive entities are frozen: they are neither integrated nor collided with.
    pub fn set_active(&mut self, id: &str, active: bool) -> Result<(), WorldError> {
        self.body_mut(id)?.active = active;
        Ok(())
    }

    /// Independent deep copy, e.g. for rendering or look-ahead.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Static obstacles followed by static entities, in registration order.
    pub fn static_circles(&self) -> Vec<Circle> {
        self.obstacles
            .iter()
            .map(HasCollision::shape)
            .chain(
                self.bodies
                    .values()
                    .filter(|b| b.active && b.entity.is_static())
                    .map(HasCollision::shape),
            )
            .collect()
    }

    /// Shapes of the given active entities, in the order of `ids`.
    pub fn circles_of<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<Circle>, WorldError> {
        let mut circles = vec![];
        for id in ids {
            let body = self.body(id)?;
            if body.active {
                circles.push(body.shape());
            }
        }
        Ok(circles)
    }

    /// Shapes of all active movable entities except `id`.
    pub fn circles_except(&self, id: &str) -> Vec<Circle> {
        self.bodies
            .values()
            .filter(|b| b.is_moving() && b.entity.id() != id)
            .map(HasCollision::shape)
            .collect()
    }

    /// Advances all active movable entities by `dt` seconds split into `substeps` forward Euler
    /// steps. After every substep bodies are pushed out of static obstacles, optionally apart
    /// from each other, and finally back inside the boundary. A body squeezed between the wall
    /// and an obstacle in a gap narrower than itself stays where it was before the substep.
    pub fn simulate(&mut self, dt: f64, substeps: u32) -> Result<(), WorldError> {
        if substeps == 0 || !dt.is_finite() || dt < 0.0 {
            return Err(WorldError::InvalidConfig(format!(
                "cannot simulate dt={dt} over {substeps} substeps"
            )));
        }
        self.check_finite()?;

        let step = dt / substeps as f64;
        for _ in 0..substeps {
            let previous = self
                .bodies
                .values()
                .map(|b| b.state.position)
                .collect::<Vec<_>>();
            for body in self.bodies.values_mut().filter(|b| b.is_moving()) {
                body.state = body.state.integrated(step);
            }
            self.resolve_obstacle_contacts();
            if self.enable_agent_collisions {
                self.resolve_agent_contacts();
            }
            self.contain();
            self.undo_blocked_moves(&previous);
            self.check_finite()?;
        }
        Ok(())
    }

    fn body(&self, id: &str) -> Result<&Body, WorldError> {
        self.bodies
            .get(id)
            .ok_or_else(|| WorldError::UnknownEntity(id.to_owned()))
    }

    fn body_mut(&mut self, id: &str) -> Result<&mut Body, WorldError> {
        self.bodies
            .get_mut(id)
            .ok_or_else(|| WorldError::UnknownEntity(id.to_owned()))
    }

    fn check_finite(&self) -> Result<(), WorldError> {
        match self
            .bodies
            .values()
            .find(|b| b.is_moving() && !b.state.is_finite())
        {
            Some(body) => {
                warn!(id = body.entity.id(), state = ?body.state, "non-finite entity state");
                Err(WorldError::NonFiniteState {
                    id: body.entity.id().to_owned(),
                })
            }
            None => Ok(()),
        }
    }

    fn resolve_obstacle_contacts(&mut self) {
        let blocks = self.static_circles();
        if blocks.is_empty() {
            return;
        }
        for body in self.bodies.values_mut().filter(|b| b.is_moving()) {
            for block in &blocks {
                let shape = body.shape();
                if let Some(depth) = shape.penetration(block) {
                    let normal = separation_normal(block.position, shape.position);
                    trace!(id = body.entity.id(), depth, "push out of obstacle");
                    body.state.position = shape.position + normal * depth;
                }
            }
        }
    }

    fn resolve_agent_contacts(&mut self) {
        let movers = self
            .bodies
            .values()
            .enumerate()
            .filter(|(_, b)| b.is_moving())
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        for (n, &i) in movers.iter().enumerate() {
            for &j in &movers[n + 1..] {
                let (Some((_, a)), Some((_, b))) =
                    (self.bodies.get_index(i), self.bodies.get_index(j))
                else {
                    continue;
                };
                let (a, b) = (a.shape(), b.shape());
                let Some(depth) = a.penetration(&b) else {
                    continue;
                };
                let push = separation_normal(a.position, b.position) * (depth / 2.0);
                if let Some((_, body)) = self.bodies.get_index_mut(i) {
                    body.state.position = a.position - push;
                }
                if let Some((_, body)) = self.bodies.get_index_mut(j) {
                    body.state.position = b.position + push;
                }
                trace!(i, j, depth, "push agents apart");
            }
        }
    }

    fn undo_blocked_moves(&mut self, previous: &[Position]) {
        let blocks = self.static_circles();
        if blocks.is_empty() {
            return;
        }
        for (body, &position) in self.bodies.values_mut().zip(previous) {
            if !body.is_moving() {
                continue;
            }
            let shape = body.shape();
            let blocked = blocks.iter().any(|block| {
                shape
                    .penetration(block)
                    .is_some_and(|depth| depth > CONTACT_TOLERANCE)
            });
            if blocked {
                trace!(id = body.entity.id(), ?position, "move blocked between wall and obstacle");
                body.state.position = position;
            }
        }
    }

    fn contain(&mut self) {
        for body in self.bodies.values_mut().filter(|b| b.is_moving()) {
            let radius = body.entity.radius();
            if !self.boundary.contains(body.state.position, radius) {
                let projected = self.boundary.project(body.state.position, radius);
                trace!(id = body.entity.id(), ?projected, "project onto boundary");
                body.state.position = projected;
            }
        }
    }
}

/// Unit vector pointing from `from` to `to`; coincident points separate along +x.
fn separation_normal(from: Position, to: Position) -> Position {
    let offset = to - from;
    let distance = offset.norm();
    if distance > 0.0 {
        offset * (1.0 / distance)
    } else {
        Position::new(1.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::super::{Angle, CircularBoundary, Movability, SquareBoundary, Velocity};
    use super::*;
    use crate::tests::{agent, circular_world, square_world};

    #[test]
    fn test_world_rejects_duplicate_entity() {
        let mut world = square_world(10.0);
        world.add_entity(agent("a", 0.5), None).unwrap();
        assert_eq!(
            world.add_entity(agent("a", 0.5), None),
            Err(WorldError::DuplicateEntity("a".into()))
        );
    }

    #[rstest]
    #[case::zero_size(Boundary::square(0.0))]
    #[case::negative_radius(Boundary::circular(Position::new(0.0, 0.0), -1.0))]
    #[case::nan(Boundary::square(f64::NAN))]
    fn test_world_rejects_invalid_boundary(#[case] boundary: Boundary) {
        assert!(matches!(
            World::new(boundary, false),
            Err(WorldError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_world_rejects_oversized_entity() {
        let mut world = square_world(2.0);
        assert!(matches!(
            world.add_entity(agent("big", 1.5), None),
            Err(WorldError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_world_unknown_entity() {
        let mut world = square_world(10.0);
        assert_eq!(
            world.get_state("ghost"),
            Err(WorldError::UnknownEntity("ghost".into()))
        );
        assert_eq!(
            world.set_state("ghost", EntityState::default()),
            Err(WorldError::UnknownEntity("ghost".into()))
        );
    }

    #[test]
    fn test_world_default_state_is_center() {
        let mut world = circular_world(5.0);
        world.add_entity(agent("a", 0.5), None).unwrap();
        let state = world.get_state("a").unwrap();
        assert_abs_diff_eq!(state.position, Position::new(5.0, 5.0));
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(10)]
    fn test_world_simulate_at_rest(#[case] substeps: u32) {
        let mut world = square_world(10.0);
        let state = EntityState::at(3.0, 4.0, 0.75 * PI);
        world.add_entity(agent("a", 0.5), Some(state)).unwrap();
        for _ in 0..5 {
            world.simulate(0.1, substeps).unwrap();
        }
        assert_eq!(world.get_state("a").unwrap(), state);
    }

    #[test]
    fn test_world_simulate_moves_and_turns() {
        let mut world = square_world(10.0);
        let state = EntityState::at(2.0, 2.0, 0.0)
            .with_velocity(Velocity::new(1.0, 0.5))
            .with_angular_velocity(0.5 * PI);
        world.add_entity(agent("a", 0.5), Some(state)).unwrap();
        world.simulate(1.0, 10).unwrap();
        let state = world.get_state("a").unwrap();
        assert_abs_diff_eq!(state.position, Position::new(3.0, 2.5), epsilon = 1e-12);
        assert_abs_diff_eq!(state.heading, Angle::new(0.5 * PI), epsilon = 1e-12);
    }

    #[test]
    fn test_world_circular_containment() {
        let mut world = World::new(CircularBoundary::new(Position::new(0.0, 0.0), 5.0), false)
            .unwrap();
        let state = EntityState::at(0.0, 0.0, 0.25 * PI)
            .with_velocity(Velocity::from_heading(3.0, Angle::new(0.25 * PI)));
        world.add_entity(agent("a", 0.5), Some(state)).unwrap();
        for _ in 0..20 {
            world.simulate(0.5, 5).unwrap();
            assert!(world.get_state("a").unwrap().position.norm() <= 5.0);
        }
        assert_abs_diff_eq!(
            world.get_state("a").unwrap().position.norm(),
            4.5,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_world_square_containment() {
        let mut world = World::new(SquareBoundary::new(8.0), false).unwrap();
        let state = EntityState::at(4.0, 4.0, 0.0).with_velocity(Velocity::new(-5.0, 7.0));
        world.add_entity(agent("a", 0.5), Some(state)).unwrap();
        for _ in 0..20 {
            world.simulate(0.1, 10).unwrap();
            let position = world.get_state("a").unwrap().position;
            assert!((0.0..=8.0).contains(&position.x()));
            assert!((0.0..=8.0).contains(&position.y()));
        }
        assert_abs_diff_eq!(
            world.get_state("a").unwrap().position,
            Position::new(0.5, 7.5)
        );
    }

    #[test]
    fn test_world_copy_is_independent() {
        let mut world = square_world(10.0);
        let state = EntityState::at(5.0, 5.0, 0.0).with_velocity(Velocity::new(1.0, 0.0));
        world.add_entity(agent("a", 0.5), Some(state)).unwrap();

        let mut copy = world.copy();
        copy.simulate(1.0, 10).unwrap();
        copy.set_state("a", EntityState::at(1.0, 1.0, 0.0)).unwrap();

        assert_eq!(world.get_state("a").unwrap(), state);
        world.simulate(1.0, 10).unwrap();
        assert_abs_diff_eq!(
            world.get_state("a").unwrap().position,
            Position::new(6.0, 5.0),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(copy.get_state("a").unwrap().position, Position::new(1.0, 1.0));
    }

    #[rstest]
    #[case::position(EntityState::at(f64::NAN, 1.0, 0.0))]
    #[case::velocity(EntityState::at(1.0, 1.0, 0.0).with_velocity(Velocity::new(f64::INFINITY, 0.0)))]
    fn test_world_simulate_non_finite(#[case] state: EntityState) {
        let mut world = square_world(10.0);
        world.add_entity(agent("a", 0.5), Some(state)).unwrap();
        assert_eq!(
            world.simulate(0.1, 10),
            Err(WorldError::NonFiniteState { id: "a".into() })
        );
    }

    #[rstest]
    #[case::no_substeps(0.1, 0)]
    #[case::negative_dt(-0.1, 10)]
    #[case::nan_dt(f64::NAN, 10)]
    fn test_world_simulate_invalid_arguments(#[case] dt: f64, #[case] substeps: u32) {
        let mut world = square_world(10.0);
        assert!(matches!(
            world.simulate(dt, substeps),
            Err(WorldError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_world_obstacle_blocks_agent() {
        let mut world = square_world(10.0);
        world
            .add_obstacle(Obstacle::new(Position::new(5.0, 5.0), 1.0))
            .unwrap();
        let state = EntityState::at(2.0, 5.0, 0.0).with_velocity(Velocity::new(1.0, 0.0));
        world.add_entity(agent("a", 0.5), Some(state)).unwrap();
        for _ in 0..10 {
            world.simulate(0.5, 10).unwrap();
        }
        let position = world.get_state("a").unwrap().position;
        assert!(position.distance(Position::new(5.0, 5.0)) >= 1.5 - 1e-9);
        assert!(position.x() < 5.0);
    }

    #[test]
    fn test_world_agent_stops_at_gap_narrower_than_itself() {
        let mut world = square_world(10.0);
        world
            .add_obstacle(Obstacle::new(Position::new(1.2, 5.0), 1.0))
            .unwrap();
        let state = EntityState::at(0.5, 2.0, 0.5 * PI).with_velocity(Velocity::new(0.0, 1.0));
        world.add_entity(agent("a", 0.5), Some(state)).unwrap();
        for _ in 0..50 {
            world.simulate(0.1, 10).unwrap();
            let position = world.get_state("a").unwrap().position;
            assert!(position.distance(Position::new(1.2, 5.0)) >= 1.5 - 1e-9);
            assert!(position.x() >= 0.5 - 1e-12);
        }
        assert!(world.get_state("a").unwrap().position.y() < 5.0);
    }

    #[test]
    fn test_world_static_entity_blocks_agent() {
        let mut world = square_world(10.0);
        world
            .add_entity(
                Entity::new("rock", 1.0, Movability::Unmovable),
                Some(EntityState::at(5.0, 5.0, 0.0)),
            )
            .unwrap();
        let state = EntityState::at(5.0, 2.0, 0.0).with_velocity(Velocity::new(0.0, 2.0));
        world.add_entity(agent("a", 0.5), Some(state)).unwrap();
        world.simulate(2.0, 20).unwrap();
        assert_abs_diff_eq!(
            world.get_state("a").unwrap().position,
            Position::new(5.0, 3.5),
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            world.get_state("rock").unwrap().position,
            Position::new(5.0, 5.0)
        );
    }

    #[rstest]
    #[case::enabled(true, 1.0)]
    #[case::disabled(false, 0.0)]
    fn test_world_agent_collisions(#[case] enabled: bool, #[case] separation: f64) {
        let mut world = World::new(SquareBoundary::new(10.0), enabled).unwrap();
        world
            .add_entity(agent("a", 0.5), Some(EntityState::at(5.0, 5.0, 0.0)))
            .unwrap();
        world
            .add_entity(agent("b", 0.5), Some(EntityState::at(5.0, 5.0, 0.0)))
            .unwrap();
        world.simulate(0.1, 1).unwrap();
        let a = world.get_state("a").unwrap().position;
        let b = world.get_state("b").unwrap().position;
        assert_abs_diff_eq!(a.distance(b), separation, epsilon = 1e-12);
    }

    #[test]
    fn test_world_inactive_entity_is_frozen() {
        let mut world = World::new(SquareBoundary::new(10.0), true).unwrap();
        let state = EntityState::at(5.0, 5.0, 0.0).with_velocity(Velocity::new(1.0, 0.0));
        world.add_entity(agent("a", 0.5), Some(state)).unwrap();
        world
            .add_entity(agent("b", 0.5), Some(EntityState::at(5.2, 5.0, 0.0)))
            .unwrap();
        world.set_active("a", false).unwrap();
        world.simulate(1.0, 10).unwrap();
        assert_eq!(world.get_state("a").unwrap(), state);
        assert_abs_diff_eq!(
            world.get_state("b").unwrap().position,
            Position::new(5.2, 5.0)
        );
        assert!(world.circles_except("b").is_empty());
        assert_eq!(world.circles_of(["a", "b"]).unwrap().len(), 1);
    }

    #[test]
    fn test_world_config_build() {
        let config: WorldConfig = serde_json::from_str(
            r#"{"boundary": {"shape": "circular", "center": {"x": 1.0, "y": 1.0}, "radius": 1.0},
                "enable_agent_collisions": false}"#,
        )
        .unwrap();
        let world = config.build().unwrap();
        assert_eq!(
            *world.boundary(),
            Boundary::circular(Position::new(1.0, 1.0), 1.0)
        );
        assert!(!world.enable_agent_collisions());
    }
}
