//! Team of pursuer drones capturing an evading target in a circular arena.
//!
//! Pursuers fly at constant (or, with velocity control, commanded) speed and only steer. The
//! target is not an agent: it flees along the sum of repulsive pushes from every pursuer and
//! from the nearest point of the arena wall, at a speed drawn once per episode.

use std::f64::consts::PI;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_actions, Scenario, ScenarioError, Timestep};
use crate::domain::{
    normalize_angle, wrapped_difference, Angle, Boundary, BoundaryPolicy, Color, Engagement,
    EngagementRate, Entity, EntityState, Movability, Position, Velocity, World,
};

pub const MAX_PURSUER_SPEED: f64 = 10.0;
/// Bounds of the target speed as a multiple of [`MAX_PURSUER_SPEED`].
pub const TARGET_RELATIVE_SPEED: (f64, f64) = (0.5, 2.0);
/// Largest heading change per step.
pub const TURN_LIMIT: f64 = PI / 10.0;
pub const AGENT_RADIUS: f64 = 30.0;

const STEP_DURATION: f64 = 0.1;
const SUBSTEPS: u32 = 10;
const PURSUER_SPACING: f64 = 50.0;
const CAPTURE_REWARD: f64 = 100.0;
const CAPTURER_BONUS: f64 = 30.0;
const TARGET_ID: &str = "evader";
const PURSUER_COLOR: Color = Color([55, 155, 205, 255]);
const TARGET_COLOR: Color = Color([110, 55, 155, 255]);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PursuitConfig {
    pub num_agents: usize,
    /// Number of nearest teammates every pursuer observes.
    pub n_communicating_pursuers: usize,
    /// Arena radius.
    pub arena_size: f64,
    /// Targets and teammates farther away than this are not visible.
    pub observation_limit: f64,
    /// Adds a speed factor in `[0, 1]` as the second action component.
    pub velocity_control: bool,
    pub capture_radius: f64,
    /// Episodes are truncated after this many steps; `None` runs until capture.
    pub max_episode_steps: Option<usize>,
}

impl Default for PursuitConfig {
    fn default() -> Self {
        Self {
            num_agents: 3,
            n_communicating_pursuers: 3,
            arena_size: 430.0,
            observation_limit: 430.0,
            velocity_control: false,
            capture_radius: 30.0,
            max_episode_steps: Some(100),
        }
    }
}

impl PursuitConfig {
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if !(2..=8).contains(&self.num_agents) {
            return Err(ScenarioError::InvalidConfig(format!(
                "num_agents must be in 2..=8, got {}",
                self.num_agents
            )));
        }
        let line_half_width = PURSUER_SPACING * (self.num_agents / 2) as f64 + AGENT_RADIUS;
        if !self.arena_size.is_finite() || self.arena_size < line_half_width {
            return Err(ScenarioError::InvalidConfig(format!(
                "arena_size {} cannot hold {} pursuers",
                self.arena_size, self.num_agents
            )));
        }
        if self.observation_limit.is_nan() || self.observation_limit < 0.0 {
            return Err(ScenarioError::InvalidConfig(format!(
                "observation_limit must be non-negative, got {}",
                self.observation_limit
            )));
        }
        if !(self.capture_radius.is_finite() && self.capture_radius > 0.0) {
            return Err(ScenarioError::InvalidConfig(format!(
                "capture_radius must be positive, got {}",
                self.capture_radius
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PursuitState {
    pub pursuers: Vec<EntityState>,
    pub prev_pursuers: Vec<EntityState>,
    pub target: EntityState,
    pub prev_target: EntityState,
    pub target_speed: f64,
}

#[derive(Clone, Debug)]
pub struct Pursuit {
    config: PursuitConfig,
    world: World,
    pursuer_ids: Vec<String>,
}

impl Pursuit {
    pub fn new(config: PursuitConfig) -> Result<Self, ScenarioError> {
        config.validate()?;
        let r = config.arena_size;
        let mut world = World::new(Boundary::circular(Position::new(r, r), r), false)?;

        let pursuer_ids = (0..config.num_agents)
            .map(|i| format!("pursuer_{i}"))
            .collect::<Vec<_>>();
        for id in &pursuer_ids {
            world.add_entity(
                Entity::new(id.clone(), AGENT_RADIUS, Movability::Movable)
                    .with_color(PURSUER_COLOR),
                None,
            )?;
        }
        world.add_entity(
            Entity::new(TARGET_ID, AGENT_RADIUS, Movability::Movable).with_color(TARGET_COLOR),
            None,
        )?;

        Ok(Self {
            config,
            world,
            pursuer_ids,
        })
    }

    pub fn config(&self) -> &PursuitConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Largest normalised change of the target distance in one step. Derived from the maximum
    /// speeds alone and kept static.
    pub fn max_range_rate(&self) -> f64 {
        MAX_PURSUER_SPEED * (1.0 + TARGET_RELATIVE_SPEED.1) / (2.0 * self.config.arena_size)
    }

    fn engagement(&self, observer: &EntityState, target: &EntityState) -> Option<Engagement> {
        Engagement::between(
            observer,
            target,
            self.config.observation_limit,
            2.0 * self.config.arena_size,
        )
    }

    fn observe_pursuer(&self, state: &PursuitState, i: usize) -> Vec<f64> {
        let me = &state.pursuers[i];
        let target = self.engagement(me, &state.target);
        let prev_target = self.engagement(&state.prev_pursuers[i], &state.prev_target);
        let rate = EngagementRate::between(target, prev_target, self.max_range_rate());

        let mut teammates = state
            .pursuers
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .filter_map(|(_, other)| self.engagement(me, other))
            .collect::<Vec<_>>();
        teammates.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        let heading = normalize_angle(me.heading.radians()) / PI;
        let prev_heading = normalize_angle(state.prev_pursuers[i].heading.radians()) / PI;

        let mut observation = vec![heading, wrapped_difference(heading, prev_heading)];
        observation.extend(Engagement::features(target));
        observation.extend(EngagementRate::features(rate));
        for k in 0..self.config.n_communicating_pursuers {
            observation.extend(Engagement::features(teammates.get(k).copied()));
        }
        observation
    }

    /// Velocity of the target fleeing from the pursuers and from the nearest wall point.
    fn evasion_velocity(&self, state: &PursuitState) -> Velocity {
        let target = state.target.position;
        let center = self.world.boundary().center();

        let mut push = state.pursuers.iter().fold(Position::default(), |acc, p| {
            acc + repulsion(p.position - target, 1.0)
        });
        let offset = target - center;
        let wall =
            center + Angle::new(offset.y().atan2(offset.x())).direction() * self.config.arena_size;
        push = push + repulsion(wall - target, 0.5 * state.pursuers.len() as f64);

        let norm = push.norm();
        if norm > 0.0 {
            let v = push * (state.target_speed / norm);
            Velocity::new(v.x(), v.y())
        } else {
            Velocity::default()
        }
    }

    /// Spread of the team around the target: `0` when every pursuer approaches from the side
    /// opposite to the closest one, up to `2 (n - 1) / n` when all come from the same side.
    pub fn q_formation(&self, state: &PursuitState) -> f64 {
        let target = state.target.position;
        let units = state
            .pursuers
            .iter()
            .map(|p| {
                let offset = p.position - target;
                let distance = offset.norm();
                if distance > 0.0 {
                    offset * (1.0 / distance)
                } else {
                    Position::default()
                }
            })
            .collect::<Vec<_>>();
        let closest = state
            .pursuers
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.position.distance(target)))
            .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                Some((_, best_d)) if best_d <= d => best,
                _ => Some((i, d)),
            });
        let Some((closest, _)) = closest else {
            return 0.0;
        };
        let total = units
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != closest)
            .map(|(_, u)| u.dot(units[closest]) + 1.0)
            .sum::<f64>();
        total / state.pursuers.len() as f64
    }

    fn rewards(&self, state: &PursuitState) -> (bool, Vec<f64>) {
        let q = self.q_formation(state);
        let distances = state
            .pursuers
            .iter()
            .map(|p| p.position.distance(state.target.position))
            .collect::<Vec<_>>();
        let captured = distances.iter().any(|&d| d < self.config.capture_radius);
        let rewards = distances
            .iter()
            .map(|&d| {
                let mut reward = -0.1 * q - 0.002 * d;
                if d < self.config.capture_radius {
                    reward += CAPTURER_BONUS;
                }
                if captured {
                    reward += CAPTURE_REWARD;
                }
                reward
            })
            .collect();
        (captured, rewards)
    }
}

/// Push away from an object at `offset` from the target, weakening with the L1 distance.
fn repulsion(offset: Position, factor: f64) -> Position {
    let l1 = offset.x().abs() + offset.y().abs();
    let strength = 50_000.0 / (l1 + 200.0).powi(2);
    offset * (-factor * strength / l1.max(1e-5))
}

impl Scenario for Pursuit {
    type State = PursuitState;

    fn agent_count(&self) -> usize {
        self.config.num_agents
    }

    fn action_dim(&self) -> usize {
        if self.config.velocity_control {
            2
        } else {
            1
        }
    }

    fn max_episode_steps(&self) -> Option<usize> {
        self.config.max_episode_steps
    }

    /// Pursuers start on a horizontal line through the centre; the target anywhere in a box of
    /// half-width `0.7 r` around the centre.
    fn sample_initial_state<R: Rng>(&self, rng: &mut R) -> PursuitState {
        let r = self.config.arena_size;
        let n = self.config.num_agents;
        let pursuers = (0..n)
            .map(|i| EntityState::at(PURSUER_SPACING * (i as f64 - (n / 2) as f64) + r, r, 0.0))
            .collect::<Vec<_>>();

        let bound = 0.7 * r;
        let x = rng.random::<f64>() * 2.0 * bound - bound + r;
        let y = rng.random::<f64>() * 2.0 * bound - bound + r;
        let target = EntityState::at(x, y, 0.0);

        let (lo, hi) = TARGET_RELATIVE_SPEED;
        let target_speed = (rng.random::<f64>() * (hi - lo) + lo) * MAX_PURSUER_SPEED;
        debug!(x, y, target_speed, "sample pursuit episode");

        PursuitState {
            prev_pursuers: pursuers.clone(),
            pursuers,
            target,
            prev_target: target,
            target_speed,
        }
    }

    /// Per pursuer: `[heading, turn rate, target bearing, target distance, bearing rate,
    /// range rate]` followed by `(bearing, distance)` of the nearest visible teammates, padded
    /// with `-1`.
    fn observe(&self, state: &PursuitState) -> Vec<Vec<f64>> {
        (0..state.pursuers.len())
            .map(|i| self.observe_pursuer(state, i))
            .collect()
    }

    fn step<R: Rng>(
        &mut self,
        state: &PursuitState,
        actions: &[Vec<f64>],
        _rng: &mut R,
    ) -> Result<Timestep<PursuitState>, ScenarioError> {
        check_actions(actions, self.agent_count(), self.action_dim())?;

        for ((id, current), action) in self.pursuer_ids.iter().zip(&state.pursuers).zip(actions) {
            let turn = action[0].clamp(-TURN_LIMIT, TURN_LIMIT);
            let speed_factor = if self.config.velocity_control {
                action[1].clamp(0.0, 1.0)
            } else {
                1.0
            };
            let heading = Angle::new(current.heading.radians() + turn).normalized();
            let velocity = Velocity::from_heading(speed_factor * MAX_PURSUER_SPEED, heading);
            self.world.set_state(
                id,
                current
                    .with_heading(heading)
                    .with_velocity(velocity)
                    .with_angular_velocity(0.0),
            )?;
        }
        let target_velocity = self.evasion_velocity(state);
        self.world
            .set_state(TARGET_ID, state.target.with_velocity(target_velocity))?;

        self.world.simulate(STEP_DURATION, SUBSTEPS)?;

        let next = PursuitState {
            pursuers: self
                .pursuer_ids
                .iter()
                .map(|id| self.world.get_state(id))
                .collect::<Result<Vec<_>, _>>()?,
            prev_pursuers: state.pursuers.clone(),
            target: self.world.get_state(TARGET_ID)?,
            prev_target: state.target,
            target_speed: state.target_speed,
        };

        let (captured, rewards) = self.rewards(&next);
        if captured {
            debug!(target = ?next.target.position, "target captured");
        }
        Ok(Timestep {
            observations: self.observe(&next),
            state: next,
            rewards,
            terminated: captured,
            truncated: false,
        })
    }
}
