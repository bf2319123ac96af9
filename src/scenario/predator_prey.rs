//! Predators cooperating to catch prey in a square arena with circular blocks.
//!
//! Predators are the controlled agents and sense the arena with rays: one pass for blocks and
//! walls, one for the other predators and one for the live prey. Prey are scripted. They run
//! from the nearest visible predator, otherwise from the nearest visible prey, otherwise in a
//! random direction. A prey is caught once enough predators are close to it at the same time.

use std::f64::consts::{PI, TAU};

use rand::{
    seq::{IndexedRandom, SliceRandom},
    Rng,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    check_actions,
    layout::{named_layout, Layout, AGENT_RADIUS},
    Scenario, ScenarioError, Timestep,
};
use crate::domain::{
    euclidean_distance, nearest_by_class, Angle, Boundary, CastOptions, Circle, Color, Entity,
    EntityState, Movability, Pose, Position, RaySensor, Velocity, World,
};

/// Reward shared out over all prey of an episode.
pub const R_MAX: f64 = 1.0;
/// Speed of prey and the largest holonomic predator speed per axis.
pub const STEP_VELOCITY: f64 = 0.5;
/// Predators at most this far from a prey take part in catching it.
pub const CATCH_DISTANCE: f64 = 1.2;
/// Largest heading change per step of a non-holonomic predator.
pub const TURN_LIMIT: f64 = PI / 10.0;

const STEP_DURATION: f64 = 0.1;
const SUBSTEPS: u32 = 10;
const PREDATOR_COLOR: Color = Color([55, 155, 205, 255]);
const PREY_COLOR: Color = Color([110, 55, 155, 255]);

/// State reported for a caught prey.
pub const CAUGHT_PREY_STATE: [f64; 6] = [-1.0, -1.0, 0.0, 0.0, 0.0, 0.0];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredatorPreyConfig {
    /// Name of a registered layout.
    pub world: String,
    pub num_predators: usize,
    pub num_prey: usize,
    /// Share every catch with all predators instead of only the ones involved.
    pub cooperative: bool,
    /// Predators needed to catch a prey. Defaults to `min(4, num_predators)`.
    pub prey_strength: Option<usize>,
    /// Sensor range, also the distance at which prey notice other agents.
    pub obs_dist: f64,
    pub n_sensors: usize,
    /// Actions are `(dx, dy)` when set, `(turn, speed)` otherwise.
    pub use_holonomic: bool,
    /// Overrides the step limit of the named layout.
    pub max_episode_steps: Option<usize>,
}

impl Default for PredatorPreyConfig {
    fn default() -> Self {
        Self {
            world: "10x10".into(),
            num_predators: 2,
            num_prey: 3,
            cooperative: true,
            prey_strength: None,
            obs_dist: 2.0,
            n_sensors: 10,
            use_holonomic: true,
            max_episode_steps: None,
        }
    }
}

impl PredatorPreyConfig {
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if !(2..=8).contains(&self.num_predators) {
            return Err(ScenarioError::InvalidConfig(format!(
                "num_predators must be in 2..=8, got {}",
                self.num_predators
            )));
        }
        if self.num_prey == 0 {
            return Err(ScenarioError::InvalidConfig(
                "num_prey must be positive".into(),
            ));
        }
        if !(self.obs_dist.is_finite() && self.obs_dist > 0.0) {
            return Err(ScenarioError::InvalidConfig(format!(
                "obs_dist must be positive, got {}",
                self.obs_dist
            )));
        }
        if self.n_sensors == 0 {
            return Err(ScenarioError::InvalidConfig(
                "n_sensors must be positive".into(),
            ));
        }
        let strength = self.prey_strength();
        let max_strength = self.num_predators.min(4);
        if !(1..=max_strength).contains(&strength) {
            return Err(ScenarioError::InvalidConfig(format!(
                "prey_strength must be in 1..={max_strength}, got {strength}"
            )));
        }
        Ok(())
    }

    pub fn prey_strength(&self) -> usize {
        self.prey_strength
            .unwrap_or_else(|| self.num_predators.min(4))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PredatorPreyState {
    pub predators: Vec<EntityState>,
    /// Caught prey hold [`CAUGHT_PREY_STATE`].
    pub prey: Vec<EntityState>,
    pub prey_caught: Vec<bool>,
}

impl PredatorPreyState {
    pub fn all_caught(&self) -> bool {
        self.prey_caught.iter().all(|&caught| caught)
    }
}

fn caught_prey_state() -> EntityState {
    let [x, y, heading, vx, vy, angular_velocity] = CAUGHT_PREY_STATE;
    EntityState::at(x, y, heading)
        .with_velocity(Velocity::new(vx, vy))
        .with_angular_velocity(angular_velocity)
}

/// Prey caught during one step with the predators close enough to take part.
struct Catch {
    involved: Vec<usize>,
}

#[derive(Clone, Debug)]
pub struct PredatorPrey {
    config: PredatorPreyConfig,
    layout: Layout,
    world: World,
    sensor: RaySensor,
    predator_ids: Vec<String>,
    prey_ids: Vec<String>,
    max_episode_steps: Option<usize>,
}

impl PredatorPrey {
    /// Scenario on the registered layout named by `config.world`.
    pub fn new(config: PredatorPreyConfig) -> Result<Self, ScenarioError> {
        let named = named_layout(&config.world)
            .ok_or_else(|| ScenarioError::UnknownLayout(config.world.clone()))?;
        let max_episode_steps = config.max_episode_steps.or(Some(named.max_episode_steps));
        Self::with_layout(named.layout.clone(), config, max_episode_steps)
    }

    /// Scenario on a custom layout; `config.world` is ignored.
    pub fn with_layout(
        layout: Layout,
        config: PredatorPreyConfig,
        max_episode_steps: Option<usize>,
    ) -> Result<Self, ScenarioError> {
        config.validate()?;
        if layout.predator_starts().len() < config.num_predators {
            return Err(ScenarioError::InvalidConfig(format!(
                "layout has {} predator start positions, {} predators requested",
                layout.predator_starts().len(),
                config.num_predators
            )));
        }
        if layout.prey_starts().len() < config.num_prey {
            return Err(ScenarioError::InvalidConfig(format!(
                "layout has {} prey start positions, {} prey requested",
                layout.prey_starts().len(),
                config.num_prey
            )));
        }

        let mut world = World::new(Boundary::square(layout.size() as f64), true)?;
        for block in layout.blocks() {
            world.add_obstacle(*block)?;
        }
        let predator_ids = (0..config.num_predators)
            .map(|i| format!("pred_{i}"))
            .collect::<Vec<_>>();
        let prey_ids = (0..config.num_prey)
            .map(|i| format!("prey_{i}"))
            .collect::<Vec<_>>();
        for id in &predator_ids {
            world.add_entity(
                Entity::new(id.clone(), AGENT_RADIUS, Movability::Movable)
                    .with_color(PREDATOR_COLOR),
                None,
            )?;
        }
        for id in &prey_ids {
            world.add_entity(
                Entity::new(id.clone(), AGENT_RADIUS, Movability::Movable).with_color(PREY_COLOR),
                None,
            )?;
        }

        Ok(Self {
            sensor: RaySensor::new(config.n_sensors, config.obs_dist, true)?,
            config,
            layout,
            world,
            predator_ids,
            prey_ids,
            max_episode_steps,
        })
    }

    pub fn config(&self) -> &PredatorPreyConfig {
        &self.config
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direction every live prey runs in this step. Caught prey get `0`.
    fn prey_move_angles<R: Rng>(&self, state: &PredatorPreyState, rng: &mut R) -> Vec<f64> {
        let live_prey = state.prey_caught.iter().filter(|&&caught| !caught).count();
        state
            .prey
            .iter()
            .enumerate()
            .map(|(i, prey)| {
                if state.prey_caught[i] {
                    return 0.0;
                }
                let predators = state.predators.iter().map(|p| p.position);
                if let Some(threat) = self.nearest_visible(prey.position, predators, rng) {
                    return away_from(prey.position, threat);
                }
                if live_prey > 1 {
                    let others = state
                        .prey
                        .iter()
                        .enumerate()
                        .filter(|&(j, _)| j != i && !state.prey_caught[j])
                        .map(|(_, p)| p.position);
                    if let Some(other) = self.nearest_visible(prey.position, others, rng) {
                        return away_from(prey.position, other);
                    }
                }
                rng.random_range(0.0..TAU)
            })
            .collect()
    }

    /// Nearest of `candidates` within `obs_dist`; equally near candidates are picked at random.
    fn nearest_visible<R: Rng>(
        &self,
        from: Position,
        candidates: impl Iterator<Item = Position>,
        rng: &mut R,
    ) -> Option<Position> {
        let candidates = candidates
            .map(|p| (p, euclidean_distance(from, p)))
            .collect::<Vec<_>>();
        let nearest = candidates
            .iter()
            .map(|&(_, d)| d)
            .min_by(f64::total_cmp)?;
        if nearest > self.config.obs_dist {
            return None;
        }
        let ties = candidates
            .iter()
            .filter(|&&(_, d)| d == nearest)
            .map(|&(p, _)| p)
            .collect::<Vec<_>>();
        ties.choose(rng).copied()
    }

    fn predator_command(&self, current: &EntityState, action: &[f64]) -> EntityState {
        let (heading, velocity) = if self.config.use_holonomic {
            let dx = action[0].clamp(-1.0, 1.0);
            let dy = action[1].clamp(-1.0, 1.0);
            (Angle::new(dy.atan2(dx)), Velocity::new(dx, dy))
        } else {
            let turn = action[0].clamp(-TURN_LIMIT, TURN_LIMIT);
            let speed = action[1].clamp(0.0, 1.0);
            let heading = Angle::new(current.heading.radians() + turn).normalized();
            (heading, Velocity::from_heading(speed, heading))
        };
        current
            .with_heading(heading)
            .with_velocity(velocity)
            .with_angular_velocity(0.0)
    }

    fn observe_predator(&self, state: &PredatorPreyState, i: usize) -> Vec<f64> {
        let pose = Pose::from(state.predators[i]);
        let circles = |states: Vec<&EntityState>| {
            states
                .into_iter()
                .map(|s| Circle::new(s.position, AGENT_RADIUS))
                .collect::<Vec<_>>()
        };
        let predators = circles(
            state
                .predators
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, s)| s)
                .collect(),
        );
        let prey = circles(
            state
                .prey
                .iter()
                .zip(&state.prey_caught)
                .filter(|&(_, &caught)| !caught)
                .map(|(s, _)| s)
                .collect(),
        );

        let passes = [
            self.sensor
                .cast(&self.world, pose, &[], CastOptions::ENVIRONMENT),
            self.sensor
                .cast(&self.world, pose, &predators, CastOptions::TARGETS_ONLY),
            self.sensor
                .cast(&self.world, pose, &prey, CastOptions::TARGETS_ONLY),
        ];
        nearest_by_class(&passes, self.sensor.max_range())
    }

    /// Marks prey caught at the end of a step and records who caught them.
    fn catch_prey(&self, next: &mut PredatorPreyState) -> Vec<Catch> {
        let strength = self.config.prey_strength();
        let mut catches = vec![];
        for (prey, caught) in next.prey.iter_mut().zip(next.prey_caught.iter_mut()) {
            if *caught {
                *prey = caught_prey_state();
                continue;
            }
            let involved = next
                .predators
                .iter()
                .enumerate()
                .filter(|(_, p)| euclidean_distance(p.position, prey.position) <= CATCH_DISTANCE)
                .map(|(j, _)| j)
                .collect::<Vec<_>>();
            if involved.len() >= strength {
                debug!(position = ?prey.position, ?involved, "prey caught");
                *caught = true;
                *prey = caught_prey_state();
                catches.push(Catch { involved });
            }
        }
        catches
    }

    fn rewards(&self, catches: &[Catch]) -> Vec<f64> {
        let per_prey = R_MAX / self.config.num_prey as f64;
        if self.config.cooperative {
            return vec![catches.len() as f64 * per_prey; self.config.num_predators];
        }
        let mut rewards = vec![0.0; self.config.num_predators];
        for catch in catches {
            let share = per_prey / catch.involved.len() as f64;
            for &j in &catch.involved {
                rewards[j] += share;
            }
        }
        rewards
    }
}

fn away_from(position: Position, threat: Position) -> f64 {
    let offset = position - threat;
    offset.y().atan2(offset.x())
}

impl Scenario for PredatorPrey {
    type State = PredatorPreyState;

    fn agent_count(&self) -> usize {
        self.config.num_predators
    }

    fn action_dim(&self) -> usize {
        2
    }

    fn max_episode_steps(&self) -> Option<usize> {
        self.max_episode_steps
    }

    /// Predators and prey start on randomly chosen start positions of the layout, at rest and
    /// facing `+x`.
    fn sample_initial_state<R: Rng>(&self, rng: &mut R) -> PredatorPreyState {
        let mut predator_starts = self.layout.predator_starts().to_vec();
        predator_starts.shuffle(rng);
        let mut prey_starts = self.layout.prey_starts().to_vec();
        prey_starts.shuffle(rng);

        let at_rest = |p: &Position| EntityState::at(p.x(), p.y(), 0.0);
        PredatorPreyState {
            predators: predator_starts
                .iter()
                .take(self.config.num_predators)
                .map(at_rest)
                .collect(),
            prey: prey_starts
                .iter()
                .take(self.config.num_prey)
                .map(at_rest)
                .collect(),
            prey_caught: vec![false; self.config.num_prey],
        }
    }

    /// Per predator: `3 * n_sensors` ray readings, blocks and walls first, then other
    /// predators, then live prey. Every ray reports in the block of its nearest class only.
    fn observe(&self, state: &PredatorPreyState) -> Vec<Vec<f64>> {
        (0..state.predators.len())
            .map(|i| self.observe_predator(state, i))
            .collect()
    }

    fn step<R: Rng>(
        &mut self,
        state: &PredatorPreyState,
        actions: &[Vec<f64>],
        rng: &mut R,
    ) -> Result<Timestep<PredatorPreyState>, ScenarioError> {
        check_actions(actions, self.agent_count(), self.action_dim())?;

        let angles = self.prey_move_angles(state, rng);
        for (((id, prey), &caught), angle) in self
            .prey_ids
            .iter()
            .zip(&state.prey)
            .zip(&state.prey_caught)
            .zip(angles)
        {
            self.world.set_active(id, !caught)?;
            if caught {
                continue;
            }
            let heading = Angle::new(angle);
            self.world.set_state(
                id,
                prey.with_heading(heading)
                    .with_velocity(Velocity::from_heading(STEP_VELOCITY, heading))
                    .with_angular_velocity(0.0),
            )?;
        }
        for ((id, current), action) in self.predator_ids.iter().zip(&state.predators).zip(actions)
        {
            let command = self.predator_command(current, action);
            self.world.set_state(id, command)?;
        }

        self.world.simulate(STEP_DURATION, SUBSTEPS)?;

        let mut next = PredatorPreyState {
            predators: self
                .predator_ids
                .iter()
                .map(|id| self.world.get_state(id))
                .collect::<Result<Vec<_>, _>>()?,
            prey: self
                .prey_ids
                .iter()
                .map(|id| self.world.get_state(id))
                .collect::<Result<Vec<_>, _>>()?,
            prey_caught: state.prey_caught.clone(),
        };
        let catches = self.catch_prey(&mut next);
        let rewards = self.rewards(&catches);
        let terminated = next.all_caught();
        if terminated {
            debug!("all prey caught");
        }

        Ok(Timestep {
            observations: self.observe(&next),
            state: next,
            rewards,
            terminated,
            truncated: false,
        })
    }
}
