//! Episode driver.
//!
//! The simulator owns a scenario, the single seeded generator every stochastic choice of an
//! episode draws from, and the current state value. Each step replaces the state wholesale.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::{
    domain::WorldError,
    scenario::{Scenario, ScenarioError, Timestep},
};

pub struct Simulator<S: Scenario> {
    scenario: S,
    rng: ChaCha8Rng,
    state: Option<S::State>,
    steps: usize,
    done: bool,
}

impl<S: Scenario> Simulator<S> {
    pub fn new(scenario: S, seed: u64) -> Self {
        Self {
            scenario,
            rng: ChaCha8Rng::seed_from_u64(seed),
            state: None,
            steps: 0,
            done: false,
        }
    }

    pub fn scenario(&self) -> &S {
        &self.scenario
    }

    pub fn state(&self) -> Option<&S::State> {
        self.state.as_ref()
    }

    /// Steps taken in the current episode.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Starts a new episode and returns the initial observations.
    pub fn reset(&mut self) -> Vec<Vec<f64>> {
        let state = self.scenario.sample_initial_state(&mut self.rng);
        let observations = self.scenario.observe(&state);
        info!(agents = self.scenario.agent_count(), "episode start");
        self.state = Some(state);
        self.steps = 0;
        self.done = false;
        observations
    }

    /// Applies one joint action. The episode is truncated once the scenario's step limit is
    /// reached; after termination, truncation or a non-finite world state the simulator must be
    /// reset.
    pub fn step(&mut self, actions: &[Vec<f64>]) -> Result<Timestep<S::State>, ScenarioError> {
        if self.done {
            return Err(ScenarioError::EpisodeOver);
        }
        let state = self.state.as_ref().ok_or(ScenarioError::NotReset)?;
        let mut timestep = match self.scenario.step(state, actions, &mut self.rng) {
            Ok(timestep) => timestep,
            Err(err @ ScenarioError::World(WorldError::NonFiniteState { .. })) => {
                warn!(error = %err, steps = self.steps, "episode aborted");
                self.done = true;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        self.steps += 1;
        if !timestep.terminated {
            timestep.truncated = self
                .scenario
                .max_episode_steps()
                .is_some_and(|limit| self.steps >= limit);
        }
        if timestep.is_done() {
            info!(
                steps = self.steps,
                terminated = timestep.terminated,
                truncated = timestep.truncated,
                "episode end"
            );
            self.done = true;
        }
        self.state = Some(timestep.state.clone());
        Ok(timestep)
    }
}
