//! Multi-agent scenarios layered on the arena engine.
//!
//! A scenario owns its [`World`](crate::domain::World) and turns joint actions into the next
//! immutable state value together with observations, rewards and termination. Every stochastic
//! choice draws from the generator passed in, so an episode is reproducible from its seed.

pub mod layout;
pub mod predator_prey;
pub mod pursuit;

use rand::Rng;
use thiserror::Error;

use crate::domain::WorldError;
use layout::LayoutError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScenarioError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unknown layout {0:?}")]
    UnknownLayout(String),
    #[error("expected actions for {expected} agents, got {actual}")]
    ActionCount { expected: usize, actual: usize },
    #[error("invalid action for agent {agent}: {reason}")]
    InvalidAction { agent: usize, reason: String },
    #[error("episode has not been reset")]
    NotReset,
    #[error("episode is over, reset before stepping")]
    EpisodeOver,
    #[error(transparent)]
    World(#[from] WorldError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Outcome of one joint step.
#[derive(Clone, Debug, PartialEq)]
pub struct Timestep<S> {
    pub state: S,
    /// One observation vector per agent.
    pub observations: Vec<Vec<f64>>,
    /// One reward per agent.
    pub rewards: Vec<f64>,
    pub terminated: bool,
    pub truncated: bool,
}

impl<S> Timestep<S> {
    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

pub trait Scenario {
    type State: Clone;

    fn agent_count(&self) -> usize;

    /// Number of components of every agent's action vector.
    fn action_dim(&self) -> usize;

    fn max_episode_steps(&self) -> Option<usize>;

    fn sample_initial_state<R: Rng>(&self, rng: &mut R) -> Self::State;

    fn observe(&self, state: &Self::State) -> Vec<Vec<f64>>;

    /// Advances `state` by one step. Actions are clipped to their valid ranges; non-finite
    /// components and wrong shapes are rejected.
    fn step<R: Rng>(
        &mut self,
        state: &Self::State,
        actions: &[Vec<f64>],
        rng: &mut R,
    ) -> Result<Timestep<Self::State>, ScenarioError>;
}

/// Checks that there is one finite action of `dim` components per agent.
pub(crate) fn check_actions(
    actions: &[Vec<f64>],
    agents: usize,
    dim: usize,
) -> Result<(), ScenarioError> {
    if actions.len() != agents {
        return Err(ScenarioError::ActionCount {
            expected: agents,
            actual: actions.len(),
        });
    }
    for (agent, action) in actions.iter().enumerate() {
        if action.len() != dim {
            return Err(ScenarioError::InvalidAction {
                agent,
                reason: format!("expected {dim} components, got {}", action.len()),
            });
        }
        if action.iter().any(|a| !a.is_finite()) {
            return Err(ScenarioError::InvalidAction {
                agent,
                reason: format!("non-finite component in {action:?}"),
            });
        }
    }
    Ok(())
}
