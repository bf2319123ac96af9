//! Continuous 2-D multi-agent arena simulation.
//!
//! [`domain`] holds the physics engine: circular entities moving inside a bounded arena, ray
//! sensors and bearing/range geometry. [`scenario`] layers the pursuit-evasion and
//! predator-prey tasks on top of it, and [`Simulator`] drives seeded episodes of either.


pub mod domain;
pub mod scenario;
pub mod simulator;

pub use scenario::{Scenario, ScenarioError, Timestep};
pub use simulator::Simulator;
