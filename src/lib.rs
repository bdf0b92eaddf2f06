//! A grid-based agent model of disease spread.
//!
//! Gridsim simulates an infectious disease moving through a population of agents that live on a
//! bounded two dimensional grid. Every tick each agent moves, infected agents may transmit the
//! disease to healthy agents sharing their cell, infections progress, and sick agents may be
//! treated at hospitals that hold a finite supply of doses and close once they are over capacity.
//!
//! The central object is the [`Engine`], which exclusively owns the agents, hospitals and
//! occupancy [`Grid`] of a single run together with a seeded random number generator. A run is
//! a sequence of calls to [`Engine::step`] followed by one call to [`collect_stats`]:
//!
//! ```rust
//! use gridsim::{collect_stats, Engine, Parameters};
//!
//! let parameters = Parameters {
//!     num_agents: 50,
//!     num_hospitals: 2,
//!     initial_infected: 2,
//!     max_ticks: 30,
//!     ..Parameters::default()
//! };
//! let mut engine = Engine::new(&parameters, 42).unwrap();
//! engine.run(parameters.max_ticks).unwrap();
//! let stats = collect_stats(engine.agents(), engine.hospitals());
//! assert_eq!(stats.total_population, 50);
//! ```
//!
//! Independent replications of a run can be executed in parallel with
//! [`replication::run_replications`], and their summaries exported with
//! [`report::ReportWriter`].
pub mod agent;
pub mod engine;
pub mod error;
pub mod grid;
pub mod hospital;
pub mod log;
pub mod parameters;
pub mod population;
pub mod random;
pub mod replication;
pub mod report;
pub mod runner;
pub mod stats;

pub use agent::{Agent, AgentId, HealthStatus, ImmunityReason, Location};
pub use engine::Engine;
pub use error::SimError;
pub use grid::{Grid, Occupant};
pub use hospital::{Hospital, HospitalId};
pub use parameters::Parameters;
pub use population::{create_agents, create_hospitals};
pub use stats::{collect_stats, Stats};

// Deterministic hashing for the per-tick location index.
pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

// Re-exported so downstream drivers use the same versions as the engine.
pub use rand;
pub use rand_distr;
