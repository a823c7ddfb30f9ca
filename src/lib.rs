pub mod boundary;
pub mod collision;
pub mod config;
pub mod domain;
pub mod grid;
pub mod lattice;
pub mod macroscopic;
pub mod output;
pub mod parallel;
pub mod parallel_shift;
pub mod shift;
pub mod solver;
pub mod swap;
pub mod two_lattice;
pub mod two_step;

pub use boundary::{BorderSwapInfo, FlowParams, InletOutletPolicy};
pub use config::{Algorithm, Config, ConfigError};
pub use domain::Domain;
pub use grid::{AccessPattern, Grid, Indexer};
pub use lattice::{D2Q9, Velocity};
pub use macroscopic::StepData;
pub use solver::{RunContext, SimulationOutput};

pub type Float = f64;
