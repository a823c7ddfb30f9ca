use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use log::warn;
use serde::Deserialize;
use thiserror::Error;

use crate::Float;
use crate::boundary::{FlowParams, InletOutletPolicy};
use crate::grid::{AccessPattern, Grid};

/// Streaming scheme selection, sequential or parallel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    SequentialTwoLattice,
    SequentialTwoStep,
    SequentialSwap,
    SequentialShift,
    ParallelTwoLattice,
    ParallelTwoLatticeFramework,
    ParallelTwoStep,
    ParallelSwap,
    ParallelShift,
}

impl Algorithm {
    /// Whether the algorithm runs on the buffered lattice with strip
    /// decomposition. The plain parallel two-lattice does not: its double
    /// buffering already rules out write conflicts.
    pub fn uses_buffered_grid(&self) -> bool {
        matches!(
            self,
            Algorithm::ParallelTwoLatticeFramework
                | Algorithm::ParallelTwoStep
                | Algorithm::ParallelSwap
                | Algorithm::ParallelShift
        )
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, Algorithm::SequentialShift | Algorithm::ParallelShift)
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential_two_lattice" => Ok(Algorithm::SequentialTwoLattice),
            "sequential_two_step" => Ok(Algorithm::SequentialTwoStep),
            "sequential_swap" => Ok(Algorithm::SequentialSwap),
            "sequential_shift" => Ok(Algorithm::SequentialShift),
            "parallel_two_lattice" => Ok(Algorithm::ParallelTwoLattice),
            "parallel_two_lattice_framework" => Ok(Algorithm::ParallelTwoLatticeFramework),
            "parallel_two_step" => Ok(Algorithm::ParallelTwoStep),
            "parallel_swap" => Ok(Algorithm::ParallelSwap),
            "parallel_shift" => Ok(Algorithm::ParallelShift),
            _ => Err(ConfigError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl FromStr for AccessPattern {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collision" => Ok(AccessPattern::Collision),
            "stream" => Ok(AccessPattern::Stream),
            "bundle" => Ok(AccessPattern::Bundle),
            _ => Err(ConfigError::UnknownAccessPattern(s.to_string())),
        }
    }
}

impl FromStr for InletOutletPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "velocity_input_velocity_output" => Ok(InletOutletPolicy::VelocityInputVelocityOutput),
            "velocity_input_density_output" => Ok(InletOutletPolicy::VelocityInputDensityOutput),
            "density_input_density_output" => Ok(InletOutletPolicy::DensityInputDensityOutput),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

/// Fatal setup errors. The solver validates the whole configuration before
/// allocating anything; none of these are recoverable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),
    #[error("unknown access pattern: {0}")]
    UnknownAccessPattern(String),
    #[error("unknown inlet/outlet policy: {0}")]
    UnknownPolicy(String),
    #[error("grid must be at least 3x3 nodes, got {width}x{height}")]
    GridTooSmall { width: usize, height: usize },
    #[error("relaxation time must be positive, got {0}")]
    InvalidRelaxationTime(Float),
    #[error(
        "vertical node count {height} does not decompose into strips of height \
         {subdomain_height} separated by single buffer rows"
    )]
    MisalignedSubdomains {
        height: usize,
        subdomain_height: usize,
    },
    #[error("shift offset must equal horizontal_nodes + 1 = {expected}, got {actual}")]
    InvalidShiftOffset { expected: usize, actual: usize },
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("{key} = {value} conflicts with the derived value {expected}")]
    InconsistentValue {
        key: String,
        value: String,
        expected: String,
    },
}

/// Complete specification of a simulation run. Every algorithm reads the
/// same structure; parameters irrelevant to the selected algorithm are
/// simply unused.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub debug_mode: bool,
    pub results_to_csv: bool,
    pub algorithm: Algorithm,
    pub access_pattern: AccessPattern,
    pub inout_policy: InletOutletPolicy,
    pub horizontal_nodes: usize,
    pub vertical_nodes: usize,
    pub relaxation_time: Float,
    pub time_steps: usize,
    pub subdomain_height: usize,
    #[serde(flatten)]
    pub flow: FlowParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug_mode: false,
            results_to_csv: false,
            algorithm: Algorithm::SequentialTwoLattice,
            access_pattern: AccessPattern::Collision,
            inout_policy: InletOutletPolicy::VelocityInputDensityOutput,
            horizontal_nodes: 7,
            vertical_nodes: 26,
            relaxation_time: 1.4,
            time_steps: 10,
            subdomain_height: 8,
            flow: FlowParams::default(),
        }
    }
}

impl Config {
    /// Reads a configuration file, dispatching on the extension: `.json`
    /// files go through serde, anything else is treated as `name,value`
    /// rows (the `config.csv` convention).
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        let config = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("could not parse {}", path.display()))?
        } else {
            Self::from_csv_str(&content)
                .with_context(|| format!("could not parse {}", path.display()))?
        };
        Ok(config)
    }

    /// Parses `name,value` rows. Empty lines and lines starting with `#`
    /// are skipped; unrecognized keys are warned about and ignored. The
    /// derived keys of the interface (`total_node_count` and friends) are
    /// accepted and checked against the computed values.
    pub fn from_csv_str(content: &str) -> Result<Self, ConfigError> {
        let mut pairs = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(',') else {
                return Err(ConfigError::InvalidValue {
                    key: line.to_string(),
                    value: String::new(),
                });
            };
            pairs.push((key.trim().to_string(), value.trim().to_string()));
        }

        let mut config = Self::default();
        for (key, value) in &pairs {
            config.apply_primary_key(key, value)?;
        }
        for (key, value) in &pairs {
            config.check_derived_key(key, value)?;
        }
        Ok(config)
    }

    fn apply_primary_key(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "debug_mode" => self.debug_mode = parse_flag(value).ok_or_else(invalid)?,
            "results_to_csv" => self.results_to_csv = parse_flag(value).ok_or_else(invalid)?,
            "algorithm" => self.algorithm = value.parse()?,
            "access_pattern" => self.access_pattern = value.parse()?,
            "inout_policy" => self.inout_policy = value.parse()?,
            "horizontal_nodes" => self.horizontal_nodes = value.parse().map_err(|_| invalid())?,
            "vertical_nodes" => self.vertical_nodes = value.parse().map_err(|_| invalid())?,
            "relaxation_time" => self.relaxation_time = value.parse().map_err(|_| invalid())?,
            "time_steps" => self.time_steps = value.parse().map_err(|_| invalid())?,
            "subdomain_height" => self.subdomain_height = value.parse().map_err(|_| invalid())?,
            "inlet_velocity" => self.flow.inlet_velocity = parse_velocity(value).ok_or_else(invalid)?,
            "outlet_velocity" => {
                self.flow.outlet_velocity = parse_velocity(value).ok_or_else(invalid)?
            }
            "inlet_density" => self.flow.inlet_density = value.parse().map_err(|_| invalid())?,
            "outlet_density" => self.flow.outlet_density = value.parse().map_err(|_| invalid())?,
            "turbulence_factor" => {
                self.flow.turbulence_factor = value.parse().map_err(|_| invalid())?
            }
            // Derived keys are handled in the second pass.
            "total_node_count"
            | "total_nodes_excluding_buffers"
            | "vertical_nodes_excluding_buffers"
            | "subdomain_count"
            | "buffer_count"
            | "shift_offset"
            | "shift_distribution_value_count" => {}
            _ => warn!("ignoring unrecognized config key {key}"),
        }
        Ok(())
    }

    fn check_derived_key(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let expected = match key {
            "total_node_count" => self.total_node_count(),
            "total_nodes_excluding_buffers" => self.total_nodes_excluding_buffers(),
            "vertical_nodes_excluding_buffers" => self.vertical_nodes_excluding_buffers(),
            "subdomain_count" => self.subdomain_count(),
            "buffer_count" => self.buffer_count(),
            "shift_offset" => {
                let actual: usize = value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
                if actual != self.shift_offset() {
                    return Err(ConfigError::InvalidShiftOffset {
                        expected: self.shift_offset(),
                        actual,
                    });
                }
                return Ok(());
            }
            "shift_distribution_value_count" => self.shift_value_count(),
            _ => return Ok(()),
        };
        let actual: usize = value.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        if actual != expected {
            return Err(ConfigError::InconsistentValue {
                key: key.to_string(),
                value: value.to_string(),
                expected: expected.to_string(),
            });
        }
        Ok(())
    }

    pub fn grid(&self) -> Grid {
        Grid::new(self.horizontal_nodes, self.vertical_nodes)
    }

    pub fn total_node_count(&self) -> usize {
        self.horizontal_nodes * self.vertical_nodes
    }

    pub fn subdomain_count(&self) -> usize {
        (self.vertical_nodes + 1) / (self.subdomain_height + 1)
    }

    pub fn buffer_count(&self) -> usize {
        self.subdomain_count().saturating_sub(1)
    }

    pub fn vertical_nodes_excluding_buffers(&self) -> usize {
        if self.algorithm.uses_buffered_grid() {
            self.vertical_nodes - self.buffer_count()
        } else {
            self.vertical_nodes
        }
    }

    pub fn total_nodes_excluding_buffers(&self) -> usize {
        self.horizontal_nodes * self.vertical_nodes_excluding_buffers()
    }

    pub fn shift_offset(&self) -> usize {
        self.horizontal_nodes + 1
    }

    /// Per-direction stride of the shift engines: the node count plus one
    /// slack region for the sequential variant, one per strip for the
    /// parallel one.
    pub fn shift_value_count(&self) -> usize {
        match self.algorithm {
            Algorithm::ParallelShift => {
                self.total_node_count() + self.subdomain_count() * self.shift_offset()
            }
            _ => self.total_node_count() + self.shift_offset(),
        }
    }

    /// Checks everything the solver assumes before setup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizontal_nodes < 3 || self.vertical_nodes < 3 {
            return Err(ConfigError::GridTooSmall {
                width: self.horizontal_nodes,
                height: self.vertical_nodes,
            });
        }
        if !(self.relaxation_time > 0.0) {
            return Err(ConfigError::InvalidRelaxationTime(self.relaxation_time));
        }
        if self.algorithm.uses_buffered_grid() {
            let h = self.subdomain_height;
            if h < 2 || (self.vertical_nodes + 1) % (h + 1) != 0 {
                return Err(ConfigError::MisalignedSubdomains {
                    height: self.vertical_nodes,
                    subdomain_height: h,
                });
            }
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "0" | "false" => Some(false),
        "1" | "true" => Some(true),
        _ => None,
    }
}

/// A velocity value is one or two components separated by a semicolon or
/// whitespace, e.g. `0.1;0.0`.
fn parse_velocity(value: &str) -> Option<crate::lattice::Velocity> {
    let mut parts = value.split(|c: char| c == ';' || c.is_whitespace()).filter(|p| !p.is_empty());
    let x: Float = parts.next()?.parse().ok()?;
    let y: Float = match parts.next() {
        Some(part) => part.parse().ok()?,
        None => 0.0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some([x, y])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_round_trip_of_primary_keys() {
        let content = "\
# channel benchmark
algorithm,parallel_two_step
access_pattern,stream
inout_policy,velocity_input_density_output
horizontal_nodes,24
vertical_nodes,26
subdomain_height,8
relaxation_time,1.4
time_steps,50
inlet_velocity,0.1;0.0
inlet_density,1.0
results_to_csv,1
";
        let config = Config::from_csv_str(content).unwrap();
        assert_eq!(config.algorithm, Algorithm::ParallelTwoStep);
        assert_eq!(config.access_pattern, AccessPattern::Stream);
        assert_eq!(config.horizontal_nodes, 24);
        assert_eq!(config.subdomain_count(), 3);
        assert_eq!(config.buffer_count(), 2);
        assert_eq!(config.vertical_nodes_excluding_buffers(), 24);
        assert!(config.results_to_csv);
        assert_eq!(config.flow.inlet_velocity, [0.1, 0.0]);
        config.validate().unwrap();
    }

    #[test]
    fn consistent_derived_keys_are_accepted() {
        let content = "\
algorithm,parallel_swap
horizontal_nodes,7
vertical_nodes,26
subdomain_height,8
total_node_count,182
subdomain_count,3
buffer_count,2
vertical_nodes_excluding_buffers,24
total_nodes_excluding_buffers,168
shift_offset,8
";
        Config::from_csv_str(content).unwrap().validate().unwrap();
    }

    #[test]
    fn conflicting_derived_key_is_rejected() {
        let content = "\
horizontal_nodes,7
vertical_nodes,26
total_node_count,999
";
        assert!(matches!(
            Config::from_csv_str(content),
            Err(ConfigError::InconsistentValue { .. })
        ));
    }

    #[test]
    fn wrong_shift_offset_is_rejected() {
        let content = "\
horizontal_nodes,7
shift_offset,42
";
        assert!(matches!(
            Config::from_csv_str(content),
            Err(ConfigError::InvalidShiftOffset { expected: 8, actual: 42 })
        ));
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let content = "algorithm,sequential_leapfrog\n";
        assert!(matches!(
            Config::from_csv_str(content),
            Err(ConfigError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn validation_catches_bad_geometry() {
        let mut config = Config {
            horizontal_nodes: 2,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::GridTooSmall { .. })
        ));

        config.horizontal_nodes = 7;
        config.relaxation_time = -0.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRelaxationTime(_))
        ));

        config.relaxation_time = 1.4;
        config.algorithm = Algorithm::ParallelTwoStep;
        config.vertical_nodes = 25;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MisalignedSubdomains { .. })
        ));
    }

    #[test]
    fn json_config_parses() {
        let content = r#"{
            "algorithm": "sequential_shift",
            "access_pattern": "bundle",
            "horizontal_nodes": 9,
            "vertical_nodes": 9,
            "time_steps": 40,
            "inlet_velocity": [0.08, 0.0]
        }"#;
        let config: Config = serde_json::from_str(content).unwrap();
        assert_eq!(config.algorithm, Algorithm::SequentialShift);
        assert_eq!(config.shift_value_count(), 81 + 10);
        assert_eq!(config.flow.inlet_velocity, [0.08, 0.0]);
    }
}
