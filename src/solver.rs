use indicatif::ProgressBar;
use log::{Level, debug, info, log_enabled, trace};

use crate::Float;
use crate::boundary::{BorderSwapInfo, FlowParams, InletOutletPolicy};
use crate::config::{Algorithm, Config, ConfigError};
use crate::domain::Domain;
use crate::grid::{Grid, Indexer};
use crate::macroscopic::StepData;
use crate::parallel::{self, StripLayout};
use crate::{parallel_shift, shift, swap, two_lattice, two_step};

/// Immutable per-run parameters threaded through the engines.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub idx: Indexer,
    pub relaxation_time: Float,
    pub policy: InletOutletPolicy,
    pub flow: FlowParams,
    /// Enables the per-iteration distribution dumps at trace level.
    pub debug_mode: bool,
}

/// Everything a finished run produced: the domain it ran on, the buffer
/// rows of the stored lattice (empty for sequential runs) and the captured
/// observables of every time step.
#[derive(Debug)]
pub struct SimulationOutput {
    pub domain: Domain,
    pub buffer_rows: Vec<usize>,
    pub steps: Vec<StepData>,
}

impl SimulationOutput {
    /// Maps a stored row to its physical row, skipping buffer rows.
    /// Returns `None` for buffer rows themselves.
    pub fn physical_row(&self, y: usize) -> Option<usize> {
        if self.buffer_rows.contains(&y) {
            return None;
        }
        let skipped = self.buffer_rows.iter().filter(|&&b| b < y).count();
        Some(y - skipped)
    }
}

pub(crate) fn run_progress(name: &str, iterations: usize) -> ProgressBar {
    info!("running {name} for {iterations} iterations");
    ProgressBar::new(iterations as u64)
}

/// Dumps the whole distribution field at trace level, top row first.
/// `offset` selects the frame for the shift engine.
pub(crate) fn trace_distributions(
    label: &str,
    values: &[Float],
    idx: &Indexer,
    grid: Grid,
    offset: usize,
) {
    if !log_enabled!(Level::Trace) {
        return;
    }
    trace!("{label}:");
    for y in (0..grid.height).rev() {
        for x in 0..grid.width {
            let node = grid.node_index(x, y);
            trace!("  ({x},{y}): {:?}", idx.read(values, node + offset));
        }
    }
}

/// Validates the configuration, sets up the matching domain and runs the
/// selected algorithm for the configured number of time steps.
pub fn execute(config: &Config) -> Result<SimulationOutput, ConfigError> {
    config.validate()?;

    let grid = config.grid();
    let domain = Domain::channel(grid);
    let ctx = RunContext {
        idx: Indexer::new(
            config.access_pattern,
            if config.algorithm.is_shift() {
                config.shift_value_count()
            } else {
                config.total_node_count()
            },
        ),
        relaxation_time: config.relaxation_time,
        policy: config.inout_policy,
        flow: config.flow,
        debug_mode: config.debug_mode,
    };
    let iterations = config.time_steps;

    if config.debug_mode {
        debug!(
            "domain {}x{}, {} fluid nodes",
            grid.width,
            grid.height,
            domain.fluid_nodes.len()
        );
    }

    let mut buffer_rows = Vec::new();
    let steps = match config.algorithm {
        Algorithm::SequentialTwoLattice => {
            let bsi = BorderSwapInfo::build(grid, &domain.fluid_nodes, &domain.phase);
            let mut values_0 = domain.initial_distributions(&ctx.idx, &ctx.flow);
            let mut values_1 = values_0.clone();
            two_lattice::run(&domain, &bsi, &mut values_0, &mut values_1, &ctx, iterations)
        }
        Algorithm::SequentialTwoStep => {
            let bsi = BorderSwapInfo::build(grid, &domain.fluid_nodes, &domain.phase);
            let mut values = domain.initial_distributions(&ctx.idx, &ctx.flow);
            two_step::run(&domain, &bsi, &mut values, &ctx, iterations)
        }
        Algorithm::SequentialSwap => {
            let bsi = BorderSwapInfo::build_for_swap(grid, &domain.fluid_nodes, &domain.phase);
            let mut values = domain.initial_distributions(&ctx.idx, &ctx.flow);
            swap::run(&domain, &bsi, &mut values, &ctx, iterations)
        }
        Algorithm::SequentialShift => {
            let bsi = BorderSwapInfo::build(grid, &domain.fluid_nodes, &domain.phase);
            let mut values = domain.initial_distributions(&ctx.idx, &ctx.flow);
            shift::run(&domain, &bsi, &mut values, &ctx, iterations)
        }
        Algorithm::ParallelTwoLattice => {
            let bsi = BorderSwapInfo::build(grid, &domain.fluid_nodes, &domain.phase);
            let mut values_0 = domain.initial_distributions(&ctx.idx, &ctx.flow);
            let mut values_1 = values_0.clone();
            parallel::run_two_lattice(
                &domain,
                &bsi,
                &mut values_0,
                &mut values_1,
                &ctx,
                iterations,
            )
        }
        Algorithm::ParallelTwoLatticeFramework => {
            let layout = StripLayout::new(grid, config.subdomain_height, &domain.fluid_nodes)?;
            buffer_rows = layout.buffer_rows().to_vec();
            let bsi = BorderSwapInfo::build(grid, &domain.fluid_nodes, &domain.phase);
            let mut values_0 = domain.initial_distributions(&ctx.idx, &ctx.flow);
            let mut values_1 = values_0.clone();
            parallel::run_two_lattice_framework(
                &domain,
                &layout,
                &bsi,
                &mut values_0,
                &mut values_1,
                &ctx,
                iterations,
            )
        }
        Algorithm::ParallelTwoStep => {
            let layout = StripLayout::new(grid, config.subdomain_height, &domain.fluid_nodes)?;
            buffer_rows = layout.buffer_rows().to_vec();
            let bsi = BorderSwapInfo::build(grid, &domain.fluid_nodes, &domain.phase);
            let mut values = domain.initial_distributions(&ctx.idx, &ctx.flow);
            parallel::run_two_step(&domain, &layout, &bsi, &mut values, &ctx, iterations)
        }
        Algorithm::ParallelSwap => {
            let layout = StripLayout::new(grid, config.subdomain_height, &domain.fluid_nodes)?;
            buffer_rows = layout.buffer_rows().to_vec();
            let bsi = BorderSwapInfo::build_for_swap(grid, &domain.fluid_nodes, &domain.phase);
            let mut values = domain.initial_distributions(&ctx.idx, &ctx.flow);
            parallel::run_swap(&domain, &layout, &bsi, &mut values, &ctx, iterations)
        }
        Algorithm::ParallelShift => {
            let layout = StripLayout::new(grid, config.subdomain_height, &domain.fluid_nodes)?;
            buffer_rows = layout.buffer_rows().to_vec();
            let bsi = layout.subdomain_swap_info(&domain);
            let mut values = parallel_shift::setup_distributions(&domain, &layout, &ctx.idx, &ctx.flow);
            parallel_shift::run(&domain, &layout, &bsi, &mut values, &ctx, iterations)
        }
    };

    info!("simulation finished after {} steps", steps.len());
    Ok(SimulationOutput {
        domain,
        buffer_rows,
        steps,
    })
}
