#![allow(dead_code)]

use approx::assert_abs_diff_eq;

use lbm2d::parallel::{self, StripLayout};
use lbm2d::{
    Algorithm, BorderSwapInfo, Domain, Float, FlowParams, Grid, InletOutletPolicy, RunContext,
    StepData, parallel_shift, shift, swap, two_lattice, two_step,
};
use lbm2d::grid::{AccessPattern, Indexer};

pub const TAU: Float = 1.4;

/// Captured observables of a run plus the stored-lattice geometry needed to
/// compare runs across different decompositions.
pub struct RunOutput {
    pub steps: Vec<StepData>,
    pub grid: Grid,
    pub buffer_rows: Vec<usize>,
}

impl RunOutput {
    /// Interior rows in physical order, buffer rows skipped.
    pub fn physical_rows(&self) -> Vec<usize> {
        (1..self.grid.height - 1)
            .filter(|y| !self.buffer_rows.contains(y))
            .collect()
    }
}

/// Runs any of the nine algorithms on the given domain and returns the
/// per-step observables. `subdomain_height` is ignored by the sequential
/// algorithms and the plain parallel two-lattice.
pub fn run_engine(
    algorithm: Algorithm,
    domain: &Domain,
    pattern: AccessPattern,
    policy: InletOutletPolicy,
    flow: FlowParams,
    subdomain_height: usize,
    iterations: usize,
) -> RunOutput {
    let grid = domain.grid;
    let node_count = grid.node_count();
    let shift_offset = shift::shift_offset(grid);

    let make_ctx = |stride: usize| RunContext {
        idx: Indexer::new(pattern, stride),
        relaxation_time: TAU,
        policy,
        flow,
        debug_mode: false,
    };

    let mut buffer_rows = Vec::new();
    let steps = match algorithm {
        Algorithm::SequentialTwoLattice => {
            let ctx = make_ctx(node_count);
            let bsi = BorderSwapInfo::build(grid, &domain.fluid_nodes, &domain.phase);
            let mut values_0 = domain.initial_distributions(&ctx.idx, &ctx.flow);
            let mut values_1 = values_0.clone();
            two_lattice::run(domain, &bsi, &mut values_0, &mut values_1, &ctx, iterations)
        }
        Algorithm::SequentialTwoStep => {
            let ctx = make_ctx(node_count);
            let bsi = BorderSwapInfo::build(grid, &domain.fluid_nodes, &domain.phase);
            let mut values = domain.initial_distributions(&ctx.idx, &ctx.flow);
            two_step::run(domain, &bsi, &mut values, &ctx, iterations)
        }
        Algorithm::SequentialSwap => {
            let ctx = make_ctx(node_count);
            let bsi = BorderSwapInfo::build_for_swap(grid, &domain.fluid_nodes, &domain.phase);
            let mut values = domain.initial_distributions(&ctx.idx, &ctx.flow);
            swap::run(domain, &bsi, &mut values, &ctx, iterations)
        }
        Algorithm::SequentialShift => {
            let ctx = make_ctx(node_count + shift_offset);
            let bsi = BorderSwapInfo::build(grid, &domain.fluid_nodes, &domain.phase);
            let mut values = domain.initial_distributions(&ctx.idx, &ctx.flow);
            shift::run(domain, &bsi, &mut values, &ctx, iterations)
        }
        Algorithm::ParallelTwoLattice => {
            let ctx = make_ctx(node_count);
            let bsi = BorderSwapInfo::build(grid, &domain.fluid_nodes, &domain.phase);
            let mut values_0 = domain.initial_distributions(&ctx.idx, &ctx.flow);
            let mut values_1 = values_0.clone();
            parallel::run_two_lattice(domain, &bsi, &mut values_0, &mut values_1, &ctx, iterations)
        }
        Algorithm::ParallelTwoLatticeFramework => {
            let ctx = make_ctx(node_count);
            let layout = StripLayout::new(grid, subdomain_height, &domain.fluid_nodes).unwrap();
            buffer_rows = layout.buffer_rows().to_vec();
            let bsi = BorderSwapInfo::build(grid, &domain.fluid_nodes, &domain.phase);
            let mut values_0 = domain.initial_distributions(&ctx.idx, &ctx.flow);
            let mut values_1 = values_0.clone();
            parallel::run_two_lattice_framework(
                domain,
                &layout,
                &bsi,
                &mut values_0,
                &mut values_1,
                &ctx,
                iterations,
            )
        }
        Algorithm::ParallelTwoStep => {
            let ctx = make_ctx(node_count);
            let layout = StripLayout::new(grid, subdomain_height, &domain.fluid_nodes).unwrap();
            buffer_rows = layout.buffer_rows().to_vec();
            let bsi = BorderSwapInfo::build(grid, &domain.fluid_nodes, &domain.phase);
            let mut values = domain.initial_distributions(&ctx.idx, &ctx.flow);
            parallel::run_two_step(domain, &layout, &bsi, &mut values, &ctx, iterations)
        }
        Algorithm::ParallelSwap => {
            let ctx = make_ctx(node_count);
            let layout = StripLayout::new(grid, subdomain_height, &domain.fluid_nodes).unwrap();
            buffer_rows = layout.buffer_rows().to_vec();
            let bsi = BorderSwapInfo::build_for_swap(grid, &domain.fluid_nodes, &domain.phase);
            let mut values = domain.initial_distributions(&ctx.idx, &ctx.flow);
            parallel::run_swap(domain, &layout, &bsi, &mut values, &ctx, iterations)
        }
        Algorithm::ParallelShift => {
            let layout = StripLayout::new(grid, subdomain_height, &domain.fluid_nodes).unwrap();
            buffer_rows = layout.buffer_rows().to_vec();
            let ctx = make_ctx(node_count + layout.subdomain_count * shift_offset);
            let bsi = layout.subdomain_swap_info(domain);
            let mut values = parallel_shift::setup_distributions(domain, &layout, &ctx.idx, &ctx.flow);
            parallel_shift::run(domain, &layout, &bsi, &mut values, &ctx, iterations)
        }
    };

    RunOutput {
        steps,
        grid,
        buffer_rows,
    }
}

pub fn channel_run(
    algorithm: Algorithm,
    grid: Grid,
    pattern: AccessPattern,
    policy: InletOutletPolicy,
    iterations: usize,
) -> RunOutput {
    let domain = Domain::channel(grid);
    run_engine(
        algorithm,
        &domain,
        pattern,
        policy,
        FlowParams::default(),
        0,
        iterations,
    )
}

/// Asserts that two runs of the same physical domain produced the same
/// interior observables at every step, mapping stored rows to physical rows
/// where a run used a buffered lattice.
pub fn assert_equivalent(label: &str, a: &RunOutput, b: &RunOutput, tolerance: Float) {
    assert_eq!(a.steps.len(), b.steps.len(), "{label}: step counts differ");
    assert_eq!(a.grid.width, b.grid.width, "{label}: widths differ");
    let rows_a = a.physical_rows();
    let rows_b = b.physical_rows();
    assert_eq!(rows_a.len(), rows_b.len(), "{label}: interior heights differ");

    for (step, (step_a, step_b)) in a.steps.iter().zip(&b.steps).enumerate() {
        for (&ya, &yb) in rows_a.iter().zip(&rows_b) {
            for x in 1..a.grid.width - 1 {
                let node_a = a.grid.node_index(x, ya);
                let node_b = b.grid.node_index(x, yb);
                let context = format!("{label}: step {step}, x {x}, physical row pair ({ya},{yb})");
                assert_abs_diff_eq!(
                    step_a.velocities[node_a][0],
                    step_b.velocities[node_b][0],
                    epsilon = tolerance
                );
                assert_abs_diff_eq!(
                    step_a.velocities[node_a][1],
                    step_b.velocities[node_b][1],
                    epsilon = tolerance
                );
                assert!(
                    (step_a.densities[node_a] - step_b.densities[node_b]).abs() <= tolerance,
                    "{context}: densities {} vs {}",
                    step_a.densities[node_a],
                    step_b.densities[node_b]
                );
            }
        }
    }
}
