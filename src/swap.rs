use log::debug;

use crate::Float;
use crate::boundary::{self, BorderSwapInfo};
use crate::collision;
use crate::domain::Domain;
use crate::grid::{Grid, Indexer};
use crate::lattice::D2Q9;
use crate::macroscopic::StepData;
use crate::solver::{self, RunContext};

/// Directions in which streaming is realized as an explicit value swap. The
/// remaining streaming directions are covered implicitly: a node's swap in
/// direction `d` also moves its partner's value in `invert(d)`.
pub const ACTIVE_STREAMING_DIRECTIONS: [usize; 4] = [5, 6, 7, 8];

/// Swaps a node's value in the given direction with the opposite slot of
/// the neighbor it streams to.
pub(crate) fn swap_step(
    values: &mut [Float],
    idx: &Indexer,
    grid: Grid,
    node: usize,
    direction: usize,
) {
    values.swap(
        idx.at(node, direction),
        idx.at(grid.neighbor(node, direction), D2Q9::invert(direction)),
    );
}

/// Restores the canonical slot order of a node after the swap sweep. For
/// wall-adjacent directions whose swap partner is a ghost, this exchange is
/// exactly the halfway bounce-back.
pub(crate) fn restore_order(values: &mut [Float], idx: &Indexer, node: usize) {
    for direction in [0, 1, 2, 3] {
        values.swap(idx.at(node, direction), idx.at(node, D2Q9::invert(direction)));
    }
}

/// One swap iteration. The preparatory pass over the adjacency index seeds
/// ghost slots so that the per-node swap sweep and the order restoration
/// together realize the same transition as the two-step streaming.
pub fn stream_and_collide(
    domain: &Domain,
    bsi: &BorderSwapInfo,
    values: &mut [Float],
    ctx: &RunContext,
) -> StepData {
    let mut data = StepData::new(domain.grid.node_count());

    for (node, dirs) in bsi.entries() {
        for &direction in dirs {
            swap_step(values, &ctx.idx, domain.grid, node, direction as usize);
        }
    }

    for &node in &domain.fluid_nodes {
        for direction in ACTIVE_STREAMING_DIRECTIONS {
            swap_step(values, &ctx.idx, domain.grid, node, direction);
        }
        restore_order(values, &ctx.idx, node);
        let (velocity, density) =
            collision::perform_collision(node, values, &ctx.idx, ctx.relaxation_time);
        data.velocities[node] = velocity;
        data.densities[node] = density;
    }

    boundary::apply_inlet_outlet(
        ctx.policy,
        values,
        &mut data,
        &ctx.idx,
        domain.grid,
        &ctx.flow,
        0,
    );
    boundary::restore_corners(values, &ctx.idx, domain.grid, &ctx.flow, 0);

    data
}

/// Runs the sequential swap algorithm. The adjacency index must come from
/// [`BorderSwapInfo::build_for_swap`].
pub fn run(
    domain: &Domain,
    bsi: &BorderSwapInfo,
    values: &mut [Float],
    ctx: &RunContext,
    iterations: usize,
) -> Vec<StepData> {
    let progress = solver::run_progress("sequential swap", iterations);
    let mut result = Vec::with_capacity(iterations);
    for time in 0..iterations {
        result.push(stream_and_collide(domain, bsi, values, ctx));
        debug!("swap: finished iteration {time}");
        if ctx.debug_mode {
            solver::trace_distributions(
                &format!("swap: distributions after iteration {time}"),
                values,
                &ctx.idx,
                domain.grid,
                0,
            );
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    result
}
