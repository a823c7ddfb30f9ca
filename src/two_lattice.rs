use log::debug;

use crate::Float;
use crate::boundary::{self, BorderSwapInfo};
use crate::collision;
use crate::domain::Domain;
use crate::grid::{Grid, Indexer};
use crate::lattice::D2Q9;
use crate::macroscopic::StepData;
use crate::solver::{self, RunContext};

/// Pulls the nine distribution values of one fluid node from the source
/// into the destination. Source and destination are distinct, so node
/// iteration order does not matter.
pub(crate) fn tl_stream(
    source: &[Float],
    destination: &mut [Float],
    idx: &Indexer,
    grid: Grid,
    node: usize,
) {
    for direction in 0..D2Q9::Q {
        destination[idx.at(node, direction)] =
            source[idx.at(grid.neighbor(node, D2Q9::invert(direction)), direction)];
    }
}

/// Performs the combined streaming and collision step for all fluid nodes.
/// Boundary conditions are enforced through the ghost nodes of the source.
pub fn stream_and_collide(
    domain: &Domain,
    bsi: &BorderSwapInfo,
    source: &mut [Float],
    destination: &mut [Float],
    ctx: &RunContext,
) -> StepData {
    let mut data = StepData::new(domain.grid.node_count());

    boundary::emplace_bounce_back(bsi, source, &ctx.idx, domain.grid, 0);

    for &node in &domain.fluid_nodes {
        tl_stream(source, destination, &ctx.idx, domain.grid, node);
        let (velocity, density) =
            collision::perform_collision(node, destination, &ctx.idx, ctx.relaxation_time);
        data.velocities[node] = velocity;
        data.densities[node] = density;
    }

    boundary::apply_inlet_outlet(
        ctx.policy,
        destination,
        &mut data,
        &ctx.idx,
        domain.grid,
        &ctx.flow,
        0,
    );
    boundary::restore_corners(destination, &ctx.idx, domain.grid, &ctx.flow, 0);

    data
}

/// Runs the sequential two-lattice algorithm, swapping the roles of the two
/// buffers after every step.
pub fn run(
    domain: &Domain,
    bsi: &BorderSwapInfo,
    values_0: &mut Vec<Float>,
    values_1: &mut Vec<Float>,
    ctx: &RunContext,
    iterations: usize,
) -> Vec<StepData> {
    let progress = solver::run_progress("sequential two-lattice", iterations);
    let mut result = Vec::with_capacity(iterations);
    for time in 0..iterations {
        result.push(stream_and_collide(domain, bsi, values_0, values_1, ctx));
        std::mem::swap(values_0, values_1);
        debug!("two-lattice: finished iteration {time}");
        if ctx.debug_mode {
            solver::trace_distributions(
                &format!("two-lattice: distributions after iteration {time}"),
                values_0,
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
