use log::debug;

use crate::Float;
use crate::boundary::{self, BorderSwapInfo};
use crate::collision;
use crate::domain::Domain;
use crate::grid::{Grid, Indexer};
use crate::macroscopic::StepData;
use crate::solver::{self, RunContext};

/// Performs the outstream step for the given fluid nodes. Each node pushes
/// its values onto its neighbors; the split into an ascending pass for the
/// downward/westward directions and a descending pass for the upward and
/// eastward ones keeps the in-place update from overwriting values that are
/// still needed.
pub(crate) fn perform_stream(
    fluid_nodes: &[usize],
    values: &mut [Float],
    idx: &Indexer,
    grid: Grid,
) {
    for &node in fluid_nodes {
        for direction in [0, 1, 2, 3] {
            values[idx.at(grid.neighbor(node, direction), direction)] =
                values[idx.at(node, direction)];
        }
    }
    for &node in fluid_nodes.iter().rev() {
        for direction in [5, 6, 7, 8] {
            values[idx.at(grid.neighbor(node, direction), direction)] =
                values[idx.at(node, direction)];
        }
    }
}

/// One two-step iteration: outstream, halfway bounce-back via the ghost
/// nodes, inflow/outflow instream, collision, ghost update.
pub fn stream_and_collide(
    domain: &Domain,
    bsi: &BorderSwapInfo,
    values: &mut [Float],
    ctx: &RunContext,
) -> StepData {
    let mut data = StepData::new(domain.grid.node_count());

    perform_stream(&domain.fluid_nodes, values, &ctx.idx, domain.grid);
    boundary::reflect_bounce_back(bsi, values, &ctx.idx, domain.grid);
    boundary::ghost_stream_inout(values, &ctx.idx, domain.grid);

    for &node in &domain.fluid_nodes {
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

/// Runs the sequential two-step algorithm on a single buffer.
pub fn run(
    domain: &Domain,
    bsi: &BorderSwapInfo,
    values: &mut [Float],
    ctx: &RunContext,
    iterations: usize,
) -> Vec<StepData> {
    let progress = solver::run_progress("sequential two-step", iterations);
    let mut result = Vec::with_capacity(iterations);
    for time in 0..iterations {
        result.push(stream_and_collide(domain, bsi, values, ctx));
        debug!("two-step: finished iteration {time}");
        if ctx.debug_mode {
            solver::trace_distributions(
                &format!("two-step: distributions after iteration {time}"),
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
