use log::debug;

use crate::Float;
use crate::boundary::{self, BorderSwapInfo};
use crate::collision;
use crate::domain::Domain;
use crate::grid::{Grid, Indexer};
use crate::lattice::D2Q9;
use crate::macroscopic::StepData;
use crate::solver::{self, RunContext};

/// Displacement between the read and write frames of one iteration. One row
/// plus one node keeps the in-place writes clear of every neighbor read
/// within a parity, which is the whole trick of the scheme.
pub fn shift_offset(grid: Grid) -> usize {
    grid.width + 1
}

/// Pulls the nine values of one fluid node, reading neighbors in the read
/// frame and writing in the write frame.
pub(crate) fn shift_stream(
    values: &mut [Float],
    idx: &Indexer,
    grid: Grid,
    node: usize,
    read_offset: usize,
    write_offset: usize,
) {
    for direction in 0..D2Q9::Q {
        values[idx.at(node + write_offset, direction)] = values[idx.at(
            grid.neighbor(node + read_offset, D2Q9::invert(direction)),
            direction,
        )];
    }
}

/// One shift iteration. Even steps read at offset zero, write at the shift
/// offset and traverse the fluid nodes in reverse; odd steps do the
/// opposite.
pub fn stream_and_collide(
    domain: &Domain,
    bsi: &BorderSwapInfo,
    values: &mut [Float],
    ctx: &RunContext,
    iteration: usize,
) -> StepData {
    let grid = domain.grid;
    let offset = shift_offset(grid);
    let mut data = StepData::new(grid.node_count());

    let (read_offset, write_offset) = if iteration % 2 == 0 {
        (0, offset)
    } else {
        (offset, 0)
    };

    boundary::emplace_bounce_back(bsi, values, &ctx.idx, grid, read_offset);

    let mut stream_and_collide_node = |node: usize, data: &mut StepData| {
        shift_stream(values, &ctx.idx, grid, node, read_offset, write_offset);
        let (velocity, density) = collision::perform_collision(
            node + write_offset,
            values,
            &ctx.idx,
            ctx.relaxation_time,
        );
        data.velocities[node] = velocity;
        data.densities[node] = density;
    };

    if iteration % 2 == 0 {
        for &node in domain.fluid_nodes.iter().rev() {
            stream_and_collide_node(node, &mut data);
        }
    } else {
        for &node in &domain.fluid_nodes {
            stream_and_collide_node(node, &mut data);
        }
    }

    boundary::apply_inlet_outlet(
        ctx.policy,
        values,
        &mut data,
        &ctx.idx,
        grid,
        &ctx.flow,
        write_offset,
    );
    boundary::restore_corners(values, &ctx.idx, grid, &ctx.flow, write_offset);

    data
}

/// Runs the sequential shift algorithm. The distribution vector must have
/// been sized with the shift tail, i.e. an indexer stride of
/// `node_count + shift_offset`.
pub fn run(
    domain: &Domain,
    bsi: &BorderSwapInfo,
    values: &mut [Float],
    ctx: &RunContext,
    iterations: usize,
) -> Vec<StepData> {
    let progress = solver::run_progress("sequential shift", iterations);
    let mut result = Vec::with_capacity(iterations);
    for time in 0..iterations {
        result.push(stream_and_collide(domain, bsi, values, ctx, time));
        debug!("shift: finished iteration {time}");
        if ctx.debug_mode {
            // The state of an even iteration sits in the shifted frame.
            let frame = if time % 2 == 0 {
                shift_offset(domain.grid)
            } else {
                0
            };
            solver::trace_distributions(
                &format!("shift: distributions after iteration {time}"),
                values,
                &ctx.idx,
                domain.grid,
                frame,
            );
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    result
}
