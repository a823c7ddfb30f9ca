use log::debug;
use rayon::prelude::*;

use crate::Float;
use crate::boundary::{BorderSwapInfo, FlowParams};
use crate::collision;
use crate::domain::Domain;
use crate::grid::Indexer;
use crate::lattice::D2Q9;
use crate::macroscopic::StepData;
use crate::parallel::{SharedSlice, StripLayout, read_node, update_inout_row, write_node};
use crate::shift::shift_offset;
use crate::solver::{self, RunContext};

/// Per-strip frame displacement: strip `s` keeps its values shifted by an
/// extra `s * shift_offset`, which gives every strip its own slack region so
/// the in-place sweeps of neighboring strips never alias.
fn strip_frame(domain: &Domain, strip: usize) -> usize {
    strip * shift_offset(domain.grid)
}

/// Allocates and initializes the distribution vector for the parallel shift
/// engine: every strip starts in its own frame, resting equilibrium inside,
/// inlet and outlet equilibria on the ghost columns. Buffer rows carry no
/// state of their own; they are materialized from the neighbor strips every
/// iteration.
pub fn setup_distributions(
    domain: &Domain,
    layout: &StripLayout,
    idx: &Indexer,
    flow: &FlowParams,
) -> Vec<Float> {
    let grid = domain.grid;
    let mut values = vec![0.0; idx.value_count()];
    let resting = D2Q9::equilibrium([0.0, 0.0], 1.0);
    let inlet = D2Q9::equilibrium(flow.inlet_velocity, flow.inlet_density);
    let outlet = D2Q9::equilibrium(flow.outlet_velocity, flow.outlet_density);

    for s in 0..layout.subdomain_count {
        let frame = strip_frame(domain, s);
        for y in layout.strip_rows(s) {
            for x in 0..grid.width {
                let node = grid.node_index(x, y);
                let node_values = if x == 0 {
                    &inlet
                } else if x == grid.width - 1 {
                    &outlet
                } else {
                    &resting
                };
                idx.write(&mut values, node + frame, node_values);
            }
        }
    }
    values
}

/// Materializes one buffer row in the read frames of both neighbor strips:
/// the strip above will pull the northward band the strip below left behind,
/// and vice versa. The same formula covers both parities because the frames
/// are expressed relative to the iteration's read offset.
fn buffer_update(
    values: &SharedSlice<'_, Float>,
    idx: &Indexer,
    domain: &Domain,
    layout: &StripLayout,
    buffer: usize,
    read_offset: usize,
) {
    let grid = domain.grid;
    let (start, end) = layout.buffer_range(buffer);
    let low_frame = strip_frame(domain, buffer) + read_offset;
    let high_frame = strip_frame(domain, buffer + 1) + read_offset;

    // SAFETY: one task per buffer row; the written slots lie in the two
    // frames private to this seam, and the neighbor rows read are not
    // written during the buffer phase.
    unsafe {
        for node in start..=end {
            let below = grid.neighbor(node, 1);
            for direction in [6, 7, 8] {
                values.write(
                    idx.at(node + high_frame, direction),
                    values.read(idx.at(below + low_frame, direction)),
                );
            }
            let above = grid.neighbor(node, 7);
            for direction in [0, 1, 2] {
                values.write(
                    idx.at(node + low_frame, direction),
                    values.read(idx.at(above + high_frame, direction)),
                );
            }
        }
    }
}

/// Dumps every strip's distribution field at trace level, each in its own
/// frame. Buffer rows have no state of their own and are not shown.
fn trace_distributions(
    label: &str,
    domain: &Domain,
    layout: &StripLayout,
    idx: &Indexer,
    values: &[Float],
    write_offset: usize,
) {
    if !log::log_enabled!(log::Level::Trace) {
        return;
    }
    log::trace!("{label}:");
    let grid = domain.grid;
    for s in (0..layout.subdomain_count).rev() {
        let frame = strip_frame(domain, s) + write_offset;
        for y in layout.strip_rows(s).rev() {
            for x in 0..grid.width {
                let node = grid.node_index(x, y);
                log::trace!("  strip {s} ({x},{y}): {:?}", idx.read(values, node + frame));
            }
        }
    }
}

/// One parallel shift iteration. Every strip streams within its own frame
/// pair; the boundary adjacency is kept per strip so the ghost emplacement
/// can be displaced accordingly.
pub fn stream_and_collide(
    domain: &Domain,
    layout: &StripLayout,
    bsi: &[BorderSwapInfo],
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

    {
        let shared = SharedSlice::new(values);

        (0..layout.subdomain_count).into_par_iter().for_each(|s| {
            let frame = strip_frame(domain, s) + read_offset;
            let strip_bsi = &bsi[s];
            for entry in 0..strip_bsi.len() {
                let (node, dirs) = strip_bsi.entry(entry);
                for &direction in dirs {
                    let direction = direction as usize;
                    let ghost = grid.neighbor(node + frame, direction);
                    // SAFETY: ghost slots written here are unique per
                    // (node, direction) and lie inside the strip's frame.
                    unsafe {
                        shared.write(
                            ctx.idx.at(ghost, D2Q9::invert(direction)),
                            shared.read(ctx.idx.at(node + frame, direction)),
                        );
                    }
                }
            }
        });

        (0..layout.buffer_count()).into_par_iter().for_each(|b| {
            buffer_update(&shared, &ctx.idx, domain, layout, b, read_offset);
        });

        let velocities = SharedSlice::new(&mut data.velocities);
        let densities = SharedSlice::new(&mut data.densities);
        (0..layout.subdomain_count).into_par_iter().for_each(|s| {
            let read_frame = strip_frame(domain, s) + read_offset;
            let write_frame = strip_frame(domain, s) + write_offset;
            let strip = layout.strip_fluid(&domain.fluid_nodes, s);

            let stream_and_collide_node = |node: usize| {
                // SAFETY: the strip owns both of its frames; the read and
                // write offsets are chosen so in-place writes never alias
                // the remaining reads of this parity.
                unsafe {
                    for direction in 0..D2Q9::Q {
                        shared.write(
                            ctx.idx.at(node + write_frame, direction),
                            shared.read(ctx.idx.at(
                                grid.neighbor(node + read_frame, D2Q9::invert(direction)),
                                direction,
                            )),
                        );
                    }
                    let current = read_node(&shared, &ctx.idx, node + write_frame);
                    let velocity = crate::macroscopic::flow_velocity(&current);
                    let density = crate::macroscopic::density(&current);
                    let collided =
                        collision::collide_bgk(&current, velocity, density, ctx.relaxation_time);
                    write_node(&shared, &ctx.idx, node + write_frame, &collided);
                    velocities.write(node, velocity);
                    densities.write(node, density);
                }
            };

            if iteration % 2 == 0 {
                for &node in strip.iter().rev() {
                    stream_and_collide_node(node);
                }
            } else {
                for &node in strip {
                    stream_and_collide_node(node);
                }
            }
        });

        (0..layout.subdomain_count).into_par_iter().for_each(|s| {
            let write_frame = strip_frame(domain, s) + write_offset;
            for y in layout.strip_rows(s) {
                // SAFETY: each strip updates only its own rows' ghost
                // columns within its own write frame.
                unsafe {
                    update_inout_row(
                        ctx.policy,
                        y,
                        &shared,
                        &velocities,
                        &densities,
                        &ctx.idx,
                        grid,
                        &ctx.flow,
                        write_frame,
                    );
                }
            }
        });
    }

    // Corner restoration, one frame per corner row.
    let inlet = D2Q9::equilibrium(ctx.flow.inlet_velocity, ctx.flow.inlet_density);
    let outlet = D2Q9::equilibrium(ctx.flow.outlet_velocity, ctx.flow.outlet_density);
    let top_frame = strip_frame(domain, layout.subdomain_count - 1) + write_offset;
    let top = grid.height - 1;
    ctx.idx
        .write(values, grid.node_index(0, 0) + write_offset, &inlet);
    ctx.idx.write(values, grid.node_index(0, top) + top_frame, &inlet);
    ctx.idx.write(
        values,
        grid.node_index(grid.width - 1, 0) + write_offset,
        &outlet,
    );
    ctx.idx
        .write(values, grid.node_index(grid.width - 1, top) + top_frame, &outlet);

    data
}

/// Runs the parallel shift algorithm. The indexer stride must include the
/// per-strip tail, i.e. `node_count + subdomain_count * shift_offset`.
pub fn run(
    domain: &Domain,
    layout: &StripLayout,
    bsi: &[BorderSwapInfo],
    values: &mut [Float],
    ctx: &RunContext,
    iterations: usize,
) -> Vec<StepData> {
    let progress = solver::run_progress("parallel shift", iterations);
    let mut result = Vec::with_capacity(iterations);
    for time in 0..iterations {
        result.push(stream_and_collide(domain, layout, bsi, values, ctx, time));
        debug!("parallel shift: finished iteration {time}");
        if ctx.debug_mode {
            // The state of an even iteration sits in the shifted frames.
            let frame = if time % 2 == 0 {
                shift_offset(domain.grid)
            } else {
                0
            };
            trace_distributions(
                &format!("parallel shift: distributions after iteration {time}"),
                domain,
                layout,
                &ctx.idx,
                values,
                frame,
            );
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    result
}
