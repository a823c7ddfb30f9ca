use std::marker::PhantomData;
use std::ops::Range;

use log::debug;
use rayon::prelude::*;

use crate::Float;
use crate::boundary::{self, BorderSwapInfo, FlowParams, InletOutletPolicy};
use crate::collision;
use crate::config::ConfigError;
use crate::domain::Domain;
use crate::grid::{Grid, Indexer};
use crate::lattice::{D2Q9, Velocity};
use crate::macroscopic::{self, StepData};
use crate::solver::{self, RunContext};
use crate::swap;

/// Shared view of a mutable slice for the phase-parallel sweeps. There is no
/// locking anywhere in the framework: within one phase, every task owns a
/// structurally disjoint set of slots (a strip, a buffer row, an adjacency
/// entry), and phases are separated by the joins of the parallel calls.
/// Callers state the disjointness argument at each unsafe access.
pub(crate) struct SharedSlice<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

unsafe impl<T: Send> Send for SharedSlice<'_, T> {}
unsafe impl<T: Send> Sync for SharedSlice<'_, T> {}

impl<T> Clone for SharedSlice<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SharedSlice<'_, T> {}

impl<'a, T: Copy> SharedSlice<'a, T> {
    pub fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    /// # Safety
    /// No concurrently running task may write `index`.
    pub unsafe fn read(&self, index: usize) -> T {
        debug_assert!(index < self.len);
        unsafe { *self.ptr.add(index) }
    }

    /// # Safety
    /// No concurrently running task may access `index`.
    pub unsafe fn write(&self, index: usize, value: T) {
        debug_assert!(index < self.len);
        unsafe { self.ptr.add(index).write(value) }
    }
}

/// # Safety
/// See [`SharedSlice::read`]; the nine slots of the node must not be written
/// concurrently.
pub(crate) unsafe fn read_node(
    values: &SharedSlice<'_, Float>,
    idx: &Indexer,
    node: usize,
) -> [Float; 9] {
    let mut result = [0.0; 9];
    for (direction, value) in result.iter_mut().enumerate() {
        *value = unsafe { values.read(idx.at(node, direction)) };
    }
    result
}

/// # Safety
/// See [`SharedSlice::write`]; the nine slots of the node must be owned by
/// the calling task.
pub(crate) unsafe fn write_node(
    values: &SharedSlice<'_, Float>,
    idx: &Indexer,
    node: usize,
    node_values: &[Float; 9],
) {
    for (direction, value) in node_values.iter().enumerate() {
        unsafe { values.write(idx.at(node, direction), *value) };
    }
}

/// Horizontal strip decomposition of a buffered lattice.
///
/// The stored lattice interleaves `subdomain_count` strips of
/// `subdomain_height` rows with single buffer rows: strip `s` spans rows
/// `[s(h+1), s(h+1)+h-1]` (the outermost ghost rows fall inside the outer
/// strips), buffer `b` sits at row `h + b(h+1)`, and the total height is
/// `S*h + (S-1)`. Buffer rows are virtual seam rows without a physical
/// counterpart; they exist so that neighboring strips never write into each
/// other during a sweep.
#[derive(Debug, Clone)]
pub struct StripLayout {
    pub subdomain_height: usize,
    pub subdomain_count: usize,
    strip_ranges: Vec<Range<usize>>,
    buffer_ranges: Vec<(usize, usize)>,
    interior_rows: Vec<usize>,
    buffer_rows: Vec<usize>,
}

impl StripLayout {
    pub fn new(
        grid: Grid,
        subdomain_height: usize,
        fluid_nodes: &[usize],
    ) -> Result<Self, ConfigError> {
        let h = subdomain_height;
        if h < 2 || (grid.height + 1) % (h + 1) != 0 {
            return Err(ConfigError::MisalignedSubdomains {
                height: grid.height,
                subdomain_height: h,
            });
        }
        let count = (grid.height + 1) / (h + 1);

        let mut strip_ranges = Vec::with_capacity(count);
        for s in 0..count {
            let min_node = (h + 1) * grid.width * s;
            let max_node = min_node + h * grid.width - 1;
            let first = fluid_nodes.partition_point(|&node| node < min_node);
            let end = fluid_nodes.partition_point(|&node| node <= max_node);
            strip_ranges.push(first..end);
        }

        let mut buffer_ranges = Vec::with_capacity(count - 1);
        for b in 0..count - 1 {
            let start = h * grid.width + b * (h + 1) * grid.width;
            buffer_ranges.push((start, start + grid.width - 1));
        }

        let mut interior_rows = Vec::new();
        let mut buffer_rows = Vec::new();
        for y in 1..grid.height - 1 {
            if y % (h + 1) == h {
                buffer_rows.push(y);
            } else {
                interior_rows.push(y);
            }
        }

        Ok(Self {
            subdomain_height: h,
            subdomain_count: count,
            strip_ranges,
            buffer_ranges,
            interior_rows,
            buffer_rows,
        })
    }

    pub fn buffer_count(&self) -> usize {
        self.buffer_ranges.len()
    }

    /// The fluid nodes owned by one strip, as a slice of the global list.
    pub fn strip_fluid<'a>(&self, fluid_nodes: &'a [usize], strip: usize) -> &'a [usize] {
        &fluid_nodes[self.strip_ranges[strip].clone()]
    }

    /// First and last node of one buffer row, ghost columns included.
    pub fn buffer_range(&self, buffer: usize) -> (usize, usize) {
        self.buffer_ranges[buffer]
    }

    /// Stored rows spanned by one strip.
    pub fn strip_rows(&self, strip: usize) -> Range<usize> {
        let base = strip * (self.subdomain_height + 1);
        base..base + self.subdomain_height
    }

    /// Interior rows that belong to a strip (i.e. all except ghost and
    /// buffer rows), in ascending order.
    pub fn interior_rows(&self) -> &[usize] {
        &self.interior_rows
    }

    /// The y coordinates of the buffer rows.
    pub fn buffer_rows(&self) -> &[usize] {
        &self.buffer_rows
    }

    /// Builds one adjacency index per strip; buffer rows belong to none.
    pub fn subdomain_swap_info(&self, domain: &Domain) -> Vec<BorderSwapInfo> {
        (0..self.subdomain_count)
            .map(|s| {
                BorderSwapInfo::build(
                    domain.grid,
                    self.strip_fluid(&domain.fluid_nodes, s),
                    &domain.phase,
                )
            })
            .collect()
    }
}

/// Refreshes one buffer node for an instream sweep: the upward directions
/// are copied from the node below, the downward directions from the node
/// above, so that pulls across the seam read what the neighbor strip left
/// there.
///
/// # Safety
/// The calling task must own the buffer node's slots; the vertical neighbor
/// rows must not be written concurrently.
pub(crate) unsafe fn copy_to_buffer_node(
    values: &SharedSlice<'_, Float>,
    idx: &Indexer,
    grid: Grid,
    node: usize,
) {
    unsafe {
        for direction in [6, 7, 8] {
            values.write(
                idx.at(node, direction),
                values.read(idx.at(grid.neighbor(node, 1), direction)),
            );
        }
        for direction in [0, 1, 2] {
            values.write(
                idx.at(node, direction),
                values.read(idx.at(grid.neighbor(node, 7), direction)),
            );
        }
    }
}

fn copy_to_buffer(
    values: &SharedSlice<'_, Float>,
    idx: &Indexer,
    grid: Grid,
    range: (usize, usize),
) {
    debug_assert_eq!(range.0 / grid.width, range.1 / grid.width);
    for node in range.0..=range.1 {
        // SAFETY: buffer rows are disjoint and no strip writes during the
        // buffer-exchange phase.
        unsafe { copy_to_buffer_node(values, idx, grid, node) };
    }
}

/// After an outstream sweep the buffer row holds the populations that
/// crossed the seam; this pushes them onward into the interior rows on
/// either side.
fn copy_from_buffer(
    values: &SharedSlice<'_, Float>,
    idx: &Indexer,
    grid: Grid,
    range: (usize, usize),
) {
    debug_assert_eq!(range.0 / grid.width, range.1 / grid.width);
    for node in range.0..=range.1 {
        // SAFETY: each buffer writes only the rows directly above and below
        // itself, which no other buffer touches (strips are at least two
        // rows high), and strips are quiescent in this phase.
        unsafe {
            let above = grid.neighbor(node, 7);
            for direction in [6, 7, 8] {
                values.write(idx.at(above, direction), values.read(idx.at(node, direction)));
            }
            let below = grid.neighbor(node, 1);
            for direction in [0, 1, 2] {
                values.write(idx.at(below, direction), values.read(idx.at(node, direction)));
            }
        }
    }
}

/// Refreshes the inlet and outlet ghost nodes of every buffer row. Outstream
/// engines run this after the ghost update so the next iteration's boundary
/// swaps read current values across the seams.
fn outstream_buffer_update(
    values: &SharedSlice<'_, Float>,
    idx: &Indexer,
    grid: Grid,
    layout: &StripLayout,
) {
    layout.buffer_rows().par_iter().for_each(|&y| {
        // SAFETY: one task per buffer row; only that row's two ghost nodes
        // are written, and the neighbor rows read are not written in this
        // phase.
        unsafe {
            copy_to_buffer_node(values, idx, grid, grid.node_index(0, y));
            copy_to_buffer_node(values, idx, grid, grid.node_index(grid.width - 1, y));
        }
    });
}

/// Parallel form of the bounce-back ghost emplacement: entries write
/// disjoint `(ghost, direction)` slots, so they can run concurrently.
fn emplace_bounce_back_parallel(
    bsi: &BorderSwapInfo,
    values: &SharedSlice<'_, Float>,
    idx: &Indexer,
    grid: Grid,
    read_offset: usize,
) {
    (0..bsi.len()).into_par_iter().for_each(|entry| {
        let (node, dirs) = bsi.entry(entry);
        for &direction in dirs {
            let direction = direction as usize;
            let ghost = grid.neighbor(node + read_offset, direction);
            // SAFETY: the slot `(ghost, invert(d))` is written only by the
            // unique fluid node whose direction d points at that ghost.
            unsafe {
                values.write(
                    idx.at(ghost, D2Q9::invert(direction)),
                    values.read(idx.at(node + read_offset, direction)),
                );
            }
        }
    });
}

/// Parallel post-stream reflection: each entry writes only its own node's
/// opposite slots and reads ghost slots no task writes in this phase.
fn reflect_bounce_back_parallel(
    bsi: &BorderSwapInfo,
    values: &SharedSlice<'_, Float>,
    idx: &Indexer,
    grid: Grid,
) {
    (0..bsi.len()).into_par_iter().for_each(|entry| {
        let (node, dirs) = bsi.entry(entry);
        for &direction in dirs {
            let direction = direction as usize;
            // SAFETY: the written slot `(node, invert(d))` is unique to this
            // entry and direction.
            unsafe {
                values.write(
                    idx.at(node, D2Q9::invert(direction)),
                    values.read(idx.at(grid.neighbor(node, direction), direction)),
                );
            }
        }
    });
}

/// Parallel inflow/outflow instream over the strip rows. Buffer rows need no
/// treatment: their instream bands are refreshed by the buffer exchange.
fn ghost_stream_inout_parallel(
    values: &SharedSlice<'_, Float>,
    idx: &Indexer,
    grid: Grid,
    rows: &[usize],
) {
    rows.par_iter().for_each(|&y| {
        // SAFETY: each task writes only its own row's first and last
        // interior nodes and reads the ghost columns, which stay untouched
        // in this phase.
        unsafe {
            let node = grid.node_index(1, y);
            for direction in boundary::INFLOW_INSTREAM_DIRS {
                values.write(
                    idx.at(node, direction),
                    values.read(idx.at(grid.neighbor(node, D2Q9::invert(direction)), direction)),
                );
            }
            let node = grid.node_index(grid.width - 2, y);
            for direction in boundary::OUTFLOW_INSTREAM_DIRS {
                values.write(
                    idx.at(node, direction),
                    values.read(idx.at(grid.neighbor(node, D2Q9::invert(direction)), direction)),
                );
            }
        }
    });
}

/// Updates the inlet and outlet ghost nodes of a single row under the given
/// policy. Shared-slice counterpart of [`boundary::apply_inlet_outlet`];
/// `offset` displaces the distribution frame for the shift engines.
///
/// # Safety
/// The calling task must own row `y`'s ghost slots and observables; the
/// interior columns read must not be written concurrently.
pub(crate) unsafe fn update_inout_row(
    policy: InletOutletPolicy,
    y: usize,
    values: &SharedSlice<'_, Float>,
    velocities: &SharedSlice<'_, Velocity>,
    densities: &SharedSlice<'_, Float>,
    idx: &Indexer,
    grid: Grid,
    flow: &FlowParams,
    offset: usize,
) {
    unsafe {
        match policy {
            InletOutletPolicy::VelocityInputVelocityOutput => {
                if y == 0 || y == grid.height - 1 {
                    return;
                }
                let node = grid.node_index(0, y);
                let neighbor = read_node(values, idx, grid.neighbor(node + offset, 5));
                let density = 2.0 * flow.inlet_density - macroscopic::density(&neighbor);
                let u = boundary::laminar_profile(y, grid.height, flow.inlet_velocity);
                write_node(values, idx, node + offset, &D2Q9::equilibrium(u, density));
                velocities.write(node, u);
                densities.write(node, density);

                let node = grid.node_index(grid.width - 1, y);
                let neighbor = read_node(values, idx, grid.neighbor(node + offset, 3));
                let density = 2.0 * flow.outlet_density - macroscopic::density(&neighbor);
                let u = boundary::turbulent_profile(
                    y,
                    grid.height,
                    flow.outlet_velocity,
                    flow.turbulence_factor,
                );
                write_node(values, idx, node + offset, &D2Q9::equilibrium(u, density));
                velocities.write(node, u);
                densities.write(node, density);
            }
            InletOutletPolicy::VelocityInputDensityOutput
            | InletOutletPolicy::DensityInputDensityOutput => {
                let inlet_velocity = match policy {
                    InletOutletPolicy::VelocityInputDensityOutput => flow.inlet_velocity,
                    _ => [0.0, 0.0],
                };
                let node = grid.node_index(0, y);
                write_node(
                    values,
                    idx,
                    node + offset,
                    &D2Q9::equilibrium(inlet_velocity, flow.inlet_density),
                );
                velocities.write(node, inlet_velocity);
                densities.write(node, flow.inlet_density);

                let node = grid.node_index(grid.width - 1, y);
                let neighbor = read_node(values, idx, grid.neighbor(node + offset, 3));
                let u = macroscopic::flow_velocity(&neighbor);
                write_node(
                    values,
                    idx,
                    node + offset,
                    &D2Q9::equilibrium(u, flow.outlet_density),
                );
                velocities.write(node, u);
                densities.write(node, flow.outlet_density);
            }
        }
    }
}

fn update_inout_rows(
    policy: InletOutletPolicy,
    rows: &[usize],
    values: &SharedSlice<'_, Float>,
    data: &mut StepData,
    idx: &Indexer,
    grid: Grid,
    flow: &FlowParams,
) {
    let velocities = SharedSlice::new(&mut data.velocities);
    let densities = SharedSlice::new(&mut data.densities);
    rows.par_iter().for_each(|&y| {
        // SAFETY: one task per row; each writes only its own row's two
        // ghost nodes and reads interior columns no task writes.
        unsafe {
            update_inout_row(
                policy, y, values, &velocities, &densities, idx, grid, flow, 0,
            );
        }
    });
}

/// Plain parallel two-lattice: the fused stream-and-collide is data-parallel
/// over the whole fluid-node list, no strips or buffer rows required since
/// source and destination are distinct.
pub fn run_two_lattice(
    domain: &Domain,
    bsi: &BorderSwapInfo,
    values_0: &mut Vec<Float>,
    values_1: &mut Vec<Float>,
    ctx: &RunContext,
    iterations: usize,
) -> Vec<StepData> {
    let progress = solver::run_progress("parallel two-lattice", iterations);
    let grid = domain.grid;
    let mut result = Vec::with_capacity(iterations);
    for time in 0..iterations {
        let mut data = StepData::new(grid.node_count());
        {
            let source_shared = SharedSlice::new(values_0);
            emplace_bounce_back_parallel(bsi, &source_shared, &ctx.idx, grid, 0);
        }

        {
            let source: &[Float] = values_0;
            let destination = SharedSlice::new(values_1);
            let velocities = SharedSlice::new(&mut data.velocities);
            let densities = SharedSlice::new(&mut data.densities);
            domain.fluid_nodes.par_iter().for_each(|&node| {
                // SAFETY: every task writes only its own node's nine
                // destination slots and observables; the source is read-only
                // in this phase.
                unsafe {
                    let mut pulled = [0.0; 9];
                    for (direction, value) in pulled.iter_mut().enumerate() {
                        *value = source
                            [ctx.idx.at(grid.neighbor(node, D2Q9::invert(direction)), direction)];
                    }
                    let velocity = macroscopic::flow_velocity(&pulled);
                    let density = macroscopic::density(&pulled);
                    let collided =
                        collision::collide_bgk(&pulled, velocity, density, ctx.relaxation_time);
                    write_node(&destination, &ctx.idx, node, &collided);
                    velocities.write(node, velocity);
                    densities.write(node, density);
                }
            });
        }

        {
            let destination = SharedSlice::new(values_1);
            let rows: Vec<usize> = (1..grid.height - 1).collect();
            update_inout_rows(
                ctx.policy,
                &rows,
                &destination,
                &mut data,
                &ctx.idx,
                grid,
                &ctx.flow,
            );
        }
        boundary::restore_corners(values_1, &ctx.idx, grid, &ctx.flow, 0);

        std::mem::swap(values_0, values_1);
        result.push(data);
        debug!("parallel two-lattice: finished iteration {time}");
        if ctx.debug_mode {
            solver::trace_distributions(
                &format!("parallel two-lattice: distributions after iteration {time}"),
                values_0,
                &ctx.idx,
                grid,
                0,
            );
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    result
}

/// Framework-based parallel two-lattice: strips stream and collide
/// concurrently after the buffer rows have been refreshed for the pulls
/// across the seams.
pub fn run_two_lattice_framework(
    domain: &Domain,
    layout: &StripLayout,
    bsi: &BorderSwapInfo,
    values_0: &mut Vec<Float>,
    values_1: &mut Vec<Float>,
    ctx: &RunContext,
    iterations: usize,
) -> Vec<StepData> {
    let progress = solver::run_progress("parallel two-lattice (framework)", iterations);
    let grid = domain.grid;
    let mut result = Vec::with_capacity(iterations);
    for time in 0..iterations {
        let mut data = StepData::new(grid.node_count());

        {
            let source_shared = SharedSlice::new(values_0);
            emplace_bounce_back_parallel(bsi, &source_shared, &ctx.idx, grid, 0);
            (0..layout.buffer_count()).into_par_iter().for_each(|b| {
                copy_to_buffer(&source_shared, &ctx.idx, grid, layout.buffer_range(b));
            });
        }

        {
            let source: &[Float] = values_0;
            let destination = SharedSlice::new(values_1);
            let velocities = SharedSlice::new(&mut data.velocities);
            let densities = SharedSlice::new(&mut data.densities);
            (0..layout.subdomain_count).into_par_iter().for_each(|s| {
                for &node in layout.strip_fluid(&domain.fluid_nodes, s) {
                    // SAFETY: strips own disjoint destination nodes and
                    // observables; the source is read-only in this phase.
                    unsafe {
                        let mut pulled = [0.0; 9];
                        for (direction, value) in pulled.iter_mut().enumerate() {
                            *value = source[ctx
                                .idx
                                .at(grid.neighbor(node, D2Q9::invert(direction)), direction)];
                        }
                        let velocity = macroscopic::flow_velocity(&pulled);
                        let density = macroscopic::density(&pulled);
                        let collided = collision::collide_bgk(
                            &pulled,
                            velocity,
                            density,
                            ctx.relaxation_time,
                        );
                        write_node(&destination, &ctx.idx, node, &collided);
                        velocities.write(node, velocity);
                        densities.write(node, density);
                    }
                }
            });
        }

        {
            let destination = SharedSlice::new(values_1);
            update_inout_rows(
                ctx.policy,
                layout.interior_rows(),
                &destination,
                &mut data,
                &ctx.idx,
                grid,
                &ctx.flow,
            );
        }
        boundary::restore_corners(values_1, &ctx.idx, grid, &ctx.flow, 0);

        std::mem::swap(values_0, values_1);
        result.push(data);
        debug!("parallel two-lattice framework: finished iteration {time}");
        if ctx.debug_mode {
            solver::trace_distributions(
                &format!("parallel two-lattice framework: distributions after iteration {time}"),
                values_0,
                &ctx.idx,
                grid,
                0,
            );
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    result
}

/// Framework-based parallel two-step.
pub fn run_two_step(
    domain: &Domain,
    layout: &StripLayout,
    bsi: &BorderSwapInfo,
    values: &mut Vec<Float>,
    ctx: &RunContext,
    iterations: usize,
) -> Vec<StepData> {
    let progress = solver::run_progress("parallel two-step", iterations);
    let grid = domain.grid;
    let mut result = Vec::with_capacity(iterations);
    for time in 0..iterations {
        let mut data = StepData::new(grid.node_count());
        {
            let shared = SharedSlice::new(values);

            (0..layout.subdomain_count).into_par_iter().for_each(|s| {
                let strip = layout.strip_fluid(&domain.fluid_nodes, s);
                // SAFETY: a strip's pushes land in its own rows and the
                // adjacent buffer rows; neighboring strips write the other
                // direction band of those buffers.
                unsafe {
                    for &node in strip {
                        for direction in [0, 1, 2, 3] {
                            shared.write(
                                ctx.idx.at(grid.neighbor(node, direction), direction),
                                shared.read(ctx.idx.at(node, direction)),
                            );
                        }
                    }
                    for &node in strip.iter().rev() {
                        for direction in [5, 6, 7, 8] {
                            shared.write(
                                ctx.idx.at(grid.neighbor(node, direction), direction),
                                shared.read(ctx.idx.at(node, direction)),
                            );
                        }
                    }
                }
            });

            (0..layout.buffer_count()).into_par_iter().for_each(|b| {
                let (start, end) = layout.buffer_range(b);
                copy_from_buffer(&shared, &ctx.idx, grid, (start + 1, end - 1));
            });

            reflect_bounce_back_parallel(bsi, &shared, &ctx.idx, grid);
            ghost_stream_inout_parallel(&shared, &ctx.idx, grid, layout.interior_rows());
        }

        {
            let shared = SharedSlice::new(values);
            let velocities = SharedSlice::new(&mut data.velocities);
            let densities = SharedSlice::new(&mut data.densities);
            (0..layout.subdomain_count).into_par_iter().for_each(|s| {
                for &node in layout.strip_fluid(&domain.fluid_nodes, s) {
                    // SAFETY: collision touches only the node's own slots
                    // and observables, and strips are disjoint.
                    unsafe {
                        let current = read_node(&shared, &ctx.idx, node);
                        let velocity = macroscopic::flow_velocity(&current);
                        let density = macroscopic::density(&current);
                        let collided = collision::collide_bgk(
                            &current,
                            velocity,
                            density,
                            ctx.relaxation_time,
                        );
                        write_node(&shared, &ctx.idx, node, &collided);
                        velocities.write(node, velocity);
                        densities.write(node, density);
                    }
                }
            });
        }

        {
            let shared = SharedSlice::new(values);
            update_inout_rows(
                ctx.policy,
                layout.interior_rows(),
                &shared,
                &mut data,
                &ctx.idx,
                grid,
                &ctx.flow,
            );
        }
        boundary::restore_corners(values, &ctx.idx, grid, &ctx.flow, 0);
        {
            let shared = SharedSlice::new(values);
            outstream_buffer_update(&shared, &ctx.idx, grid, layout);
        }

        result.push(data);
        debug!("parallel two-step: finished iteration {time}");
        if ctx.debug_mode {
            solver::trace_distributions(
                &format!("parallel two-step: distributions after iteration {time}"),
                values,
                &ctx.idx,
                grid,
                0,
            );
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    result
}

/// Prepares a buffer row for the swap sweep: the southward band of the row
/// above is cloned into the buffer for the strip below to swap against, and
/// the northward populations of the row below are placed, already inverted,
/// into the row above.
fn swap_buffer_update(
    values: &SharedSlice<'_, Float>,
    idx: &Indexer,
    grid: Grid,
    range: (usize, usize),
) {
    let (start, end) = range;
    // SAFETY: one task per buffer row; it writes the buffer row itself and
    // the row directly above, neither of which any other task touches in
    // this phase.
    unsafe {
        for node in start..=end {
            for direction in [0, 1, 2] {
                values.write(
                    idx.at(node, direction),
                    values.read(idx.at(grid.neighbor(node, 7), direction)),
                );
            }
        }
        for node in start + 1..end {
            for direction in [6, 7, 8] {
                values.write(
                    idx.at(grid.neighbor(node, direction), D2Q9::invert(direction)),
                    values.read(idx.at(grid.neighbor(node, 1), direction)),
                );
            }
        }
    }
}

/// Framework-based parallel swap. The adjacency index is the swap variant
/// built over the full fluid list, buffer rows included.
pub fn run_swap(
    domain: &Domain,
    layout: &StripLayout,
    bsi: &BorderSwapInfo,
    values: &mut Vec<Float>,
    ctx: &RunContext,
    iterations: usize,
) -> Vec<StepData> {
    let progress = solver::run_progress("parallel swap", iterations);
    let grid = domain.grid;
    let mut result = Vec::with_capacity(iterations);
    for time in 0..iterations {
        let mut data = StepData::new(grid.node_count());

        {
            let shared = SharedSlice::new(values);
            (0..bsi.len()).into_par_iter().for_each(|entry| {
                let (node, dirs) = bsi.entry(entry);
                for &direction in dirs {
                    let direction = direction as usize;
                    let partner = idx_swap_partner(&ctx.idx, grid, node, direction);
                    let own = ctx.idx.at(node, direction);
                    // SAFETY: every preparatory swap touches a unique pair
                    // of slots; the inverted-direction bookkeeping ensures
                    // no two entries share either side.
                    unsafe {
                        let a = shared.read(own);
                        let b = shared.read(partner);
                        shared.write(own, b);
                        shared.write(partner, a);
                    }
                }
            });

            (0..layout.buffer_count()).into_par_iter().for_each(|b| {
                swap_buffer_update(&shared, &ctx.idx, grid, layout.buffer_range(b));
            });
        }

        {
            let shared = SharedSlice::new(values);
            let velocities = SharedSlice::new(&mut data.velocities);
            let densities = SharedSlice::new(&mut data.densities);
            (0..layout.subdomain_count).into_par_iter().for_each(|s| {
                for &node in layout.strip_fluid(&domain.fluid_nodes, s) {
                    // SAFETY: a strip's swaps stay within its own rows and
                    // the buffer rows beside it, whose conflicting band was
                    // resolved in the buffer phase; restoration and
                    // collision touch only the node itself.
                    unsafe {
                        for direction in swap::ACTIVE_STREAMING_DIRECTIONS {
                            let partner = idx_swap_partner(&ctx.idx, grid, node, direction);
                            let own = ctx.idx.at(node, direction);
                            let a = shared.read(own);
                            let b = shared.read(partner);
                            shared.write(own, b);
                            shared.write(partner, a);
                        }
                        for direction in [0, 1, 2, 3] {
                            let own = ctx.idx.at(node, direction);
                            let other = ctx.idx.at(node, D2Q9::invert(direction));
                            let a = shared.read(own);
                            let b = shared.read(other);
                            shared.write(own, b);
                            shared.write(other, a);
                        }
                        let current = read_node(&shared, &ctx.idx, node);
                        let velocity = macroscopic::flow_velocity(&current);
                        let density = macroscopic::density(&current);
                        let collided = collision::collide_bgk(
                            &current,
                            velocity,
                            density,
                            ctx.relaxation_time,
                        );
                        write_node(&shared, &ctx.idx, node, &collided);
                        velocities.write(node, velocity);
                        densities.write(node, density);
                    }
                }
            });
        }

        {
            let shared = SharedSlice::new(values);
            update_inout_rows(
                ctx.policy,
                layout.interior_rows(),
                &shared,
                &mut data,
                &ctx.idx,
                grid,
                &ctx.flow,
            );
        }
        boundary::restore_corners(values, &ctx.idx, grid, &ctx.flow, 0);
        {
            let shared = SharedSlice::new(values);
            outstream_buffer_update(&shared, &ctx.idx, grid, layout);
        }

        result.push(data);
        debug!("parallel swap: finished iteration {time}");
        if ctx.debug_mode {
            solver::trace_distributions(
                &format!("parallel swap: distributions after iteration {time}"),
                values,
                &ctx.idx,
                grid,
                0,
            );
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    result
}

fn idx_swap_partner(idx: &Indexer, grid: Grid, node: usize, direction: usize) -> usize {
    idx.at(grid.neighbor(node, direction), D2Q9::invert(direction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::AccessPattern;

    #[test]
    fn strip_layout_geometry() {
        // h = 2, S = 3: height = 3*2 + 2 = 8.
        let grid = Grid::new(5, 8);
        let domain = Domain::channel(grid);
        let layout = StripLayout::new(grid, 2, &domain.fluid_nodes).unwrap();
        assert_eq!(layout.subdomain_count, 3);
        assert_eq!(layout.buffer_count(), 2);
        assert_eq!(layout.buffer_rows().to_vec(), vec![2, 5]);
        assert_eq!(layout.buffer_range(0), (2 * 5, 2 * 5 + 4));
        assert_eq!(layout.buffer_range(1), (5 * 5, 5 * 5 + 4));

        // Strip 0 contains the bottom ghost row, so it owns one fluid row.
        let strip0 = layout.strip_fluid(&domain.fluid_nodes, 0);
        assert!(strip0.iter().all(|&n| grid.node_coordinates(n).1 == 1));
        let strip1 = layout.strip_fluid(&domain.fluid_nodes, 1);
        let rows: Vec<usize> = strip1.iter().map(|&n| grid.node_coordinates(n).1).collect();
        assert!(rows.iter().all(|&y| y == 3 || y == 4));
        let strip2 = layout.strip_fluid(&domain.fluid_nodes, 2);
        assert!(strip2.iter().all(|&n| grid.node_coordinates(n).1 == 6));

        // Interior rows and buffer rows partition the interior.
        assert_eq!(layout.interior_rows().len() + layout.buffer_rows().len(), 6);
    }

    #[test]
    fn misaligned_height_is_rejected() {
        let grid = Grid::new(5, 9);
        let domain = Domain::channel(grid);
        assert!(matches!(
            StripLayout::new(grid, 2, &domain.fluid_nodes),
            Err(ConfigError::MisalignedSubdomains { .. })
        ));
    }

    #[test]
    fn buffer_round_trip_moves_seam_populations() {
        let grid = Grid::new(5, 8);
        let domain = Domain::channel(grid);
        let layout = StripLayout::new(grid, 2, &domain.fluid_nodes).unwrap();
        let idx = Indexer::new(AccessPattern::Collision, grid.node_count());
        let mut values = vec![0.0; idx.value_count()];

        // Mark the upward band of the node below buffer 0 and the downward
        // band of the node above it.
        let below = grid.node_index(2, 1);
        let above = grid.node_index(2, 3);
        values[idx.at(below, 7)] = 1.5;
        values[idx.at(above, 1)] = 2.5;

        let shared = SharedSlice::new(&mut values);
        copy_to_buffer(&shared, &idx, grid, layout.buffer_range(0));

        let buffer_node = grid.node_index(2, 2);
        assert_eq!(values[idx.at(buffer_node, 7)], 1.5);
        assert_eq!(values[idx.at(buffer_node, 1)], 2.5);
    }
}
