use serde::Deserialize;

use crate::Float;
use crate::grid::{Grid, Indexer};
use crate::lattice::{D2Q9, Velocity};
use crate::macroscopic::{self, StepData};

/// Directions that point into the domain from a regular inlet node.
pub const INFLOW_INSTREAM_DIRS: [usize; 3] = [2, 5, 8];

/// Directions that point into the domain from a regular outlet node.
pub const OUTFLOW_INSTREAM_DIRS: [usize; 3] = [0, 3, 6];

/// Inlet and outlet flow parameters. The turbulence factor scales the
/// seventh-root outlet profile; its conventional value is 1.1.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FlowParams {
    pub inlet_velocity: Velocity,
    pub outlet_velocity: Velocity,
    pub inlet_density: Float,
    pub outlet_density: Float,
    pub turbulence_factor: Float,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            inlet_velocity: [0.1, 0.0],
            outlet_velocity: [0.0, 0.0],
            inlet_density: 1.0,
            outlet_density: 1.0,
            turbulence_factor: 1.1,
        }
    }
}

/// Treatment of the inlet and outlet ghost columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InletOutletPolicy {
    /// Laminar profile at the inlet, seventh-root turbulent profile at the
    /// outlet, densities mirrored about the configured reference values.
    VelocityInputVelocityOutput,
    /// Fixed inlet velocity and density; outlet velocity inherited from the
    /// interior neighbor, outlet density fixed.
    VelocityInputDensityOutput,
    /// Resting inlet at fixed density; outlet as above.
    DensityInputDensityOutput,
}

/// Returns whether the node is a ghost node: on the outermost ring, or
/// marked solid in the phase map.
pub fn is_ghost_node(grid: Grid, phase: &[bool], node: usize) -> bool {
    let (x, y) = grid.node_coordinates(node);
    x == 0 || x == grid.width - 1 || y == 0 || y == grid.height - 1 || phase[node]
}

/// Returns whether the node is a ghost node that is neither an inlet nor an
/// outlet node, i.e. a solid wall or a solid within the domain. Only these
/// receive bounce-back treatment; the inlet and outlet columns are handled
/// by the ghost update instead.
pub fn is_non_inout_ghost_node(grid: Grid, phase: &[bool], node: usize) -> bool {
    let (x, y) = grid.node_coordinates(node);
    x != 0 && x != grid.width - 1 && (y == 0 || y == grid.height - 1 || phase[node])
}

/// Precomputed boundary adjacency: for every fluid node with at least one
/// neighbor that is a non-inout ghost, the directions in question. Stored as
/// a flat structure of arrays with a prefix-sum offset table, which keeps the
/// index compact and makes entries trivially iterable in parallel.
#[derive(Debug, Clone)]
pub struct BorderSwapInfo {
    nodes: Vec<usize>,
    dir_offsets: Vec<u32>,
    dirs: Vec<u8>,
}

impl BorderSwapInfo {
    /// Scans the fluid nodes in order and records the directions pointing at
    /// non-inout ghost neighbors.
    pub fn build(grid: Grid, fluid_nodes: &[usize], phase: &[bool]) -> Self {
        let mut result = Self {
            nodes: Vec::new(),
            dir_offsets: vec![0],
            dirs: Vec::new(),
        };
        for &node in fluid_nodes {
            let mut any = false;
            for direction in D2Q9::STREAMING_DIRECTIONS {
                let neighbor = grid.neighbor(node, direction);
                if is_non_inout_ghost_node(grid, phase, neighbor) {
                    result.dirs.push(direction as u8);
                    any = true;
                }
            }
            if any {
                result.nodes.push(node);
                result.dir_offsets.push(result.dirs.len() as u32);
            }
        }
        result
    }

    /// Variant used by the swap engines: only the active streaming
    /// directions take part in the boundary swaps, and the inlet and outlet
    /// columns contribute the directions through which ghost values enter
    /// the domain against the active sweep.
    pub fn build_for_swap(grid: Grid, fluid_nodes: &[usize], phase: &[bool]) -> Self {
        let mut result = Self {
            nodes: Vec::new(),
            dir_offsets: vec![0],
            dirs: Vec::new(),
        };
        for &node in fluid_nodes {
            let mut dirs: Vec<u8> = Vec::new();
            for direction in crate::swap::ACTIVE_STREAMING_DIRECTIONS {
                let neighbor = grid.neighbor(node, direction);
                if is_non_inout_ghost_node(grid, phase, neighbor) {
                    dirs.push(direction as u8);
                }
            }
            let (x, _) = grid.node_coordinates(node);
            if x == 1 {
                dirs.push(0);
                dirs.push(3);
            } else if x == grid.width - 2 {
                dirs.push(2);
            }
            if !dirs.is_empty() {
                dirs.sort_unstable();
                result.nodes.push(node);
                result.dirs.extend_from_slice(&dirs);
                result.dir_offsets.push(result.dirs.len() as u32);
            }
        }
        result
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn entry(&self, index: usize) -> (usize, &[u8]) {
        let start = self.dir_offsets[index] as usize;
        let end = self.dir_offsets[index + 1] as usize;
        let dirs = &self.dirs[start..end];
        debug_assert!(!dirs.is_empty());
        (self.nodes[index], dirs)
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, &[u8])> + '_ {
        (0..self.len()).map(|index| self.entry(index))
    }
}

/// Performs an outstream step for all border nodes in the directions where
/// they border non-inout ghosts: the values are stored in the ghost slots in
/// inverted order, so a subsequent ordinary instream sweep reads correct
/// reflected values. `read_offset` is only nonzero for the shift engines.
pub fn emplace_bounce_back(
    bsi: &BorderSwapInfo,
    values: &mut [Float],
    idx: &Indexer,
    grid: Grid,
    read_offset: usize,
) {
    for (node, dirs) in bsi.entries() {
        for &direction in dirs {
            let direction = direction as usize;
            let ghost = grid.neighbor(node + read_offset, direction);
            values[idx.at(ghost, D2Q9::invert(direction))] =
                values[idx.at(node + read_offset, direction)];
        }
    }
}

/// Halfway bounce-back in its post-stream reflection form, used by the
/// two-step engine: the value that was pushed into the ghost comes back into
/// the opposite slot of the border node.
pub fn reflect_bounce_back(
    bsi: &BorderSwapInfo,
    values: &mut [Float],
    idx: &Indexer,
    grid: Grid,
) {
    for (node, dirs) in bsi.entries() {
        for &direction in dirs {
            let direction = direction as usize;
            values[idx.at(node, D2Q9::invert(direction))] =
                values[idx.at(grid.neighbor(node, direction), direction)];
        }
    }
}

/// Sets the inlet and outlet ghost columns to their startup equilibria.
pub fn initialize_inout(values: &mut [Float], idx: &Indexer, grid: Grid, flow: &FlowParams) {
    let inlet = D2Q9::equilibrium(flow.inlet_velocity, flow.inlet_density);
    let outlet = D2Q9::equilibrium(flow.outlet_velocity, flow.outlet_density);
    for y in 0..grid.height {
        idx.write(values, grid.node_index(0, y), &inlet);
        idx.write(values, grid.node_index(grid.width - 1, y), &outlet);
    }
}

/// Realizes inflow and outflow for the outstream engines by pulling into the
/// first and last interior columns along the directions that enter the
/// domain from each side.
pub fn ghost_stream_inout(values: &mut [Float], idx: &Indexer, grid: Grid) {
    for y in 1..grid.height - 1 {
        let node = grid.node_index(1, y);
        for direction in INFLOW_INSTREAM_DIRS {
            values[idx.at(node, direction)] =
                values[idx.at(grid.neighbor(node, D2Q9::invert(direction)), direction)];
        }
        let node = grid.node_index(grid.width - 2, y);
        for direction in OUTFLOW_INSTREAM_DIRS {
            values[idx.at(node, direction)] =
                values[idx.at(grid.neighbor(node, D2Q9::invert(direction)), direction)];
        }
    }
}

/// Laminar parabolic profile centered on the channel midline.
pub fn laminar_profile(y: usize, height: usize, mean_velocity: Velocity) -> Velocity {
    let middle = height as Float / 2.0;
    let radius = (height as Float - 2.0) / 2.0;
    let relative = (y as Float + 0.5 - middle) / radius;
    [2.0 * mean_velocity[0] * (1.0 - relative.powi(2)), 0.0]
}

/// Turbulent profile following the rule of the seventh.
pub fn turbulent_profile(
    y: usize,
    height: usize,
    mean_velocity: Velocity,
    factor: Float,
) -> Velocity {
    let middle = height as Float / 2.0;
    let radius = (height as Float - 2.0) / 2.0;
    let relative = (y as Float + 0.5 - middle).abs() / radius;
    [factor * mean_velocity[0] * (1.0 - relative.powi(7)), 0.0]
}

/// Applies the selected inlet/outlet policy to the ghost columns, filling in
/// the ghost observables as it goes. `offset` displaces every distribution
/// access and is only nonzero for the shift engines; observables are always
/// recorded at the unshifted node index.
pub fn apply_inlet_outlet(
    policy: InletOutletPolicy,
    values: &mut [Float],
    data: &mut StepData,
    idx: &Indexer,
    grid: Grid,
    flow: &FlowParams,
    offset: usize,
) {
    match policy {
        InletOutletPolicy::VelocityInputVelocityOutput => {
            for y in 1..grid.height - 1 {
                let node = grid.node_index(0, y);
                let neighbor = idx.read(values, grid.neighbor(node + offset, 5));
                let density =
                    2.0 * flow.inlet_density - macroscopic::density(&neighbor);
                let u = laminar_profile(y, grid.height, flow.inlet_velocity);
                idx.write(values, node + offset, &D2Q9::equilibrium(u, density));
                data.velocities[node] = u;
                data.densities[node] = density;

                let node = grid.node_index(grid.width - 1, y);
                let neighbor = idx.read(values, grid.neighbor(node + offset, 3));
                let density =
                    2.0 * flow.outlet_density - macroscopic::density(&neighbor);
                let u = turbulent_profile(
                    y,
                    grid.height,
                    flow.outlet_velocity,
                    flow.turbulence_factor,
                );
                idx.write(values, node + offset, &D2Q9::equilibrium(u, density));
                data.velocities[node] = u;
                data.densities[node] = density;
            }
        }
        InletOutletPolicy::VelocityInputDensityOutput
        | InletOutletPolicy::DensityInputDensityOutput => {
            let inlet_velocity = match policy {
                InletOutletPolicy::VelocityInputDensityOutput => flow.inlet_velocity,
                _ => [0.0, 0.0],
            };
            let inlet = D2Q9::equilibrium(inlet_velocity, flow.inlet_density);
            for y in 0..grid.height {
                let node = grid.node_index(0, y);
                idx.write(values, node + offset, &inlet);
                data.velocities[node] = inlet_velocity;
                data.densities[node] = flow.inlet_density;

                let node = grid.node_index(grid.width - 1, y);
                let neighbor = idx.read(values, grid.neighbor(node + offset, 3));
                let u = macroscopic::flow_velocity(&neighbor);
                idx.write(
                    values,
                    node + offset,
                    &D2Q9::equilibrium(u, flow.outlet_density),
                );
                data.velocities[node] = u;
                data.densities[node] = flow.outlet_density;
            }
        }
    }
}

/// Forces the four corner ghost nodes to the canonical inlet and outlet
/// equilibria. Every engine ends its ghost update with this: it keeps the
/// corner values, which some sweeps clobber and no sweep can regenerate,
/// identical across all streaming schemes.
pub fn restore_corners(
    values: &mut [Float],
    idx: &Indexer,
    grid: Grid,
    flow: &FlowParams,
    offset: usize,
) {
    let inlet = D2Q9::equilibrium(flow.inlet_velocity, flow.inlet_density);
    let outlet = D2Q9::equilibrium(flow.outlet_velocity, flow.outlet_density);
    let top = grid.height - 1;
    idx.write(values, grid.node_index(0, 0) + offset, &inlet);
    idx.write(values, grid.node_index(0, top) + offset, &inlet);
    idx.write(values, grid.node_index(grid.width - 1, 0) + offset, &outlet);
    idx.write(values, grid.node_index(grid.width - 1, top) + offset, &outlet);
}
