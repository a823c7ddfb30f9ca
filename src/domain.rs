use crate::Float;
use crate::boundary::{self, FlowParams};
use crate::grid::{Grid, Indexer};
use crate::lattice::D2Q9;

/// Simulation domain: the lattice geometry, the phase map (true marks a
/// solid node) and the canonical row-major list of interior fluid nodes.
#[derive(Debug, Clone)]
pub struct Domain {
    pub grid: Grid,
    pub phase: Vec<bool>,
    pub fluid_nodes: Vec<usize>,
}

impl Domain {
    /// Builds the channel domain: solid walls on the top and bottom ghost
    /// rows, inlet and outlet ghost columns on the left and right.
    pub fn channel(grid: Grid) -> Self {
        let mut phase = vec![false; grid.node_count()];
        for x in 0..grid.width {
            phase[grid.node_index(x, 0)] = true;
            phase[grid.node_index(x, grid.height - 1)] = true;
        }
        let mut domain = Self {
            grid,
            phase,
            fluid_nodes: Vec::new(),
        };
        domain.rebuild_fluid_nodes();
        domain
    }

    /// Marks a rectangular block of interior nodes as solid.
    pub fn add_solid_block(&mut self, x0: usize, y0: usize, width: usize, height: usize) {
        for y in y0..y0 + height {
            for x in x0..x0 + width {
                debug_assert!(x >= 1 && x <= self.grid.width - 2);
                debug_assert!(y >= 1 && y <= self.grid.height - 2);
                let node = self.grid.node_index(x, y);
                self.phase[node] = true;
            }
        }
        self.rebuild_fluid_nodes();
    }

    fn rebuild_fluid_nodes(&mut self) {
        self.fluid_nodes.clear();
        for y in 1..self.grid.height - 1 {
            for x in 1..self.grid.width - 1 {
                let node = self.grid.node_index(x, y);
                if !self.phase[node] {
                    self.fluid_nodes.push(node);
                }
            }
        }
    }

    pub fn is_solid(&self, x: usize, y: usize) -> bool {
        self.phase[self.grid.node_index(x, y)]
    }

    /// Allocates the distribution vector for this domain and fills it with
    /// the startup state: resting equilibrium at unit density everywhere,
    /// inlet and outlet equilibria on the ghost columns. The indexer decides
    /// the capacity, so the same routine serves the plain engines and the
    /// shift engine with its tail slack.
    pub fn initial_distributions(&self, idx: &Indexer, flow: &FlowParams) -> Vec<Float> {
        let mut values = vec![0.0; idx.value_count()];
        let resting = D2Q9::equilibrium([0.0, 0.0], 1.0);
        for node in 0..self.grid.node_count() {
            idx.write(&mut values, node, &resting);
        }
        boundary::initialize_inout(&mut values, idx, self.grid, flow);
        values
    }
}
