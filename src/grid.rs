use serde::Deserialize;

use crate::Float;

/// Rectangular lattice geometry with the origin at the lower left corner and
/// row-major node enumeration. The outermost ring of nodes is not simulated:
/// the top and bottom rows are solid walls, the left and right columns hold
/// the inlet and outlet ghost nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn node_count(&self) -> usize {
        self.width * self.height
    }

    pub fn node_index(&self, x: usize, y: usize) -> usize {
        x + y * self.width
    }

    pub fn node_coordinates(&self, node: usize) -> (usize, usize) {
        (node % self.width, node / self.width)
    }

    /// Returns the index of the neighbor reached when moving in the given
    /// direction. Unchecked: callers only pass nodes whose neighbors exist,
    /// which the ghost ring guarantees for every fluid node. The shift
    /// engines call this on frame-displaced indices past the grid, so only
    /// the lower bound can be asserted here.
    pub fn neighbor(&self, node: usize, direction: usize) -> usize {
        let y_offset = direction as isize / 3 - 1;
        let x_offset = direction as isize % 3 - 1;
        let neighbor = node as isize + y_offset * self.width as isize + x_offset;
        debug_assert!(neighbor >= 0);
        neighbor as usize
    }
}

/// Storage layout of the distribution values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPattern {
    /// All nine values of a node are contiguous
    Collision,
    /// All values of one direction are contiguous across the grid
    Stream,
    /// Directions grouped into the three y-bands, three values per node each
    Bundle,
}

/// Maps `(node, direction)` to an offset into the flat distribution vector.
///
/// `stride` is the per-direction node capacity: the plain node count for the
/// two-lattice, two-step and swap engines, and the node count plus the shift
/// tail for the shift engines. The allocated vector always holds
/// `9 * stride` values.
#[derive(Debug, Clone, Copy)]
pub struct Indexer {
    pattern: AccessPattern,
    stride: usize,
}

impl Indexer {
    pub fn new(pattern: AccessPattern, stride: usize) -> Self {
        Self { pattern, stride }
    }

    pub fn value_count(&self) -> usize {
        9 * self.stride
    }

    pub fn at(&self, node: usize, direction: usize) -> usize {
        debug_assert!(node < self.stride && direction < 9);
        match self.pattern {
            AccessPattern::Collision => 9 * node + direction,
            AccessPattern::Stream => self.stride * direction + node,
            AccessPattern::Bundle => {
                3 * (direction / 3) * self.stride + 3 * node + direction % 3
            }
        }
    }

    /// Reads the nine distribution values of one node.
    pub fn read(&self, values: &[Float], node: usize) -> [Float; 9] {
        let mut result = [0.0; 9];
        for (direction, value) in result.iter_mut().enumerate() {
            *value = values[self.at(node, direction)];
        }
        result
    }

    /// Writes the nine distribution values of one node.
    pub fn write(&self, values: &mut [Float], node: usize, node_values: &[Float; 9]) {
        for (direction, value) in node_values.iter().enumerate() {
            values[self.at(node, direction)] = *value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_index_round_trip() {
        let grid = Grid::new(7, 26);
        for y in 0..grid.height {
            for x in 0..grid.width {
                let node = grid.node_index(x, y);
                assert_eq!(grid.node_coordinates(node), (x, y));
            }
        }
    }

    #[test]
    fn neighbor_reciprocity() {
        let grid = Grid::new(9, 11);
        for y in 1..grid.height - 1 {
            for x in 1..grid.width - 1 {
                let node = grid.node_index(x, y);
                for direction in 0..9 {
                    let there = grid.neighbor(node, direction);
                    let back = grid.neighbor(there, crate::lattice::D2Q9::invert(direction));
                    assert_eq!(back, node);
                }
            }
        }
    }

    #[test]
    fn neighbor_offsets_match_direction_vectors() {
        let grid = Grid::new(8, 8);
        let node = grid.node_index(4, 4);
        for direction in 0..9 {
            let e = crate::lattice::D2Q9::VELOCITIES[direction];
            let (x, y) = grid.node_coordinates(grid.neighbor(node, direction));
            assert_eq!(x as i32, 4 + e[0]);
            assert_eq!(y as i32, 4 + e[1]);
        }
    }

    #[test]
    fn layouts_are_bijections() {
        let node_count = 5 * 7;
        for pattern in [
            AccessPattern::Collision,
            AccessPattern::Stream,
            AccessPattern::Bundle,
        ] {
            let idx = Indexer::new(pattern, node_count);
            let mut seen = vec![false; idx.value_count()];
            for node in 0..node_count {
                for direction in 0..9 {
                    let offset = idx.at(node, direction);
                    assert!(offset < seen.len());
                    assert!(!seen[offset], "offset {offset} mapped twice");
                    seen[offset] = true;
                }
            }
            assert!(seen.iter().all(|&hit| hit));
        }
    }

    #[test]
    fn read_write_round_trip() {
        let idx = Indexer::new(AccessPattern::Bundle, 12);
        let mut values = vec![0.0; idx.value_count()];
        let node_values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        idx.write(&mut values, 5, &node_values);
        assert_eq!(idx.read(&values, 5), node_values);
        assert_eq!(idx.read(&values, 4), [0.0; 9]);
    }
}
