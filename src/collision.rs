use crate::Float;
use crate::grid::Indexer;
use crate::lattice::{D2Q9, Velocity};
use crate::macroscopic;

/// Performs the BGK collision step for a single node, relaxing its values
/// toward the equilibrium distribution for the given velocity and density.
pub fn collide_bgk(
    node_values: &[Float; 9],
    u: Velocity,
    density: Float,
    relaxation_time: Float,
) -> [Float; 9] {
    let mut result = D2Q9::equilibrium(u, density);
    for direction in 0..D2Q9::Q {
        result[direction] = node_values[direction]
            - (1.0 / relaxation_time) * (node_values[direction] - result[direction]);
    }
    result
}

/// Reads one node's distribution values, derives its macroscopic moments,
/// collides in place and returns the moments for observable capture.
pub fn perform_collision(
    node: usize,
    values: &mut [Float],
    idx: &Indexer,
    relaxation_time: Float,
) -> (Velocity, Float) {
    let current = idx.read(values, node);
    let velocity = macroscopic::flow_velocity(&current);
    let density = macroscopic::density(&current);
    let collided = collide_bgk(&current, velocity, density, relaxation_time);
    idx.write(values, node, &collided);
    (velocity, density)
}
