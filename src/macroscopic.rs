use crate::Float;
use crate::lattice::{D2Q9, Velocity};

/// Velocity and density fields captured for one time step, indexed by node.
/// Nodes that are never updated keep the sentinel values the constructor
/// fills in (zero velocity, density -1).
#[derive(Debug, Clone)]
pub struct StepData {
    pub velocities: Vec<Velocity>,
    pub densities: Vec<Float>,
}

impl StepData {
    pub fn new(node_count: usize) -> Self {
        Self {
            velocities: vec![[0.0, 0.0]; node_count],
            densities: vec![-1.0; node_count],
        }
    }
}

/// Calculates the density of a fluid node, the sum of its nine values.
pub fn density(node_values: &[Float; 9]) -> Float {
    node_values.iter().sum()
}

/// Calculates the flow velocity of a fluid node, the direction-weighted sum
/// of its nine values.
pub fn flow_velocity(node_values: &[Float; 9]) -> Velocity {
    let mut velocity = [0.0, 0.0];
    for (direction, value) in node_values.iter().enumerate() {
        let e = D2Q9::VELOCITIES[direction];
        velocity[0] += value * e[0] as Float;
        velocity[1] += value * e[1] as Float;
    }
    velocity
}
