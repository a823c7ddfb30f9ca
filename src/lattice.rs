use crate::Float;

/// Two-dimensional flow velocity.
pub type Velocity = [Float; 2];

/// D2Q9 Lattice-Boltzmann model constants.
///
/// Directions follow the Mattila enumeration: index `d` has the offset
/// `(d % 3 - 1, d / 3 - 1)`, so direction 4 is the rest particle and the
/// opposite of `d` is `8 - d`.
pub struct D2Q9;

impl D2Q9 {
    /// Number of discrete velocities
    pub const Q: usize = 9;

    /// Discrete velocities, bottom row first
    pub const VELOCITIES: [[i32; 2]; 9] = [
        [-1, -1], [0, -1], [1, -1],
        [-1, 0],  [0, 0],  [1, 0],
        [-1, 1],  [0, 1],  [1, 1],
    ];

    /// Weights for each direction
    pub const WEIGHTS: [Float; 9] = [
        1.0 / 36.0, 1.0 / 9.0, 1.0 / 36.0,
        1.0 / 9.0,  4.0 / 9.0, 1.0 / 9.0,
        1.0 / 36.0, 1.0 / 9.0, 1.0 / 36.0,
    ];

    /// The eight directions that move during a streaming step
    pub const STREAMING_DIRECTIONS: [usize; 8] = [0, 1, 2, 3, 5, 6, 7, 8];

    /// Returns the direction opposite to the one specified.
    pub const fn invert(direction: usize) -> usize {
        8 - direction
    }

    /// Calculates the Maxwell-Boltzmann equilibrium distribution for all nine
    /// directions given a flow velocity and a density.
    pub fn equilibrium(u: Velocity, density: Float) -> [Float; 9] {
        let mut result = [0.0; 9];
        let uu = dot(u, u);
        for (direction, value) in result.iter_mut().enumerate() {
            let e = Self::VELOCITIES[direction];
            let eu = e[0] as Float * u[0] + e[1] as Float * u[1];
            *value = Self::WEIGHTS[direction]
                * (density + 3.0 * eu + 9.0 / 2.0 * eu * eu - 3.0 / 2.0 * uu);
        }
        result
    }
}

pub fn dot(a: Velocity, b: Velocity) -> Float {
    a[0] * b[0] + a[1] * b[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn opposite_direction_law() {
        for direction in 0..D2Q9::Q {
            assert_eq!(D2Q9::invert(direction), 8 - direction);
            assert_eq!(D2Q9::invert(D2Q9::invert(direction)), direction);
        }
    }

    #[test]
    fn opposite_directions_have_negated_offsets() {
        for direction in 0..D2Q9::Q {
            let e = D2Q9::VELOCITIES[direction];
            let o = D2Q9::VELOCITIES[D2Q9::invert(direction)];
            assert_eq!(e[0], -o[0]);
            assert_eq!(e[1], -o[1]);
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let total: Float = D2Q9::WEIGHTS.iter().sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-15);
    }

    #[test]
    fn equilibrium_at_rest_recovers_density() {
        for density in [0.5, 1.0, 2.5] {
            let eq = D2Q9::equilibrium([0.0, 0.0], density);
            let total: Float = eq.iter().sum();
            assert_abs_diff_eq!(total, density, epsilon = 1e-12);
            for direction in 0..D2Q9::Q {
                assert_eq!(eq[direction], eq[D2Q9::invert(direction)]);
            }
        }
    }

    #[test]
    fn equilibrium_symmetric_under_velocity_sign_flip() {
        let u = [0.08, -0.03];
        let flipped = [-u[0], -u[1]];
        let eq = D2Q9::equilibrium(u, 1.2);
        let eq_flipped = D2Q9::equilibrium(flipped, 1.2);
        for direction in 0..D2Q9::Q {
            assert_abs_diff_eq!(
                eq_flipped[direction],
                eq[D2Q9::invert(direction)],
                epsilon = 1e-15
            );
        }
    }
}
