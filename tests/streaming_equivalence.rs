//! The four streaming schemes realize the same physical update: given the
//! same initial state, boundary policy and relaxation time, their observable
//! fields must agree at every step.

mod common;

use common::{assert_equivalent, channel_run};
use lbm2d::grid::AccessPattern;
use lbm2d::{Algorithm, Grid, InletOutletPolicy};

const ENGINES: [Algorithm; 3] = [
    Algorithm::SequentialTwoStep,
    Algorithm::SequentialSwap,
    Algorithm::SequentialShift,
];

#[test]
fn four_engines_agree_on_channel_inflow() {
    let grid = Grid::new(12, 12);
    let reference = channel_run(
        Algorithm::SequentialTwoLattice,
        grid,
        AccessPattern::Collision,
        InletOutletPolicy::VelocityInputDensityOutput,
        20,
    );
    for algorithm in ENGINES {
        let other = channel_run(
            algorithm,
            grid,
            AccessPattern::Collision,
            InletOutletPolicy::VelocityInputDensityOutput,
            20,
        );
        assert_equivalent(&format!("{algorithm:?}"), &reference, &other, 1e-9);
    }
}

#[test]
fn four_engines_agree_under_density_boundaries() {
    let grid = Grid::new(9, 8);
    let reference = channel_run(
        Algorithm::SequentialTwoLattice,
        grid,
        AccessPattern::Collision,
        InletOutletPolicy::DensityInputDensityOutput,
        12,
    );
    for algorithm in ENGINES {
        let other = channel_run(
            algorithm,
            grid,
            AccessPattern::Collision,
            InletOutletPolicy::DensityInputDensityOutput,
            12,
        );
        assert_equivalent(&format!("{algorithm:?}"), &reference, &other, 1e-9);
    }
}

#[test]
fn four_engines_agree_under_profile_boundaries() {
    let grid = Grid::new(10, 11);
    let reference = channel_run(
        Algorithm::SequentialTwoLattice,
        grid,
        AccessPattern::Collision,
        InletOutletPolicy::VelocityInputVelocityOutput,
        10,
    );
    for algorithm in ENGINES {
        let other = channel_run(
            algorithm,
            grid,
            AccessPattern::Collision,
            InletOutletPolicy::VelocityInputVelocityOutput,
            10,
        );
        assert_equivalent(&format!("{algorithm:?}"), &reference, &other, 1e-9);
    }
}
