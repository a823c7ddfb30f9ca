//! The storage layout only re-indexes the distribution vector; it must not
//! change a single observable value.

mod common;

use common::{assert_equivalent, channel_run};
use lbm2d::grid::AccessPattern;
use lbm2d::{Algorithm, Grid, InletOutletPolicy};

const LAYOUTS: [AccessPattern; 3] = [
    AccessPattern::Collision,
    AccessPattern::Stream,
    AccessPattern::Bundle,
];

#[test]
fn shift_engine_is_layout_independent() {
    let grid = Grid::new(15, 15);
    let reference = channel_run(
        Algorithm::SequentialShift,
        grid,
        AccessPattern::Collision,
        InletOutletPolicy::VelocityInputDensityOutput,
        40,
    );
    for pattern in [AccessPattern::Stream, AccessPattern::Bundle] {
        let other = channel_run(
            Algorithm::SequentialShift,
            grid,
            pattern,
            InletOutletPolicy::VelocityInputDensityOutput,
            40,
        );
        assert_equivalent(&format!("shift under {pattern:?}"), &reference, &other, 0.0);
    }
}

#[test]
fn every_engine_is_layout_independent() {
    let grid = Grid::new(10, 9);
    for algorithm in [
        Algorithm::SequentialTwoLattice,
        Algorithm::SequentialTwoStep,
        Algorithm::SequentialSwap,
    ] {
        let mut runs = LAYOUTS.iter().map(|&pattern| {
            channel_run(
                algorithm,
                grid,
                pattern,
                InletOutletPolicy::VelocityInputDensityOutput,
                12,
            )
        });
        let reference = runs.next().unwrap();
        for other in runs {
            assert_equivalent(&format!("{algorithm:?}"), &reference, &other, 0.0);
        }
    }
}
