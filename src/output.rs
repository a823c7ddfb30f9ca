use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::solver::SimulationOutput;

/// Writes the captured observables as CSV, one row per (iteration, x, y).
/// Only interior fluid nodes are exported; the buffer rows of a parallel
/// run are skipped and the remaining rows renumbered to physical
/// coordinates, so sequential and parallel runs of the same physical
/// domain produce comparable files.
pub fn write_results_csv(path: impl AsRef<Path>, output: &SimulationOutput) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("could not create result file {}", path.display()))?;
    let mut file = BufWriter::new(file);
    writeln!(file, "iteration,x,y,vx,vy,density")?;

    let grid = output.domain.grid;
    for (iteration, step) in output.steps.iter().enumerate() {
        for y in 1..grid.height - 1 {
            let Some(physical_y) = output.physical_row(y) else {
                continue;
            };
            for x in 1..grid.width - 1 {
                let node = grid.node_index(x, y);
                if output.domain.phase[node] {
                    continue;
                }
                let velocity = step.velocities[node];
                writeln!(
                    file,
                    "{},{},{},{},{},{}",
                    iteration, x, physical_y, velocity[0], velocity[1], step.densities[node]
                )?;
            }
        }
    }
    file.flush()?;
    Ok(())
}
