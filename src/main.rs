use anyhow::Result;
use log::info;
use std::env;

use lbm2d::{Config, output, solver};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        eprintln!("Usage: {} [config-file]", args[0]);
        eprintln!("  config-file - simulation parameters, defaults to config.csv");
        std::process::exit(1);
    }
    let config_path = args.get(1).map(String::as_str).unwrap_or("config.csv");

    info!("Loading configuration from: {config_path}");
    let config = Config::from_file(config_path)?;

    info!("Simulation parameters:");
    info!("  Algorithm: {:?}", config.algorithm);
    info!("  Access pattern: {:?}", config.access_pattern);
    info!(
        "  Domain: {}x{}",
        config.horizontal_nodes, config.vertical_nodes
    );
    info!("  Relaxation time: {}", config.relaxation_time);
    info!("  Time steps: {}", config.time_steps);
    info!("  Inlet velocity: {:?}", config.flow.inlet_velocity);

    let result = solver::execute(&config)?;

    if config.results_to_csv {
        output::write_results_csv("results.csv", &result)?;
        info!("Wrote results.csv");
    }

    info!("Simulation completed successfully");
    Ok(())
}
