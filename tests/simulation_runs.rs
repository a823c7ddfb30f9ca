//! Whole-program runs: configuration in, observables and CSV out.

use lbm2d::{Config, ConfigError, output, solver};

#[test]
fn csv_configured_sequential_run_produces_results() {
    let config = Config::from_csv_str(
        "algorithm,sequential_swap\n\
         horizontal_nodes,9\n\
         vertical_nodes,8\n\
         time_steps,5\n\
         results_to_csv,1\n",
    )
    .unwrap();
    let result = solver::execute(&config).unwrap();
    assert_eq!(result.steps.len(), 5);
    assert!(result.buffer_rows.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.csv");
    output::write_results_csv(&path, &result).unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    // Header plus one row per interior node per step.
    assert_eq!(content.lines().count(), 1 + 5 * 7 * 6);
}

#[test]
fn parallel_run_exports_physical_rows_only() {
    let config = Config::from_csv_str(
        "algorithm,parallel_two_step\n\
         horizontal_nodes,7\n\
         vertical_nodes,26\n\
         subdomain_height,8\n\
         time_steps,3\n",
    )
    .unwrap();
    let result = solver::execute(&config).unwrap();
    assert_eq!(result.buffer_rows, vec![8, 17]);
    assert_eq!(result.physical_row(8), None);
    assert_eq!(result.physical_row(9), Some(8));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.csv");
    output::write_results_csv(&path, &result).unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    // 22 physical interior rows of 5 nodes each.
    assert_eq!(content.lines().count(), 1 + 3 * 5 * 22);
}

#[test]
fn misaligned_parallel_geometry_is_fatal() {
    let config = Config::from_csv_str(
        "algorithm,parallel_swap\n\
         horizontal_nodes,7\n\
         vertical_nodes,25\n\
         subdomain_height,8\n",
    )
    .unwrap();
    assert!(matches!(
        solver::execute(&config),
        Err(ConfigError::MisalignedSubdomains { .. })
    ));
}
