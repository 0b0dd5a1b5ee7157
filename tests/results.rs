//! Checks on the results of solving an example model.
use float_cmp::approx_eq;
use zen2::cli::RunOpts;
use zen2::cli::example::handle_example_run_command;
use zen2::index::IndexTuple;
use zen2::output::{
    OutputDict, PARAMETERS_FILE_NAME, SOLVER_FILE_NAME, SolverOutput, VARIABLES_FILE_NAME,
    read_dict, read_json,
};
use zen2::settings::Settings;
use tempfile::tempdir;

/// The sum of the values of a table whose index ends with `suffix`
fn sum_matching(dict: &OutputDict, name: &str, suffix: &IndexTuple) -> f64 {
    let Some(table) = dict.get(name) else {
        return 0.0;
    };

    table
        .values
        .iter()
        .filter(|entry| entry.index.0.ends_with(&suffix.0))
        .filter_map(|entry| entry.value.as_f64())
        .sum()
}

/// Every carrier is balanced at every node in every time step of the simple example
#[test]
fn test_simple_example_is_balanced() {
    unsafe { std::env::set_var("ZEN2_LOG_LEVEL", "off") };

    let tempdir = tempdir().unwrap();
    let opts = RunOpts {
        output_dir: Some(tempdir.path().to_path_buf()),
        overwrite: false,
    };
    handle_example_run_command("simple", &opts, Some(Settings::default())).unwrap();

    let step_dir = tempdir.path().join("simple");
    let parameters = read_dict(&step_dir, PARAMETERS_FILE_NAME, false).unwrap();
    let variables = read_dict(&step_dir, VARIABLES_FILE_NAME, false).unwrap();

    let demand = &parameters["demand"];
    assert!(!demand.values.is_empty());
    for entry in &demand.values {
        let expected = entry.value.as_f64().unwrap();
        let supplied = sum_matching(&variables, "output_flow", &entry.index)
            - sum_matching(&variables, "input_flow", &entry.index)
            + sum_matching(&variables, "import_carrier_flow", &entry.index)
            - sum_matching(&variables, "export_carrier_flow", &entry.index)
            + sum_matching(&variables, "shed_demand_carrier", &entry.index);
        assert!(
            approx_eq!(f64, supplied, expected, epsilon = 1e-6),
            "Carrier is not balanced at {}: {supplied} != {expected}",
            entry.index
        );
    }

    let solver: SolverOutput =
        read_json(&step_dir.join(format!("{SOLVER_FILE_NAME}.json"))).unwrap();
    assert!(solver.objective_value.is_finite());
    assert!(solver.objective_value > 0.0);
}
