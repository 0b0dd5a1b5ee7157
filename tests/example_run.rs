//! Integration tests for the `example run` command.
use itertools::Itertools;
use zen2::cli::RunOpts;
use zen2::cli::example::handle_example_run_command;
use zen2::output::{SCENARIOS_FILE_NAME, ScenarioOutput, read_json};
use zen2::settings::Settings;
use std::fs::read_dir;
use tempfile::tempdir;

/// An integration test for the `example run` command.
///
/// Every horizon step of every scenario gets its own results folder.
#[test]
fn test_handle_example_run_command() {
    unsafe { std::env::set_var("ZEN2_LOG_LEVEL", "off") };

    let tempdir = tempdir().unwrap();
    let opts = RunOpts {
        output_dir: Some(tempdir.path().to_path_buf()),
        overwrite: false,
    };
    handle_example_run_command("network", &opts, Some(Settings::default())).unwrap();

    let step_dirs = read_dir(tempdir.path())
        .unwrap()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .sorted()
        .collect_vec();
    assert_eq!(
        step_dirs,
        [
            "network_MF0",
            "network_MF0_high_gas_price",
            "network_MF1",
            "network_MF1_high_gas_price",
            "network_MF2",
            "network_MF2_high_gas_price",
        ]
    );

    let scenario: ScenarioOutput = read_json(
        &tempdir
            .path()
            .join("network_MF1")
            .join(format!("{SCENARIOS_FILE_NAME}.json")),
    )
    .unwrap();
    assert_eq!(scenario.step, 1);
    assert_eq!(scenario.num_steps, 3);
    assert_eq!(scenario.years, [1, 2]);
}
