//! The module responsible for writing output data to disk.
//!
//! Each horizon step writes its parameters, variable values and configuration to a folder named
//! after the step. Every file is JSON, optionally zlib-compressed (with a `.json.z` extension),
//! and can be read back with [`read_dict`] and [`read_json`] without re-solving.
use crate::index::IndexTuple;
use crate::model::{Model, SolverParameters};
use crate::parameter::ParameterStore;
use crate::simulation::StepConfig;
use crate::simulation::optimisation::Solution;
use anyhow::{Context, Result, ensure};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub mod value;
use value::OutputValue;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "zen2_results";

/// The output file name for parameter tables
pub const PARAMETERS_FILE_NAME: &str = "param_dict";

/// The output file name for variable values
pub const VARIABLES_FILE_NAME: &str = "var_dict";

/// The output file name for the `[system]` configuration
pub const SYSTEM_FILE_NAME: &str = "system";

/// The output file name for the `[analysis]` configuration
pub const ANALYSIS_FILE_NAME: &str = "analysis";

/// The output file name for the solver options and result
pub const SOLVER_FILE_NAME: &str = "solver";

/// The output file name for the scenario being run
pub const SCENARIOS_FILE_NAME: &str = "scenarios";

/// The output file name for the time-step sequence
pub const SEQUENCE_FILE_NAME: &str = "dict_all_sequence_time_steps";

/// Get the model name from the specified directory path
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted because we need to check
    // for all possible errors. Ugh.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory for the model, if it doesn't already exist.
///
/// A non-empty existing directory is only reused if `allow_overwrite` is set, in which case its
/// contents are deleted.
///
/// # Returns
///
/// Whether an existing directory was overwritten
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. \
            Please delete the folder or pass the --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir).context("Could not delete folder")?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// A single entry of an output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEntry {
    /// The index of the entry, one component per dimension
    pub index: IndexTuple,
    /// The value of the entry
    pub value: OutputValue,
}

/// A parameter table or variable family, as written to file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputTable {
    /// What the table represents
    pub description: String,
    /// The names of the index sets of the table
    pub dimensions: Vec<String>,
    /// The entries, in the order they were added to the model
    pub values: Vec<OutputEntry>,
}

/// Output tables keyed by parameter or variable name
pub type OutputDict = IndexMap<String, OutputTable>;

/// The solver options together with what the solver found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOutput {
    /// The options the problem was solved with
    #[serde(flatten)]
    pub options: SolverParameters,
    /// The value of the objective function
    pub objective_value: f64,
}

/// The scenario a set of results was produced for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutput {
    /// The name of the scenario
    pub scenario: String,
    /// The index of the horizon step
    pub step: u32,
    /// The number of horizon steps of the run
    pub num_steps: u32,
    /// The yearly steps covered by the horizon step
    pub years: Vec<u32>,
}

/// The time-step sequence of a horizon step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceOutput {
    /// The local operational step of each full-resolution step of a year
    pub operation: Vec<u32>,
    /// The yearly steps covered
    pub yearly: Vec<u32>,
}

/// Get the path of an output file, with the extension depending on whether it is compressed
fn file_path(dir: &Path, file_name: &str, compress: bool) -> PathBuf {
    let extension = if compress { "json.z" } else { "json" };
    dir.join(format!("{file_name}.{extension}"))
}

/// Serialise a value to a JSON file, compressing it if requested
pub fn write_json<T: Serialize>(path: &Path, value: &T, compress: bool) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Could not create file {}", path.display()))?;
    let writer = BufWriter::new(file);
    if compress {
        let mut encoder = ZlibEncoder::new(writer, Compression::default());
        serde_json::to_writer(&mut encoder, value)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = writer;
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }

    Ok(())
}

/// Read a value back from a JSON file written by [`write_json`].
///
/// Files with a `.z` extension are decompressed first.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file =
        File::open(path).with_context(|| format!("Could not open file {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let value = if path.extension().is_some_and(|ext| ext == "z") {
        let mut contents = String::new();
        ZlibDecoder::new(reader)
            .read_to_string(&mut contents)
            .with_context(|| format!("Could not decompress {}", path.display()))?;
        serde_json::from_str(&contents)?
    } else {
        serde_json::from_reader(&mut reader)?
    };

    Ok(value)
}

/// Read a parameter or variable dictionary from a results folder
pub fn read_dict(dir: &Path, file_name: &str, compress: bool) -> Result<OutputDict> {
    read_json(&file_path(dir, file_name, compress))
}

/// Convert the parameter store into output tables
fn parameter_tables(parameters: &ParameterStore) -> OutputDict {
    parameters
        .iter()
        .map(|table| {
            let values = table
                .values
                .iter()
                .map(|(index, value)| OutputEntry {
                    index: index.clone(),
                    value: OutputValue::from(*value),
                })
                .collect();
            let output = OutputTable {
                description: table.name.description().to_string(),
                dimensions: table.dimensions().iter().map(ToString::to_string).collect(),
                values,
            };
            (table.name.to_string(), output)
        })
        .collect()
}

/// Convert the solved variable values into output tables.
///
/// Variables the solver did not report a value for are written as `null`.
fn variable_tables(solution: &Solution) -> OutputDict {
    let mut dict = OutputDict::new();
    for name in solution.variable_names() {
        let mut missing = 0usize;
        let values = solution
            .iter_values(name)
            .map(|(index, value)| {
                if value.is_none() {
                    missing += 1;
                }
                OutputEntry {
                    index: index.clone(),
                    value: value.into(),
                }
            })
            .collect();
        if missing > 0 {
            warn!("{missing} values of variable {name} have no solution and are written as null");
        }

        let table = OutputTable {
            description: name.description().to_string(),
            dimensions: name.dimensions().iter().map(ToString::to_string).collect(),
            values,
        };
        dict.insert(name.to_string(), table);
    }

    dict
}

/// Write all results of a solved horizon step to `dir`, creating it if necessary
pub fn write_step_results(
    dir: &Path,
    model: &Model,
    config: &StepConfig,
    parameters: &ParameterStore,
    solution: &Solution,
    compress: bool,
) -> Result<()> {
    fs::create_dir_all(dir)?;
    let path = |file_name| file_path(dir, file_name, compress);

    write_json(
        &path(PARAMETERS_FILE_NAME),
        &parameter_tables(parameters),
        compress,
    )?;
    write_json(&path(VARIABLES_FILE_NAME), &variable_tables(solution), compress)?;
    write_json(&path(SYSTEM_FILE_NAME), model.system(), compress)?;
    write_json(
        &path(ANALYSIS_FILE_NAME),
        &model.parameters.analysis,
        compress,
    )?;

    let solver = SolverOutput {
        options: model.parameters.solver.clone(),
        objective_value: solution.objective_value(),
    };
    write_json(&path(SOLVER_FILE_NAME), &solver, compress)?;

    let scenario = ScenarioOutput {
        scenario: config.scenario.to_string(),
        step: config.step,
        num_steps: config.num_steps,
        years: config.time_steps.years().to_vec(),
    };
    write_json(&path(SCENARIOS_FILE_NAME), &scenario, compress)?;

    let sequence = SequenceOutput {
        operation: config.time_steps.sequence(),
        yearly: config.time_steps.years().to_vec(),
    };
    write_json(&path(SEQUENCE_FILE_NAME), &sequence, compress)?;

    debug!("Wrote results to {}", dir.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{simple_model, solve_first_step};
    use crate::index::{IndexValue, index};
    use crate::parameter::ParameterName;
    use crate::scenario::ScenarioID;
    use crate::simulation::optimisation::VariableName;
    use rstest::rstest;
    use tempfile::tempdir;

    fn find<'a>(dict: &'a OutputDict, name: &str, index: &IndexTuple) -> &'a OutputEntry {
        dict[name]
            .values
            .iter()
            .find(|entry| entry.index == *index)
            .unwrap()
    }

    #[test]
    fn test_create_output_directory_new() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("results");
        assert!(!create_output_directory(&output_dir, false).unwrap());
        assert!(output_dir.is_dir());
    }

    #[test]
    fn test_create_output_directory_existing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("file.txt"), "contents").unwrap();

        assert!(create_output_directory(dir.path(), false).is_err());
        assert!(create_output_directory(dir.path(), true).unwrap());
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_write_step_results(simple_model: Model, #[case] compress: bool) {
        let config = StepConfig::new(&simple_model, &ScenarioID::base(), 0).unwrap();
        let (parameters, solution) = solve_first_step(&simple_model);
        let dir = tempdir().unwrap();
        write_step_results(
            dir.path(),
            &simple_model,
            &config,
            &parameters,
            &solution,
            compress,
        )
        .unwrap();

        let params = read_dict(dir.path(), PARAMETERS_FILE_NAME, compress).unwrap();
        let demand = find(
            &params,
            &ParameterName::Demand.to_string(),
            &index!["B", "node1", 0u32],
        );
        assert_eq!(demand.value, OutputValue::Number(10.0));
        assert_eq!(
            params[&ParameterName::Demand.to_string()].dimensions,
            ["set_carriers", "set_nodes", "set_time_steps_operation"]
        );

        let vars = read_dict(dir.path(), VARIABLES_FILE_NAME, compress).unwrap();
        let output = find(
            &vars,
            &VariableName::OutputFlow.to_string(),
            &index!["converter", "B", "node1", 0u32],
        );
        let expected = solution.value(
            VariableName::OutputFlow,
            &index!["converter", "B", "node1", 0u32],
        );
        assert_eq!(output.value, OutputValue::from(expected));

        // Every variable family can be rebuilt from the file
        for name in solution.variable_names() {
            let written: IndexMap<IndexTuple, OutputValue> = vars[&name.to_string()]
                .values
                .iter()
                .map(|entry| (entry.index.clone(), entry.value))
                .collect();
            let solved: IndexMap<IndexTuple, OutputValue> = solution
                .iter_values(name)
                .map(|(index, value)| (index.clone(), OutputValue::from(value)))
                .collect();
            assert_eq!(written, solved, "{name} differs after reading back");
        }

        let solver: SolverOutput =
            read_json(&file_path(dir.path(), SOLVER_FILE_NAME, compress)).unwrap();
        assert_eq!(solver.objective_value, solution.objective_value());
        let scenario: ScenarioOutput =
            read_json(&file_path(dir.path(), SCENARIOS_FILE_NAME, compress)).unwrap();
        assert_eq!(scenario.years, [0]);
    }

    #[test]
    fn test_index_keeps_steps_and_labels_apart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        let entries = vec![
            OutputEntry {
                index: index!["0", 0u32],
                value: OutputValue::Number(1.0),
            },
            OutputEntry {
                index: index![0u32, "0"],
                value: OutputValue::Number(2.0),
            },
        ];
        write_json(&path, &entries, false).unwrap();

        let read: Vec<OutputEntry> = read_json(&path).unwrap();
        assert_eq!(read, entries);
        assert_eq!(read[0].index.0[0], IndexValue::Label("0".into()));
        assert_eq!(read[0].index.0[1], IndexValue::Step(0));
    }

    #[test]
    fn test_float_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("value.json");
        let values = vec![0.1 + 0.2, 1.0 / 3.0, 1e-300];
        write_json(&path, &values, false).unwrap();
        let read: Vec<f64> = read_json(&path).unwrap();
        assert_eq!(read, values);
    }
}
