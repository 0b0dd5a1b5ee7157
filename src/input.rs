//! Common routines for handling input data.
use crate::error::ModelError;
use crate::model::{Model, ModelParameters, SystemParameters};
use crate::parameter::{AttributeData, ElementKind, Granularity, ParameterName};
use anyhow::{Context, Result, bail, ensure};
use itertools::Itertools;
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;

pub mod carrier;
use carrier::read_carriers;
pub mod network;
use network::{read_edges, read_nodes};
pub mod technology;
use technology::{read_existing_capacities, read_technologies};

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    let vec = read_csv_internal(file_path)?;
    if vec.is_empty() {
        bail!("CSV file {} cannot be empty", file_path.display());
    }
    Ok(vec.into_iter())
}

/// Read a series of type `T`s from a CSV file.
///
/// Returns an empty iterator if the file does not exist.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv_optional<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    if !file_path.exists() {
        return Ok(Vec::new().into_iter());
    }

    let vec = read_csv_internal(file_path)?;
    Ok(vec.into_iter())
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .with_context(|| input_err_msg(file_path))?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Read a time step which may be empty, in which case `None` is returned
pub fn deserialise_optional_step<'de, D>(deserialiser: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Deserialize::deserialize(deserialiser)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("Invalid time step: {value}"))),
    }
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Parse the name of an input attribute, checking it can be given for this kind of element
fn parse_attribute(element: &str, attribute: &str, kind: ElementKind) -> Result<ParameterName> {
    let Ok(name) = ParameterName::from_str(attribute) else {
        bail!(ModelError::configuration(
            element,
            format!("unknown attribute {attribute}")
        ));
    };

    let allowed = match (name.input_element(), kind) {
        (Some(allowed), kind) if allowed == kind => true,
        // Attributes of all technologies are also attributes of each category
        (
            Some(ElementKind::Technology),
            ElementKind::TransportTechnology | ElementKind::StorageTechnology,
        ) => true,
        _ => false,
    };
    ensure!(
        allowed,
        ModelError::configuration(element, format!("{attribute} is not an attribute of a {kind}"))
    );

    Ok(name)
}

/// Check that a time step given for a time series is valid for the attribute's granularity
fn check_series_step(
    element: &str,
    name: ParameterName,
    step: Option<u32>,
    full_steps_per_year: u32,
    num_years: u32,
) -> Result<()> {
    match (name.granularity(), step) {
        (Granularity::Scalar, _) => bail!(ModelError::configuration(
            element,
            format!("{name} cannot vary by location or time step")
        )),
        (Granularity::Location, Some(_)) => bail!(ModelError::configuration(
            element,
            format!("{name} cannot vary by time step")
        )),
        (Granularity::Operation, Some(step)) => ensure!(
            step < full_steps_per_year,
            ModelError::data_consistency(
                element,
                format!("time step {step} of {name} is out of range")
            )
        ),
        (Granularity::Yearly, Some(step)) => ensure!(
            step < num_years,
            ModelError::data_consistency(
                element,
                format!("yearly step {step} of {name} is out of range")
            )
        ),
        _ => {}
    }

    Ok(())
}

/// Add an element-wide attribute value read from an attributes file
fn add_scalar_attribute(
    attributes: &mut AttributeData,
    element: &str,
    kind: ElementKind,
    attribute: &str,
    value: f64,
) -> Result<()> {
    let name = parse_attribute(element, attribute, kind)?;
    ensure!(!value.is_nan(), "Value of {attribute} for {element} is not a number");
    ensure!(
        attributes.scalars.insert(name, value).is_none(),
        "Duplicate value of {attribute} for {element}"
    );

    Ok(())
}

/// Add a location- and (optionally) time-step-specific attribute value read from a time series
/// file
fn add_series_attribute(
    attributes: &mut AttributeData,
    element: &str,
    kind: ElementKind,
    attribute: &str,
    (location, step): (&str, Option<u32>),
    value: f64,
    system: &SystemParameters,
) -> Result<()> {
    let name = parse_attribute(element, attribute, kind)?;
    check_series_step(
        element,
        name,
        step,
        system.unaggregated_time_steps_per_year,
        system.optimized_years,
    )?;
    ensure!(!value.is_nan(), "Value of {attribute} for {element} is not a number");

    let series = attributes.series.entry(name).or_default();
    ensure!(
        series.insert((Rc::from(location), step), value).is_none(),
        "Duplicate value of {attribute} for {element} at {location}"
    );

    Ok(())
}

/// Read a model from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The static model data or an error.
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let parameters = ModelParameters::from_path(model_dir)?;
    let system = &parameters.system;

    let nodes = read_nodes(model_dir)?;
    let edges = read_edges(model_dir, &nodes)?;
    let carriers = read_carriers(model_dir, &nodes, system)?;
    let technologies = read_technologies(model_dir, &carriers, &nodes, &edges, system)?;
    let existing_capacities = read_existing_capacities(model_dir, &technologies, &nodes, &edges)?;

    let dataset = model_dir
        .canonicalize()
        .ok()
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "model".into());

    Ok(Model {
        model_path: model_dir.to_path_buf(),
        dataset,
        parameters,
        nodes,
        edges,
        carriers,
        technologies,
        existing_capacities,
    })
}
