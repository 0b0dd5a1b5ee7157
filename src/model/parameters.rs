//! Defines the `ModelParameters` struct, which represents the contents of `system.toml`.
use crate::error::ModelError;
use crate::input::{input_err_msg, read_toml};
use crate::scenario::{ScenarioDefinition, ScenarioID};
use crate::technology::TechnologyID;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "system.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_optimized_years, u32, 1);
define_param_default!(default_interval_between_years, u32, 1);
define_param_default!(default_unaggregated_time_steps, u32, 1);
define_param_default!(default_total_hours_per_year, f64, 8760.0);
define_param_default!(default_years_in_rolling_horizon, u32, 1);
define_param_default!(default_double_capex_transport, bool, true);
define_param_default!(default_mip_gap, f64, 1e-4);

/// Represents the contents of the entire system file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// The structure of the energy system
    pub system: SystemParameters,
    /// What to optimise for
    #[serde(default)]
    pub analysis: AnalysisParameters,
    /// Options passed on to the solver
    #[serde(default)]
    pub solver: SolverParameters,
    /// Named scenarios, applied on top of the base configuration
    #[serde(default)]
    pub scenarios: IndexMap<ScenarioID, ScenarioDefinition>,
}

/// The `[system]` section of the system file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemParameters {
    /// The calendar year of the first yearly time step
    pub reference_year: u32,
    /// The number of yearly time steps to optimise
    #[serde(default = "default_optimized_years")]
    pub optimized_years: u32,
    /// The number of calendar years each yearly time step stands for
    #[serde(default = "default_interval_between_years")]
    pub interval_between_years: u32,
    /// The number of full-resolution time steps in a year
    #[serde(default = "default_unaggregated_time_steps")]
    pub unaggregated_time_steps_per_year: u32,
    /// The number of operational time steps to aggregate a year into. No aggregation if absent.
    #[serde(default)]
    pub aggregated_time_steps_per_year: Option<u32>,
    /// The number of hours in a year, used to scale annual costs to the modelled time steps
    #[serde(default = "default_total_hours_per_year")]
    pub total_hours_per_year: f64,
    /// Whether to solve the years in a sequence of overlapping windows
    #[serde(default)]
    pub use_rolling_horizon: bool,
    /// The number of yearly time steps in each rolling-horizon window
    #[serde(default = "default_years_in_rolling_horizon")]
    pub years_in_rolling_horizon: u32,
    /// Whether transport capex has a distance-dependent fixed part on top of the capacity part
    #[serde(default = "default_double_capex_transport")]
    pub double_capex_transport: bool,
    /// Conversion technologies to include. All conversion technologies if absent.
    #[serde(default)]
    pub set_conversion_technologies: Option<Vec<TechnologyID>>,
    /// Transport technologies to include. All transport technologies if absent.
    #[serde(default)]
    pub set_transport_technologies: Option<Vec<TechnologyID>>,
    /// Storage technologies to include. All storage technologies if absent.
    #[serde(default)]
    pub set_storage_technologies: Option<Vec<TechnologyID>>,
    /// Transport technologies whose built capacity is equal in both directions of an edge
    #[serde(default)]
    pub set_bidirectional_transport_technologies: Vec<TechnologyID>,
    /// Maximum carbon emissions per year. Unlimited if absent.
    #[serde(default)]
    pub carbon_emissions_limit: Option<f64>,
    /// Maximum cumulative carbon emissions. Unlimited if absent.
    #[serde(default)]
    pub carbon_emissions_budget: Option<f64>,
    /// Carbon emissions already emitted before the first year
    #[serde(default)]
    pub previous_carbon_emissions: f64,
}

impl SystemParameters {
    /// The number of operational time steps per year after aggregation
    pub fn operation_steps_per_year(&self) -> u32 {
        self.aggregated_time_steps_per_year
            .unwrap_or(self.unaggregated_time_steps_per_year)
    }

    /// The share of a year covered by the modelled time steps
    pub fn fraction_of_year(&self) -> f64 {
        self.unaggregated_time_steps_per_year as f64 / self.total_hours_per_year
    }
}

/// The `[analysis]` section of the system file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParameters {
    /// The objective function
    #[serde(default)]
    pub objective: Objective,
}

/// The objective function to minimise
#[derive(
    SerializeLabeledStringEnum,
    DeserializeLabeledStringEnum,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Default,
)]
pub enum Objective {
    /// Annualised capex plus opex plus carrier costs
    #[default]
    #[string = "total_cost"]
    TotalCost,
    /// Total carbon emissions
    #[string = "total_carbon_emissions"]
    TotalCarbonEmissions,
    /// Risk across scenarios (not supported)
    #[string = "risk"]
    Risk,
}

/// The `[solver]` section of the system file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverParameters {
    /// Relative MIP gap at which to stop
    #[serde(default = "default_mip_gap")]
    pub mip_gap: f64,
    /// Time limit for each solve, in seconds
    #[serde(default)]
    pub time_limit: Option<f64>,
    /// Whether to solve the full MILP or its LP relaxation
    #[serde(default)]
    pub mode: SolverMode,
    /// Show the solver's own log
    #[serde(default)]
    pub verbose: bool,
}

impl Default for SolverParameters {
    fn default() -> Self {
        Self {
            mip_gap: default_mip_gap(),
            time_limit: None,
            mode: SolverMode::default(),
            verbose: false,
        }
    }
}

/// The kind of problem to solve
#[derive(
    SerializeLabeledStringEnum,
    DeserializeLabeledStringEnum,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Default,
)]
pub enum SolverMode {
    /// Binary variables are integral
    #[default]
    #[string = "milp"]
    Milp,
    /// Binary variables are relaxed to [0, 1]
    #[string = "lp"]
    Lp,
}

/// Check that the time-step parameters are valid
fn check_time_steps(system: &SystemParameters) -> Result<()> {
    ensure!(
        system.unaggregated_time_steps_per_year > 0,
        ModelError::configuration(
            "unaggregated_time_steps_per_year",
            "there must be at least one time step per year"
        )
    );
    ensure!(
        system.aggregated_time_steps_per_year != Some(0),
        ModelError::configuration(
            "aggregated_time_steps_per_year",
            "the number of operational time steps cannot be zero"
        )
    );
    ensure!(
        system.total_hours_per_year.is_finite() && system.total_hours_per_year > 0.0,
        "total_hours_per_year must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that the yearly and rolling-horizon parameters are valid
fn check_years(system: &SystemParameters) -> Result<()> {
    ensure!(system.optimized_years > 0, "optimized_years cannot be zero");
    ensure!(
        system.interval_between_years > 0,
        "interval_between_years cannot be zero"
    );
    ensure!(
        system.years_in_rolling_horizon > 0,
        "years_in_rolling_horizon cannot be zero"
    );

    Ok(())
}

/// Check that an optional limit is not negative
fn check_limit(name: &str, value: Option<f64>) -> Result<()> {
    if let Some(value) = value {
        ensure!(value >= 0.0, "{name} cannot be negative");
    }

    Ok(())
}

/// Check that the solver parameters are valid
fn check_solver(solver: &SolverParameters) -> Result<()> {
    ensure!(
        solver.mip_gap.is_finite() && solver.mip_gap >= 0.0,
        "mip_gap must be a finite number not less than zero"
    );
    if let Some(time_limit) = solver.time_limit {
        ensure!(time_limit > 0.0, "time_limit must be greater than zero");
    }

    Ok(())
}

impl ModelParameters {
    /// Read a system file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_time_steps(&self.system)?;
        check_years(&self.system)?;
        check_limit("carbon_emissions_limit", self.system.carbon_emissions_limit)?;
        check_limit("carbon_emissions_budget", self.system.carbon_emissions_budget)?;
        check_solver(&self.solver)?;

        ensure!(
            self.analysis.objective != Objective::Risk,
            ModelError::configuration("objective", "the risk objective is not supported")
        );

        if !self.system.use_rolling_horizon && self.system.years_in_rolling_horizon > 1 {
            warn!("years_in_rolling_horizon is ignored because use_rolling_horizon is false");
        }

        ensure!(
            !self.scenarios.contains_key(""),
            ModelError::configuration("scenarios", "a named scenario cannot have an empty name")
        );

        Ok(())
    }
}
