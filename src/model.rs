//! The model represents the static input data provided by the user.
use crate::carrier::CarrierMap;
use crate::network::{EdgeMap, Location, NodeSet};
use crate::technology::{TechnologyID, TechnologyMap};
use std::path::PathBuf;

pub mod parameters;
pub use parameters::{
    AnalysisParameters, ModelParameters, Objective, SolverMode, SolverParameters,
    SystemParameters,
};

/// Model definition
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// The name of the dataset, taken from the model folder
    pub dataset: String,
    /// Parameters from the system file
    pub parameters: ModelParameters,
    /// The nodes of the network
    pub nodes: NodeSet,
    /// The edges of the network
    pub edges: EdgeMap,
    /// Energy carriers
    pub carriers: CarrierMap,
    /// Technologies of all categories
    pub technologies: TechnologyMap,
    /// Capacity installed before the first year
    pub existing_capacities: Vec<ExistingCapacity>,
}

/// Capacity of a technology installed before the first modelled year
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingCapacity {
    /// The technology
    pub technology: TechnologyID,
    /// Where the capacity is installed
    pub location: Location,
    /// The installed capacity
    pub capacity: f64,
    /// The number of years the capacity remains available from the first year
    pub remaining_lifetime: f64,
}

impl Model {
    /// The `[system]` parameters
    pub fn system(&self) -> &SystemParameters {
        &self.parameters.system
    }

    /// The yearly time steps to optimise
    pub fn years(&self) -> std::ops::Range<u32> {
        0..self.parameters.system.optimized_years
    }
}
