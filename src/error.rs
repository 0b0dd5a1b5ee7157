//! Error types for model construction and solving.
//!
//! These are raised as [`anyhow::Error`]s (e.g. with `bail!`) so they can be given extra context
//! on the way up. Callers who need to distinguish them can use [`anyhow::Error::downcast_ref`].
use crate::simulation::optimisation::SolveStatus;
use thiserror::Error;

/// An error which prevents a model from being constructed or solved
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// An unknown entity is referenced or the configuration is malformed
    #[error("Configuration error for {entity}: {message}")]
    Configuration {
        /// The offending entity (e.g. technology or carrier ID)
        entity: String,
        /// What is wrong
        message: String,
    },

    /// A technology is missing an attribute which has no default value
    #[error("Technology {technology} is missing required attribute `{attribute}`")]
    MissingAttribute {
        /// The technology ID
        technology: String,
        /// The name of the missing attribute
        attribute: String,
    },

    /// Input data does not agree with itself or with the declared sets
    #[error("Inconsistent data for {entity}: {message}")]
    DataConsistency {
        /// The offending entity
        entity: String,
        /// What is wrong
        message: String,
    },

    /// The solver did not return an optimal solution
    #[error(
        "Could not solve model for dataset {dataset}, scenario \"{scenario}\", horizon step \
        {step}: {status}"
    )]
    SolveFailure {
        /// The name of the dataset (model directory)
        dataset: String,
        /// The scenario being solved ("" for the base scenario)
        scenario: String,
        /// The rolling-horizon step
        step: u32,
        /// The status reported by the solver
        status: SolveStatus,
    },
}

impl ModelError {
    /// Create a new [`ModelError::Configuration`]
    pub fn configuration(entity: impl ToString, message: impl ToString) -> Self {
        Self::Configuration {
            entity: entity.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a new [`ModelError::DataConsistency`]
    pub fn data_consistency(entity: impl ToString, message: impl ToString) -> Self {
        Self::DataConsistency {
            entity: entity.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a new [`ModelError::MissingAttribute`]
    pub fn missing_attribute(technology: impl ToString, attribute: impl ToString) -> Self {
        Self::MissingAttribute {
            technology: technology.to_string(),
            attribute: attribute.to_string(),
        }
    }
}
