//! The capacities and emissions carried over from one horizon step to the next.
use crate::error::ModelError;
use crate::id::IDCollection;
use crate::index::{IndexValue, index};
use crate::model::Model;
use crate::network::Location;
use crate::parameter::ParameterName;
use crate::simulation::StepConfig;
use crate::simulation::optimisation::{Solution, VariableName};
use crate::technology::TechnologyID;
use crate::time_step::YearlyStep;
use anyhow::{Result, bail};
use log::debug;

/// Capacity installed before the first year of a horizon step
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityEntry {
    /// The technology
    pub technology: TechnologyID,
    /// Where the capacity is installed
    pub location: Location,
    /// The installed capacity
    pub capacity: f64,
    /// The number of years the capacity remains available from the first year of the step
    pub remaining_lifetime: f64,
    /// The capex paid for the capacity
    pub capex: f64,
}

impl CapacityEntry {
    /// Whether the capacity is still available in `year`
    fn is_alive(&self, year: YearlyStep, first_year: YearlyStep, interval: u32) -> bool {
        year >= first_year && f64::from((year - first_year) * interval) < self.remaining_lifetime
    }

    fn matches(&self, technology: &TechnologyID, location: &Location) -> bool {
        self.technology == *technology && self.location == *location
    }
}

/// An immutable snapshot of the state passed between horizon steps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Baseline {
    /// Every capacity installed so far, including capacity whose lifetime has run out
    pub entries: Vec<CapacityEntry>,
    /// Carbon emissions of all previous years
    pub cumulative_emissions: f64,
}

impl Baseline {
    /// The baseline before the first horizon step, from the model's existing capacities
    pub fn initial(model: &Model) -> Result<Self> {
        let double_capex = model.system().double_capex_transport;
        let mut entries = Vec::with_capacity(model.existing_capacities.len());
        for existing in &model.existing_capacities {
            let Some(technology) = model.technologies.get(&existing.technology) else {
                bail!(ModelError::configuration(
                    &existing.technology,
                    "existing capacity refers to an unknown technology"
                ));
            };
            let edge = match &existing.location {
                Location::Edge(edge) => model.edges.get(edge),
                Location::Node(_) => None,
            };
            let capex =
                technology.capex_of(existing.capacity, &existing.location, edge, double_capex)?;

            entries.push(CapacityEntry {
                technology: existing.technology.clone(),
                location: existing.location.clone(),
                capacity: existing.capacity,
                remaining_lifetime: existing.remaining_lifetime,
                capex,
            });
        }

        Ok(Self {
            entries,
            cumulative_emissions: model.system().previous_carbon_emissions,
        })
    }

    /// The existing capacity of a technology at a location which is still available in `year`
    pub fn existing_capacity(
        &self,
        technology: &TechnologyID,
        location: &Location,
        year: YearlyStep,
        first_year: YearlyStep,
        interval: u32,
    ) -> f64 {
        self.entries
            .iter()
            .filter(|entry| entry.matches(technology, location))
            .filter(|entry| entry.is_alive(year, first_year, interval))
            .map(|entry| entry.capacity)
            .sum()
    }

    /// The capex of existing capacity which is still available in `year`
    pub fn existing_capex(
        &self,
        technology: &TechnologyID,
        location: &Location,
        year: YearlyStep,
        first_year: YearlyStep,
        interval: u32,
    ) -> f64 {
        self.entries
            .iter()
            .filter(|entry| entry.matches(technology, location))
            .filter(|entry| entry.is_alive(year, first_year, interval))
            .map(|entry| entry.capex)
            .sum()
    }

    /// The total capacity ever installed
    pub fn total_capacity(&self) -> f64 {
        self.entries.iter().map(|entry| entry.capacity).sum()
    }

    /// Commit the decisions of the first year of a solved horizon step.
    ///
    /// The capacity built in the first year becomes existing capacity and the emissions of the
    /// first year are added to the cumulative emissions.
    pub fn advance(&self, model: &Model, config: &StepConfig, solution: &Solution) -> Result<Self> {
        let interval = model.system().interval_between_years;
        let first_year = config.time_steps.first_year();

        let mut entries: Vec<_> = self
            .entries
            .iter()
            .cloned()
            .map(|entry| CapacityEntry {
                remaining_lifetime: entry.remaining_lifetime - f64::from(interval),
                ..entry
            })
            .collect();

        for (idx, built) in solution.iter_values(VariableName::BuiltCapacity) {
            // [technology, location, year]
            if idx.0[2] != IndexValue::Step(first_year) {
                continue;
            }
            let built = built.unwrap_or(0.0);
            if built <= 0.0 {
                continue;
            }

            let technology_id = model.technologies.get_id_by_str(&idx.0[0].to_string())?;
            let technology = &model.technologies[&technology_id];
            let location_id = idx.0[1].to_string();
            let location = match model.edges.get_id_by_str(&location_id) {
                Ok(edge) => Location::Edge(edge),
                Err(_) => Location::Node(model.nodes.get_id_by_str(&location_id)?),
            };
            let lifetime = technology.scalar_attribute(ParameterName::Lifetime)?;
            let capex = solution.value(VariableName::Capex, idx).unwrap_or(0.0);
            debug!("Committing {built} of {technology_id} built at {location}");

            entries.push(CapacityEntry {
                technology: technology_id,
                location,
                capacity: built,
                remaining_lifetime: lifetime - f64::from(interval),
                capex,
            });
        }

        let emissions = solution
            .value(VariableName::CarbonEmissionsTotal, &index![first_year])
            .unwrap_or(0.0);

        Ok(Self {
            entries,
            cumulative_emissions: self.cumulative_emissions + f64::from(interval) * emissions,
        })
    }
}
