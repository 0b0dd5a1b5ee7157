//! The index set registry.
//!
//! The registry holds every enumerated set of the model for a horizon step, together with the
//! sets derived from them (technology carriers, locations and the time-step mapping).
use crate::carrier::CarrierID;
use crate::error::ModelError;
use crate::index::{Dimension, IndexValue};
use crate::model::Model;
use crate::network::{EdgeID, EdgeMap, Location, NodeSet, reverse_edge};
use crate::scenario::ScenarioID;
use crate::technology::{TechnologyCategory, TechnologyID};
use crate::time_step::TimeStepMapper;
use anyhow::{Result, bail, ensure};
use indexmap::{IndexMap, IndexSet};

/// The enumerated and derived index sets of a horizon step
#[derive(Debug, Clone, PartialEq)]
pub struct SetRegistry {
    /// All carriers
    pub carriers: IndexSet<CarrierID>,
    /// The nodes of the network
    pub nodes: NodeSet,
    /// The edges of the network
    pub edges: EdgeMap,
    /// All technologies, with their category
    pub technologies: IndexMap<TechnologyID, TechnologyCategory>,
    /// Transport technologies with equal built capacity in both directions
    pub bidirectional: IndexSet<TechnologyID>,
    /// The reverse of each edge, where there is one
    pub reverse_edges: IndexMap<EdgeID, EdgeID>,
    /// The mapping between time-step granularities
    pub time_steps: TimeStepMapper,
    /// The reference carrier of each technology
    pub reference_carrier: IndexMap<TechnologyID, CarrierID>,
    /// The input carriers of each technology
    pub input_carriers: IndexMap<TechnologyID, IndexSet<CarrierID>>,
    /// The output carriers of each technology
    pub output_carriers: IndexMap<TechnologyID, IndexSet<CarrierID>>,
    /// The locations each technology can be placed at
    pub locations: IndexMap<TechnologyID, Vec<Location>>,
    /// The number of capex segments of technologies with piecewise-affine capex
    pub capex_segments: IndexMap<TechnologyID, usize>,
    /// The number of conversion segments of technologies with piecewise-affine conversion
    pub conversion_segments: IndexMap<TechnologyID, usize>,
    /// The scenarios of the model, the base scenario first
    pub scenarios: IndexSet<ScenarioID>,
}

impl SetRegistry {
    /// Derive the sets of a model for the given time-step mapping.
    ///
    /// Raises a [`ModelError::Configuration`] if a technology refers to an unknown carrier, if a
    /// conversion technology's reference carrier is not one of its carriers or if an edge of a
    /// bidirectional transport technology has no reverse.
    pub fn new(model: &Model, time_steps: &TimeStepMapper) -> Result<Self> {
        let carriers: IndexSet<CarrierID> = model.carriers.keys().cloned().collect();
        let mut technologies = IndexMap::new();
        let mut reference_carrier = IndexMap::new();
        let mut input_carriers = IndexMap::new();
        let mut output_carriers = IndexMap::new();
        let mut locations = IndexMap::new();

        for (id, technology) in &model.technologies {
            ensure!(
                carriers.contains(&technology.reference_carrier),
                ModelError::configuration(
                    id,
                    format!("unknown reference carrier {}", technology.reference_carrier)
                )
            );

            let (inputs, outputs): (IndexSet<_>, IndexSet<_>) = match technology.category {
                TechnologyCategory::Conversion => (
                    technology
                        .conversion_efficiencies
                        .keys()
                        .map(|(input, _)| input.clone())
                        .collect(),
                    technology
                        .conversion_efficiencies
                        .keys()
                        .map(|(_, output)| output.clone())
                        .collect(),
                ),
                _ => (
                    [technology.reference_carrier.clone()].into(),
                    [technology.reference_carrier.clone()].into(),
                ),
            };

            if let Some(unknown) = inputs.iter().chain(&outputs).find(|c| !carriers.contains(*c)) {
                bail!(ModelError::configuration(id, format!("unknown carrier {unknown}")));
            }
            ensure!(
                inputs.contains(&technology.reference_carrier)
                    || outputs.contains(&technology.reference_carrier),
                ModelError::configuration(
                    id,
                    format!(
                        "reference carrier {} is not an input or output carrier",
                        technology.reference_carrier
                    )
                )
            );

            let technology_locations = match technology.category {
                TechnologyCategory::Transport => {
                    model.edges.keys().cloned().map(Location::Edge).collect()
                }
                _ => model.nodes.iter().cloned().map(Location::Node).collect(),
            };

            technologies.insert(id.clone(), technology.category);
            reference_carrier.insert(id.clone(), technology.reference_carrier.clone());
            input_carriers.insert(id.clone(), inputs);
            output_carriers.insert(id.clone(), outputs);
            locations.insert(id.clone(), technology_locations);
        }

        let reverse_edges: IndexMap<EdgeID, EdgeID> = model
            .edges
            .values()
            .filter_map(|edge| Some((edge.id.clone(), reverse_edge(&model.edges, edge)?.clone())))
            .collect();

        // Listed IDs are checked when reading, so only unselected technologies are left out here
        let bidirectional: IndexSet<TechnologyID> = model
            .system()
            .set_bidirectional_transport_technologies
            .iter()
            .filter(|id| technologies.contains_key(*id))
            .cloned()
            .collect();
        for id in &bidirectional {
            ensure!(
                technologies[id] == TechnologyCategory::Transport,
                ModelError::configuration(id, "only transport technologies can be bidirectional")
            );
            if let Some(edge) = model.edges.keys().find(|edge| !reverse_edges.contains_key(*edge)) {
                bail!(ModelError::configuration(
                    id,
                    format!("edge {edge} has no reverse edge")
                ));
            }
        }

        let scenarios = std::iter::once(ScenarioID::base())
            .chain(model.parameters.scenarios.keys().cloned())
            .collect();

        Ok(Self {
            carriers,
            nodes: model.nodes.clone(),
            edges: model.edges.clone(),
            technologies,
            bidirectional,
            reverse_edges,
            time_steps: time_steps.clone(),
            reference_carrier,
            input_carriers,
            output_carriers,
            locations,
            capex_segments: IndexMap::new(),
            conversion_segments: IndexMap::new(),
            scenarios,
        })
    }

    /// Iterate over the technologies of one category
    pub fn technologies_of(
        &self,
        category: TechnologyCategory,
    ) -> impl Iterator<Item = &TechnologyID> {
        self.technologies
            .iter()
            .filter(move |(_, c)| **c == category)
            .map(|(id, _)| id)
    }

    /// The locations of a technology
    pub fn locations_of(&self, technology: &TechnologyID) -> &[Location] {
        self.locations
            .get(technology)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether a value is a member of a set
    pub fn contains(&self, dimension: Dimension, value: &IndexValue) -> bool {
        match (dimension, value) {
            (Dimension::SetCarriers, IndexValue::Label(label)) => {
                self.carriers.contains(label.as_ref())
            }
            (Dimension::SetInputCarriers, IndexValue::Label(label)) => self
                .input_carriers
                .values()
                .any(|carriers| carriers.contains(label.as_ref())),
            (Dimension::SetOutputCarriers, IndexValue::Label(label)) => self
                .output_carriers
                .values()
                .any(|carriers| carriers.contains(label.as_ref())),
            (Dimension::SetTechnologies, IndexValue::Label(label)) => {
                self.technologies.contains_key(label.as_ref())
            }
            (Dimension::SetNodes, IndexValue::Label(label)) => self.nodes.contains(label.as_ref()),
            (Dimension::SetEdges, IndexValue::Label(label)) => {
                self.edges.contains_key(label.as_ref())
            }
            (Dimension::SetLocation, IndexValue::Label(label)) => {
                self.nodes.contains(label.as_ref()) || self.edges.contains_key(label.as_ref())
            }
            (Dimension::SetTimeStepsOperation, IndexValue::Step(step)) => {
                self.time_steps.contains_operation_step(*step)
            }
            (Dimension::SetTimeStepsYearly, IndexValue::Step(year)) => {
                self.time_steps.contains_year(*year)
            }
            (Dimension::SetSegments, IndexValue::Step(_)) => true,
            _ => false,
        }
    }
}
