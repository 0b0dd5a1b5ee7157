//! The shared pool of decision variables.
use crate::index::{Dimension, IndexTuple};
use anyhow::{Result, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumMessage, EnumString};

/// A decision variable in the optimisation
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
#[derive(Clone, Copy, Debug)]
pub struct Variable {
    column: highs::Col,
    position: usize,
}

impl Variable {
    /// The underlying HiGHS column
    pub fn column(self) -> highs::Col {
        self.column
    }

    /// The position of the column in the problem (and hence in the solution)
    pub fn position(self) -> usize {
        self.position
    }
}

/// The name of a family of decision variables
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    EnumMessage,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum VariableName {
    #[strum(message = "Whether technology is installed at location in year")]
    InstallTechnology,
    #[strum(message = "Capacity of technology built at location in year")]
    BuiltCapacity,
    #[strum(message = "Total capacity of technology at location in year")]
    Capacity,
    #[strum(message = "Capex of capacity built at location in year")]
    Capex,
    #[strum(message = "Annualised capex of technology at location in year")]
    CapexYearly,
    #[strum(message = "Variable operating cost of technology at location")]
    CostOpex,
    #[strum(message = "Carbon emissions of operating technology at location")]
    CarbonEmissionsTechnology,
    #[strum(message = "Whether technology is operating at location")]
    TechOnVar,
    #[strum(message = "Whether capex segment is selected")]
    CapexSegmentSelect,
    #[strum(message = "Built capacity within capex segment")]
    CapexSegmentAux,
    #[strum(message = "Input flow of carrier into conversion technology")]
    InputFlow,
    #[strum(message = "Output flow of carrier from conversion technology")]
    OutputFlow,
    #[strum(message = "Whether conversion segment is selected")]
    ConversionSegmentSelect,
    #[strum(message = "Input flow within conversion segment")]
    ConversionSegmentAux,
    #[strum(message = "Flow of carrier on edge")]
    CarrierFlow,
    #[strum(message = "Loss of carrier flow on edge")]
    CarrierLoss,
    #[strum(message = "Flow of carrier into storage")]
    CarrierFlowCharge,
    #[strum(message = "Flow of carrier out of storage")]
    CarrierFlowDischarge,
    #[strum(message = "Energy stored at the end of time step")]
    StorageLevel,
    #[strum(message = "Import of carrier at node")]
    ImportCarrierFlow,
    #[strum(message = "Export of carrier at node")]
    ExportCarrierFlow,
    #[strum(message = "Shed demand of carrier at node")]
    ShedDemandCarrier,
    #[strum(message = "Cost of importing, exporting and shedding carrier at node")]
    CostCarrier,
    #[strum(message = "Carbon emissions of importing and exporting carrier at node")]
    CarbonEmissionsCarrier,
    #[strum(message = "Total annualised capex in year")]
    CapexTotal,
    #[strum(message = "Total operating cost in year")]
    OpexTotal,
    #[strum(message = "Total carrier cost in year")]
    CostCarrierTotal,
    #[strum(message = "Total carbon emissions in year")]
    CarbonEmissionsTotal,
    #[strum(message = "Cumulative carbon emissions up to the end of year")]
    CarbonEmissionsCumulative,
}

impl VariableName {
    /// A human-readable description of the variable
    pub fn description(self) -> &'static str {
        self.get_message().unwrap_or_default()
    }

    /// The index sets of this variable family
    pub fn dimensions(self) -> &'static [Dimension] {
        use Dimension as D;

        match self {
            Self::InstallTechnology
            | Self::BuiltCapacity
            | Self::Capacity
            | Self::Capex
            | Self::CapexYearly => &[D::SetTechnologies, D::SetLocation, D::SetTimeStepsYearly],
            Self::CostOpex | Self::CarbonEmissionsTechnology | Self::TechOnVar => &[
                D::SetTechnologies,
                D::SetLocation,
                D::SetTimeStepsOperation,
            ],
            Self::CapexSegmentSelect | Self::CapexSegmentAux => &[
                D::SetTechnologies,
                D::SetLocation,
                D::SetTimeStepsYearly,
                D::SetSegments,
            ],
            Self::InputFlow => &[
                D::SetTechnologies,
                D::SetInputCarriers,
                D::SetNodes,
                D::SetTimeStepsOperation,
            ],
            Self::OutputFlow => &[
                D::SetTechnologies,
                D::SetOutputCarriers,
                D::SetNodes,
                D::SetTimeStepsOperation,
            ],
            Self::ConversionSegmentSelect | Self::ConversionSegmentAux => &[
                D::SetTechnologies,
                D::SetNodes,
                D::SetTimeStepsOperation,
                D::SetSegments,
            ],
            Self::CarrierFlow | Self::CarrierLoss => {
                &[D::SetTechnologies, D::SetEdges, D::SetTimeStepsOperation]
            }
            Self::CarrierFlowCharge | Self::CarrierFlowDischarge | Self::StorageLevel => {
                &[D::SetTechnologies, D::SetNodes, D::SetTimeStepsOperation]
            }
            Self::ImportCarrierFlow
            | Self::ExportCarrierFlow
            | Self::ShedDemandCarrier
            | Self::CostCarrier
            | Self::CarbonEmissionsCarrier => {
                &[D::SetCarriers, D::SetNodes, D::SetTimeStepsOperation]
            }
            Self::CapexTotal
            | Self::OpexTotal
            | Self::CostCarrierTotal
            | Self::CarbonEmissionsTotal
            | Self::CarbonEmissionsCumulative => &[D::SetTimeStepsYearly],
        }
    }
}

/// A map for easy lookup of variables in the problem.
///
/// The entries are ordered (see [`IndexMap`]). We use this data structure for two things:
///
/// 1. In order to define constraints for the optimisation
/// 2. To keep track of the combination of parameters that each variable corresponds to, for when we
///    are reading the results of the optimisation.
#[derive(Debug, Default)]
pub struct VariablePool {
    tables: IndexMap<VariableName, IndexMap<IndexTuple, Variable>>,
    costs: Vec<f64>,
}

impl VariablePool {
    /// Record a newly added column
    pub(super) fn insert(
        &mut self,
        name: VariableName,
        index: IndexTuple,
        column: highs::Col,
        cost: f64,
    ) -> Result<Variable> {
        let dimensions = name.dimensions();
        if index.len() != dimensions.len() {
            bail!(
                "Variable {name} is indexed by {} sets but index {index} was given",
                dimensions.len()
            );
        }

        let variable = Variable {
            column,
            position: self.costs.len(),
        };
        let table = self.tables.entry(name).or_default();
        if table.insert(index.clone(), variable).is_some() {
            bail!("Duplicate entry for variable {name} at {index}");
        }
        self.costs.push(cost);

        Ok(variable)
    }

    /// Get the variable with the given name and index, if it exists
    pub fn get(&self, name: VariableName, index: &IndexTuple) -> Option<Variable> {
        self.tables.get(&name)?.get(index).copied()
    }

    /// Iterate over the variables of one family, in the order they were added
    pub fn iter(&self, name: VariableName) -> impl Iterator<Item = (&IndexTuple, Variable)> {
        self.tables
            .get(&name)
            .into_iter()
            .flat_map(|table| table.iter().map(|(index, var)| (index, *var)))
    }

    /// The variable families in the pool, in the order they were first added
    pub fn names(&self) -> impl Iterator<Item = VariableName> + '_ {
        self.tables.keys().copied()
    }

    /// The number of variables in the pool
    pub fn len(&self) -> usize {
        self.costs.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    /// The objective coefficient of each column, in order
    pub fn costs(&self) -> &[f64] {
        &self.costs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_all_variables_described() {
        for name in VariableName::iter() {
            assert!(!name.description().is_empty(), "{name} has no description");
        }
    }

    #[test]
    fn test_variable_name_display() {
        assert_eq!(VariableName::ImportCarrierFlow.to_string(), "import_carrier_flow");
        assert_eq!(
            "carbon_emissions_cumulative".parse::<VariableName>().unwrap(),
            VariableName::CarbonEmissionsCumulative
        );
    }
}
