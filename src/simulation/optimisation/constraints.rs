//! The constraint registry and the nodal energy balance.
use super::{Contribution, ModelContext, ProblemBuilder, Variable, VariableName};
use crate::carrier::CarrierID;
use crate::index::{IndexTuple, index};
use crate::parameter::ParameterName;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// The name of a family of constraints
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ConstraintName {
    TechnologyMinCapacity,
    TechnologyMaxCapacity,
    TechnologyAvailability,
    TechnologyCapacityLimit,
    TechnologyLifetime,
    MaxLoad,
    MinLoadOn,
    MinLoad,
    Capex,
    CapexSegmentSelection,
    CapexSegmentLower,
    CapexSegmentUpper,
    CapexSegmentBuilt,
    CapexYearly,
    Opex,
    CarbonEmissionsTechnology,
    LinearConversionEfficiency,
    ZeroEfficiencyInput,
    ConversionSegmentSelection,
    ConversionSegmentLower,
    ConversionSegmentUpper,
    ConversionSegmentInput,
    ConversionSegmentOutput,
    TransportLoss,
    BidirectionalCapacity,
    StorageLevel,
    StorageLevelMax,
    AvailabilityImportYearly,
    AvailabilityExportYearly,
    CostCarrier,
    CarbonEmissionsCarrier,
    NodalEnergyBalance,
    CapexTotal,
    OpexTotal,
    CostCarrierTotal,
    CarbonEmissionsTotal,
    CarbonEmissionsCumulative,
    CarbonEmissionsLimit,
    CarbonEmissionsBudget,
}

/// A single row of the problem
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintRow {
    /// The index of the row within its family
    pub index: IndexTuple,
    /// The position of the row in the problem
    pub row: usize,
    /// The lower bound of the row
    pub lower: f64,
    /// The upper bound of the row
    pub upper: f64,
}

/// The rows of the problem, grouped by constraint family in the order they were added
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConstraintRegistry {
    families: IndexMap<ConstraintName, Vec<ConstraintRow>>,
    num_rows: usize,
}

impl ConstraintRegistry {
    /// Record a newly added row
    pub(super) fn push(&mut self, name: ConstraintName, index: IndexTuple, lower: f64, upper: f64) {
        self.families.entry(name).or_default().push(ConstraintRow {
            index,
            row: self.num_rows,
            lower,
            upper,
        });
        self.num_rows += 1;
    }

    /// The rows of a constraint family
    pub fn rows(&self, name: ConstraintName) -> &[ConstraintRow] {
        self.families
            .get(&name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The constraint families with at least one row
    pub fn names(&self) -> impl Iterator<Item = ConstraintName> + '_ {
        self.families.keys().copied()
    }

    /// The total number of rows
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }
}

/// Balances every carrier at every node in every operational time step
pub struct MassBalance;

impl Contribution for MassBalance {
    fn name(&self) -> &'static str {
        "mass balance"
    }

    fn contributes_constraints(
        &self,
        ctx: &ModelContext,
        builder: &mut ProblemBuilder,
    ) -> Result<()> {
        let sets = &ctx.sets;

        // Collect the terms of each (carrier, node, step) balance from the variable pool
        let mut terms: IndexMap<IndexTuple, Vec<_>> = IndexMap::new();
        let mut add =
            |key: IndexTuple, term: (Variable, f64)| terms.entry(key).or_default().push(term);
        let variables = builder.variables();

        for (name, sign) in [(VariableName::OutputFlow, 1.0), (VariableName::InputFlow, -1.0)] {
            // [technology, carrier, node, step]
            for (idx, var) in variables.iter(name) {
                add(IndexTuple(idx.0[1..].to_vec()), (var, sign));
            }
        }

        for (name, sign) in [
            (VariableName::CarrierFlowDischarge, 1.0),
            (VariableName::CarrierFlowCharge, -1.0),
        ] {
            // [technology, node, step]
            for (idx, var) in variables.iter(name) {
                let carrier = reference_carrier(ctx, idx)?;
                add(index![carrier, &idx.0[1], &idx.0[2]], (var, sign));
            }
        }

        for (name, inflow, outflow) in [
            (VariableName::CarrierFlow, 1.0, -1.0),
            (VariableName::CarrierLoss, -1.0, 0.0),
        ] {
            // [technology, edge, step]
            for (idx, var) in variables.iter(name) {
                let carrier = reference_carrier(ctx, idx)?;
                let edge_id = idx.0[1].to_string();
                let edge = sets
                    .edges
                    .get(edge_id.as_str())
                    .with_context(|| format!("Unknown edge {edge_id}"))?;
                add(index![carrier, &edge.node_to, &idx.0[2]], (var, inflow));
                if outflow != 0.0 {
                    add(index![carrier, &edge.node_from, &idx.0[2]], (var, outflow));
                }
            }
        }

        for (name, sign) in [
            (VariableName::ImportCarrierFlow, 1.0),
            (VariableName::ExportCarrierFlow, -1.0),
            (VariableName::ShedDemandCarrier, 1.0),
        ] {
            // [carrier, node, step]
            for (idx, var) in variables.iter(name) {
                add(idx.clone(), (var, sign));
            }
        }

        for carrier in &sets.carriers {
            for node in &sets.nodes {
                for step in sets.time_steps.iter_operation_steps() {
                    let idx = index![carrier, node, step];
                    let demand = ctx.parameter(ParameterName::Demand, &idx)?;
                    let row_terms = terms.swap_remove(&idx).unwrap_or_default();
                    builder.add_equality(
                        ConstraintName::NodalEnergyBalance,
                        idx,
                        demand,
                        row_terms,
                    );
                }
            }
        }

        Ok(())
    }
}

/// The reference carrier of the technology which is the first component of an index
fn reference_carrier<'a>(ctx: &'a ModelContext, idx: &IndexTuple) -> Result<&'a CarrierID> {
    let technology = idx.0[0].to_string();
    ctx.sets
        .reference_carrier
        .get(technology.as_str())
        .with_context(|| format!("Unknown technology {technology}"))
}
