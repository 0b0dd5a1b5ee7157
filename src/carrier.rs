//! Energy carriers and the constraints on importing, exporting and shedding them.
use crate::id::define_id_type;
use crate::index::{impl_index_value_from_id, index};
use crate::parameter::{AttributeData, ParameterName};
use crate::simulation::optimisation::constraints::ConstraintName;
use crate::simulation::optimisation::{Contribution, ModelContext, ProblemBuilder, VariableName};
use anyhow::{Context, Result};
use indexmap::IndexMap;

define_id_type! {CarrierID}
impl_index_value_from_id!(CarrierID);

/// Carriers, indexed by ID
pub type CarrierMap = IndexMap<CarrierID, Carrier>;

/// An energy or material commodity which is balanced at each node
#[derive(Debug, Clone, PartialEq)]
pub struct Carrier {
    /// Unique identifier for the carrier (e.g. "electricity")
    pub id: CarrierID,
    /// Text description of the carrier
    pub description: String,
    /// Demand, availability, prices and carbon intensity
    pub attributes: AttributeData,
}

impl Carrier {
    /// Get the value of an attribute at a node, falling back to its default
    pub fn attribute(&self, name: ParameterName, node: &str, step: Option<u32>) -> Result<f64> {
        self.attributes
            .get(name, node, step)
            .or_else(|| name.default_value())
            .with_context(|| format!("Carrier {} has no value for {name}", self.id))
    }
}

/// Import, export and demand shedding of all carriers
pub struct Carriers;

/// The attributes aggregated into operational time steps
const OPERATION_ATTRIBUTES: [ParameterName; 5] = [
    ParameterName::Demand,
    ParameterName::AvailabilityImport,
    ParameterName::AvailabilityExport,
    ParameterName::ImportPrice,
    ParameterName::ExportPrice,
];

impl Contribution for Carriers {
    fn name(&self) -> &'static str {
        "carriers"
    }

    fn contributes_parameters(&self, ctx: &mut ModelContext) -> Result<()> {
        let model = ctx.model();
        let time_steps = ctx.time_steps().clone();
        let nodes = ctx.sets.nodes.clone();

        for carrier in model.carriers.values() {
            for node in &nodes {
                for name in OPERATION_ATTRIBUTES {
                    for step in time_steps.iter_operation_steps() {
                        let value = time_steps.aggregate_mean(step, |full_step| {
                            carrier.attribute(name, &node.0, Some(full_step))
                        })?;
                        ctx.add_parameter(name, index![&carrier.id, node, step], value)?;
                    }
                }

                for name in [
                    ParameterName::AvailabilityImportYearly,
                    ParameterName::AvailabilityExportYearly,
                ] {
                    for year in time_steps.years() {
                        let value = carrier.attribute(name, &node.0, Some(*year))?;
                        ctx.add_parameter(name, index![&carrier.id, node, *year], value)?;
                    }
                }

                for name in [
                    ParameterName::CarbonIntensityCarrier,
                    ParameterName::ShedDemandPrice,
                ] {
                    let value = carrier.attribute(name, &node.0, None)?;
                    ctx.add_parameter(name, index![&carrier.id, node], value)?;
                }
            }
        }

        Ok(())
    }

    fn contributes_variables(
        &self,
        ctx: &ModelContext,
        builder: &mut ProblemBuilder,
    ) -> Result<()> {
        for carrier in &ctx.sets.carriers {
            for node in &ctx.sets.nodes {
                let shed_price =
                    ctx.parameter(ParameterName::ShedDemandPrice, &index![carrier, node])?;
                for step in ctx.time_steps().iter_operation_steps() {
                    let idx = index![carrier, node, step];
                    let import = ctx.parameter(ParameterName::AvailabilityImport, &idx)?;
                    let export = ctx.parameter(ParameterName::AvailabilityExport, &idx)?;
                    let demand = ctx.parameter(ParameterName::Demand, &idx)?;
                    let max_shed = if shed_price.is_finite() {
                        demand.max(0.0)
                    } else {
                        0.0
                    };

                    builder.add_variable(
                        VariableName::ImportCarrierFlow,
                        idx.clone(),
                        0.0,
                        import,
                        0.0,
                    )?;
                    builder.add_variable(
                        VariableName::ExportCarrierFlow,
                        idx.clone(),
                        0.0,
                        export,
                        0.0,
                    )?;
                    builder.add_variable(
                        VariableName::ShedDemandCarrier,
                        idx.clone(),
                        0.0,
                        max_shed,
                        0.0,
                    )?;
                    for name in [VariableName::CostCarrier, VariableName::CarbonEmissionsCarrier] {
                        builder.add_variable(
                            name,
                            idx.clone(),
                            f64::NEG_INFINITY,
                            f64::INFINITY,
                            0.0,
                        )?;
                    }
                }
            }
        }

        Ok(())
    }

    fn contributes_constraints(
        &self,
        ctx: &ModelContext,
        builder: &mut ProblemBuilder,
    ) -> Result<()> {
        add_yearly_availability_constraints(ctx, builder)?;

        for carrier in &ctx.sets.carriers {
            for node in &ctx.sets.nodes {
                let location = index![carrier, node];
                let shed_price = ctx.parameter(ParameterName::ShedDemandPrice, &location)?;
                let intensity = ctx.parameter(ParameterName::CarbonIntensityCarrier, &location)?;

                for step in ctx.time_steps().iter_operation_steps() {
                    let idx = index![carrier, node, step];
                    let import = builder.variable(VariableName::ImportCarrierFlow, &idx)?;
                    let export = builder.variable(VariableName::ExportCarrierFlow, &idx)?;
                    let shed = builder.variable(VariableName::ShedDemandCarrier, &idx)?;
                    let cost = builder.variable(VariableName::CostCarrier, &idx)?;
                    let emissions = builder.variable(VariableName::CarbonEmissionsCarrier, &idx)?;
                    let import_price = ctx.parameter(ParameterName::ImportPrice, &idx)?;
                    let export_price = ctx.parameter(ParameterName::ExportPrice, &idx)?;

                    let mut cost_terms =
                        vec![(cost, 1.0), (import, -import_price), (export, export_price)];
                    // Shedding is fixed to zero if it has no price
                    if shed_price.is_finite() {
                        cost_terms.push((shed, -shed_price));
                    }
                    builder.add_equality(ConstraintName::CostCarrier, idx.clone(), 0.0, cost_terms);

                    builder.add_equality(
                        ConstraintName::CarbonEmissionsCarrier,
                        idx,
                        0.0,
                        [(emissions, 1.0), (import, -intensity), (export, intensity)],
                    );
                }
            }
        }

        Ok(())
    }
}

/// Limit the total import and export of each carrier at each node over a year
fn add_yearly_availability_constraints(
    ctx: &ModelContext,
    builder: &mut ProblemBuilder,
) -> Result<()> {
    let time_steps = ctx.time_steps();
    for (limit_name, flow_name, constraint_name) in [
        (
            ParameterName::AvailabilityImportYearly,
            VariableName::ImportCarrierFlow,
            ConstraintName::AvailabilityImportYearly,
        ),
        (
            ParameterName::AvailabilityExportYearly,
            VariableName::ExportCarrierFlow,
            ConstraintName::AvailabilityExportYearly,
        ),
    ] {
        for carrier in &ctx.sets.carriers {
            for node in &ctx.sets.nodes {
                for year in time_steps.years() {
                    let idx = index![carrier, node, *year];
                    let limit = ctx.parameter(limit_name, &idx)?;
                    if !limit.is_finite() {
                        continue;
                    }

                    let mut terms = Vec::new();
                    for step in time_steps.operation_steps_of_year(*year) {
                        let duration = ctx.parameter(
                            ParameterName::TimeStepsOperationDuration,
                            &index![step],
                        )?;
                        let flow = builder.variable(flow_name, &index![carrier, node, step])?;
                        terms.push((flow, duration));
                    }
                    builder.add_constraint(
                        constraint_name,
                        idx,
                        f64::NEG_INFINITY,
                        limit,
                        terms,
                    );
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{simple_model, solve_first_step};
    use crate::model::Model;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_attribute_default(simple_model: Model) {
        let carrier = &simple_model.carriers["B"];
        assert_eq!(
            carrier
                .attribute(ParameterName::AvailabilityImportYearly, "node1", Some(0))
                .unwrap(),
            f64::INFINITY
        );
        assert_eq!(
            carrier
                .attribute(ParameterName::ExportPrice, "node2", Some(0))
                .unwrap(),
            0.0
        );
    }

    #[rstest]
    fn test_yearly_import_limit(mut simple_model: Model) {
        // Only half of the required import is available, so the rest must be shed
        let carrier = simple_model.carriers.get_mut("A").unwrap();
        carrier
            .attributes
            .overwrite(ParameterName::AvailabilityImportYearly, 10.0);
        carrier
            .attributes
            .overwrite(ParameterName::ShedDemandPrice, f64::INFINITY);
        let b = simple_model.carriers.get_mut("B").unwrap();
        b.attributes.overwrite(ParameterName::ShedDemandPrice, 1000.0);

        let (_, solution) = solve_first_step(&simple_model);
        let import = solution
            .value(VariableName::ImportCarrierFlow, &index!["A", "node1", 0u32])
            .unwrap();
        assert_approx_eq!(f64, import, 10.0, epsilon = 1e-6);
        let shed = solution
            .value(VariableName::ShedDemandCarrier, &index!["B", "node1", 0u32])
            .unwrap();
        assert_approx_eq!(f64, shed, 5.0, epsilon = 1e-6);
    }
}
