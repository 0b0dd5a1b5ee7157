//! Storage technologies, which charge and discharge their reference carrier at a node.
use super::TechnologyCategory;
use crate::error::ModelError;
use crate::index::index;
use crate::parameter::ParameterName;
use crate::simulation::optimisation::constraints::ConstraintName;
use crate::simulation::optimisation::{Contribution, ModelContext, ProblemBuilder, VariableName};
use anyhow::{Result, ensure};

/// The charge, discharge and level of storage technologies
pub struct StorageTechnologies;

const STORAGE_ATTRIBUTES: [ParameterName; 4] = [
    ParameterName::EfficiencyCharge,
    ParameterName::EfficiencyDischarge,
    ParameterName::SelfDischarge,
    ParameterName::EnergyToPowerRatio,
];

impl Contribution for StorageTechnologies {
    fn name(&self) -> &'static str {
        "storage technologies"
    }

    fn contributes_parameters(&self, ctx: &mut ModelContext) -> Result<()> {
        let model = ctx.model();
        for technology in model
            .technologies
            .values()
            .filter(|t| t.category == TechnologyCategory::Storage)
        {
            for name in STORAGE_ATTRIBUTES {
                let value = technology.scalar_attribute(name)?;
                ctx.add_parameter(name, index![&technology.id], value)?;
            }

            let discharge = technology.scalar_attribute(ParameterName::EfficiencyDischarge)?;
            ensure!(
                discharge > 0.0,
                ModelError::data_consistency(
                    &technology.id,
                    "efficiency_discharge must be greater than zero"
                )
            );
            let self_discharge = technology.scalar_attribute(ParameterName::SelfDischarge)?;
            ensure!(
                (0.0..=1.0).contains(&self_discharge),
                ModelError::data_consistency(
                    &technology.id,
                    "self_discharge must be between zero and one"
                )
            );
        }

        Ok(())
    }

    fn contributes_variables(
        &self,
        ctx: &ModelContext,
        builder: &mut ProblemBuilder,
    ) -> Result<()> {
        for id in ctx.sets.technologies_of(TechnologyCategory::Storage) {
            for node in &ctx.sets.nodes {
                for step in ctx.time_steps().iter_operation_steps() {
                    for name in [
                        VariableName::CarrierFlowCharge,
                        VariableName::CarrierFlowDischarge,
                        VariableName::StorageLevel,
                    ] {
                        builder.add_variable(
                            name,
                            index![id, node, step],
                            0.0,
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
        let time_steps = ctx.time_steps();
        for id in ctx.sets.technologies_of(TechnologyCategory::Storage) {
            let tech_idx = index![id];
            let charge_efficiency = ctx.parameter(ParameterName::EfficiencyCharge, &tech_idx)?;
            let discharge_efficiency =
                ctx.parameter(ParameterName::EfficiencyDischarge, &tech_idx)?;
            let self_discharge = ctx.parameter(ParameterName::SelfDischarge, &tech_idx)?;
            let energy_to_power = ctx.parameter(ParameterName::EnergyToPowerRatio, &tech_idx)?;

            for node in &ctx.sets.nodes {
                for step in time_steps.iter_operation_steps() {
                    let idx = index![id, node, step];
                    let duration =
                        ctx.parameter(ParameterName::TimeStepsOperationDuration, &index![step])?;
                    let level = builder.variable(VariableName::StorageLevel, &idx)?;
                    let previous = builder.variable(
                        VariableName::StorageLevel,
                        &index![id, node, time_steps.previous_in_year(step)],
                    )?;
                    let charge = builder.variable(VariableName::CarrierFlowCharge, &idx)?;
                    let discharge = builder.variable(VariableName::CarrierFlowDischarge, &idx)?;

                    // The level wraps around within each year
                    builder.add_equality(
                        ConstraintName::StorageLevel,
                        idx.clone(),
                        0.0,
                        [
                            (level, 1.0),
                            (previous, -(1.0 - self_discharge).powf(duration)),
                            (charge, -charge_efficiency * duration),
                            (discharge, duration / discharge_efficiency),
                        ],
                    );

                    let year = time_steps.invest_step_of(step);
                    let capacity =
                        builder.variable(VariableName::Capacity, &index![id, node, year])?;
                    builder.add_constraint(
                        ConstraintName::StorageLevelMax,
                        idx,
                        f64::NEG_INFINITY,
                        0.0,
                        [(level, 1.0), (capacity, -energy_to_power)],
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{
        add_battery, assert_error, construct_first_step, simple_model, solve_first_step,
    };
    use crate::model::Model;
    use crate::time_step::TimeStepMapper;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_zero_discharge_efficiency(mut simple_model: Model) {
        add_battery(&mut simple_model);
        simple_model
            .technologies
            .get_mut("battery")
            .unwrap()
            .attributes
            .overwrite(ParameterName::EfficiencyDischarge, 0.0);

        assert_error!(
            construct_first_step(&simple_model),
            "Inconsistent data for battery: efficiency_discharge must be greater than zero"
        );
    }

    #[rstest]
    fn test_storage_level_balance(mut simple_model: Model) {
        // Demand only in the second of two time steps, with A only available in the first
        simple_model.parameters.system.unaggregated_time_steps_per_year = 2;
        add_battery(&mut simple_model);
        let b = simple_model.carriers.get_mut("B").unwrap();
        let demand = b.attributes.series.entry(ParameterName::Demand).or_default();
        demand.clear();
        demand.insert(("node1".into(), Some(0)), 0.0);
        demand.insert(("node1".into(), Some(1)), 10.0);
        let a = simple_model.carriers.get_mut("A").unwrap();
        let import = a
            .attributes
            .series
            .entry(ParameterName::AvailabilityImport)
            .or_default();
        import.insert(("node1".into(), Some(1)), 0.0);
        import.insert(("node2".into(), Some(1)), 0.0);

        let (_, solution) = solve_first_step(&simple_model);
        let mapper = TimeStepMapper::new(2, 2, vec![0]).unwrap();
        let value = |name, step| {
            solution
                .value(name, &index!["battery", "node1", step])
                .unwrap()
        };
        let discharge = value(VariableName::CarrierFlowDischarge, 1);
        assert_approx_eq!(f64, discharge, 10.0, epsilon = 1e-6);
        // The battery is full after the first step and empty after the second
        let level = value(VariableName::StorageLevel, mapper.previous_in_year(1));
        assert_approx_eq!(f64, level, 10.0 / 0.9, epsilon = 1e-6);
        assert_approx_eq!(f64, value(VariableName::StorageLevel, 1), 0.0, epsilon = 1e-6);
    }
}
