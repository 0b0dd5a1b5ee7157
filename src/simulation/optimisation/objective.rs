//! System-wide cost and emission totals, the emission limits and the objective function.
use super::constraints::ConstraintName;
use super::{Contribution, ModelContext, ProblemBuilder, Variable, VariableName};
use crate::error::ModelError;
use crate::index::{IndexTuple, IndexValue, index};
use crate::model::Objective;
use crate::parameter::ParameterName;
use crate::time_step::YearlyStep;
use anyhow::{Result, bail};

/// The yearly totals of the system, whose sum is minimised
pub struct SystemTotals;

impl Contribution for SystemTotals {
    fn name(&self) -> &'static str {
        "system totals"
    }

    fn contributes_parameters(&self, ctx: &mut ModelContext) -> Result<()> {
        let model = ctx.model();
        let system = model.system();
        let time_steps = ctx.time_steps().clone();

        for step in time_steps.iter_operation_steps() {
            ctx.add_parameter(
                ParameterName::TimeStepsOperationDuration,
                index![step],
                f64::from(time_steps.duration(step)),
            )?;
        }
        for year in time_steps.years() {
            ctx.add_parameter(
                ParameterName::CarbonEmissionsLimit,
                index![*year],
                system.carbon_emissions_limit.unwrap_or(f64::INFINITY),
            )?;
        }
        ctx.add_parameter(
            ParameterName::CarbonEmissionsBudget,
            index![],
            system.carbon_emissions_budget.unwrap_or(f64::INFINITY),
        )?;
        ctx.add_parameter(
            ParameterName::PreviousCarbonEmissions,
            index![],
            ctx.input.baseline.cumulative_emissions,
        )?;

        Ok(())
    }

    fn contributes_variables(
        &self,
        ctx: &ModelContext,
        builder: &mut ProblemBuilder,
    ) -> Result<()> {
        let (cost, emissions) = match ctx.model().parameters.analysis.objective {
            Objective::TotalCost => (1.0, 0.0),
            Objective::TotalCarbonEmissions => (0.0, 1.0),
            Objective::Risk => bail!(ModelError::configuration(
                "objective",
                "the risk objective is not supported"
            )),
        };

        for year in ctx.time_steps().years().iter().copied() {
            for (name, objective_cost) in [
                (VariableName::CapexTotal, cost),
                (VariableName::OpexTotal, cost),
                (VariableName::CostCarrierTotal, cost),
                (VariableName::CarbonEmissionsTotal, emissions),
                (VariableName::CarbonEmissionsCumulative, 0.0),
            ] {
                builder.add_variable(
                    name,
                    index![year],
                    f64::NEG_INFINITY,
                    f64::INFINITY,
                    objective_cost,
                )?;
            }
        }

        Ok(())
    }

    fn contributes_constraints(
        &self,
        ctx: &ModelContext,
        builder: &mut ProblemBuilder,
    ) -> Result<()> {
        for year in ctx.time_steps().years().iter().copied() {
            add_cost_totals(ctx, builder, year)?;
            add_emission_totals(ctx, builder, year)?;
        }

        Ok(())
    }
}

/// Collect the terms of a variable family over all indices belonging to a year.
///
/// The last component of each index is the time step, which is either a yearly or an
/// operational step. Operational terms are weighted by the duration of their time step.
fn yearly_terms(
    ctx: &ModelContext,
    builder: &ProblemBuilder,
    name: VariableName,
    year: YearlyStep,
    operational: bool,
) -> Result<Vec<(Variable, f64)>> {
    let time_steps = ctx.time_steps();
    let mut terms = Vec::new();
    for (idx, var) in builder.variables().iter(name) {
        let Some(IndexValue::Step(step)) = idx.0.last() else {
            continue;
        };
        if !operational {
            if *step == year {
                terms.push((var, 1.0));
            }
            continue;
        }
        if time_steps.invest_step_of(*step) == year {
            let duration =
                ctx.parameter(ParameterName::TimeStepsOperationDuration, &index![*step])?;
            terms.push((var, duration));
        }
    }

    Ok(terms)
}

/// Sum up the annualised capex, operating costs and carrier costs of a year
fn add_cost_totals(
    ctx: &ModelContext,
    builder: &mut ProblemBuilder,
    year: YearlyStep,
) -> Result<()> {
    let idx = index![year];
    let negate = |terms: Vec<(Variable, f64)>| terms.into_iter().map(|(var, coeff)| (var, -coeff));

    let capex_total = builder.variable(VariableName::CapexTotal, &idx)?;
    let capex = yearly_terms(ctx, builder, VariableName::CapexYearly, year, false)?;
    builder.add_equality(
        ConstraintName::CapexTotal,
        idx.clone(),
        0.0,
        std::iter::once((capex_total, 1.0)).chain(negate(capex)),
    );

    // Fixed opex is charged on the capacity for the share of the year modelled
    let fraction = ctx.model().system().fraction_of_year();
    let mut fixed = Vec::new();
    for (cap_idx, capacity) in builder.variables().iter(VariableName::Capacity) {
        if cap_idx.0.last() != Some(&IndexValue::Step(year)) {
            continue;
        }
        let fixed_opex = ctx.parameter(
            ParameterName::FixedOpexSpecific,
            &IndexTuple(cap_idx.0[..2].to_vec()),
        )?;
        fixed.push((capacity, fixed_opex * fraction));
    }
    let opex_total = builder.variable(VariableName::OpexTotal, &idx)?;
    let opex = yearly_terms(ctx, builder, VariableName::CostOpex, year, true)?;
    builder.add_equality(
        ConstraintName::OpexTotal,
        idx.clone(),
        0.0,
        std::iter::once((opex_total, 1.0))
            .chain(negate(opex))
            .chain(negate(fixed)),
    );

    let carrier_total = builder.variable(VariableName::CostCarrierTotal, &idx)?;
    let carrier = yearly_terms(ctx, builder, VariableName::CostCarrier, year, true)?;
    builder.add_equality(
        ConstraintName::CostCarrierTotal,
        idx,
        0.0,
        std::iter::once((carrier_total, 1.0)).chain(negate(carrier)),
    );

    Ok(())
}

/// Sum up the emissions of a year and apply the yearly limit and cumulative budget
fn add_emission_totals(
    ctx: &ModelContext,
    builder: &mut ProblemBuilder,
    year: YearlyStep,
) -> Result<()> {
    let idx = index![year];
    let total = builder.variable(VariableName::CarbonEmissionsTotal, &idx)?;
    let mut terms = vec![(total, 1.0)];
    for name in [
        VariableName::CarbonEmissionsTechnology,
        VariableName::CarbonEmissionsCarrier,
    ] {
        let emissions = yearly_terms(ctx, builder, name, year, true)?;
        terms.extend(emissions.into_iter().map(|(var, coeff)| (var, -coeff)));
    }
    builder.add_equality(ConstraintName::CarbonEmissionsTotal, idx.clone(), 0.0, terms);

    // Each yearly step stands for `interval` calendar years
    let interval = ctx.model().system().interval_between_years as f64;
    let cumulative = builder.variable(VariableName::CarbonEmissionsCumulative, &idx)?;
    let mut terms = vec![(cumulative, 1.0)];
    for earlier in ctx.time_steps().years().iter().filter(|y| **y <= year) {
        let total = builder.variable(VariableName::CarbonEmissionsTotal, &index![*earlier])?;
        terms.push((total, -interval));
    }
    let previous = ctx.parameter(ParameterName::PreviousCarbonEmissions, &index![])?;
    builder.add_equality(
        ConstraintName::CarbonEmissionsCumulative,
        idx.clone(),
        previous,
        terms,
    );

    let limit = ctx.parameter(ParameterName::CarbonEmissionsLimit, &idx)?;
    if limit.is_finite() {
        builder.add_constraint(
            ConstraintName::CarbonEmissionsLimit,
            idx.clone(),
            f64::NEG_INFINITY,
            limit,
            [(total, 1.0)],
        );
    }
    let budget = ctx.parameter(ParameterName::CarbonEmissionsBudget, &index![])?;
    if budget.is_finite() {
        builder.add_constraint(
            ConstraintName::CarbonEmissionsBudget,
            idx,
            f64::NEG_INFINITY,
            budget,
            [(cumulative, 1.0)],
        );
    }

    Ok(())
}
