//! Conversion technologies, which turn input carriers into output carriers at a node.
use super::{Approximation, TechnologyCategory, add_segment_parameters};
use crate::error::ModelError;
use crate::index::index;
use crate::parameter::ParameterName;
use crate::simulation::optimisation::constraints::ConstraintName;
use crate::simulation::optimisation::{Contribution, ModelContext, ProblemBuilder, VariableName};
use anyhow::{Result, bail, ensure};

/// The carrier flows of conversion technologies
pub struct ConversionTechnologies;

impl Contribution for ConversionTechnologies {
    fn name(&self) -> &'static str {
        "conversion technologies"
    }

    fn contributes_sets(&self, ctx: &mut ModelContext) -> Result<()> {
        let model = ctx.model();
        for technology in model
            .technologies
            .values()
            .filter(|t| t.category == TechnologyCategory::Conversion)
            .filter(|t| t.conversion_approximation == Approximation::PiecewiseAffine)
        {
            ensure!(
                technology.conversion_efficiencies.len() == 1,
                ModelError::configuration(
                    &technology.id,
                    "piecewise-affine conversion requires exactly one input and one output carrier"
                )
            );
            let Some(pwa) = &technology.conversion_pwa else {
                bail!(ModelError::configuration(
                    &technology.id,
                    "piecewise-affine conversion requires conversion support points"
                ));
            };
            ctx.sets
                .conversion_segments
                .insert(technology.id.clone(), pwa.segments().len());
        }

        Ok(())
    }

    fn contributes_parameters(&self, ctx: &mut ModelContext) -> Result<()> {
        let model = ctx.model();
        for technology in model
            .technologies
            .values()
            .filter(|t| t.category == TechnologyCategory::Conversion)
        {
            let id = &technology.id;
            if ctx.sets.conversion_segments.contains_key(id) {
                if let Some(pwa) = &technology.conversion_pwa {
                    add_segment_parameters(
                        ctx,
                        id,
                        pwa,
                        [
                            ParameterName::ConversionSlope,
                            ParameterName::ConversionIntercept,
                            ParameterName::ConversionLowerBound,
                            ParameterName::ConversionUpperBound,
                        ],
                    )?;
                }
                continue;
            }

            for ((input, output), efficiency) in &technology.conversion_efficiencies {
                ensure!(
                    *efficiency >= 0.0 && efficiency.is_finite(),
                    ModelError::data_consistency(
                        id,
                        format!(
                            "conversion efficiency from {input} to {output} must be finite and \
                            non-negative"
                        )
                    )
                );
                ctx.add_parameter(
                    ParameterName::ConversionEfficiency,
                    index![id, input, output],
                    *efficiency,
                )?;
            }
        }

        Ok(())
    }

    fn contributes_variables(
        &self,
        ctx: &ModelContext,
        builder: &mut ProblemBuilder,
    ) -> Result<()> {
        let sets = &ctx.sets;
        for id in sets.technologies_of(TechnologyCategory::Conversion) {
            let segments = sets.conversion_segments.get(id).copied().unwrap_or(0);
            for node in &sets.nodes {
                for step in ctx.time_steps().iter_operation_steps() {
                    for (name, carriers) in [
                        (VariableName::InputFlow, &sets.input_carriers[id]),
                        (VariableName::OutputFlow, &sets.output_carriers[id]),
                    ] {
                        for carrier in carriers {
                            builder.add_variable(
                                name,
                                index![id, carrier, node, step],
                                0.0,
                                f64::INFINITY,
                                0.0,
                            )?;
                        }
                    }

                    for segment in 0..segments as u32 {
                        let idx = index![id, node, step, segment];
                        builder.add_binary(
                            VariableName::ConversionSegmentSelect,
                            idx.clone(),
                            true,
                        )?;
                        builder.add_variable(
                            VariableName::ConversionSegmentAux,
                            idx,
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
        for id in ctx.sets.technologies_of(TechnologyCategory::Conversion) {
            let technology = &ctx.model().technologies[id];
            if let Some(num_segments) = ctx.sets.conversion_segments.get(id) {
                add_segment_constraints(ctx, builder, id, *num_segments)?;
                continue;
            }

            for (input, output) in technology.conversion_efficiencies.keys() {
                let efficiency =
                    ctx.parameter(ParameterName::ConversionEfficiency, &index![id, input, output])?;
                for node in &ctx.sets.nodes {
                    for step in ctx.time_steps().iter_operation_steps() {
                        let idx = index![id, input, output, node, step];
                        let input_flow = builder.variable(
                            VariableName::InputFlow,
                            &index![id, input, node, step],
                        )?;
                        if efficiency == 0.0 {
                            builder.add_equality(
                                ConstraintName::ZeroEfficiencyInput,
                                idx.clone(),
                                0.0,
                                [(input_flow, 1.0)],
                            );
                        }

                        let output_flow = builder
                            .variable(VariableName::OutputFlow, &index![id, output, node, step])?;
                        builder.add_equality(
                            ConstraintName::LinearConversionEfficiency,
                            idx,
                            0.0,
                            [(output_flow, 1.0), (input_flow, -efficiency)],
                        );
                    }
                }
            }
        }

        Ok(())
    }
}

/// Relate output to input of a technology with piecewise-affine conversion.
///
/// At most one segment is selected per node and time step. The input flow is the sum of the
/// auxiliary flows of the segments and the output follows from the selected segment.
fn add_segment_constraints(
    ctx: &ModelContext,
    builder: &mut ProblemBuilder,
    id: &super::TechnologyID,
    num_segments: usize,
) -> Result<()> {
    let technology = &ctx.model().technologies[id];
    let Some((input, output)) = technology.conversion_efficiencies.keys().next() else {
        bail!(ModelError::configuration(
            id,
            "piecewise-affine conversion requires exactly one input and one output carrier"
        ));
    };

    for node in &ctx.sets.nodes {
        for step in ctx.time_steps().iter_operation_steps() {
            let idx = index![id, node, step];
            let input_flow =
                builder.variable(VariableName::InputFlow, &index![id, input, node, step])?;
            let output_flow =
                builder.variable(VariableName::OutputFlow, &index![id, output, node, step])?;

            let mut selection = Vec::new();
            let mut input_terms = vec![(input_flow, 1.0)];
            let mut output_terms = vec![(output_flow, 1.0)];
            for segment in 0..num_segments as u32 {
                let seg_idx = index![id, node, step, segment];
                let select = builder.variable(VariableName::ConversionSegmentSelect, &seg_idx)?;
                let aux = builder.variable(VariableName::ConversionSegmentAux, &seg_idx)?;
                let param_idx = index![id, segment];
                let slope = ctx.parameter(ParameterName::ConversionSlope, &param_idx)?;
                let intercept = ctx.parameter(ParameterName::ConversionIntercept, &param_idx)?;
                let lower = ctx.parameter(ParameterName::ConversionLowerBound, &param_idx)?;
                let upper = ctx.parameter(ParameterName::ConversionUpperBound, &param_idx)?;

                builder.add_constraint(
                    ConstraintName::ConversionSegmentLower,
                    seg_idx.clone(),
                    0.0,
                    f64::INFINITY,
                    [(aux, 1.0), (select, -lower)],
                );
                builder.add_constraint(
                    ConstraintName::ConversionSegmentUpper,
                    seg_idx,
                    f64::NEG_INFINITY,
                    0.0,
                    [(aux, 1.0), (select, -upper)],
                );

                selection.push((select, 1.0));
                input_terms.push((aux, -1.0));
                output_terms.extend([(aux, -slope), (select, -intercept)]);
            }

            builder.add_constraint(
                ConstraintName::ConversionSegmentSelection,
                idx.clone(),
                f64::NEG_INFINITY,
                1.0,
                selection,
            );
            builder.add_equality(
                ConstraintName::ConversionSegmentInput,
                idx.clone(),
                0.0,
                input_terms,
            );
            builder.add_equality(ConstraintName::ConversionSegmentOutput, idx, 0.0, output_terms);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, construct_first_step, simple_model, solve_first_step};
    use crate::model::Model;
    use crate::pwa::PiecewiseAffine;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn converter_flows(model: &Model) -> (f64, f64) {
        let (_, solution) = solve_first_step(model);
        let input = solution
            .value(VariableName::InputFlow, &index!["converter", "A", "node1", 0u32])
            .unwrap();
        let output = solution
            .value(VariableName::OutputFlow, &index!["converter", "B", "node1", 0u32])
            .unwrap();
        (input, output)
    }

    #[rstest]
    fn test_linear_conversion(simple_model: Model) {
        let (input, output) = converter_flows(&simple_model);
        assert_approx_eq!(f64, output, 10.0, epsilon = 1e-6);
        assert_approx_eq!(f64, input, 20.0, epsilon = 1e-6);

        // All of B comes from the converter
        let (_, solution) = solve_first_step(&simple_model);
        for name in [VariableName::ImportCarrierFlow, VariableName::ExportCarrierFlow] {
            let flow = solution.value(name, &index!["B", "node1", 0u32]).unwrap();
            assert_approx_eq!(f64, flow, 0.0, epsilon = 1e-9);
        }
    }

    #[rstest]
    fn test_single_segment_matches_linear(mut simple_model: Model) {
        let linear = converter_flows(&simple_model);

        let converter = simple_model.technologies.get_mut("converter").unwrap();
        converter.conversion_approximation = Approximation::PiecewiseAffine;
        converter.conversion_pwa =
            Some(PiecewiseAffine::new("converter", vec![(0.0, 0.0), (100.0, 50.0)]).unwrap());
        let pwa = converter_flows(&simple_model);

        assert_approx_eq!(f64, pwa.0, linear.0, epsilon = 1e-6);
        assert_approx_eq!(f64, pwa.1, linear.1, epsilon = 1e-6);
    }

    #[rstest]
    fn test_pwa_needs_single_pair(mut simple_model: Model) {
        let converter = simple_model.technologies.get_mut("converter").unwrap();
        converter.conversion_approximation = Approximation::PiecewiseAffine;
        converter.conversion_pwa =
            Some(PiecewiseAffine::new("converter", vec![(0.0, 0.0), (100.0, 50.0)]).unwrap());
        converter
            .conversion_efficiencies
            .insert(("B".into(), "A".into()), 0.1);

        assert_error!(
            construct_first_step(&simple_model),
            "Configuration error for converter: piecewise-affine conversion requires exactly one \
            input and one output carrier"
        );
    }

    #[rstest]
    fn test_pwa_needs_support_points(mut simple_model: Model) {
        simple_model
            .technologies
            .get_mut("converter")
            .unwrap()
            .conversion_approximation = Approximation::PiecewiseAffine;

        assert_error!(
            construct_first_step(&simple_model),
            "Configuration error for converter: piecewise-affine conversion requires conversion \
            support points"
        );
    }

    #[rstest]
    fn test_zero_efficiency_fixes_input(mut simple_model: Model) {
        let converter = simple_model.technologies.get_mut("converter").unwrap();
        *converter.conversion_efficiencies.values_mut().next().unwrap() = 0.0;
        simple_model
            .carriers
            .get_mut("B")
            .unwrap()
            .attributes
            .overwrite(ParameterName::ShedDemandPrice, 1000.0);

        let (input, output) = converter_flows(&simple_model);
        assert_approx_eq!(f64, input, 0.0, epsilon = 1e-9);
        assert_approx_eq!(f64, output, 0.0, epsilon = 1e-6);
    }
}
