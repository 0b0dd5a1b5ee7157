//! Transport technologies, which move their reference carrier along the edges of the network.
use super::TechnologyCategory;
use crate::error::ModelError;
use crate::index::index;
use crate::network::{EdgeID, Location};
use crate::parameter::ParameterName;
use crate::simulation::optimisation::constraints::ConstraintName;
use crate::simulation::optimisation::{Contribution, ModelContext, ProblemBuilder, VariableName};
use anyhow::{Result, ensure};
use float_cmp::approx_eq;
use indexmap::IndexSet;

/// The flows and losses of transport technologies
pub struct TransportTechnologies;

impl Contribution for TransportTechnologies {
    fn name(&self) -> &'static str {
        "transport technologies"
    }

    fn contributes_parameters(&self, ctx: &mut ModelContext) -> Result<()> {
        let model = ctx.model();
        let edges = ctx.sets.edges.clone();
        for technology in model
            .technologies
            .values()
            .filter(|t| t.category == TechnologyCategory::Transport)
        {
            let id = &technology.id;
            for edge in edges.values() {
                let distance = technology.distance(edge);
                ensure!(
                    distance >= 0.0,
                    ModelError::data_consistency(id, format!("distance of {} is negative", edge.id))
                );
                ctx.add_parameter(ParameterName::Distance, index![id, &edge.id], distance)?;
            }
            for name in [ParameterName::LossFlow, ParameterName::CapexPerDistance] {
                let value = technology.scalar_attribute(name)?;
                ctx.add_parameter(name, index![id], value)?;
            }
        }

        check_bidirectional_existing_capacity(ctx)
    }

    fn contributes_variables(
        &self,
        ctx: &ModelContext,
        builder: &mut ProblemBuilder,
    ) -> Result<()> {
        for id in ctx.sets.technologies_of(TechnologyCategory::Transport) {
            for edge in ctx.sets.edges.keys() {
                let distance = ctx.parameter(ParameterName::Distance, &index![id, edge])?;
                let max_flow = if distance.is_finite() {
                    f64::INFINITY
                } else {
                    0.0
                };

                for step in ctx.time_steps().iter_operation_steps() {
                    let idx = index![id, edge, step];
                    builder.add_variable(
                        VariableName::CarrierFlow,
                        idx.clone(),
                        0.0,
                        max_flow,
                        0.0,
                    )?;
                    builder.add_variable(VariableName::CarrierLoss, idx, 0.0, f64::INFINITY, 0.0)?;
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
        for id in ctx.sets.technologies_of(TechnologyCategory::Transport) {
            let loss_flow = ctx.parameter(ParameterName::LossFlow, &index![id])?;
            for edge in ctx.sets.edges.keys() {
                let distance = ctx.parameter(ParameterName::Distance, &index![id, edge])?;
                for step in ctx.time_steps().iter_operation_steps() {
                    let idx = index![id, edge, step];
                    let flow = builder.variable(VariableName::CarrierFlow, &idx)?;
                    let loss = builder.variable(VariableName::CarrierLoss, &idx)?;
                    let mut terms = vec![(loss, 1.0)];
                    if distance.is_finite() {
                        terms.push((flow, -distance * loss_flow));
                    }
                    builder.add_equality(ConstraintName::TransportLoss, idx, 0.0, terms);
                }
            }
        }

        add_bidirectional_constraints(ctx, builder)
    }
}

/// The edges of a bidirectional technology paired with their reverse, each pair listed once
fn edge_pairs<'c>(ctx: &'c ModelContext<'_>) -> Vec<(&'c EdgeID, &'c EdgeID)> {
    let mut seen = IndexSet::new();
    let mut pairs = Vec::new();
    for (edge, reverse) in &ctx.sets.reverse_edges {
        if seen.contains(reverse) {
            continue;
        }
        seen.insert(edge);
        pairs.push((edge, reverse));
    }

    pairs
}

/// Check that bidirectional technologies have the same existing capacity in both directions
fn check_bidirectional_existing_capacity(ctx: &ModelContext) -> Result<()> {
    for id in &ctx.sets.bidirectional {
        for (edge, reverse) in edge_pairs(ctx) {
            for year in ctx.time_steps().years() {
                let existing = |edge: &EdgeID| {
                    ctx.parameter(
                        ParameterName::ExistingCapacity,
                        &index![id, &Location::Edge(edge.clone()), *year],
                    )
                };
                let (forward, backward) = (existing(edge)?, existing(reverse)?);
                ensure!(
                    approx_eq!(f64, forward, backward),
                    ModelError::data_consistency(
                        id,
                        format!(
                            "existing capacity on {edge} ({forward}) differs from its reverse \
                            {reverse} ({backward})"
                        )
                    )
                );
            }
        }
    }

    Ok(())
}

/// Make the built capacity of bidirectional technologies equal on an edge and its reverse
fn add_bidirectional_constraints(ctx: &ModelContext, builder: &mut ProblemBuilder) -> Result<()> {
    for id in &ctx.sets.bidirectional {
        for (edge, reverse) in edge_pairs(ctx) {
            for year in ctx.time_steps().years().iter().copied() {
                let forward =
                    builder.variable(VariableName::BuiltCapacity, &index![id, edge, year])?;
                let backward =
                    builder.variable(VariableName::BuiltCapacity, &index![id, reverse, year])?;
                builder.add_equality(
                    ConstraintName::BidirectionalCapacity,
                    index![id, edge, year],
                    0.0,
                    [(forward, 1.0), (backward, -1.0)],
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{
        add_pipeline, assert_error, construct_first_step, simple_model, solve_first_step,
    };
    use crate::model::{ExistingCapacity, Model};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_infinite_distance_blocks_flow(mut simple_model: Model) {
        add_pipeline(&mut simple_model);
        let (parameters, solution) = solve_first_step(&simple_model);

        assert_eq!(
            parameters.get(ParameterName::Distance, &index!["pipeline", "node1-node2"]),
            Some(f64::INFINITY)
        );
        for edge in ["node1-node2", "node2-node1"] {
            let flow = solution
                .value(VariableName::CarrierFlow, &index!["pipeline", edge, 0u32])
                .unwrap();
            assert_approx_eq!(f64, flow, 0.0, epsilon = 1e-9);
            let built = solution
                .value(VariableName::BuiltCapacity, &index!["pipeline", edge, 0u32])
                .unwrap();
            assert_approx_eq!(f64, built, 0.0, epsilon = 1e-9);
        }
    }

    /// Add a pipeline of length 10 to the model, which must supply all of A to node 1
    fn supply_node1_by_pipeline(model: &mut Model) {
        add_pipeline(model);
        for edge in model.edges.values_mut() {
            edge.distance = 10.0;
        }
        let a = model.carriers.get_mut("A").unwrap();
        let availability = a
            .attributes
            .series
            .entry(ParameterName::AvailabilityImport)
            .or_default();
        availability.insert(("node1".into(), None), 0.0);
    }

    #[rstest]
    fn test_loss_is_proportional_to_distance(mut simple_model: Model) {
        supply_node1_by_pipeline(&mut simple_model);

        let (_, solution) = solve_first_step(&simple_model);
        let flow = solution
            .value(VariableName::CarrierFlow, &index!["pipeline", "node2-node1", 0u32])
            .unwrap();
        let loss = solution
            .value(VariableName::CarrierLoss, &index!["pipeline", "node2-node1", 0u32])
            .unwrap();
        assert_approx_eq!(f64, loss, 10.0 * 0.01 * flow, epsilon = 1e-6);
        assert_approx_eq!(f64, flow - loss, 20.0, epsilon = 1e-6);
    }

    #[rstest]
    fn test_bidirectional_capacity_is_equal(mut simple_model: Model) {
        supply_node1_by_pipeline(&mut simple_model);
        simple_model
            .parameters
            .system
            .set_bidirectional_transport_technologies = vec!["pipeline".into()];

        let (_, solution) = solve_first_step(&simple_model);
        let built = |edge: &str| {
            solution
                .value(VariableName::BuiltCapacity, &index!["pipeline", edge, 0u32])
                .unwrap()
        };
        assert!(built("node2-node1") > 1e-6);
        assert_approx_eq!(f64, built("node1-node2"), built("node2-node1"), epsilon = 1e-6);
    }

    #[rstest]
    fn test_bidirectional_existing_capacity_must_match(mut simple_model: Model) {
        add_pipeline(&mut simple_model);
        simple_model
            .parameters
            .system
            .set_bidirectional_transport_technologies = vec!["pipeline".into()];
        simple_model.existing_capacities.push(ExistingCapacity {
            technology: "pipeline".into(),
            location: Location::Edge("node1-node2".into()),
            capacity: 5.0,
            remaining_lifetime: 10.0,
        });

        assert_error!(
            construct_first_step(&simple_model),
            "Inconsistent data for pipeline: existing capacity on node1-node2 (5) differs from its \
            reverse node2-node1 (0)"
        );
    }
}
