//! Fixtures for tests
use crate::carrier::Carrier;
use crate::model::{AnalysisParameters, Model, ModelParameters, SolverParameters, SystemParameters};
use crate::network::all_ordered_pairs;
use crate::parameter::{AttributeData, ParameterName, ParameterStore};
use crate::scenario::ScenarioID;
use crate::sets::SetRegistry;
use crate::simulation::StepConfig;
use crate::simulation::baseline::Baseline;
use crate::simulation::optimisation::solver::{relax_binaries, solve};
use crate::simulation::optimisation::{
    AssembledModel, AssemblyInput, Solution, SolveStatus, construct,
};
use crate::technology::{Approximation, Technology, TechnologyCategory};
use crate::time_step::TimeStepMapper;
use anyhow::Result;
use indexmap::{IndexMap, IndexSet, indexmap};
use rstest::fixture;
use std::path::PathBuf;
use std::rc::Rc;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Attribute data with the given element-wide values
fn scalars<const N: usize>(values: [(ParameterName, f64); N]) -> AttributeData {
    AttributeData {
        scalars: values.into_iter().collect(),
        series: IndexMap::new(),
    }
}

#[fixture]
pub fn simple_time_steps() -> TimeStepMapper {
    TimeStepMapper::new(1, 1, vec![0]).unwrap()
}

/// A two-node model with a single converter turning A into B, with demand for B at node 1
#[fixture]
pub fn simple_model() -> Model {
    let nodes: IndexSet<_> = ["node1".into(), "node2".into()].into_iter().collect();
    let edges = all_ordered_pairs(&nodes);

    let a = Carrier {
        id: "A".into(),
        description: "Input carrier".into(),
        attributes: scalars([
            (ParameterName::ImportPrice, 1.0),
            (ParameterName::AvailabilityImport, f64::INFINITY),
        ]),
    };
    let mut b_attributes = AttributeData::default();
    b_attributes
        .series
        .entry(ParameterName::Demand)
        .or_default()
        .insert((Rc::from("node1"), None), 10.0);
    let b = Carrier {
        id: "B".into(),
        description: "Output carrier".into(),
        attributes: b_attributes,
    };

    let converter = Technology {
        id: "converter".into(),
        category: TechnologyCategory::Conversion,
        reference_carrier: "B".into(),
        description: "Turns A into B".into(),
        capex_approximation: Approximation::Linear,
        conversion_approximation: Approximation::Linear,
        attributes: scalars([
            (ParameterName::Lifetime, 20.0),
            (ParameterName::CapexSpecific, 100.0),
        ]),
        conversion_efficiencies: indexmap! { ("A".into(), "B".into()) => 0.5 },
        capex_pwa: None,
        conversion_pwa: None,
    };

    Model {
        model_path: PathBuf::from("simple"),
        dataset: "simple".into(),
        parameters: ModelParameters {
            system: SystemParameters {
                reference_year: 2020,
                optimized_years: 1,
                interval_between_years: 1,
                unaggregated_time_steps_per_year: 1,
                aggregated_time_steps_per_year: None,
                total_hours_per_year: 8760.0,
                use_rolling_horizon: false,
                years_in_rolling_horizon: 1,
                double_capex_transport: true,
                set_conversion_technologies: None,
                set_transport_technologies: None,
                set_storage_technologies: None,
                set_bidirectional_transport_technologies: Vec::new(),
                carbon_emissions_limit: None,
                carbon_emissions_budget: None,
                previous_carbon_emissions: 0.0,
            },
            analysis: AnalysisParameters::default(),
            solver: SolverParameters::default(),
            scenarios: IndexMap::new(),
        },
        nodes,
        edges,
        carriers: indexmap! { a.id.clone() => a, b.id.clone() => b },
        technologies: indexmap! { converter.id.clone() => converter },
        existing_capacities: Vec::new(),
    }
}

#[fixture]
pub fn simple_sets(simple_model: Model, simple_time_steps: TimeStepMapper) -> SetRegistry {
    SetRegistry::new(&simple_model, &simple_time_steps).unwrap()
}

/// Add a pipeline transporting A to a model
pub fn add_pipeline(model: &mut Model) {
    let pipeline = Technology {
        id: "pipeline".into(),
        category: TechnologyCategory::Transport,
        reference_carrier: "A".into(),
        description: "Moves A between nodes".into(),
        capex_approximation: Approximation::Linear,
        conversion_approximation: Approximation::Linear,
        attributes: scalars([
            (ParameterName::Lifetime, 20.0),
            (ParameterName::CapexSpecific, 1.0),
            (ParameterName::LossFlow, 0.01),
        ]),
        conversion_efficiencies: IndexMap::new(),
        capex_pwa: None,
        conversion_pwa: None,
    };
    model.technologies.insert(pipeline.id.clone(), pipeline);
}

/// Add a battery storing B to a model
pub fn add_battery(model: &mut Model) {
    let battery = Technology {
        id: "battery".into(),
        category: TechnologyCategory::Storage,
        reference_carrier: "B".into(),
        description: "Stores B".into(),
        capex_approximation: Approximation::Linear,
        conversion_approximation: Approximation::Linear,
        attributes: scalars([
            (ParameterName::Lifetime, 20.0),
            (ParameterName::CapexSpecific, 1000.0),
            (ParameterName::EfficiencyDischarge, 0.9),
        ]),
        conversion_efficiencies: IndexMap::new(),
        capex_pwa: None,
        conversion_pwa: None,
    };
    model.technologies.insert(battery.id.clone(), battery);
}

/// Assemble the first horizon step of the base scenario
pub fn construct_first_step(model: &Model) -> Result<AssembledModel> {
    let config = StepConfig::new(model, &ScenarioID::base(), 0)?;
    let baseline = Baseline::initial(model)?;
    let input = AssemblyInput {
        model,
        step: &config,
        baseline: &baseline,
    };

    construct(input, relax_binaries(&model.parameters.solver))
}

/// Assemble and solve the first horizon step of the base scenario, which must be optimal
pub fn solve_first_step(model: &Model) -> (ParameterStore, Solution) {
    let assembled = construct_first_step(model).unwrap();
    let outcome = solve(assembled.problem, &model.parameters.solver);
    assert_eq!(outcome.status, SolveStatus::Optimal);

    (
        assembled.parameters,
        Solution::new(outcome, assembled.variables, assembled.constraints),
    )
}
