//! Functionality for running the rolling-horizon optimisation.
use crate::error::ModelError;
use crate::model::{Model, SystemParameters};
use crate::output::write_step_results;
use crate::parameter::ParameterStore;
use crate::scenario::{ScenarioID, apply_scenario};
use crate::time_step::{TimeStepMapper, YearlyStep};
use anyhow::{Context, Result, bail};
use log::info;
use std::path::Path;

pub mod baseline;
pub mod optimisation;
use baseline::Baseline;
use optimisation::{AssembledModel, AssemblyInput, Solution, SolveStatus, construct};

/// The configuration of a single horizon step
#[derive(Debug, Clone, PartialEq)]
pub struct StepConfig {
    /// The scenario being run
    pub scenario: ScenarioID,
    /// The index of the horizon step
    pub step: u32,
    /// The number of horizon steps of the run
    pub num_steps: u32,
    /// The time steps covered by this horizon step
    pub time_steps: TimeStepMapper,
    /// The name results for this step are written under
    pub model_name: String,
}

impl StepConfig {
    /// Configure a horizon step of a model for a scenario
    pub fn new(model: &Model, scenario: &ScenarioID, step: u32) -> Result<Self> {
        let system = model.system();
        let windows = horizon_steps(system);
        let Some(years) = windows.get(step as usize) else {
            bail!("Horizon step {step} is out of range");
        };

        let time_steps = TimeStepMapper::new(
            system.unaggregated_time_steps_per_year,
            system.operation_steps_per_year(),
            years.clone(),
        )?;

        let num_steps = windows.len() as u32;
        let mut model_name = model.dataset.clone();
        if num_steps > 1 {
            model_name.push_str(&format!("_MF{step}"));
        }
        if !scenario.is_base() {
            model_name.push_str(&format!("_{scenario}"));
        }

        Ok(Self {
            scenario: scenario.clone(),
            step,
            num_steps,
            time_steps,
            model_name,
        })
    }
}

/// The yearly steps covered by each horizon step.
///
/// With a rolling horizon, each step starts one year later than the previous one and covers up
/// to `years_in_rolling_horizon` years. Otherwise there is a single step covering every year.
pub fn horizon_steps(system: &SystemParameters) -> Vec<Vec<YearlyStep>> {
    let num_years = system.optimized_years;
    if !system.use_rolling_horizon {
        return vec![(0..num_years).collect()];
    }

    let window = system.years_in_rolling_horizon.max(1);
    (0..num_years)
        .map(|start| (start..(start + window).min(num_years)).collect())
        .collect()
}

/// The states of the solve loop for one scenario
enum LoopState {
    Configure {
        step: u32,
        baseline: Baseline,
    },
    Construct {
        config: StepConfig,
        baseline: Baseline,
    },
    Solve {
        config: StepConfig,
        baseline: Baseline,
        assembled: AssembledModel,
    },
    Extract {
        config: StepConfig,
        baseline: Baseline,
        parameters: ParameterStore,
        solution: Solution,
    },
    Advance {
        config: StepConfig,
        baseline: Baseline,
        solution: Solution,
    },
    Done {
        baseline: Baseline,
    },
}

/// Run every scenario of a model, writing the results of each horizon step.
///
/// # Arguments
///
/// * `model` - The model to run
/// * `output_path` - The folder to which results will be written
/// * `compress` - Whether to compress result files
pub fn run(model: &Model, output_path: &Path, compress: bool) -> Result<()> {
    for scenario in scenario_ids(model) {
        let model = scenario_model(model, &scenario)?;
        run_scenario(&model, &scenario, Some(output_path), compress)?;
    }

    Ok(())
}

/// The IDs of all scenarios to run, the base scenario first
fn scenario_ids(model: &Model) -> Vec<ScenarioID> {
    std::iter::once(ScenarioID::base())
        .chain(model.parameters.scenarios.keys().cloned())
        .collect()
}

/// A fresh copy of the base model with the overrides of a scenario applied
fn scenario_model(base: &Model, scenario: &ScenarioID) -> Result<Model> {
    let Some(definition) = base.parameters.scenarios.get(scenario) else {
        return Ok(base.clone());
    };

    apply_scenario(base, definition)
        .with_context(|| format!("Failed to apply scenario \"{scenario}\""))
}

/// Solve every horizon step of a scenario in turn.
///
/// Results are written to `output_path` if it is given. Returns the baseline after the last step.
pub fn run_scenario(
    model: &Model,
    scenario: &ScenarioID,
    output_path: Option<&Path>,
    compress: bool,
) -> Result<Baseline> {
    let options = &model.parameters.solver;
    let relax = optimisation::solver::relax_binaries(options);
    let mut state = LoopState::Configure {
        step: 0,
        baseline: Baseline::initial(model)?,
    };

    loop {
        state = match state {
            LoopState::Configure { step, baseline } => {
                if step as usize >= horizon_steps(model.system()).len() {
                    LoopState::Done { baseline }
                } else {
                    let config = StepConfig::new(model, scenario, step)?;
                    info!(
                        "Horizon step {} of {}: years {:?}",
                        step + 1,
                        config.num_steps,
                        config.time_steps.years()
                    );
                    LoopState::Construct { config, baseline }
                }
            }
            LoopState::Construct { config, baseline } => {
                let input = AssemblyInput {
                    model,
                    step: &config,
                    baseline: &baseline,
                };
                let assembled = construct(input, relax)
                    .with_context(|| format!("Failed to construct {}", config.model_name))?;
                LoopState::Solve {
                    config,
                    baseline,
                    assembled,
                }
            }
            LoopState::Solve {
                config,
                baseline,
                assembled,
            } => {
                let AssembledModel {
                    problem,
                    variables,
                    constraints,
                    parameters,
                    ..
                } = assembled;
                let outcome = optimisation::solver::solve(problem, options);
                if outcome.status != SolveStatus::Optimal {
                    bail!(ModelError::SolveFailure {
                        dataset: model.dataset.clone(),
                        scenario: config.scenario.to_string(),
                        step: config.step,
                        status: outcome.status,
                    });
                }

                let solution = Solution::new(outcome, variables, constraints);
                info!("Objective value: {}", solution.objective_value());
                LoopState::Extract {
                    config,
                    baseline,
                    parameters,
                    solution,
                }
            }
            LoopState::Extract {
                config,
                baseline,
                parameters,
                solution,
            } => {
                if let Some(output_path) = output_path {
                    let step_dir = output_path.join(&config.model_name);
                    write_step_results(
                        &step_dir,
                        model,
                        &config,
                        &parameters,
                        &solution,
                        compress,
                    )
                    .with_context(|| {
                        format!("Failed to write results to {}", step_dir.display())
                    })?;
                }
                LoopState::Advance {
                    config,
                    baseline,
                    solution,
                }
            }
            LoopState::Advance {
                config,
                baseline,
                solution,
            } => LoopState::Configure {
                step: config.step + 1,
                baseline: baseline.advance(model, &config, &solution)?,
            },
            LoopState::Done { baseline } => {
                info!("Finished scenario \"{scenario}\"");
                return Ok(baseline);
            }
        };
    }
}

/// Check that the first horizon step of every scenario can be constructed
pub fn validate(model: &Model) -> Result<()> {
    for scenario in scenario_ids(model) {
        let model = scenario_model(model, &scenario)?;
        let config = StepConfig::new(&model, &scenario, 0)?;
        let baseline = Baseline::initial(&model)?;
        let input = AssemblyInput {
            model: &model,
            step: &config,
            baseline: &baseline,
        };
        construct(input, optimisation::solver::relax_binaries(&model.parameters.solver))
            .with_context(|| format!("Failed to construct {}", config.model_name))?;
    }

    Ok(())
}
