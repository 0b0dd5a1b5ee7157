//! Code for assembling the optimisation problem for a horizon step and reading its solution.
//!
//! The problem is assembled by a fixed list of components, each implementing [`Contribution`].
//! Every component first declares its sets, then every component declares its parameters, then
//! its variables and finally its constraints. Components only communicate through the
//! [`ModelContext`] (sets and parameters) and the [`ProblemBuilder`] (variables and constraints).
use crate::carrier::Carriers;
use crate::index::IndexTuple;
use crate::model::Model;
use crate::parameter::{ParameterName, ParameterStore};
use crate::sets::SetRegistry;
use crate::simulation::StepConfig;
use crate::simulation::baseline::Baseline;
use crate::technology::TechnologyBase;
use crate::technology::conversion::ConversionTechnologies;
use crate::technology::storage::StorageTechnologies;
use crate::technology::transport::TransportTechnologies;
use crate::time_step::TimeStepMapper;
use anyhow::{Context, Result};
use highs::RowProblem as Problem;
use indexmap::IndexMap;
use log::debug;

pub mod constraints;
pub mod objective;
pub mod solver;
pub mod variables;
use constraints::{ConstraintName, ConstraintRegistry, MassBalance};
use objective::SystemTotals;
pub use solver::{SolveOutcome, SolveStatus};
pub use variables::{Variable, VariableName, VariablePool};

/// The inputs to the assembly of a single horizon step
#[derive(Clone, Copy)]
pub struct AssemblyInput<'a> {
    /// The model, with scenario overrides applied
    pub model: &'a Model,
    /// The configuration of this horizon step
    pub step: &'a StepConfig,
    /// Capacities and emissions carried over from previous horizon steps
    pub baseline: &'a Baseline,
}

/// The sets and parameters shared by all components while a horizon step is assembled
pub struct ModelContext<'a> {
    /// The inputs to the assembly
    pub input: AssemblyInput<'a>,
    /// The index sets
    pub sets: SetRegistry,
    /// The parameter tables
    pub parameters: ParameterStore,
}

impl<'a> ModelContext<'a> {
    /// Create a new context with the base sets of the model
    pub fn new(input: AssemblyInput<'a>) -> Result<Self> {
        Ok(Self {
            sets: SetRegistry::new(input.model, &input.step.time_steps)?,
            parameters: ParameterStore::default(),
            input,
        })
    }

    /// The model being assembled
    pub fn model(&self) -> &'a Model {
        self.input.model
    }

    /// The time-step mapping for this horizon step
    pub fn time_steps(&self) -> &TimeStepMapper {
        &self.sets.time_steps
    }

    /// Insert a parameter value, checking the index against the sets
    pub fn add_parameter(
        &mut self,
        name: ParameterName,
        index: IndexTuple,
        value: f64,
    ) -> Result<()> {
        self.parameters.insert(&self.sets, name, index, value)
    }

    /// Look up a parameter value
    pub fn parameter(&self, name: ParameterName, index: &IndexTuple) -> Result<f64> {
        self.parameters.extract(name, index)
    }
}

/// The capabilities through which a component contributes to the optimisation problem.
///
/// The methods are invoked in the order they are declared, for every component, before moving
/// on to the next method.
pub trait Contribution {
    /// A short name for the component, used in log messages
    fn name(&self) -> &'static str;

    /// Add derived sets to the registry
    fn contributes_sets(&self, _ctx: &mut ModelContext) -> Result<()> {
        Ok(())
    }

    /// Add values to the parameter store
    fn contributes_parameters(&self, _ctx: &mut ModelContext) -> Result<()> {
        Ok(())
    }

    /// Add decision variables to the problem
    fn contributes_variables(
        &self,
        _ctx: &ModelContext,
        _builder: &mut ProblemBuilder,
    ) -> Result<()> {
        Ok(())
    }

    /// Add constraints to the problem
    fn contributes_constraints(
        &self,
        _ctx: &ModelContext,
        _builder: &mut ProblemBuilder,
    ) -> Result<()> {
        Ok(())
    }
}

/// The components of the model, in the order they are invoked
fn components() -> [&'static dyn Contribution; 7] {
    [
        &TechnologyBase,
        &ConversionTechnologies,
        &TransportTechnologies,
        &StorageTechnologies,
        &Carriers,
        &SystemTotals,
        &MassBalance,
    ]
}

/// Collects the variables and constraints of the problem
pub struct ProblemBuilder {
    problem: Problem,
    variables: VariablePool,
    constraints: ConstraintRegistry,
    relax_binaries: bool,
}

impl ProblemBuilder {
    /// Create a new, empty problem.
    ///
    /// If `relax_binaries` is true, binary variables are added as continuous variables in [0, 1].
    pub fn new(relax_binaries: bool) -> Self {
        Self {
            problem: Problem::default(),
            variables: VariablePool::default(),
            constraints: ConstraintRegistry::default(),
            relax_binaries,
        }
    }

    /// Add a continuous variable with the given bounds and objective coefficient
    pub fn add_variable(
        &mut self,
        name: VariableName,
        index: IndexTuple,
        lower: f64,
        upper: f64,
        cost: f64,
    ) -> Result<Variable> {
        let column = self.problem.add_column(cost, lower..=upper);
        self.variables.insert(name, index, column, cost)
    }

    /// Add a binary variable, which is fixed to zero if `allowed` is false
    pub fn add_binary(
        &mut self,
        name: VariableName,
        index: IndexTuple,
        allowed: bool,
    ) -> Result<Variable> {
        let upper = if allowed { 1.0 } else { 0.0 };
        let column = if self.relax_binaries {
            self.problem.add_column(0.0, 0.0..=upper)
        } else {
            self.problem.add_integer_column(0.0, 0.0..=upper)
        };
        self.variables.insert(name, index, column, 0.0)
    }

    /// Get a previously added variable
    pub fn variable(&self, name: VariableName, index: &IndexTuple) -> Result<Variable> {
        self.variables
            .get(name, index)
            .with_context(|| format!("No variable {name} found at {index}"))
    }

    /// Get a previously added variable, if it exists
    pub fn find_variable(&self, name: VariableName, index: &IndexTuple) -> Option<Variable> {
        self.variables.get(name, index)
    }

    /// Add a constraint `lower <= sum of terms <= upper`.
    ///
    /// Terms for the same variable are merged and zero coefficients are dropped.
    pub fn add_constraint<I>(
        &mut self,
        name: ConstraintName,
        index: IndexTuple,
        lower: f64,
        upper: f64,
        terms: I,
    ) where
        I: IntoIterator<Item = (Variable, f64)>,
    {
        let mut merged: IndexMap<usize, (Variable, f64)> = IndexMap::new();
        for (var, coeff) in terms {
            merged
                .entry(var.position())
                .or_insert((var, 0.0))
                .1 += coeff;
        }

        self.problem.add_row(
            lower..=upper,
            merged
                .into_values()
                .filter(|(_, coeff)| *coeff != 0.0)
                .map(|(var, coeff)| (var.column(), coeff)),
        );
        self.constraints.push(name, index, lower, upper);
    }

    /// Add an equality constraint `sum of terms == rhs`
    pub fn add_equality<I>(&mut self, name: ConstraintName, index: IndexTuple, rhs: f64, terms: I)
    where
        I: IntoIterator<Item = (Variable, f64)>,
    {
        self.add_constraint(name, index, rhs, rhs, terms);
    }

    /// The variables added so far
    pub fn variables(&self) -> &VariablePool {
        &self.variables
    }

    /// The constraints added so far
    pub fn constraints(&self) -> &ConstraintRegistry {
        &self.constraints
    }
}

/// A fully assembled problem for one horizon step
#[derive(Debug)]
pub struct AssembledModel {
    /// The problem to pass to the solver
    pub problem: Problem,
    /// The variables of the problem
    pub variables: VariablePool,
    /// The constraints of the problem
    pub constraints: ConstraintRegistry,
    /// The sets the problem was built from
    pub sets: SetRegistry,
    /// The parameters the problem was built from
    pub parameters: ParameterStore,
}

/// Assemble the optimisation problem for a horizon step
pub fn construct(input: AssemblyInput, relax_binaries: bool) -> Result<AssembledModel> {
    let components = components();
    let mut ctx = ModelContext::new(input)?;

    for component in components {
        debug!("Declaring sets for {}", component.name());
        component.contributes_sets(&mut ctx)?;
    }
    for component in components {
        debug!("Declaring parameters for {}", component.name());
        component.contributes_parameters(&mut ctx)?;
    }

    let mut builder = ProblemBuilder::new(relax_binaries);
    for component in components {
        debug!("Declaring variables for {}", component.name());
        component.contributes_variables(&ctx, &mut builder)?;
    }
    for component in components {
        debug!("Declaring constraints for {}", component.name());
        component.contributes_constraints(&ctx, &mut builder)?;
    }

    debug!(
        "Assembled problem with {} variables and {} constraints",
        builder.variables.len(),
        builder.constraints.num_rows()
    );

    Ok(AssembledModel {
        problem: builder.problem,
        variables: builder.variables,
        constraints: builder.constraints,
        sets: ctx.sets,
        parameters: ctx.parameters,
    })
}

/// The solved values of a problem's variables and constraints
pub struct Solution {
    columns: Vec<f64>,
    rows: Vec<f64>,
    variables: VariablePool,
    constraints: ConstraintRegistry,
}

impl Solution {
    /// Combine the solver outcome with the variables and constraints it refers to
    pub fn new(
        outcome: SolveOutcome,
        variables: VariablePool,
        constraints: ConstraintRegistry,
    ) -> Self {
        Self {
            columns: outcome.columns,
            rows: outcome.rows,
            variables,
            constraints,
        }
    }

    /// The solved value of a variable, if it exists and has a value
    pub fn value(&self, name: VariableName, index: &IndexTuple) -> Option<f64> {
        let var = self.variables.get(name, index)?;
        self.column_value(var)
    }

    fn column_value(&self, var: Variable) -> Option<f64> {
        self.columns
            .get(var.position())
            .copied()
            .filter(|value| value.is_finite())
    }

    /// Iterate over the values of one variable family.
    ///
    /// The value is `None` for variables the solver did not report a value for.
    pub fn iter_values(
        &self,
        name: VariableName,
    ) -> impl Iterator<Item = (&IndexTuple, Option<f64>)> {
        self.variables
            .iter(name)
            .map(|(index, var)| (index, self.column_value(var)))
    }

    /// The variable families of the problem
    pub fn variable_names(&self) -> impl Iterator<Item = VariableName> + '_ {
        self.variables.names()
    }

    /// The value of the objective function
    pub fn objective_value(&self) -> f64 {
        self.variables
            .costs()
            .iter()
            .zip(&self.columns)
            .map(|(cost, value)| cost * value)
            .sum()
    }

    /// The constraint registry of the problem
    pub fn constraints(&self) -> &ConstraintRegistry {
        &self.constraints
    }

    /// Iterate over how far each constraint of a family is from its nearest bound.
    ///
    /// For a feasible solution every residual is (close to) zero for equality constraints and
    /// non-positive for inequalities.
    pub fn iter_residuals(&self, name: ConstraintName) -> impl Iterator<Item = (&IndexTuple, f64)> {
        self.constraints.rows(name).iter().map(|row| {
            let activity = self.rows.get(row.row).copied().unwrap_or(f64::NAN);
            let residual = if activity < row.lower {
                row.lower - activity
            } else if activity > row.upper {
                activity - row.upper
            } else if row.lower == row.upper {
                0.0
            } else {
                -(activity - row.lower).min(row.upper - activity)
            };
            (&row.index, residual)
        })
    }
}
