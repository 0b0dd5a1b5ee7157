//! The boundary to the HiGHS solver.
use crate::log::is_logging_disabled_by_env;
use crate::model::{SolverMode, SolverParameters};
use highs::{HighsModelStatus, RowProblem as Problem, Sense};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome of a solve, as reported by the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem has no feasible solution
    Infeasible,
    /// The objective is unbounded
    Unbounded,
    /// The solver failed or stopped before reaching optimality
    Error,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Optimal => "optimal",
            Self::Infeasible => "infeasible",
            Self::Unbounded => "unbounded",
            Self::Error => "error",
        };
        write!(f, "{name}")
    }
}

impl From<HighsModelStatus> for SolveStatus {
    fn from(status: HighsModelStatus) -> Self {
        match status {
            HighsModelStatus::Optimal => Self::Optimal,
            // HiGHS's presolve cannot always tell these apart; neither has a usable solution
            HighsModelStatus::Infeasible | HighsModelStatus::UnboundedOrInfeasible => {
                Self::Infeasible
            }
            HighsModelStatus::Unbounded => Self::Unbounded,
            _ => Self::Error,
        }
    }
}

/// The result of solving a problem
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    /// The solver status
    pub status: SolveStatus,
    /// The value of each column, empty unless the status is optimal
    pub columns: Vec<f64>,
    /// The activity of each row, empty unless the status is optimal
    pub rows: Vec<f64>,
}

impl SolveOutcome {
    fn failed(status: SolveStatus) -> Self {
        Self {
            status,
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }
}

/// Whether binary variables should be relaxed to continuous ones
pub fn relax_binaries(options: &SolverParameters) -> bool {
    options.mode == SolverMode::Lp
}

/// Solve a minimisation problem.
///
/// # Arguments
///
/// * `problem` - The problem to solve
/// * `options` - Gap tolerance, time limit and verbosity
pub fn solve(problem: Problem, options: &SolverParameters) -> SolveOutcome {
    let mut model = problem.optimise(Sense::Minimise);
    if options.verbose && !is_logging_disabled_by_env() {
        model.set_option("log_to_console", true);
        model.set_option("output_flag", true);
    }
    if options.mode == SolverMode::Milp {
        model.set_option("mip_rel_gap", options.mip_gap);
    }
    if let Some(time_limit) = options.time_limit {
        model.set_option("time_limit", time_limit);
    }

    let solved = match model.try_solve() {
        Ok(solved) => solved,
        Err(status) => {
            warn!("HiGHS failed to run: {status:?}");
            return SolveOutcome::failed(SolveStatus::Error);
        }
    };

    let highs_status = solved.status();
    debug!("HiGHS finished with model status {highs_status:?}");
    let status = SolveStatus::from(highs_status);
    if status != SolveStatus::Optimal {
        return SolveOutcome::failed(status);
    }

    let solution = solved.get_solution();
    SolveOutcome {
        status,
        columns: solution.columns().to_vec(),
        rows: solution.rows().to_vec(),
    }
}
