//! Error types for protocol simulation.

use thiserror::Error;

/// Errors that abort a run outright.
///
/// Most runtime trouble is not an error here: convergence collapse,
/// budgets, and cancellation all end the run with a
/// [`Termination`](crate::result::Termination) and partial results.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Model error: {0}")]
    Model(#[from] cf_p2d::P2dError),

    #[error("Solver error: {0}")]
    Solver(#[from] cf_solver::SolverError),
}

pub type SimResult<T> = Result<T, SimError>;
