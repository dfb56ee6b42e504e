//! Error types for the implicit step corrector.

use cf_p2d::AssemblyError;
use thiserror::Error;

/// Errors that can occur while correcting one time step.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Convergence failed: {what}")]
    ConvergenceFailed { what: String },

    #[error("Linear solve failed: singular block at node {node}")]
    LinearSolve { node: usize },

    #[error("Non-finite value: {what}")]
    NonFinite { what: String },

    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),
}

pub type SolverResult<T> = Result<T, SolverError>;

impl SolverError {
    /// Whether the time-step driver should retry with a smaller step.
    /// Convergence trouble and non-physical trials shrink and retry;
    /// anything else aborts the run.
    pub fn is_step_rejection(&self) -> bool {
        matches!(
            self,
            SolverError::ConvergenceFailed { .. }
                | SolverError::LinearSolve { .. }
                | SolverError::Assembly(_)
        )
    }
}
