//! Error type for the dispatch layer.

/// Wraps failures from the project, simulation, and storage layers behind
/// one interface, plus the dispatch-specific queue conditions.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Project error: {0}")]
    Project(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Run definition not found: {0}")]
    RunNotFound(String),

    #[error("Design not found: {0}")]
    DesignNotFound(String),

    #[error("Protocol not found: {0}")]
    ProtocolNotFound(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("Job queue is full ({capacity} waiting)")]
    QueueFull { capacity: usize },

    #[error("Worker pool is shut down")]
    WorkersStopped,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

impl From<cf_design::ProjectError> for DispatchError {
    fn from(err: cf_design::ProjectError) -> Self {
        DispatchError::Project(err.to_string())
    }
}

impl From<cf_design::ValidationError> for DispatchError {
    fn from(err: cf_design::ValidationError) -> Self {
        DispatchError::Validation(err.to_string())
    }
}

impl From<cf_sim::SimError> for DispatchError {
    fn from(err: cf_sim::SimError) -> Self {
        DispatchError::Simulation(err.to_string())
    }
}

impl From<cf_spm::SpmError> for DispatchError {
    fn from(err: cf_spm::SpmError) -> Self {
        DispatchError::Simulation(err.to_string())
    }
}

impl From<cf_results::ResultsError> for DispatchError {
    fn from(err: cf_results::ResultsError) -> Self {
        DispatchError::Results(err.to_string())
    }
}
