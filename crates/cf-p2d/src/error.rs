//! Error types for model assembly and residual evaluation.

use thiserror::Error;

/// Model construction failures. All of these fire before stepping begins.
#[derive(Error, Debug)]
pub enum P2dError {
    #[error("Material error: {0}")]
    Material(#[from] cf_materials::MaterialError),

    #[error("Mesh error: {0}")]
    Mesh(#[from] cf_mesh::MeshError),

    #[error("Design error: {0}")]
    Design(#[from] cf_design::ValidationError),
}

/// A trial state the residual cannot be evaluated at. The corrector treats
/// this as grounds for rejecting the step, not as a crash.
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Non-physical state at node {node}: {what} = {value}")]
    NonPhysical {
        node: usize,
        what: &'static str,
        value: f64,
    },
}

pub type P2dResult<T> = Result<T, P2dError>;
