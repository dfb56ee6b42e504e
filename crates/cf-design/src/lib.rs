//! cf-design: cell designs, operating protocols, and the project file format.

pub mod config;
pub mod design;
pub mod migrate;
pub mod protocol;
pub mod reference;
pub mod schema;
pub mod validate;

pub use config::{DiscretizationConfig, ProfileRecording};
pub use design::{
    CellDesign, ElectrodeDesign, SeparatorDesign, electrode_capacity_ah_per_m2,
    nominal_capacity_ah, np_capacity_ratio,
};
pub use migrate::{LATEST_VERSION, migrate_to_latest};
pub use protocol::{Cutoffs, OperatingProtocol, ProtocolMode, PulseSegment};
pub use schema::*;
pub use validate::{ValidationError, validate_design, validate_project};

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Migration error: {what}")]
    Migration { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_yaml(path: &std::path::Path) -> ProjectResult<CellProject> {
    let content = std::fs::read_to_string(path)?;
    let mut project: CellProject = serde_yaml::from_str(&content)?;
    project = migrate_to_latest(project)?;
    validate_project(&project)?;
    Ok(project)
}

pub fn save_yaml(path: &std::path::Path, project: &CellProject) -> ProjectResult<()> {
    validate_project(project)?;
    let content = serde_yaml::to_string(project)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &std::path::Path) -> ProjectResult<CellProject> {
    let content = std::fs::read_to_string(path)?;
    let mut project: CellProject = serde_json::from_str(&content)?;
    project = migrate_to_latest(project)?;
    validate_project(&project)?;
    Ok(project)
}

pub fn save_json(path: &std::path::Path, project: &CellProject) -> ProjectResult<()> {
    validate_project(project)?;
    let content = serde_json::to_string_pretty(project)?;
    std::fs::write(path, content)?;
    Ok(())
}
