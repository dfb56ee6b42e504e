//! Schema migration framework.

use crate::ProjectError;
use crate::schema::CellProject;

pub const LATEST_VERSION: u32 = 1;

pub fn migrate_to_latest(mut project: CellProject) -> Result<CellProject, ProjectError> {
    while project.version < LATEST_VERSION {
        project = migrate_one_version(project)?;
    }
    Ok(project)
}

fn migrate_one_version(project: CellProject) -> Result<CellProject, ProjectError> {
    match project.version {
        0 => migrate_v0_to_v1(project),
        v => Err(ProjectError::Migration {
            what: format!("No migration path from version {}", v),
        }),
    }
}

/// Version 0 files predate explicit run temperatures and model overrides.
/// Both fields deserialize to their defaults, so only the version bumps.
fn migrate_v0_to_v1(mut project: CellProject) -> Result<CellProject, ProjectError> {
    project.version = 1;
    Ok(project)
}
