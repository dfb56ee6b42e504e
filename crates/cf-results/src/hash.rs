//! Content-based hashing for run IDs.

use cf_design::{CellDesign, DiscretizationConfig, OperatingProtocol};
use cf_sim::Fidelity;
use sha2::{Digest, Sha256};

/// Digest of everything that determines a run's output. Two requests with
/// the same id may share a stored result; any change to the design, the
/// program, the discretization, the model fidelity, the temperature, or
/// the solver itself produces a fresh id.
pub fn compute_run_id(
    design: &CellDesign,
    protocol: &OperatingProtocol,
    config: &DiscretizationConfig,
    model: Fidelity,
    temperature_k: f64,
    solver_version: &str,
) -> String {
    let mut hasher = Sha256::new();

    let design_json = serde_json::to_string(design).unwrap_or_default();
    hasher.update(design_json.as_bytes());

    let protocol_json = serde_json::to_string(protocol).unwrap_or_default();
    hasher.update(protocol_json.as_bytes());

    let config_json = serde_json::to_string(config).unwrap_or_default();
    hasher.update(config_json.as_bytes());

    let model_json = serde_json::to_string(&model).unwrap_or_default();
    hasher.update(model_json.as_bytes());

    hasher.update(temperature_k.to_le_bytes());
    hasher.update(solver_version.as_bytes());

    let result = hasher.finalize();
    format!("{:x}", result)
}
