//! Stored run metadata.

use cf_design::{DiscretizationConfig, OperatingProtocol};
use cf_sim::{Fidelity, SolveStats, Termination};
use serde::{Deserialize, Serialize};

pub type RunId = String;

/// Everything needed to interpret a stored run without re-loading the
/// project: the inputs that produced it and how it ended. Telemetry and
/// profiles live in sibling `.jsonl` files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub design_id: String,
    /// RFC 3339 creation time.
    pub created_at: String,
    pub model: Fidelity,
    pub temperature_k: f64,
    pub protocol: OperatingProtocol,
    pub config: DiscretizationConfig,
    pub termination: Termination,
    pub stats: SolveStats,
    pub solver_version: String,
}
