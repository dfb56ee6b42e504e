//! Wire types for the dispatch service.
//!
//! A request serializes losslessly, so the physics it describes is
//! byte-identical whether it runs inline, on a pooled worker, or lands in
//! a result cache on the way.

use cf_design::{CellDesign, DiscretizationConfig, OperatingProtocol};
use cf_sim::{Fidelity, SimulationResult};
use serde::{Deserialize, Serialize};

use crate::classify::{self, ExecutionClass};

/// Everything a backend needs to produce a result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveRequest {
    pub design: CellDesign,
    pub protocol: OperatingProtocol,
    #[serde(default)]
    pub config: DiscretizationConfig,
    /// Explicit fidelity; when absent the dispatcher picks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Fidelity>,
    #[serde(default = "default_temperature_k")]
    pub temperature_k: f64,
}

fn default_temperature_k() -> f64 {
    cf_core::constants::T_REF_K
}

impl SolveRequest {
    pub fn new(design: CellDesign, protocol: OperatingProtocol) -> Self {
        Self {
            design,
            protocol,
            config: DiscretizationConfig::default(),
            model: None,
            temperature_k: cf_core::constants::T_REF_K,
        }
    }

    /// Fidelity this request will run at.
    pub fn fidelity(&self) -> Fidelity {
        classify::select_model(&self.design, &self.protocol, self.model)
    }

    pub fn class(&self) -> ExecutionClass {
        classify::classify(&self.design, &self.protocol, &self.config)
    }

    /// Cache key for this request under the given solver version.
    pub fn run_id(&self, solver_version: &str) -> String {
        cf_results::compute_run_id(
            &self.design,
            &self.protocol,
            &self.config,
            self.fidelity(),
            self.temperature_k,
            solver_version,
        )
    }
}

/// A finished solve, paired with how it was routed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResponse {
    pub run_id: String,
    /// Fidelity that actually ran.
    pub model: Fidelity,
    pub class: ExecutionClass,
    pub result: SimulationResult,
}
