//! Run results: telemetry samples, spatial snapshots, and why a run ended.

use serde::{Deserialize, Serialize};

/// Why a run stopped.
///
/// Cutoffs and completed programs are ordinary outcomes; `is_failure`
/// separates them from runs that were cut short by step-control collapse,
/// budgets, or cancellation. Even failed runs keep their partial samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason")]
pub enum Termination {
    /// Reached the configured or derived time horizon.
    TimeLimit,
    /// Crossed a protocol voltage cutoff.
    VoltageCutoff,
    /// Constant-voltage hold current fell to the taper threshold.
    CurrentTaper,
    /// Every programmed segment ran to completion.
    ProtocolComplete,
    /// Crossed the protocol temperature cutoff.
    TemperatureCutoff,
    /// Step control collapsed below the minimum step width.
    Convergence { time_s: f64, dt_s: f64 },
    /// Wall-clock or step budget exhausted.
    Timeout { budget_s: f64, elapsed_s: f64 },
    /// Cancelled from outside.
    Cancelled,
}

impl Termination {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Termination::Convergence { .. } | Termination::Timeout { .. } | Termination::Cancelled
        )
    }

    /// Stable identifier for logs and result files.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Termination::TimeLimit => "time_limit",
            Termination::VoltageCutoff => "voltage_cutoff",
            Termination::CurrentTaper => "current_taper",
            Termination::ProtocolComplete => "protocol_complete",
            Termination::TemperatureCutoff => "temperature_cutoff",
            Termination::Convergence { .. } => "convergence",
            Termination::Timeout { .. } => "timeout",
            Termination::Cancelled => "cancelled",
        }
    }
}

/// One telemetry point on the accepted-step timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time_s: f64,
    /// Applied current, positive on discharge [A].
    pub current_a: f64,
    pub voltage_v: f64,
    /// Net discharged charge so far [Ah], negative while charging.
    pub capacity_ah: f64,
    /// Volume-mean occupancies of each electrode.
    pub anode_soc: f64,
    pub cathode_soc: f64,
}

/// Full spatial state at one instant. Models without x resolution skip
/// these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub time_s: f64,
    /// Node centroids from the cathode collector [m].
    pub x_m: Vec<f64>,
    pub ce_mol_m3: Vec<f64>,
    pub phie_v: Vec<f64>,
    /// `None` at separator nodes.
    pub phis_v: Vec<Option<f64>>,
    /// Particle surface occupancy, `None` at separator nodes.
    pub surface_soc: Vec<Option<f64>>,
}

/// Aggregate driver and corrector counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveStats {
    pub steps_accepted: usize,
    pub steps_rejected: usize,
    pub newton_iterations: usize,
    /// Concentration entries the corrector pulled back into range.
    pub clamped_entries: usize,
    pub wall_time_s: f64,
}

/// Everything a finished (or interrupted) run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub termination: Termination,
    pub samples: Vec<Sample>,
    pub profiles: Vec<ProfileSnapshot>,
    pub stats: SolveStats,
}

impl SimulationResult {
    pub fn final_sample(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Simulated span covered by the samples.
    pub fn duration_s(&self) -> f64 {
        self.samples.last().map(|s| s.time_s).unwrap_or(0.0)
    }

    /// Net discharged charge over the whole run [Ah].
    pub fn discharged_ah(&self) -> f64 {
        self.samples.last().map(|s| s.capacity_ah).unwrap_or(0.0)
    }
}
