//! Discretization and stepping configuration.

use serde::{Deserialize, Serialize};

/// When to capture full spatial profiles alongside cell-level telemetry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum ProfileRecording {
    #[default]
    Off,
    /// Every N-th accepted step.
    Every { steps: usize },
    /// The first accepted step at or after each listed time.
    AtTimes { times_s: Vec<f64> },
}

/// Mesh resolution, time-step policy, and solver tolerances.
///
/// Defaults are sized for routine engineering studies: a 20-node cell with
/// 10 radial shells resolves 1C behavior to well under a percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscretizationConfig {
    /// Nodes across cathode + separator + anode.
    #[serde(default = "default_n_x")]
    pub n_x: usize,
    /// Radial shells per electrode particle.
    #[serde(default = "default_n_r")]
    pub n_r: usize,

    #[serde(default = "default_dt_init_s")]
    pub dt_init_s: f64,
    #[serde(default = "default_dt_min_s")]
    pub dt_min_s: f64,
    #[serde(default = "default_dt_max_s")]
    pub dt_max_s: f64,

    /// Residual infinity-norm target for Newton convergence.
    #[serde(default = "default_abs_tol")]
    pub abs_tol: f64,
    /// Relative update-norm target for Newton convergence.
    #[serde(default = "default_rel_tol")]
    pub rel_tol: f64,
    #[serde(default = "default_max_newton_iters")]
    pub max_newton_iters: usize,

    /// Simulated-time horizon; `None` derives one from the protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t_end_s: Option<f64>,

    /// Keep every N-th accepted sample (the final sample is always kept).
    #[serde(default = "default_record_every")]
    pub record_every: usize,

    #[serde(default)]
    pub profiles: ProfileRecording,
}

fn default_n_x() -> usize {
    20
}
fn default_n_r() -> usize {
    10
}
fn default_dt_init_s() -> f64 {
    1.0
}
fn default_dt_min_s() -> f64 {
    1e-3
}
fn default_dt_max_s() -> f64 {
    30.0
}
fn default_abs_tol() -> f64 {
    1e-6
}
fn default_rel_tol() -> f64 {
    1e-3
}
fn default_max_newton_iters() -> usize {
    50
}
fn default_record_every() -> usize {
    1
}

impl Default for DiscretizationConfig {
    fn default() -> Self {
        Self {
            n_x: default_n_x(),
            n_r: default_n_r(),
            dt_init_s: default_dt_init_s(),
            dt_min_s: default_dt_min_s(),
            dt_max_s: default_dt_max_s(),
            abs_tol: default_abs_tol(),
            rel_tol: default_rel_tol(),
            max_newton_iters: default_max_newton_iters(),
            t_end_s: None,
            record_every: default_record_every(),
            profiles: ProfileRecording::default(),
        }
    }
}

impl DiscretizationConfig {
    /// Coarser resolution for screening sweeps.
    pub fn coarse() -> Self {
        Self {
            n_x: 12,
            n_r: 6,
            ..Self::default()
        }
    }
}
