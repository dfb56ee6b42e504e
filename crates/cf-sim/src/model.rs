//! CellModel trait for pluggable electrochemical models.

use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::result::ProfileSnapshot;

/// Model fidelity, chosen by dispatch and recorded with results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fidelity {
    /// Lumped single-particle model, no electrolyte dynamics.
    SingleParticle,
    /// Full pseudo-2D porous-electrode model.
    PseudoTwoDimensional,
}

impl Fidelity {
    /// Short identifier used on the command line and in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Fidelity::SingleParticle => "spm",
            Fidelity::PseudoTwoDimensional => "p2d",
        }
    }
}

/// Outcome of one attempted implicit step.
#[derive(Debug)]
pub enum StepOutcome {
    /// State advanced and committed.
    Accepted {
        iterations: usize,
        residual_norm: f64,
        clamped: usize,
    },
    /// Step refused; the committed state is unchanged and the driver
    /// should retry with a smaller dt.
    Rejected { why: String },
}

/// A cell model the protocol driver can march in time.
///
/// Implementations keep one committed state plus a single level of undo:
/// `try_step` commits on acceptance, `rollback` restores the state from
/// before the last accepted step. Fatal conditions are `Err`; anything
/// retryable is `Ok(Rejected)`.
pub trait CellModel {
    /// Attempts one implicit step of `dt_s` at the given applied current
    /// (positive discharges).
    fn try_step(&mut self, dt_s: f64, current_a: f64) -> SimResult<StepOutcome>;

    /// Restores the state committed before the last accepted step.
    fn rollback(&mut self);

    /// Terminal voltage of the committed state under the given current.
    fn voltage(&self, current_a: f64) -> f64;

    fn fidelity(&self) -> Fidelity;

    /// Current that moves the nominal capacity in one hour [A].
    fn current_1c_a(&self) -> f64;

    fn temperature_k(&self) -> f64;

    /// Volume-mean anode occupancy of the committed state.
    fn anode_soc(&self) -> f64;

    /// Volume-mean cathode occupancy of the committed state.
    fn cathode_soc(&self) -> f64;

    /// Spatial snapshot of the committed state; `None` for models without
    /// x resolution.
    fn profile_snapshot(&self, time_s: f64) -> Option<ProfileSnapshot>;
}
