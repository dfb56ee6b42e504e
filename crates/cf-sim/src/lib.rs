//! cf-sim: protocol execution over battery cell models.
//!
//! This crate turns a cell model into a simulation run:
//!
//! - [`CellModel`] is the seam between the driver and a specific physics
//!   fidelity; `cf-p2d` plugs in through [`P2dCell`].
//! - [`run_protocol`] integrates a full operating protocol (constant
//!   current, CC-CV with taper, pulse trains) with adaptive step control,
//!   voltage and temperature cutoffs, and sample recording.
//! - [`run_protocol_with_controls`] adds wall-clock budgets, cooperative
//!   cancellation, and per-step progress callbacks for long runs.
//!
//! Physically-expected endings (cutoffs, completed programs) and numerical
//! ones (step collapse, budgets) are both reported as a [`Termination`] on
//! an `Ok` result; `Err` is reserved for setup mistakes and fatal solver
//! failures.

pub mod cancel;
pub mod driver;
pub mod error;
pub mod model;
pub mod p2d_cell;
pub mod result;

pub use cancel::CancelToken;
pub use driver::{ProgressEvent, RunBudget, RunControls, run_protocol, run_protocol_with_controls};
pub use error::{SimError, SimResult};
pub use model::{CellModel, Fidelity, StepOutcome};
pub use p2d_cell::P2dCell;
pub use result::{ProfileSnapshot, Sample, SimulationResult, SolveStats, Termination};
