//! cf-dispatch: execution routing, run caching, and solve backends.
//!
//! Sits between the project layer and the solvers. A [`SolveRequest`]
//! names a design, a protocol, and a discretization; this crate decides
//! which fidelity runs it ([`select_model`]), where it executes
//! ([`classify`]), and whether a stored result can answer it instead
//! ([`ensure_run`]).

pub mod backend;
pub mod classify;
pub mod error;
pub mod pool;
pub mod request;
pub mod service;

pub use backend::{LocalBackend, SolveBackend};
pub use classify::{ExecutionClass, classify, fidelity_from_choice, select_model};
pub use error::{DispatchError, DispatchResult};
pub use pool::{JobHandle, PooledBackend};
pub use request::{SolveRequest, SolveResponse};
pub use service::{
    RunOptions, RunRequest, RunResponse, SOLVER_VERSION, ensure_run, ensure_run_on,
    ensure_run_with_progress, execute, execute_with_controls, list_runs, load_run, run_sweep,
    solve_request_for,
};
