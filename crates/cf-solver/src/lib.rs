//! cf-solver: implicit-step correction for cell models.
//!
//! `cf-p2d` assembles the residual and block-tridiagonal Jacobian of one
//! backward-Euler step; this crate owns the damped Newton iteration and the
//! block Thomas factorization that solves it. Step-size policy lives a
//! level up, in `cf-sim`: this crate only reports whether a step converged
//! and what it cost.

pub mod error;
pub mod linear;
pub mod newton;

pub use error::{SolverError, SolverResult};
pub use linear::BlockTridiagLu;
pub use newton::{NewtonConfig, StepReport, solve_step};
