//! cf-core: stable foundation for cellflow.
//!
//! Contains:
//! - units (uom SI types + constructors, electrochemical constants)
//! - numeric (tolerances + float helpers)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CfError, CfResult};
pub use numeric::*;
pub use units::*;
