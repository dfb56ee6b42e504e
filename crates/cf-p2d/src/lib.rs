//! cf-p2d: pseudo-2D porous-electrode cell model.
//!
//! The model discretizes the cathode/separator/anode sandwich with finite
//! volumes and couples four fields per electrode node: solid lithium
//! concentration over radial particle shells, electrolyte concentration,
//! solid potential, and electrolyte potential. Charge and mass balances are
//! stepped with implicit Euler; this crate owns the residual and Jacobian
//! assembly, the corrector lives in `cf-solver`.
//!
//! ```no_run
//! use cf_core::units::k;
//! use cf_design::{DiscretizationConfig, reference::reference_cell};
//! use cf_p2d::P2dModel;
//!
//! # fn main() -> Result<(), cf_p2d::P2dError> {
//! let model = P2dModel::new(&reference_cell(), &DiscretizationConfig::default(), k(298.15))?;
//! let state = model.initial_state();
//! println!("OCV = {:.3} V", model.terminal_voltage(&state, 0.0));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod jacobian;
pub mod model;
pub mod residual;

pub use error::{AssemblyError, P2dError, P2dResult};
pub use jacobian::BlockTridiag;
pub use model::P2dModel;
pub use residual::StepContext;
