//! cf-spm: reduced-order single-particle cell model.
//!
//! A spectral two-particle model that plugs into the same protocol driver
//! as the full porous-electrode model, through [`cf_sim::CellModel`]. It
//! shares the material resolution and Butler-Volmer kinetics of the full
//! model but carries no electrolyte dynamics, so a step is a handful of
//! scalar updates instead of a Newton solve. Dispatch picks it for gentle
//! single-layer duty where the fidelity gap stays small.

pub mod cell;
pub mod error;
pub mod model;
pub mod particle;

pub use cell::SpmCell;
pub use error::{SpmError, SpmResult};
pub use model::{SpmModel, SpmState};
pub use particle::{ParticleDiffusion, ParticleState};
