//! cf-materials: electrode and electrolyte property handling for cellflow.
//!
//! Provides:
//! - Declarative material specs (transport scalars + OCP tables)
//! - Compiled open-circuit potential interpolants
//! - Temperature resolution with Arrhenius corrections
//! - Butler-Volmer kinetics shared by both model fidelities
//! - A built-in catalog of reference chemistries
//!
//! # Architecture
//!
//! Specs are plain serde data; everything the solvers touch per step lives in
//! the resolved types, produced once per run. The `MaterialCatalog` trait
//! isolates design loading from where specs come from: the built-in
//! `ReferenceCatalog` today, project-local material libraries later.
//!
//! # Example
//!
//! ```no_run
//! use cf_materials::{MaterialCatalog, ReferenceCatalog, resolve, ResolvedMaterial};
//! use cf_core::units::k;
//!
//! let catalog = ReferenceCatalog;
//! let spec = catalog.get("nmc_111").unwrap();
//! let resolved = resolve(&spec, k(308.15)).unwrap();
//!
//! if let ResolvedMaterial::Electrode(cathode) = resolved {
//!     println!("U(0.5) = {} V", cathode.ocp.value(0.5));
//! }
//! ```

pub mod catalog;
pub mod error;
pub mod kinetics;
pub mod ocp;
pub mod resolve;
pub mod spec;

// Re-exports for ergonomics
pub use catalog::{
    CatalogEntry, MaterialCatalog, ReferenceCatalog, filter_reference_catalog, reference_catalog,
};
pub use error::{MaterialError, MaterialResult};
pub use kinetics::{SOC_EPS, butler_volmer, exchange_current_density, overpotential};
pub use ocp::OcpCurve;
pub use resolve::{
    ResolvedElectrode, ResolvedElectrolyte, ResolvedMaterial, ResolvedSeparator, arrhenius,
    resolve, resolve_electrode, resolve_electrolyte, resolve_separator,
};
pub use spec::{MaterialRole, MaterialSpec, OcpPoint};
