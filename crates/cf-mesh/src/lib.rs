//! cf-mesh: discretization layer for cellflow.
//!
//! Provides:
//! - Finite-volume x mesh across cathode, separator, and anode
//! - Radial shell meshes for the representative particles
//! - Packed state layout with precomputed per-node offsets
//!
//! # Example
//!
//! ```
//! use cf_design::reference::reference_cell;
//! use cf_design::DiscretizationConfig;
//! use cf_mesh::{Mesh, StateLayout};
//!
//! let mesh = Mesh::build(&reference_cell(), &DiscretizationConfig::default()).unwrap();
//! let layout = StateLayout::new(&mesh);
//! assert_eq!(layout.n_nodes(), mesh.n_nodes());
//! ```

pub mod error;
pub mod layout;
pub mod mesh;

// Re-exports for ergonomics
pub use error::{MeshError, MeshResult};
pub use layout::StateLayout;
pub use mesh::{Mesh, MeshNode, RadialMesh, Region};
