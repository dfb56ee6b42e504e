//! Built-in reference materials.
//!
//! A small, well-tested set of literature-plausible chemistries so projects
//! can reference materials by id instead of embedding full property tables.

use crate::error::{MaterialError, MaterialResult};
use crate::spec::{MaterialRole, MaterialSpec, OcpPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub canonical_id: &'static str,
    pub display_name: &'static str,
    pub role: MaterialRole,
    pub aliases: &'static [&'static str],
}

impl CatalogEntry {
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_ascii_lowercase();
        if query.is_empty() {
            return true;
        }

        self.canonical_id.to_ascii_lowercase().contains(&query)
            || self.display_name.to_ascii_lowercase().contains(&query)
            || self
                .aliases
                .iter()
                .any(|alias| alias.to_ascii_lowercase().contains(&query))
    }
}

const REFERENCE_CATALOG: [CatalogEntry; 4] = [
    CatalogEntry {
        canonical_id: "nmc_111",
        display_name: "NMC-111",
        role: MaterialRole::Cathode,
        aliases: &["nmc", "nickel manganese cobalt"],
    },
    CatalogEntry {
        canonical_id: "graphite",
        display_name: "Graphite (synthetic)",
        role: MaterialRole::Anode,
        aliases: &["c6", "synthetic graphite"],
    },
    CatalogEntry {
        canonical_id: "lipf6_ec_dmc",
        display_name: "LiPF6 in EC:DMC (1:1)",
        role: MaterialRole::Electrolyte,
        aliases: &["lipf6", "carbonate electrolyte"],
    },
    CatalogEntry {
        canonical_id: "separator_pe",
        display_name: "Polyethylene separator",
        role: MaterialRole::Separator,
        aliases: &["pe", "polyolefin"],
    },
];

pub fn reference_catalog() -> &'static [CatalogEntry] {
    &REFERENCE_CATALOG
}

pub fn filter_reference_catalog(query: &str) -> Vec<CatalogEntry> {
    reference_catalog()
        .iter()
        .copied()
        .filter(|entry| entry.matches_query(query))
        .collect()
}

/// Read-only source of material specs, injected wherever designs reference
/// materials by id.
pub trait MaterialCatalog {
    fn entries(&self) -> &'static [CatalogEntry];
    fn get(&self, id: &str) -> MaterialResult<MaterialSpec>;
}

/// The built-in catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceCatalog;

impl MaterialCatalog for ReferenceCatalog {
    fn entries(&self) -> &'static [CatalogEntry] {
        reference_catalog()
    }

    fn get(&self, id: &str) -> MaterialResult<MaterialSpec> {
        match id {
            "nmc_111" => Ok(nmc_111()),
            "graphite" => Ok(graphite()),
            "lipf6_ec_dmc" => Ok(lipf6_ec_dmc()),
            "separator_pe" => Ok(separator_pe()),
            _ => Err(MaterialError::UnknownMaterial { id: id.to_string() }),
        }
    }
}

fn ocp(points: &[(f64, f64)]) -> Vec<OcpPoint> {
    points
        .iter()
        .map(|&(soc, voltage_v)| OcpPoint { soc, voltage_v })
        .collect()
}

/// NMC-111 cathode, reference data at 298.15 K.
pub fn nmc_111() -> MaterialSpec {
    let mut spec = MaterialSpec::new("nmc_111", MaterialRole::Cathode);
    spec.c_s_max_mol_m3 = Some(49_000.0);
    spec.d_s_m2_s = Some(1.0e-13);
    spec.sigma_s_s_m = Some(10.0);
    spec.particle_radius_m = Some(5.0e-6);
    spec.i0_ref_a_m2 = Some(2.0);
    spec.alpha_a = Some(0.5);
    spec.alpha_c = Some(0.5);
    spec.soc_min = Some(0.25);
    spec.soc_max = Some(0.97);
    spec.activation_energy_j_mol = Some(30_000.0);
    spec.ocp = ocp(&[
        (0.20, 4.35),
        (0.30, 4.15),
        (0.40, 3.98),
        (0.50, 3.85),
        (0.60, 3.75),
        (0.70, 3.68),
        (0.80, 3.60),
        (0.90, 3.48),
        (0.95, 3.35),
        (0.96, 3.20),
        (0.98, 2.80),
        (1.00, 2.30),
    ]);
    spec
}

/// Synthetic graphite anode, reference data at 298.15 K.
pub fn graphite() -> MaterialSpec {
    let mut spec = MaterialSpec::new("graphite", MaterialRole::Anode);
    spec.c_s_max_mol_m3 = Some(31_000.0);
    spec.d_s_m2_s = Some(3.0e-14);
    spec.sigma_s_s_m = Some(100.0);
    spec.particle_radius_m = Some(6.0e-6);
    spec.i0_ref_a_m2 = Some(1.5);
    spec.alpha_a = Some(0.5);
    spec.alpha_c = Some(0.5);
    spec.soc_min = Some(0.05);
    spec.soc_max = Some(0.90);
    spec.activation_energy_j_mol = Some(35_000.0);
    spec.ocp = ocp(&[
        (0.00, 0.900),
        (0.01, 0.600),
        (0.02, 0.450),
        (0.05, 0.250),
        (0.10, 0.160),
        (0.15, 0.135),
        (0.20, 0.125),
        (0.30, 0.120),
        (0.40, 0.115),
        (0.50, 0.110),
        (0.60, 0.090),
        (0.70, 0.085),
        (0.85, 0.080),
        (0.95, 0.075),
        (1.00, 0.070),
    ]);
    spec
}

/// 1M LiPF6 in EC:DMC, reference data at 298.15 K.
pub fn lipf6_ec_dmc() -> MaterialSpec {
    let mut spec = MaterialSpec::new("lipf6_ec_dmc", MaterialRole::Electrolyte);
    spec.d_e_m2_s = Some(2.8e-10);
    spec.kappa_s_m = Some(1.0);
    spec.transference_number = Some(0.36);
    spec.c_e_init_mol_m3 = Some(1000.0);
    spec.activation_energy_j_mol = Some(17_000.0);
    spec
}

/// Polyethylene separator; porosity and thickness come from the design.
pub fn separator_pe() -> MaterialSpec {
    MaterialSpec::new("separator_pe", MaterialRole::Separator)
}
