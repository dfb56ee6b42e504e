//! Runtime cell designs.
//!
//! A [`CellDesign`] is fully self-contained: material references from the
//! project schema have already been replaced by concrete specs, so models
//! and the run cache can consume it without a catalog in hand.

use crate::validate::ValidationError;
use cf_core::constants::FARADAY_C_PER_MOL;
use cf_materials::MaterialSpec;
use serde::{Deserialize, Serialize};

/// One porous electrode layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectrodeDesign {
    pub material: MaterialSpec,
    pub thickness_m: f64,
    /// Electrolyte-filled void fraction.
    pub porosity: f64,
    /// Active-material volume fraction.
    pub active_volume_fraction: f64,
    /// Overrides the material's particle radius when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub particle_radius_m: Option<f64>,
}

/// The inert separator layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeparatorDesign {
    pub material: MaterialSpec,
    pub thickness_m: f64,
    pub porosity: f64,
}

/// Complete sandwich geometry plus materials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellDesign {
    pub id: String,
    pub name: String,
    pub cathode: ElectrodeDesign,
    pub separator: SeparatorDesign,
    pub anode: ElectrodeDesign,
    pub electrolyte: MaterialSpec,
    /// Single-layer electrode area.
    pub area_m2: f64,
    /// Parallel layers in the stack; scales area and current.
    pub layer_count: u32,
    /// Cell state of charge at the start of the run, 0..=1.
    pub initial_soc: f64,
}

impl CellDesign {
    pub fn effective_area_m2(&self) -> f64 {
        self.area_m2 * f64::from(self.layer_count)
    }
}

/// Areal capacity of one electrode over its stoichiometry window [Ah/m^2].
pub fn electrode_capacity_ah_per_m2(electrode: &ElectrodeDesign) -> Result<f64, ValidationError> {
    let spec = &electrode.material;
    let cs_max = spec.c_s_max_mol_m3.ok_or_else(|| ValidationError::InvalidValue {
        field: format!("{}.c_s_max_mol_m3", spec.id),
        value: "missing".to_string(),
        reason: "required to compute electrode capacity".to_string(),
    })?;
    let soc_min = spec.soc_min.unwrap_or(0.0);
    let soc_max = spec.soc_max.unwrap_or(1.0);

    let loading_mol_m2 = electrode.active_volume_fraction * electrode.thickness_m * cs_max;
    Ok(FARADAY_C_PER_MOL * loading_mol_m2 * (soc_max - soc_min) / 3600.0)
}

/// Negative-to-positive capacity ratio. Healthy designs sit a few percent
/// above 1; the ratio is reported, never enforced.
pub fn np_capacity_ratio(design: &CellDesign) -> Result<f64, ValidationError> {
    let q_pos = electrode_capacity_ah_per_m2(&design.cathode)?;
    let q_neg = electrode_capacity_ah_per_m2(&design.anode)?;
    Ok(q_neg / q_pos)
}

/// Nominal cell capacity: the limiting electrode over the full stack [Ah].
pub fn nominal_capacity_ah(design: &CellDesign) -> Result<f64, ValidationError> {
    let q_pos = electrode_capacity_ah_per_m2(&design.cathode)?;
    let q_neg = electrode_capacity_ah_per_m2(&design.anode)?;
    Ok(q_pos.min(q_neg) * design.effective_area_m2())
}
