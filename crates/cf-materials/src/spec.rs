//! Declarative material descriptions.
//!
//! A [`MaterialSpec`] is plain data: reference-temperature transport and
//! kinetic scalars plus an open-circuit potential table. Which scalars are
//! required depends on the [`MaterialRole`]; the resolver enforces that.

use serde::{Deserialize, Serialize};

/// Slot a material occupies in a cell design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialRole {
    Cathode,
    Anode,
    Electrolyte,
    Separator,
}

impl MaterialRole {
    pub fn is_electrode(self) -> bool {
        matches!(self, MaterialRole::Cathode | MaterialRole::Anode)
    }
}

/// One sample of an open-circuit potential curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OcpPoint {
    pub soc: f64,
    pub voltage_v: f64,
}

/// Reference-temperature material data.
///
/// All scalar fields are optional at the serde level; the resolver rejects
/// specs that omit a property their role requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub id: String,
    pub role: MaterialRole,

    // Electrode properties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_s_max_mol_m3: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d_s_m2_s: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigma_s_s_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub particle_radius_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i0_ref_a_m2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha_a: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha_c: Option<f64>,
    /// Stoichiometry at 0% cell state of charge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soc_min: Option<f64>,
    /// Stoichiometry at 100% cell state of charge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soc_max: Option<f64>,

    // Electrolyte properties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d_e_m2_s: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kappa_s_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transference_number: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_e_init_mol_m3: Option<f64>,

    /// Arrhenius activation energy applied to transport and kinetic
    /// prefactors. Zero means no temperature correction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_energy_j_mol: Option<f64>,

    /// Open-circuit potential vs. stoichiometry (electrodes only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ocp: Vec<OcpPoint>,
}

impl MaterialSpec {
    /// Empty spec for the given slot; fill fields before resolving.
    pub fn new(id: impl Into<String>, role: MaterialRole) -> Self {
        Self {
            id: id.into(),
            role,
            c_s_max_mol_m3: None,
            d_s_m2_s: None,
            sigma_s_s_m: None,
            particle_radius_m: None,
            i0_ref_a_m2: None,
            alpha_a: None,
            alpha_c: None,
            soc_min: None,
            soc_max: None,
            d_e_m2_s: None,
            kappa_s_m: None,
            transference_number: None,
            c_e_init_mol_m3: None,
            activation_energy_j_mol: None,
            ocp: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_json_round_trip() {
        let mut spec = MaterialSpec::new("test_cathode", MaterialRole::Cathode);
        spec.c_s_max_mol_m3 = Some(49_000.0);
        spec.ocp = vec![
            OcpPoint {
                soc: 0.0,
                voltage_v: 4.3,
            },
            OcpPoint {
                soc: 1.0,
                voltage_v: 3.0,
            },
        ];

        let json = serde_json::to_string(&spec).unwrap();
        let back: MaterialSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }

    #[test]
    fn omitted_fields_stay_none() {
        let json = r#"{"id":"sep","role":"Separator"}"#;
        let spec: MaterialSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.role, MaterialRole::Separator);
        assert!(spec.d_s_m2_s.is_none());
        assert!(spec.ocp.is_empty());
    }
}
