//! Built-in reference cell.
//!
//! A single-layer NMC-111 | graphite pouch cell with a carbonate
//! electrolyte, sized so that the cathode limits capacity at roughly
//! 3.9 Ah with a few percent of anode excess. Tests and demos lean on it,
//! and `cf-cli` seeds new projects from it.

use crate::config::DiscretizationConfig;
use crate::design::{CellDesign, ElectrodeDesign, SeparatorDesign};
use crate::protocol::{OperatingProtocol, ProtocolMode};
use crate::schema::{
    CellDesignDef, CellProject, ElectrodeDef, MaterialRefDef, ProtocolDef, RunDef,
    SeparatorLayerDef,
};
use cf_materials::catalog::{graphite, lipf6_ec_dmc, nmc_111, separator_pe};

pub fn reference_cell() -> CellDesign {
    reference_cell_at_soc(1.0)
}

pub fn reference_cell_at_soc(initial_soc: f64) -> CellDesign {
    CellDesign {
        id: "reference_nmc_graphite".to_string(),
        name: "Reference NMC-111 | graphite pouch layer".to_string(),
        cathode: ElectrodeDesign {
            material: nmc_111(),
            thickness_m: 75e-6,
            porosity: 0.30,
            active_volume_fraction: 0.55,
            particle_radius_m: None,
        },
        separator: SeparatorDesign {
            material: separator_pe(),
            thickness_m: 25e-6,
            porosity: 0.45,
        },
        anode: ElectrodeDesign {
            material: graphite(),
            thickness_m: 100e-6,
            porosity: 0.33,
            active_volume_fraction: 0.58,
            particle_radius_m: None,
        },
        electrolyte: lipf6_ec_dmc(),
        area_m2: 0.1,
        layer_count: 1,
        initial_soc,
    }
}

/// Constant-current discharge down to a 2.5 V floor.
pub fn discharge_to_cutoff(rate_c: f64) -> OperatingProtocol {
    OperatingProtocol::constant_current(rate_c).with_voltage_min(2.5)
}

/// 1C charge holding 4.1 V, tapering to C/20, with a 4.3 V safety cutoff.
pub fn cccv_charge() -> OperatingProtocol {
    OperatingProtocol::cccv(-1.0, 4.1, 0.05).with_voltage_max(4.3)
}

/// A complete project exercising the reference cell: one design, discharge
/// and charge protocols, and a baseline run.
pub fn reference_project() -> CellProject {
    let mut project = CellProject::new("Reference cell studies");

    project.designs.push(CellDesignDef {
        id: "reference_nmc_graphite".to_string(),
        name: "Reference NMC-111 | graphite pouch layer".to_string(),
        cathode: ElectrodeDef {
            material: MaterialRefDef::Catalog {
                id: "nmc_111".to_string(),
            },
            thickness_m: 75e-6,
            porosity: 0.30,
            active_volume_fraction: 0.55,
            particle_radius_m: None,
        },
        separator: SeparatorLayerDef {
            material: MaterialRefDef::Catalog {
                id: "separator_pe".to_string(),
            },
            thickness_m: 25e-6,
            porosity: 0.45,
        },
        anode: ElectrodeDef {
            material: MaterialRefDef::Catalog {
                id: "graphite".to_string(),
            },
            thickness_m: 100e-6,
            porosity: 0.33,
            active_volume_fraction: 0.58,
            particle_radius_m: None,
        },
        electrolyte: MaterialRefDef::Catalog {
            id: "lipf6_ec_dmc".to_string(),
        },
        area_m2: 0.1,
        layer_count: 1,
        initial_soc: 1.0,
    });

    let discharge = discharge_to_cutoff(1.0);
    project.protocols.push(ProtocolDef {
        id: "discharge_1c".to_string(),
        mode: discharge.mode,
        cutoffs: discharge.cutoffs,
    });

    let charge = cccv_charge();
    project.protocols.push(ProtocolDef {
        id: "cccv_charge_1c".to_string(),
        mode: charge.mode,
        cutoffs: charge.cutoffs,
    });

    project.runs.push(RunDef {
        name: "baseline_discharge".to_string(),
        design_id: "reference_nmc_graphite".to_string(),
        protocol_id: "discharge_1c".to_string(),
        config: DiscretizationConfig::default(),
        model: None,
        temperature_k: cf_core::constants::T_REF_K,
    });

    project
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CellDesignDef;
    use cf_materials::ReferenceCatalog;

    #[test]
    fn reference_project_design_matches_runtime_cell() {
        let project = reference_project();
        let def: &CellDesignDef = project.design("reference_nmc_graphite").unwrap();
        let resolved = def.resolve(&ReferenceCatalog).unwrap();
        assert_eq!(resolved, reference_cell());
    }

    #[test]
    fn discharge_protocol_carries_floor() {
        let protocol = discharge_to_cutoff(0.5);
        assert_eq!(protocol.cutoffs.voltage_min_v, Some(2.5));
        match protocol.mode {
            ProtocolMode::ConstantCurrent { rate_c } => assert_eq!(rate_c, 0.5),
            other => panic!("unexpected mode: {other:?}"),
        }
    }

    #[test]
    fn cccv_charge_is_negative_rate() {
        match cccv_charge().mode {
            ProtocolMode::ConstantCurrentConstantVoltage { rate_c, .. } => {
                assert!(rate_c < 0.0);
            }
            other => panic!("unexpected mode: {other:?}"),
        }
    }
}
