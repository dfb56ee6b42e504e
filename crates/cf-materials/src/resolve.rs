//! Temperature resolution of material specs.
//!
//! A [`MaterialSpec`] holds reference-temperature data; resolving it against
//! an operating temperature produces a compact bundle of corrected scalars
//! and a compiled OCP interpolant, ready for the assemblers. Resolution
//! happens once per run, so the hot loops never touch spec-level options.

use crate::error::{MaterialError, MaterialResult};
use crate::ocp::OcpCurve;
use crate::spec::{MaterialRole, MaterialSpec};
use cf_core::constants::{GAS_CONSTANT_J_PER_MOL_K, T_REF_K};
use cf_core::units::Temperature;
use uom::si::thermodynamic_temperature::kelvin;

/// Arrhenius correction of a reference-temperature property:
/// `p(T) = p_ref * exp(-Ea/R * (1/T - 1/T_ref))`.
pub fn arrhenius(p_ref: f64, ea_j_mol: f64, t_k: f64, t_ref_k: f64) -> f64 {
    p_ref * (-(ea_j_mol / GAS_CONSTANT_J_PER_MOL_K) * (1.0 / t_k - 1.0 / t_ref_k)).exp()
}

/// Electrode material with temperature corrections applied.
#[derive(Debug, Clone)]
pub struct ResolvedElectrode {
    pub id: String,
    pub cs_max_mol_m3: f64,
    pub d_s_m2_s: f64,
    pub sigma_s_s_m: f64,
    pub particle_radius_m: f64,
    pub i0_ref_a_m2: f64,
    pub alpha_a: f64,
    pub alpha_c: f64,
    pub soc_min: f64,
    pub soc_max: f64,
    pub ocp: OcpCurve,
}

/// Electrolyte with temperature corrections applied.
#[derive(Debug, Clone)]
pub struct ResolvedElectrolyte {
    pub id: String,
    pub d_e_m2_s: f64,
    pub kappa_s_m: f64,
    pub t_plus: f64,
    pub c_init_mol_m3: f64,
}

/// Separator carries no transport data of its own; porosity and thickness
/// live in the cell design.
#[derive(Debug, Clone)]
pub struct ResolvedSeparator {
    pub id: String,
}

/// A spec resolved against an operating temperature.
#[derive(Debug, Clone)]
pub enum ResolvedMaterial {
    Electrode(ResolvedElectrode),
    Electrolyte(ResolvedElectrolyte),
    Separator(ResolvedSeparator),
}

/// Resolve a spec at the given temperature, dispatching on its role.
pub fn resolve(spec: &MaterialSpec, temperature: Temperature) -> MaterialResult<ResolvedMaterial> {
    match spec.role {
        MaterialRole::Cathode | MaterialRole::Anode => {
            Ok(ResolvedMaterial::Electrode(resolve_electrode(
                spec,
                temperature,
                spec.role,
            )?))
        }
        MaterialRole::Electrolyte => Ok(ResolvedMaterial::Electrolyte(resolve_electrolyte(
            spec,
            temperature,
        )?)),
        MaterialRole::Separator => Ok(ResolvedMaterial::Separator(resolve_separator(spec)?)),
    }
}

pub fn resolve_electrode(
    spec: &MaterialSpec,
    temperature: Temperature,
    expected: MaterialRole,
) -> MaterialResult<ResolvedElectrode> {
    check_role(spec, expected)?;
    let t_k = temperature.get::<kelvin>();
    let ea = spec.activation_energy_j_mol.unwrap_or(0.0);

    let cs_max = require_positive(spec, spec.c_s_max_mol_m3, "c_s_max_mol_m3")?;
    let d_s = require_positive(spec, spec.d_s_m2_s, "d_s_m2_s")?;
    let sigma_s = require_positive(spec, spec.sigma_s_s_m, "sigma_s_s_m")?;
    let radius = require_positive(spec, spec.particle_radius_m, "particle_radius_m")?;
    let i0_ref = require_positive(spec, spec.i0_ref_a_m2, "i0_ref_a_m2")?;
    let alpha_a = require_fraction(spec, spec.alpha_a, "alpha_a")?;
    let alpha_c = require_fraction(spec, spec.alpha_c, "alpha_c")?;

    let soc_min = spec.soc_min.unwrap_or(0.0);
    let soc_max = spec.soc_max.unwrap_or(1.0);
    if !(0.0..=1.0).contains(&soc_min) || !(0.0..=1.0).contains(&soc_max) || soc_min >= soc_max {
        return Err(MaterialError::OutOfRange {
            material: spec.id.clone(),
            what: "soc window",
            value: soc_min,
        });
    }

    let ocp = OcpCurve::new(&spec.id, &spec.ocp)?;

    Ok(ResolvedElectrode {
        id: spec.id.clone(),
        cs_max_mol_m3: cs_max,
        d_s_m2_s: arrhenius(d_s, ea, t_k, T_REF_K),
        sigma_s_s_m: sigma_s,
        particle_radius_m: radius,
        i0_ref_a_m2: arrhenius(i0_ref, ea, t_k, T_REF_K),
        alpha_a,
        alpha_c,
        soc_min,
        soc_max,
        ocp,
    })
}

pub fn resolve_electrolyte(
    spec: &MaterialSpec,
    temperature: Temperature,
) -> MaterialResult<ResolvedElectrolyte> {
    check_role(spec, MaterialRole::Electrolyte)?;
    let t_k = temperature.get::<kelvin>();
    let ea = spec.activation_energy_j_mol.unwrap_or(0.0);

    let d_e = require_positive(spec, spec.d_e_m2_s, "d_e_m2_s")?;
    let kappa = require_positive(spec, spec.kappa_s_m, "kappa_s_m")?;
    let c_init = require_positive(spec, spec.c_e_init_mol_m3, "c_e_init_mol_m3")?;
    let t_plus = require_fraction(spec, spec.transference_number, "transference_number")?;

    Ok(ResolvedElectrolyte {
        id: spec.id.clone(),
        d_e_m2_s: arrhenius(d_e, ea, t_k, T_REF_K),
        kappa_s_m: arrhenius(kappa, ea, t_k, T_REF_K),
        t_plus,
        c_init_mol_m3: c_init,
    })
}

pub fn resolve_separator(spec: &MaterialSpec) -> MaterialResult<ResolvedSeparator> {
    check_role(spec, MaterialRole::Separator)?;
    Ok(ResolvedSeparator {
        id: spec.id.clone(),
    })
}

fn check_role(spec: &MaterialSpec, expected: MaterialRole) -> MaterialResult<()> {
    if spec.role != expected {
        return Err(MaterialError::WrongRole {
            material: spec.id.clone(),
            expected,
            found: spec.role,
        });
    }
    Ok(())
}

fn require_positive(
    spec: &MaterialSpec,
    field: Option<f64>,
    what: &'static str,
) -> MaterialResult<f64> {
    let value = field.ok_or_else(|| MaterialError::MissingProperty {
        material: spec.id.clone(),
        what,
    })?;
    if !(value > 0.0) || !value.is_finite() {
        return Err(MaterialError::NonPositive {
            material: spec.id.clone(),
            what,
            value,
        });
    }
    Ok(value)
}

fn require_fraction(
    spec: &MaterialSpec,
    field: Option<f64>,
    what: &'static str,
) -> MaterialResult<f64> {
    let value = require_positive(spec, field, what)?;
    if value >= 1.0 {
        return Err(MaterialError::OutOfRange {
            material: spec.id.clone(),
            what,
            value,
        });
    }
    Ok(value)
}
