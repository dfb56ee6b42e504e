//! Lumped single-particle cell model.
//!
//! One representative particle per electrode, the same Butler-Volmer
//! kinetics the porous-electrode model uses, and a lumped ohmic drop for
//! the electrolyte path. No electrolyte concentration dynamics: the model
//! is meant for gentle rates where those gradients stay mild, at a tiny
//! fraction of the full model's cost.

use cf_core::constants::{FARADAY_C_PER_MOL, thermal_voltage};
use cf_core::units::Temperature;
use cf_design::{CellDesign, ElectrodeDesign, ValidationError};
use cf_materials::{
    MaterialRole, MaterialSpec, ResolvedElectrode, ResolvedElectrolyte, exchange_current_density,
    overpotential, resolve_electrode, resolve_electrolyte,
};
use uom::si::thermodynamic_temperature::kelvin;

use crate::error::SpmResult;
use crate::particle::{ParticleDiffusion, ParticleState};

/// Per-electrode constants derived from the design.
#[derive(Debug, Clone)]
struct ElectrodeLump {
    data: ResolvedElectrode,
    particle: ParticleDiffusion,
    /// Interfacial area per electrode volume `3 eps_s / R_p` [1/m].
    spec_area_m2_m3: f64,
    thickness_m: f64,
}

/// Both particles; the whole transient state of the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpmState {
    pub cathode: ParticleState,
    pub anode: ParticleState,
}

/// Everything fixed for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct SpmModel {
    cathode: ElectrodeLump,
    anode: ElectrodeLump,
    electrolyte: ResolvedElectrolyte,
    /// Area-specific electrolyte path resistance [ohm m^2]: half of each
    /// electrode in series with the separator.
    r_electrolyte_ohm_m2: f64,
    temperature_k: f64,
    thermal_voltage_v: f64,
    area_eff_m2: f64,
    nominal_capacity_ah: f64,
    initial_soc: f64,
}

impl SpmModel {
    pub fn new(design: &CellDesign, temperature: Temperature) -> SpmResult<Self> {
        check_porosities(design)?;

        let t_k = temperature.get::<kelvin>();
        let cathode = resolve_electrode(
            &patched_spec(&design.cathode),
            temperature,
            MaterialRole::Cathode,
        )?;
        let anode = resolve_electrode(
            &patched_spec(&design.anode),
            temperature,
            MaterialRole::Anode,
        )?;
        let electrolyte = resolve_electrolyte(&design.electrolyte, temperature)?;

        let lump = |data: ResolvedElectrode, slot: &ElectrodeDesign| ElectrodeLump {
            particle: ParticleDiffusion::new(&data),
            spec_area_m2_m3: 3.0 * slot.active_volume_fraction / data.particle_radius_m,
            thickness_m: slot.thickness_m,
            data,
        };

        let k_eff = |porosity: f64| electrolyte.kappa_s_m * porosity.powf(1.5);
        let r_electrolyte_ohm_m2 = design.cathode.thickness_m
            / (2.0 * k_eff(design.cathode.porosity))
            + design.separator.thickness_m / k_eff(design.separator.porosity)
            + design.anode.thickness_m / (2.0 * k_eff(design.anode.porosity));

        let area_eff_m2 = design.effective_area_m2();
        let nominal_capacity_ah = cf_design::nominal_capacity_ah(design)?;

        tracing::debug!(
            capacity_ah = nominal_capacity_ah,
            r_electrolyte_ohm_m2,
            "assembled single-particle model"
        );

        Ok(Self {
            cathode: lump(cathode, &design.cathode),
            anode: lump(anode, &design.anode),
            electrolyte,
            r_electrolyte_ohm_m2,
            temperature_k: t_k,
            thermal_voltage_v: thermal_voltage(t_k),
            area_eff_m2,
            nominal_capacity_ah,
            initial_soc: design.initial_soc,
        })
    }

    pub fn nominal_capacity_ah(&self) -> f64 {
        self.nominal_capacity_ah
    }

    /// Current that discharges the nominal capacity in one hour [A].
    pub fn current_1c_a(&self) -> f64 {
        self.nominal_capacity_ah
    }

    pub fn area_eff_m2(&self) -> f64 {
        self.area_eff_m2
    }

    /// Applied current [A] to superficial current density [A/m^2].
    pub fn current_density(&self, applied_current_a: f64) -> f64 {
        applied_current_a / self.area_eff_m2
    }

    pub fn temperature_k(&self) -> f64 {
        self.temperature_k
    }

    pub fn cathode(&self) -> &ResolvedElectrode {
        &self.cathode.data
    }

    pub fn anode(&self) -> &ResolvedElectrode {
        &self.anode.data
    }

    /// Equilibrium state at the design's initial SOC.
    pub fn initial_state(&self) -> SpmState {
        SpmState {
            cathode: self
                .cathode
                .particle
                .rested(cathode_occupancy(&self.cathode.data, self.initial_soc)),
            anode: self
                .anode
                .particle
                .rested(anode_occupancy(&self.anode.data, self.initial_soc)),
        }
    }

    /// Interfacial current densities `(cathode, anode)` [A/m^2], positive
    /// anodic. On discharge the anode delithiates and the cathode inserts.
    pub fn interfacial_currents(&self, applied_current_a: f64) -> (f64, f64) {
        let i_app = self.current_density(applied_current_a);
        let j_ca = -i_app / (self.cathode.spec_area_m2_m3 * self.cathode.thickness_m);
        let j_an = i_app / (self.anode.spec_area_m2_m3 * self.anode.thickness_m);
        (j_ca, j_an)
    }

    /// Advance both particles one implicit step.
    pub fn step(&self, state: &SpmState, dt_s: f64, applied_current_a: f64) -> SpmState {
        let (j_ca, j_an) = self.interfacial_currents(applied_current_a);
        SpmState {
            cathode: self
                .cathode
                .particle
                .step(&state.cathode, dt_s, j_ca / FARADAY_C_PER_MOL),
            anode: self
                .anode
                .particle
                .step(&state.anode, dt_s, j_an / FARADAY_C_PER_MOL),
        }
    }

    /// Terminal voltage under the applied current. Errs only when the
    /// kinetic inversion fails; callers treat that like a rejected
    /// operating point.
    pub fn terminal_voltage(&self, state: &SpmState, applied_current_a: f64) -> SpmResult<f64> {
        let (j_ca, j_an) = self.interfacial_currents(applied_current_a);
        let ca = self.half_cell(&self.cathode, &state.cathode, j_ca)?;
        let an = self.half_cell(&self.anode, &state.anode, j_an)?;
        let i_app = self.current_density(applied_current_a);
        Ok(ca - an - i_app * self.r_electrolyte_ohm_m2)
    }

    /// `U(surface occupancy) + eta(j)` for one electrode.
    fn half_cell(&self, lump: &ElectrodeLump, state: &ParticleState, j: f64) -> SpmResult<f64> {
        let occ = lump.particle.surface_occupancy(state);
        let i0 = exchange_current_density(
            lump.data.i0_ref_a_m2,
            self.electrolyte.c_init_mol_m3,
            self.electrolyte.c_init_mol_m3,
            occ,
            lump.data.alpha_a,
            lump.data.alpha_c,
        );
        let eta = overpotential(
            j,
            i0,
            lump.data.alpha_a,
            lump.data.alpha_c,
            self.thermal_voltage_v,
        )?;
        Ok(lump.data.ocp.value(occ) + eta)
    }

    pub fn cathode_mean_occupancy(&self, state: &SpmState) -> f64 {
        self.cathode.particle.mean_occupancy(&state.cathode)
    }

    pub fn anode_mean_occupancy(&self, state: &SpmState) -> f64 {
        self.anode.particle.mean_occupancy(&state.anode)
    }

    pub fn cathode_surface_occupancy(&self, state: &SpmState) -> f64 {
        self.cathode.particle.surface_occupancy(&state.cathode)
    }

    pub fn anode_surface_occupancy(&self, state: &SpmState) -> f64 {
        self.anode.particle.surface_occupancy(&state.anode)
    }
}

/// Design override for the particle radius folded back into the spec so
/// the resolver and the particle geometry agree.
fn patched_spec(electrode: &ElectrodeDesign) -> MaterialSpec {
    let mut spec = electrode.material.clone();
    if electrode.particle_radius_m.is_some() {
        spec.particle_radius_m = electrode.particle_radius_m;
    }
    spec
}

fn anode_occupancy(electrode: &ResolvedElectrode, cell_soc: f64) -> f64 {
    electrode.soc_min + cell_soc * (electrode.soc_max - electrode.soc_min)
}

fn cathode_occupancy(electrode: &ResolvedElectrode, cell_soc: f64) -> f64 {
    electrode.soc_max - cell_soc * (electrode.soc_max - electrode.soc_min)
}

fn check_porosities(design: &CellDesign) -> Result<(), ValidationError> {
    for (slot, eps) in [
        ("cathode", design.cathode.porosity),
        ("separator", design.separator.porosity),
        ("anode", design.anode.porosity),
    ] {
        if !eps.is_finite() || eps <= 0.0 || eps >= 1.0 {
            return Err(ValidationError::InvalidValue {
                field: format!("{slot} porosity"),
                value: eps.to_string(),
                reason: "must lie in (0, 1)".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::units::k;
    use cf_design::reference::reference_cell_at_soc;

    fn model() -> SpmModel {
        SpmModel::new(&reference_cell_at_soc(0.5), k(298.15)).unwrap()
    }

    #[test]
    fn rest_voltage_is_the_ocp_difference() {
        let m = model();
        let s = m.initial_state();

        let expected = m.cathode().ocp.value(m.cathode_surface_occupancy(&s))
            - m.anode().ocp.value(m.anode_surface_occupancy(&s));
        let v = m.terminal_voltage(&s, 0.0).unwrap();
        assert!((v - expected).abs() < 1e-12, "rest voltage {v} vs {expected}");
        assert!(v > 3.0 && v < 4.3);
    }

    #[test]
    fn load_polarizes_in_the_right_direction() {
        let m = model();
        let s = m.initial_state();
        let i = m.current_1c_a();

        let rest = m.terminal_voltage(&s, 0.0).unwrap();
        let discharge = m.terminal_voltage(&s, i).unwrap();
        let charge = m.terminal_voltage(&s, -i).unwrap();

        assert!(discharge < rest && charge > rest);
        // kinetic plus ohmic polarization at 1C is tens of millivolts here
        assert!(rest - discharge > 0.02 && rest - discharge < 0.3);
        assert!(charge - rest > 0.02 && charge - rest < 0.3);
    }

    #[test]
    fn interfacial_currents_balance_the_applied_current() {
        let m = model();
        let (j_ca, j_an) = m.interfacial_currents(m.current_1c_a());
        let i_app = m.current_density(m.current_1c_a());

        // a * L * j recovers the superficial current density in each electrode
        assert!(j_ca < 0.0 && j_an > 0.0);
        let from_ca = -j_ca * 3.0 * 0.55 / m.cathode().particle_radius_m * 75e-6;
        let from_an = j_an * 3.0 * 0.58 / m.anode().particle_radius_m * 100e-6;
        assert!((from_ca - i_app).abs() < 1e-9 * i_app.abs());
        assert!((from_an - i_app).abs() < 1e-9 * i_app.abs());
    }

    #[test]
    fn discharge_steps_move_both_particles() {
        let m = model();
        let s0 = m.initial_state();
        let s1 = m.step(&s0, 10.0, m.current_1c_a());

        assert!(s1.anode.c_avg_mol_m3 < s0.anode.c_avg_mol_m3);
        assert!(s1.cathode.c_avg_mol_m3 > s0.cathode.c_avg_mol_m3);
        // surfaces lead the means under load
        assert!(m.anode_surface_occupancy(&s1) < m.anode_mean_occupancy(&s1));
        assert!(m.cathode_surface_occupancy(&s1) > m.cathode_mean_occupancy(&s1));
    }

    #[test]
    fn bad_porosity_is_rejected_up_front() {
        let mut design = reference_cell_at_soc(0.5);
        design.separator.porosity = 0.0;
        let err = SpmModel::new(&design, k(298.15)).unwrap_err();
        assert!(matches!(err, crate::error::SpmError::Design(_)), "got {err}");
    }
}
