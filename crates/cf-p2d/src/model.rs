//! Assembled pseudo-2D model.
//!
//! `P2dModel::new` resolves materials at the operating temperature, builds
//! the mesh and layout, and precomputes every coefficient the residual and
//! Jacobian need per step: effective transport properties per node, face
//! conductances, interfacial areas, and the capacity bookkeeping that turns
//! C-rates into currents.
//!
//! Orientation: x = 0 is the cathode current collector, x = L the anode
//! collector. Applied current is positive on discharge. Internal current
//! density along +x is then `-i_app`, split between solid and electrolyte.

use cf_core::constants::thermal_voltage;
use cf_core::units::Temperature;
use cf_design::{CellDesign, DiscretizationConfig, ElectrodeDesign, ValidationError};
use cf_materials::{
    MaterialRole, MaterialSpec, ResolvedElectrode, ResolvedElectrolyte, butler_volmer,
    exchange_current_density, resolve_electrode, resolve_electrolyte,
};
use cf_mesh::{Mesh, RadialMesh, Region, StateLayout};
use nalgebra::DVector;
use uom::si::thermodynamic_temperature::kelvin;

use crate::error::P2dResult;

/// Everything fixed for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct P2dModel {
    mesh: Mesh,
    layout: StateLayout,
    cathode: ResolvedElectrode,
    anode: ResolvedElectrode,
    electrolyte: ResolvedElectrolyte,

    temperature_k: f64,
    thermal_voltage_v: f64,
    /// `2RT(1 - t+)/F`, the diffusional conductivity prefactor.
    kd_factor_v: f64,

    /// Per node: electrolyte volume fraction.
    porosity: Vec<f64>,
    /// Per node: interfacial area per volume `3 eps_s / R_p`, zero in the
    /// separator.
    spec_area_m2_m3: Vec<f64>,
    /// Per node: effective solid conductivity, zero in the separator.
    sigma_eff_s_m: Vec<f64>,

    /// Face conductances indexed by the face left of each node
    /// (`g[f]` couples nodes `f-1` and `f`); entries 0 and n_x are zero,
    /// collector boundary conditions enter the residual directly.
    g_d: Vec<f64>,
    g_k: Vec<f64>,
    g_s: Vec<f64>,

    /// Residual scalings.
    ce_ref_mol_m3: f64,
    i_scale_a_m2: f64,

    area_eff_m2: f64,
    nominal_capacity_ah: f64,
    initial_soc: f64,
}

impl P2dModel {
    pub fn new(
        design: &CellDesign,
        config: &DiscretizationConfig,
        temperature: Temperature,
    ) -> P2dResult<Self> {
        check_fractions(design)?;

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

        let mesh = Mesh::build(design, config)?;
        let layout = StateLayout::new(&mesh);

        let n = mesh.n_nodes();
        let mut porosity = Vec::with_capacity(n);
        let mut spec_area = Vec::with_capacity(n);
        let mut sigma_eff = Vec::with_capacity(n);
        // Per-node effective electrolyte transport, only needed to form the
        // face conductances below.
        let mut d_eff = Vec::with_capacity(n);
        let mut k_eff = Vec::with_capacity(n);

        for node in 0..n {
            let (eps, eps_s, radius_m, sigma_s) = match mesh.region(node) {
                Region::Cathode => (
                    design.cathode.porosity,
                    design.cathode.active_volume_fraction,
                    mesh.cathode_particles.radius_m,
                    cathode.sigma_s_s_m,
                ),
                Region::Anode => (
                    design.anode.porosity,
                    design.anode.active_volume_fraction,
                    mesh.anode_particles.radius_m,
                    anode.sigma_s_s_m,
                ),
                Region::Separator => (design.separator.porosity, 0.0, 1.0, 0.0),
            };
            let brug = eps.powf(1.5);
            porosity.push(eps);
            d_eff.push(electrolyte.d_e_m2_s * brug);
            k_eff.push(electrolyte.kappa_s_m * brug);
            spec_area.push(3.0 * eps_s / radius_m);
            sigma_eff.push(sigma_s * eps_s.powf(1.5));
        }

        let mut g_d = vec![0.0; n + 1];
        let mut g_k = vec![0.0; n + 1];
        let mut g_s = vec![0.0; n + 1];
        for f in 1..n {
            let (left, right) = (f - 1, f);
            let dx_l = mesh.nodes()[left].dx_m;
            let dx_r = mesh.nodes()[right].dx_m;
            g_d[f] = face_conductance(dx_l, d_eff[left], dx_r, d_eff[right]);
            g_k[f] = face_conductance(dx_l, k_eff[left], dx_r, k_eff[right]);
            // Solid current only flows between nodes of the same electrode.
            if mesh.region(left) == mesh.region(right) && mesh.region(left).is_electrode() {
                g_s[f] = face_conductance(dx_l, sigma_eff[left], dx_r, sigma_eff[right]);
            }
        }

        let area_eff_m2 = design.effective_area_m2();
        let nominal_capacity_ah = cf_design::nominal_capacity_ah(design)?;
        let i_1c_density = nominal_capacity_ah / area_eff_m2;
        let vt = thermal_voltage(t_k);

        tracing::debug!(
            nodes = n,
            unknowns = layout.n_unknowns(),
            capacity_ah = nominal_capacity_ah,
            "assembled P2D model"
        );

        Ok(Self {
            mesh,
            layout,
            temperature_k: t_k,
            thermal_voltage_v: vt,
            kd_factor_v: 2.0 * vt * (1.0 - electrolyte.t_plus),
            porosity,
            spec_area_m2_m3: spec_area,
            sigma_eff_s_m: sigma_eff,
            g_d,
            g_k,
            g_s,
            ce_ref_mol_m3: electrolyte.c_init_mol_m3,
            i_scale_a_m2: i_1c_density.max(1.0),
            area_eff_m2,
            nominal_capacity_ah,
            initial_soc: design.initial_soc,
            cathode,
            anode,
            electrolyte,
        })
    }

    // -- capacity / current bookkeeping -------------------------------------

    /// Cell capacity from the limiting electrode [Ah].
    pub fn nominal_capacity_ah(&self) -> f64 {
        self.nominal_capacity_ah
    }

    /// Current that discharges the nominal capacity in one hour [A].
    pub fn current_1c_a(&self) -> f64 {
        self.nominal_capacity_ah
    }

    /// Total electrode area over all layers [m^2].
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

    pub fn thermal_voltage_v(&self) -> f64 {
        self.thermal_voltage_v
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn electrolyte(&self) -> &ResolvedElectrolyte {
        &self.electrolyte
    }

    pub fn cathode(&self) -> &ResolvedElectrode {
        &self.cathode
    }

    pub fn anode(&self) -> &ResolvedElectrode {
        &self.anode
    }

    pub(crate) fn porosity(&self, node: usize) -> f64 {
        self.porosity[node]
    }

    pub(crate) fn spec_area(&self, node: usize) -> f64 {
        self.spec_area_m2_m3[node]
    }

    pub(crate) fn sigma_eff(&self, node: usize) -> f64 {
        self.sigma_eff_s_m[node]
    }

    pub(crate) fn g_d(&self, face: usize) -> f64 {
        self.g_d[face]
    }

    pub(crate) fn g_k(&self, face: usize) -> f64 {
        self.g_k[face]
    }

    pub(crate) fn g_s(&self, face: usize) -> f64 {
        self.g_s[face]
    }

    pub(crate) fn kd_factor_v(&self) -> f64 {
        self.kd_factor_v
    }

    pub(crate) fn ce_ref(&self) -> f64 {
        self.ce_ref_mol_m3
    }

    pub(crate) fn i_scale(&self) -> f64 {
        self.i_scale_a_m2
    }

    /// Electrode data and radial mesh for a node, `None` in the separator.
    pub fn electrode_at(&self, node: usize) -> Option<(&ResolvedElectrode, &RadialMesh)> {
        match self.mesh.region(node) {
            Region::Cathode => Some((&self.cathode, &self.mesh.cathode_particles)),
            Region::Anode => Some((&self.anode, &self.mesh.anode_particles)),
            Region::Separator => None,
        }
    }

    // -- kinetics ------------------------------------------------------------

    /// Interfacial current density [A/m^2] at an electrode node, positive
    /// anodic. Inputs are raw state entries; occupancy clamping happens in
    /// the kinetics layer.
    pub fn interfacial_current(
        &self,
        node: usize,
        cs_surf: f64,
        ce: f64,
        phis: f64,
        phie: f64,
    ) -> f64 {
        let (electrode, _) = match self.electrode_at(node) {
            Some(pair) => pair,
            None => return 0.0,
        };
        let soc_surf = cs_surf / electrode.cs_max_mol_m3;
        let i0 = exchange_current_density(
            electrode.i0_ref_a_m2,
            ce,
            self.ce_ref_mol_m3,
            soc_surf,
            electrode.alpha_a,
            electrode.alpha_c,
        );
        let eta = phis - phie - electrode.ocp.value(soc_surf);
        butler_volmer(i0, electrode.alpha_a, electrode.alpha_c, eta, self.thermal_voltage_v)
    }

    // -- state construction and inspection ------------------------------------

    /// Equilibrium state at the design's initial SOC: uniform concentrations,
    /// potentials chosen so every Butler-Volmer overpotential is zero. The
    /// residual vanishes identically here at zero applied current.
    pub fn initial_state(&self) -> DVector<f64> {
        let soc_an = anode_occupancy(&self.anode, self.initial_soc);
        // cathode occupancy moves opposite to cell SOC
        let soc_ca = cathode_occupancy(&self.cathode, self.initial_soc);

        let u_an = self.anode.ocp.value(soc_an);
        let u_ca = self.cathode.ocp.value(soc_ca);

        let mut x = DVector::zeros(self.layout.n_unknowns());
        for node in 0..self.mesh.n_nodes() {
            x[self.layout.offset_ce(node)] = self.electrolyte.c_init_mol_m3;
            x[self.layout.offset_phie(node)] = -u_an;
            if let Some((electrode, _)) = self.electrode_at(node) {
                let soc = match self.mesh.region(node) {
                    Region::Cathode => soc_ca,
                    _ => soc_an,
                };
                for shell in 0..self.layout.n_r() {
                    x[self.layout.offset_cs(node, shell)] = soc * electrode.cs_max_mol_m3;
                }
                x[self.layout.offset_phis(node)] = match self.mesh.region(node) {
                    Region::Cathode => u_ca - u_an,
                    _ => 0.0,
                };
            }
        }
        x
    }

    /// Terminal voltage: solid potential difference between the collector
    /// faces, extrapolated from the adjacent node centers using the
    /// collector flux boundary condition.
    pub fn terminal_voltage(&self, state: &DVector<f64>, applied_current_a: f64) -> f64 {
        let i_app = self.current_density(applied_current_a);
        let n = self.mesh.n_nodes();
        let phis_ca = state[self.layout.offset_phis(0)];
        let phis_an = state[self.layout.offset_phis(n - 1)];
        let half_drop_ca = 0.5 * self.mesh.nodes()[0].dx_m * i_app / self.sigma_eff_s_m[0];
        let half_drop_an = 0.5 * self.mesh.nodes()[n - 1].dx_m * i_app / self.sigma_eff_s_m[n - 1];
        (phis_ca - half_drop_ca) - (phis_an + half_drop_an)
    }

    /// Volume-weighted mean occupancy of one electrode, 0..1 of `cs_max`.
    pub fn electrode_mean_soc(&self, state: &DVector<f64>, region: Region) -> f64 {
        let mut weighted = 0.0;
        let mut volume = 0.0;
        for node in 0..self.mesh.n_nodes() {
            if self.mesh.region(node) != region {
                continue;
            }
            let (electrode, radial) = match self.electrode_at(node) {
                Some(pair) => pair,
                None => continue,
            };
            let dx = self.mesh.nodes()[node].dx_m;
            for shell in 0..self.layout.n_r() {
                let w = radial.shell_volumes_m3[shell] * dx;
                weighted += w * state[self.layout.offset_cs(node, shell)] / electrode.cs_max_mol_m3;
                volume += w;
            }
        }
        weighted / volume
    }

    // -- profile extraction ----------------------------------------------------

    pub fn node_positions_m(&self) -> Vec<f64> {
        self.mesh.nodes().iter().map(|n| n.x_center_m).collect()
    }

    pub fn electrolyte_profile(&self, state: &DVector<f64>) -> Vec<f64> {
        (0..self.mesh.n_nodes())
            .map(|node| state[self.layout.offset_ce(node)])
            .collect()
    }

    pub fn phie_profile(&self, state: &DVector<f64>) -> Vec<f64> {
        (0..self.mesh.n_nodes())
            .map(|node| state[self.layout.offset_phie(node)])
            .collect()
    }

    pub fn phis_profile(&self, state: &DVector<f64>) -> Vec<Option<f64>> {
        (0..self.mesh.n_nodes())
            .map(|node| {
                self.layout
                    .has_particle(node)
                    .then(|| state[self.layout.offset_phis(node)])
            })
            .collect()
    }

    pub fn surface_soc_profile(&self, state: &DVector<f64>) -> Vec<Option<f64>> {
        (0..self.mesh.n_nodes())
            .map(|node| {
                self.electrode_at(node).map(|(electrode, _)| {
                    state[self.layout.offset_cs(node, self.layout.n_r() - 1)]
                        / electrode.cs_max_mol_m3
                })
            })
            .collect()
    }

}

/// Distance-weighted harmonic mean turned into a per-face conductance:
/// flux = g * (value_right - value_left).
fn face_conductance(dx_l: f64, p_l: f64, dx_r: f64, p_r: f64) -> f64 {
    if p_l <= 0.0 || p_r <= 0.0 {
        return 0.0;
    }
    2.0 / (dx_l / p_l + dx_r / p_r)
}

/// Design override for the particle radius folded back into the spec so the
/// resolver and the mesh agree.
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

fn check_fractions(design: &CellDesign) -> Result<(), ValidationError> {
    let slots = [
        ("cathode", design.cathode.porosity, design.cathode.active_volume_fraction),
        ("anode", design.anode.porosity, design.anode.active_volume_fraction),
        ("separator", design.separator.porosity, 0.0),
    ];
    for (slot, eps, eps_s) in slots {
        for (what, value) in [("porosity", eps), ("active_volume_fraction", eps_s)] {
            if !value.is_finite() || value < 0.0 || value >= 1.0 {
                return Err(ValidationError::InvalidValue {
                    field: format!("{} {}", slot, what),
                    value: value.to_string(),
                    reason: "must lie in [0, 1)".to_string(),
                });
            }
        }
        if eps <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: format!("{} porosity", slot),
                value: eps.to_string(),
                reason: "must be positive".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::units::k;
    use cf_design::reference::reference_cell;

    fn model() -> P2dModel {
        P2dModel::new(
            &reference_cell(),
            &DiscretizationConfig::default(),
            k(298.15),
        )
        .unwrap()
    }

    #[test]
    fn capacity_matches_design_math() {
        let design = reference_cell();
        let m = model();
        let expected = cf_design::nominal_capacity_ah(&design).unwrap();
        assert!((m.nominal_capacity_ah() - expected).abs() < 1e-12);
        assert!((m.current_1c_a() - expected).abs() < 1e-12);
        // reference cell is about 3.9 Ah on 0.1 m^2
        assert!(m.nominal_capacity_ah() > 3.5 && m.nominal_capacity_ah() < 4.5);
    }

    #[test]
    fn initial_state_is_equilibrium_shaped() {
        let m = model();
        let x = m.initial_state();
        let layout = m.layout();

        // electrolyte uniform at c_init
        for node in 0..m.mesh().n_nodes() {
            assert!(
                (x[layout.offset_ce(node)] - m.electrolyte().c_init_mol_m3).abs() < 1e-9
            );
        }
        // anode grounded, cathode at the OCV difference
        let n = m.mesh().n_nodes();
        assert_eq!(x[layout.offset_phis(n - 1)], 0.0);
        let v = m.terminal_voltage(&x, 0.0);
        assert!(v > 3.0 && v < 4.4, "open-circuit voltage = {v}");
    }

    #[test]
    fn fully_charged_socs_sit_at_window_edges() {
        let m = model();
        let x = m.initial_state();
        let soc_an = m.electrode_mean_soc(&x, Region::Anode);
        let soc_ca = m.electrode_mean_soc(&x, Region::Cathode);
        assert!((soc_an - m.anode().soc_max).abs() < 1e-9);
        assert!((soc_ca - m.cathode().soc_min).abs() < 1e-9);
    }

    #[test]
    fn interfacial_current_sign_follows_overpotential() {
        let m = model();
        let electrode = m.cathode();
        let cs = 0.5 * electrode.cs_max_mol_m3;
        let ce = m.electrolyte().c_init_mol_m3;
        let u = electrode.ocp.value(0.5);
        let j_anodic = m.interfacial_current(0, cs, ce, u + 0.05, 0.0);
        let j_cathodic = m.interfacial_current(0, cs, ce, u - 0.05, 0.0);
        assert!(j_anodic > 0.0);
        assert!(j_cathodic < 0.0);
    }

    #[test]
    fn separator_has_no_kinetics() {
        let m = model();
        let sep_node = m.mesh().n_cathode();
        assert_eq!(m.mesh().region(sep_node), Region::Separator);
        assert_eq!(m.interfacial_current(sep_node, 1.0, 1000.0, 0.0, 0.0), 0.0);
        assert_eq!(m.spec_area(sep_node), 0.0);
        assert_eq!(m.sigma_eff(sep_node), 0.0);
    }

    #[test]
    fn face_conductance_harmonic_mean() {
        // equal widths and properties reduce to p/dx
        let g = face_conductance(1e-5, 2.0, 1e-5, 2.0);
        assert!((g - 2.0 / 1e-5).abs() / g < 1e-12);
        // one dead side kills the face
        assert_eq!(face_conductance(1e-5, 2.0, 1e-5, 0.0), 0.0);
    }
}
