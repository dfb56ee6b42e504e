//! Implicit-Euler residual assembly.
//!
//! One residual row per unknown, in layout order. Rows are scaled to
//! comparable magnitudes so a single absolute tolerance is meaningful:
//! concentrations by their reference values, charge rows by the 1C current
//! density. Sign convention: potential rows carry the negated flux
//! divergence, so conductance differences appear directly.
//!
//! The solid-potential row of the last anode node is replaced by a ground
//! row `phi_s = 0`. The full set of potential rows sums to zero identically
//! (both collector currents enter with opposite signs), so that equation is
//! redundant and grounding removes the uniform-shift null space.

use cf_core::constants::FARADAY_C_PER_MOL;
use nalgebra::DVector;

use crate::error::AssemblyError;
use crate::model::P2dModel;

/// Per-step constants shared by residual and Jacobian evaluation.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Committed state the implicit step starts from.
    pub prev: &'a DVector<f64>,
    pub dt_s: f64,
    /// Total cell current, positive on discharge [A].
    pub applied_current_a: f64,
}

impl P2dModel {
    /// Evaluates the residual at `trial` into `out` (reused across calls).
    ///
    /// Fails with [`AssemblyError::NonPhysical`] when the trial carries a
    /// non-finite entry or a non-positive electrolyte concentration; the
    /// corrector treats that as a rejected trial, not a crash.
    pub fn assemble_residual(
        &self,
        trial: &DVector<f64>,
        ctx: &StepContext,
        out: &mut DVector<f64>,
    ) -> Result<(), AssemblyError> {
        let layout = self.layout();
        let mesh = self.mesh();
        let n = mesh.n_nodes();
        debug_assert_eq!(trial.len(), layout.n_unknowns());
        debug_assert_eq!(out.len(), layout.n_unknowns());

        self.check_trial(trial)?;

        let dt = ctx.dt_s;
        let i_app = self.current_density(ctx.applied_current_a);
        let t_plus = self.electrolyte().t_plus;
        let ground_row = layout.offset_phis(n - 1);

        for node in 0..n {
            let dx = mesh.nodes()[node].dx_m;
            let ce = trial[layout.offset_ce(node)];
            let ce_prev = ctx.prev[layout.offset_ce(node)];
            let phie = trial[layout.offset_phie(node)];

            // Interfacial current for electrode nodes, zero otherwise.
            let j = if layout.has_particle(node) {
                let cs_surf = trial[layout.offset_cs(node, layout.n_r() - 1)];
                let phis = trial[layout.offset_phis(node)];
                self.interfacial_current(node, cs_surf, ce, phis, phie)
            } else {
                0.0
            };
            let a = self.spec_area(node);

            // -- solid diffusion ------------------------------------------------
            if let Some((electrode, radial)) = self.electrode_at(node) {
                let n_r = layout.n_r();
                let dr = radial.dr_m;
                let ds = electrode.d_s_m2_s;
                for shell in 0..n_r {
                    let cs = trial[layout.offset_cs(node, shell)];
                    let cs_prev = ctx.prev[layout.offset_cs(node, shell)];
                    let vol = radial.shell_volumes_m3[shell];

                    // inward face flow (zero at the center, area 0)
                    let q_in = if shell > 0 {
                        let cs_in = trial[layout.offset_cs(node, shell - 1)];
                        -ds * radial.face_areas_m2[shell] * (cs - cs_in) / dr
                    } else {
                        0.0
                    };
                    // outward face flow; surface flux set by kinetics
                    let q_out = if shell + 1 < n_r {
                        let cs_out = trial[layout.offset_cs(node, shell + 1)];
                        -ds * radial.face_areas_m2[shell + 1] * (cs_out - cs) / dr
                    } else {
                        radial.face_areas_m2[n_r] * j / FARADAY_C_PER_MOL
                    };

                    out[layout.offset_cs(node, shell)] =
                        ((cs - cs_prev) - dt / vol * (q_in - q_out)) / electrode.cs_max_mol_m3;
                }
            }

            // -- electrolyte mass -----------------------------------------------
            {
                let mut diff = 0.0;
                if node + 1 < n {
                    let ce_r = trial[layout.offset_ce(node + 1)];
                    diff += self.g_d(node + 1) * (ce_r - ce);
                }
                if node > 0 {
                    let ce_l = trial[layout.offset_ce(node - 1)];
                    diff -= self.g_d(node) * (ce - ce_l);
                }
                let source = dt * (1.0 - t_plus) / FARADAY_C_PER_MOL * a * j;
                out[layout.offset_ce(node)] =
                    (self.porosity(node) * (ce - ce_prev) - dt / dx * diff - source)
                        / self.ce_ref();
            }

            // -- electrolyte charge ----------------------------------------------
            {
                let mut row = a * j * dx;
                if node + 1 < n {
                    let phie_r = trial[layout.offset_phie(node + 1)];
                    let ce_r = trial[layout.offset_ce(node + 1)];
                    let g = self.g_k(node + 1);
                    row += g * (phie_r - phie);
                    row -= self.kd_factor_v() * g * (ce_r.ln() - ce.ln());
                }
                if node > 0 {
                    let phie_l = trial[layout.offset_phie(node - 1)];
                    let ce_l = trial[layout.offset_ce(node - 1)];
                    let g = self.g_k(node);
                    row -= g * (phie - phie_l);
                    row += self.kd_factor_v() * g * (ce.ln() - ce_l.ln());
                }
                out[layout.offset_phie(node)] = row / self.i_scale();
            }

            // -- solid charge -----------------------------------------------------
            if layout.has_particle(node) {
                let row_index = layout.offset_phis(node);
                if row_index == ground_row {
                    out[row_index] = trial[row_index];
                } else {
                    let phis = trial[layout.offset_phis(node)];
                    let mut row = -a * j * dx;
                    if node + 1 < n && self.g_s(node + 1) > 0.0 {
                        let phis_r = trial[layout.offset_phis(node + 1)];
                        row += self.g_s(node + 1) * (phis_r - phis);
                    }
                    if node > 0 && self.g_s(node) > 0.0 {
                        let phis_l = trial[layout.offset_phis(node - 1)];
                        row -= self.g_s(node) * (phis - phis_l);
                    }
                    if node == 0 {
                        row -= i_app;
                    }
                    out[row_index] = row / self.i_scale();
                }
            }
        }

        Ok(())
    }

    pub(crate) fn check_trial(&self, trial: &DVector<f64>) -> Result<(), AssemblyError> {
        let layout = self.layout();
        for node in 0..self.mesh().n_nodes() {
            for idx in layout.block_range(node) {
                if !trial[idx].is_finite() {
                    return Err(AssemblyError::NonPhysical {
                        node,
                        what: "state entry",
                        value: trial[idx],
                    });
                }
            }
            let ce = trial[layout.offset_ce(node)];
            if ce <= 0.0 {
                return Err(AssemblyError::NonPhysical {
                    node,
                    what: "c_e",
                    value: ce,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::units::k;
    use cf_design::DiscretizationConfig;
    use cf_design::reference::reference_cell;

    fn small_model() -> P2dModel {
        let mut config = DiscretizationConfig::default();
        config.n_x = 9;
        config.n_r = 4;
        P2dModel::new(&reference_cell(), &config, k(298.15)).unwrap()
    }

    #[test]
    fn equilibrium_residual_vanishes_at_zero_current() {
        let model = small_model();
        let x = model.initial_state();
        let mut out = DVector::zeros(x.len());
        let ctx = StepContext {
            prev: &x,
            dt_s: 1.0,
            applied_current_a: 0.0,
        };
        model.assemble_residual(&x, &ctx, &mut out).unwrap();
        assert!(out.amax() < 1e-12, "residual = {}", out.amax());
    }

    #[test]
    fn applied_current_enters_through_the_cathode_collector() {
        let model = small_model();
        let x = model.initial_state();
        let mut out = DVector::zeros(x.len());
        let i_1c = model.current_1c_a();
        let ctx = StepContext {
            prev: &x,
            dt_s: 1.0,
            applied_current_a: i_1c,
        };
        model.assemble_residual(&x, &ctx, &mut out).unwrap();

        // the collector boundary condition is the only nonzero row at the
        // equilibrium state, scaled to exactly -1 at 1C
        let row = out[model.layout().offset_phis(0)];
        assert!((row + 1.0).abs() < 1e-9, "row = {row}");
    }

    #[test]
    fn non_positive_electrolyte_concentration_is_rejected() {
        let model = small_model();
        let mut x = model.initial_state();
        let prev = x.clone();
        x[model.layout().offset_ce(3)] = -5.0;
        let mut out = DVector::zeros(x.len());
        let ctx = StepContext {
            prev: &prev,
            dt_s: 1.0,
            applied_current_a: 0.0,
        };
        let err = model.assemble_residual(&x, &ctx, &mut out).unwrap_err();
        match err {
            AssemblyError::NonPhysical { node, what, .. } => {
                assert_eq!(node, 3);
                assert_eq!(what, "c_e");
            }
        }
    }

    #[test]
    fn non_finite_entry_is_rejected() {
        let model = small_model();
        let mut x = model.initial_state();
        let prev = x.clone();
        x[model.layout().offset_phie(1)] = f64::NAN;
        let mut out = DVector::zeros(x.len());
        let ctx = StepContext {
            prev: &prev,
            dt_s: 1.0,
            applied_current_a: 0.0,
        };
        assert!(model.assemble_residual(&x, &ctx, &mut out).is_err());
    }

    #[test]
    fn discharge_source_raises_anode_electrolyte_row() {
        // Push the anode potential up a little: the anodic current must act
        // as an electrolyte source there (negative mass-row contribution).
        let model = small_model();
        let x0 = model.initial_state();
        let mut x = x0.clone();
        let layout = model.layout();
        let n = model.mesh().n_nodes();
        for node in 0..n {
            if layout.has_particle(node) && node >= model.mesh().first_anode() {
                x[layout.offset_phis(node)] += 0.02;
            }
        }
        let mut out = DVector::zeros(x.len());
        let ctx = StepContext {
            prev: &x0,
            dt_s: 1.0,
            applied_current_a: 0.0,
        };
        model.assemble_residual(&x, &ctx, &mut out).unwrap();
        let anode_node = n - 1;
        assert!(out[layout.offset_ce(anode_node)] < 0.0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use cf_core::units::k;
    use cf_design::DiscretizationConfig;
    use cf_design::reference::reference_cell;
    use proptest::prelude::*;

    fn model_at(soc: f64) -> P2dModel {
        let mut design = reference_cell();
        design.initial_soc = soc;
        let mut config = DiscretizationConfig::default();
        config.n_x = 7;
        config.n_r = 3;
        P2dModel::new(&design, &config, k(298.15)).unwrap()
    }

    proptest! {
        #[test]
        fn equilibrium_residual_vanishes_at_any_state_of_charge(soc in 0.05f64..0.95) {
            let model = model_at(soc);
            let x = model.initial_state();
            let mut out = DVector::zeros(x.len());
            let ctx = StepContext {
                prev: &x,
                dt_s: 1.0,
                applied_current_a: 0.0,
            };
            model.assemble_residual(&x, &ctx, &mut out).unwrap();
            prop_assert!(out.amax() < 1e-12, "residual = {}", out.amax());
        }

        #[test]
        fn interfacial_current_is_odd_around_equilibrium(
            soc in 0.1f64..0.9,
            delta in 1e-3f64..0.2,
        ) {
            // reference materials carry symmetric transfer coefficients, so
            // equal overpotentials either way must drive equal currents
            let model = model_at(soc);
            let x = model.initial_state();
            let layout = model.layout();
            let node = model.mesh().first_anode();
            let cs_surf = x[layout.offset_cs(node, layout.n_r() - 1)];
            let ce = x[layout.offset_ce(node)];
            let phis = x[layout.offset_phis(node)];
            let phie = x[layout.offset_phie(node)];
            let fwd = model.interfacial_current(node, cs_surf, ce, phis + delta, phie);
            let rev = model.interfacial_current(node, cs_surf, ce, phis - delta, phie);
            prop_assert!((fwd + rev).abs() <= 1e-9 * fwd.abs().max(1.0));
        }
    }
}
