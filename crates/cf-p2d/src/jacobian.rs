//! Block-tridiagonal Jacobian of the step residual.
//!
//! Node blocks only couple to their x neighbors, so the Jacobian is stored
//! as three block diagonals and factored by the block solver without ever
//! forming the dense matrix. Transport entries are exact; the Butler-Volmer
//! partials are one-sided finite differences of the kinetics closure, which
//! keeps the assembly in lockstep with whatever the residual evaluates.

use cf_core::constants::FARADAY_C_PER_MOL;
use nalgebra::{DMatrix, DVector};

use crate::error::AssemblyError;
use crate::model::P2dModel;
use crate::residual::StepContext;

/// Relative perturbation for the kinetics partials.
const FD_EPSILON: f64 = 1e-7;

/// Square diagonal blocks plus rectangular off-diagonal couplings.
///
/// `sub[i]` holds block `(i + 1, i)` and `sup[i]` block `(i, i + 1)`;
/// block sizes follow the state layout, so electrode and separator blocks
/// differ in width.
#[derive(Debug, Clone)]
pub struct BlockTridiag {
    sizes: Vec<usize>,
    diag: Vec<DMatrix<f64>>,
    sub: Vec<DMatrix<f64>>,
    sup: Vec<DMatrix<f64>>,
}

impl BlockTridiag {
    pub fn new(sizes: Vec<usize>) -> Self {
        let diag = sizes.iter().map(|&s| DMatrix::zeros(s, s)).collect();
        let sub = sizes
            .windows(2)
            .map(|w| DMatrix::zeros(w[1], w[0]))
            .collect();
        let sup = sizes
            .windows(2)
            .map(|w| DMatrix::zeros(w[0], w[1]))
            .collect();
        Self {
            sizes,
            diag,
            sub,
            sup,
        }
    }

    pub fn n_blocks(&self) -> usize {
        self.sizes.len()
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn n_unknowns(&self) -> usize {
        self.sizes.iter().sum()
    }

    pub fn diag(&self, i: usize) -> &DMatrix<f64> {
        &self.diag[i]
    }

    pub fn diag_mut(&mut self, i: usize) -> &mut DMatrix<f64> {
        &mut self.diag[i]
    }

    /// Block `(i + 1, i)`: rows of node `i + 1`, columns of node `i`.
    pub fn sub(&self, i: usize) -> &DMatrix<f64> {
        &self.sub[i]
    }

    pub fn sub_mut(&mut self, i: usize) -> &mut DMatrix<f64> {
        &mut self.sub[i]
    }

    /// Block `(i, i + 1)`: rows of node `i`, columns of node `i + 1`.
    pub fn sup(&self, i: usize) -> &DMatrix<f64> {
        &self.sup[i]
    }

    pub fn sup_mut(&mut self, i: usize) -> &mut DMatrix<f64> {
        &mut self.sup[i]
    }

    pub fn clear(&mut self) {
        for block in self
            .diag
            .iter_mut()
            .chain(self.sub.iter_mut())
            .chain(self.sup.iter_mut())
        {
            block.fill(0.0);
        }
    }

    /// Expands to a dense matrix. Test and diagnostic use only.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let total = self.n_unknowns();
        let mut dense = DMatrix::zeros(total, total);
        let mut starts = Vec::with_capacity(self.sizes.len() + 1);
        let mut acc = 0;
        for &s in &self.sizes {
            starts.push(acc);
            acc += s;
        }
        starts.push(acc);

        for (i, block) in self.diag.iter().enumerate() {
            dense
                .view_mut((starts[i], starts[i]), (self.sizes[i], self.sizes[i]))
                .copy_from(block);
        }
        for (i, block) in self.sub.iter().enumerate() {
            dense
                .view_mut((starts[i + 1], starts[i]), (self.sizes[i + 1], self.sizes[i]))
                .copy_from(block);
        }
        for (i, block) in self.sup.iter().enumerate() {
            dense
                .view_mut((starts[i], starts[i + 1]), (self.sizes[i], self.sizes[i + 1]))
                .copy_from(block);
        }
        dense
    }
}

/// Kinetics sensitivities at one electrode node.
#[derive(Debug, Clone, Copy, Default)]
struct BvPartials {
    d_cs: f64,
    d_ce: f64,
    d_phis: f64,
    d_phie: f64,
}

impl P2dModel {
    /// Allocates a Jacobian shaped for this model's layout, reused across
    /// steps.
    pub fn jacobian_template(&self) -> BlockTridiag {
        let layout = self.layout();
        BlockTridiag::new(
            (0..layout.n_nodes())
                .map(|node| layout.block_size(node))
                .collect(),
        )
    }

    /// Partials of the interfacial current by forward differences,
    /// stepped `eps * |x|` with a floor at the natural scale of each input.
    fn bv_partials(&self, node: usize, cs_surf: f64, ce: f64, phis: f64, phie: f64) -> BvPartials {
        let cs_scale = match self.electrode_at(node) {
            Some((electrode, _)) => electrode.cs_max_mol_m3,
            None => return BvPartials::default(),
        };
        let j0 = self.interfacial_current(node, cs_surf, ce, phis, phie);
        let step = |x: f64, scale: f64| FD_EPSILON * x.abs().max(scale);

        let h = step(cs_surf, cs_scale);
        let d_cs = (self.interfacial_current(node, cs_surf + h, ce, phis, phie) - j0) / h;
        let h = step(ce, self.ce_ref());
        let d_ce = (self.interfacial_current(node, cs_surf, ce + h, phis, phie) - j0) / h;
        let h = step(phis, 1.0);
        let d_phis = (self.interfacial_current(node, cs_surf, ce, phis + h, phie) - j0) / h;
        let h = step(phie, 1.0);
        let d_phie = (self.interfacial_current(node, cs_surf, ce, phis, phie + h) - j0) / h;

        BvPartials {
            d_cs,
            d_ce,
            d_phis,
            d_phie,
        }
    }

    /// Rebuilds every Jacobian entry at `trial`. Mirrors
    /// [`assemble_residual`](Self::assemble_residual) row for row.
    pub fn refresh_jacobian(
        &self,
        trial: &DVector<f64>,
        ctx: &StepContext,
        jac: &mut BlockTridiag,
    ) -> Result<(), AssemblyError> {
        let layout = self.layout();
        let mesh = self.mesh();
        let n = mesh.n_nodes();
        debug_assert_eq!(jac.n_blocks(), n);

        self.check_trial(trial)?;
        jac.clear();

        let dt = ctx.dt_s;
        let t_plus = self.electrolyte().t_plus;
        let kd = self.kd_factor_v();
        let inv_i = 1.0 / self.i_scale();
        let inv_ce_ref = 1.0 / self.ce_ref();
        let ground_row = layout.offset_phis(n - 1);

        for node in 0..n {
            let base = layout.block_range(node).start;
            let l_ce = layout.offset_ce(node) - base;
            let l_phie = layout.offset_phie(node) - base;
            let dx = mesh.nodes()[node].dx_m;
            let ce = trial[layout.offset_ce(node)];
            let a = self.spec_area(node);

            let bv = if layout.has_particle(node) {
                let cs_surf = trial[layout.offset_cs(node, layout.n_r() - 1)];
                let phis = trial[layout.offset_phis(node)];
                let phie = trial[layout.offset_phie(node)];
                self.bv_partials(node, cs_surf, ce, phis, phie)
            } else {
                BvPartials::default()
            };

            // -- solid diffusion ------------------------------------------------
            if let Some((electrode, radial)) = self.electrode_at(node) {
                let n_r = layout.n_r();
                let dr = radial.dr_m;
                let ds = electrode.d_s_m2_s;
                let inv_cs = 1.0 / electrode.cs_max_mol_m3;
                let l_phis = layout.offset_phis(node) - base;

                for shell in 0..n_r {
                    let vol = radial.shell_volumes_m3[shell];
                    let k = dt * ds / (vol * dr);

                    jac.diag_mut(node)[(shell, shell)] += inv_cs;
                    if shell > 0 {
                        let c = k * radial.face_areas_m2[shell] * inv_cs;
                        jac.diag_mut(node)[(shell, shell)] += c;
                        jac.diag_mut(node)[(shell, shell - 1)] -= c;
                    }
                    if shell + 1 < n_r {
                        let c = k * radial.face_areas_m2[shell + 1] * inv_cs;
                        jac.diag_mut(node)[(shell, shell)] += c;
                        jac.diag_mut(node)[(shell, shell + 1)] -= c;
                    } else {
                        let w = dt * radial.face_areas_m2[n_r]
                            / (vol * FARADAY_C_PER_MOL)
                            * inv_cs;
                        jac.diag_mut(node)[(shell, shell)] += w * bv.d_cs;
                        jac.diag_mut(node)[(shell, l_ce)] += w * bv.d_ce;
                        jac.diag_mut(node)[(shell, l_phis)] += w * bv.d_phis;
                        jac.diag_mut(node)[(shell, l_phie)] += w * bv.d_phie;
                    }
                }
            }

            // -- electrolyte mass -----------------------------------------------
            jac.diag_mut(node)[(l_ce, l_ce)] += self.porosity(node) * inv_ce_ref;
            if node + 1 < n {
                let g = self.g_d(node + 1);
                let r_base = layout.block_range(node + 1).start;
                let r_ce = layout.offset_ce(node + 1) - r_base;
                jac.diag_mut(node)[(l_ce, l_ce)] += dt / dx * g * inv_ce_ref;
                jac.sup_mut(node)[(l_ce, r_ce)] -= dt / dx * g * inv_ce_ref;
            }
            if node > 0 {
                let g = self.g_d(node);
                let left_base = layout.block_range(node - 1).start;
                let left_ce = layout.offset_ce(node - 1) - left_base;
                jac.diag_mut(node)[(l_ce, l_ce)] += dt / dx * g * inv_ce_ref;
                jac.sub_mut(node - 1)[(l_ce, left_ce)] -= dt / dx * g * inv_ce_ref;
            }
            if layout.has_particle(node) {
                let s_c = dt * (1.0 - t_plus) / FARADAY_C_PER_MOL * a * inv_ce_ref;
                let l_phis = layout.offset_phis(node) - base;
                jac.diag_mut(node)[(l_ce, l_ce)] -= s_c * bv.d_ce;
                jac.diag_mut(node)[(l_ce, layout.n_r() - 1)] -= s_c * bv.d_cs;
                jac.diag_mut(node)[(l_ce, l_phis)] -= s_c * bv.d_phis;
                jac.diag_mut(node)[(l_ce, l_phie)] -= s_c * bv.d_phie;
            }

            // -- electrolyte charge ----------------------------------------------
            if node + 1 < n {
                let g = self.g_k(node + 1);
                let r_base = layout.block_range(node + 1).start;
                let r_ce = layout.offset_ce(node + 1) - r_base;
                let r_phie = layout.offset_phie(node + 1) - r_base;
                let ce_r = trial[layout.offset_ce(node + 1)];
                jac.diag_mut(node)[(l_phie, l_phie)] -= g * inv_i;
                jac.sup_mut(node)[(l_phie, r_phie)] += g * inv_i;
                jac.diag_mut(node)[(l_phie, l_ce)] += kd * g / ce * inv_i;
                jac.sup_mut(node)[(l_phie, r_ce)] -= kd * g / ce_r * inv_i;
            }
            if node > 0 {
                let g = self.g_k(node);
                let left_base = layout.block_range(node - 1).start;
                let left_ce = layout.offset_ce(node - 1) - left_base;
                let left_phie = layout.offset_phie(node - 1) - left_base;
                let ce_l = trial[layout.offset_ce(node - 1)];
                jac.diag_mut(node)[(l_phie, l_phie)] -= g * inv_i;
                jac.sub_mut(node - 1)[(l_phie, left_phie)] += g * inv_i;
                jac.diag_mut(node)[(l_phie, l_ce)] += kd * g / ce * inv_i;
                jac.sub_mut(node - 1)[(l_phie, left_ce)] -= kd * g / ce_l * inv_i;
            }
            if layout.has_particle(node) {
                let w = a * dx * inv_i;
                let l_phis = layout.offset_phis(node) - base;
                jac.diag_mut(node)[(l_phie, l_phie)] += w * bv.d_phie;
                jac.diag_mut(node)[(l_phie, layout.n_r() - 1)] += w * bv.d_cs;
                jac.diag_mut(node)[(l_phie, l_ce)] += w * bv.d_ce;
                jac.diag_mut(node)[(l_phie, l_phis)] += w * bv.d_phis;
            }

            // -- solid charge -----------------------------------------------------
            if layout.has_particle(node) {
                let l_phis = layout.offset_phis(node) - base;
                if layout.offset_phis(node) == ground_row {
                    jac.diag_mut(node)[(l_phis, l_phis)] += 1.0;
                } else {
                    let w = a * dx * inv_i;
                    jac.diag_mut(node)[(l_phis, l_phis)] -= w * bv.d_phis;
                    jac.diag_mut(node)[(l_phis, layout.n_r() - 1)] -= w * bv.d_cs;
                    jac.diag_mut(node)[(l_phis, l_ce)] -= w * bv.d_ce;
                    jac.diag_mut(node)[(l_phis, l_phie)] -= w * bv.d_phie;

                    if node + 1 < n && self.g_s(node + 1) > 0.0 {
                        let g = self.g_s(node + 1);
                        let r_base = layout.block_range(node + 1).start;
                        let r_phis = layout.offset_phis(node + 1) - r_base;
                        jac.diag_mut(node)[(l_phis, l_phis)] -= g * inv_i;
                        jac.sup_mut(node)[(l_phis, r_phis)] += g * inv_i;
                    }
                    if node > 0 && self.g_s(node) > 0.0 {
                        let g = self.g_s(node);
                        let left_base = layout.block_range(node - 1).start;
                        let left_phis = layout.offset_phis(node - 1) - left_base;
                        jac.diag_mut(node)[(l_phis, l_phis)] -= g * inv_i;
                        jac.sub_mut(node - 1)[(l_phis, left_phis)] += g * inv_i;
                    }
                }
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
        config.n_x = 8;
        config.n_r = 3;
        P2dModel::new(&reference_cell(), &config, k(298.15)).unwrap()
    }

    #[test]
    fn template_matches_layout() {
        let model = small_model();
        let jac = model.jacobian_template();
        let layout = model.layout();
        assert_eq!(jac.n_blocks(), layout.n_nodes());
        assert_eq!(jac.n_unknowns(), layout.n_unknowns());
        for node in 0..layout.n_nodes() {
            assert_eq!(jac.diag(node).nrows(), layout.block_size(node));
        }
        let dense = jac.to_dense();
        assert_eq!(dense.nrows(), layout.n_unknowns());
    }

    #[test]
    fn off_diagonal_blocks_are_rectangular_at_the_interfaces() {
        let model = small_model();
        let jac = model.jacobian_template();
        let last_cathode = model.mesh().n_cathode() - 1;
        // electrode rows x separator columns
        let block = jac.sup(last_cathode);
        assert_eq!(block.nrows(), model.layout().block_size(last_cathode));
        assert_eq!(block.ncols(), 2);
    }

    #[test]
    fn ground_row_is_a_unit_row() {
        let model = small_model();
        let x = model.initial_state();
        let mut jac = model.jacobian_template();
        let ctx = StepContext {
            prev: &x,
            dt_s: 1.0,
            applied_current_a: 0.0,
        };
        model.refresh_jacobian(&x, &ctx, &mut jac).unwrap();

        let dense = jac.to_dense();
        let row = model.layout().offset_phis(model.mesh().n_nodes() - 1);
        for col in 0..dense.ncols() {
            let expected = if col == row { 1.0 } else { 0.0 };
            assert_eq!(dense[(row, col)], expected, "column {col}");
        }
    }

    #[test]
    fn concentration_diagonals_are_positive() {
        let model = small_model();
        let x = model.initial_state();
        let mut jac = model.jacobian_template();
        let ctx = StepContext {
            prev: &x,
            dt_s: 2.0,
            applied_current_a: model.current_1c_a(),
        };
        model.refresh_jacobian(&x, &ctx, &mut jac).unwrap();

        let layout = model.layout();
        for node in 0..model.mesh().n_nodes() {
            let base = layout.block_range(node).start;
            let l_ce = layout.offset_ce(node) - base;
            assert!(jac.diag(node)[(l_ce, l_ce)] > 0.0);
            if layout.has_particle(node) {
                for shell in 0..layout.n_r() {
                    assert!(jac.diag(node)[(shell, shell)] > 0.0);
                }
            }
        }
    }
}
