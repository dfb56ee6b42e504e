//! Damped Newton corrector for one implicit time step.
//!
//! Each iteration refreshes the block Jacobian, solves for the full Newton
//! update, then backtracks with an Armijo test on the residual infinity
//! norm. A trial the assembler refuses (non-finite, depleted electrolyte)
//! counts as insufficient decrease and shortens the step the same way a
//! growing residual does. Concentrations are pulled back into their
//! physical ranges before every evaluation so the kinetics stay defined.

use cf_design::DiscretizationConfig;
use cf_p2d::{BlockTridiag, P2dModel, StepContext};
use nalgebra::DVector;

use crate::error::{SolverError, SolverResult};
use crate::linear::BlockTridiagLu;

/// Occupancy margin kept away from 0 and 1 when clamping solid shells.
const OCC_EPS: f64 = 1e-6;
/// Electrolyte floor as a fraction of the initial concentration.
const CE_FLOOR_FRACTION: f64 = 1e-6;

/// Corrector configuration.
#[derive(Debug, Clone)]
pub struct NewtonConfig {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Residual infinity-norm target
    pub abs_tol: f64,
    /// Scaled update-norm target
    pub rel_tol: f64,
    /// Armijo sufficient-decrease constant
    pub armijo_c: f64,
    /// Smallest line-search damping before the iteration gives up
    pub min_step: f64,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            abs_tol: 1e-6,
            rel_tol: 1e-3,
            armijo_c: 1e-4,
            min_step: 1.0 / 64.0,
        }
    }
}

impl From<&DiscretizationConfig> for NewtonConfig {
    fn from(config: &DiscretizationConfig) -> Self {
        Self {
            max_iterations: config.max_newton_iters,
            abs_tol: config.abs_tol,
            rel_tol: config.rel_tol,
            ..Self::default()
        }
    }
}

/// What one converged step cost.
#[derive(Debug, Clone, Copy)]
pub struct StepReport {
    pub iterations: usize,
    pub residual_norm: f64,
    /// Concentration entries pulled back into range along the way.
    pub clamped: usize,
}

/// Solves the implicit step `R(x) = 0` starting from `x0`.
///
/// `jac` is caller-owned scratch shaped by
/// [`P2dModel::jacobian_template`], reused across steps.
pub fn solve_step(
    model: &P2dModel,
    ctx: &StepContext,
    x0: &DVector<f64>,
    config: &NewtonConfig,
    jac: &mut BlockTridiag,
) -> SolverResult<(DVector<f64>, StepReport)> {
    let mut x = x0.clone();
    let mut clamped = clamp_concentrations(model, &mut x);

    let mut r = DVector::zeros(x.len());
    model.assemble_residual(&x, ctx, &mut r)?;
    let mut r_norm = r.amax();

    if r_norm < config.abs_tol {
        return Ok((
            x,
            StepReport {
                iterations: 0,
                residual_norm: r_norm,
                clamped,
            },
        ));
    }

    for iter in 1..=config.max_iterations {
        model.refresh_jacobian(&x, ctx, jac)?;
        let lu = BlockTridiagLu::factor(jac)?;
        let delta = lu.solve(&(-&r))?;
        if !delta.iter().all(|v| v.is_finite()) {
            return Err(SolverError::NonFinite {
                what: format!("Newton update at iteration {}", iter),
            });
        }

        // backtracking line search
        let mut lambda = 1.0;
        let (x_new, r_new, r_new_norm) = loop {
            let mut trial = &x + lambda * &delta;
            let trial_clamped = clamp_concentrations(model, &mut trial);
            let mut r_trial = DVector::zeros(x.len());
            match model.assemble_residual(&trial, ctx, &mut r_trial) {
                Ok(()) => {
                    let norm = r_trial.amax();
                    if norm <= (1.0 - config.armijo_c * lambda) * r_norm {
                        clamped += trial_clamped;
                        break (trial, r_trial, norm);
                    }
                }
                // a rejected trial backtracks like a rising residual
                Err(_) => {}
            }
            lambda *= 0.5;
            if lambda < config.min_step {
                return Err(SolverError::ConvergenceFailed {
                    what: format!(
                        "line search exhausted at iteration {}, residual {:.3e}",
                        iter, r_norm
                    ),
                });
            }
        };

        let update = lambda * delta.norm() / (x_new.norm() + config.abs_tol);
        x = x_new;
        r = r_new;
        r_norm = r_new_norm;

        if r_norm < config.abs_tol && update < config.rel_tol {
            return Ok((
                x,
                StepReport {
                    iterations: iter,
                    residual_norm: r_norm,
                    clamped,
                },
            ));
        }
    }

    tracing::debug!(residual = r_norm, "corrector ran out of iterations");
    Err(SolverError::ConvergenceFailed {
        what: format!(
            "no convergence in {} iterations, residual {:.3e}",
            config.max_iterations, r_norm
        ),
    })
}

/// Pulls solid occupancies and electrolyte concentrations back into their
/// physical ranges, returning how many entries moved.
fn clamp_concentrations(model: &P2dModel, x: &mut DVector<f64>) -> usize {
    let layout = model.layout();
    let ce_floor = CE_FLOOR_FRACTION * model.electrolyte().c_init_mol_m3;
    let mut count = 0;

    for node in 0..layout.n_nodes() {
        if let Some((electrode, _)) = model.electrode_at(node) {
            let lo = OCC_EPS * electrode.cs_max_mol_m3;
            let hi = (1.0 - OCC_EPS) * electrode.cs_max_mol_m3;
            for shell in 0..layout.n_r() {
                let idx = layout.offset_cs(node, shell);
                if x[idx] < lo {
                    x[idx] = lo;
                    count += 1;
                } else if x[idx] > hi {
                    x[idx] = hi;
                    count += 1;
                }
            }
        }
        let idx = layout.offset_ce(node);
        if x[idx] < ce_floor {
            x[idx] = ce_floor;
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::units::k;
    use cf_design::reference::reference_cell;

    fn model() -> P2dModel {
        let mut config = DiscretizationConfig::default();
        config.n_x = 10;
        config.n_r = 4;
        P2dModel::new(&reference_cell(), &config, k(298.15)).unwrap()
    }

    #[test]
    fn rest_step_converges_without_iterating() {
        let m = model();
        let x0 = m.initial_state();
        let ctx = StepContext {
            prev: &x0,
            dt_s: 1.0,
            applied_current_a: 0.0,
        };
        let mut jac = m.jacobian_template();
        let (x, report) =
            solve_step(&m, &ctx, &x0, &NewtonConfig::default(), &mut jac).unwrap();
        assert_eq!(report.iterations, 0);
        assert_eq!(x, x0);
    }

    #[test]
    fn one_c_step_converges_and_drops_the_voltage() {
        let m = model();
        let x0 = m.initial_state();
        let i = m.current_1c_a();
        let ctx = StepContext {
            prev: &x0,
            dt_s: 1.0,
            applied_current_a: i,
        };
        let mut jac = m.jacobian_template();
        let config = NewtonConfig::default();
        let (x, report) = solve_step(&m, &ctx, &x0, &config, &mut jac).unwrap();

        assert!(report.iterations >= 1);
        assert!(report.residual_norm < config.abs_tol);

        let ocv = m.terminal_voltage(&x0, 0.0);
        let v = m.terminal_voltage(&x, i);
        assert!(v < ocv, "discharge must polarize: {v} vs {ocv}");
        assert!(v > 2.5, "unreasonable first-step voltage {v}");
    }

    #[test]
    fn impossible_tolerance_is_a_step_rejection() {
        let m = model();
        let x0 = m.initial_state();
        let ctx = StepContext {
            prev: &x0,
            dt_s: 30.0,
            applied_current_a: 5.0 * m.current_1c_a(),
        };
        let mut jac = m.jacobian_template();
        let config = NewtonConfig {
            max_iterations: 1,
            abs_tol: 1e-14,
            ..NewtonConfig::default()
        };
        let err = solve_step(&m, &ctx, &x0, &config, &mut jac).unwrap_err();
        assert!(err.is_step_rejection(), "got {err}");
    }

    #[test]
    fn nonphysical_start_is_clamped_back() {
        let m = model();
        let x0 = m.initial_state();
        let mut bad = x0.clone();
        bad[m.layout().offset_ce(2)] = -50.0;
        let ctx = StepContext {
            prev: &x0,
            dt_s: 0.5,
            applied_current_a: 0.0,
        };
        let mut jac = m.jacobian_template();
        let (x, report) =
            solve_step(&m, &ctx, &bad, &NewtonConfig::default(), &mut jac).unwrap();
        assert!(report.clamped >= 1);
        assert!(x[m.layout().offset_ce(2)] > 0.0);
    }
}
