//! Butler-Volmer charge-transfer kinetics.
//!
//! Shared by the porous-electrode assembler and the single-particle model so
//! both fidelities see the same interfacial current law.

use cf_core::numeric::{Tolerances, nearly_equal};

use crate::error::{MaterialError, MaterialResult};

/// Stoichiometry clamp applied inside kinetic prefactors. Keeps the exchange
/// current and its derivative defined when a solver trial grazes the end of
/// the intercalation range.
pub const SOC_EPS: f64 = 1e-6;

/// Cap on exponential arguments; past this the trial is already hopeless and
/// larger magnitudes only risk overflow.
const EXP_ARG_MAX: f64 = 50.0;

/// Exchange current density [A/m^2].
///
/// `i0 = i0_ref * (ce/ce_ref)^alpha_a * (1-soc)^alpha_a * soc^alpha_c`,
/// normalized so `i0_ref` is recovered at `ce = ce_ref` and full/empty
/// occupancy factors of one.
pub fn exchange_current_density(
    i0_ref: f64,
    ce: f64,
    ce_ref: f64,
    soc_surf: f64,
    alpha_a: f64,
    alpha_c: f64,
) -> f64 {
    let soc = soc_surf.clamp(SOC_EPS, 1.0 - SOC_EPS);
    let ce_term = (ce / ce_ref).max(0.0).powf(alpha_a);
    i0_ref * ce_term * (1.0 - soc).powf(alpha_a) * soc.powf(alpha_c)
}

/// Butler-Volmer current density [A/m^2] for overpotential `eta` [V].
///
/// `j = i0 * (exp(alpha_a*eta/vt) - exp(-alpha_c*eta/vt))` with
/// `vt = RT/F`. Positive current is anodic (lithium leaving the solid).
pub fn butler_volmer(i0: f64, alpha_a: f64, alpha_c: f64, eta: f64, thermal_v: f64) -> f64 {
    let xa = (alpha_a * eta / thermal_v).clamp(-EXP_ARG_MAX, EXP_ARG_MAX);
    let xc = (-alpha_c * eta / thermal_v).clamp(-EXP_ARG_MAX, EXP_ARG_MAX);
    i0 * (xa.exp() - xc.exp())
}

/// Invert the Butler-Volmer law: overpotential [V] that produces current
/// density `j` at exchange current `i0`.
///
/// Symmetric transfer coefficients invert in closed form through asinh; the
/// general case runs a damped Newton iteration seeded from the symmetric
/// estimate. The law is strictly monotonic in `eta`, so the iteration is
/// well posed whenever `i0 > 0`.
pub fn overpotential(
    j: f64,
    i0: f64,
    alpha_a: f64,
    alpha_c: f64,
    thermal_v: f64,
) -> MaterialResult<f64> {
    if !(i0 > 0.0) || !i0.is_finite() {
        return Err(MaterialError::KineticsInversion {
            what: "exchange current density",
        });
    }

    let symmetric_guess = |alpha: f64| (thermal_v / alpha) * (j / (2.0 * i0)).asinh();

    let tol = Tolerances {
        abs: 1e-12,
        rel: 1e-12,
    };
    if nearly_equal(alpha_a, alpha_c, tol) {
        return Ok(symmetric_guess(alpha_a));
    }

    let mut eta = symmetric_guess(0.5 * (alpha_a + alpha_c));
    let tol = 1e-10 * (i0 + j.abs());
    for _ in 0..25 {
        let g = butler_volmer(i0, alpha_a, alpha_c, eta, thermal_v) - j;
        if g.abs() <= tol {
            return Ok(eta);
        }
        let xa = (alpha_a * eta / thermal_v).clamp(-EXP_ARG_MAX, EXP_ARG_MAX);
        let xc = (-alpha_c * eta / thermal_v).clamp(-EXP_ARG_MAX, EXP_ARG_MAX);
        let dg = i0 * (alpha_a / thermal_v * xa.exp() + alpha_c / thermal_v * xc.exp());
        let step = (g / dg).clamp(-0.5, 0.5);
        eta -= step;
        if step.abs() < 1e-15 {
            return Ok(eta);
        }
    }

    Err(MaterialError::KineticsInversion {
        what: "overpotential",
    })
}
