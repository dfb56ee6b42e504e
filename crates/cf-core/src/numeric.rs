use crate::{CfError, CfResult};

/// Floating point type used throughout the engine
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> CfResult<Real> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CfError::NonFinite { what, value: v })
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn comparison_is_symmetric(
            a in -1e9_f64..1e9_f64,
            b in -1e9_f64..1e9_f64,
        ) {
            let tol = Tolerances::default();
            prop_assert_eq!(nearly_equal(a, b, tol), nearly_equal(b, a, tol));
        }

        #[test]
        fn every_finite_value_equals_itself(a in -1e12_f64..1e12_f64) {
            prop_assert!(nearly_equal(a, a, Tolerances::default()));
        }

        #[test]
        fn absolute_tolerance_bounds_acceptance(
            a in -1e3_f64..1e3_f64,
            shift in 0.0_f64..1.0_f64,
        ) {
            let tol = Tolerances { abs: 1e-6, rel: 0.0 };
            let b = a + shift;
            if shift <= 1e-6 {
                prop_assert!(nearly_equal(a, b, tol));
            } else if shift > 2e-6 {
                prop_assert!(!nearly_equal(a, b, tol));
            }
        }

        #[test]
        fn finite_values_pass_through(v in -1e300_f64..1e300_f64) {
            prop_assert_eq!(ensure_finite(v, "v").unwrap(), v);
        }
    }
}
