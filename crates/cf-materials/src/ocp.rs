//! Compiled open-circuit potential curves.

use crate::error::{MaterialError, MaterialResult};
use crate::spec::OcpPoint;

/// Wiggle allowed in the monotonicity check [V]. Digitized curves carry
/// sub-millivolt noise; anything larger is a data error.
const MONOTONIC_TOL_V: f64 = 1e-4;

/// Piecewise-linear U(soc) with precomputed segment slopes.
///
/// Evaluation extrapolates flat outside the tabulated range so that surface
/// stoichiometries slightly past the table never produce runaway potentials.
#[derive(Debug, Clone, PartialEq)]
pub struct OcpCurve {
    soc: Vec<f64>,
    voltage: Vec<f64>,
    slope: Vec<f64>,
}

impl OcpCurve {
    pub fn new(material: &str, points: &[OcpPoint]) -> MaterialResult<Self> {
        if points.len() < 2 {
            return Err(MaterialError::OcpTableTooShort {
                material: material.to_string(),
                len: points.len(),
            });
        }

        for (i, w) in points.windows(2).enumerate() {
            if w[1].soc <= w[0].soc {
                return Err(MaterialError::NonIncreasingSoc {
                    material: material.to_string(),
                    index: i + 1,
                });
            }
        }

        // Direction from the end points, violations judged against it.
        let descending = points[points.len() - 1].voltage_v < points[0].voltage_v;
        for w in points.windows(2) {
            let dv = w[1].voltage_v - w[0].voltage_v;
            let against = if descending { dv > 0.0 } else { dv < 0.0 };
            if against && dv.abs() > MONOTONIC_TOL_V {
                return Err(MaterialError::NonMonotonicOcp {
                    material: material.to_string(),
                    soc: w[0].soc,
                });
            }
        }

        let soc: Vec<f64> = points.iter().map(|p| p.soc).collect();
        let voltage: Vec<f64> = points.iter().map(|p| p.voltage_v).collect();
        let slope: Vec<f64> = points
            .windows(2)
            .map(|w| (w[1].voltage_v - w[0].voltage_v) / (w[1].soc - w[0].soc))
            .collect();

        Ok(Self {
            soc,
            voltage,
            slope,
        })
    }

    /// U(soc) [V], flat beyond the tabulated range.
    pub fn value(&self, soc: f64) -> f64 {
        let n = self.soc.len();
        if soc <= self.soc[0] {
            return self.voltage[0];
        }
        if soc >= self.soc[n - 1] {
            return self.voltage[n - 1];
        }
        let seg = self.segment(soc);
        self.voltage[seg] + self.slope[seg] * (soc - self.soc[seg])
    }

    /// dU/dsoc [V], zero beyond the tabulated range.
    pub fn derivative(&self, soc: f64) -> f64 {
        let n = self.soc.len();
        if soc <= self.soc[0] || soc >= self.soc[n - 1] {
            return 0.0;
        }
        self.slope[self.segment(soc)]
    }

    pub fn soc_span(&self) -> (f64, f64) {
        (self.soc[0], self.soc[self.soc.len() - 1])
    }

    fn segment(&self, soc: f64) -> usize {
        // partition_point returns the first index with soc[i] > soc; the
        // segment starts one before it.
        let idx = self.soc.partition_point(|&s| s <= soc);
        idx.saturating_sub(1).min(self.slope.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<OcpPoint> {
        vec![
            OcpPoint {
                soc: 0.2,
                voltage_v: 4.2,
            },
            OcpPoint {
                soc: 0.5,
                voltage_v: 3.8,
            },
            OcpPoint {
                soc: 0.8,
                voltage_v: 3.5,
            },
            OcpPoint {
                soc: 1.0,
                voltage_v: 3.0,
            },
        ]
    }

    #[test]
    fn interpolates_between_points() {
        let curve = OcpCurve::new("test", &table()).unwrap();
        assert!((curve.value(0.35) - 4.0).abs() < 1e-12);
        assert!((curve.value(0.5) - 3.8).abs() < 1e-12);
    }

    #[test]
    fn extrapolates_flat() {
        let curve = OcpCurve::new("test", &table()).unwrap();
        assert_eq!(curve.value(0.0), 4.2);
        assert_eq!(curve.value(1.5), 3.0);
        assert_eq!(curve.derivative(0.0), 0.0);
        assert_eq!(curve.derivative(1.5), 0.0);
    }

    #[test]
    fn derivative_matches_segment_slope() {
        let curve = OcpCurve::new("test", &table()).unwrap();
        let expected = (3.8 - 4.2) / (0.5 - 0.2);
        assert!((curve.derivative(0.35) - expected).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_monotonic_voltage() {
        let mut pts = table();
        pts[2].voltage_v = 4.5; // reversal well beyond tolerance
        let err = OcpCurve::new("bad", &pts).unwrap_err();
        assert!(matches!(err, MaterialError::NonMonotonicOcp { .. }));
    }

    #[test]
    fn rejects_short_table() {
        let pts = [OcpPoint {
            soc: 0.5,
            voltage_v: 3.7,
        }];
        let err = OcpCurve::new("bad", &pts).unwrap_err();
        assert!(matches!(err, MaterialError::OcpTableTooShort { len: 1, .. }));
    }

    #[test]
    fn rejects_unsorted_soc() {
        let mut pts = table();
        pts[2].soc = 0.4;
        let err = OcpCurve::new("bad", &pts).unwrap_err();
        assert!(matches!(err, MaterialError::NonIncreasingSoc { .. }));
    }
}
