//! Operating protocols.
//!
//! Sign convention: positive C-rate discharges the cell, negative charges it.

use serde::{Deserialize, Serialize};

/// Safety limits checked after every accepted step.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cutoffs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_min_v: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage_max_v: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_max_k: Option<f64>,
}

/// One leg of a pulse train.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseSegment {
    pub rate_c: f64,
    pub duration_s: f64,
}

/// Current program applied to the cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProtocolMode {
    /// Hold the given C-rate until a cutoff or the time limit.
    ConstantCurrent { rate_c: f64 },
    /// Constant current until `hold_voltage_v`, then hold that voltage while
    /// the current tapers; the run completes when |I| falls to `taper_c`.
    ConstantCurrentConstantVoltage {
        rate_c: f64,
        hold_voltage_v: f64,
        taper_c: f64,
    },
    /// Piecewise-constant current segments, including rests at rate 0.
    Pulse { segments: Vec<PulseSegment> },
}

/// A protocol plus the cutoffs that bound it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingProtocol {
    pub mode: ProtocolMode,
    #[serde(default)]
    pub cutoffs: Cutoffs,
}

impl OperatingProtocol {
    pub fn constant_current(rate_c: f64) -> Self {
        Self {
            mode: ProtocolMode::ConstantCurrent { rate_c },
            cutoffs: Cutoffs::default(),
        }
    }

    pub fn cccv(rate_c: f64, hold_voltage_v: f64, taper_c: f64) -> Self {
        Self {
            mode: ProtocolMode::ConstantCurrentConstantVoltage {
                rate_c,
                hold_voltage_v,
                taper_c,
            },
            cutoffs: Cutoffs::default(),
        }
    }

    pub fn pulse(segments: Vec<PulseSegment>) -> Self {
        Self {
            mode: ProtocolMode::Pulse { segments },
            cutoffs: Cutoffs::default(),
        }
    }

    pub fn with_voltage_min(mut self, voltage_v: f64) -> Self {
        self.cutoffs.voltage_min_v = Some(voltage_v);
        self
    }

    pub fn with_voltage_max(mut self, voltage_v: f64) -> Self {
        self.cutoffs.voltage_max_v = Some(voltage_v);
        self
    }

    pub fn with_temperature_max(mut self, temperature_k: f64) -> Self {
        self.cutoffs.temperature_max_k = Some(temperature_k);
        self
    }

    /// Total programmed duration, where the protocol defines one.
    pub fn programmed_duration_s(&self) -> Option<f64> {
        match &self.mode {
            ProtocolMode::Pulse { segments } => {
                Some(segments.iter().map(|s| s.duration_s).sum())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_yaml_round_trip() {
        let protocol = OperatingProtocol::cccv(-0.5, 4.1, 0.05).with_voltage_max(4.3);
        let yaml = serde_yaml::to_string(&protocol).unwrap();
        assert!(yaml.contains("ConstantCurrentConstantVoltage"));
        let back: OperatingProtocol = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(protocol, back);
    }

    #[test]
    fn omitted_cutoffs_default_to_none() {
        let yaml = "mode:\n  type: ConstantCurrent\n  rate_c: 1.0\n";
        let protocol: OperatingProtocol = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(protocol.cutoffs, Cutoffs::default());
        assert!(protocol.cutoffs.voltage_min_v.is_none());
    }

    #[test]
    fn pulse_duration_sums_segments() {
        let protocol = OperatingProtocol::pulse(vec![
            PulseSegment {
                rate_c: 1.0,
                duration_s: 300.0,
            },
            PulseSegment {
                rate_c: 0.0,
                duration_s: 600.0,
            },
        ]);
        assert_eq!(protocol.programmed_duration_s(), Some(900.0));
    }
}
