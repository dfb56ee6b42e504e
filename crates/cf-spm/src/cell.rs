//! The single-particle model wrapped for the protocol driver.

use cf_core::units::Temperature;
use cf_design::CellDesign;
use cf_sim::{CellModel, Fidelity, ProfileSnapshot, SimError, SimResult, StepOutcome};

use crate::error::SpmResult;
use crate::model::{SpmModel, SpmState};

/// Committed-state stepping over an [`SpmModel`].
pub struct SpmCell {
    model: SpmModel,
    state: SpmState,
    prev_state: SpmState,
    /// Last committed terminal voltage, the fallback when a later kinetic
    /// inversion fails.
    last_voltage_v: f64,
    prev_voltage_v: f64,
}

impl SpmCell {
    pub fn new(design: &CellDesign, temperature: Temperature) -> SpmResult<Self> {
        let model = SpmModel::new(design, temperature)?;
        let state = model.initial_state();
        let rest_v = model.terminal_voltage(&state, 0.0)?;
        Ok(Self {
            model,
            state,
            prev_state: state,
            last_voltage_v: rest_v,
            prev_voltage_v: rest_v,
        })
    }

    pub fn model(&self) -> &SpmModel {
        &self.model
    }

    pub fn state(&self) -> &SpmState {
        &self.state
    }
}

impl CellModel for SpmCell {
    fn try_step(&mut self, dt_s: f64, current_a: f64) -> SimResult<StepOutcome> {
        if !(dt_s.is_finite() && dt_s > 0.0) {
            return Err(SimError::InvalidArg {
                what: "step width must be positive and finite",
            });
        }
        if !current_a.is_finite() {
            return Err(SimError::InvalidArg {
                what: "applied current must be finite",
            });
        }

        let next = self.model.step(&self.state, dt_s, current_a);
        if let Some(why) = out_of_range(&self.model, &next) {
            return Ok(StepOutcome::Rejected { why });
        }
        let v = match self.model.terminal_voltage(&next, current_a) {
            Ok(v) if v.is_finite() => v,
            Ok(v) => {
                return Ok(StepOutcome::Rejected {
                    why: format!("non-finite terminal voltage {v}"),
                });
            }
            Err(e) => return Ok(StepOutcome::Rejected { why: e.to_string() }),
        };

        self.prev_state = std::mem::replace(&mut self.state, next);
        self.prev_voltage_v = std::mem::replace(&mut self.last_voltage_v, v);
        Ok(StepOutcome::Accepted {
            iterations: 1,
            residual_norm: 0.0,
            clamped: 0,
        })
    }

    fn rollback(&mut self) {
        self.state = self.prev_state;
        self.last_voltage_v = self.prev_voltage_v;
    }

    fn voltage(&self, current_a: f64) -> f64 {
        self.model
            .terminal_voltage(&self.state, current_a)
            .unwrap_or(self.last_voltage_v)
    }

    fn fidelity(&self) -> Fidelity {
        Fidelity::SingleParticle
    }

    fn current_1c_a(&self) -> f64 {
        self.model.current_1c_a()
    }

    fn temperature_k(&self) -> f64 {
        self.model.temperature_k()
    }

    fn anode_soc(&self) -> f64 {
        self.model.anode_mean_occupancy(&self.state)
    }

    fn cathode_soc(&self) -> f64 {
        self.model.cathode_mean_occupancy(&self.state)
    }

    /// The lumped model has no through-thickness resolution.
    fn profile_snapshot(&self, _time_s: f64) -> Option<ProfileSnapshot> {
        None
    }
}

fn out_of_range(model: &SpmModel, state: &SpmState) -> Option<String> {
    let checks = [
        (
            "cathode",
            model.cathode_mean_occupancy(state),
            model.cathode_surface_occupancy(state),
        ),
        (
            "anode",
            model.anode_mean_occupancy(state),
            model.anode_surface_occupancy(state),
        ),
    ];
    for (slot, mean, surface) in checks {
        if !(0.0..=1.0).contains(&mean) {
            return Some(format!("{slot} mean occupancy {mean:.4} left [0, 1]"));
        }
        if !(0.0..=1.0).contains(&surface) {
            return Some(format!("{slot} surface occupancy {surface:.4} left [0, 1]"));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::units::k;
    use cf_design::reference::reference_cell_at_soc;

    fn cell() -> SpmCell {
        SpmCell::new(&reference_cell_at_soc(0.5), k(298.15)).unwrap()
    }

    #[test]
    fn accepted_step_commits_and_rolls_back() {
        let mut cell = cell();
        let before = *cell.state();
        let v_before = cell.voltage(0.0);
        let i = cell.current_1c_a();

        match cell.try_step(1.0, i).unwrap() {
            StepOutcome::Accepted { iterations, .. } => assert_eq!(iterations, 1),
            StepOutcome::Rejected { why } => panic!("mild step rejected: {why}"),
        }
        assert_ne!(*cell.state(), before);

        cell.rollback();
        assert_eq!(*cell.state(), before);
        assert_eq!(cell.voltage(0.0), v_before);
    }

    #[test]
    fn draining_the_particle_is_rejected_not_fatal() {
        let mut cell = cell();
        let before = *cell.state();
        // one enormous step empties the anode's mean concentration
        let outcome = cell.try_step(3600.0, 10.0 * cell.current_1c_a()).unwrap();
        match outcome {
            StepOutcome::Rejected { why } => {
                assert!(why.contains("occupancy"), "unexpected reason: {why}")
            }
            StepOutcome::Accepted { .. } => panic!("expected a rejection"),
        }
        assert_eq!(*cell.state(), before, "rejection must not move the state");
    }

    #[test]
    fn no_spatial_snapshot_for_the_lumped_model() {
        let cell = cell();
        assert!(cell.profile_snapshot(0.0).is_none());
        assert_eq!(cell.fidelity(), Fidelity::SingleParticle);
    }
}
