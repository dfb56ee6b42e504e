//! The pseudo-2D model wrapped for the protocol driver.

use cf_core::units::Temperature;
use cf_design::{CellDesign, DiscretizationConfig};
use cf_mesh::Region;
use cf_p2d::{BlockTridiag, P2dModel, StepContext};
use cf_solver::{NewtonConfig, solve_step};
use nalgebra::DVector;

use crate::error::SimResult;
use crate::model::{CellModel, Fidelity, StepOutcome};
use crate::result::ProfileSnapshot;

/// Committed-state stepping over a [`P2dModel`].
pub struct P2dCell {
    model: P2dModel,
    newton: NewtonConfig,
    jac: BlockTridiag,
    state: DVector<f64>,
    prev: DVector<f64>,
}

impl P2dCell {
    pub fn new(
        design: &CellDesign,
        config: &DiscretizationConfig,
        temperature: Temperature,
    ) -> SimResult<Self> {
        let model = P2dModel::new(design, config, temperature)?;
        let jac = model.jacobian_template();
        let state = model.initial_state();
        let prev = state.clone();
        Ok(Self {
            model,
            newton: NewtonConfig::from(config),
            jac,
            state,
            prev,
        })
    }

    pub fn model(&self) -> &P2dModel {
        &self.model
    }

    pub fn state(&self) -> &DVector<f64> {
        &self.state
    }
}

impl CellModel for P2dCell {
    fn try_step(&mut self, dt_s: f64, current_a: f64) -> SimResult<StepOutcome> {
        let ctx = StepContext {
            prev: &self.state,
            dt_s,
            applied_current_a: current_a,
        };
        // previous state doubles as the predictor
        match solve_step(&self.model, &ctx, &self.state, &self.newton, &mut self.jac) {
            Ok((x, report)) => {
                self.prev = std::mem::replace(&mut self.state, x);
                Ok(StepOutcome::Accepted {
                    iterations: report.iterations,
                    residual_norm: report.residual_norm,
                    clamped: report.clamped,
                })
            }
            Err(e) if e.is_step_rejection() => Ok(StepOutcome::Rejected { why: e.to_string() }),
            Err(e) => Err(e.into()),
        }
    }

    fn rollback(&mut self) {
        self.state = self.prev.clone();
    }

    fn voltage(&self, current_a: f64) -> f64 {
        self.model.terminal_voltage(&self.state, current_a)
    }

    fn fidelity(&self) -> Fidelity {
        Fidelity::PseudoTwoDimensional
    }

    fn current_1c_a(&self) -> f64 {
        self.model.current_1c_a()
    }

    fn temperature_k(&self) -> f64 {
        self.model.temperature_k()
    }

    fn anode_soc(&self) -> f64 {
        self.model.electrode_mean_soc(&self.state, Region::Anode)
    }

    fn cathode_soc(&self) -> f64 {
        self.model.electrode_mean_soc(&self.state, Region::Cathode)
    }

    fn profile_snapshot(&self, time_s: f64) -> Option<ProfileSnapshot> {
        Some(ProfileSnapshot {
            time_s,
            x_m: self.model.node_positions_m(),
            ce_mol_m3: self.model.electrolyte_profile(&self.state),
            phie_v: self.model.phie_profile(&self.state),
            phis_v: self.model.phis_profile(&self.state),
            surface_soc: self.model.surface_soc_profile(&self.state),
        })
    }
}
