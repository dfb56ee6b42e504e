//! Execution routing rules.
//!
//! Two pure decisions, made before any model is built: which backend a
//! request deserves, and which fidelity should run it. Both look only at
//! the request, so the same request classifies the same way everywhere.

use cf_design::{
    CellDesign, DiscretizationConfig, ModelChoiceDef, OperatingProtocol, ProtocolMode,
};
use cf_sim::Fidelity;
use serde::{Deserialize, Serialize};

/// Unknown count at which a single run outgrows the calling thread.
const ACCELERATED_UNKNOWNS: usize = 2_000;
/// Stacks this deep carry enough state to earn a worker.
const ACCELERATED_LAYERS: u32 = 3;
/// Pulse programs longer than this behave like small sweeps.
const ACCELERATED_SEGMENTS: usize = 16;

/// C-rate up to which the lumped model tracks the full model closely
/// enough for screening work.
const SPM_MAX_RATE_C: f64 = 1.0;

/// Where a request should execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionClass {
    /// Cheap enough to run inline on the calling thread.
    Lightweight,
    /// Large enough for the pooled backend.
    Accelerated,
}

/// Routes a request by its size: mesh unknowns, stack depth, and program
/// length all push toward the pool.
pub fn classify(
    design: &CellDesign,
    protocol: &OperatingProtocol,
    config: &DiscretizationConfig,
) -> ExecutionClass {
    let unknowns = config.n_x * (config.n_r + 3) * design.layer_count as usize;
    if unknowns >= ACCELERATED_UNKNOWNS {
        return ExecutionClass::Accelerated;
    }
    if design.layer_count >= ACCELERATED_LAYERS {
        return ExecutionClass::Accelerated;
    }
    if let ProtocolMode::Pulse { segments } = &protocol.mode
        && segments.len() > ACCELERATED_SEGMENTS
    {
        return ExecutionClass::Accelerated;
    }
    ExecutionClass::Lightweight
}

/// Picks the fidelity for a request. An explicit choice always wins;
/// otherwise gentle constant-current work on a single-layer cell goes to
/// the lumped model and everything else gets the full porous-electrode
/// model.
pub fn select_model(
    design: &CellDesign,
    protocol: &OperatingProtocol,
    choice: Option<Fidelity>,
) -> Fidelity {
    if let Some(fidelity) = choice {
        return fidelity;
    }
    let gentle_cc = matches!(
        &protocol.mode,
        ProtocolMode::ConstantCurrent { rate_c } if rate_c.abs() <= SPM_MAX_RATE_C
    );
    if design.layer_count == 1 && gentle_cc {
        Fidelity::SingleParticle
    } else {
        Fidelity::PseudoTwoDimensional
    }
}

/// Maps the project-file model choice onto a fidelity.
pub fn fidelity_from_choice(choice: ModelChoiceDef) -> Fidelity {
    match choice {
        ModelChoiceDef::SingleParticle => Fidelity::SingleParticle,
        ModelChoiceDef::PseudoTwoDimensional => Fidelity::PseudoTwoDimensional,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_design::PulseSegment;
    use cf_design::reference::reference_cell;

    fn pulse(n: usize) -> OperatingProtocol {
        let segments = (0..n)
            .map(|i| PulseSegment {
                rate_c: if i % 2 == 0 { 1.0 } else { 0.0 },
                duration_s: 10.0,
            })
            .collect();
        OperatingProtocol::pulse(segments)
    }

    #[test]
    fn routine_studies_stay_lightweight() {
        let design = reference_cell();
        let protocol = OperatingProtocol::constant_current(1.0);
        let config = DiscretizationConfig::default();
        assert_eq!(classify(&design, &protocol, &config), ExecutionClass::Lightweight);
    }

    #[test]
    fn fine_meshes_are_accelerated() {
        let design = reference_cell();
        let protocol = OperatingProtocol::constant_current(1.0);
        let config = DiscretizationConfig {
            n_x: 100,
            n_r: 20,
            ..DiscretizationConfig::default()
        };
        assert_eq!(classify(&design, &protocol, &config), ExecutionClass::Accelerated);
    }

    #[test]
    fn thick_stacks_are_accelerated() {
        let mut design = reference_cell();
        design.layer_count = 3;
        let protocol = OperatingProtocol::constant_current(1.0);
        let config = DiscretizationConfig::default();
        assert_eq!(classify(&design, &protocol, &config), ExecutionClass::Accelerated);
    }

    #[test]
    fn long_pulse_trains_are_accelerated() {
        let design = reference_cell();
        let config = DiscretizationConfig::default();
        assert_eq!(classify(&design, &pulse(16), &config), ExecutionClass::Lightweight);
        assert_eq!(classify(&design, &pulse(17), &config), ExecutionClass::Accelerated);
    }

    #[test]
    fn gentle_constant_current_takes_the_lumped_model() {
        let design = reference_cell();
        for rate in [0.2, 1.0, -0.5] {
            let protocol = OperatingProtocol::constant_current(rate);
            assert_eq!(
                select_model(&design, &protocol, None),
                Fidelity::SingleParticle,
                "rate {rate}"
            );
        }
    }

    #[test]
    fn hard_or_structured_programs_take_the_full_model() {
        let design = reference_cell();
        let hard = OperatingProtocol::constant_current(2.0);
        assert_eq!(select_model(&design, &hard, None), Fidelity::PseudoTwoDimensional);

        let cccv = OperatingProtocol::cccv(-1.0, 4.1, 0.05);
        assert_eq!(select_model(&design, &cccv, None), Fidelity::PseudoTwoDimensional);

        assert_eq!(
            select_model(&design, &pulse(4), None),
            Fidelity::PseudoTwoDimensional
        );
    }

    #[test]
    fn multi_layer_designs_never_get_the_lumped_model() {
        let mut design = reference_cell();
        design.layer_count = 2;
        let gentle = OperatingProtocol::constant_current(0.5);
        assert_eq!(select_model(&design, &gentle, None), Fidelity::PseudoTwoDimensional);
    }

    #[test]
    fn explicit_choice_wins() {
        let design = reference_cell();
        let hard = OperatingProtocol::constant_current(3.0);
        assert_eq!(
            select_model(&design, &hard, Some(Fidelity::SingleParticle)),
            Fidelity::SingleParticle
        );
        let gentle = OperatingProtocol::constant_current(0.2);
        assert_eq!(
            select_model(&design, &gentle, Some(Fidelity::PseudoTwoDimensional)),
            Fidelity::PseudoTwoDimensional
        );
    }
}
