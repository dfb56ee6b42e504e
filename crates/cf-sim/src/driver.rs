//! Protocol driver: adaptive implicit stepping over a [`CellModel`].
//!
//! The driver owns step-size policy and protocol interpretation; the model
//! only knows how to take one implicit step. Steps grow 1.5x while the
//! corrector converges easily and halve on rejection, retrying from the
//! committed state. When the step collapses below the configured minimum
//! the run ends with `Termination::Convergence` and keeps its partial
//! samples; budgets and cancellation end runs the same graceful way.

use std::time::Instant;

use cf_core::numeric::ensure_finite;
use cf_design::{DiscretizationConfig, OperatingProtocol, ProfileRecording, ProtocolMode};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::{SimError, SimResult};
use crate::model::{CellModel, StepOutcome};
use crate::result::{Sample, SimulationResult, SolveStats, Termination};

/// Slack when comparing simulated times.
const TIME_EPS: f64 = 1e-9;
/// Voltage tolerance for the constant-voltage hold.
const HOLD_V_TOL: f64 = 1e-3;
/// Secant iterations per constant-voltage step.
const MAX_SECANT_ITERS: usize = 16;

/// Wall-clock and step limits for one run.
#[derive(Debug, Clone)]
pub struct RunBudget {
    /// Wall-clock ceiling for the whole run.
    pub wall_clock_s: Option<f64>,
    /// Hard cap on attempted steps, a guard against runaway loops.
    pub max_steps: usize,
}

impl Default for RunBudget {
    fn default() -> Self {
        Self {
            wall_clock_s: None,
            max_steps: 2_000_000,
        }
    }
}

/// Driver telemetry emitted after every accepted step.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub time_s: f64,
    /// Accepted steps so far.
    pub step: usize,
    pub dt_s: f64,
    pub voltage_v: f64,
    pub current_a: f64,
    pub newton_iterations: usize,
    pub residual_norm: f64,
}

/// External handles on a running simulation.
pub struct RunControls<'a> {
    pub budget: RunBudget,
    pub cancel: Option<CancelToken>,
    pub progress: Option<&'a mut dyn FnMut(&ProgressEvent)>,
}

impl Default for RunControls<'_> {
    fn default() -> Self {
        Self {
            budget: RunBudget::default(),
            cancel: None,
            progress: None,
        }
    }
}

/// Runs a protocol to termination with default controls.
pub fn run_protocol<M: CellModel>(
    cell: &mut M,
    protocol: &OperatingProtocol,
    config: &DiscretizationConfig,
) -> SimResult<SimulationResult> {
    run_protocol_with_controls(cell, protocol, config, RunControls::default())
}

enum Phase {
    /// Follow the programmed current.
    Program,
    /// Constant-voltage hold; the payload is the last committed current.
    Hold { current_a: f64 },
}

struct Committed {
    current_a: f64,
    iterations: usize,
    clamped: usize,
    residual_norm: f64,
}

struct RunState {
    t: f64,
    dt: f64,
    capacity_ah: f64,
    last_current_a: f64,
    samples: Vec<Sample>,
    profiles: Vec<crate::result::ProfileSnapshot>,
    stats: SolveStats,
}

impl RunState {
    fn sample<M: CellModel>(&mut self, cell: &M) {
        self.samples.push(Sample {
            time_s: self.t,
            current_a: self.last_current_a,
            voltage_v: cell.voltage(self.last_current_a),
            capacity_ah: self.capacity_ah,
            anode_soc: cell.anode_soc(),
            cathode_soc: cell.cathode_soc(),
        });
    }

    fn finish<M: CellModel>(
        mut self,
        cell: &M,
        start: &Instant,
        termination: Termination,
    ) -> SimulationResult {
        let needs_final = self
            .samples
            .last()
            .map(|s| (s.time_s - self.t).abs() > TIME_EPS)
            .unwrap_or(true);
        if needs_final {
            self.sample(cell);
        }
        self.stats.wall_time_s = start.elapsed().as_secs_f64();
        debug!(
            reason = termination.reason_code(),
            time_s = self.t,
            accepted = self.stats.steps_accepted,
            rejected = self.stats.steps_rejected,
            "run finished"
        );
        SimulationResult {
            termination,
            samples: self.samples,
            profiles: self.profiles,
            stats: self.stats,
        }
    }
}

/// Runs a protocol to termination.
///
/// Everything short of a fatal solver or setup error is `Ok`: cutoffs,
/// completed programs, step-control collapse, budgets, and cancellation
/// all return a result carrying the samples committed so far.
pub fn run_protocol_with_controls<M: CellModel>(
    cell: &mut M,
    protocol: &OperatingProtocol,
    config: &DiscretizationConfig,
    mut controls: RunControls<'_>,
) -> SimResult<SimulationResult> {
    if !(config.dt_min_s > 0.0 && config.dt_min_s <= config.dt_init_s) {
        return Err(SimError::InvalidArg {
            what: "dt_min_s must be positive and at most dt_init_s",
        });
    }
    if config.dt_max_s < config.dt_init_s {
        return Err(SimError::InvalidArg {
            what: "dt_max_s must be at least dt_init_s",
        });
    }
    if config.record_every == 0 {
        return Err(SimError::InvalidArg {
            what: "record_every must be at least 1",
        });
    }

    let i_1c = cell.current_1c_a();
    check_finite(i_1c, "1C current scale")?;
    let t_end = time_horizon(protocol, config)?;
    let horizon_termination = match protocol.programmed_duration_s() {
        Some(d) if t_end >= d - TIME_EPS => Termination::ProtocolComplete,
        _ => Termination::TimeLimit,
    };

    // cumulative (end_time, current) per pulse segment
    let mut pulse_ends: Vec<(f64, f64)> = Vec::new();
    if let ProtocolMode::Pulse { segments } = &protocol.mode {
        let mut acc = 0.0;
        for seg in segments {
            acc += seg.duration_s;
            pulse_ends.push((acc, seg.rate_c * i_1c));
        }
    }

    let mut profile_times = match &config.profiles {
        ProfileRecording::AtTimes { times_s } => {
            let mut v = times_s.clone();
            v.sort_by(f64::total_cmp);
            v
        }
        _ => Vec::new(),
    };
    profile_times.retain(|t| t.is_finite());
    let mut next_profile = 0usize;

    let start = Instant::now();
    let mut state = RunState {
        t: 0.0,
        dt: config.dt_init_s.min(config.dt_max_s),
        capacity_ah: 0.0,
        last_current_a: 0.0,
        samples: Vec::new(),
        profiles: Vec::new(),
        stats: SolveStats::default(),
    };
    let mut phase = Phase::Program;

    // rest state before the program starts
    state.sample(cell);

    if let Some(t_max) = protocol.cutoffs.temperature_max_k
        && cell.temperature_k() >= t_max
    {
        return Ok(state.finish(cell, &start, Termination::TemperatureCutoff));
    }

    loop {
        if let Some(token) = &controls.cancel
            && token.is_cancelled()
        {
            return Ok(state.finish(cell, &start, Termination::Cancelled));
        }
        let elapsed = start.elapsed().as_secs_f64();
        if let Some(budget) = controls.budget.wall_clock_s
            && elapsed >= budget
        {
            return Ok(state.finish(
                cell,
                &start,
                Termination::Timeout {
                    budget_s: budget,
                    elapsed_s: elapsed,
                },
            ));
        }
        if state.stats.steps_accepted + state.stats.steps_rejected >= controls.budget.max_steps {
            warn!(max_steps = controls.budget.max_steps, "step budget exhausted");
            return Ok(state.finish(
                cell,
                &start,
                Termination::Timeout {
                    budget_s: elapsed,
                    elapsed_s: elapsed,
                },
            ));
        }

        if state.t >= t_end - TIME_EPS {
            return Ok(state.finish(cell, &start, horizon_termination));
        }

        // programmed current, with the step clipped to phase boundaries
        let mut dt_step = state.dt.min(t_end - state.t);
        let current = match (&protocol.mode, &phase) {
            (_, Phase::Hold { current_a }) => *current_a,
            (ProtocolMode::ConstantCurrent { rate_c }, _) => rate_c * i_1c,
            (ProtocolMode::ConstantCurrentConstantVoltage { rate_c, .. }, _) => rate_c * i_1c,
            (ProtocolMode::Pulse { .. }, _) => {
                let Some((seg_end, seg_current)) = pulse_ends
                    .iter()
                    .find(|(end, _)| state.t < end - TIME_EPS)
                    .copied()
                else {
                    return Ok(state.finish(cell, &start, Termination::ProtocolComplete));
                };
                dt_step = dt_step.min(seg_end - state.t);
                seg_current
            }
        };

        let attempt = match &phase {
            Phase::Hold { current_a } => {
                let ProtocolMode::ConstantCurrentConstantVoltage { hold_voltage_v, .. } =
                    &protocol.mode
                else {
                    return Err(SimError::InvalidArg {
                        what: "voltage hold without a CCCV protocol",
                    });
                };
                hold_step(cell, dt_step, *hold_voltage_v, *current_a)?
            }
            Phase::Program => match cell.try_step(dt_step, current)? {
                StepOutcome::Accepted {
                    iterations,
                    residual_norm,
                    clamped,
                } => Some(Committed {
                    current_a: current,
                    iterations,
                    clamped,
                    residual_norm,
                }),
                StepOutcome::Rejected { why } => {
                    debug!(time_s = state.t, dt_s = dt_step, why, "step rejected");
                    None
                }
            },
        };

        let Some(committed) = attempt else {
            state.stats.steps_rejected += 1;
            state.dt *= 0.5;
            if state.dt < config.dt_min_s {
                let termination = Termination::Convergence {
                    time_s: state.t,
                    dt_s: state.dt,
                };
                return Ok(state.finish(cell, &start, termination));
            }
            continue;
        };

        // step is committed in the cell; check for a CC -> CV handover
        // before keeping it
        let v = cell.voltage(committed.current_a);
        if let Phase::Program = phase
            && let ProtocolMode::ConstantCurrentConstantVoltage {
                rate_c,
                hold_voltage_v,
                ..
            } = &protocol.mode
            && crossed_hold(*rate_c, v, *hold_voltage_v)
        {
            cell.rollback();
            debug!(time_s = state.t, voltage_v = v, "entering voltage hold");
            phase = Phase::Hold {
                current_a: rate_c * i_1c,
            };
            continue;
        }

        state.t += dt_step;
        state.capacity_ah += committed.current_a * dt_step / 3600.0;
        state.last_current_a = committed.current_a;
        state.stats.steps_accepted += 1;
        state.stats.newton_iterations += committed.iterations;
        state.stats.clamped_entries += committed.clamped;
        if matches!(phase, Phase::Hold { .. }) {
            phase = Phase::Hold {
                current_a: committed.current_a,
            };
        }

        if state.stats.steps_accepted % config.record_every == 0 {
            state.sample(cell);
        }
        match &config.profiles {
            ProfileRecording::Off => {}
            ProfileRecording::Every { steps } => {
                if *steps > 0
                    && state.stats.steps_accepted % steps == 0
                    && let Some(snap) = cell.profile_snapshot(state.t)
                {
                    state.profiles.push(snap);
                }
            }
            ProfileRecording::AtTimes { .. } => {
                if next_profile < profile_times.len()
                    && state.t >= profile_times[next_profile] - TIME_EPS
                {
                    if let Some(snap) = cell.profile_snapshot(state.t) {
                        state.profiles.push(snap);
                    }
                    while next_profile < profile_times.len()
                        && profile_times[next_profile] <= state.t + TIME_EPS
                    {
                        next_profile += 1;
                    }
                }
            }
        }
        if let Some(cb) = controls.progress.as_mut() {
            cb(&ProgressEvent {
                time_s: state.t,
                step: state.stats.steps_accepted,
                dt_s: state.dt,
                voltage_v: v,
                current_a: committed.current_a,
                newton_iterations: committed.iterations,
                residual_norm: committed.residual_norm,
            });
        }

        if let Some(v_min) = protocol.cutoffs.voltage_min_v
            && v <= v_min
        {
            return Ok(state.finish(cell, &start, Termination::VoltageCutoff));
        }
        if let Some(v_max) = protocol.cutoffs.voltage_max_v
            && v >= v_max
        {
            return Ok(state.finish(cell, &start, Termination::VoltageCutoff));
        }
        if let Some(t_max) = protocol.cutoffs.temperature_max_k
            && cell.temperature_k() >= t_max
        {
            return Ok(state.finish(cell, &start, Termination::TemperatureCutoff));
        }
        if let Phase::Hold { current_a } = &phase
            && let ProtocolMode::ConstantCurrentConstantVoltage { taper_c, .. } = &protocol.mode
            && current_a.abs() <= taper_c.abs() * i_1c
        {
            return Ok(state.finish(cell, &start, Termination::CurrentTaper));
        }

        if committed.iterations <= config.max_newton_iters / 3 {
            state.dt = (state.dt * 1.5).min(config.dt_max_s);
        }
    }
}

fn check_finite(value: f64, what: &'static str) -> SimResult<()> {
    ensure_finite(value, what).map_err(|_| SimError::InvalidArg { what })?;
    Ok(())
}

/// Effective time horizon: the explicit configuration wins, otherwise a
/// generous bound derived from the program.
fn time_horizon(
    protocol: &OperatingProtocol,
    config: &DiscretizationConfig,
) -> SimResult<f64> {
    let derived = match &protocol.mode {
        ProtocolMode::ConstantCurrent { rate_c } => {
            if *rate_c == 0.0 {
                None
            } else {
                Some(1.25 * 3600.0 / rate_c.abs() + 60.0)
            }
        }
        ProtocolMode::ConstantCurrentConstantVoltage { rate_c, .. } => {
            if *rate_c == 0.0 {
                None
            } else {
                Some(2.0 * 3600.0 / rate_c.abs() + 7200.0)
            }
        }
        ProtocolMode::Pulse { .. } => protocol.programmed_duration_s(),
    };

    let t_end = match (config.t_end_s, derived) {
        // a pulse program never runs past its last segment
        (Some(explicit), Some(d)) if matches!(protocol.mode, ProtocolMode::Pulse { .. }) => {
            explicit.min(d)
        }
        (Some(explicit), _) => explicit,
        (None, Some(d)) => d,
        (None, None) => {
            return Err(SimError::InvalidArg {
                what: "a rest protocol needs an explicit t_end_s",
            });
        }
    };
    if !(t_end > 0.0 && t_end.is_finite()) {
        return Err(SimError::InvalidArg {
            what: "time horizon must be positive and finite",
        });
    }
    Ok(t_end)
}

fn crossed_hold(rate_c: f64, v: f64, hold_v: f64) -> bool {
    if rate_c < 0.0 { v >= hold_v } else { v <= hold_v }
}

/// One constant-voltage step: secant iteration on the applied current so
/// the step lands on the hold voltage, then a final committing solve.
/// `None` means some inner step was rejected and the driver should shrink
/// dt.
fn hold_step<M: CellModel>(
    cell: &mut M,
    dt_s: f64,
    hold_v: f64,
    i_start: f64,
) -> SimResult<Option<Committed>> {
    let i_limit = 1.5 * i_start.abs();
    let clamp = |i: f64| i.clamp(-i_limit, i_limit);

    let mut iterations = 0usize;
    let mut clamped = 0usize;

    let mut i0 = clamp(i_start);
    let Some(v0) = probe(cell, dt_s, i0, &mut iterations, &mut clamped)? else {
        return Ok(None);
    };
    let mut f0 = v0 - hold_v;
    let mut i_best = i0;
    let mut f_best = f0;

    if f_best.abs() > HOLD_V_TOL {
        let mut i1 = clamp(0.9 * i0);
        let Some(v1) = probe(cell, dt_s, i1, &mut iterations, &mut clamped)? else {
            return Ok(None);
        };
        let mut f1 = v1 - hold_v;
        if f1.abs() < f_best.abs() {
            i_best = i1;
            f_best = f1;
        }

        for _ in 0..MAX_SECANT_ITERS {
            if f_best.abs() <= HOLD_V_TOL {
                break;
            }
            let denom = f1 - f0;
            if denom.abs() < 1e-12 {
                break;
            }
            let i2 = clamp(i1 - f1 * (i1 - i0) / denom);
            if (i2 - i1).abs() <= 1e-12 * i1.abs().max(1e-9) {
                break;
            }
            let Some(v2) = probe(cell, dt_s, i2, &mut iterations, &mut clamped)? else {
                return Ok(None);
            };
            i0 = i1;
            f0 = f1;
            i1 = i2;
            f1 = v2 - hold_v;
            if f1.abs() < f_best.abs() {
                i_best = i1;
                f_best = f1;
            }
        }
    }

    match cell.try_step(dt_s, i_best)? {
        StepOutcome::Accepted {
            iterations: commit_iters,
            residual_norm,
            clamped: commit_clamped,
        } => Ok(Some(Committed {
            current_a: i_best,
            iterations: iterations + commit_iters,
            clamped: clamped + commit_clamped,
            residual_norm,
        })),
        StepOutcome::Rejected { .. } => Ok(None),
    }
}

/// Steps at `i`, reads the landed voltage, rolls back.
fn probe<M: CellModel>(
    cell: &mut M,
    dt_s: f64,
    i: f64,
    iterations: &mut usize,
    clamped: &mut usize,
) -> SimResult<Option<f64>> {
    match cell.try_step(dt_s, i)? {
        StepOutcome::Accepted {
            iterations: it,
            clamped: cl,
            ..
        } => {
            let v = cell.voltage(i);
            cell.rollback();
            *iterations += it;
            *clamped += cl;
            Ok(Some(v))
        }
        StepOutcome::Rejected { .. } => Ok(None),
    }
}
