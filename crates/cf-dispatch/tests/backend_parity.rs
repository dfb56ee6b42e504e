//! The pooled backend must be a pure throughput layer: byte-identical
//! results, honest back-pressure, and prompt cancellation.

use std::thread;
use std::time::Duration;

use cf_design::reference::{discharge_to_cutoff, reference_cell};
use cf_design::{DiscretizationConfig, OperatingProtocol};
use cf_dispatch::{
    DispatchError, LocalBackend, PooledBackend, SOLVER_VERSION, SolveBackend, SolveRequest,
    execute, run_sweep,
};
use cf_sim::{Fidelity, Termination};

/// Two minutes of 1C discharge on a coarse full-order mesh.
fn quick_p2d_request() -> SolveRequest {
    let mut config = DiscretizationConfig::coarse();
    config.t_end_s = Some(120.0);
    SolveRequest {
        config,
        model: Some(Fidelity::PseudoTwoDimensional),
        ..SolveRequest::new(reference_cell(), discharge_to_cutoff(1.0))
    }
}

/// A long rest stepped at a fixed 50 ms keeps a worker busy for a while
/// without producing much telemetry. Tests cancel it once they are done.
fn slow_request() -> SolveRequest {
    let config = DiscretizationConfig {
        n_x: 10,
        n_r: 4,
        dt_init_s: 0.05,
        dt_min_s: 0.05,
        dt_max_s: 0.05,
        t_end_s: Some(20_000.0),
        record_every: 10_000,
        ..DiscretizationConfig::default()
    };
    SolveRequest {
        config,
        model: Some(Fidelity::PseudoTwoDimensional),
        ..SolveRequest::new(reference_cell(), OperatingProtocol::constant_current(0.0))
    }
}

#[test]
fn pooled_and_local_backends_agree_exactly() {
    let request = quick_p2d_request();

    let mut events = 0usize;
    let local = LocalBackend::new()
        .solve_with_progress(&request, &mut |_| events += 1)
        .expect("local solve failed");
    assert!(events > 0);

    let pool = PooledBackend::new(2, 4);
    let pooled = pool.solve(request).expect("pooled solve failed");

    assert_eq!(local.run_id, pooled.run_id);
    assert_eq!(local.model, pooled.model);
    assert_eq!(local.result.termination, pooled.result.termination);

    let local_json = serde_json::to_string(&local.result.samples).expect("serialize local");
    let pooled_json = serde_json::to_string(&pooled.result.samples).expect("serialize pooled");
    assert_eq!(local_json, pooled_json);
}

#[test]
fn repeat_solves_reproduce_the_same_bytes() {
    let request = quick_p2d_request();

    let first = execute(&request).expect("first solve failed");
    let second = execute(&request).expect("second solve failed");

    assert_eq!(first.run_id, second.run_id);
    assert_eq!(
        serde_json::to_string(&first.result.samples).expect("serialize first"),
        serde_json::to_string(&second.result.samples).expect("serialize second"),
    );
}

#[test]
fn full_queue_rejects_new_jobs() {
    let pool = PooledBackend::new(1, 1);

    let running = pool.submit(slow_request()).expect("first submit failed");
    // Give the worker time to pull the first job off the queue.
    thread::sleep(Duration::from_millis(50));
    let queued = pool.submit(slow_request()).expect("second submit failed");

    let rejected = pool.submit(slow_request());
    assert!(matches!(
        rejected,
        Err(DispatchError::QueueFull { capacity: 1 })
    ));

    // Cut both holds short so the test does not ride them out.
    running.cancel();
    queued.cancel();
    assert!(running.wait().is_ok());
    assert!(queued.wait().is_ok());
}

#[test]
fn cancelled_jobs_return_their_partial_timeline() {
    let pool = PooledBackend::new(1, 1);

    let running = pool.submit(slow_request()).expect("first submit failed");
    // Give the worker time to pull the first job off the queue.
    thread::sleep(Duration::from_millis(50));
    let queued = pool.submit(slow_request()).expect("second submit failed");
    queued.cancel();
    running.cancel();

    let response = queued.wait().expect("queued job lost");
    assert_eq!(response.result.termination, Termination::Cancelled);
    assert!(response.result.termination.is_failure());
    assert!(!response.result.samples.is_empty());

    let response = running.wait().expect("running job lost");
    assert_eq!(response.result.termination, Termination::Cancelled);
}

#[test]
fn sweeps_preserve_request_order() {
    let gentle = SolveRequest::new(reference_cell(), discharge_to_cutoff(0.5));
    let mut hold = SolveRequest::new(reference_cell(), OperatingProtocol::constant_current(0.25));
    hold.config.t_end_s = Some(300.0);

    let responses = run_sweep(vec![gentle.clone(), hold.clone()]);
    assert_eq!(responses.len(), 2);

    let first = responses[0].as_ref().expect("gentle solve failed");
    let second = responses[1].as_ref().expect("hold solve failed");
    assert_eq!(first.run_id, gentle.run_id(SOLVER_VERSION));
    assert_eq!(second.run_id, hold.run_id(SOLVER_VERSION));
    assert_eq!(first.model, Fidelity::SingleParticle);
}
