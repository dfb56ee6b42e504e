//! Run execution and caching service.

use std::path::Path;

use cf_core::units::k;
use cf_design::{CellProject, RunDef, load_yaml};
use cf_results::{RunManifest, RunStore};
use cf_sim::{Fidelity, P2dCell, ProgressEvent, RunControls, run_protocol_with_controls};
use cf_spm::SpmCell;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::backend::SolveBackend;
use crate::classify::{ExecutionClass, fidelity_from_choice};
use crate::error::{DispatchError, DispatchResult};
use crate::request::{SolveRequest, SolveResponse};

/// Version stamped into run ids; bumping it invalidates cached results.
pub const SOLVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Executes a request on the calling thread.
pub fn execute(request: &SolveRequest) -> DispatchResult<SolveResponse> {
    execute_with_controls(request, RunControls::default())
}

/// Executes a request on the calling thread with external controls
/// attached. The fidelity decision happens here, once, so every backend
/// that funnels through this function runs identical physics.
pub fn execute_with_controls(
    request: &SolveRequest,
    controls: RunControls<'_>,
) -> DispatchResult<SolveResponse> {
    let fidelity = request.fidelity();
    let class = request.class();
    let run_id = request.run_id(SOLVER_VERSION);
    debug!(run_id = %run_id, ?fidelity, ?class, "executing solve request");

    let temperature = k(request.temperature_k);
    let result = match fidelity {
        Fidelity::SingleParticle => {
            let mut cell = SpmCell::new(&request.design, temperature)?;
            run_protocol_with_controls(&mut cell, &request.protocol, &request.config, controls)?
        }
        Fidelity::PseudoTwoDimensional => {
            let mut cell = P2dCell::new(&request.design, &request.config, temperature)?;
            run_protocol_with_controls(&mut cell, &request.protocol, &request.config, controls)?
        }
    };

    Ok(SolveResponse {
        run_id,
        model: fidelity,
        class,
        result,
    })
}

/// Fans independent requests across the rayon pool. Results come back in
/// request order, each carrying its own outcome.
pub fn run_sweep(requests: Vec<SolveRequest>) -> Vec<DispatchResult<SolveResponse>> {
    requests
        .into_par_iter()
        .map(|request| execute(&request))
        .collect()
}

/// Options for running simulations.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub use_cache: bool,
    pub solver_version: String,
    /// Beats the run definition's own model choice.
    pub model_override: Option<Fidelity>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            solver_version: SOLVER_VERSION.to_string(),
            model_override: None,
        }
    }
}

/// Request to execute a named run from a project file.
pub struct RunRequest<'a> {
    pub project_path: &'a Path,
    pub run_name: &'a str,
    pub options: RunOptions,
}

/// Response from a run execution.
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run_id: String,
    pub manifest: RunManifest,
    pub loaded_from_cache: bool,
    pub class: ExecutionClass,
}

/// Builds the solve request a run definition describes, resolving its
/// design and protocol references against the built-in catalog.
pub fn solve_request_for(
    project: &CellProject,
    run_def: &RunDef,
    model_override: Option<Fidelity>,
) -> DispatchResult<SolveRequest> {
    let design_def = project
        .design(&run_def.design_id)
        .ok_or_else(|| DispatchError::DesignNotFound(run_def.design_id.clone()))?;
    let protocol_def = project
        .protocol(&run_def.protocol_id)
        .ok_or_else(|| DispatchError::ProtocolNotFound(run_def.protocol_id.clone()))?;

    let design = design_def.resolve(&cf_materials::ReferenceCatalog)?;

    Ok(SolveRequest {
        design,
        protocol: protocol_def.to_protocol(),
        config: run_def.config.clone(),
        model: model_override.or_else(|| run_def.model.map(fidelity_from_choice)),
        temperature_k: run_def.temperature_k,
    })
}

/// Executes or loads a named run from a project file.
pub fn ensure_run(request: &RunRequest) -> DispatchResult<RunResponse> {
    ensure_run_with_progress(request, None)
}

/// Executes or loads a named run, streaming driver progress events.
pub fn ensure_run_with_progress(
    request: &RunRequest,
    progress_cb: Option<&mut dyn FnMut(&ProgressEvent)>,
) -> DispatchResult<RunResponse> {
    let (solve, run_id, store) = prepare_run(request)?;
    if request.options.use_cache
        && let Some(cached) = try_cached(&store, &run_id, solve.class())?
    {
        return Ok(cached);
    }

    let response = execute_with_controls(
        &solve,
        RunControls {
            progress: progress_cb,
            ..RunControls::default()
        },
    )?;
    finish_run(&store, run_id, &solve, response, &request.options.solver_version)
}

/// Executes or loads a named run, solving through the given backend.
/// Cache hits never reach the backend.
pub fn ensure_run_on(
    request: &RunRequest,
    backend: &dyn SolveBackend,
) -> DispatchResult<RunResponse> {
    let (solve, run_id, store) = prepare_run(request)?;
    if request.options.use_cache
        && let Some(cached) = try_cached(&store, &run_id, solve.class())?
    {
        return Ok(cached);
    }

    let response = backend.solve(solve.clone())?;
    finish_run(&store, run_id, &solve, response, &request.options.solver_version)
}

fn prepare_run(request: &RunRequest) -> DispatchResult<(SolveRequest, String, RunStore)> {
    let project = load_yaml(request.project_path)?;
    let run_def = project
        .run(request.run_name)
        .ok_or_else(|| DispatchError::RunNotFound(request.run_name.to_string()))?;
    let solve = solve_request_for(&project, run_def, request.options.model_override)?;
    let run_id = solve.run_id(&request.options.solver_version);
    let store = RunStore::for_project(request.project_path)?;
    Ok((solve, run_id, store))
}

fn try_cached(
    store: &RunStore,
    run_id: &str,
    class: ExecutionClass,
) -> DispatchResult<Option<RunResponse>> {
    if !store.has_run(run_id) {
        return Ok(None);
    }
    debug!(run_id = %run_id, "serving run from cache");
    let manifest = store.load_manifest(run_id)?;
    Ok(Some(RunResponse {
        run_id: run_id.to_string(),
        manifest,
        loaded_from_cache: true,
        class,
    }))
}

fn finish_run(
    store: &RunStore,
    run_id: String,
    solve: &SolveRequest,
    response: SolveResponse,
    solver_version: &str,
) -> DispatchResult<RunResponse> {
    let manifest = RunManifest {
        run_id: run_id.clone(),
        design_id: solve.design.id.clone(),
        created_at: chrono::Utc::now().to_rfc3339(),
        model: response.model,
        temperature_k: solve.temperature_k,
        protocol: solve.protocol.clone(),
        config: solve.config.clone(),
        termination: response.result.termination.clone(),
        stats: response.result.stats,
        solver_version: solver_version.to_string(),
    };
    store.save_run(&manifest, &response.result.samples, &response.result.profiles)?;
    info!(
        run_id = %run_id,
        reason = response.result.termination.reason_code(),
        samples = response.result.samples.len(),
        "run stored"
    );

    Ok(RunResponse {
        run_id,
        manifest,
        loaded_from_cache: false,
        class: response.class,
    })
}

/// Loads a stored run's manifest and telemetry.
pub fn load_run(
    project_path: &Path,
    run_id: &str,
) -> DispatchResult<(RunManifest, Vec<cf_sim::Sample>)> {
    let store = RunStore::for_project(project_path)?;
    let manifest = store.load_manifest(run_id)?;
    let samples = store.load_timeseries(run_id)?;
    Ok((manifest, samples))
}

/// Lists stored runs for one design, most recent first.
pub fn list_runs(project_path: &Path, design_id: &str) -> DispatchResult<Vec<RunManifest>> {
    let store = RunStore::for_project(project_path)?;
    let mut runs = store.list_runs(design_id)?;
    runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(runs)
}
