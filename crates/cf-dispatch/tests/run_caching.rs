//! End-to-end checks of `ensure_run` against a project file on disk: first
//! execution populates the store, repeat requests are answered from it, and
//! stored runs can be listed and reloaded.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use cf_design::{
    CellDesignDef, CellProject, Cutoffs, DiscretizationConfig, ElectrodeDef, MaterialRefDef,
    ProtocolDef, ProtocolMode, RunDef, SeparatorLayerDef, save_yaml,
};
use cf_dispatch::{
    DispatchError, PooledBackend, RunOptions, RunRequest, ensure_run, ensure_run_on,
    ensure_run_with_progress, list_runs, load_run,
};
use cf_sim::{Fidelity, ProgressEvent, Termination};

fn scratch_project(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    let dir = std::env::temp_dir().join(format!(
        "cf_dispatch_{}_{}_{}",
        tag,
        std::process::id(),
        nanos
    ));
    fs::create_dir_all(&dir).expect("failed to create scratch dir");
    dir.join("project.yaml")
}

fn reference_stack(id: &str) -> CellDesignDef {
    CellDesignDef {
        id: id.to_string(),
        name: "Reference pouch stack".to_string(),
        cathode: ElectrodeDef {
            material: MaterialRefDef::Catalog {
                id: "nmc_111".to_string(),
            },
            thickness_m: 75e-6,
            porosity: 0.30,
            active_volume_fraction: 0.55,
            particle_radius_m: None,
        },
        separator: SeparatorLayerDef {
            material: MaterialRefDef::Catalog {
                id: "separator_pe".to_string(),
            },
            thickness_m: 25e-6,
            porosity: 0.45,
        },
        anode: ElectrodeDef {
            material: MaterialRefDef::Catalog {
                id: "graphite".to_string(),
            },
            thickness_m: 100e-6,
            porosity: 0.33,
            active_volume_fraction: 0.58,
            particle_radius_m: None,
        },
        electrolyte: MaterialRefDef::Catalog {
            id: "lipf6_ec_dmc".to_string(),
        },
        area_m2: 0.1,
        layer_count: 1,
        initial_soc: 1.0,
    }
}

/// A project with one design, one 1C discharge protocol, and one short run.
fn cache_project() -> CellProject {
    let mut project = CellProject::new("Cache study");
    project.designs.push(reference_stack("cell_a"));
    project.protocols.push(ProtocolDef {
        id: "discharge_1c".to_string(),
        mode: ProtocolMode::ConstantCurrent { rate_c: 1.0 },
        cutoffs: Cutoffs {
            voltage_min_v: Some(3.0),
            voltage_max_v: None,
            temperature_max_k: None,
        },
    });
    project.runs.push(RunDef {
        name: "baseline".to_string(),
        design_id: "cell_a".to_string(),
        protocol_id: "discharge_1c".to_string(),
        config: DiscretizationConfig {
            n_x: 8,
            n_r: 4,
            t_end_s: Some(60.0),
            ..DiscretizationConfig::default()
        },
        model: None,
        temperature_k: 298.15,
    });
    project
}

#[test]
fn second_request_is_served_from_the_store() {
    let path = scratch_project("cache_hit");
    save_yaml(&path, &cache_project()).expect("failed to save project");

    let request = RunRequest {
        project_path: &path,
        run_name: "baseline",
        options: RunOptions::default(),
    };

    let first = ensure_run(&request).expect("first run failed");
    assert!(!first.loaded_from_cache);
    assert_eq!(first.manifest.design_id, "cell_a");
    assert_eq!(first.manifest.model, Fidelity::SingleParticle);
    assert!(first.manifest.stats.steps_accepted > 0);

    let second = ensure_run(&request).expect("cached run failed");
    assert!(second.loaded_from_cache);
    assert_eq!(second.run_id, first.run_id);
    assert_eq!(second.manifest.created_at, first.manifest.created_at);
}

#[test]
fn cache_bypass_executes_again() {
    let path = scratch_project("cache_bypass");
    save_yaml(&path, &cache_project()).expect("failed to save project");

    let cached = RunRequest {
        project_path: &path,
        run_name: "baseline",
        options: RunOptions::default(),
    };
    let first = ensure_run(&cached).expect("first run failed");

    let bypass = RunRequest {
        project_path: &path,
        run_name: "baseline",
        options: RunOptions {
            use_cache: false,
            ..RunOptions::default()
        },
    };
    let rerun = ensure_run(&bypass).expect("bypass run failed");

    assert!(!rerun.loaded_from_cache);
    assert_eq!(rerun.run_id, first.run_id);
}

#[test]
fn progress_reports_only_fresh_executions() {
    let path = scratch_project("progress");
    save_yaml(&path, &cache_project()).expect("failed to save project");

    let request = RunRequest {
        project_path: &path,
        run_name: "baseline",
        options: RunOptions::default(),
    };

    let mut events = 0usize;
    let mut on_progress = |_: &ProgressEvent| events += 1;
    let first =
        ensure_run_with_progress(&request, Some(&mut on_progress)).expect("first run failed");
    assert!(!first.loaded_from_cache);
    assert!(events > 0);

    let before_cached = events;
    let mut on_progress = |_: &ProgressEvent| events += 1;
    let second =
        ensure_run_with_progress(&request, Some(&mut on_progress)).expect("cached run failed");
    assert!(second.loaded_from_cache);
    assert_eq!(events, before_cached);
}

#[test]
fn stored_runs_are_listed_and_reloadable() {
    let path = scratch_project("listing");
    save_yaml(&path, &cache_project()).expect("failed to save project");

    let current = ensure_run(&RunRequest {
        project_path: &path,
        run_name: "baseline",
        options: RunOptions::default(),
    })
    .expect("run failed");

    // A solver version bump gets its own run id and store entry.
    let bumped = ensure_run(&RunRequest {
        project_path: &path,
        run_name: "baseline",
        options: RunOptions {
            solver_version: "99.0.0".to_string(),
            ..RunOptions::default()
        },
    })
    .expect("version-bumped run failed");
    assert_ne!(bumped.run_id, current.run_id);

    let runs = list_runs(&path, "cell_a").expect("failed to list runs");
    assert_eq!(runs.len(), 2);
    assert!(runs[0].created_at >= runs[1].created_at);
    assert!(runs.iter().any(|m| m.run_id == current.run_id));
    assert!(runs.iter().any(|m| m.run_id == bumped.run_id));

    let (manifest, samples) = load_run(&path, &current.run_id).expect("failed to reload run");
    assert_eq!(manifest.run_id, current.run_id);
    assert_eq!(manifest.termination, Termination::TimeLimit);
    assert!(!samples.is_empty());
    let last = samples.last().map(|s| s.time_s).unwrap_or_default();
    assert!((last - 60.0).abs() < 1.0, "final sample at {last} s");
}

#[test]
fn pooled_ensure_runs_share_the_store() {
    let path = scratch_project("pooled");
    save_yaml(&path, &cache_project()).expect("failed to save project");

    let pool = PooledBackend::new(1, 2);
    let request = RunRequest {
        project_path: &path,
        run_name: "baseline",
        options: RunOptions::default(),
    };

    let first = ensure_run_on(&request, &pool).expect("pooled run failed");
    assert!(!first.loaded_from_cache);

    // The in-process path answers from the pooled run's store entry.
    let second = ensure_run(&request).expect("cached run failed");
    assert!(second.loaded_from_cache);
    assert_eq!(second.run_id, first.run_id);
}

#[test]
fn unknown_run_names_are_rejected() {
    let path = scratch_project("unknown_run");
    save_yaml(&path, &cache_project()).expect("failed to save project");

    let missing = ensure_run(&RunRequest {
        project_path: &path,
        run_name: "nope",
        options: RunOptions::default(),
    });
    assert!(matches!(missing, Err(DispatchError::RunNotFound(_))));
}
