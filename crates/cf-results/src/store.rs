//! Run storage API.

use std::fs;
use std::path::{Path, PathBuf};

use cf_sim::{ProfileSnapshot, Sample};

use crate::types::RunManifest;
use crate::{ResultsError, ResultsResult};

/// Directory-per-run store. Each run holds `manifest.json`,
/// `timeseries.jsonl` (one sample per line), and `profiles.jsonl` when the
/// run recorded spatial snapshots.
#[derive(Clone)]
pub struct RunStore {
    root_dir: PathBuf,
}

impl RunStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    /// Store rooted next to the project file, under `.cellflow/runs`.
    pub fn for_project(project_path: &Path) -> ResultsResult<Self> {
        let project_dir = project_path
            .parent()
            .ok_or_else(|| ResultsError::InvalidPath {
                message: "project path has no parent directory".to_string(),
            })?;
        let runs_dir = project_dir.join(".cellflow").join("runs");
        Self::new(runs_dir)
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root_dir.join(run_id)
    }

    pub fn has_run(&self, run_id: &str) -> bool {
        self.run_dir(run_id).join("manifest.json").exists()
    }

    pub fn save_run(
        &self,
        manifest: &RunManifest,
        samples: &[Sample],
        profiles: &[ProfileSnapshot],
    ) -> ResultsResult<()> {
        let run_dir = self.run_dir(&manifest.run_id);
        fs::create_dir_all(&run_dir)?;

        let manifest_path = run_dir.join("manifest.json");
        let manifest_json = serde_json::to_string_pretty(manifest)?;
        fs::write(manifest_path, manifest_json)?;

        let timeseries_path = run_dir.join("timeseries.jsonl");
        let mut timeseries_content = String::new();
        for sample in samples {
            let line = serde_json::to_string(sample)?;
            timeseries_content.push_str(&line);
            timeseries_content.push('\n');
        }
        fs::write(timeseries_path, timeseries_content)?;

        if !profiles.is_empty() {
            let profiles_path = run_dir.join("profiles.jsonl");
            let mut profiles_content = String::new();
            for profile in profiles {
                let line = serde_json::to_string(profile)?;
                profiles_content.push_str(&line);
                profiles_content.push('\n');
            }
            fs::write(profiles_path, profiles_content)?;
        }

        Ok(())
    }

    pub fn load_manifest(&self, run_id: &str) -> ResultsResult<RunManifest> {
        let manifest_path = self.run_dir(run_id).join("manifest.json");

        if !manifest_path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }

        let content = fs::read_to_string(manifest_path)?;
        let manifest = serde_json::from_str(&content)?;
        Ok(manifest)
    }

    pub fn load_timeseries(&self, run_id: &str) -> ResultsResult<Vec<Sample>> {
        let timeseries_path = self.run_dir(run_id).join("timeseries.jsonl");

        if !timeseries_path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }

        let content = fs::read_to_string(timeseries_path)?;
        let mut samples = Vec::new();
        for line in content.lines() {
            if !line.trim().is_empty() {
                let sample: Sample = serde_json::from_str(line)?;
                samples.push(sample);
            }
        }

        Ok(samples)
    }

    /// Spatial snapshots for a run; empty when the run recorded none.
    pub fn load_profiles(&self, run_id: &str) -> ResultsResult<Vec<ProfileSnapshot>> {
        let profiles_path = self.run_dir(run_id).join("profiles.jsonl");

        if !profiles_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(profiles_path)?;
        let mut profiles = Vec::new();
        for line in content.lines() {
            if !line.trim().is_empty() {
                let profile: ProfileSnapshot = serde_json::from_str(line)?;
                profiles.push(profile);
            }
        }

        Ok(profiles)
    }

    pub fn list_runs(&self, design_id: &str) -> ResultsResult<Vec<RunManifest>> {
        let mut runs = Vec::new();

        if !self.root_dir.exists() {
            return Ok(runs);
        }

        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                let run_id = entry.file_name().to_string_lossy().to_string();
                if let Ok(manifest) = self.load_manifest(&run_id)
                    && manifest.design_id == design_id
                {
                    runs.push(manifest);
                }
            }
        }

        Ok(runs)
    }

    pub fn delete_run(&self, run_id: &str) -> ResultsResult<()> {
        let run_dir = self.run_dir(run_id);
        if run_dir.exists() {
            fs::remove_dir_all(run_dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_design::DiscretizationConfig;
    use cf_design::reference::discharge_to_cutoff;
    use cf_sim::{Fidelity, SolveStats, Termination};

    fn scratch_store(tag: &str) -> RunStore {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!(
            "cf_results_{}_{}_{}",
            tag,
            std::process::id(),
            nanos
        ));
        RunStore::new(dir).unwrap()
    }

    fn manifest(run_id: &str, design_id: &str) -> RunManifest {
        RunManifest {
            run_id: run_id.to_string(),
            design_id: design_id.to_string(),
            created_at: "2026-08-25T12:00:00Z".to_string(),
            model: Fidelity::PseudoTwoDimensional,
            temperature_k: 298.15,
            protocol: discharge_to_cutoff(1.0),
            config: DiscretizationConfig::coarse(),
            termination: Termination::VoltageCutoff,
            stats: SolveStats::default(),
            solver_version: "0.1.0".to_string(),
        }
    }

    fn samples() -> Vec<Sample> {
        vec![
            Sample {
                time_s: 0.0,
                current_a: 0.0,
                voltage_v: 4.17,
                capacity_ah: 0.0,
                anode_soc: 1.0,
                cathode_soc: 0.0,
            },
            Sample {
                time_s: 60.0,
                current_a: 3.9,
                voltage_v: 3.95,
                capacity_ah: 0.065,
                anode_soc: 0.98,
                cathode_soc: 0.02,
            },
        ]
    }

    #[test]
    fn round_trip_preserves_manifest_and_timeseries() {
        let store = scratch_store("round_trip");
        let manifest = manifest("abc123", "cell-a");
        store.save_run(&manifest, &samples(), &[]).unwrap();

        assert!(store.has_run("abc123"));
        let loaded = store.load_manifest("abc123").unwrap();
        assert_eq!(loaded.run_id, "abc123");
        assert_eq!(loaded.design_id, "cell-a");
        assert_eq!(loaded.termination, Termination::VoltageCutoff);

        let timeseries = store.load_timeseries("abc123").unwrap();
        assert_eq!(timeseries, samples());

        store.delete_run("abc123").unwrap();
    }

    #[test]
    fn profiles_are_optional() {
        let store = scratch_store("profiles");
        let manifest = manifest("noprof", "cell-a");
        store.save_run(&manifest, &samples(), &[]).unwrap();
        assert!(store.load_profiles("noprof").unwrap().is_empty());

        let profile = ProfileSnapshot {
            time_s: 30.0,
            x_m: vec![1e-5, 5e-5],
            ce_mol_m3: vec![1100.0, 900.0],
            phie_v: vec![0.0, -0.02],
            phis_v: vec![Some(4.0), None],
            surface_soc: vec![Some(0.4), None],
        };
        let manifest = self::manifest("withprof", "cell-a");
        store
            .save_run(&manifest, &samples(), std::slice::from_ref(&profile))
            .unwrap();
        let loaded = store.load_profiles("withprof").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], profile);

        store.delete_run("noprof").unwrap();
        store.delete_run("withprof").unwrap();
    }

    #[test]
    fn list_runs_filters_by_design() {
        let store = scratch_store("list");
        store
            .save_run(&manifest("run1", "cell-a"), &samples(), &[])
            .unwrap();
        store
            .save_run(&manifest("run2", "cell-b"), &samples(), &[])
            .unwrap();

        let runs = store.list_runs("cell-a").unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, "run1");

        store.delete_run("run1").unwrap();
        store.delete_run("run2").unwrap();
    }

    #[test]
    fn missing_run_is_reported() {
        let store = scratch_store("missing");
        let err = store.load_manifest("nope").unwrap_err();
        assert!(matches!(err, ResultsError::RunNotFound { .. }));

        // deleting a run that never existed is not an error
        store.delete_run("nope").unwrap();
    }
}
