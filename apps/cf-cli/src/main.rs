use cf_design::{load_yaml, nominal_capacity_ah, np_capacity_ratio};
use cf_dispatch::{
    DispatchError, DispatchResult, PooledBackend, RunOptions, RunRequest, RunResponse,
    ensure_run_on, ensure_run_with_progress, list_runs, load_run,
};
use cf_materials::filter_reference_catalog;
use cf_sim::{Fidelity, ProgressEvent, Sample};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "cf-cli")]
#[command(about = "CellFlow CLI - Battery cell simulation tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a project file and report per-design capacity figures
    Validate {
        /// Path to the project YAML file
        project_path: PathBuf,
    },
    /// List the built-in material catalog
    Materials {
        /// Filter by id, display name, or alias
        query: Option<String>,
    },
    /// Execute a named run from a project file
    Run {
        /// Path to the project YAML file
        project_path: PathBuf,
        /// Run name as defined in the project
        run_name: String,
        /// Override the model choice (spm or p2d)
        #[arg(long)]
        model: Option<String>,
        /// Skip cache and force re-execution
        #[arg(long)]
        no_cache: bool,
        /// Execute on the worker-pool backend
        #[arg(long)]
        accelerated: bool,
    },
    /// List stored runs for a design
    Runs {
        /// Path to the project YAML file
        project_path: PathBuf,
        /// Design ID to list runs for
        design_id: String,
    },
    /// Export one telemetry column from a stored run as CSV
    Export {
        /// Path to the project YAML file
        project_path: PathBuf,
        /// Run ID
        run_id: String,
        /// Column name (voltage_v, current_a, capacity_ah, anode_soc, cathode_soc)
        column: String,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> DispatchResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { project_path } => cmd_validate(&project_path),
        Commands::Materials { query } => cmd_materials(query.as_deref()),
        Commands::Run {
            project_path,
            run_name,
            model,
            no_cache,
            accelerated,
        } => cmd_run(
            &project_path,
            &run_name,
            model.as_deref(),
            !no_cache,
            accelerated,
        ),
        Commands::Runs {
            project_path,
            design_id,
        } => cmd_runs(&project_path, &design_id),
        Commands::Export {
            project_path,
            run_id,
            column,
            output,
        } => cmd_export(&project_path, &run_id, &column, output.as_deref()),
    }
}

fn cmd_validate(project_path: &Path) -> DispatchResult<()> {
    println!("Validating project: {}", project_path.display());
    let project = load_yaml(project_path)?;
    println!("✓ Project is valid");

    if !project.designs.is_empty() {
        println!("Designs:");
        for design_def in &project.designs {
            let design = design_def.resolve(&cf_materials::ReferenceCatalog)?;
            let capacity = nominal_capacity_ah(&design)?;
            let np = np_capacity_ratio(&design)?;
            println!(
                "  {} - {} ({:.2} Ah nominal, N:P {:.2})",
                design.id, design.name, capacity, np
            );
        }
    }
    println!("Protocols: {}", project.protocols.len());
    println!("Runs: {}", project.runs.len());
    Ok(())
}

fn cmd_materials(query: Option<&str>) -> DispatchResult<()> {
    let entries = filter_reference_catalog(query.unwrap_or(""));

    if entries.is_empty() {
        println!("No materials match '{}'", query.unwrap_or(""));
    } else {
        println!("Built-in materials:");
        for entry in entries {
            println!(
                "  {:<14} {:<12} {} (aka {})",
                entry.canonical_id,
                format!("{:?}", entry.role),
                entry.display_name,
                entry.aliases.join(", ")
            );
        }
    }
    Ok(())
}

fn cmd_run(
    project_path: &Path,
    run_name: &str,
    model: Option<&str>,
    use_cache: bool,
    accelerated: bool,
) -> DispatchResult<()> {
    println!("Running '{}' from {}", run_name, project_path.display());

    let request = RunRequest {
        project_path,
        run_name,
        options: RunOptions {
            use_cache,
            model_override: model.map(parse_model).transpose()?,
            ..RunOptions::default()
        },
    };

    let response = if accelerated {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        let pool = PooledBackend::new(workers, 2 * workers);
        ensure_run_on(&request, &pool)?
    } else {
        let mut emitted = 0usize;
        let mut last_emit = Instant::now();
        let response = ensure_run_with_progress(
            &request,
            Some(&mut |event| {
                if last_emit.elapsed().as_millis() >= 100 {
                    render_progress(event, emitted);
                    emitted += 1;
                    last_emit = Instant::now();
                }
            }),
        )?;
        clear_progress_line();
        response
    };

    if response.loaded_from_cache {
        println!("✓ Loaded from cache: {}", response.run_id);
    } else {
        println!("✓ Simulation completed: {}", response.run_id);
    }
    print_run_summary(&response);

    let (_manifest, samples) = load_run(project_path, &response.run_id)?;
    if let Some(last) = samples.last() {
        println!(
            "  Final: t = {:.1} s, V = {:.3} V, {:.3} Ah discharged",
            last.time_s, last.voltage_v, last.capacity_ah
        );
    }
    Ok(())
}

fn parse_model(raw: &str) -> DispatchResult<Fidelity> {
    match raw {
        "spm" => Ok(Fidelity::SingleParticle),
        "p2d" => Ok(Fidelity::PseudoTwoDimensional),
        other => Err(DispatchError::Validation(format!(
            "unknown model '{other}' (expected spm or p2d)"
        ))),
    }
}

fn print_run_summary(response: &RunResponse) {
    let manifest = &response.manifest;
    println!("  Model: {} ({:?})", manifest.model.label(), response.class);
    println!("  Reason: {}", manifest.termination.reason_code());
    println!(
        "  Steps: {} accepted, {} rejected, {} Newton iterations",
        manifest.stats.steps_accepted,
        manifest.stats.steps_rejected,
        manifest.stats.newton_iterations
    );
    println!("  Wall time: {:.3} s", manifest.stats.wall_time_s);
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_progress(event: &ProgressEvent, emitted: usize) {
    let spinner = ['|', '/', '-', '\\'];
    print!(
        "\r{} t={:.1}s  dt={:.2}s  V={:.3}V  I={:.2}A  step={}  newton={}  residual={:.2e}",
        spinner[emitted % spinner.len()],
        event.time_s,
        event.dt_s,
        event.voltage_v,
        event.current_a,
        event.step,
        event.newton_iterations,
        event.residual_norm
    );
    let _ = io::stdout().flush();
}

fn cmd_runs(project_path: &Path, design_id: &str) -> DispatchResult<()> {
    let runs = list_runs(project_path, design_id)?;

    if runs.is_empty() {
        println!("No stored runs found for design: {}", design_id);
    } else {
        println!("Stored runs for design '{}':", design_id);
        for manifest in runs {
            println!(
                "  {}  {}  {}  {}",
                manifest.run_id,
                manifest.created_at,
                manifest.model.label(),
                manifest.termination.reason_code()
            );
        }
    }
    Ok(())
}

fn cmd_export(
    project_path: &Path,
    run_id: &str,
    column: &str,
    output: Option<&Path>,
) -> DispatchResult<()> {
    let (_manifest, samples) = load_run(project_path, run_id)?;
    let extract = column_extractor(column)?;

    let mut csv = format!("time_s,{}\n", column);
    for sample in &samples {
        csv.push_str(&format!("{},{}\n", sample.time_s, extract(sample)));
    }

    if let Some(path) = output {
        std::fs::write(path, csv)?;
        println!("✓ Exported {} rows to {}", samples.len(), path.display());
    } else {
        print!("{}", csv);
    }
    Ok(())
}

fn column_extractor(column: &str) -> DispatchResult<fn(&Sample) -> f64> {
    match column {
        "voltage_v" => Ok(|s| s.voltage_v),
        "current_a" => Ok(|s| s.current_a),
        "capacity_ah" => Ok(|s| s.capacity_ah),
        "anode_soc" => Ok(|s| s.anode_soc),
        "cathode_soc" => Ok(|s| s.cathode_soc),
        other => Err(DispatchError::Validation(format!(
            "unknown column '{other}' (expected voltage_v, current_a, capacity_ah, \
             anode_soc, or cathode_soc)"
        ))),
    }
}
