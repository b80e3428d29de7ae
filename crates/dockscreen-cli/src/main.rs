//! dockscreen — batch ligand x target docking with AutoDock Vina.
//! Entry point for the command-line binary.

mod report;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use dockscreen_config::{Config, ConfigError};
use dockscreen_docking::docking::resolve_executable;
use dockscreen_docking::{
    AssetRegistry, BatchRunner, CancelSignal, DockingEngine, JobMatrixBuilder, LigandSet, RunContext, RunEvent,
    RunState, RunStatus, VinaRunner,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::report::{render_table, JsonReport};

#[derive(Parser, Debug)]
#[command(name = "dockscreen")]
#[command(about = "Dock a ligand library against a panel of target receptors")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $DOCKSCREEN_CONFIG, then ./dockscreen.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List catalog targets and whether their receptor/config files are present
    Targets,
    /// Check that the docking executable can be found
    Check,
    /// Dock every ligand against every selected target
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Ligand .pdbqt files or directories to scan (defaults to paths.ligand_dir)
    ligands: Vec<PathBuf>,

    /// Target id to screen against, repeatable (defaults to every catalog target)
    #[arg(short, long = "target")]
    targets: Vec<String>,

    /// Concurrent docking jobs (defaults to cores / tool.cpu_per_job)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Also write the result matrix as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dockscreen=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Targets => list_targets(&config),
        Command::Check => check_tool(&config),
        Command::Run(args) => run_screen(config, args).await,
    }
}

/// An explicit path must exist; the implicit default falls back to built-in settings.
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let loaded = match path {
        Some(p) => Config::from_file(p),
        None => Config::load(),
    };
    match loaded {
        Ok(config) => {
            info!("Configuration loaded, tool {:?}", config.tool.executable);
            Ok(config)
        }
        Err(ConfigError::NotFound(p)) if path.is_none() => {
            warn!("No config at {}, using built-in defaults", p.display());
            Ok(Config::default())
        }
        Err(e) => Err(e).context("loading configuration"),
    }
}

fn build_registry(config: &Config) -> anyhow::Result<AssetRegistry> {
    let catalog = config.catalog().context("loading target catalog")?;
    let registry = AssetRegistry::new(
        &catalog,
        &config.paths.receptor_dir,
        &config.paths.config_dir,
    )
    .context("building target registry")?;
    info!("{}", catalog_summary(config, &registry));
    Ok(registry)
}

fn catalog_summary(config: &Config, registry: &AssetRegistry) -> String {
    match &config.paths.catalog_file {
        Some(path) => format!("Target catalog: {} targets from {}", registry.len(), path.display()),
        None => format!("Target catalog: {} targets", registry.len()),
    }
}

fn list_targets(config: &Config) -> anyhow::Result<()> {
    let registry = build_registry(config)?;
    for target in registry.targets() {
        let status = match registry.diagnose(&target.id) {
            None => "ready".to_string(),
            Some(diag) => format!("missing {}", diag.missing.len()),
        };
        println!("{:<20} {:<28} {:<10} {}", target.id, target.label, status, target.description);
    }
    Ok(())
}

fn check_tool(config: &Config) -> anyhow::Result<()> {
    match resolve_executable(&config.tool.executable) {
        Some(path) => {
            println!("Docking tool found: {}", path.display());
            Ok(())
        }
        None => bail!(
            "docking tool {:?} not found (set tool.executable in the config)",
            config.tool.executable
        ),
    }
}

fn collect_ligands(config: &Config, sources: &[PathBuf]) -> anyhow::Result<LigandSet> {
    let default_source = [config.paths.ligand_dir.clone()];
    let sources = if sources.is_empty() { &default_source[..] } else { sources };

    let mut ligands = LigandSet::new();
    for source in sources {
        if source.is_dir() {
            let added = ligands
                .scan_dir(source)
                .with_context(|| format!("scanning {}", source.display()))?;
            info!("Found {} ligands in {}", added, source.display());
        } else {
            ligands
                .add(source)
                .with_context(|| format!("adding ligand {}", source.display()))?;
        }
    }
    Ok(ligands)
}

async fn run_screen(config: Config, args: RunArgs) -> anyhow::Result<()> {
    let registry = build_registry(&config)?;
    let ligands = collect_ligands(&config, &args.ligands)?;
    let selected = if args.targets.is_empty() {
        registry.targets().iter().map(|t| t.id.clone()).collect()
    } else {
        args.targets
    };

    let engine = Arc::new(VinaRunner::from_config(&config.tool));
    info!("Using {}", engine.describe());
    let builder = JobMatrixBuilder::new(&config.paths.output_dir, &config.execution.output_extension);

    let (tx, rx) = mpsc::unbounded_channel();
    let mut runner = BatchRunner::new(registry, engine, builder).with_events(tx);
    if let Some(workers) = args.workers.or(config.execution.max_workers) {
        runner = runner.with_workers(workers);
    }

    let cancel = runner.cancel_signal();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, cancel).await == Interrupt::Forced {
            // The terminal delivers SIGINT to the docking processes as well.
            std::process::exit(130);
        }
    });
    let progress = tokio::spawn(render_progress(rx));

    let mut ctx = RunContext::new(ligands, selected);
    let outcome = runner.run(&mut ctx).await;
    // Dropping the runner closes the event channel so the progress task ends.
    drop(runner);
    let _ = progress.await;
    let report = outcome?;

    print!("{}", render_table(report));
    println!(
        "{} of {} jobs finished ({} scored, {} failed) in {} ms",
        report.completed_jobs(),
        report.total_jobs,
        report.scored(),
        report.failed(),
        report.duration_ms()
    );
    if report.status == RunStatus::Cancelled {
        warn!("Run cancelled, unfinished cells are shown as '-'");
    }

    if let Some(path) = args.json {
        let json = serde_json::to_string_pretty(&JsonReport::from(report))?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        info!("Wrote JSON report to {}", path.display());
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    /// A second interrupt arrived while the run was draining.
    Forced,
    /// Signals could not be received.
    Unavailable,
}

/// First interrupt cancels the run, a second one asks for an immediate exit.
async fn watch_interrupts<F, Fut>(mut next_signal: F, cancel: CancelSignal) -> Interrupt
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if next_signal().await.is_err() {
        return Interrupt::Unavailable;
    }
    warn!("Interrupt received, waiting for running jobs to finish (press Ctrl-C again to abort)");
    cancel.cancel();

    if next_signal().await.is_err() {
        return Interrupt::Unavailable;
    }
    warn!("Second interrupt received, aborting");
    Interrupt::Forced
}

async fn render_progress(mut rx: mpsc::UnboundedReceiver<RunEvent>) {
    let mut bar: Option<ProgressBar> = None;
    while let Some(event) = rx.recv().await {
        match event {
            RunEvent::StateChanged { state } => {
                tracing::debug!("Run state: {:?}", state);
                if matches!(state, RunState::Completed | RunState::Cancelled) {
                    if let Some(bar) = bar.take() {
                        bar.finish_and_clear();
                    }
                }
            }
            RunEvent::JobFinished(p) => {
                let bar = bar.get_or_insert_with(|| new_bar(p.total as u64));
                bar.set_position(p.completed as u64);
                bar.set_message(format!("{} vs {}", p.ligand_id, p.target_id));
            }
        }
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
}

fn new_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}
