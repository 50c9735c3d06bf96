//! s1stack CLI - Sentinel-1 stack selection and co-registration

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use s1stack::config::StackConfig;
use s1stack::core::coregistration::{CoregistrationOrchestrator, OutputLayout, PairStatus};
use s1stack::core::selection::{SelectionPipeline, SelectionRecord};
use s1stack::io::{Catalog, CommandResolver, CommandRunner, ImportedSlc, Scene, SystemExecutor};

#[derive(Parser)]
#[command(name = "s1stack")]
#[command(author, version, about = "Sentinel-1 TOPS stack selection and co-registration", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to $S1STACK_CONFIG or the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select the scenes compatible with the master burst grid
    Select {
        /// Zip products, SLC tab files or directories holding zip products
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Master date (YYYYMMDD) or "auto"
        #[arg(short, long)]
        master: Option<String>,
        /// Output selection file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import the selected scenes and co-register them to the master
    Coreg {
        /// Selection file written by `select`
        #[arg(short, long)]
        selection: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = StackConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    let runner = build_runner(&config)?;

    match cli.command {
        Commands::Select { inputs, master, output } => {
            if let Some(master) = master {
                config.selection.master = master;
            }
            if let Some(output) = output {
                config.selection.output = output;
            }
            select(&config, &runner, &inputs)
        }
        Commands::Coreg { selection } => {
            let path = selection.unwrap_or_else(|| config.selection.output.clone());
            coreg(&config, &runner, &path)
        }
    }
}

fn build_runner(config: &StackConfig) -> Result<CommandRunner> {
    let toolkit = &config.toolkit;
    let resolver = CommandResolver::from_toolkit(&toolkit.root, &toolkit.modules)
        .context("failed to index toolkit executables")?;
    let executor = SystemExecutor::new(toolkit.command_timeout()).context("failed to start process runtime")?;

    Ok(CommandRunner::new(resolver, Arc::new(executor)))
}

fn catalog(inputs: &[PathBuf]) -> Result<Vec<Scene>> {
    let mut scenes = Vec::new();

    for input in inputs {
        let found = if input.is_dir() {
            Catalog::from_dir(input).with_context(|| format!("failed to read directory {}", input.display()))?
        } else {
            Catalog::from_paths([input])
        };
        scenes.extend(found.into_scenes());
    }

    Ok(scenes)
}

fn select(config: &StackConfig, runner: &CommandRunner, inputs: &[PathBuf]) -> Result<()> {
    config.validate().context("invalid configuration")?;

    let settings = &config.selection;
    let aoi = settings.aoi.context("no AOI given")?;
    let dates = settings.date_filter()?;
    let master = settings.master_selector()?;

    let scenes = catalog(inputs)?;
    log::info!("Selecting from {} scenes", scenes.len());

    let pipeline = SelectionPipeline::new(runner, &settings.polarization, settings.workers);
    let selection = pipeline
        .select(scenes, &aoi, Some(&dates).filter(|d| !d.is_unbounded()), &master)
        .context("scene selection failed")?;

    for rejection in &selection.rejected {
        println!("rejected  {}  ({})", rejection.scene.display(), rejection.reason);
    }

    match selection.to_record() {
        Some(record) => {
            record.save(&settings.output)?;
            println!(
                "Selected {} scenes, master {} -> {}",
                record.scenes.len(),
                record.master_date,
                settings.output.display()
            );
        }
        None => println!("No scene passed the selection"),
    }

    Ok(())
}

fn coreg(config: &StackConfig, runner: &CommandRunner, selection: &Path) -> Result<()> {
    let record = SelectionRecord::load(selection)
        .with_context(|| format!("failed to read selection {}", selection.display()))?;
    let settings = &config.coregistration;

    let mut stack: Vec<ImportedSlc> = Vec::with_capacity(record.scenes.len());
    for path in &record.scenes {
        let slc = match Scene::from_path(path)? {
            Scene::RawProduct(product) => product
                .import_slc(runner, &settings.slc_dir, &config.selection.polarization)
                .with_context(|| format!("failed to import {}", path.display()))?,
            Scene::ImportedSlc(slc) => slc,
        };
        stack.push(slc);
    }

    if stack.is_empty() {
        bail!("selection {} lists no scenes", selection.display());
    }

    let layout = OutputLayout::new(&settings.output_dir);
    let mut orchestrator = CoregistrationOrchestrator::new(runner, layout, settings.options.clone())
        .with_raster_ext(&config.toolkit.raster_ext);

    let report = orchestrator
        .run(&stack, record.master_index)
        .context("co-registration failed")?;

    for outcome in &report.outcomes {
        let status = match &outcome.status {
            PairStatus::Registered { .. } => "registered".to_string(),
            PairStatus::Reused { .. } => "reused".to_string(),
            PairStatus::Rejected { residual } => format!("rejected (azimuth offset sum {:.4})", residual),
        };
        println!(
            "{:<8} {}  reference {}  {}",
            outcome.sweep.to_string(),
            outcome.scene_id,
            outcome.reference.as_deref().unwrap_or("-"),
            status
        );
    }

    Ok(())
}
