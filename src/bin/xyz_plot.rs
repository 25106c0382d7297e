//! Run an X/Y/Z plot sweep from a YAML file against the gradient pipeline

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use xyzgrid::axis::{Axis, AxisRegistry, ModelCatalog};
use xyzgrid::pipeline::synthetic::GradientPipeline;
use xyzgrid::pipeline::ConsoleState;
use xyzgrid::save::DiskSaver;
use xyzgrid::{load_config, SweepRunner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Sweep generation parameters into X/Y/Z grids", long_about = None)]
struct Args {
    /// Path to the sweep YAML file
    config: PathBuf,

    /// Override the grid output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Images per row; enables row-split grids
    #[arg(long)]
    column_width: Option<usize>,

    /// Save one strip grid per row in row-split mode
    #[arg(long)]
    cool_split: bool,

    /// Repeat the whole sweep this many times
    #[arg(long)]
    repeat: Option<usize>,

    /// Swap the X and Y axes before running
    #[arg(long)]
    swap_xy: bool,

    /// Print the axes available for the configured mode and exit
    #[arg(long)]
    list_axes: bool,
}

fn list_axes(registry: &AxisRegistry, catalog: &dyn ModelCatalog) -> Result<()> {
    for option in registry.options() {
        let choices = option.choices_csv(catalog)?.unwrap_or_default();
        println!("{:<40} {:<12} cost {:<4} {}", option.label, option.kind.name(), option.cost, choices);
    }
    Ok(())
}

fn main() -> Result<()> {
    xyzgrid::logging::init_logger();

    let args = Args::parse();
    let sweep = load_config(&args.config)?;
    let mut request = sweep.request();
    let catalog = sweep.config.catalog.clone();
    let registry = AxisRegistry::for_mode(request.base.mode);

    if args.list_axes {
        return list_axes(&registry, &catalog);
    }

    if let Some(dir) = &args.output_dir {
        request.output.outpath_grids = dir.to_string_lossy().into_owned();
    }
    if let Some(width) = args.column_width {
        request.options.column_width = width;
    }
    if args.cool_split {
        request.options.cool_split = true;
    }
    if let Some(repeat) = args.repeat {
        request.options.multiple_run_count = repeat;
    }
    if args.swap_xy {
        request.swap_axes(Axis::X, Axis::Y);
    }

    info!(
        "Starting sweep {:?} ({}) with config: {}",
        sweep.config.name.as_deref().unwrap_or("unnamed"),
        sweep.job,
        args.config.display()
    );

    let state = ConsoleState::new();
    let mut saver = DiskSaver::new();
    let mut pipeline = GradientPipeline::new();
    let mut runner = SweepRunner::new(&registry, &catalog, &state, &mut saver);
    let result = runner
        .run(&mut pipeline, &request)
        .with_context(|| format!("Sweep {} failed", args.config.display()))?;

    if result.is_empty() {
        warn!("Sweep produced no images");
    } else {
        info!(
            "Sweep finished: {} image(s), {} generation call(s), grids in {}",
            result.len(),
            pipeline.calls(),
            request.output.outpath_grids
        );
    }
    Ok(())
}
