use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use common::file_format::SerdeFormat;
use common::log_setup::{setup_logging, MAX_VERBOSITY};
use segmerge::criteria::TraversingCriterion;
use segmerge::{merge_regions, LabelVolume, MergeConfig, MergeReport, VoxelVolume};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input labeled volume (.yaml, .yml or .json)
    input: PathBuf,

    /// Output volume, defaults to <input>.merged.<ext>
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run configuration (.yaml, .yml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Raise verbosity, may be repeated
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn default_output(input: &Path) -> Result<PathBuf> {
    let format = SerdeFormat::from_file_name(&path_str(input)?)?;
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .context("Input file has no name")?;

    Ok(input.with_file_name(format!("{}.merged.{}", stem, format.extension())))
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))
}

/// Writes the report as JSON. Logging never shares this stream.
fn write_report<W: Write>(out: &mut W, report: &MergeReport) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => MergeConfig::from_file(&path_str(path)?)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => MergeConfig::default(),
    };
    let verbosity = config.verbosity.saturating_add(args.verbose).min(MAX_VERBOSITY);
    let _logger = setup_logging(verbosity);

    info!("Reading {}", args.input.display());
    let mut volume = VoxelVolume::<u32>::from_file(&path_str(&args.input)?)
        .with_context(|| format!("Failed to load volume {}", args.input.display()))?;
    info!(
        "Dimensions {:?}, {} regions",
        volume.dimensions(),
        volume.region_count()
    );

    let criterion = TraversingCriterion::new(config.criterion.clone());
    let report = merge_regions(&mut volume, &criterion, config.merge_options())?;

    let output = match args.output {
        Some(output) => output,
        None => default_output(&args.input)?,
    };
    info!("Writing {}", output.display());
    volume.to_file(&path_str(&output)?)?;

    write_report(&mut std::io::stdout().lock(), &report)?;

    Ok(())
}
