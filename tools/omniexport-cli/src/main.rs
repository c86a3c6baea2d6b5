//! omniexport CLI: export panoramas or per-camera images from a recorded
//! six-camera stream.
//!
//! Usage:
//!   omniexport -i <stream> [-o <dir>] [-r START-END] [-x 6processed] [...]
//!
//! Exits with 0 when the run completes, even if some frames or files failed,
//! and with 1 when configuration or initialization fails.

use anyhow::Context;
use clap::{CommandFactory, Parser};

use omniexport_common::logging::init_logging;
use omniexport_common::AppConfig;
use omniexport_engine::software::SoftwareEngine;
use omniexport_engine::ImagingEngine;
use omniexport_pipeline::options::{ExportMode, FrameSelector};
use omniexport_pipeline::{ConfigResolver, FramePipelineController, PipelineConfig, RunSummary};

mod args;

use args::{sanitize_args, Cli};

fn main() -> anyhow::Result<()> {
    let (argv, arg_warnings) = sanitize_args(std::env::args());
    if argv.len() <= 1 && arg_warnings.is_empty() {
        Cli::command().print_help()?;
        anyhow::bail!("No arguments provided");
    }
    let cli = Cli::parse_from(argv);

    let config_path = AppConfig::path();
    let loaded = AppConfig::load_from(&config_path);
    let app_config = loaded.as_ref().cloned().unwrap_or_default();
    let mut logging = app_config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    if cli.log_json {
        logging.json = true;
    }
    init_logging(&logging)?;

    if let Err(e) = &loaded {
        tracing::warn!(
            path = %config_path.display(),
            error = %e,
            "Could not load config file, using built-in defaults"
        );
    }

    for warning in &arg_warnings {
        tracing::warn!("{warning}");
    }

    let resolved = ConfigResolver::new(app_config.defaults)
        .resolve(&cli.raw_options())
        .context("Invalid configuration")?;
    for warning in &resolved.warnings {
        tracing::warn!("{warning}");
    }

    print_config(&resolved.config);

    let engine = SoftwareEngine::new();
    tracing::debug!(engine = engine.name(), "Using imaging engine");
    let mut controller = FramePipelineController::new(engine, resolved.config);
    let summary = controller
        .run()
        .with_context(|| format!("Export aborted during {:?}", controller.state()))?;

    print_summary(&summary);
    Ok(())
}

fn print_config(config: &PipelineConfig) {
    println!();
    match config.mode {
        ExportMode::MultiCamera => println!("Export type: 6 processed camera images"),
        ExportMode::Panorama => {
            println!("Export type: Panoramic ({}x{})", config.width, config.height);
            if !config.rotation.is_zero() {
                println!(
                    "Rotation: Front {:.1}, Down {:.1} degrees",
                    config.rotation.front, config.rotation.down
                );
            }
        }
    }
    match config.frames {
        FrameSelector::All => println!("Frames: all"),
        FrameSelector::Range { start, end } => println!("Frames: {start}-{end}"),
    }
    println!("Output: {}", config.output_prefix.display());
    println!("Output format: {}", config.format.extension());
    println!("Color processing: {:?}", config.color_method);
    println!();
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!(
        "Exported {} of {} frames ({} files)",
        summary.exported_frames().len(),
        summary.range.len(),
        summary.files_written()
    );
    let skipped = summary.skipped_frames();
    if !skipped.is_empty() {
        println!("Skipped frames: {skipped:?}");
    }
    for failure in &summary.degraded {
        println!("Not applied: {} ({})", failure.resource, failure.error);
    }
    if summary.write_failures() > 0 {
        println!("Failed writes: {}", summary.write_failures());
    }
    println!("Export complete.");
}
