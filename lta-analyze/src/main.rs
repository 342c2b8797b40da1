//! Listening test result analysis
//!
//! **Usage:**
//! ```bash
//! lta-analyze -i <results-dir> [-o <output-dir>] [--plot-subjects] [--plot-stimuli]
//!             [--codecs <file>] [--config <file>] [--min-trial-seconds <s>]
//!             [--reference <label>] [--recursive] [--debug]
//! ```

use anyhow::Result;
use clap::Parser;
use lta_analyze::{run, RunOptions};
use lta_common::config::resolve_config;
use std::path::PathBuf;
use tracing::info;

/// Analyze listening test result files
#[derive(Parser, Debug)]
#[command(name = "lta-analyze")]
#[command(about = "Validate and summarize MUSHRA, BS-1116 and AB listening test results")]
struct Args {
    /// Directory containing the result XML files
    #[arg(short, long, value_name = "DIR")]
    input_dir: PathBuf,

    /// Directory the report files are written to
    #[arg(short, long, value_name = "DIR", default_value = "./output/")]
    output_dir: PathBuf,

    /// Write one report file per subject
    #[arg(long)]
    plot_subjects: bool,

    /// Write one report file per stimulus
    #[arg(long)]
    plot_stimuli: bool,

    /// Codec map (JSON or TOML) renaming extracted labels
    #[arg(long, value_name = "FILE")]
    codecs: Option<PathBuf>,

    /// Config file (overrides LTA_CONFIG and the platform config file)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Minimum seconds a subject must spend on a trial
    #[arg(long, value_name = "SECONDS")]
    min_trial_seconds: Option<f64>,

    /// Report scores relative to this label
    #[arg(long, value_name = "LABEL")]
    reference: Option<String>,

    /// Search the input directory recursively
    #[arg(long)]
    recursive: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!(
        "Starting lta-analyze v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut config = resolve_config(args.config.as_deref())?;
    if let Some(secs) = args.min_trial_seconds {
        config.min_trial_seconds = secs;
    }
    if args.recursive {
        config.recursive = true;
    }
    config.validate()?;

    let summary = run(&RunOptions {
        input_dir: args.input_dir,
        output_dir: args.output_dir,
        per_subject: args.plot_subjects,
        per_stimulus: args.plot_stimuli,
        codec_map: args.codecs,
        reference: args.reference,
        config,
    })?;

    info!(
        "Wrote {} files for {} subjects",
        summary.files_written.len(),
        summary.subjects
    );
    Ok(())
}
