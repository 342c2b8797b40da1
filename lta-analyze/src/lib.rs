//! lta-analyze library
//!
//! Runs the listening-test analysis: discovers result files, processes each
//! subject through the parse → annotate → validate pipeline, and writes the
//! report files into the output directory.

pub mod discover;
pub mod pipeline;
pub mod report;

use anyhow::{Context, Result};
use lta_common::aggregate::ChoiceScale;
use lta_common::config::{load_codec_map, AnalysisConfig};
use std::path::PathBuf;
use tracing::info;

/// Everything one analysis run needs
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub per_subject: bool,
    pub per_stimulus: bool,
    /// Overrides `config.codec_map`
    pub codec_map: Option<PathBuf>,
    pub reference: Option<String>,
    pub config: AnalysisConfig,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub files_written: Vec<PathBuf>,
    pub subjects: usize,
    pub excluded_trials: usize,
}

/// Run the full analysis
pub fn run(opts: &RunOptions) -> Result<RunSummary> {
    let codec_map = match opts.codec_map.as_ref().or(opts.config.codec_map.as_ref()) {
        Some(path) => Some(
            load_codec_map(path)
                .with_context(|| format!("failed to load codec map {}", path.display()))?,
        ),
        None => None,
    };

    let files = discover::find_result_files(&opts.input_dir, opts.config.recursive)?;
    info!("Found {} result files in {}", files.len(), opts.input_dir.display());

    let analysis = pipeline::load_subjects(&files, &opts.config, codec_map.as_ref())?;

    std::fs::create_dir_all(&opts.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            opts.output_dir.display()
        )
    })?;

    let report_opts = report::ReportOptions {
        output_dir: opts.output_dir.clone(),
        per_subject: opts.per_subject,
        per_stimulus: opts.per_stimulus,
        reference: opts.reference.clone(),
        alpha: opts.config.alpha,
        reference_policy: opts.config.reference_policy,
    };
    let mut paths = report::ReportPaths::new(&opts.output_dir, &analysis.test_name);
    let mut files_written = report::write_score_report(&analysis, &report_opts, &mut paths)?;

    if analysis.test_type.is_forced_choice() {
        let scale = ChoiceScale::default();
        report::log_comparisons(&analysis, scale);
        let winrates = report::winrate_report(&analysis, scale);
        report::log_winrate_report(&winrates);
        let path = paths.summary("winrates");
        report::write_json(&path, &winrates)?;
        files_written.push(path);
    }

    let summary = RunSummary {
        files_written,
        subjects: analysis.subjects.len(),
        excluded_trials: analysis.excluded_trials(),
    };
    info!(
        subjects = summary.subjects,
        excluded_trials = summary.excluded_trials,
        files = summary.files_written.len(),
        "Analysis complete"
    );
    Ok(summary)
}
