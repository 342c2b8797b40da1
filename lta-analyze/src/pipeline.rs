//! Per-subject processing: read, annotate, validate
//!
//! Each result file is processed to completion before the next one. A file
//! that cannot be read, labelled or tabulated aborts the run with the file
//! path in the error context, so a malformed session never silently skews
//! the statistics of other subjects.

use anyhow::{bail, Context, Result};
use lta_common::annotate::annotate;
use lta_common::config::AnalysisConfig;
use lta_common::normalize::CodecMap;
use lta_common::parse::read_results_file;
use lta_common::validate::check_trial_validity;
use lta_common::{SubjectResult, TestType};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Trials removed from one subject, for reporting
#[derive(Debug, Clone, Serialize)]
pub struct SubjectExclusions {
    pub subject: String,
    pub bad_duration: usize,
    pub skipped_playback: usize,
    /// Rendered report lines
    pub lines: Vec<String>,
}

/// Validated results of every subject of one test
#[derive(Debug, Clone)]
pub struct Analysis {
    pub test_type: TestType,
    pub test_name: String,
    /// Subject key → validated result
    pub subjects: BTreeMap<String, SubjectResult>,
    /// Subjects that had trials removed
    pub exclusions: Vec<SubjectExclusions>,
}

impl Analysis {
    /// Trials removed across all subjects (counted once per reason)
    pub fn excluded_trials(&self) -> usize {
        self.exclusions
            .iter()
            .map(|e| e.bad_duration + e.skipped_playback)
            .sum()
    }
}

/// Read, annotate and validate one result file
///
/// `index` is the 1-based position of the file among the `total` files of
/// the run.
pub fn load_subject(
    path: &Path,
    index: usize,
    total: usize,
    config: &AnalysisConfig,
    codec_map: Option<&CodecMap>,
) -> Result<(SubjectResult, Option<SubjectExclusions>)> {
    info!("Handling {}", path.display());

    let mut result = read_results_file(path, index, total)
        .with_context(|| format!("failed to read results from {}", path.display()))?;
    annotate(&mut result, codec_map)
        .with_context(|| format!("failed to label test files in {}", path.display()))?;

    let rules = config.validity_rules();
    let check = check_trial_validity(result, &rules);

    let exclusions = if check.is_clean() {
        None
    } else {
        let lines = check.summary_lines();
        info!("Validity check for {}:", check.filtered.key);
        for line in &lines {
            info!("{}", line);
        }
        Some(SubjectExclusions {
            subject: check.filtered.key.clone(),
            bad_duration: check.bad_duration.len(),
            skipped_playback: check.skipped_playback.len(),
            lines,
        })
    };

    // Filtering must leave nothing further to remove
    let recheck = check_trial_validity(check.filtered, &rules);
    if !recheck.is_clean() {
        bail!(
            "validity filtering of {} is not stable: {} trials still invalid",
            path.display(),
            recheck.bad_duration.len() + recheck.skipped_playback.len()
        );
    }

    Ok((recheck.filtered, exclusions))
}

/// Process every result file of a test
///
/// All files must record the same test type.
pub fn load_subjects(
    files: &[PathBuf],
    config: &AnalysisConfig,
    codec_map: Option<&CodecMap>,
) -> Result<Analysis> {
    if files.is_empty() {
        bail!("No listening test results were found");
    }

    let mut test_type: Option<TestType> = None;
    let mut test_name = String::new();
    let mut subjects = BTreeMap::new();
    let mut exclusions = Vec::new();

    for (i, path) in files.iter().enumerate() {
        let (result, excluded) = load_subject(path, i + 1, files.len(), config, codec_map)?;

        let file_type = result
            .test_type()
            .with_context(|| format!("unsupported results file {}", path.display()))?;
        match test_type {
            None => {
                test_type = Some(file_type);
                test_name = result.info.test_name.clone();
            }
            Some(t) if t != file_type => {
                bail!(
                    "{} records a {} test, but earlier files record {}",
                    path.display(),
                    file_type,
                    t
                );
            }
            Some(_) => {}
        }

        exclusions.extend(excluded);
        subjects.insert(result.key.clone(), result);
    }

    let test_type = test_type.context("No listening test results were found")?;
    info!(
        test_type = %test_type,
        subjects = subjects.len(),
        "Loaded listening test results"
    );

    Ok(Analysis {
        test_type,
        test_name,
        subjects,
        exclusions,
    })
}
