//! Report generation
//!
//! Writes JSON series files that a charting tool turns into error-bar plots,
//! and logs win-rate summaries for forced-choice tests.
//!
//! | file                         | rows (x-axis)           | written when            |
//! |------------------------------|-------------------------|-------------------------|
//! | `<test>_all_listeners.json`  | subjects + mean         | always                  |
//! | `<test>_all_items.json`      | stimuli + mean          | more than one subject   |
//! | `<test>_<subject>.json`      | stimuli + mean          | per-subject output      |
//! | `<test>_<stimulus>.json`     | subjects + mean         | per-stimulus output     |
//! | `<test>_winrates.json`       | win-rate tables         | forced-choice tests     |
//!
//! A subject or stimulus whose file name would collide with another report
//! file fails the run before anything is written.

use crate::pipeline::Analysis;
use anyhow::{bail, Context, Result};
use lta_common::aggregate::{
    all_systems, overall_winrate, overall_winrate_vs_each, stimulus_winrates, subject_winrate_vs_each,
    summarize, system_winrate, ChoiceScale, GroupSummary, Grouping, ScoreMatrix, WinRate,
    WinRateTable, ALL_OPPONENTS, MEAN_GROUP,
};
use lta_common::tabulate::{
    comparison_table, tabulate, win_tally, ReferencePolicy, ResultTable, WinTally,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What to write and how to compute it
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub output_dir: PathBuf,
    pub per_subject: bool,
    pub per_stimulus: bool,
    /// Express scores as differences to this label
    pub reference: Option<String>,
    pub alpha: f64,
    pub reference_policy: ReferencePolicy,
}

/// Contents of one series file
#[derive(Debug, Clone, Serialize)]
pub struct SeriesFile {
    pub title: String,
    pub listeners: usize,
    /// Labels ordered by mean score, ascending
    pub systems: Vec<String>,
    pub groups: Vec<GroupSummary>,
}

/// Tabulate every subject of the analysis
pub fn score_tables(
    analysis: &Analysis,
    policy: ReferencePolicy,
) -> Result<BTreeMap<String, ResultTable>> {
    analysis
        .subjects
        .iter()
        .map(|(key, subject)| {
            let table = tabulate(subject, analysis.test_type, policy)
                .with_context(|| format!("failed to tabulate results of {}", key))?;
            Ok((key.clone(), table))
        })
        .collect()
}

/// Replace characters that cannot appear in a file name
pub fn file_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

/// Summary files every run may write, reserved ahead of per-subject and
/// per-stimulus files
pub const SUMMARY_FILES: [&str; 3] = ["all_listeners", "all_items", "winrates"];

/// Output file names of one run
#[derive(Debug, Clone)]
pub struct ReportPaths {
    output_dir: PathBuf,
    test: String,
    /// Path → what the file holds
    claimed: BTreeMap<PathBuf, String>,
}

impl ReportPaths {
    pub fn new(output_dir: &Path, test_name: &str) -> Self {
        let mut paths = Self {
            output_dir: output_dir.to_path_buf(),
            test: file_component(test_name),
            claimed: BTreeMap::new(),
        };
        for name in SUMMARY_FILES {
            let path = paths.path_for(name);
            paths.claimed.insert(path, format!("{} summary", name));
        }
        paths
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.json", self.test, file_component(name)))
    }

    /// Path of one of the [`SUMMARY_FILES`]
    pub fn summary(&self, name: &str) -> PathBuf {
        self.path_for(name)
    }

    /// Claim the series file named after `name` for `owner`
    ///
    /// # Errors
    /// The file name is already reserved or claimed.
    pub fn claim(&mut self, owner: String, name: &str) -> Result<PathBuf> {
        let path = self.path_for(name);
        if let Some(existing) = self.claimed.get(&path) {
            bail!(
                "report file {} for {} would overwrite the {}",
                path.display(),
                owner,
                existing
            );
        }
        self.claimed.insert(path.clone(), owner);
        Ok(path)
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn series(
    title: String,
    listeners: usize,
    matrix: &ScoreMatrix,
    grouping: Grouping,
    alpha: f64,
) -> Result<SeriesFile> {
    let sorted = matrix.sorted_by_mean();
    let groups = summarize(&sorted, grouping, alpha)?;
    Ok(SeriesFile {
        title,
        listeners,
        systems: sorted.columns,
        groups,
    })
}

fn log_mean_row(series: &SeriesFile) {
    if let Some(mean) = series.groups.iter().find(|g| g.group == MEAN_GROUP) {
        for stat in &mean.systems {
            info!(
                "{}: {} mean {:.2} ± {:.2} (n = {}{})",
                series.title,
                stat.system,
                stat.interval.mean,
                stat.interval.half_width,
                stat.interval.count,
                if stat.interval.estimated { ", estimated" } else { "" }
            );
        }
    }
}

/// Write the mean-score series files; returns the paths written
pub fn write_score_report(
    analysis: &Analysis,
    opts: &ReportOptions,
    paths: &mut ReportPaths,
) -> Result<Vec<PathBuf>> {
    let tables = score_tables(analysis, opts.reference_policy)?;
    let mut matrix = ScoreMatrix::from_tables(&tables);
    if let Some(reference) = &opts.reference {
        matrix = matrix.relative_to(reference)?;
    }
    if matrix.is_empty() {
        anyhow::bail!("no valid trials left to report");
    }

    let listeners = analysis.subjects.len();
    let mut written = Vec::new();

    // Claim every series file first so a collision leaves the output untouched
    let mut subject_files = Vec::new();
    if opts.per_subject {
        for subject in matrix.subjects() {
            let path = paths.claim(format!("subject {}", subject), subject)?;
            subject_files.push((subject, path));
        }
    }
    let mut stimulus_files = Vec::new();
    if opts.per_stimulus {
        for stimulus in matrix.stimuli() {
            let path = paths.claim(format!("stimulus {}", stimulus), stimulus)?;
            stimulus_files.push((stimulus, path));
        }
    }

    for (subject, path) in subject_files {
        let file = series(
            subject.to_string(),
            1,
            &matrix.filter_subject(subject),
            Grouping::ByStimulus,
            opts.alpha,
        )?;
        write_json(&path, &file)?;
        written.push(path);
    }

    for (stimulus, path) in stimulus_files {
        let file = series(
            stimulus.to_string(),
            listeners,
            &matrix.filter_stimulus(stimulus),
            Grouping::BySubject,
            opts.alpha,
        )?;
        write_json(&path, &file)?;
        written.push(path);
    }

    let all_listeners = series(
        format!("{}: {} listeners", analysis.test_name, listeners),
        listeners,
        &matrix,
        Grouping::BySubject,
        opts.alpha,
    )?;
    log_mean_row(&all_listeners);
    let path = paths.summary("all_listeners");
    write_json(&path, &all_listeners)?;
    written.push(path);

    if listeners > 1 {
        let all_items = series(
            format!("{}: {} listeners", analysis.test_name, listeners),
            listeners,
            &matrix,
            Grouping::ByStimulus,
            opts.alpha,
        )?;
        let path = paths.summary("all_items");
        write_json(&path, &all_items)?;
        written.push(path);
    }

    Ok(written)
}

/// Overall and per-opponent win rates of one label
#[derive(Debug, Clone, Serialize)]
pub struct SystemWinRates {
    pub overall: WinRate,
    pub vs_each: WinRateTable,
}

/// Forced-choice win rates pooled, per subject, and per stimulus
#[derive(Debug, Clone, Serialize)]
pub struct WinRateReport {
    pub overall: BTreeMap<String, SystemWinRates>,
    pub per_subject: BTreeMap<String, BTreeMap<String, SystemWinRates>>,
    pub per_stimulus: BTreeMap<String, BTreeMap<String, WinRateTable>>,
    /// Subject → how often each label was chosen per stimulus
    pub preferences: BTreeMap<String, WinTally>,
}

/// Compute every win-rate view of a forced-choice analysis
pub fn winrate_report(analysis: &Analysis, scale: ChoiceScale) -> WinRateReport {
    let systems = all_systems(&analysis.subjects);

    let overall = systems
        .iter()
        .map(|system| {
            let rates = SystemWinRates {
                overall: overall_winrate(&analysis.subjects, system, scale),
                vs_each: overall_winrate_vs_each(&analysis.subjects, system, scale),
            };
            (system.clone(), rates)
        })
        .collect();

    let per_subject = analysis
        .subjects
        .iter()
        .map(|(key, subject)| {
            let rates = systems
                .iter()
                .map(|system| {
                    let rates = SystemWinRates {
                        overall: system_winrate(&subject.trials, system, scale),
                        vs_each: subject_winrate_vs_each(subject, system, scale),
                    };
                    (system.clone(), rates)
                })
                .collect();
            (key.clone(), rates)
        })
        .collect();

    let preferences = analysis
        .subjects
        .iter()
        .map(|(key, subject)| (key.clone(), win_tally(subject, scale)))
        .collect();

    WinRateReport {
        overall,
        per_subject,
        per_stimulus: stimulus_winrates(&analysis.subjects, scale),
        preferences,
    }
}

fn format_rate(rate: &WinRate) -> String {
    match rate.winrate {
        Some(r) => format!("{:.2} ({} out of {})", r, rate.wins, rate.comps),
        None => format!("NaN ({} out of {})", rate.wins, rate.comps),
    }
}

/// Report lines of one win-rate table; opponents never compared are skipped
pub fn winrate_lines(table: &WinRateTable) -> Vec<String> {
    table
        .rows()
        .filter(|(_, rate)| rate.comps > 0)
        .map(|(opponent, rate)| {
            if opponent == ALL_OPPONENTS {
                format!("{} win rate vs. all systems: {}", table.target, format_rate(rate))
            } else {
                format!(
                    "{} win rate vs. System {}: {}",
                    table.target,
                    opponent,
                    format_rate(rate)
                )
            }
        })
        .collect()
}

/// Log the win-rate report the way a reader scans it: overall, then per subject
pub fn log_winrate_report(report: &WinRateReport) {
    for (system, rates) in &report.overall {
        info!("{} win rate: {}", system, format_rate(&rates.overall));
        for line in winrate_lines(&rates.vs_each) {
            info!("{}", line);
        }
    }
    for (subject, systems) in &report.per_subject {
        info!("Results for {}", subject);
        for (system, rates) in systems {
            info!("{} win rate: {}", system, format_rate(&rates.overall));
            for line in winrate_lines(&rates.vs_each) {
                info!("{}", line);
            }
        }
    }
    for (stimulus, tables) in &report.per_stimulus {
        info!("Win rates for {}:", stimulus);
        for table in tables.values() {
            for line in winrate_lines(table) {
                info!("{}", line);
            }
        }
    }
}

/// Debug-log every pairwise outcome, subject by subject
pub fn log_comparisons(analysis: &Analysis, scale: ChoiceScale) {
    for (subject, result) in &analysis.subjects {
        for (stimulus, outcomes) in comparison_table(result, scale) {
            for (pair, first_won) in outcomes {
                let winner = if first_won { &pair.first } else { &pair.second };
                debug!(subject = %subject, "{}: {} -> {}", stimulus, pair, winner);
            }
        }
    }
}
