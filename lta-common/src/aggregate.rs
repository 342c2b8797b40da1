//! Cross-subject aggregation
//!
//! Two families of statistics:
//!
//! # Mean scores
//! Per-subject [`ResultTable`]s are stacked into a [`ScoreMatrix`] whose rows
//! are (subject, stimulus) pairs and whose columns are codec/system labels.
//! [`summarize`] groups the rows by subject, by stimulus, or not at all, and
//! computes a mean with a t confidence interval for every label. Missing
//! cells are ignored rather than counted as zero.
//!
//! # Win rates
//! For forced-choice tests, [`winrate_vs_each`] counts how often a target
//! label beat each opponent it was paired with. A comparison with no trials
//! reports `winrate: None` instead of dividing by zero.

use crate::model::{SubjectResult, Trial};
use crate::stats::{interval_ignoring_missing, MeanInterval};
use crate::tabulate::ResultTable;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Group name of the summary row over every value
pub const MEAN_GROUP: &str = "mean";

/// Row name of the combined opponents entry in win-rate output
pub const ALL_OPPONENTS: &str = "all";

// ============================================================================
// Forced-choice scale
// ============================================================================

/// Score values that mark a chosen / rejected file in forced-choice tests
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChoiceScale {
    pub win: f64,
    pub loss: f64,
}

impl Default for ChoiceScale {
    fn default() -> Self {
        Self { win: 1.0, loss: 0.0 }
    }
}

impl ChoiceScale {
    pub fn is_win(&self, score: f64) -> bool {
        (score - self.win).abs() < f64::EPSILON
    }

    pub fn is_loss(&self, score: f64) -> bool {
        (score - self.loss).abs() < f64::EPSILON
    }
}

// ============================================================================
// Pairwise comparisons
// ============================================================================

/// Canonical identity of a pairwise comparison: the two labels, sorted
///
/// Presentation order does not affect the key; it only matters to
/// [`win_flag`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComparisonKey {
    pub first: String,
    pub second: String,
}

impl ComparisonKey {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    /// Key of a two-file trial; `None` for any other trial shape
    pub fn from_trial(trial: &Trial) -> Option<Self> {
        match trial.files.as_slice() {
            [a, b] => Some(Self::new(a.system(), b.system())),
            _ => None,
        }
    }
}

impl fmt::Display for ComparisonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vs. {}", self.first, self.second)
    }
}

/// Whether the first label of the trial's [`ComparisonKey`] won
///
/// Only the first-listed file's score is consulted: if it is also the first
/// sorted label, the key's first label won when that file was chosen;
/// otherwise it won when the first-listed file was not chosen.
pub fn win_flag(trial: &Trial, scale: ChoiceScale) -> Option<bool> {
    let key = ComparisonKey::from_trial(trial)?;
    let listed_first = trial.files.first()?;
    let chosen = scale.is_win(listed_first.score);
    Some(if listed_first.system() == key.first {
        chosen
    } else {
        !chosen
    })
}

// ============================================================================
// Win rates
// ============================================================================

/// Wins out of comparisons
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WinRate {
    pub wins: u32,
    pub comps: u32,
    /// `None` when there were no comparisons
    pub winrate: Option<f64>,
}

impl WinRate {
    pub fn new(wins: u32, comps: u32) -> Self {
        let winrate = if comps == 0 {
            None
        } else {
            Some(wins as f64 / comps as f64)
        };
        Self { wins, comps, winrate }
    }

    /// Combine two tallies
    pub fn merge(self, other: WinRate) -> WinRate {
        WinRate::new(self.wins + other.wins, self.comps + other.comps)
    }

    /// Win rate with undefined rendered as NaN
    pub fn value_or_nan(&self) -> f64 {
        self.winrate.unwrap_or(f64::NAN)
    }
}

/// Win rates of one target label against every opponent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinRateTable {
    pub target: String,
    /// Opponent label → target's wins against it
    pub opponents: BTreeMap<String, WinRate>,
    /// All opponents combined
    pub all: WinRate,
}

impl WinRateTable {
    /// Opponent rows followed by the combined row
    pub fn rows(&self) -> impl Iterator<Item = (&str, &WinRate)> {
        self.opponents
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .chain(std::iter::once((ALL_OPPONENTS, &self.all)))
    }
}

/// How often `system` was chosen, over every trial it appeared in
pub fn system_winrate<'a, I>(trials: I, system: &str, scale: ChoiceScale) -> WinRate
where
    I: IntoIterator<Item = &'a Trial>,
{
    let mut wins = 0;
    let mut comps = 0;
    for trial in trials {
        for file in trial.files.iter().filter(|f| f.system() == system) {
            comps += 1;
            if scale.is_win(file.score) {
                wins += 1;
            }
        }
    }
    WinRate::new(wins, comps)
}

/// Win rate of `target` against each label it was compared with
///
/// Every label other than the target that appears in `trials` gets a row,
/// even if it was never paired with the target (zero comparisons, undefined
/// rate). In each trial containing the target, every other file is one
/// comparison, and the target wins it when that opponent's score is the loss
/// value.
pub fn winrate_vs_each<'a, I>(trials: I, target: &str, scale: ChoiceScale) -> WinRateTable
where
    I: IntoIterator<Item = &'a Trial>,
{
    let mut tallies: BTreeMap<String, (u32, u32)> = BTreeMap::new();

    for trial in trials {
        for file in trial.files.iter().filter(|f| f.system() != target) {
            tallies.entry(file.system().to_string()).or_default();
        }
        if !trial.contains(target) {
            continue;
        }
        for file in trial.files.iter().filter(|f| f.system() != target) {
            let (wins, comps) = tallies.entry(file.system().to_string()).or_default();
            *comps += 1;
            if scale.is_loss(file.score) {
                *wins += 1;
            }
        }
    }

    let opponents: BTreeMap<String, WinRate> = tallies
        .into_iter()
        .map(|(system, (wins, comps))| (system, WinRate::new(wins, comps)))
        .collect();
    let all = opponents
        .values()
        .fold(WinRate::new(0, 0), |acc, rate| acc.merge(*rate));

    WinRateTable {
        target: target.to_string(),
        opponents,
        all,
    }
}

/// [`system_winrate`] across every subject
pub fn overall_winrate(
    subjects: &BTreeMap<String, SubjectResult>,
    system: &str,
    scale: ChoiceScale,
) -> WinRate {
    subjects
        .values()
        .map(|s| system_winrate(&s.trials, system, scale))
        .fold(WinRate::new(0, 0), WinRate::merge)
}

/// [`winrate_vs_each`] over one subject's trials
pub fn subject_winrate_vs_each(
    subject: &SubjectResult,
    target: &str,
    scale: ChoiceScale,
) -> WinRateTable {
    winrate_vs_each(&subject.trials, target, scale)
}

/// [`winrate_vs_each`] pooled across every subject
pub fn overall_winrate_vs_each(
    subjects: &BTreeMap<String, SubjectResult>,
    target: &str,
    scale: ChoiceScale,
) -> WinRateTable {
    winrate_vs_each(subjects.values().flat_map(|s| s.trials.iter()), target, scale)
}

/// Per stimulus, the win-rate table of every label presented for it
pub fn stimulus_winrates(
    subjects: &BTreeMap<String, SubjectResult>,
    scale: ChoiceScale,
) -> BTreeMap<String, BTreeMap<String, WinRateTable>> {
    let mut by_stimulus: BTreeMap<&str, Vec<&Trial>> = BTreeMap::new();
    for trial in subjects.values().flat_map(|s| s.trials.iter()) {
        by_stimulus.entry(trial.name.as_str()).or_default().push(trial);
    }

    by_stimulus
        .into_iter()
        .map(|(stimulus, trials)| {
            let systems: BTreeSet<&str> = trials
                .iter()
                .flat_map(|t| t.files.iter().map(|f| f.system()))
                .collect();
            let tables = systems
                .into_iter()
                .map(|system| {
                    let table = winrate_vs_each(trials.iter().copied(), system, scale);
                    (system.to_string(), table)
                })
                .collect();
            (stimulus.to_string(), tables)
        })
        .collect()
}

/// Labels seen anywhere in the given subjects, sorted
pub fn all_systems(subjects: &BTreeMap<String, SubjectResult>) -> BTreeSet<String> {
    subjects
        .values()
        .flat_map(|s| s.trials.iter())
        .flat_map(|t| t.files.iter().map(|f| f.system().to_string()))
        .collect()
}

// ============================================================================
// Score matrix
// ============================================================================

/// One (subject, stimulus) row of the score matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub subject: String,
    pub stimulus: String,
    /// One cell per matrix column; `None` when not tested
    pub values: Vec<Option<f64>>,
}

/// Scores of every subject stacked into (subject, stimulus) × label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<MatrixRow>,
}

impl ScoreMatrix {
    /// Stack per-subject tables; columns are the union of labels, sorted
    pub fn from_tables(tables: &BTreeMap<String, ResultTable>) -> Self {
        let columns: Vec<String> = tables
            .values()
            .flat_map(|t| t.systems())
            .collect::<BTreeSet<&str>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        let rows = tables
            .iter()
            .flat_map(|(subject, table)| {
                let columns = &columns;
                table.stimuli().map(move |stimulus| MatrixRow {
                    subject: subject.clone(),
                    stimulus: stimulus.to_string(),
                    values: columns.iter().map(|c| table.get(stimulus, c)).collect(),
                })
            })
            .collect();

        Self { columns, rows }
    }

    pub fn column_index(&self, system: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == system)
    }

    /// Cells of one column, top to bottom
    pub fn column(&self, index: usize) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.values[index]).collect()
    }

    pub fn subjects(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.subject.as_str()).collect()
    }

    pub fn stimuli(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.stimulus.as_str()).collect()
    }

    /// Mean of each column over present cells
    pub fn column_means(&self) -> Vec<Option<f64>> {
        (0..self.columns.len())
            .map(|i| {
                let present: Vec<f64> = self.column(i).into_iter().flatten().collect();
                crate::stats::sample_mean(&present)
            })
            .collect()
    }

    /// Reorder columns by mean score, ascending; all-missing columns last
    pub fn sorted_by_mean(&self) -> ScoreMatrix {
        let means = self.column_means();
        let mut order: Vec<usize> = (0..self.columns.len()).collect();
        order.sort_by(|&a, &b| match (means[a], means[b]) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        ScoreMatrix {
            columns: order.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| MatrixRow {
                    subject: r.subject.clone(),
                    stimulus: r.stimulus.clone(),
                    values: order.iter().map(|&i| r.values[i]).collect(),
                })
                .collect(),
        }
    }

    /// Scores as differences to another label in the same row
    ///
    /// # Errors
    /// [`Error::InvalidInput`] if `reference` is not a column.
    pub fn relative_to(&self, reference: &str) -> Result<ScoreMatrix> {
        let r = self.column_index(reference).ok_or_else(|| {
            Error::InvalidInput(format!("reference system {} not found in results", reference))
        })?;

        Ok(ScoreMatrix {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .map(|row| MatrixRow {
                    subject: row.subject.clone(),
                    stimulus: row.stimulus.clone(),
                    values: row
                        .values
                        .iter()
                        .map(|v| match (v, row.values[r]) {
                            (Some(v), Some(base)) => Some(v - base),
                            _ => None,
                        })
                        .collect(),
                })
                .collect(),
        })
    }

    /// Rows of a single stimulus
    pub fn filter_stimulus(&self, stimulus: &str) -> ScoreMatrix {
        self.filter_rows(|r| r.stimulus == stimulus)
    }

    /// Rows of a single subject
    pub fn filter_subject(&self, subject: &str) -> ScoreMatrix {
        self.filter_rows(|r| r.subject == subject)
    }

    fn filter_rows(&self, keep: impl Fn(&MatrixRow) -> bool) -> ScoreMatrix {
        ScoreMatrix {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// Grouped summaries
// ============================================================================

/// Axis along which matrix rows are grouped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// One group per subject, over that subject's stimuli
    BySubject,
    /// One group per stimulus, over every subject
    ByStimulus,
    /// A single group over every row
    Overall,
}

/// Mean and interval of one label within a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStat {
    pub system: String,
    #[serde(flatten)]
    pub interval: MeanInterval,
}

/// Summary of one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group: String,
    pub systems: Vec<SystemStat>,
}

impl GroupSummary {
    pub fn get(&self, system: &str) -> Option<&MeanInterval> {
        self.systems
            .iter()
            .find(|s| s.system == system)
            .map(|s| &s.interval)
    }
}

fn summarize_rows(group: String, columns: &[String], rows: &[&MatrixRow], alpha: f64) -> Result<GroupSummary> {
    let systems = columns
        .iter()
        .enumerate()
        .map(|(i, system)| {
            let cells: Vec<Option<f64>> = rows.iter().map(|r| r.values[i]).collect();
            Ok(SystemStat {
                system: system.clone(),
                interval: interval_ignoring_missing(&cells, alpha)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(GroupSummary { group, systems })
}

/// Mean and confidence interval of every label, per group
///
/// Groups come out in sorted key order. For [`Grouping::BySubject`] and
/// [`Grouping::ByStimulus`] a final [`MEAN_GROUP`] summary over all rows is
/// appended; [`Grouping::Overall`] returns only that summary.
///
/// # Errors
/// Invalid `alpha`, or an empty matrix.
pub fn summarize(matrix: &ScoreMatrix, grouping: Grouping, alpha: f64) -> Result<Vec<GroupSummary>> {
    if matrix.is_empty() {
        return Err(Error::InvalidInput("no scores to summarize".to_string()));
    }

    let mut groups: BTreeMap<&str, Vec<&MatrixRow>> = BTreeMap::new();
    match grouping {
        Grouping::BySubject => {
            for row in &matrix.rows {
                groups.entry(row.subject.as_str()).or_default().push(row);
            }
        }
        Grouping::ByStimulus => {
            for row in &matrix.rows {
                groups.entry(row.stimulus.as_str()).or_default().push(row);
            }
        }
        Grouping::Overall => {}
    }

    let mut summaries = groups
        .into_iter()
        .map(|(group, rows)| summarize_rows(group.to_string(), &matrix.columns, &rows, alpha))
        .collect::<Result<Vec<_>>>()?;

    let all_rows: Vec<&MatrixRow> = matrix.rows.iter().collect();
    summaries.push(summarize_rows(
        MEAN_GROUP.to_string(),
        &matrix.columns,
        &all_rows,
        alpha,
    )?);

    debug!(
        grouping = ?grouping,
        groups = summaries.len(),
        systems = matrix.columns.len(),
        "Summarized score matrix"
    );
    Ok(summaries)
}
