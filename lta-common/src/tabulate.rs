//! Per-subject tabulation
//!
//! Reshapes one annotated subject result into tables keyed by stimulus
//! (trial name) and codec/system label:
//!
//! - [`ResultTable`]: stimulus → label → score, stored according to the test
//!   type's [`ScoringKind`]
//! - [`WinTally`]: stimulus → label → wins and appearances (forced choice)
//! - [`ComparisonTable`]: stimulus → pair → whether the first label won
//!
//! A label that was not presented for a stimulus is simply absent, so lookups
//! return `None` and never a zero score.

use crate::aggregate::{win_flag, ChoiceScale, ComparisonKey};
use crate::model::{ScoringKind, SubjectResult, TestType};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Whether differential tables keep a row for the reference itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferencePolicy {
    /// Store the reference as its own delta (always 0.0)
    #[default]
    KeepZero,
    /// Leave the reference out of differential tables
    Omit,
}

/// One subject's scores: stimulus → label → score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    rows: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ResultTable {
    pub fn get(&self, stimulus: &str, system: &str) -> Option<f64> {
        self.rows.get(stimulus)?.get(system).copied()
    }

    /// Stimuli in sorted order
    pub fn stimuli(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    /// Every label present for any stimulus, sorted
    pub fn systems(&self) -> BTreeSet<&str> {
        self.rows
            .values()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect()
    }

    pub fn row(&self, stimulus: &str) -> Option<&BTreeMap<String, f64>> {
        self.rows.get(stimulus)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Running sum used while the same label repeats within a stimulus
#[derive(Default)]
struct Accumulator {
    sum: f64,
    count: usize,
}

/// Build the score table of one annotated subject
///
/// - Differential: score minus the same trial's reference score; the
///   reference row follows `policy`.
/// - Absolute and forced choice: raw scores.
///
/// A label presented several times for one stimulus (AB tests pair each
/// stimulus with several opponents) stores the mean of its scores; for 0/1
/// preference scores that is the label's win fraction on the stimulus.
///
/// # Errors
/// [`Error::MissingReference`] for a differential trial without a reference.
pub fn tabulate(
    result: &SubjectResult,
    test_type: TestType,
    policy: ReferencePolicy,
) -> Result<ResultTable> {
    let scoring = test_type.scoring();
    let mut acc: BTreeMap<String, BTreeMap<String, Accumulator>> = BTreeMap::new();

    for trial in &result.trials {
        let row = acc.entry(trial.name.clone()).or_default();

        let reference_score = match scoring {
            ScoringKind::Differential => Some(
                trial
                    .reference()
                    .ok_or_else(|| Error::MissingReference {
                        trial: trial.name.clone(),
                    })?
                    .score,
            ),
            ScoringKind::Absolute | ScoringKind::ForcedChoice => None,
        };

        for file in &trial.files {
            let value = match reference_score {
                Some(_) if file.is_reference() && policy == ReferencePolicy::Omit => continue,
                Some(reference) => file.score - reference,
                None => file.score,
            };
            let cell = row.entry(file.system().to_string()).or_default();
            cell.sum += value;
            cell.count += 1;
        }
    }

    let rows = acc
        .into_iter()
        .map(|(stimulus, cells)| {
            let cells = cells
                .into_iter()
                .map(|(system, a)| (system, a.sum / a.count as f64))
                .collect();
            (stimulus, cells)
        })
        .collect();

    let table = ResultTable { rows };
    debug!(
        subject = %result.key,
        test_type = %test_type,
        stimuli = table.len(),
        systems = table.systems().len(),
        "Tabulated subject results"
    );
    Ok(table)
}

/// Wins and appearances of one label on one stimulus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinCount {
    pub wins: u32,
    pub trials: u32,
}

/// Forced-choice tally: stimulus → label → wins / appearances
pub type WinTally = BTreeMap<String, BTreeMap<String, WinCount>>;

/// Count, per stimulus, how often each label was chosen
///
/// Shows overall preference per stimulus; use the win-rate functions in
/// [`crate::aggregate`] for specific pairings.
pub fn win_tally(result: &SubjectResult, scale: ChoiceScale) -> WinTally {
    let mut tally = WinTally::new();
    for trial in &result.trials {
        let row = tally.entry(trial.name.clone()).or_default();
        for file in &trial.files {
            let count = row.entry(file.system().to_string()).or_default();
            count.trials += 1;
            if scale.is_win(file.score) {
                count.wins += 1;
            }
        }
    }
    tally
}

/// Forced-choice outcomes: stimulus → comparison → first label won
pub type ComparisonTable = BTreeMap<String, BTreeMap<ComparisonKey, bool>>;

/// Record each pairwise trial's outcome under its canonical comparison key
///
/// Trials that do not hold exactly two files are skipped. A pairing repeated
/// for the same stimulus keeps the last outcome.
pub fn comparison_table(result: &SubjectResult, scale: ChoiceScale) -> ComparisonTable {
    let mut table = ComparisonTable::new();
    for trial in &result.trials {
        let (Some(key), Some(win)) = (ComparisonKey::from_trial(trial), win_flag(trial, scale))
        else {
            continue;
        };
        table.entry(trial.name.clone()).or_default().insert(key, win);
    }
    table
}
