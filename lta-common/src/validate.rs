//! Trial Validity Checks
//!
//! Removes trials the subject did not listen to properly:
//! - **Duration**: less time spent on the trial than [`ValidityRules::min_trial_seconds`]
//! - **Skipped playback**: at least one test file played fewer than
//!   [`ValidityRules::min_plays`] times
//!
//! Exclusions are not errors. They are reported per reason and processing
//! continues with the remaining trials. Checking an already filtered result
//! removes nothing, which callers can assert with [`ValidityCheck::is_clean`].

use crate::model::{SubjectResult, Trial};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default minimum listening time per trial, in seconds
///
/// Ideally about twice the length of the shortest stimulus in the test.
pub const DEFAULT_MIN_TRIAL_SECONDS: f64 = 15.0;

/// Default minimum number of plays per test file
pub const DEFAULT_MIN_PLAYS: u32 = 1;

/// Thresholds a trial must meet to be kept
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidityRules {
    pub min_trial_seconds: f64,
    pub min_plays: u32,
}

impl Default for ValidityRules {
    fn default() -> Self {
        Self {
            min_trial_seconds: DEFAULT_MIN_TRIAL_SECONDS,
            min_plays: DEFAULT_MIN_PLAYS,
        }
    }
}

impl ValidityRules {
    pub fn is_too_short(&self, trial: &Trial) -> bool {
        trial.duration_secs < self.min_trial_seconds
    }

    pub fn has_skipped_playback(&self, trial: &Trial) -> bool {
        trial.files.iter().any(|f| f.plays < self.min_plays)
    }
}

/// Outcome of checking one subject's trials
#[derive(Debug, Clone)]
pub struct ValidityCheck {
    /// The subject's result with invalid trials removed
    pub filtered: SubjectResult,
    /// Trials shorter than the minimum duration, in presentation order
    pub bad_duration: Vec<Trial>,
    /// Trials with at least one unplayed file, in presentation order
    pub skipped_playback: Vec<Trial>,
    /// Rules the check was run with
    pub rules: ValidityRules,
}

impl ValidityCheck {
    /// True when no trial was removed
    pub fn is_clean(&self) -> bool {
        self.bad_duration.is_empty() && self.skipped_playback.is_empty()
    }

    /// Number of distinct trials removed (a trial can fail both checks)
    pub fn removed_count(&self, original_trials: usize) -> usize {
        original_trials - self.filtered.trials.len()
    }

    /// Human-readable report lines, sorted, one block per reason
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.skipped_playback.is_empty() {
            lines.push("Did not listen to all stimuli:".to_string());
            lines.extend(describe_trials(&self.skipped_playback));
        }
        if !self.bad_duration.is_empty() {
            lines.push(format!(
                "Not enough time spent listening to trial (minimum {} seconds):",
                self.rules.min_trial_seconds
            ));
            lines.extend(describe_trials(&self.bad_duration));
        }
        lines
    }
}

fn describe_trials(trials: &[Trial]) -> Vec<String> {
    let mut lines: Vec<String> = trials
        .iter()
        .map(|trial| {
            format!(
                "  {}: {} ({} sec.)",
                trial.name,
                trial.systems().join(" vs. "),
                trial.duration_secs
            )
        })
        .collect();
    lines.sort();
    lines
}

/// Filter invalid trials out of a subject result
pub fn check_trial_validity(result: SubjectResult, rules: &ValidityRules) -> ValidityCheck {
    let SubjectResult { key, info, trials } = result;

    let mut kept = Vec::with_capacity(trials.len());
    let mut bad_duration = Vec::new();
    let mut skipped_playback = Vec::new();

    for trial in trials {
        let too_short = rules.is_too_short(&trial);
        let skipped = rules.has_skipped_playback(&trial);

        if too_short {
            debug!(
                subject = %key,
                trial = %trial.name,
                seconds = trial.duration_secs,
                "Trial below minimum duration"
            );
        }
        if skipped {
            debug!(subject = %key, trial = %trial.name, "Trial has unplayed test files");
        }

        match (too_short, skipped) {
            (false, false) => kept.push(trial),
            (true, true) => {
                bad_duration.push(trial.clone());
                skipped_playback.push(trial);
            }
            (true, false) => bad_duration.push(trial),
            (false, true) => skipped_playback.push(trial),
        }
    }

    if !bad_duration.is_empty() || !skipped_playback.is_empty() {
        info!(
            subject = %key,
            too_short = bad_duration.len(),
            skipped = skipped_playback.len(),
            kept = kept.len(),
            "Excluded invalid trials"
        );
    }

    ValidityCheck {
        filtered: SubjectResult {
            key,
            info,
            trials: kept,
        },
        bad_duration,
        skipped_playback,
        rules: *rules,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SessionInfo, TestFile};

    fn ab_trial(name: &str, seconds: f64, plays: (u32, u32)) -> Trial {
        Trial::new(
            name,
            seconds,
            vec![
                TestFile::new(format!("{name}_I.wav"), plays.0, 1.0).with_label("I"),
                TestFile::new(format!("{name}_II.wav"), plays.1, 0.0).with_label("II"),
            ],
        )
    }

    fn subject(trials: Vec<Trial>) -> SubjectResult {
        SubjectResult {
            key: "Subject 1: a".to_string(),
            info: SessionInfo {
                tag: "AB_Forced_Choice".to_string(),
                test_name: "ab".to_string(),
                subject_name: "a".to_string(),
                start_time: None,
                stop_time: None,
                test_status: "complete".to_string(),
                trials_per_session: None,
                current_trial: None,
                stimuli_directory: None,
            },
            trials,
        }
    }

    #[test]
    fn test_short_trial_removed() {
        let result = subject(vec![ab_trial("a", 10.0, (1, 1)), ab_trial("b", 20.0, (1, 1))]);
        let check = check_trial_validity(result, &ValidityRules::default());

        assert_eq!(check.filtered.trials.len(), 1);
        assert_eq!(check.filtered.trials[0].name, "b");
        assert_eq!(check.bad_duration.len(), 1);
        assert_eq!(check.bad_duration[0].name, "a");
        assert!(check.skipped_playback.is_empty());
        assert_eq!(check.removed_count(2), 1);
    }

    #[test]
    fn test_exact_minimum_duration_is_valid() {
        let result = subject(vec![ab_trial("a", 15.0, (1, 1))]);
        assert!(check_trial_validity(result, &ValidityRules::default()).is_clean());
    }

    #[test]
    fn test_unplayed_file_removed() {
        let result = subject(vec![ab_trial("a", 30.0, (1, 0))]);
        let check = check_trial_validity(result, &ValidityRules::default());
        assert!(check.filtered.trials.is_empty());
        assert_eq!(check.skipped_playback.len(), 1);
        assert!(check.bad_duration.is_empty());
    }

    #[test]
    fn test_trial_failing_both_reported_twice_removed_once() {
        let result = subject(vec![ab_trial("a", 3.0, (0, 1))]);
        let check = check_trial_validity(result, &ValidityRules::default());
        assert_eq!(check.bad_duration.len(), 1);
        assert_eq!(check.skipped_playback.len(), 1);
        assert_eq!(check.removed_count(1), 1);
    }

    #[test]
    fn test_validation_is_idempotent() {
        let result = subject(vec![
            ab_trial("a", 10.0, (1, 1)),
            ab_trial("b", 20.0, (0, 1)),
            ab_trial("c", 20.0, (2, 3)),
        ]);
        let rules = ValidityRules::default();
        let first = check_trial_validity(result, &rules);
        assert!(!first.is_clean());

        let second = check_trial_validity(first.filtered.clone(), &rules);
        assert!(second.is_clean());
        assert_eq!(second.filtered, first.filtered);
    }

    #[test]
    fn test_custom_rules() {
        let rules = ValidityRules {
            min_trial_seconds: 5.0,
            min_plays: 2,
        };
        let result = subject(vec![ab_trial("a", 10.0, (2, 2)), ab_trial("b", 10.0, (2, 1))]);
        let check = check_trial_validity(result, &rules);
        assert_eq!(check.filtered.trials.len(), 1);
        assert_eq!(check.skipped_playback[0].name, "b");
    }

    #[test]
    fn test_summary_lines() {
        let result = subject(vec![ab_trial("z", 10.0, (1, 1)), ab_trial("b", 20.0, (0, 1))]);
        let check = check_trial_validity(result, &ValidityRules::default());
        let lines = check.summary_lines();
        assert_eq!(
            lines,
            vec![
                "Did not listen to all stimuli:".to_string(),
                "  b: I vs. II (20 sec.)".to_string(),
                "Not enough time spent listening to trial (minimum 15 seconds):".to_string(),
                "  z: I vs. II (10 sec.)".to_string(),
            ]
        );
    }
}
