//! Typed listening test records
//!
//! A parsed result file becomes one [`SubjectResult`]: the session header
//! ([`SessionInfo`]) plus the ordered [`Trial`]s the subject completed. Each
//! trial owns the [`TestFile`]s that were presented in it.
//!
//! Records are plain owned data. Labels are attached once by the annotator;
//! the validator only removes whole trials.

use crate::{Error, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Substring that marks a test file as the (hidden or open) reference
pub const REFERENCE_MARKER: &str = "reference";

/// Test methodology recorded as the root tag of a result file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TestType {
    Mushra,
    MushraStrict,
    MushraDemo,
    Bs1116,
    AbForcedChoice,
    AudioVideoAbForcedChoice,
}

/// How raw scores of a test type are stored in a result table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoringKind {
    /// Scores are stored relative to the trial's reference score
    Differential,
    /// Scores are stored as rated
    Absolute,
    /// Binary preference scores (1.0 = chosen, 0.0 = not chosen)
    ForcedChoice,
}

impl TestType {
    /// Every supported test type, in tag order
    pub const ALL: [TestType; 6] = [
        TestType::Mushra,
        TestType::MushraStrict,
        TestType::MushraDemo,
        TestType::Bs1116,
        TestType::AbForcedChoice,
        TestType::AudioVideoAbForcedChoice,
    ];

    /// Root tag written by the listening test application
    pub fn tag(&self) -> &'static str {
        match self {
            TestType::Mushra => "MUSHRA",
            TestType::MushraStrict => "MUSHRA_Strict",
            TestType::MushraDemo => "MUSHRA_Demo",
            TestType::Bs1116 => "BS-1116",
            TestType::AbForcedChoice => "AB_Forced_Choice",
            TestType::AudioVideoAbForcedChoice => "AudioVideo_AB_Forced_Choice",
        }
    }

    /// Tabulation strategy for this test type
    pub fn scoring(&self) -> ScoringKind {
        match self {
            TestType::Bs1116 => ScoringKind::Differential,
            TestType::Mushra | TestType::MushraStrict | TestType::MushraDemo => {
                ScoringKind::Absolute
            }
            TestType::AbForcedChoice | TestType::AudioVideoAbForcedChoice => {
                ScoringKind::ForcedChoice
            }
        }
    }

    pub fn is_forced_choice(&self) -> bool {
        self.scoring() == ScoringKind::ForcedChoice
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for TestType {
    type Err = Error;

    /// Tags are matched case-insensitively, as the recording application does
    fn from_str(s: &str) -> Result<Self> {
        TestType::ALL
            .iter()
            .copied()
            .find(|t| t.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnsupportedTestType(s.to_string()))
    }
}

/// One rendered stimulus presented to the listener within a trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestFile {
    /// File name as recorded (no directory)
    pub file_name: String,
    /// How many times the listener started playback of this file
    pub plays: u32,
    /// Raw score (MUSHRA scale, BS-1116 grade, or 0/1 preference)
    pub score: f64,
    /// Free-text comment left by the listener
    pub comment: Option<String>,
    /// Codec/system label, set by the annotator
    pub label: Option<String>,
}

impl TestFile {
    /// Create an unannotated test file record
    pub fn new(file_name: impl Into<String>, plays: u32, score: f64) -> Self {
        Self {
            file_name: file_name.into(),
            plays,
            score,
            comment: None,
            label: None,
        }
    }

    /// Builder-style helper used mostly by tests and fixtures
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Annotated label, or the raw file name before annotation
    pub fn system(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.file_name)
    }

    /// Whether this file is a reference rendering (case-insensitive match)
    ///
    /// The recorded file name is checked too, so a codec map may rename the
    /// reference label.
    pub fn is_reference(&self) -> bool {
        let marked = |s: &str| s.to_ascii_lowercase().contains(REFERENCE_MARKER);
        marked(self.system()) || marked(&self.file_name)
    }
}

/// One comparison unit presented to a subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Trial name; identifies the stimulus
    pub name: String,
    /// Elapsed listening time in seconds
    pub duration_secs: f64,
    /// Plays of the open reference (MUSHRA / BS-1116)
    pub reference_plays: u32,
    /// Test files in presentation order
    pub files: Vec<TestFile>,
    /// Accompanying video for audio/video tests
    pub video_file: Option<String>,
}

impl Trial {
    pub fn new(name: impl Into<String>, duration_secs: f64, files: Vec<TestFile>) -> Self {
        Self {
            name: name.into(),
            duration_secs,
            reference_plays: 0,
            files,
            video_file: None,
        }
    }

    /// Labels of the files in this trial, sorted
    pub fn systems(&self) -> Vec<&str> {
        let mut systems: Vec<&str> = self.files.iter().map(TestFile::system).collect();
        systems.sort_unstable();
        systems
    }

    /// First file carrying the given label
    pub fn file(&self, system: &str) -> Option<&TestFile> {
        self.files.iter().find(|f| f.system() == system)
    }

    pub fn contains(&self, system: &str) -> bool {
        self.file(system).is_some()
    }

    /// First reference file of the trial
    pub fn reference(&self) -> Option<&TestFile> {
        self.files.iter().find(|f| f.is_reference())
    }
}

/// Session header of one result file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Root tag of the result file (test type as written)
    pub tag: String,
    pub test_name: String,
    pub subject_name: String,
    pub start_time: Option<DateTime<FixedOffset>>,
    pub stop_time: Option<DateTime<FixedOffset>>,
    /// `complete` or `incomplete`
    pub test_status: String,
    /// `None` when the session presented all trials
    pub trials_per_session: Option<u32>,
    /// Index of the trial the subject stopped at (incomplete sessions only)
    pub current_trial: Option<u32>,
    pub stimuli_directory: Option<String>,
}

impl SessionInfo {
    /// Parsed test type of this session
    pub fn test_type(&self) -> Result<TestType> {
        self.tag.parse()
    }

    pub fn is_complete(&self) -> bool {
        self.test_status.eq_ignore_ascii_case("complete")
    }

    /// Wall-clock length of the session, when both timestamps were recorded
    pub fn session_duration(&self) -> Option<chrono::Duration> {
        match (self.start_time, self.stop_time) {
            (Some(start), Some(stop)) => Some(stop - start),
            _ => None,
        }
    }
}

/// One listener's full session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectResult {
    /// Display key, `Subject <n>: <subjectName>`
    pub key: String,
    pub info: SessionInfo,
    pub trials: Vec<Trial>,
}

impl SubjectResult {
    /// Build the display key used to identify a subject across reports
    ///
    /// `index` is zero-padded to the width of `total`, so keys of one run sort
    /// in file order (`Subject 02` before `Subject 10`).
    pub fn subject_key(index: usize, total: usize, subject_name: &str) -> String {
        let width = total.max(index).to_string().len();
        format!("Subject {:0width$}: {}", index, subject_name, width = width)
    }

    /// Stimulus names in order of first appearance
    pub fn stimuli(&self) -> Vec<&str> {
        let mut stimuli: Vec<&str> = Vec::new();
        for trial in &self.trials {
            if !stimuli.contains(&trial.name.as_str()) {
                stimuli.push(&trial.name);
            }
        }
        stimuli
    }

    pub fn test_type(&self) -> Result<TestType> {
        self.info.test_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_parses_case_insensitively() {
        assert_eq!("bs-1116".parse::<TestType>().unwrap(), TestType::Bs1116);
        assert_eq!("MUSHRA".parse::<TestType>().unwrap(), TestType::Mushra);
        assert_eq!(
            "audiovideo_ab_forced_choice".parse::<TestType>().unwrap(),
            TestType::AudioVideoAbForcedChoice
        );
    }

    #[test]
    fn test_type_rejects_unknown_tag() {
        let err = "ABX".parse::<TestType>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedTestType(tag) if tag == "ABX"));
    }

    #[test]
    fn test_type_tag_roundtrip() {
        for t in TestType::ALL {
            assert_eq!(t.tag().parse::<TestType>().unwrap(), t);
        }
    }

    #[test]
    fn test_scoring_kinds() {
        assert_eq!(TestType::Bs1116.scoring(), ScoringKind::Differential);
        assert_eq!(TestType::MushraStrict.scoring(), ScoringKind::Absolute);
        assert!(TestType::AbForcedChoice.is_forced_choice());
    }

    #[test]
    fn test_reference_detection_ignores_case() {
        assert!(TestFile::new("x.wav", 1, 0.0).with_label("Reference").is_reference());
        assert!(TestFile::new("x.wav", 1, 0.0).with_label("hidden_reference").is_reference());
        assert!(!TestFile::new("x.wav", 1, 0.0).with_label("anchor_35").is_reference());
        assert!(TestFile::new("x_reference.wav", 1, 0.0).with_label("Original").is_reference());
    }

    #[test]
    fn test_subject_keys_sort_in_file_order() {
        assert_eq!(SubjectResult::subject_key(3, 9, "a"), "Subject 3: a");
        assert_eq!(SubjectResult::subject_key(2, 12, "b"), "Subject 02: b");

        let mut keys: Vec<String> = [10, 2, 1]
            .iter()
            .map(|&i| SubjectResult::subject_key(i, 10, "x"))
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["Subject 01: x", "Subject 02: x", "Subject 10: x"]);
    }

    #[test]
    fn test_stimuli_keep_first_appearance_order() {
        let info = SessionInfo {
            tag: "AB_Forced_Choice".to_string(),
            test_name: "t".to_string(),
            subject_name: "s".to_string(),
            start_time: None,
            stop_time: None,
            test_status: "complete".to_string(),
            trials_per_session: None,
            current_trial: None,
            stimuli_directory: None,
        };
        let result = SubjectResult {
            key: SubjectResult::subject_key(1, 1, "s"),
            info,
            trials: vec![
                Trial::new("b", 20.0, vec![]),
                Trial::new("a", 20.0, vec![]),
                Trial::new("b", 20.0, vec![]),
            ],
        };
        assert_eq!(result.stimuli(), vec!["b", "a"]);
        assert_eq!(result.key, "Subject 1: s");
        assert!(result.info.is_complete());
    }
}
