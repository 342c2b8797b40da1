//! Result file reader
//!
//! Reads the XML documents written by the listening test application. The
//! root element's name is the test type tag (`MUSHRA`, `BS-1116`, ...); the
//! document holds an `info` header, an optional survey section (ignored) and
//! a `trials` list:
//!
//! ```xml
//! <BS-1116>
//!   <info startTime="..." stopTime="..." subjectName="..." testName="..."
//!         stimuliDirectory="..." trialsPerSession="all" testStatus="complete"/>
//!   <trials>
//!     <trial trialName="castanets" trialSeconds="42" referencePlays="3">
//!       <testFile fileName="castanets_reference.wav" plays="2" score="5.0"/>
//!       <testFile fileName="castanets_codecA.wav" plays="3" score="4.1"/>
//!     </trial>
//!   </trials>
//! </BS-1116>
//! ```

use crate::model::{SessionInfo, SubjectResult, TestFile, Trial};
use crate::{Error, Result};
use chrono::{DateTime, FixedOffset};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// File name prefix of in-progress saves
pub const TEMP_FILE_PREFIX: &str = "temp";

#[derive(Debug, Deserialize)]
struct RawResults {
    info: RawInfo,
    #[serde(default)]
    trials: RawTrials,
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    #[serde(rename = "@startTime", default)]
    start_time: Option<String>,
    #[serde(rename = "@stopTime", default)]
    stop_time: Option<String>,
    #[serde(rename = "@subjectName", default)]
    subject_name: String,
    #[serde(rename = "@testName", default)]
    test_name: String,
    #[serde(rename = "@stimuliDirectory", default)]
    stimuli_directory: Option<String>,
    #[serde(rename = "@trialsPerSession", default)]
    trials_per_session: Option<String>,
    #[serde(rename = "@testStatus", default)]
    test_status: String,
    #[serde(rename = "@currentTrial", default)]
    current_trial: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTrials {
    #[serde(rename = "trial", default)]
    trials: Vec<RawTrial>,
}

#[derive(Debug, Deserialize)]
struct RawTrial {
    #[serde(rename = "@trialName")]
    trial_name: String,
    #[serde(rename = "@trialSeconds")]
    trial_seconds: f64,
    #[serde(rename = "@referencePlays", default)]
    reference_plays: u32,
    #[serde(rename = "testFile", default)]
    test_files: Vec<RawTestFile>,
    #[serde(rename = "videoFile", default)]
    video_file: Option<RawVideoFile>,
}

#[derive(Debug, Deserialize)]
struct RawTestFile {
    #[serde(rename = "@fileName")]
    file_name: String,
    #[serde(rename = "@plays")]
    plays: u32,
    #[serde(rename = "@score")]
    score: f64,
    #[serde(rename = "@comment", default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVideoFile {
    #[serde(rename = "@fileName")]
    file_name: String,
}

/// Name of the document's root element
fn root_tag(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => {
                return Err(Error::InvalidInput(
                    "result document has no root element".to_string(),
                ));
            }
            Ok(_) => continue,
            Err(e) => {
                return Err(Error::InvalidInput(format!("malformed result document: {}", e)));
            }
        }
    }
}

fn parse_timestamp(field: &str, value: Option<&str>) -> Option<DateTime<FixedOffset>> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => Some(ts),
        Err(e) => {
            warn!(field, value, error = %e, "Ignoring unparseable session timestamp");
            None
        }
    }
}

fn parse_trials_per_session(value: Option<&str>) -> Option<u32> {
    match value.map(str::trim) {
        None | Some("") => None,
        Some(v) if v.eq_ignore_ascii_case("all") => None,
        Some(v) => v.parse().ok(),
    }
}

/// Parse one result document into a subject record
///
/// `subject_key` identifies the subject in every derived table. Labels are
/// left unset; run the annotator next.
pub fn parse_results(xml: &str, subject_key: impl Into<String>) -> Result<SubjectResult> {
    let tag = root_tag(xml)?;
    let raw: RawResults = quick_xml::de::from_str(xml)?;

    let info = SessionInfo {
        tag,
        test_name: raw.info.test_name,
        subject_name: raw.info.subject_name,
        start_time: parse_timestamp("startTime", raw.info.start_time.as_deref()),
        stop_time: parse_timestamp("stopTime", raw.info.stop_time.as_deref()),
        test_status: raw.info.test_status,
        trials_per_session: parse_trials_per_session(raw.info.trials_per_session.as_deref()),
        current_trial: raw.info.current_trial,
        stimuli_directory: raw.info.stimuli_directory.filter(|d| !d.is_empty()),
    };

    let trials = raw
        .trials
        .trials
        .into_iter()
        .map(|t| Trial {
            name: t.trial_name,
            duration_secs: t.trial_seconds,
            reference_plays: t.reference_plays,
            files: t
                .test_files
                .into_iter()
                .map(|f| TestFile {
                    file_name: f.file_name,
                    plays: f.plays,
                    score: f.score,
                    comment: f.comment.filter(|c| !c.is_empty()),
                    label: None,
                })
                .collect(),
            video_file: t.video_file.map(|v| v.file_name),
        })
        .collect::<Vec<_>>();

    let result = SubjectResult {
        key: subject_key.into(),
        info,
        trials,
    };

    debug!(
        subject = %result.key,
        tag = %result.info.tag,
        trials = result.trials.len(),
        "Parsed result document"
    );

    Ok(result)
}

/// Read and parse one result file
///
/// `index` is the 1-based position of the file among the `total` analysed
/// files and becomes part of the subject key.
pub fn read_results_file(path: &Path, index: usize, total: usize) -> Result<SubjectResult> {
    let xml = std::fs::read_to_string(path)?;
    let mut result = parse_results(&xml, String::new())?;
    result.key = SubjectResult::subject_key(index, total, &result.info.subject_name);
    Ok(result)
}

/// Whether a path names an in-progress save of the test application
pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(TEMP_FILE_PREFIX))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TestType;

    const BS1116_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<BS-1116>
  <info startTime="2020-03-02T10:15:00.000-08:00" stopTime="2020-03-02T10:45:30.000-08:00"
        subjectName="jdoe" testName="codec_eval" stimuliDirectory="/stimuli"
        trialsPerSession="all" testStatus="complete"/>
  <survey age="30"/>
  <trials>
    <trial trialName="castanets" trialSeconds="42" referencePlays="3">
      <testFile fileName="castanets_reference.wav" plays="2" score="5.0"/>
      <testFile fileName="castanets_codecA.wav" plays="3" score="4.1" comment="slight smearing"/>
    </trial>
    <trial trialName="speech" trialSeconds="9" referencePlays="1">
      <testFile fileName="speech_codecA.wav" plays="0" score="3"/>
      <testFile fileName="speech_reference.wav" plays="1" score="5"/>
    </trial>
  </trials>
</BS-1116>"#;

    #[test]
    fn test_parse_header_and_trials() {
        let result = parse_results(BS1116_DOC, "Subject 1: jdoe").unwrap();

        assert_eq!(result.info.tag, "BS-1116");
        assert_eq!(result.test_type().unwrap(), TestType::Bs1116);
        assert_eq!(result.info.subject_name, "jdoe");
        assert_eq!(result.info.test_name, "codec_eval");
        assert!(result.info.is_complete());
        assert_eq!(result.info.trials_per_session, None);
        assert_eq!(
            result.info.session_duration(),
            Some(chrono::Duration::seconds(30 * 60 + 30))
        );

        assert_eq!(result.trials.len(), 2);
        let first = &result.trials[0];
        assert_eq!(first.name, "castanets");
        assert_eq!(first.duration_secs, 42.0);
        assert_eq!(first.reference_plays, 3);
        assert_eq!(first.files[1].file_name, "castanets_codecA.wav");
        assert_eq!(first.files[1].score, 4.1);
        assert_eq!(first.files[1].comment.as_deref(), Some("slight smearing"));
        assert!(first.files.iter().all(|f| f.label.is_none()));

        assert_eq!(result.trials[1].files[0].plays, 0);
    }

    #[test]
    fn test_parse_incomplete_session() {
        let doc = r#"<MUSHRA>
  <info subjectName="a" testName="t" trialsPerSession="4" testStatus="incomplete" currentTrial="2"
        startTime="not a time"/>
  <trials/>
</MUSHRA>"#;
        let result = parse_results(doc, "k").unwrap();
        assert!(!result.info.is_complete());
        assert_eq!(result.info.trials_per_session, Some(4));
        assert_eq!(result.info.current_trial, Some(2));
        assert_eq!(result.info.start_time, None);
        assert!(result.trials.is_empty());
    }

    #[test]
    fn test_parse_video_file() {
        let doc = r#"<AudioVideo_AB_Forced_Choice>
  <info subjectName="a" testName="av" testStatus="complete"/>
  <trials>
    <trial trialName="clip" trialSeconds="20">
      <testFile fileName="clip_I.wav" plays="1" score="1.0"/>
      <testFile fileName="clip_II.wav" plays="1" score="0.0"/>
      <videoFile fileName="clip.mp4"/>
    </trial>
  </trials>
</AudioVideo_AB_Forced_Choice>"#;
        let result = parse_results(doc, "k").unwrap();
        assert_eq!(result.trials[0].video_file.as_deref(), Some("clip.mp4"));
        assert_eq!(result.trials[0].reference_plays, 0);
    }

    #[test]
    fn test_parse_rejects_missing_score() {
        let doc = r#"<MUSHRA>
  <info subjectName="a" testName="t" testStatus="complete"/>
  <trials><trial trialName="x" trialSeconds="20"><testFile fileName="x_a.wav" plays="1"/></trial></trials>
</MUSHRA>"#;
        assert!(matches!(parse_results(doc, "k"), Err(Error::Xml(_))));
    }

    #[test]
    fn test_parse_rejects_empty_document() {
        assert!(matches!(parse_results("", "k"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_read_results_file_builds_subject_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("results_jdoe.xml");
        std::fs::write(&path, BS1116_DOC).unwrap();

        let result = read_results_file(&path, 3, 4).unwrap();
        assert_eq!(result.key, "Subject 3: jdoe");
        let result = read_results_file(&path, 3, 40).unwrap();
        assert_eq!(result.key, "Subject 03: jdoe");
    }

    #[test]
    fn test_temp_file_detection() {
        assert!(is_temp_file(Path::new("/data/temp_results.xml")));
        assert!(!is_temp_file(Path::new("/data/results_temp.xml")));
    }
}
