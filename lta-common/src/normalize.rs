//! Codec/system label extraction from stimulus file names
//!
//! Stimulus files are expected to follow `<trial_name>_<codec>.wav`. Real test
//! sets drift from that convention, so extraction falls back in order:
//!
//! 1. Trial name is a prefix of the file stem: label is the rest after one
//!    separator.
//! 2. Drop a leading artifact segment (`LP_`, `HP_`, ...) from the trial name,
//!    treat `-` and `_` as equivalent, and retry the prefix match.
//! 3. Longest common substring: if the stem starts with a substring of at
//!    least [`MIN_COMMON_SUBSTRING`] characters shared with the trial name,
//!    the label is what follows it.
//! 4. Otherwise, or when steps 2-3 leave nothing, the whole stem is the
//!    label.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Shortest shared substring the fallback treats as a stimulus prefix
pub const MIN_COMMON_SUBSTRING: usize = 3;

const SEPARATORS: [char; 2] = ['_', '-'];

fn normalize_separators(s: &str) -> String {
    s.replace('-', "_")
}

/// File name without its final extension
pub fn file_stem(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// Drop exactly one leading separator character, whatever it is
fn skip_separator(rest: &str) -> &str {
    let mut chars = rest.chars();
    chars.next();
    chars.as_str()
}

/// Longest common substring of `a` and `b`
///
/// `-` and `_` compare equal and the result uses `_`. Comparison is
/// case-sensitive. Runs in O(|a|·|b|) time with a rolling row. When several
/// substrings share the maximal length, the one ending earliest in `a` wins.
pub fn longest_common_substring(a: &str, b: &str) -> String {
    let a: Vec<char> = normalize_separators(a).chars().collect();
    let b: Vec<char> = normalize_separators(b).chars().collect();

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    let mut best_len = 0;
    let mut best_end = 0;

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            if a[i - 1] == b[j - 1] {
                curr[j] = prev[j - 1] + 1;
                if curr[j] > best_len {
                    best_len = curr[j];
                    best_end = i;
                }
            } else {
                curr[j] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    a[best_end - best_len..best_end].iter().collect()
}

/// Derive the codec/system label of `file_name` presented in trial `trial_name`
///
/// # Errors
/// [`Error::LabelExtraction`] when every strategy yields an empty label, e.g.
/// a file named exactly after its trial.
pub fn codec_name(file_name: &str, trial_name: &str) -> Result<String> {
    let stem = file_stem(file_name);

    let label = if !trial_name.is_empty() && stem.starts_with(trial_name) {
        skip_separator(&stem[trial_name.len()..])
    } else {
        debug!(
            file = file_name,
            trial = trial_name,
            "File name prefix is inconsistent with trial name"
        );
        fallback_label(stem, trial_name)
    };

    if label.is_empty() {
        return Err(Error::LabelExtraction {
            file: file_name.to_string(),
            trial: trial_name.to_string(),
        });
    }
    Ok(label.to_string())
}

fn fallback_label<'a>(stem: &'a str, trial_name: &str) -> &'a str {
    let without_artifact = trial_name
        .split_once('_')
        .map(|(_, rest)| rest)
        .unwrap_or(trial_name);
    let normalized_stem = normalize_separators(stem);
    let normalized_trial = normalize_separators(without_artifact);

    // '-' and '_' are both one byte, so offsets carry over to `stem`
    if !normalized_trial.is_empty() && normalized_stem.starts_with(&normalized_trial) {
        let rest = skip_separator(&stem[normalized_trial.len()..]);
        if !rest.is_empty() {
            return rest;
        }
    }

    // A stem made entirely of the shared part (`castanets.wav` in trial
    // `castanets_48k`) is its own label
    let common = longest_common_substring(stem, trial_name);
    if common.chars().count() >= MIN_COMMON_SUBSTRING && normalized_stem.starts_with(&common) {
        let rest = stem[common.len()..].trim_start_matches(SEPARATORS);
        if !rest.is_empty() {
            return rest;
        }
    }

    stem
}

/// User-supplied mapping from extracted names to canonical codec labels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodecMap(BTreeMap<String, String>);

impl CodecMap {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self(entries)
    }

    /// Canonical label for an extracted name
    ///
    /// # Errors
    /// [`Error::MissingCodecMapping`] if the name has no entry.
    pub fn remap(&self, label: &str) -> Result<String> {
        self.0
            .get(label)
            .cloned()
            .ok_or_else(|| Error::MissingCodecMapping {
                label: label.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for CodecMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_convention() {
        assert_eq!(codec_name("trialA_codecX.wav", "trialA").unwrap(), "codecX");
        assert_eq!(codec_name("castanets_opus_64k.wav", "castanets").unwrap(), "opus_64k");
    }

    #[test]
    fn test_prefix_with_other_separator() {
        assert_eq!(codec_name("trialA-codecX.wav", "trialA").unwrap(), "codecX");
    }

    #[test]
    fn test_unrelated_names_use_stem() {
        assert_eq!(codec_name("foo.wav", "bar").unwrap(), "foo");
        assert_eq!(codec_name("reference.wav", "castanets").unwrap(), "reference");
    }

    #[test]
    fn test_artifact_prefix_and_separator_normalization() {
        assert_eq!(codec_name("song-1_aac.wav", "LP_song_1").unwrap(), "aac");
        assert_eq!(codec_name("song_1_aac.wav", "HP_song-1").unwrap(), "aac");
    }

    #[test]
    fn test_common_substring_fallback() {
        assert_eq!(
            codec_name("song_1_codecA.wav", "LP_song-1_excerpt").unwrap(),
            "codecA"
        );
    }

    #[test]
    fn test_stem_consumed_by_common_substring_is_kept_whole() {
        assert_eq!(codec_name("castanets.wav", "castanets_48k").unwrap(), "castanets");
        assert_eq!(codec_name("song.wav", "songs").unwrap(), "song");
        assert_eq!(codec_name("reference.wav", "reference_test").unwrap(), "reference");
        assert_eq!(codec_name("song_1.wav", "LP_song-1").unwrap(), "song_1");
    }

    #[test]
    fn test_short_common_substring_is_ignored() {
        // "o" is shared but too short to be a stimulus prefix
        assert_eq!(codec_name("codecA.wav", "song1").unwrap(), "codecA");
    }

    #[test]
    fn test_empty_label_is_error() {
        let err = codec_name("trialA.wav", "trialA").unwrap_err();
        assert!(matches!(
            err,
            Error::LabelExtraction { ref file, ref trial } if file == "trialA.wav" && trial == "trialA"
        ));
        assert!(codec_name("trialA_.wav", "trialA").is_err());
    }

    #[test]
    fn test_file_without_extension() {
        assert_eq!(codec_name("trialA_codecX", "trialA").unwrap(), "codecX");
        assert_eq!(file_stem(".wav"), ".wav");
    }

    #[test]
    fn test_lcs_basic() {
        assert_eq!(longest_common_substring("xabcdy", "zabcdw"), "abcd");
        assert_eq!(longest_common_substring("abc", "xyz"), "");
        assert_eq!(longest_common_substring("", "abc"), "");
    }

    #[test]
    fn test_lcs_is_case_sensitive() {
        assert_eq!(longest_common_substring("ABC", "abc"), "");
    }

    #[test]
    fn test_lcs_treats_separators_as_equal() {
        assert_eq!(longest_common_substring("a-b-c", "a_b_c"), "a_b_c");
    }

    #[test]
    fn test_lcs_tie_takes_earliest_end() {
        // "ab" and "cd" both have length 2; "ab" ends first in `a`
        assert_eq!(longest_common_substring("abxcd", "cdyab"), "ab");
    }

    #[test]
    fn test_codec_map_remap() {
        let map: CodecMap = [("opus_64k".to_string(), "Opus 64".to_string())]
            .into_iter()
            .collect();
        assert_eq!(map.remap("opus_64k").unwrap(), "Opus 64");
        assert!(matches!(
            map.remap("aac"),
            Err(Error::MissingCodecMapping { label }) if label == "aac"
        ));
    }
}
