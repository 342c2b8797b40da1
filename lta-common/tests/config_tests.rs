//! Unit tests for configuration resolution and codec map loading
//!
//! Tests cover:
//! - Compiled defaults
//! - TOML parsing with partial files
//! - Priority order: CLI path → LTA_CONFIG → platform file → defaults
//! - Environment override of the minimum trial duration
//! - JSON and TOML codec maps
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate LTA_CONFIG or LTA_MIN_TRIAL_SECONDS are marked with
//! #[serial] to ensure they run sequentially, not in parallel.

use lta_common::config::{
    load_codec_map, load_config, resolve_config, AnalysisConfig, CONFIG_ENV, MIN_TRIAL_SECONDS_ENV,
};
use lta_common::tabulate::ReferencePolicy;
use lta_common::Error;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

fn clear_env() {
    env::remove_var(CONFIG_ENV);
    env::remove_var(MIN_TRIAL_SECONDS_ENV);
}

#[test]
fn test_defaults() {
    let config = AnalysisConfig::default();
    assert_eq!(config.min_trial_seconds, 15.0);
    assert_eq!(config.min_plays, 1);
    assert_eq!(config.alpha, 0.05);
    assert_eq!(config.reference_policy, ReferencePolicy::KeepZero);
    assert!(!config.recursive);
    assert!(config.codec_map.is_none());
    assert!(config.validate().is_ok());

    let rules = config.validity_rules();
    assert_eq!(rules.min_trial_seconds, 15.0);
    assert_eq!(rules.min_plays, 1);
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "min_trial_seconds = 20.0\nreference_policy = \"omit\"\ncodec_map = \"/data/codecs.json\"\n",
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.min_trial_seconds, 20.0);
    assert_eq!(config.reference_policy, ReferencePolicy::Omit);
    assert_eq!(config.alpha, 0.05);
    assert_eq!(
        config.codec_map.as_deref(),
        Some(std::path::Path::new("/data/codecs.json"))
    );
}

#[test]
fn test_invalid_values_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "alpha = 1.5\n").unwrap();
    assert!(matches!(load_config(&path), Err(Error::Config(_))));

    fs::write(&path, "min_trial_seconds = -1.0\n").unwrap();
    assert!(matches!(load_config(&path), Err(Error::Config(_))));

    fs::write(&path, "min_trial_seconds = \"long\"\n").unwrap();
    assert!(matches!(load_config(&path), Err(Error::Toml(_))));
}

#[test]
#[serial]
fn test_cli_path_takes_priority_over_env() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let cli = dir.path().join("cli.toml");
    let from_env = dir.path().join("env.toml");
    fs::write(&cli, "min_trial_seconds = 30.0\n").unwrap();
    fs::write(&from_env, "min_trial_seconds = 40.0\n").unwrap();
    env::set_var(CONFIG_ENV, &from_env);

    let config = resolve_config(Some(&cli)).unwrap();
    assert_eq!(config.min_trial_seconds, 30.0);

    let config = resolve_config(None).unwrap();
    assert_eq!(config.min_trial_seconds, 40.0);

    clear_env();
}

#[test]
#[serial]
fn test_missing_cli_path_is_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.toml");
    assert!(matches!(resolve_config(Some(&missing)), Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_missing_env_file_uses_defaults() {
    clear_env();
    let dir = TempDir::new().unwrap();
    env::set_var(CONFIG_ENV, dir.path().join("missing.toml"));

    let config = resolve_config(None).unwrap();
    assert_eq!(config, AnalysisConfig::default());

    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_min_trial_seconds() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let cli = dir.path().join("cli.toml");
    fs::write(&cli, "min_trial_seconds = 30.0\n").unwrap();
    env::set_var(MIN_TRIAL_SECONDS_ENV, "8");

    let config = resolve_config(Some(&cli)).unwrap();
    assert_eq!(config.min_trial_seconds, 8.0);

    env::set_var(MIN_TRIAL_SECONDS_ENV, "soon");
    assert!(matches!(resolve_config(Some(&cli)), Err(Error::Config(_))));

    clear_env();
}

#[test]
fn test_codec_map_json_and_toml() {
    let dir = TempDir::new().unwrap();

    let json = dir.path().join("codecs.json");
    fs::write(&json, r#"{"opus_64k": "Opus 64", "reference": "Reference"}"#).unwrap();
    let map = load_codec_map(&json).unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map.remap("opus_64k").unwrap(), "Opus 64");

    let toml = dir.path().join("codecs.toml");
    fs::write(&toml, "aac_96k = \"AAC 96\"\n").unwrap();
    let map = load_codec_map(&toml).unwrap();
    assert_eq!(map.remap("aac_96k").unwrap(), "AAC 96");
    assert!(matches!(
        map.remap("opus_64k"),
        Err(Error::MissingCodecMapping { .. })
    ));
}

#[test]
fn test_codec_map_rejects_malformed_json() {
    let dir = TempDir::new().unwrap();
    let json = dir.path().join("codecs.json");
    fs::write(&json, "{ not json").unwrap();
    assert!(matches!(load_codec_map(&json), Err(Error::Json(_))));
}
