//! Embeds build identification into the lta-analyze binary
//!
//! `main` logs `GIT_HASH`, `BUILD_TIMESTAMP` and `BUILD_PROFILE` at startup so
//! a set of report files can be traced back to the analyzer that wrote them.

use std::process::Command;

/// Short commit hash of the source tree, `unknown` outside a git checkout
fn git_commit() -> String {
    let output = match Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
    {
        Ok(output) if output.status.success() => output,
        _ => return "unknown".to_string(),
    };
    String::from_utf8(output.stdout)
        .map(|hash| hash.trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

fn main() {
    emit("GIT_HASH", &git_commit());
    emit(
        "BUILD_TIMESTAMP",
        &chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
    );
    emit(
        "BUILD_PROFILE",
        &std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string()),
    );
}
