//! Result file discovery

use anyhow::{bail, Result};
use lta_common::parse::is_temp_file;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

fn is_xml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("xml"))
        .unwrap_or(false)
}

/// Result files under `dir`, sorted by path
///
/// In-progress saves (`temp*.xml`) are analysed like any other result file,
/// but a warning is logged: such a file may hold an interrupted session.
pub fn find_result_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("input directory is invalid: {}", dir.display());
    }
    debug!("Searching for results in {}", dir.display());

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    let mut temp_files = 0;

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
    {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_xml(path) {
            continue;
        }
        if is_temp_file(path) {
            temp_files += 1;
            debug!("Including temp file {}", path.display());
        }
        files.push(path.to_path_buf());
    }

    if temp_files > 0 {
        warn!(
            temp_files,
            "Temp files exist: the analysis results may be incomplete/incorrect"
        );
    }

    files.sort();
    Ok(files)
}
