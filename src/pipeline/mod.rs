//! Batch drivers: enumerate input files, turn each into rows, write one table.
//!
//! Each file is processed independently against the read-only reference
//! table; a bad file is logged and skipped, never fatal.

pub mod dataset;
pub mod summary;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;

use crate::data::model::Table;
use crate::error::CalibError;

/// What a driver run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Written { path: PathBuf, rows: usize },
    /// No eligible input, or nothing survived processing. No file written.
    NothingToDo,
}

/// Files directly inside `dir` whose name ends with `suffix`, sorted by name.
pub fn list_inputs(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CalibError::InputDirMissing(dir.to_path_buf()).into());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry.context("reading directory entry")?.path();
        let Some(name) = file_name(&path) else {
            warn!("Skipping {}: file name is not valid UTF-8", path.display());
            continue;
        };
        if name.ends_with(suffix) && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Create the parent directory of `path` and write `table` there.
pub(crate) fn write_table(table: &Table, path: &Path) -> Result<Outcome> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| CalibError::OutputDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    table.write_csv(path)?;
    Ok(Outcome::Written {
        path: path.to_path_buf(),
        rows: table.len(),
    })
}

/// File name as UTF-8, for decoding.
pub(crate) fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}
