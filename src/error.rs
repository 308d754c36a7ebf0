use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Fatal errors
// ---------------------------------------------------------------------------

/// Errors that abort a whole run.
///
/// Everything that can go wrong with a single input file is handled inside
/// the drivers (logged and skipped or sentinel-filled) and never becomes a
/// `CalibError`.
#[derive(Debug, Error)]
pub enum CalibError {
    #[error("input directory not found: {}", .0.display())]
    InputDirMissing(PathBuf),

    #[error("PD reference file not found: {}", .0.display())]
    ReferenceMissing(PathBuf),

    #[error("PD reference file {} has no '{column}' column", path.display())]
    ReferenceColumn { path: PathBuf, column: &'static str },

    #[error("unsupported PD reference extension: .{0}")]
    ReferenceFormat(String),

    #[error("could not create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read calibration file {}: {source}", path.display())]
    Calibration {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}
