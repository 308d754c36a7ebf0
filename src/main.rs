mod args;
mod data;
mod error;
mod physics;
mod pipeline;

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};

use args::{Args, Command};
use data::reference::{load_reference, ReferenceTable};
use error::CalibError;
use physics::Calibration;
use pipeline::{dataset::run_dataset, summary::run_summary, Outcome};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args) {
        Ok(Outcome::Written { path, rows }) => {
            info!("{rows} rows written to {}", path.display());
            ExitCode::SUCCESS
        }
        Ok(Outcome::NothingToDo) => {
            info!("Nothing to do");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<Outcome> {
    let cal = match &args.calibration {
        Some(path) => Calibration::from_json_file(path)?,
        None => Calibration::default(),
    };

    match args.command {
        Command::Aggregate {
            result_dir,
            pd_csv,
            output,
        } => {
            require_dir(&result_dir)?;
            info!("Loading PD Summary Data...");
            let reference = load_pd(&pd_csv)?;
            run_summary(&result_dir, &reference, &cal, output.as_deref())
        }
        Command::Dataset {
            input_dir,
            pd_csv,
            output,
        } => {
            require_dir(&input_dir)?;
            info!("Building modelling data set from {}", input_dir.display());
            let reference = load_pd(&pd_csv)?;
            run_dataset(&input_dir, &reference, &cal, output.as_deref())
        }
    }
}

fn load_pd(path: &Path) -> Result<ReferenceTable> {
    let reference = load_reference(path)?;
    if reference.is_empty() {
        warn!("PD reference {} has no rows; no amplitude can be computed", path.display());
    }
    Ok(reference)
}

/// Checked before the reference is loaded so a typo fails fast.
fn require_dir(dir: &Path) -> Result<(), CalibError> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(CalibError::InputDirMissing(dir.to_path_buf()))
    }
}
