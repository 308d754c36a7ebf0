use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{debug, info, warn};

use super::{file_name, list_inputs, write_table, Outcome};
use crate::data::charge::{read_charge_summary, ChargeRow};
use crate::data::filename::{decode_mean_filename, ParsedMeanFilename};
use crate::data::model::{Cell, Table};
use crate::data::reference::ReferenceTable;
use crate::physics::{geometry, true_amplitude, Calibration, Geometry};

/// Default output file, written inside the input directory.
pub const DATASET_FILE: &str = "dataset_for_modeling.csv";

/// Charge summaries are globbed as `*mean.txt`.
const INPUT_SUFFIX: &str = "mean.txt";

pub const DATASET_COLUMNS: [&str; 11] = [
    "#PMT_num",
    "Charge(pC)",
    "Charge_err(pC)",
    "light_power",
    "x",
    "y",
    "z",
    "r",
    "cos(alpha)",
    "r_from_center",
    "cos(alpha_from_center)",
];

/// One PMT's charge for one source position, with the light power the
/// source emitted and the source/PMT geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    /// 1-based PMT number (readout channel + 1).
    pub pmt_num: u32,
    pub charge: f64,
    pub charge_err: f64,
    pub light_power: Option<f64>,
    pub source: [f64; 3],
    /// Relative to the photocathode surface centre.
    pub surface: Geometry,
    /// Relative to the hemisphere centre.
    pub hemisphere: Geometry,
}

impl DatasetRow {
    /// `None` when the channel has no entry in the PMT layout, or no
    /// 1-based number.
    pub fn new(
        run: &ParsedMeanFilename,
        charge: &ChargeRow,
        light_power: Option<f64>,
        cal: &Calibration,
    ) -> Option<Self> {
        let surface = cal.pmt_surface(charge.ch)?;
        let hemisphere = cal.pmt_hemisphere(charge.ch)?;
        Some(Self {
            pmt_num: charge.ch.checked_add(1)?,
            charge: charge.mean,
            charge_err: charge.mean_err,
            light_power,
            source: run.position,
            surface: geometry(run.position, surface, cal.pmt_normal),
            hemisphere: geometry(run.position, hemisphere, cal.pmt_normal),
        })
    }

    pub fn cells(&self) -> Vec<Cell> {
        let [x, y, z] = self.source;
        vec![
            self.pmt_num.into(),
            self.charge.into(),
            self.charge_err.into(),
            self.light_power.into(),
            x.into(),
            y.into(),
            z.into(),
            self.surface.distance.into(),
            self.surface.cos_alpha.into(),
            self.hemisphere.distance.into(),
            self.hemisphere.cos_alpha.into(),
        ]
    }
}

/// Rows for one charge summary. Files without a decodable name or without a
/// PD reference contribute nothing.
pub fn process_charge_file(
    path: &Path,
    reference: &ReferenceTable,
    cal: &Calibration,
) -> Vec<DatasetRow> {
    let Some(name) = file_name(path) else {
        return Vec::new();
    };
    let run = match decode_mean_filename(name) {
        Ok(run) => run,
        Err(e) => {
            debug!("Skipping {e}");
            return Vec::new();
        }
    };
    let Some(pd_volt) = reference.get(&run.base_key) else {
        debug!("No PD reference for '{}'", run.base_key);
        return Vec::new();
    };
    let light_power = true_amplitude(cal, Some(pd_volt), Some(run.attenuation_db));

    let charges = match read_charge_summary(path) {
        Ok(charges) => charges,
        Err(e) => {
            warn!("Error while processing {name}: {e:#}");
            return Vec::new();
        }
    };

    debug!(
        "Run {} at {:?}: {} charge rows",
        run.run,
        run.position,
        charges.len()
    );
    charges
        .iter()
        .filter_map(|charge| DatasetRow::new(&run, charge, light_power, cal))
        .collect()
}

/// Join `*mean.txt` charge summaries with the PD reference into the
/// modelling data set. Writes `<input_dir>/dataset_for_modeling.csv` unless
/// `output` is given.
pub fn run_dataset(
    input_dir: &Path,
    reference: &ReferenceTable,
    cal: &Calibration,
    output: Option<&Path>,
) -> Result<Outcome> {
    let files = list_inputs(input_dir, INPUT_SUFFIX)?;
    if files.is_empty() {
        warn!("No '*{INPUT_SUFFIX}' files in {}", input_dir.display());
        return Ok(Outcome::NothingToDo);
    }
    info!("Found {} charge summaries", files.len());

    let table = build_dataset(&files, reference, cal);
    if table.is_empty() {
        warn!("No rows to write; check the input directory and PD reference");
        return Ok(Outcome::NothingToDo);
    }

    let out_path: PathBuf =
        output.map_or_else(|| input_dir.join(DATASET_FILE), Path::to_path_buf);
    let outcome = write_table(&table, &out_path)?;
    info!("Wrote {} rows to {}", table.len(), out_path.display());
    Ok(outcome)
}

pub fn build_dataset(
    files: &[PathBuf],
    reference: &ReferenceTable,
    cal: &Calibration,
) -> Table {
    let mut table = Table::new(&DATASET_COLUMNS);
    for (i, path) in files.iter().enumerate() {
        if (i + 1) % 100 == 0 {
            info!("  processing... {}/{}", i + 1, files.len());
        }
        for row in process_charge_file(path, reference, cal) {
            table.push(row.cells());
        }
    }
    table
}
