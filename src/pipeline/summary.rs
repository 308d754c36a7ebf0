use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{info, warn};

use super::{file_name, list_inputs, write_table, Outcome};
use crate::data::filename::{decode_fit_filename, ParsedFilename, FIT_RESULTS_SUFFIX};
use crate::data::fit_result::{read_fit_report, FitResultRecord};
use crate::data::model::{Cell, Table};
use crate::data::reference::ReferenceTable;
use crate::physics::{difference, position_error, true_amplitude, Calibration};

/// Default output file, written inside the result directory.
pub const SUMMARY_FILE: &str = "summary_results.csv";

/// Output column order: reconstructed position, its uncertainties, truth,
/// position errors, time, amplitude, then the reconstruction settings.
pub const SUMMARY_COLUMNS: [&str; 25] = [
    "x_res",
    "y_res",
    "z_res",
    "x_sigma",
    "y_sigma",
    "z_sigma",
    "r_sigma",
    "x_true",
    "y_true",
    "z_true",
    "d",
    "x_diff",
    "y_diff",
    "z_diff",
    "t",
    "t_sigma",
    "A_res",
    "A_sigma",
    "A_true",
    "A_diff",
    "attenuation_dB",
    "hits",
    "qdist",
    "q_mu_model",
    "tdist",
];

// ---------------------------------------------------------------------------
// SummaryRow
// ---------------------------------------------------------------------------

/// One fit report joined with its PD reference and the derived errors.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub source: ParsedFilename,
    pub fit: FitResultRecord,
    pub a_true: Option<f64>,
    /// Distance between reconstructed and true source position [cm].
    pub d: Option<f64>,
    /// Reconstructed minus true, per axis.
    pub diff: [Option<f64>; 3],
    pub a_diff: Option<f64>,
}

impl SummaryRow {
    pub fn new(
        source: ParsedFilename,
        fit: FitResultRecord,
        pd_volt: Option<f64>,
        cal: &Calibration,
    ) -> Self {
        let truth = match source.position {
            Some([x, y, z]) => [Some(x), Some(y), Some(z)],
            None => [None; 3],
        };
        let reco = fit.position_means();
        let a_true = true_amplitude(cal, pd_volt, source.attenuation_db);

        Self {
            d: position_error(reco, truth),
            diff: [
                difference(reco[0], truth[0]),
                difference(reco[1], truth[1]),
                difference(reco[2], truth[2]),
            ],
            a_diff: difference(fit.amplitude.mean, a_true),
            a_true,
            source,
            fit,
        }
    }

    /// Values in [`SUMMARY_COLUMNS`] order.
    pub fn cells(&self) -> Vec<Cell> {
        let truth = self.source.position.map_or([None; 3], |p| p.map(Some));
        let tags = &self.source.tags;
        vec![
            self.fit.x.mean.into(),
            self.fit.y.mean.into(),
            self.fit.z.mean.into(),
            self.fit.x.sigma.into(),
            self.fit.y.sigma.into(),
            self.fit.z.sigma.into(),
            self.fit.r_sigma.into(),
            truth[0].into(),
            truth[1].into(),
            truth[2].into(),
            self.d.into(),
            self.diff[0].into(),
            self.diff[1].into(),
            self.diff[2].into(),
            self.fit.t.mean.into(),
            self.fit.t.sigma.into(),
            self.fit.amplitude.mean.into(),
            self.fit.amplitude.sigma.into(),
            self.a_true.into(),
            self.a_diff.into(),
            self.source.attenuation_db.into(),
            tags.hits.into(),
            tags.q_distribution.as_str().into(),
            tags.q_model.to_string().into(),
            tags.t_distribution.as_str().into(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Turn one report into a row. `None` when the filename cannot be decoded.
pub fn process_report(
    path: &Path,
    reference: &ReferenceTable,
    cal: &Calibration,
) -> Option<SummaryRow> {
    let name = file_name(path)?;
    let source = match decode_fit_filename(name) {
        Ok(source) => source,
        Err(e) => {
            warn!("Skipping unknown format: {e}");
            return None;
        }
    };

    let fit = read_fit_report(path);
    let pd_volt = reference.get(&source.base_key);
    if pd_volt.is_none() {
        warn!("No PD reference for '{}'", source.base_key);
    }

    Some(SummaryRow::new(source, fit, pd_volt, cal))
}

/// Build the summary table from every report in `result_dir`.
pub fn build_summary(files: &[PathBuf], reference: &ReferenceTable, cal: &Calibration) -> Table {
    let mut table = Table::new(&SUMMARY_COLUMNS);
    for row in files.iter().filter_map(|f| process_report(f, reference, cal)) {
        table.push(row.cells());
    }
    table.drop_missing_columns();
    table
}

/// Aggregate `*_fit_results.txt` reports into one CSV. Writes to
/// `<result_dir>/summary_results.csv` unless `output` is given.
pub fn run_summary(
    result_dir: &Path,
    reference: &ReferenceTable,
    cal: &Calibration,
    output: Option<&Path>,
) -> Result<Outcome> {
    let files = list_inputs(result_dir, FIT_RESULTS_SUFFIX)?;
    if files.is_empty() {
        info!("No result files found.");
        return Ok(Outcome::NothingToDo);
    }
    info!("Processing {} result files...", files.len());

    let table = build_summary(&files, reference, cal);
    if table.is_empty() {
        warn!("None of the {} result files could be decoded", files.len());
        return Ok(Outcome::NothingToDo);
    }

    let out_path = output.map_or_else(|| result_dir.join(SUMMARY_FILE), Path::to_path_buf);
    let outcome = write_table(&table, &out_path)?;
    info!("Done. Summary saved to: {}", out_path.display());
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    const NAME: &str = "LDhkelec_x0_y0_z162-001-15.00dB_reconst_3hits_bc_func_f_gausT_fit_results.txt";
    const REPORT: &str = "\
[Position X]
  Mean  : 3.0000 +/- 0.1000 cm
  Sigma : 4.0000 +/- 0.1000 cm
[Position Y]
  Mean  : 4.0000 +/- 0.1000 cm
[Position Z]
  Mean  : 162.0000 +/- 0.1000 cm
[Amplitude A]
  Mean  : 1.5000 +/- 0.1000 arb.
";

    fn reference() -> ReferenceTable {
        [("/pd/LDhkelec_x0_y0_z162-001-15.00dB", 5.0)].into_iter().collect()
    }

    fn column<'a>(table: &'a Table, row: usize, name: &str) -> Option<&'a Cell> {
        let idx = table.columns.iter().position(|c| *c == name)?;
        Some(&table.rows[row][idx])
    }

    #[test]
    fn row_joins_reference_and_derives_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(NAME);
        std::fs::write(&path, REPORT).unwrap();

        let row = process_report(&path, &reference(), &Calibration::default()).unwrap();
        assert_relative_eq!(row.a_true.unwrap(), 1.0);
        assert_relative_eq!(row.a_diff.unwrap(), 0.5);
        assert_relative_eq!(row.d.unwrap(), 5.0);
        assert_eq!(row.diff, [Some(3.0), Some(4.0), Some(0.0)]);
    }

    #[test]
    fn missing_reference_leaves_amplitude_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(NAME);
        std::fs::write(&path, REPORT).unwrap();

        let row =
            process_report(&path, &ReferenceTable::default(), &Calibration::default()).unwrap();
        assert_eq!(row.a_true, None);
        assert_eq!(row.a_diff, None);
        assert!(row.d.is_some());
    }

    #[test]
    fn differences_are_absent_when_an_operand_is() {
        let source = decode_fit_filename(NAME).unwrap();
        let mut fit = FitResultRecord::default();
        fit.x.mean = Some(1.0);
        let row = SummaryRow::new(source, fit, Some(5.0), &Calibration::default());
        assert_eq!(row.diff, [Some(1.0), None, None]);
        assert_eq!(row.d, None);
        assert_eq!(row.a_diff, None);
        assert!(row.a_true.is_some());
    }

    #[test]
    fn undecodable_names_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("LDhkelec_x0_y0_z162-001-15.00dB_fit_results.txt");
        std::fs::write(&path, REPORT).unwrap();
        assert!(process_report(&path, &reference(), &Calibration::default()).is_none());
    }

    #[test]
    fn summary_drops_columns_absent_everywhere() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(NAME), REPORT).unwrap();
        std::fs::write(dir.path().join("bad_fit_results.txt"), REPORT).unwrap();

        let outcome = run_summary(dir.path(), &reference(), &Calibration::default(), None).unwrap();
        let out = dir.path().join(SUMMARY_FILE);
        assert_eq!(outcome, Outcome::Written { path: out.clone(), rows: 1 });

        let files = list_inputs(dir.path(), FIT_RESULTS_SUFFIX).unwrap();
        let table = build_summary(&files, &reference(), &Calibration::default());
        assert_eq!(table.len(), 1);
        assert!(column(&table, 0, "t").is_none());
        assert!(column(&table, 0, "r_sigma").is_none());
        assert_eq!(column(&table, 0, "y_sigma"), None);
        assert_eq!(column(&table, 0, "x_sigma"), Some(&Cell::Float(Some(4.0))));
        assert_eq!(column(&table, 0, "q_mu_model"), Some(&Cell::Text("func_f".into())));
        assert_eq!(table.columns.first(), Some(&"x_res"));
        assert_eq!(table.columns.last(), Some(&"tdist"));

        let text = std::fs::read_to_string(out).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.starts_with("x_res,y_res,z_res,x_sigma,x_true"));
    }

    #[test]
    fn partially_missing_column_is_kept_with_sentinel() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(NAME), REPORT).unwrap();
        let other = "LDhkelec_x0_y0_z162-001-15.00dB_reconst_4hits_noQ_noT_fit_results.txt";
        std::fs::write(dir.path().join(other), "[Time]\nMean : 40.0 +/- 0.1 ns\n").unwrap();

        run_summary(dir.path(), &reference(), &Calibration::default(), None).unwrap();
        let text = std::fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        let header: Vec<&str> = lines[0].split(',').collect();
        let t_idx = header.iter().position(|c| *c == "t").unwrap();
        let row_3hits: Vec<&str> = lines[1].split(',').collect();
        let row_4hits: Vec<&str> = lines[2].split(',').collect();
        assert_eq!(row_3hits[t_idx], "-9999");
        assert_eq!(row_4hits[t_idx], "40");
        assert!(lines[2].ends_with(",15,4,noQ,none,noT"));
    }

    #[test]
    fn empty_directory_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let outcome = run_summary(dir.path(), &reference(), &Calibration::default(), None).unwrap();
        assert_eq!(outcome, Outcome::NothingToDo);
        assert!(!dir.path().join(SUMMARY_FILE).exists());
    }

    #[test]
    fn explicit_output_path_is_honoured() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(NAME), REPORT).unwrap();
        let out = dir.path().join("out/summary.csv");
        run_summary(dir.path(), &reference(), &Calibration::default(), Some(&out)).unwrap();
        assert!(out.exists());
        assert!(!dir.path().join(SUMMARY_FILE).exists());
    }
}
