use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use log::{info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use crate::error::CalibError;

/// Column holding the run directory path.
pub const RUN_ID_COLUMN: &str = "RunId";
/// Column holding the mean PD monitor voltage of the run.
pub const PD_VOLT_COLUMN: &str = "PDvolt_mean";

// ---------------------------------------------------------------------------
// ReferenceTable
// ---------------------------------------------------------------------------

/// Run key → mean PD voltage [V].
///
/// The key is the last path component of `RunId`, e.g.
/// `/data/LDhkelec_x-0_y-35_z127-001-15.00dB` → `LDhkelec_x-0_y-35_z127-001-15.00dB`
/// (the directory part is dropped).
/// When two rows share a key the later row wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceTable {
    volts: BTreeMap<String, f64>,
}

impl ReferenceTable {
    /// Insert a row; returns the value it replaced, if any.
    pub fn insert(&mut self, run_id: &str, pd_volt: f64) -> Option<f64> {
        let key = run_key(run_id);
        let previous = self.volts.insert(key.to_string(), pd_volt);
        if previous.is_some() {
            warn!("Duplicate PD entry for '{key}', keeping the last one");
        }
        previous
    }

    /// PD voltage for a run key. A stored NaN is reported as present; the
    /// amplitude calculation treats it as missing.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.volts.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.volts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volts.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, f64)> for ReferenceTable {
    fn from_iter<I: IntoIterator<Item = (&'a str, f64)>>(iter: I) -> Self {
        let mut table = Self::default();
        for (run_id, volt) in iter {
            table.insert(run_id, volt);
        }
        table
    }
}

/// Final `/`-separated component of a run path.
pub fn run_key(run_id: &str) -> &str {
    run_id.rsplit('/').next().unwrap_or(run_id)
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load the PD summary.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row containing `RunId` and `PDvolt_mean`
/// * `.json`    – `[{ "RunId": "...", "PDvolt_mean": 4.98, ... }, ...]`
/// * `.parquet` – `RunId` string column, numeric `PDvolt_mean` column
///
/// Every failure here is fatal for the run.
pub fn load_reference(path: &Path) -> Result<ReferenceTable> {
    if !path.exists() {
        return Err(CalibError::ReferenceMissing(path.to_path_buf()).into());
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => Err(CalibError::ReferenceFormat(other.to_string()).into()),
    }?;

    info!("Loaded {} PD reference entries from {}", table.len(), path.display());
    Ok(table)
}

fn missing_column(path: &Path, column: &'static str) -> CalibError {
    CalibError::ReferenceColumn {
        path: path.to_path_buf(),
        column,
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<ReferenceTable> {
    // Short rows are accepted; their missing cells read as empty.
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context("opening PD CSV")?;
    let headers = reader.headers().context("reading PD CSV headers")?.clone();

    let run_idx = headers
        .iter()
        .position(|h| h.trim() == RUN_ID_COLUMN)
        .ok_or_else(|| missing_column(path, RUN_ID_COLUMN))?;
    let volt_idx = headers
        .iter()
        .position(|h| h.trim() == PD_VOLT_COLUMN)
        .ok_or_else(|| missing_column(path, PD_VOLT_COLUMN))?;

    let mut table = ReferenceTable::default();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("PD CSV row {row_no}"))?;
        let run_id = record.get(run_idx).unwrap_or("").trim();
        let volt = parse_volt(record.get(volt_idx).unwrap_or(""), row_no);
        table.insert(run_id, volt);
    }
    Ok(table)
}

/// Empty or non-numeric voltages become NaN.
fn parse_volt(s: &str, row: usize) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return f64::NAN;
    }
    s.parse().unwrap_or_else(|_| {
        warn!("PD row {row}: '{s}' is not a number");
        f64::NAN
    })
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

fn load_json(path: &Path) -> Result<ReferenceTable> {
    let text = std::fs::read_to_string(path).context("reading PD JSON")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing PD JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut table = ReferenceTable::default();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let run_id = obj
            .get(RUN_ID_COLUMN)
            .ok_or_else(|| missing_column(path, RUN_ID_COLUMN))?
            .as_str()
            .with_context(|| format!("Row {i}: '{RUN_ID_COLUMN}' is not a string"))?;
        let volt = match obj.get(PD_VOLT_COLUMN) {
            Some(JsonValue::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
            Some(JsonValue::String(s)) => parse_volt(s, i),
            Some(_) => f64::NAN,
            None => return Err(missing_column(path, PD_VOLT_COLUMN).into()),
        };
        table.insert(run_id, volt);
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`). Any numeric `PDvolt_mean` type is cast
/// to `f64`; nulls become NaN.
fn load_parquet(path: &Path) -> Result<ReferenceTable> {
    let file = std::fs::File::open(path).context("opening PD parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut table = ReferenceTable::default();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let run_idx = schema
            .index_of(RUN_ID_COLUMN)
            .map_err(|_| missing_column(path, RUN_ID_COLUMN))?;
        let volt_idx = schema
            .index_of(PD_VOLT_COLUMN)
            .map_err(|_| missing_column(path, PD_VOLT_COLUMN))?;

        let run_ids =
            cast(batch.column(run_idx), &DataType::Utf8).context("casting RunId to string")?;
        let volts = cast(batch.column(volt_idx), &DataType::Float64)
            .context("casting PDvolt_mean to f64")?;
        let run_ids = run_ids.as_string::<i32>();
        let volts = volts.as_primitive::<Float64Type>();

        for row in 0..batch.num_rows() {
            if run_ids.is_null(row) {
                continue;
            }
            let volt = if volts.is_null(row) {
                f64::NAN
            } else {
                volts.value(row)
            };
            table.insert(run_ids.value(row), volt);
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use arrow::array::{Float32Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
        path
    }

    #[test]
    fn run_key_is_last_path_component() {
        assert_eq!(
            run_key("/home/run/LD_x0_y0_z1-001-15.00dB"),
            "LD_x0_y0_z1-001-15.00dB"
        );
        assert_eq!(run_key("LD_plain"), "LD_plain");
    }

    #[test]
    fn loads_csv_by_basename() {
        let dir = TempDir::new().unwrap();
        let text = "\
RunId,PDvolt_mean,PDvolt_std
/data/a/LD_x0_y0_z1-001-15.00dB,4.9,0.1
/data/b/LD_x1_y0_z1-002-12.00dB,,0.1
";
        let path = write(&dir, "pd.csv", text);
        let table = load_reference(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("LD_x0_y0_z1-001-15.00dB"), Some(4.9));
        assert!(table.get("LD_x1_y0_z1-002-12.00dB").unwrap().is_nan());
        assert_eq!(table.get("LD_unknown"), None);
    }

    #[test]
    fn short_csv_rows_are_padded_not_fatal() {
        let dir = TempDir::new().unwrap();
        let text = "RunId,PDvolt_mean,PDvolt_std\n/a/run1,4.9,0.1\n/a/run2,5.0\n/a/run3\n";
        let path = write(&dir, "pd.csv", text);
        let table = load_reference(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("run1"), Some(4.9));
        assert_eq!(table.get("run2"), Some(5.0));
        assert!(table.get("run3").unwrap().is_nan());
    }

    #[test]
    fn duplicate_keys_keep_last_value() {
        let table: ReferenceTable = [("/a/run1", 1.0), ("/b/run1", 2.0)].into_iter().collect();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("run1"), Some(2.0));
    }

    #[test]
    fn missing_column_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "pd.csv", "RunId,PDvolt\n/a/run1,4.0\n");
        let err = load_reference(&path).unwrap_err();
        let calib = err.downcast_ref::<CalibError>().unwrap();
        assert!(matches!(calib, CalibError::ReferenceColumn { column: PD_VOLT_COLUMN, .. }));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = load_reference(Path::new("/no/such/pd.csv")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CalibError>(),
            Some(CalibError::ReferenceMissing(_))
        ));
    }

    #[test]
    fn unsupported_extension_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "pd.txt", "RunId,PDvolt_mean\n");
        let err = load_reference(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CalibError>(),
            Some(CalibError::ReferenceFormat(_))
        ));
    }

    #[test]
    fn loads_json_records() {
        let dir = TempDir::new().unwrap();
        let text = r#"[
            {"RunId": "/x/run1", "PDvolt_mean": 5.0},
            {"RunId": "/x/run2", "PDvolt_mean": null}
        ]"#;
        let path = write(&dir, "pd.json", text);
        let table = load_reference(&path).unwrap();
        assert_eq!(table.get("run1"), Some(5.0));
        assert!(table.get("run2").unwrap().is_nan());
    }

    #[test]
    fn loads_parquet_with_f32_volts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pd.parquet");
        let schema = Arc::new(Schema::new(vec![
            Field::new(RUN_ID_COLUMN, DataType::Utf8, false),
            Field::new(PD_VOLT_COLUMN, DataType::Float32, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["/p/run1", "/p/run2"])),
                Arc::new(Float32Array::from(vec![Some(2.5), None])),
            ],
        )
        .unwrap();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_reference(&path).unwrap();
        assert_eq!(table.get("run1"), Some(2.5));
        assert!(table.get("run2").unwrap().is_nan());
    }
}
