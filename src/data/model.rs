use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};

/// Literal written for any value that could not be measured or computed.
/// Downstream plotting scripts filter on it.
pub const MISSING: &str = "-9999";

// ---------------------------------------------------------------------------
// Cell – a single value in an output table
// ---------------------------------------------------------------------------

/// One output value. Numeric cells keep `None` until they are written.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Float(Option<f64>),
    Integer(Option<i64>),
    Text(String),
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Float(None) | Cell::Integer(None))
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(Some(v))
    }
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        Cell::Float(v)
    }
}

impl From<Option<u8>> for Cell {
    fn from(v: Option<u8>) -> Self {
        Cell::Integer(v.map(i64::from))
    }
}

impl From<u32> for Cell {
    fn from(v: u32) -> Self {
        Cell::Integer(Some(i64::from(v)))
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

/// Floats use `f64`'s shortest round-trip form, so no precision is lost.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Float(Some(v)) => write!(f, "{v}"),
            Cell::Integer(Some(i)) => write!(f, "{i}"),
            Cell::Float(None) | Cell::Integer(None) => f.write_str(MISSING),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Table – ordered columns, one row per processed input
// ---------------------------------------------------------------------------

/// Rows with a fixed column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: &[&'static str]) -> Self {
        Self {
            columns: columns.to_vec(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Cells must follow `columns`.
    pub fn push(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len(), "row width must match the column contract");
        self.rows.push(row);
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Remove every column that is missing in all rows. The remaining
    /// columns keep their relative order.
    pub fn drop_missing_columns(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let keep: Vec<bool> = (0..self.columns.len())
            .map(|c| self.rows.iter().any(|row| !row[c].is_missing()))
            .collect();

        self.columns = retain_by_mask(std::mem::take(&mut self.columns), &keep);
        for row in &mut self.rows {
            *row = retain_by_mask(std::mem::take(row), &keep);
        }
    }

    /// Write header and rows as CSV.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        writer.write_record(&self.columns).context("writing CSV header")?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(|c| c.to_string()))
                .context("writing CSV row")?;
        }
        writer.flush().context("flushing CSV")?;
        Ok(())
    }
}

fn retain_by_mask<T>(items: Vec<T>, keep: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, &k)| k.then_some(item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_are_written_as_sentinel() {
        assert_eq!(Cell::Float(None).to_string(), "-9999");
        assert_eq!(Cell::Integer(None).to_string(), "-9999");
        assert_eq!(Cell::from(0.1 + 0.2).to_string(), "0.30000000000000004");
        assert_eq!(Cell::from(Some(3u8)).to_string(), "3");
        assert_eq!(Cell::from("unknown").to_string(), "unknown");
    }

    #[test]
    fn text_is_never_missing() {
        assert!(!Cell::Text(String::new()).is_missing());
        assert!(Cell::Float(None).is_missing());
    }

    #[test]
    fn drops_columns_missing_everywhere() {
        let mut t = Table::new(&["a", "b", "c"]);
        t.push(vec![1.0.into(), Cell::Float(None), "x".into()]);
        t.push(vec![Cell::Float(None), Cell::Float(None), "y".into()]);
        t.drop_missing_columns();
        assert_eq!(t.columns, vec!["a", "c"]);
        assert_eq!(t.rows[1], vec![Cell::Float(None), Cell::from("y")]);
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let mut t = Table::new(&["#PMT_num", "cos(alpha)"]);
        t.push(vec![1u32.into(), Cell::Float(None)]);
        t.write_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "#PMT_num,cos(alpha)\n1,-9999\n");
    }
}
