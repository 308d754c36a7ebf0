use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;

/// Charge types integrated from the high- and low-gain ADC. A channel
/// reports one or the other, never both.
pub const CHARGE_TYPES: [&str; 2] = ["pc_by_h", "pc_by_l"];

/// Position of the `type` field in a row.
const TYPE_FIELD: usize = 1;

/// One row of a `*_mean.txt` charge summary:
///
/// ```text
/// # ch,type,mean,mean_err,rms,root_file
/// 0, pc_by_h, 12.31, 0.04, 3.2, run003.root
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChargeRow {
    pub ch: u32,
    pub kind: String,
    /// Mean charge [pC].
    pub mean: f64,
    pub mean_err: f64,
    pub rms: f64,
    #[serde(default)]
    pub root_file: String,
}

/// Parse a charge summary and keep only the charge rows.
///
/// Rows are filtered on their type before any numeric field is read, so a
/// broken row of another type is never looked at. A charge row that does not
/// deserialize is logged and skipped.
pub fn parse_charge_summary<R: Read>(reader: R) -> Vec<ChargeRow> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (row_no, result) in rdr.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("charge row {row_no}: {e}");
                continue;
            }
        };
        let is_charge = record
            .get(TYPE_FIELD)
            .is_some_and(|kind| CHARGE_TYPES.contains(&kind));
        if !is_charge {
            continue;
        }
        match record.deserialize::<ChargeRow>(None) {
            Ok(row) => rows.push(row),
            Err(e) => warn!("charge row {row_no}: {e}"),
        }
    }
    rows
}

pub fn read_charge_summary(path: &Path) -> Result<Vec<ChargeRow>> {
    let file = std::fs::File::open(path).context("opening charge summary")?;
    Ok(parse_charge_summary(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_charge_rows() {
        let text = "\
# ch,type,mean,mean_err,rms,root_file
0, pc_by_h, 12.31, 0.04, 3.2, run003.root
0, adc_h, 800.0, 1.0, 20.0, run003.root
1, pc_by_l, 140.5, 0.9, 30.1, run003.root
";
        let rows = parse_charge_summary(text.as_bytes());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ch, 0);
        assert_eq!(rows[0].kind, "pc_by_h");
        assert_eq!(rows[0].mean, 12.31);
        assert_eq!(rows[1].kind, "pc_by_l");
        assert_eq!(rows[1].mean_err, 0.9);
        assert_eq!(rows[1].root_file, "run003.root");
    }

    #[test]
    fn root_file_column_is_optional() {
        let rows = parse_charge_summary("2,pc_by_h,1.5,0.1,0.2\n".as_bytes());
        assert_eq!(rows[0].root_file, "");
    }

    #[test]
    fn malformed_charge_row_is_skipped() {
        let text = "\
x,pc_by_h,1.5,0.1,0.2,a.root
3,pc_by_l,2.5,0.1,0.2,a.root
";
        let rows = parse_charge_summary(text.as_bytes());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ch, 3);
    }

    #[test]
    fn broken_rows_of_other_types_do_not_cost_charge_rows() {
        let text = "\
0,pc_by_h,12.3,0.04,3.2,a.root
0,tot,,0.1,1.0,a.root
1,pc_by_l,140.5,0.9,30.1,a.root
";
        let rows = parse_charge_summary(text.as_bytes());
        let kinds: Vec<_> = rows.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, ["pc_by_h", "pc_by_l"]);
        assert_eq!(rows[0].mean, 12.3);
        assert_eq!(rows[1].mean, 140.5);
    }
}
