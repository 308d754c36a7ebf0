use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::physics::Vec3;

/// Suffix of the per-configuration fit reports.
pub const FIT_RESULTS_SUFFIX: &str = "_fit_results.txt";
/// Suffix of the per-run charge summaries.
pub const MEAN_SUFFIX: &str = "_mean.txt";
/// Splits a report name into run key and reconstruction options.
pub const RECONST_SEPARATOR: &str = "_reconst_";

const NUMBER: &str = r"[+-]?\d+\.?\d*";

static XYZ_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"x({NUMBER})_y({NUMBER})_z({NUMBER})")).expect("valid xyz pattern")
});

static DB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)dB").expect("valid dB pattern"));

static RUN_RE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"x({NUMBER})_y({NUMBER})_z({NUMBER})-(\d+)-(\d+\.?\d*)dB");
    Regex::new(&pattern).expect("valid run pattern")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("'{0}' has no '_reconst_' separator")]
    MissingSeparator(String),
    #[error("'{0}' does not match x<num>_y<num>_z<num>-<run>-<num>dB")]
    NoRunPattern(String),
}

// ---------------------------------------------------------------------------
// Reconstruction tags
// ---------------------------------------------------------------------------

/// Charge likelihood term used by the reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QDistribution {
    Bc,
    GausQ,
    NoQ,
    Unknown,
}

impl QDistribution {
    const VOCAB: [(&'static str, Self); 3] =
        [("bc", Self::Bc), ("gausQ", Self::GausQ), ("noQ", Self::NoQ)];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bc => "bc",
            Self::GausQ => "gausQ",
            Self::NoQ => "noQ",
            Self::Unknown => "unknown",
        }
    }
}

/// Timing likelihood term used by the reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TDistribution {
    GausT,
    Goodness,
    Emg,
    NoT,
    Unknown,
}

impl TDistribution {
    const VOCAB: [(&'static str, Self); 4] = [
        ("gausT", Self::GausT),
        ("goodness", Self::Goodness),
        ("emg", Self::Emg),
        ("noT", Self::NoT),
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GausT => "gausT",
            Self::Goodness => "goodness",
            Self::Emg => "emg",
            Self::NoT => "noT",
            Self::Unknown => "unknown",
        }
    }
}

/// Expected-charge model. `Func` keeps the token that followed `func`
/// verbatim (`func_f`, `func_g`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QModel {
    Func(String),
    None,
    Unknown,
}

impl fmt::Display for QModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QModel::Func(name) => write!(f, "func_{name}"),
            QModel::None => write!(f, "none"),
            QModel::Unknown => write!(f, "unknown"),
        }
    }
}

/// Reconstruction settings encoded after `_reconst_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructionTags {
    pub hits: Option<u8>,
    pub q_distribution: QDistribution,
    pub q_model: QModel,
    pub t_distribution: TDistribution,
}

impl Default for ReconstructionTags {
    fn default() -> Self {
        Self {
            hits: None,
            q_distribution: QDistribution::Unknown,
            q_model: QModel::Unknown,
            t_distribution: TDistribution::Unknown,
        }
    }
}

// ---------------------------------------------------------------------------
// Fit report filenames
// ---------------------------------------------------------------------------

/// Fields decoded from a `*_fit_results.txt` name such as
/// `LDhkelec_x0_y0_z162-001-15.00dB_reconst_3hits_bc_func_f_gausT_fit_results.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFilename {
    /// Join key into the PD reference table.
    pub base_key: String,
    /// True source position; all three coordinates or none.
    pub position: Option<Vec3>,
    pub attenuation_db: Option<f64>,
    pub tags: ReconstructionTags,
}

/// Decode a fit report filename. Only a missing `_reconst_` separator is
/// an error; every other field falls back to "absent"/"unknown".
pub fn decode_fit_filename(filename: &str) -> Result<ParsedFilename, DecodeError> {
    let body = filename.strip_suffix(FIT_RESULTS_SUFFIX).unwrap_or(filename);
    let (base_key, options) = body
        .split_once(RECONST_SEPARATOR)
        .ok_or_else(|| DecodeError::MissingSeparator(filename.to_string()))?;

    let tokens: Vec<&str> = options.split('_').collect();

    Ok(ParsedFilename {
        base_key: base_key.to_string(),
        position: extract_position(base_key),
        attenuation_db: extract_attenuation(base_key),
        tags: extract_tags(&tokens),
    })
}

/// `x<num>_y<num>_z<num>` anywhere in `s`.
pub fn extract_position(s: &str) -> Option<Vec3> {
    let caps = XYZ_RE.captures(s)?;
    let x = caps[1].parse().ok()?;
    let y = caps[2].parse().ok()?;
    let z = caps[3].parse().ok()?;
    Some([x, y, z])
}

/// First `<num>dB` in `s`.
pub fn extract_attenuation(s: &str) -> Option<f64> {
    DB_RE.captures(s)?[1].parse().ok()
}

/// Resolve reconstruction tags from the option tokens.
pub fn extract_tags(tokens: &[&str]) -> ReconstructionTags {
    let hits = first_in_vocab(tokens, &[("3hits", 3u8), ("4hits", 4u8)]);
    let q_distribution =
        first_in_vocab(tokens, &QDistribution::VOCAB).unwrap_or(QDistribution::Unknown);
    let t_distribution =
        first_in_vocab(tokens, &TDistribution::VOCAB).unwrap_or(TDistribution::Unknown);

    let q_model = if q_distribution == QDistribution::NoQ {
        QModel::None
    } else {
        tokens
            .iter()
            .position(|t| *t == "func")
            .and_then(|i| tokens.get(i + 1))
            .map(|name| QModel::Func((*name).to_string()))
            .unwrap_or(QModel::Unknown)
    };

    ReconstructionTags {
        hits,
        q_distribution,
        q_model,
        t_distribution,
    }
}

/// Vocabulary order decides priority, not token order.
fn first_in_vocab<T: Copy>(tokens: &[&str], vocab: &[(&str, T)]) -> Option<T> {
    vocab
        .iter()
        .find(|(word, _)| tokens.contains(word))
        .map(|(_, value)| *value)
}

// ---------------------------------------------------------------------------
// Charge summary filenames
// ---------------------------------------------------------------------------

/// Fields decoded from a `*_mean.txt` name such as
/// `LDhkelec_x-35_y-35_z147-003-15.00dB_mean.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMeanFilename {
    pub base_key: String,
    pub position: Vec3,
    pub run: u32,
    pub attenuation_db: f64,
}

pub fn decode_mean_filename(filename: &str) -> Result<ParsedMeanFilename, DecodeError> {
    let base = filename.strip_suffix(MEAN_SUFFIX).unwrap_or(filename);
    let no_match = || DecodeError::NoRunPattern(filename.to_string());

    let caps = RUN_RE.captures(base).ok_or_else(no_match)?;
    let num = |i: usize| caps[i].parse::<f64>().map_err(|_| no_match());

    Ok(ParsedMeanFilename {
        base_key: base.to_string(),
        position: [num(1)?, num(2)?, num(3)?],
        run: caps[4].parse().map_err(|_| no_match())?,
        attenuation_db: num(5)?,
    })
}
