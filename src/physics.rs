use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::error::CalibError;

/// A point or direction in detector coordinates [cm].
pub type Vec3 = [f64; 3];

// ---------------------------------------------------------------------------
// Calibration constants
// ---------------------------------------------------------------------------

/// Calibration constants for one measurement campaign.
///
/// The defaults describe the four-PMT light-source bench; a JSON file with
/// any subset of the fields overrides them (see [`Calibration::from_json_file`]).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// PD voltage [V] that corresponds to unit light amplitude.
    pub ref_pd_volt: f64,
    /// Attenuator setting [dB] that corresponds to unit light amplitude.
    pub ref_attenuation_db: f64,
    /// Direction every PMT faces. Expected to be unit length.
    pub pmt_normal: Vec3,
    /// z of the PMT photocathode surface centre [cm].
    pub z_surface: f64,
    /// z of the centre of the PMT treated as a hemisphere [cm].
    pub z_hemisphere: f64,
    /// Readout channel → PMT (x, y) [cm].
    pub pmt_xy: BTreeMap<u32, [f64; 2]>,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            ref_pd_volt: 5.0,
            ref_attenuation_db: 15.0,
            pmt_normal: [0.0, 0.0, 1.0],
            z_surface: 80.5,
            z_hemisphere: 48.0,
            pmt_xy: BTreeMap::from([
                (0, [-35.0, 35.0]),
                (1, [35.0, 35.0]),
                (2, [-35.0, -35.0]),
                (3, [35.0, -35.0]),
            ]),
        }
    }
}

impl Calibration {
    /// Read calibration overrides from a JSON object. Missing keys keep
    /// their default value.
    pub fn from_json_file(path: &Path) -> Result<Self, CalibError> {
        let load = || -> anyhow::Result<Self> {
            let text = std::fs::read_to_string(path).context("reading calibration file")?;
            serde_json::from_str(&text).context("parsing calibration JSON")
        };
        load().map_err(|source| CalibError::Calibration {
            path: path.to_path_buf(),
            source,
        })
    }

    /// PMT photocathode surface centre for a readout channel.
    pub fn pmt_surface(&self, ch: u32) -> Option<Vec3> {
        self.pmt_xy.get(&ch).map(|&[x, y]| [x, y, self.z_surface])
    }

    /// PMT hemisphere centre for a readout channel.
    pub fn pmt_hemisphere(&self, ch: u32) -> Option<Vec3> {
        self.pmt_xy.get(&ch).map(|&[x, y]| [x, y, self.z_hemisphere])
    }
}

// ---------------------------------------------------------------------------
// True light amplitude
// ---------------------------------------------------------------------------

/// Relative light amplitude seen by the detector:
///
/// `A = (V / V_ref) * 10^((Att_ref - Att) / 10)`
///
/// Returns `None` when either input is missing or NaN.
pub fn true_amplitude(
    cal: &Calibration,
    pd_volt: Option<f64>,
    attenuation_db: Option<f64>,
) -> Option<f64> {
    let volt = pd_volt.filter(|v| !v.is_nan())?;
    let att = attenuation_db.filter(|a| !a.is_nan())?;

    let volt_ratio = volt / cal.ref_pd_volt;
    let attenuation_factor = 10f64.powf((cal.ref_attenuation_db - att) / 10.0);
    Some(volt_ratio * attenuation_factor)
}

// ---------------------------------------------------------------------------
// Source / PMT geometry
// ---------------------------------------------------------------------------

/// Distance and incidence cosine between a light source and a PMT.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Euclidean distance [cm].
    pub distance: f64,
    /// cos of the angle between the PMT→source direction and the PMT normal.
    pub cos_alpha: f64,
}

/// Coincident points give distance 0 and cosine 0.
pub fn geometry(source: Vec3, pmt: Vec3, normal: Vec3) -> Geometry {
    let v = [source[0] - pmt[0], source[1] - pmt[1], source[2] - pmt[2]];
    let distance = norm(v);
    if distance == 0.0 {
        return Geometry {
            distance: 0.0,
            cos_alpha: 0.0,
        };
    }
    let cos_alpha = (v[0] * normal[0] + v[1] * normal[1] + v[2] * normal[2]) / distance;
    Geometry { distance, cos_alpha }
}

fn norm(v: Vec3) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

// ---------------------------------------------------------------------------
// Missing-aware arithmetic
// ---------------------------------------------------------------------------

/// `measured - truth`, only when both are known.
pub fn difference(measured: Option<f64>, truth: Option<f64>) -> Option<f64> {
    Some(measured? - truth?)
}

/// Distance between a reconstructed and a true position, only when all six
/// coordinates are known.
pub fn position_error(reco: [Option<f64>; 3], truth: [Option<f64>; 3]) -> Option<f64> {
    let dx = difference(reco[0], truth[0])?;
    let dy = difference(reco[1], truth[1])?;
    let dz = difference(reco[2], truth[2])?;
    Some(norm([dx, dy, dz]))
}
