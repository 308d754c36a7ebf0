use std::path::Path;

use log::warn;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Quantities the Gaussian-fit report can carry a (mean, sigma) pair for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    X,
    Y,
    Z,
    Time,
    Amplitude,
}

/// One fitted distribution. Mean and sigma are reported independently.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measurement {
    pub mean: Option<f64>,
    pub sigma: Option<f64>,
}

/// Everything read back from a `*_fit_results.txt` report.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FitResultRecord {
    pub x: Measurement,
    pub y: Measurement,
    pub z: Measurement,
    pub t: Measurement,
    pub amplitude: Measurement,
    /// Width of the mirrored radial-distance distribution (resolution).
    pub r_sigma: Option<f64>,
}

impl FitResultRecord {
    fn get_mut(&mut self, q: Quantity) -> &mut Measurement {
        match q {
            Quantity::X => &mut self.x,
            Quantity::Y => &mut self.y,
            Quantity::Z => &mut self.z,
            Quantity::Time => &mut self.t,
            Quantity::Amplitude => &mut self.amplitude,
        }
    }

    /// Reconstructed (x, y, z) means.
    pub fn position_means(&self) -> [Option<f64>; 3] {
        [self.x.mean, self.y.mean, self.z.mean]
    }
}

// ---------------------------------------------------------------------------
// Report parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Fit(Quantity),
    Radial,
}

const HEADERS: [(&str, Section); 6] = [
    ("[Position X]", Section::Fit(Quantity::X)),
    ("[Position Y]", Section::Fit(Quantity::Y)),
    ("[Position Z]", Section::Fit(Quantity::Z)),
    ("[Time]", Section::Fit(Quantity::Time)),
    ("[Amplitude A]", Section::Fit(Quantity::Amplitude)),
    ("[Radial Distance r", Section::Radial),
];

/// Parse the text of a fit report:
///
/// ```text
/// [Position X]
///   Mean  : 12.5000 +/- 0.3000 cm
///   Sigma : 4.1000 +/- 0.2000 cm
///
/// [Radial Distance r (Mirrored)]
///   Center Used: (12.50, -3.10, 160.20)
///   Sigma (Resolution): 6.2000 +/- 0.1000 cm
/// ```
///
/// Unknown sections, blank lines and values that do not parse are skipped;
/// the affected field just stays `None`.
pub fn parse_fit_report(text: &str) -> FitResultRecord {
    let mut record = FitResultRecord::default();
    let mut section: Option<Section> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some((_, s)) = HEADERS.iter().find(|(header, _)| line.contains(header)) {
            section = Some(*s);
            continue;
        }
        if line.starts_with('[') {
            section = None;
            continue;
        }

        match section {
            Some(Section::Fit(q)) => {
                let m = record.get_mut(q);
                if line.starts_with("Mean") {
                    m.mean = labelled_value(line).or(m.mean);
                } else if line.starts_with("Sigma") {
                    m.sigma = labelled_value(line).or(m.sigma);
                }
            }
            Some(Section::Radial) if line.starts_with("Sigma") => {
                record.r_sigma = labelled_value(line).or(record.r_sigma);
            }
            _ => {}
        }
    }

    record
}

/// `<Label> : <value> [+/- <err>] [unit]` → value.
fn labelled_value(line: &str) -> Option<f64> {
    let (_, rest) = line.split_once(':')?;
    let field = rest.split(':').next()?;
    let value = field.split("+/-").next()?.split_whitespace().next()?;
    value.parse().ok()
}

/// Read and parse a report from disk. An unreadable file yields an
/// all-`None` record and a warning.
pub fn read_fit_report(path: &Path) -> FitResultRecord {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_fit_report(&text),
        Err(e) => {
            warn!("Could not read {}: {e}", path.display());
            FitResultRecord::default()
        }
    }
}
