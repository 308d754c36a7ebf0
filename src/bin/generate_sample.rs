//! Writes a small synthetic calibration campaign:
//!
//! ```text
//! <out>/PD_summary.csv
//! <out>/PD_summary.parquet
//! <out>/reconst_images/*_fit_results.txt
//! <out>/means/*_mean.txt
//! ```
//!
//! Usage: `generate_sample [OUT_DIR]` (default `sample_campaign`).

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const PMT_XY: [(f64, f64); 4] = [(-35.0, 35.0), (35.0, 35.0), (-35.0, -35.0), (35.0, -35.0)];
const Z_SURFACE: f64 = 80.5;

const RECONST_CONFIGS: [&str; 3] = [
    "3hits_bc_func_f_gausT",
    "4hits_gausQ_func_g_emg",
    "4hits_noQ_noT",
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

struct Run {
    base: String,
    pos: [f64; 3],
    db: f64,
    pd_volt: f64,
}

impl Run {
    fn light_power(&self) -> f64 {
        (self.pd_volt / 5.0) * 10f64.powf((15.0 - self.db) / 10.0)
    }
}

/// Report in the layout the Gaussian-fit step writes.
fn fit_report(run: &Run, config: &str, rng: &mut SimpleRng) -> String {
    let mut text = format!("=== Fit Results for {}_reconst_{config} ===\n\n", run.base);
    let labels = [("Position X", "cm"), ("Position Y", "cm"), ("Position Z", "cm")];
    for (truth, (label, unit)) in run.pos.iter().zip(labels) {
        let mean = rng.gauss(*truth, 2.0);
        let sigma = rng.gauss(5.0, 0.5).abs();
        let _ = writeln!(text, "[{label}]");
        let _ = writeln!(text, "  Mean  : {mean:.4} +/- {:.4} {unit}", sigma / 30.0);
        let _ = writeln!(text, "  Sigma : {sigma:.4} +/- {:.4} {unit}\n", sigma / 40.0);
    }

    let _ = writeln!(text, "[Time]");
    let _ = writeln!(text, "  Mean  : {:.4} +/- 0.0500 ns", rng.gauss(40.0, 1.0));
    let _ = writeln!(text, "  Sigma : {:.4} +/- 0.0400 ns\n", rng.gauss(1.3, 0.1).abs());

    let _ = writeln!(text, "[Amplitude A]");
    if config.contains("noQ") {
        let _ = writeln!(text, "  Column 'A' not found\n");
    } else {
        let a = run.light_power() * rng.gauss(1.0, 0.05);
        let _ = writeln!(text, "  Mean  : {a:.4} +/- {:.4} arb.", a * 0.01);
        let _ = writeln!(text, "  Sigma : {:.4} +/- {:.4} arb.\n", a * 0.1, a * 0.005);
    }

    let _ = writeln!(text, "[Radial Distance r (Mirrored)]");
    let [x, y, z] = run.pos;
    let _ = writeln!(text, "  Center Used: ({x:.2}, {y:.2}, {z:.2})");
    let r_sigma = rng.gauss(6.0, 0.5).abs();
    let _ = writeln!(text, "  Sigma (Resolution): {r_sigma:.4} +/- 0.1000 cm\n");
    text
}

/// Charge summary with one gain branch per channel.
fn charge_summary(run: &Run, rng: &mut SimpleRng) -> String {
    let mut text = String::from("# ch,type,mean,mean_err,rms,root_file\n");
    for (ch, (px, py)) in PMT_XY.iter().enumerate() {
        let d = [run.pos[0] - px, run.pos[1] - py, run.pos[2] - Z_SURFACE];
        let r2 = d.iter().map(|v| v * v).sum::<f64>().max(1.0);
        let cos = (d[2] / r2.sqrt()).max(0.05);
        let charge = 2.0e4 * run.light_power() * cos / r2 * rng.gauss(1.0, 0.02);
        let kind = if ch % 2 == 0 { "pc_by_h" } else { "pc_by_l" };
        let _ = writeln!(
            text,
            "{ch}, {kind}, {charge:.4}, {:.4}, {:.4}, {}.root",
            charge * 0.01,
            charge * 0.3,
            run.base
        );
    }
    text
}

fn main() {
    let out = std::env::args().nth(1).unwrap_or_else(|| "sample_campaign".to_string());
    let out = Path::new(&out);
    let reports = out.join("reconst_images");
    let means = out.join("means");
    std::fs::create_dir_all(&reports).expect("Failed to create report directory");
    std::fs::create_dir_all(&means).expect("Failed to create means directory");

    let mut rng = SimpleRng::new(42);

    let mut runs = Vec::new();
    let mut run_no = 1;
    for x in [-35.0, 0.0, 35.0] {
        for y in [-35.0, 0.0, 35.0] {
            for z in [127.0, 147.0] {
                for db in [15.0, 12.0] {
                    let base = format!("LDhkelec_x{x}_y{y}_z{z}-{run_no:03}-{db:.2}dB");
                    runs.push(Run {
                        base,
                        pos: [x, y, z],
                        db,
                        pd_volt: rng.gauss(4.9, 0.05),
                    });
                    run_no += 1;
                }
            }
        }
    }

    // PD summary as CSV
    let mut writer =
        csv::Writer::from_path(out.join("PD_summary.csv")).expect("Failed to create PD CSV");
    writer
        .write_record(["RunId", "PDvolt_mean", "PDvolt_std"])
        .expect("Failed to write PD header");
    for run in &runs {
        writer
            .write_record([
                format!("/data/hkelec/{}", run.base),
                run.pd_volt.to_string(),
                (run.pd_volt * 0.01).to_string(),
            ])
            .expect("Failed to write PD row");
    }
    writer.flush().expect("Failed to flush PD CSV");

    // ... and as Parquet
    let schema = Arc::new(Schema::new(vec![
        Field::new("RunId", DataType::Utf8, false),
        Field::new("PDvolt_mean", DataType::Float64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(
                runs.iter().map(|r| format!("/data/hkelec/{}", r.base)).collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from(runs.iter().map(|r| r.pd_volt).collect::<Vec<_>>())),
        ],
    )
    .expect("Failed to create RecordBatch");
    let file = std::fs::File::create(out.join("PD_summary.parquet"))
        .expect("Failed to create output file");
    let mut pq = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    pq.write(&batch).expect("Failed to write batch");
    pq.close().expect("Failed to close writer");

    for run in &runs {
        for config in RECONST_CONFIGS {
            let name = format!("{}_reconst_{config}_fit_results.txt", run.base);
            std::fs::write(reports.join(name), fit_report(run, config, &mut rng))
                .expect("Failed to write report");
        }
        std::fs::write(means.join(format!("{}_mean.txt", run.base)), charge_summary(run, &mut rng))
            .expect("Failed to write charge summary");
    }

    println!(
        "Wrote {} runs ({} fit reports) to {}",
        runs.len(),
        runs.len() * RECONST_CONFIGS.len(),
        out.display()
    );
}
