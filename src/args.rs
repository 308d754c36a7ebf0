use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Aggregate PMT light-source calibration results with PD monitoring data",
    long_about = None,
    arg_required_else_help = true,
    after_help = concat!(
        "True light amplitude:\n",
        "  A_true = (PDvolt / V_ref) * 10^((Att_ref - Attenuation_dB) / 10)\n",
        "  with V_ref = 5.0 V and Att_ref = 15.0 dB unless --calibration overrides them.\n",
        "\n",
        "Examples:\n",
        "  pmt-calib aggregate reconst_images PD_summary.csv\n",
        "  pmt-calib dataset -i results -p PD_summary.csv -o dataset.csv\n",
    )
)]
pub struct Args {
    /// JSON file overriding calibration constants (reference PD voltage and
    /// attenuation, PMT layout)
    #[arg(long, global = true)]
    pub calibration: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Summarise *_fit_results.txt reports into summary_results.csv
    Aggregate {
        /// Directory holding the fit reports (reconst_images)
        result_dir: PathBuf,

        /// PD summary with RunId and PDvolt_mean columns (.csv, .json or .parquet)
        pd_csv: PathBuf,

        /// Output path [default: <RESULT_DIR>/summary_results.csv]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Join *mean.txt charge summaries with PD data into a modelling data set
    Dataset {
        /// Directory holding the charge summaries
        #[arg(short, long, visible_alias = "input_dir")]
        input_dir: PathBuf,

        /// PD summary with RunId and PDvolt_mean columns (.csv, .json or .parquet)
        #[arg(short, long, visible_alias = "pd_csv")]
        pd_csv: PathBuf,

        /// Output path [default: <INPUT_DIR>/dataset_for_modeling.csv]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
