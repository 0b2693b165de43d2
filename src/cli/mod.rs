//! Command-line parsing for the fluorescence anisotropy binding fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code. Defaults reproduce the constants of the
//! lab's analysis scripts.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{CompetitionAssay, DirectAssay};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "fa",
    version,
    about = "Fluorescence anisotropy binding-affinity fitter (direct and competition titrations)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit Kd from a direct titration (probe fixed, macromolecule titrated).
    Direct(DirectArgs),
    /// Fit Kd2 from a competition titration (probe + macromolecule fixed, competitor titrated).
    Compete(CompeteArgs),
    /// Two-sample Student's t-test between two one-column value files.
    Compare(CompareArgs),
    /// Write a synthetic titration with known parameters.
    Simulate(SimulateArgs),
    /// Plot a previously exported fit JSON.
    Plot(PlotArgs),
}

/// Direct-assay constants.
#[derive(Debug, Args, Clone)]
pub struct DirectAssayArgs {
    /// Total probe concentration (uM).
    #[arg(long, default_value_t = 0.010)]
    pub probe: f64,

    /// Bound/free quantum yield ratio.
    #[arg(long, default_value_t = 1.0)]
    pub quantum_yield: f64,
}

impl DirectAssayArgs {
    pub fn assay(&self) -> DirectAssay {
        DirectAssay {
            probe_total: self.probe,
            quantum_yield: self.quantum_yield,
        }
    }
}

/// Competition-assay constants.
#[derive(Debug, Args, Clone)]
pub struct CompetitionAssayArgs {
    /// Total macromolecule concentration (uM).
    #[arg(long, default_value_t = 6.0)]
    pub macromolecule: f64,

    /// Total probe concentration (uM).
    #[arg(long, default_value_t = 0.040)]
    pub probe: f64,

    /// Probe/macromolecule Kd from a direct assay (uM).
    #[arg(long, default_value_t = 2.55)]
    pub reference_kd: f64,

    /// Bound/free quantum yield ratio.
    #[arg(long, default_value_t = 3.0)]
    pub quantum_yield: f64,
}

impl CompetitionAssayArgs {
    pub fn assay(&self) -> CompetitionAssay {
        CompetitionAssay {
            macromolecule_total: self.macromolecule,
            probe_total: self.probe,
            reference_kd: self.reference_kd,
            quantum_yield: self.quantum_yield,
        }
    }
}

/// Options shared by both fitting commands.
#[derive(Debug, Args, Clone)]
pub struct FitCommonArgs {
    /// Two-column titration file (`concentration signal`, whitespace-delimited).
    #[arg(short = 'f', long = "data", value_name = "FILE")]
    pub data: PathBuf,

    /// Fully-free probe signal (e.g. from a probe-only control). Defaults to the
    /// minimum observed signal.
    #[arg(long, requires = "bound_signal")]
    pub free_signal: Option<f64>,

    /// Fully-bound probe signal (e.g. from a saturated control). Defaults to the
    /// maximum observed signal.
    #[arg(long, requires = "free_signal")]
    pub bound_signal: Option<f64>,

    /// Maximum optimizer iterations.
    #[arg(long, default_value_t = 200)]
    pub max_iterations: usize,

    /// Prediction substituted when trial parameters leave the model's domain.
    #[arg(long, default_value_t = 1e6)]
    pub penalty: f64,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Export per-point results to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export the fit (constants + params + fitted grid) to JSON.
    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct DirectArgs {
    #[command(flatten)]
    pub assay: DirectAssayArgs,

    /// Initial Kd guess (uM).
    #[arg(long, default_value_t = 1.0)]
    pub kd_guess: f64,

    /// Initial scale guess.
    #[arg(long, default_value_t = 8.0)]
    pub scale_guess: f64,

    #[command(flatten)]
    pub common: FitCommonArgs,
}

#[derive(Debug, Args, Clone)]
pub struct CompeteArgs {
    #[command(flatten)]
    pub assay: CompetitionAssayArgs,

    /// Initial Kd2 guess (uM).
    #[arg(long, default_value_t = 8.0)]
    pub kd_guess: f64,

    /// Initial scale guess.
    #[arg(long, default_value_t = 1.0)]
    pub scale_guess: f64,

    #[command(flatten)]
    pub common: FitCommonArgs,
}

#[derive(Debug, Args, Clone)]
pub struct CompareArgs {
    /// First group (one value per row).
    #[arg(long, value_name = "FILE")]
    pub first: PathBuf,

    /// Second group (one value per row).
    #[arg(long, value_name = "FILE")]
    pub second: PathBuf,

    #[arg(long, default_value = "first")]
    pub first_label: String,

    #[arg(long, default_value = "second")]
    pub second_label: String,
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    #[command(subcommand)]
    pub model: SimulateCommand,
}

#[derive(Debug, Subcommand)]
pub enum SimulateCommand {
    /// Direct titration (macromolecule on the x axis).
    Direct {
        #[command(flatten)]
        assay: DirectAssayArgs,
        #[command(flatten)]
        synthetic: SyntheticArgs,
    },
    /// Competition titration (competitor on the x axis).
    Compete {
        #[command(flatten)]
        assay: CompetitionAssayArgs,
        #[command(flatten)]
        synthetic: SyntheticArgs,
    },
}

/// Parameters of a synthetic titration.
#[derive(Debug, Args, Clone)]
pub struct SyntheticArgs {
    /// Output titration file.
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    /// True dissociation constant (uM).
    #[arg(long)]
    pub kd: f64,

    /// True scale factor.
    #[arg(long, default_value_t = 1.0)]
    pub scale: f64,

    /// Proportional Gaussian noise (0.01 = 1%).
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of log-spaced concentrations.
    #[arg(long, default_value_t = 8)]
    pub points: usize,

    /// Lowest titrant concentration (uM).
    #[arg(long, default_value_t = 0.01)]
    pub min_conc: f64,

    /// Highest titrant concentration (uM).
    #[arg(long, default_value_t = 1000.0)]
    pub max_conc: f64,

    /// Fully-free probe signal.
    #[arg(long, default_value_t = 20.0)]
    pub free_signal: f64,

    /// Fully-bound probe signal.
    #[arg(long, default_value_t = 200.0)]
    pub bound_signal: f64,
}

/// Options for plotting a saved fit.
#[derive(Debug, Args)]
pub struct PlotArgs {
    /// Fit JSON file produced by `--export-fit`.
    #[arg(long, value_name = "JSON")]
    pub fit: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}
