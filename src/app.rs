//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads titrations and fits binding models
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;
use tracing::info;

use crate::cli::{
    CompareArgs, CompeteArgs, DirectArgs, FitCommonArgs, PlotArgs, SimulateArgs, SimulateCommand,
    SyntheticArgs,
};
use crate::domain::{
    Assay, BoundsSource, CompareConfig, FitConfig, FitParams, SignalBounds, SimulateConfig,
};
use crate::error::AppError;
use crate::models::BindingModel;

pub mod pipeline;

/// Entry point for the `fa` binary.
pub fn run() -> Result<(), AppError> {
    crate::logging::init();
    let cli = crate::cli::Cli::parse();

    match cli.command {
        crate::cli::Command::Direct(args) => handle_fit(&fit_config_from_direct(&args)),
        crate::cli::Command::Compete(args) => handle_fit(&fit_config_from_compete(&args)),
        crate::cli::Command::Compare(args) => handle_compare(&compare_config_from_args(&args)),
        crate::cli::Command::Simulate(args) => handle_simulate(&simulate_config_from_args(&args)?),
        crate::cli::Command::Plot(args) => handle_plot(&args),
    }
}

fn handle_fit(config: &FitConfig) -> Result<(), AppError> {
    let run = pipeline::run_fit(config)?;

    println!(
        "{}",
        crate::report::format_fit_summary(&run.ingest, &run.model, &run.fit, config)
    );
    println!(
        "{}",
        crate::report::format_residual_table(&run.residuals, run.model.kind())
    );

    if config.plot {
        let plot = crate::plot::render_fit_plot(
            &run.residuals,
            &run.model,
            &run.fit.params,
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }

    // Optional exports.
    if let Some(path) = &config.export_results {
        crate::io::export::write_results_csv(path, &run.residuals)?;
        info!(path = %path.display(), "wrote results CSV");
    }
    if let Some(path) = &config.export_fit {
        let fit_file = crate::io::fitfile::build_fit_file(
            &run.model,
            config.bounds,
            &run.fit,
            &run.ingest.series,
            Some(&config.data_path),
        );
        crate::io::fitfile::write_fit_json(path, &fit_file)?;
        info!(path = %path.display(), "wrote fit JSON");
    }

    Ok(())
}

fn handle_compare(config: &CompareConfig) -> Result<(), AppError> {
    let result = pipeline::run_compare(config)?;
    println!(
        "{}",
        crate::report::format_comparison(&config.first_label, &config.second_label, &result)
    );
    Ok(())
}

fn handle_simulate(config: &SimulateConfig) -> Result<(), AppError> {
    let series = pipeline::run_simulate(config)?;
    let header = simulate_header(config);
    crate::io::ingest::write_titration(&config.out_path, &series, &header)?;
    println!(
        "Wrote {} points to {}",
        series.len(),
        config.out_path.display()
    );
    Ok(())
}

fn handle_plot(args: &PlotArgs) -> Result<(), AppError> {
    let fit_file = crate::io::fitfile::read_fit_json(&args.fit)?;
    println!("{}", crate::report::format_params(&fit_file.fit));
    let plot = crate::plot::render_fit_file_plot(&fit_file, args.width, args.height);
    println!("{plot}");
    Ok(())
}

pub fn fit_config_from_direct(args: &DirectArgs) -> FitConfig {
    fit_config(
        Assay::Direct(args.assay.assay()),
        FitParams::new(args.kd_guess, args.scale_guess),
        &args.common,
    )
}

pub fn fit_config_from_compete(args: &CompeteArgs) -> FitConfig {
    fit_config(
        Assay::Competitive(args.assay.assay()),
        FitParams::new(args.kd_guess, args.scale_guess),
        &args.common,
    )
}

fn fit_config(assay: Assay, guess: FitParams, common: &FitCommonArgs) -> FitConfig {
    let bounds = match (common.free_signal, common.bound_signal) {
        (Some(free), Some(bound)) => BoundsSource::Explicit { free, bound },
        _ => BoundsSource::Observed,
    };
    FitConfig {
        data_path: common.data.clone(),
        assay,
        bounds,
        guess,
        max_iterations: common.max_iterations,
        penalty: common.penalty,
        plot: !common.no_plot,
        plot_width: common.width,
        plot_height: common.height,
        export_results: common.export.clone(),
        export_fit: common.export_fit.clone(),
    }
}

pub fn compare_config_from_args(args: &CompareArgs) -> CompareConfig {
    CompareConfig {
        first_path: args.first.clone(),
        second_path: args.second.clone(),
        first_label: args.first_label.clone(),
        second_label: args.second_label.clone(),
    }
}

pub fn simulate_config_from_args(args: &SimulateArgs) -> Result<SimulateConfig, AppError> {
    let (assay, synthetic): (Assay, &SyntheticArgs) = match &args.model {
        SimulateCommand::Direct { assay, synthetic } => (Assay::Direct(assay.assay()), synthetic),
        SimulateCommand::Compete { assay, synthetic } => (Assay::Competitive(assay.assay()), synthetic),
    };
    let bounds = SignalBounds::new(synthetic.free_signal, synthetic.bound_signal)?;
    Ok(SimulateConfig {
        out_path: synthetic.out.clone(),
        assay,
        bounds,
        params: FitParams::new(synthetic.kd, synthetic.scale),
        noise: synthetic.noise,
        seed: synthetic.seed,
        points: synthetic.points,
        conc_min: synthetic.min_conc,
        conc_max: synthetic.max_conc,
    })
}

fn simulate_header(config: &SimulateConfig) -> String {
    let mut lines = vec![format!(
        "synthetic {} titration: {}={} scale={} noise={} seed={}",
        config.assay.kind().display_name(),
        config.assay.kind().kd_label(),
        config.params.kd,
        config.params.scale,
        config.noise,
        config.seed
    )];
    lines.push(format!(
        "signal bounds: free={} bound={}",
        config.bounds.free, config.bounds.bound
    ));
    for (name, value) in config.assay.constants() {
        lines.push(format!("{name}={value}"));
    }
    lines.push(format!("{}_uM signal", config.assay.kind().titrant_label()));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};

    #[test]
    fn direct_flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "fa", "direct", "-f", "d.txt", "--probe", "0.02", "--free-signal", "20",
            "--bound-signal", "200", "--no-plot",
        ])
        .unwrap();
        let Command::Direct(args) = cli.command else {
            panic!("expected direct");
        };
        let config = fit_config_from_direct(&args);
        assert_eq!(config.bounds, BoundsSource::Explicit { free: 20.0, bound: 200.0 });
        assert!(!config.plot);
        assert_eq!(config.guess, FitParams::new(1.0, 8.0));
        match config.assay {
            Assay::Direct(a) => assert_eq!(a.probe_total, 0.02),
            other => panic!("unexpected assay {other:?}"),
        }
    }

    #[test]
    fn simulate_then_fit_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("sim.txt");
        let out_arg = out.display().to_string();
        let cli = Cli::try_parse_from([
            "fa", "simulate", "compete", "--out", out_arg.as_str(), "--kd", "10", "--noise", "0.002",
            "--seed", "3",
        ])
        .unwrap();
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        let sim = simulate_config_from_args(&args).unwrap();
        handle_simulate(&sim).unwrap();

        let csv = dir.path().join("fit.csv");
        let json = dir.path().join("fit.json");
        let (csv_arg, json_arg) = (csv.display().to_string(), json.display().to_string());
        let cli = Cli::try_parse_from([
            "fa", "compete", "-f", out_arg.as_str(), "--free-signal", "20", "--bound-signal", "200",
            "--no-plot", "--export", csv_arg.as_str(), "--export-fit", json_arg.as_str(),
        ])
        .unwrap();
        let Command::Compete(args) = cli.command else {
            panic!("expected compete");
        };
        let config = fit_config_from_compete(&args);
        let run = pipeline::run_fit(&config).unwrap();
        assert!((run.fit.params.kd - 10.0).abs() / 10.0 < 0.05);

        handle_fit(&config).unwrap();
        let saved = crate::io::fitfile::read_fit_json(&json).unwrap();
        assert_eq!(saved.fit.params, run.fit.params);
        assert_eq!(saved.bounds_source, config.bounds);
        let csv_text = std::fs::read_to_string(&csv).unwrap();
        assert_eq!(csv_text.lines().count(), 9);
    }
}
