//! qpolicy CLI
//!
//! # Usage
//!
//! ```bash
//! # List the catalog
//! qpolicy list
//!
//! # Resolve one policy
//! qpolicy resolve W8C_A8T_SYM_P2 --format json
//!
//! # Build a mapping from a YAML build file
//! qpolicy map build.yaml --policy W4C_A4T
//!
//! # Validate a build file
//! qpolicy validate build.yaml
//!
//! # Calibrate observers on sample data
//! qpolicy calibrate W8C_A8T --input samples.json
//! ```

use clap::Parser;
use qpolicy::config::{
    apply_overrides, build_mapping_from_spec, load_config, CalibrateArgs, Cli, Command, ListArgs,
    MapArgs, OutputFormat, ResolveArgs, ValidateArgs,
};
use qpolicy::output::{calibration_table, config_table, mapping_table, policy_table, to_structured};
use qpolicy::quant::{calibrate, resolve_str, CalibrationData, PolicyId};
use std::process::ExitCode;
use tracing_subscriber::filter::LevelFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.log_level.as_deref().map(str::parse::<LevelFilter>) {
        Some(Ok(level)) => level,
        Some(Err(_)) => {
            eprintln!("Error: invalid --log-level (expected trace, debug, info, warn, error, off)");
            return ExitCode::FAILURE;
        }
        None if cli.quiet => LevelFilter::ERROR,
        None if cli.verbose => LevelFilter::DEBUG,
        None => LevelFilter::WARN,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::List(args) => run_list(args),
        Command::Resolve(args) => run_resolve(args),
        Command::Map(args) => run_map(args),
        Command::Validate(args) => run_validate(args, cli.quiet),
        Command::Calibrate(args) => run_calibrate(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn emit<T: serde::Serialize>(
    value: &T,
    format: OutputFormat,
    table: impl FnOnce() -> String,
) -> Result<(), String> {
    let rendered = match format {
        OutputFormat::Text => table(),
        _ => to_structured(value, format).map_err(|e| e.to_string())?,
    };
    print!("{rendered}");
    if !rendered.ends_with('\n') {
        println!();
    }
    Ok(())
}

fn run_list(args: ListArgs) -> Result<(), String> {
    let policies = PolicyId::list_all();
    emit(&policies, args.format, || policy_table(policies).render())
}

fn run_resolve(args: ResolveArgs) -> Result<(), String> {
    let config = resolve_str(&args.policy, !args.ptq, &args.backend).map_err(|e| e.to_string())?;
    emit(&config, args.format, || {
        format!(
            "Policy: {} ({}, {})\n{}",
            config.policy,
            config.policy.alias(),
            config.backend,
            config_table(&config).render()
        )
    })
}

fn run_map(args: MapArgs) -> Result<(), String> {
    let mut spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    apply_overrides(&mut spec, &args);
    let mapping = build_mapping_from_spec(&spec).map_err(|e| e.to_string())?;
    emit(&mapping, args.format, || mapping_table(&mapping).render())
}

fn run_validate(args: ValidateArgs, quiet: bool) -> Result<(), String> {
    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    if !quiet {
        println!(
            "{}: valid (policy {}, {} base operators, {} fixed)",
            args.config.display(),
            spec.policy,
            spec.base.operators.len(),
            spec.fixed.len()
        );
    }
    Ok(())
}

fn run_calibrate(args: CalibrateArgs) -> Result<(), String> {
    let config = resolve_str(&args.policy, !args.ptq, &args.backend).map_err(|e| e.to_string())?;
    let data = CalibrationData::load(&args.input)
        .map_err(|e| format!("Failed to load {}: {e}", args.input.display()))?;
    let report = calibrate(&config, &data).map_err(|e| e.to_string())?;

    emit(&report, args.format, || {
        format!(
            "Policy: {} ({} batches, {} channels)\n{}activation mse: {:.6e}\nweight mse: {:.6e}\n",
            report.config.policy,
            report.activation_batches,
            report.weight_channels,
            calibration_table(&report).render(),
            report.activation_mse,
            report.weight_mse
        )
    })
}
