//! CLI argument parsing and validation
//!
//! This module provides the command-line interface for qpolicy.
//!
//! # Usage
//!
//! ```bash
//! qpolicy list
//! qpolicy resolve W8C_A8T_SYM_P2 --format json
//! qpolicy resolve 4-bit-fixed-range --ptq --backend qnnpack
//! qpolicy map build.yaml --policy W4C_A4T
//! qpolicy validate build.yaml
//! qpolicy calibrate W8C_A8T --input samples.json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// qpolicy: Quantization policy resolution engine
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "qpolicy")]
#[command(version)]
#[command(about = "Resolve quantization policies into per-operator quantization configs")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error); overrides -v/-q
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List every policy in the catalog
    List(ListArgs),

    /// Resolve one policy into a quantization config
    Resolve(ResolveArgs),

    /// Build an operator mapping from a YAML build file
    Map(MapArgs),

    /// Validate a build file without building
    Validate(ValidateArgs),

    /// Run the observers a policy selects over calibration data
    Calibrate(CalibrateArgs),
}

/// Arguments for the list command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ListArgs {
    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the resolve command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ResolveArgs {
    /// Policy code or alias
    #[arg(value_name = "POLICY")]
    pub policy: String,

    /// Resolve for post-training quantization instead of QAT
    #[arg(long)]
    pub ptq: bool,

    /// Target backend (generic, fbgemm, qnnpack, x86)
    #[arg(short, long, default_value = "generic")]
    pub backend: String,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the map command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct MapArgs {
    /// Path to YAML build file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override the target policy
    #[arg(short, long)]
    pub policy: Option<String>,

    /// Override to post-training quantization
    #[arg(long)]
    pub ptq: bool,

    /// Override the backend
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML build file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

/// Arguments for the calibrate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct CalibrateArgs {
    /// Policy code or alias
    #[arg(value_name = "POLICY")]
    pub policy: String,

    /// JSON calibration data: {"activations": [[..]], "weights": [[..]]}
    #[arg(short, long)]
    pub input: PathBuf,

    /// Calibrate for post-training quantization instead of QAT
    #[arg(long)]
    pub ptq: bool,

    /// Target backend (generic, fbgemm, qnnpack, x86)
    #[arg(short, long, default_value = "generic")]
    pub backend: String,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for printed results
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            _ => Err(format!(
                "Unknown output format: {}. Valid formats: text, json, yaml",
                s
            )),
        }
    }
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn config_path_strategy() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9_-]{0,20}\\.(yaml|yml)"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_map_command_parses(config in config_path_strategy()) {
            let cli = parse_args(["qpolicy", "map", &config]).unwrap();
            match cli.command {
                Command::Map(args) => prop_assert_eq!(args.config, PathBuf::from(&config)),
                _ => prop_assert!(false, "Expected Map command"),
            }
        }

        #[test]
        fn prop_resolve_accepts_any_policy_string(policy in "[A-Za-z][A-Za-z0-9_-]{0,30}") {
            // Policy strings are validated at resolution time, not parse time
            let cli = parse_args(["qpolicy", "resolve", &policy]);
            prop_assert!(cli.is_ok());
        }

        #[test]
        fn prop_output_format_case_insensitive(
            format in prop_oneof!["text", "TEXT", "Json", "JSON", "yaml", "YAML"],
        ) {
            prop_assert!(format.parse::<OutputFormat>().is_ok());
        }
    }
}
