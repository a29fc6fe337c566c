//! Configuration layer providing clean separation between CLI arguments and internal run configurations.
//!
//! This module defines the shared configuration structures used throughout the plume toolkit:
//! - `BaseRunConfig`: Common configuration options shared by all commands
//! - Command-specific configurations that embed the base config
//! - Conversion functions from CLI commands to internal configurations
//!
//! The design separates CLI concerns (argument parsing, help text, validation) from
//! business logic (dataset location, model selection, processing parameters).

use clap::{Args, Parser};
use clap_verbosity_flag::Verbosity;
use serde::Serialize;

/// Model architecture variants for keypoint regression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModelArch {
    /// ResNet-50 backbone with a Conv + BatchNorm + ReLU regression head
    Base,
    /// ResNet-50 backbone with a Conv + BatchNorm + SiLU + Dropout regression head
    X,
}

impl std::str::FromStr for ModelArch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "base" => Ok(ModelArch::Base),
            "x" => Ok(ModelArch::X),
            _ => Err(format!("Unknown model architecture: {s} (expected 'base' or 'x')")),
        }
    }
}

impl ModelArch {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelArch::Base => "base",
            ModelArch::X => "x",
        }
    }
}

/// Parse probability value (must be between 0.0 and 1.0)
pub fn parse_probability(s: &str) -> Result<f32, String> {
    let val = s
        .parse::<f32>()
        .map_err(|_| format!("Invalid number: '{s}'"))?;
    if !(0.0..=1.0).contains(&val) {
        return Err(format!("Must be between 0.0 and 1.0, got {val}"));
    }
    Ok(val)
}

/// Parse a strictly positive integer
pub fn parse_positive(s: &str) -> Result<usize, String> {
    let val = s
        .parse::<usize>()
        .map_err(|_| format!("Invalid number: '{s}'"))?;
    if val == 0 {
        return Err("Must be greater than zero".to_string());
    }
    Ok(val)
}

/// Global CLI arguments that apply to all plume commands
#[derive(Parser, Debug, Clone)]
pub struct GlobalArgs {
    /// Global output directory (overrides default placement next to the annotations file)
    #[arg(long, global = true)]
    pub output_dir: Option<String>,

    /// Write a TOML report file alongside the outputs
    #[arg(long, global = true)]
    pub report: bool,

    /// Verbosity level (-q/--quiet, -v/-vv/-vvv/-vvvv for info/debug/trace)
    #[command(flatten)]
    pub verbosity: Verbosity,

    /// Use permissive mode (warn instead of error for unparseable annotation rows)
    #[arg(long, global = true)]
    pub permissive: bool,

    /// Disable colored output (also respects NO_COLOR and PLUME_NO_COLOR env vars)
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Dataset location and batching arguments shared by all commands
#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    /// Path to the annotations CSV (behavior, image_id, image_file, keypoint columns)
    #[arg(long, value_name = "CSV")]
    pub annotations: String,

    /// Root folder of the dataset (contains one directory per behavior label)
    #[arg(long, value_name = "DIR")]
    pub data_root: String,

    /// Square model input size in pixels
    #[arg(long, default_value = "224")]
    pub image_size: u32,

    /// Number of samples per inference batch
    #[arg(long, default_value = "16", value_parser = parse_positive)]
    pub batch_size: usize,
}

/// Model selection arguments shared by all commands
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Model architecture (base, x)
    #[arg(long, default_value = "base")]
    pub arch: ModelArch,

    /// Path to a burn weight record (.mpk). Runs randomly initialized if omitted.
    #[arg(long, value_name = "FILE")]
    pub weights: Option<String>,
}

/// CLI command for PCKh evaluation over an annotated dataset
#[derive(Parser, Debug, Clone)]
pub struct EvalCommand {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// PCKh threshold as a fraction of head size (0.0-1.0)
    #[arg(short, long, default_value = "0.2", value_parser = parse_probability)]
    pub threshold: f32,
}

/// CLI command for batch prediction collection
#[derive(Parser, Debug, Clone)]
pub struct InferCommand {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Output file for the predictions CSV (defaults to predictions.csv)
    #[arg(long, value_name = "FILE")]
    pub output: Option<String>,
}

/// CLI command for prediction overlay rendering
#[derive(Parser, Debug, Clone)]
pub struct VisualizeCommand {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Number of batches to render
    #[arg(long, default_value = "1", value_parser = parse_positive)]
    pub num_batches: usize,
}

/// Base configuration common to all commands
#[derive(Debug, Clone, Serialize)]
pub struct BaseRunConfig {
    /// Path to the annotations CSV
    pub annotations: String,
    /// Root folder of the dataset
    pub data_root: String,
    /// Square model input size
    pub image_size: u32,
    /// Samples per batch
    pub batch_size: usize,
    /// Model architecture
    pub arch: ModelArch,
    /// Optional weight record path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<String>,
    /// Optional output directory override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// Whether to write a TOML report
    pub save_report: bool,
    /// Use strict mode (fail on unparseable annotation rows). Opposite of `--permissive`.
    pub strict: bool,
}

impl BaseRunConfig {
    fn from_parts(global: GlobalArgs, dataset: DatasetArgs, model: ModelArgs) -> Self {
        Self {
            annotations: dataset.annotations,
            data_root: dataset.data_root,
            image_size: dataset.image_size,
            batch_size: dataset.batch_size,
            arch: model.arch,
            weights: model.weights,
            output_dir: global.output_dir,
            save_report: global.report,
            strict: !global.permissive, // Note: CLI uses permissive, internal uses strict
        }
    }
}

/// Internal configuration for PCKh evaluation
#[derive(Debug, Clone, Serialize)]
pub struct EvalConfig {
    #[serde(flatten)]
    pub base: BaseRunConfig,
    pub threshold: f32,
}

impl EvalConfig {
    /// Create configuration from global args and command-specific args
    pub fn from_args(global: GlobalArgs, cmd: EvalCommand) -> Self {
        Self {
            base: BaseRunConfig::from_parts(global, cmd.dataset, cmd.model),
            threshold: cmd.threshold,
        }
    }
}

/// Internal configuration for batch prediction collection
#[derive(Debug, Clone, Serialize)]
pub struct InferConfig {
    #[serde(flatten)]
    pub base: BaseRunConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl InferConfig {
    /// Create configuration from global args and command-specific args
    pub fn from_args(global: GlobalArgs, cmd: InferCommand) -> Self {
        Self {
            base: BaseRunConfig::from_parts(global, cmd.dataset, cmd.model),
            output: cmd.output,
        }
    }
}

/// Internal configuration for overlay rendering
#[derive(Debug, Clone, Serialize)]
pub struct VisualizeConfig {
    #[serde(flatten)]
    pub base: BaseRunConfig,
    pub num_batches: usize,
}

impl VisualizeConfig {
    /// Create configuration from global args and command-specific args
    pub fn from_args(global: GlobalArgs, cmd: VisualizeCommand) -> Self {
        Self {
            base: BaseRunConfig::from_parts(global, cmd.dataset, cmd.model),
            num_batches: cmd.num_batches,
        }
    }
}
