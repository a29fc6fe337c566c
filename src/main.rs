use clap::Parser;
use env_logger::Builder;
use env_logger::Env;
use log::{error, info, Level};

use colored::Colorize;
use plume::color_utils::{colors, init_color_config, maybe_color_stderr, symbols};
use plume::config::{
    EvalCommand, EvalConfig, GlobalArgs, InferCommand, InferConfig, VisualizeCommand,
    VisualizeConfig,
};
use plume::runner::{run_eval, run_infer, run_visualize};
use std::io::Write;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Evaluate PCKh accuracy over an annotated dataset
    Eval(EvalCommand),

    /// Collect keypoint predictions for every sample into a CSV table
    Infer(InferCommand),

    /// Render prediction overlays for a few batches
    Visualize(VisualizeCommand),

    /// Show version information
    Version,
}

#[derive(Parser)]
#[command(name = "plume")]
#[command(about = "Bird pose estimation toolkit")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn get_log_level_from_verbosity(
    verbosity: clap_verbosity_flag::Verbosity<clap_verbosity_flag::ErrorLevel>,
) -> log::LevelFilter {
    let base_level = verbosity.log_level_filter();
    let adjusted_level = match base_level {
        log::LevelFilter::Off => log::LevelFilter::Off, // -qq -> OFF
        log::LevelFilter::Error => log::LevelFilter::Warn, // default -> WARN
        log::LevelFilter::Warn => log::LevelFilter::Info, // -v -> INFO
        log::LevelFilter::Info => log::LevelFilter::Debug, // -vv -> DEBUG
        log::LevelFilter::Debug => log::LevelFilter::Trace, // -vvv -> TRACE
        log::LevelFilter::Trace => log::LevelFilter::Trace, // -vvvv -> TRACE (max)
    };

    // But we also need to handle -q -> ERROR
    // clap-verbosity-flag doesn't give us a way to distinguish between default and -q
    // So we need to check the quiet flag directly
    if verbosity.is_silent() {
        log::LevelFilter::Error // -q -> ERROR
    } else {
        adjusted_level
    }
}

fn main() {
    let cli = Cli::parse();

    init_color_config(cli.global.no_color);

    // If user didn't pass -v/-q and RUST_LOG is set, honor the env var.
    let use_env = !cli.global.verbosity.is_present() && std::env::var_os("RUST_LOG").is_some();

    let mut logger = if use_env {
        Builder::from_env(Env::default())
    } else {
        let level_filter = get_log_level_from_verbosity(cli.global.verbosity.clone());

        let mut b = Builder::new();
        b.filter_level(level_filter);
        b
    };

    logger
        .format(|buf, record| {
            let level_str = match record.level() {
                Level::Error => colors::error_level("ERROR"),
                Level::Warn => colors::warning_level("WARN"),
                Level::Info => maybe_color_stderr("INFO", |s| s.green()),
                Level::Debug => maybe_color_stderr("DEBUG", |s| s.blue()),
                Level::Trace => maybe_color_stderr("TRACE", |s| s.magenta()),
            };
            writeln!(buf, "[{}] {}", level_str, record.args())
        })
        .init();

    match cli.command {
        Some(Commands::Eval(eval_cmd)) => {
            info!(
                "{} Evaluation: {} | arch: {} | threshold: {} | batch size: {}",
                symbols::evaluation_start(),
                eval_cmd.dataset.annotations,
                eval_cmd.model.arch.as_str(),
                eval_cmd.threshold,
                eval_cmd.dataset.batch_size
            );

            let config = EvalConfig::from_args(cli.global.clone(), eval_cmd);
            if let Err(e) = run_eval(config) {
                error!("{} Evaluation failed: {e}", symbols::operation_failed());
                std::process::exit(1);
            }
        }
        Some(Commands::Infer(infer_cmd)) => {
            info!(
                "{} Batch inference: {} | arch: {} | batch size: {}",
                symbols::inference_start(),
                infer_cmd.dataset.annotations,
                infer_cmd.model.arch.as_str(),
                infer_cmd.dataset.batch_size
            );

            let config = InferConfig::from_args(cli.global.clone(), infer_cmd);
            if let Err(e) = run_infer(config) {
                error!("{} Batch inference failed: {e}", symbols::operation_failed());
                std::process::exit(1);
            }
        }
        Some(Commands::Visualize(viz_cmd)) => {
            info!(
                "{} Overlay rendering: {} | arch: {} | batches: {}",
                symbols::visualization_start(),
                viz_cmd.dataset.annotations,
                viz_cmd.model.arch.as_str(),
                viz_cmd.num_batches
            );

            let config = VisualizeConfig::from_args(cli.global.clone(), viz_cmd);
            if let Err(e) = run_visualize(config) {
                error!("{} Overlay rendering failed: {e}", symbols::operation_failed());
                std::process::exit(1);
            }
        }
        Some(Commands::Version) => {
            println!("plume v{}", env!("CARGO_PKG_VERSION"));
            println!("Architectures: resnet50_relu, resnet50_batch_norm2d_swish_dropout");
            println!("Repository: {}", env!("CARGO_PKG_REPOSITORY"));
        }
        None => {
            // Show help if no command specified
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().unwrap();
        }
    }
}
