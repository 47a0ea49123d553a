use clap::Parser;
use delfi_detector::cli::{Cli, Commands, DetectorConfig, TestTriggerArgs};
use delfi_detector::diagnostics;
use delfi_detector::engine::Detector;
use delfi_detector::errors::{DetectorError, InferenceError};
use delfi_types::version::VERSION;
use std::process::ExitCode;
use task_manager::TaskManager;

const EXIT_FATAL: u8 = 1;
const EXIT_UNREACHABLE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(config) => run(config).await,
        Commands::TestTrigger(args) => test_trigger(args).await,
        Commands::Version => {
            println!("delfi-detector {}", *VERSION);
            ExitCode::SUCCESS
        }
    }
}

/// Logs go to stderr so `test-trigger` can print clean JSON on stdout.
fn init_tracing(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(log_level))
        .with_writer(std::io::stderr)
        .init();
}

async fn run(config: DetectorConfig) -> ExitCode {
    init_tracing(&config.log_level);
    let detector = match Detector::new(config) {
        Ok(detector) => detector,
        Err(error) => {
            log::error!("{error}");
            return ExitCode::from(EXIT_FATAL);
        }
    };
    if let Err(error) = detector.probe().await {
        log::error!("ring server not reachable at startup: {error}");
        return ExitCode::from(EXIT_UNREACHABLE);
    }
    let task_manager = TaskManager::new();
    task_manager.spawn_task_loop("detector", |guard| detector.run(guard));
    task_manager.wait().await;
    log::info!("shutdown complete");
    ExitCode::SUCCESS
}

async fn test_trigger(args: TestTriggerArgs) -> ExitCode {
    init_tracing(&args.config.log_level);
    match diagnostics::run(&args).await {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(error) => {
                log::error!("could not render report: {error}");
                ExitCode::from(EXIT_FATAL)
            }
        },
        Err(error) => {
            log::error!("{error}");
            match error {
                DetectorError::Inference(InferenceError::Unreachable { .. }) => {
                    ExitCode::from(EXIT_UNREACHABLE)
                }
                _ => ExitCode::from(EXIT_FATAL),
            }
        }
    }
}
