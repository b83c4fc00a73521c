use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod container;
mod context;
mod engine;
mod error;
mod executor;
mod models;
mod provision;
mod stream;

use config::{Config, LogFormat};
use engine::{DockerEngine, EngineClient};
use executor::Orchestrator;
use models::Outcome;

fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.log_format);
    info!(
        "🚀 Provisioning {} on network {} ({}) from {}",
        config.container_name, config.network_name, config.subnet, config.image
    );

    match run(config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<ExitCode> {
    let docker = DockerEngine::connect(&config).await?;
    match docker.version().await {
        Ok(version) => info!("🐳 {}", version),
        Err(e) => warn!("Could not read engine version: {}", e),
    }

    let engine: Arc<dyn EngineClient> = Arc::new(docker);
    let orchestrator = Orchestrator::new(engine, config);

    let mut stdout = tokio::io::stdout();
    let outcome = orchestrator.run(&mut stdout).await?;

    match outcome {
        Outcome::Exited(exit) => {
            info!("Container exited with status {}", exit.status_code);
            if let Some(message) = exit.message {
                info!("Engine message: {}", message);
            }
            Ok(ExitCode::SUCCESS)
        }
        Outcome::TimedOutWithLogs(logs) => {
            stdout.write_all(&logs).await?;
            stdout.flush().await?;
            Ok(ExitCode::SUCCESS)
        }
        Outcome::WatchError(cause) => Err(cause.into()),
    }
}
