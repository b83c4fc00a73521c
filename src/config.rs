use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::LazyLock;
use std::time::Duration;
use validator::Validate;

use crate::error::{ProvisionError, ProvisionResult};

/// Names the engine accepts for networks and containers.
static RESOURCE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Engine endpoint; `None` uses the platform's local defaults.
    pub docker_host: Option<String>,
    #[validate(range(min = 1))]
    pub engine_timeout_secs: u64,

    // Workload settings
    #[validate(length(min = 1))]
    pub image: String,
    #[validate(regex(path = *RESOURCE_NAME))]
    pub network_name: String,
    #[validate(regex(path = *RESOURCE_NAME))]
    pub container_name: String,
    // Subnet syntax is checked by the engine, not here
    #[validate(length(min = 1))]
    pub subnet: String,
    #[validate(length(min = 1))]
    pub command: Vec<String>,

    // Time budgets (seconds)
    #[validate(range(min = 1))]
    pub attach_timeout: u64,
    #[validate(range(min = 1))]
    pub watch_timeout: u64,
    #[validate(range(min = 1))]
    pub run_timeout: Option<u64>,

    // Logging & reporting
    pub log_format: LogFormat,
    pub enable_run_report: bool,
    pub run_report_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docker_host: None,
            engine_timeout_secs: 120,

            image: "ubuntu:latest".to_string(),
            network_name: "testnet1".to_string(),
            container_name: "testhost1".to_string(),
            subnet: "10.10.10.0/24".to_string(),
            command: vec!["/bin/bash".to_string()],

            attach_timeout: 5,
            watch_timeout: 2,
            run_timeout: None,

            log_format: LogFormat::Text,
            enable_run_report: false,
            run_report_path: "./logs/runs.log".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> ProvisionResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup, then validates it.
    pub fn from_lookup<F>(lookup: F) -> ProvisionResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(host) = lookup("DOCKER_HOST") {
            config.docker_host = Some(host);
        }

        if let Some(timeout) = lookup("ENGINE_TIMEOUT_SECS") {
            config.engine_timeout_secs = parse_field("ENGINE_TIMEOUT_SECS", &timeout)?;
        }

        if let Some(image) = lookup("SANDBOX_IMAGE") {
            config.image = image;
        }

        if let Some(network) = lookup("SANDBOX_NETWORK_NAME") {
            config.network_name = network;
        }

        if let Some(container) = lookup("SANDBOX_CONTAINER_NAME") {
            config.container_name = container;
        }

        if let Some(subnet) = lookup("SANDBOX_SUBNET") {
            config.subnet = subnet;
        }

        if let Some(command) = lookup("SANDBOX_COMMAND") {
            config.command = parse_command(&command)?;
        }

        if let Some(attach) = lookup("ATTACH_TIMEOUT_SECS") {
            config.attach_timeout = parse_field("ATTACH_TIMEOUT_SECS", &attach)?;
        }

        if let Some(watch) = lookup("WATCH_TIMEOUT_SECS") {
            config.watch_timeout = parse_field("WATCH_TIMEOUT_SECS", &watch)?;
        }

        if let Some(run) = lookup("RUN_TIMEOUT_SECS") {
            config.run_timeout = Some(parse_field("RUN_TIMEOUT_SECS", &run)?);
        }

        if let Some(format) = lookup("LOG_FORMAT") {
            config.log_format = match format.to_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ProvisionError::Configuration(format!(
                        "Invalid log format: {}",
                        format
                    )))
                }
            };
        }

        if let Some(enabled) = lookup("ENABLE_RUN_REPORT") {
            config.enable_run_report = parse_field("ENABLE_RUN_REPORT", &enabled)?;
        }

        if let Some(path) = lookup("RUN_REPORT_PATH") {
            config.run_report_path = path;
        }

        config
            .validate()
            .map_err(|e| ProvisionError::Configuration(e.to_string()))?;

        Ok(config)
    }

    pub fn attach_timeout(&self) -> Duration {
        Duration::from_secs(self.attach_timeout)
    }

    pub fn watch_timeout(&self) -> Duration {
        Duration::from_secs(self.watch_timeout)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout.map(Duration::from_secs)
    }
}

/// Accepts a JSON array (`["sh", "-c", "echo tick"]`) or a whitespace-separated line.
fn parse_command(raw: &str) -> ProvisionResult<Vec<String>> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|e| ProvisionError::Configuration(format!("Invalid SANDBOX_COMMAND: {}", e)));
    }
    Ok(trimmed.split_whitespace().map(str::to_string).collect())
}

fn parse_field<T>(key: &str, raw: &str) -> ProvisionResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ProvisionError::Configuration(format!("Invalid {}: {}", key, e)))
}
