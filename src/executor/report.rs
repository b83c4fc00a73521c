use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::models::RunReport;

/// Appends one JSON line per finished run.
pub struct RunReporter {
    log_file: Mutex<std::fs::File>,
}

impl RunReporter {
    pub fn new(log_path: &str) -> Result<Self, std::io::Error> {
        if let Some(parent) = Path::new(log_path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            log_file: Mutex::new(file),
        })
    }

    pub async fn record(&self, report: &RunReport) {
        match serde_json::to_string(report) {
            Ok(json) => {
                let mut file = self.log_file.lock().await;
                if let Err(e) = writeln!(file, "{}", json) {
                    error!("Failed to write run report: {}", e);
                }
                let _ = file.flush();
            }
            Err(e) => error!("Failed to serialize run report: {}", e),
        }
    }
}

/// Emits the one-line summary every run ends with.
pub fn log_summary(report: &RunReport) {
    let elapsed_ms = (report.finished_at - report.started_at).num_milliseconds();
    info!(
        stage = ?report.stage,
        outcome = report.outcome.as_deref().unwrap_or("none"),
        network_id = report.network_id.as_deref().unwrap_or("-"),
        container_id = report.container_id.as_deref().unwrap_or("-"),
        elapsed_ms,
        "Run finished"
    );
}
