use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::engine::{EngineClient, WaitHandle};
use crate::error::ProvisionResult;
use crate::models::{ContainerId, Outcome};
use crate::stream::collect_stream;

/// Races "container stopped" against a fixed budget.
///
/// On timeout the container is left running and its stdout so far is read
/// once. The pending wait is dropped, not cancelled.
pub struct CompletionWatcher {
    engine: Arc<dyn EngineClient>,
    timeout: Duration,
}

impl CompletionWatcher {
    pub fn new(engine: Arc<dyn EngineClient>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    /// Only a failed log read after the timeout is returned as `Err`.
    pub async fn watch(&self, container: &ContainerId) -> ProvisionResult<Outcome> {
        let WaitHandle { status, error } = self.engine.wait_container(container);
        debug!("Waiting up to {:?} for {} to stop", self.timeout, container);

        tokio::select! {
            Ok(cause) = error => {
                warn!("Wait on container {} failed: {}", container, cause);
                Ok(Outcome::WatchError(cause))
            }
            Ok(exit) = status => {
                info!("✓ Container {} exited with status {}", container, exit.status_code);
                Ok(Outcome::Exited(exit))
            }
            _ = tokio::time::sleep(self.timeout) => {
                info!("Container {} still running after {:?}, reading logs", container, self.timeout);
                let logs = collect_stream(self.engine.container_logs(container)).await?;
                Ok(Outcome::TimedOutWithLogs(logs))
            }
        }
    }
}
