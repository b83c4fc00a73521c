use chrono::Utc;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::container::{CompletionWatcher, ContainerLauncher};
use crate::context::RunContext;
use crate::engine::EngineClient;
use crate::error::{ProvisionError, ProvisionResult};
use crate::executor::report::{log_summary, RunReporter};
use crate::models::{ContainerId, NetworkId, Outcome, RunReport, RunStage};
use crate::provision::{ImageResolver, NetworkProvisioner};

/// Runs network → image → create → attach → start → watch, stopping at the
/// first failure. Nothing created along the way is removed.
pub struct Orchestrator {
    network: NetworkProvisioner,
    images: ImageResolver,
    launcher: ContainerLauncher,
    watcher: CompletionWatcher,
    config: Config,
    reporter: Option<RunReporter>,
}

/// What a run has produced so far.
#[derive(Debug)]
struct RunProgress {
    stage: RunStage,
    network_id: Option<NetworkId>,
    image: Option<String>,
    container_id: Option<ContainerId>,
}

impl RunProgress {
    fn new() -> Self {
        Self {
            stage: RunStage::Pending,
            network_id: None,
            image: None,
            container_id: None,
        }
    }

    fn advance(&mut self, next: RunStage) -> ProvisionResult<()> {
        if !self.stage.can_advance_to(next) {
            return Err(ProvisionError::InvalidSpec(format!(
                "illegal stage transition {:?} -> {:?}",
                self.stage, next
            )));
        }
        self.stage = next;
        Ok(())
    }

    /// Every live stage may end in any terminal one.
    fn finish(&mut self, terminal: RunStage) {
        debug_assert!(terminal.is_terminal() && !self.stage.is_terminal());
        self.stage = terminal;
    }
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn EngineClient>, config: Config) -> Self {
        let reporter = if config.enable_run_report {
            match RunReporter::new(&config.run_report_path) {
                Ok(reporter) => Some(reporter),
                Err(e) => {
                    error!("Failed to initialize run reporter: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            network: NetworkProvisioner::new(engine.clone()),
            images: ImageResolver::new(engine.clone()),
            launcher: ContainerLauncher::new(
                engine.clone(),
                config.command.clone(),
                config.attach_timeout(),
            ),
            watcher: CompletionWatcher::new(engine, config.watch_timeout()),
            config,
            reporter,
        }
    }

    /// Executes one run. Pull progress is written to `progress`.
    ///
    /// `Ok` carries the watch outcome, including `WatchError`; `Err` is the
    /// first stage failure.
    pub async fn run<W>(&self, progress: &mut W) -> ProvisionResult<Outcome>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let started_at = Utc::now();
        let mut state = RunProgress::new();

        let result = self.run_stages(&mut state, progress).await;

        let terminal = match &result {
            Ok(Outcome::Exited(_)) => RunStage::Completed,
            Ok(Outcome::TimedOutWithLogs(_)) => RunStage::TimedOut,
            Ok(Outcome::WatchError(_)) | Err(_) => RunStage::Failed,
        };
        if let Err(e) = &result {
            error!("Run failed after {:?}: {}", state.stage, e);
        }

        state.finish(terminal);

        let report = self.build_report(started_at, &state, &result);
        log_summary(&report);
        if let Some(ref reporter) = self.reporter {
            reporter.record(&report).await;
        }

        result
    }

    async fn run_stages<W>(
        &self,
        state: &mut RunProgress,
        progress: &mut W,
    ) -> ProvisionResult<Outcome>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let ctx = RunContext::with_deadline_in(self.config.run_timeout());
        debug!("Run deadline: {:?}", ctx.deadline());

        let network_id = self
            .network
            .provision(&ctx, &self.config.network_name, &self.config.subnet)
            .await?;
        state.network_id = Some(network_id.clone());
        state.advance(RunStage::NetworkReady)?;

        let image = self
            .images
            .resolve(&ctx, &self.config.image, progress)
            .await?;
        state.image = Some(image.clone());
        state.advance(RunStage::ImageReady)?;

        let container_id = self
            .launcher
            .launch(&ctx, &self.config.container_name, &image)
            .await?;
        state.container_id = Some(container_id.clone());
        state.advance(RunStage::ContainerCreated)?;

        self.launcher.attach(&ctx, &container_id, &network_id).await?;
        state.advance(RunStage::ContainerAttached)?;

        self.launcher.start(&ctx, &container_id).await?;
        state.advance(RunStage::ContainerStarted)?;

        let outcome = self.watcher.watch(&container_id).await?;
        info!("Run concluded: {}", outcome.kind());
        Ok(outcome)
    }

    fn build_report(
        &self,
        started_at: chrono::DateTime<Utc>,
        state: &RunProgress,
        result: &ProvisionResult<Outcome>,
    ) -> RunReport {
        let (exit_code, log_bytes) = match result {
            Ok(Outcome::Exited(exit)) => (Some(exit.status_code), None),
            Ok(Outcome::TimedOutWithLogs(logs)) => (None, Some(logs.len())),
            _ => (None, None),
        };
        let failure = match result {
            Ok(Outcome::WatchError(e)) | Err(e) => Some(e),
            Ok(_) => None,
        };

        RunReport {
            started_at,
            finished_at: Utc::now(),
            image: state
                .image
                .clone()
                .unwrap_or_else(|| self.config.image.clone()),
            network_id: state.network_id.as_ref().map(|id| id.to_string()),
            container_id: state.container_id.as_ref().map(|id| id.to_string()),
            stage: state.stage,
            outcome: result.as_ref().ok().map(|o| o.kind().to_string()),
            exit_code,
            log_bytes,
            error_kind: failure.map(|e| e.kind().to_string()),
            error: failure.map(|e| e.to_string()),
        }
    }
}
