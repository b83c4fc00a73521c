use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::context::RunContext;
use crate::engine::EngineClient;
use crate::error::{ProvisionError, ProvisionResult};
use crate::models::{ContainerId, ContainerSpec, NetworkId};

/// Creates, attaches and starts the workload container.
///
/// Calls must be made in that order for a given id: the engine rejects
/// attach or start on an id it never returned from create.
pub struct ContainerLauncher {
    engine: Arc<dyn EngineClient>,
    command: Vec<String>,
    attach_timeout: Duration,
}

impl ContainerLauncher {
    pub fn new(
        engine: Arc<dyn EngineClient>,
        command: Vec<String>,
        attach_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            command,
            attach_timeout,
        }
    }

    /// Bare launch: interactive tty, no limits, mounts or port bindings.
    pub async fn launch(
        &self,
        ctx: &RunContext,
        name: &str,
        image: &str,
    ) -> ProvisionResult<ContainerId> {
        if image.trim().is_empty() {
            return Err(ProvisionError::InvalidSpec(
                "refusing to create a container from an empty image reference".to_string(),
            ));
        }
        if self.command.is_empty() {
            return Err(ProvisionError::InvalidSpec(
                "container command must not be empty".to_string(),
            ));
        }

        let spec = ContainerSpec {
            name: name.to_string(),
            image: image.to_string(),
            command: self.command.clone(),
            tty: true,
        };

        debug!("Creating container {} from {}: {:?}", name, image, spec.command);
        let container_id = ctx
            .bound("container create", self.engine.create_container(&spec))
            .await?;

        info!("✓ Container created: {}", container_id);
        Ok(container_id)
    }

    /// Attaches under its own short deadline, tighter than the run's.
    pub async fn attach(
        &self,
        ctx: &RunContext,
        container: &ContainerId,
        network: &NetworkId,
    ) -> ProvisionResult<()> {
        let attach_ctx = ctx.with_timeout(self.attach_timeout);

        attach_ctx
            .bound(
                "network attach",
                self.engine.connect_network(network, container),
            )
            .await?;

        info!("✓ Container {} attached to network {}", container, network);
        Ok(())
    }

    pub async fn start(&self, ctx: &RunContext, container: &ContainerId) -> ProvisionResult<()> {
        ctx.bound("container start", self.engine.start_container(container))
            .await?;

        info!("✓ Container started: {}", container);
        Ok(())
    }
}
