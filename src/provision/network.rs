use std::sync::Arc;
use tracing::{debug, info};

use crate::context::RunContext;
use crate::engine::EngineClient;
use crate::error::{ProvisionError, ProvisionResult};
use crate::models::{NetworkId, NetworkSpec};

/// Creates the isolated bridge network a run attaches its container to.
///
/// The network outlives the process; nothing here removes it.
pub struct NetworkProvisioner {
    engine: Arc<dyn EngineClient>,
}

impl NetworkProvisioner {
    pub fn new(engine: Arc<dyn EngineClient>) -> Self {
        Self { engine }
    }

    pub async fn provision(
        &self,
        ctx: &RunContext,
        name: &str,
        subnet: &str,
    ) -> ProvisionResult<NetworkId> {
        if name.trim().is_empty() {
            return Err(ProvisionError::InvalidSpec(
                "network name must not be empty".to_string(),
            ));
        }

        let spec = NetworkSpec::internal_bridge(name, subnet);
        debug!("Creating network {} with subnet {}", spec.name, spec.subnet);

        let network_id = ctx
            .bound("network create", self.engine.create_network(&spec))
            .await?;

        info!("✓ Network created: {} ({})", name, network_id);
        Ok(network_id)
    }
}
