pub mod docker;
#[cfg(test)]
pub mod mock;

pub use docker::DockerEngine;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use tokio::sync::oneshot;

use crate::error::{ProvisionError, ProvisionResult};
use crate::models::{ContainerId, ContainerSpec, ExitStatus, ImageRecord, NetworkId, NetworkSpec};

pub type ByteStream = Pin<Box<dyn Stream<Item = ProvisionResult<Bytes>> + Send>>;

/// Pending wait on a container. Exactly one of the two receivers resolves.
pub struct WaitHandle {
    pub status: oneshot::Receiver<ExitStatus>,
    pub error: oneshot::Receiver<ProvisionError>,
}

/// The container engine operations a run consumes.
///
/// Identifiers are engine-owned; implementations never invent them.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Locally cached images. No filters are applied.
    async fn list_images(&self) -> ProvisionResult<Vec<ImageRecord>>;

    /// Pulls `tag` from the default registry, yielding progress as JSON lines.
    fn pull_image(&self, tag: &str) -> ByteStream;

    async fn create_network(&self, spec: &NetworkSpec) -> ProvisionResult<NetworkId>;

    async fn create_container(&self, spec: &ContainerSpec) -> ProvisionResult<ContainerId>;

    /// Binds a created container to a network, with no endpoint configuration.
    async fn connect_network(
        &self,
        network: &NetworkId,
        container: &ContainerId,
    ) -> ProvisionResult<()>;

    async fn start_container(&self, container: &ContainerId) -> ProvisionResult<()>;

    /// Issues a wait for the container to stop running. The request is not
    /// cancelled if the caller drops the handle.
    fn wait_container(&self, container: &ContainerId) -> WaitHandle;

    /// Accumulated stdout of the container, read once without following.
    fn container_logs(&self, container: &ContainerId) -> ByteStream;
}
