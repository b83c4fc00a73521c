use async_trait::async_trait;
use bollard::errors::Error as DockerError;
use bollard::models::{
    ContainerWaitResponse, CreateImageInfo, Ipam, IpamConfig, Network, NetworkConnectRequest,
    NetworkCreateRequest,
};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, CreateImageOptionsBuilder, ListImagesOptionsBuilder,
    ListNetworksOptionsBuilder, LogsOptionsBuilder, StartContainerOptions,
    WaitContainerOptionsBuilder,
};
use bollard::service::ContainerCreateBody;
use bollard::Docker;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::{ByteStream, EngineClient, WaitHandle};
use crate::config::Config;
use crate::error::{ProvisionError, ProvisionResult};
use crate::models::{ContainerId, ContainerSpec, ExitStatus, ImageRecord, NetworkId, NetworkSpec};

/// [`EngineClient`] backed by a Docker-compatible daemon.
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connects, negotiates the API version and verifies the daemon answers.
    pub async fn connect(config: &Config) -> ProvisionResult<Self> {
        let docker = match config.docker_host.as_deref() {
            Some(host) if host.starts_with("unix://") => Docker::connect_with_unix(
                host.trim_start_matches("unix://"),
                config.engine_timeout_secs,
                bollard::API_DEFAULT_VERSION,
            ),
            Some(host) => Docker::connect_with_http(
                host,
                config.engine_timeout_secs,
                bollard::API_DEFAULT_VERSION,
            ),
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| ProvisionError::EngineUnreachable(e.to_string()))?;

        let docker = docker
            .negotiate_version()
            .await
            .map_err(|e| ProvisionError::EngineUnreachable(e.to_string()))?;

        match docker.ping().await {
            Ok(_) => info!("✓ Engine connection established"),
            Err(e) => {
                error!("✗ Engine connection failed: {}", e);
                return Err(ProvisionError::EngineUnreachable(e.to_string()));
            }
        }

        Ok(Self { docker })
    }

    pub async fn version(&self) -> ProvisionResult<String> {
        let version = self.docker.version().await?;
        Ok(format!("Docker {}", version.version.unwrap_or_default()))
    }

    async fn network_exists(&self, name: &str) -> ProvisionResult<bool> {
        let filters = HashMap::from([("name", vec![name])]);
        let options = ListNetworksOptionsBuilder::default()
            .filters(&filters)
            .build();
        let networks = self.docker.list_networks(Some(options)).await?;

        Ok(has_exact_name(&networks, name))
    }
}

#[async_trait]
impl EngineClient for DockerEngine {
    async fn list_images(&self) -> ProvisionResult<Vec<ImageRecord>> {
        let options = ListImagesOptionsBuilder::default().all(false).build();
        let images = self.docker.list_images(Some(options)).await?;

        Ok(images
            .into_iter()
            .map(|image| ImageRecord {
                tags: image.repo_tags,
            })
            .collect())
    }

    fn pull_image(&self, tag: &str) -> ByteStream {
        let options = CreateImageOptionsBuilder::default().from_image(tag).build();

        let progress = self
            .docker
            .create_image(Some(options), None, None)
            .map(|item| match item {
                Ok(info) => progress_line(&info),
                Err(e) => Err(ProvisionError::from(e)),
            });

        Box::pin(progress)
    }

    async fn create_network(&self, spec: &NetworkSpec) -> ProvisionResult<NetworkId> {
        // Newer daemons always reject duplicate names; older ones only do so
        // when asked, so check explicitly.
        if spec.check_duplicate && self.network_exists(&spec.name).await? {
            return Err(ProvisionError::ResourceConflict(format!(
                "network with name {} already exists",
                spec.name
            )));
        }

        let request = NetworkCreateRequest {
            name: spec.name.clone(),
            driver: Some(spec.driver.clone()),
            internal: Some(spec.internal),
            attachable: Some(spec.attachable),
            enable_ipv6: Some(false),
            ipam: Some(Ipam {
                driver: Some("default".to_string()),
                config: Some(vec![IpamConfig {
                    subnet: Some(spec.subnet.clone()),
                    ..Default::default()
                }]),
                options: None,
            }),
            ..Default::default()
        };

        debug!("Creating network {} ({})", spec.name, spec.subnet);
        let response = self.docker.create_network(request).await?;

        if !response.warning.is_empty() {
            warn!("Network creation warning: {}", response.warning);
        }

        Ok(NetworkId::from(response.id))
    }

    async fn create_container(&self, spec: &ContainerSpec) -> ProvisionResult<ContainerId> {
        let options = CreateContainerOptionsBuilder::default()
            .name(&spec.name)
            .build();

        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            tty: Some(spec.tty),
            ..Default::default()
        };

        debug!("Creating container: {}", spec.name);
        let response = self.docker.create_container(Some(options), body).await?;

        for warning in response.warnings {
            warn!("Container creation warning: {}", warning);
        }

        Ok(ContainerId::from(response.id))
    }

    async fn connect_network(
        &self,
        network: &NetworkId,
        container: &ContainerId,
    ) -> ProvisionResult<()> {
        let request = NetworkConnectRequest {
            container: Some(container.to_string()),
            ..Default::default()
        };

        self.docker
            .connect_network(network.as_str(), request)
            .await?;
        Ok(())
    }

    async fn start_container(&self, container: &ContainerId) -> ProvisionResult<()> {
        self.docker
            .start_container(container.as_str(), None::<StartContainerOptions>)
            .await?;
        Ok(())
    }

    fn wait_container(&self, container: &ContainerId) -> WaitHandle {
        let (status_tx, status_rx) = oneshot::channel();
        let (error_tx, error_rx) = oneshot::channel();

        let docker = self.docker.clone();
        let container_id = container.to_string();

        // Detached: if the caller stops listening the wait is left to settle on its own.
        tokio::spawn(async move {
            let options = WaitContainerOptionsBuilder::default()
                .condition("not-running")
                .build();
            let mut responses = Box::pin(docker.wait_container(&container_id, Some(options)));

            match wait_result(&container_id, responses.next().await) {
                Ok(status) => {
                    let _ = status_tx.send(status);
                }
                Err(e) => {
                    let _ = error_tx.send(e);
                }
            }
        });

        WaitHandle {
            status: status_rx,
            error: error_rx,
        }
    }

    fn container_logs(&self, container: &ContainerId) -> ByteStream {
        let options = LogsOptionsBuilder::default()
            .stdout(true)
            .follow(false)
            .build();

        let output = self
            .docker
            .logs(container.as_str(), Some(options))
            .map(|item| {
                item.map(|chunk| chunk.into_bytes())
                    .map_err(ProvisionError::from)
            });

        Box::pin(output)
    }
}

// The engine's name filter matches substrings
fn has_exact_name(networks: &[Network], name: &str) -> bool {
    networks.iter().any(|n| n.name.as_deref() == Some(name))
}

/// Re-serialises one pull progress item as a JSON line.
fn progress_line(info: &CreateImageInfo) -> ProvisionResult<Bytes> {
    let mut line = serde_json::to_vec(info).map_err(|e| ProvisionError::Engine(e.to_string()))?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

/// Classifies the first item of a wait stream.
fn wait_result(
    container_id: &str,
    item: Option<Result<ContainerWaitResponse, DockerError>>,
) -> ProvisionResult<ExitStatus> {
    match item {
        Some(Ok(response)) => Ok(ExitStatus {
            status_code: response.status_code,
            message: response.error.and_then(|e| e.message),
        }),
        // bollard reports a non-zero exit code as an error
        Some(Err(DockerError::DockerContainerWaitError { error, code })) => Ok(ExitStatus {
            status_code: code,
            message: (!error.is_empty()).then_some(error),
        }),
        Some(Err(e)) => Err(ProvisionError::from(e)),
        None => Err(ProvisionError::Engine(format!(
            "wait on {} ended without a status",
            container_id
        ))),
    }
}
