//! In-memory engine for tests. Records every call in order and enforces the
//! same rejections a real daemon would (duplicate names, unknown ids, empty
//! image references).

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use super::{ByteStream, EngineClient, WaitHandle};
use crate::error::{ProvisionError, ProvisionResult};
use crate::models::{ContainerId, ContainerSpec, ExitStatus, ImageRecord, NetworkId, NetworkSpec};

/// How a container behaves once waited on.
#[derive(Debug, Clone)]
pub enum WaitScript {
    ExitAfter(Duration, i64),
    NeverExit,
    Fail(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListImages,
    PullImage(String),
    CreateNetwork(String),
    CreateContainer(String),
    ConnectNetwork(String, String),
    StartContainer(String),
    WaitContainer(String),
    ContainerLogs(String),
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<Call>,
    images: Vec<ImageRecord>,
    fail_listing: bool,
    fail_pull: bool,
    networks: HashMap<String, NetworkId>,
    containers: HashMap<String, ContainerSpec>,
    names: HashSet<String>,
    next_id: u64,
    logs_requested_at: Vec<Instant>,
}

#[derive(Clone)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
    wait: WaitScript,
    connect_delay: Option<Duration>,
    logs: Bytes,
    fail_logs: bool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            wait: WaitScript::ExitAfter(Duration::ZERO, 0),
            connect_delay: None,
            logs: Bytes::new(),
            fail_logs: false,
        }
    }

    pub fn with_image(self, tags: &[&str]) -> Self {
        self.state.lock().unwrap().images.push(ImageRecord {
            tags: tags.iter().map(|t| t.to_string()).collect(),
        });
        self
    }

    pub fn failing_listing(self) -> Self {
        self.state.lock().unwrap().fail_listing = true;
        self
    }

    pub fn failing_pull(self) -> Self {
        self.state.lock().unwrap().fail_pull = true;
        self
    }

    pub fn with_wait(mut self, wait: WaitScript) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    pub fn with_logs(mut self, logs: &'static [u8]) -> Self {
        self.logs = Bytes::from_static(logs);
        self
    }

    pub fn failing_logs(mut self) -> Self {
        self.fail_logs = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    pub fn logs_requested_at(&self) -> Vec<Instant> {
        self.state.lock().unwrap().logs_requested_at.clone()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn known_container(&self, container: &ContainerId) -> ProvisionResult<()> {
        if self
            .state
            .lock()
            .unwrap()
            .containers
            .contains_key(container.as_str())
        {
            Ok(())
        } else {
            Err(ProvisionError::InvalidSpec(format!(
                "No such container: {}",
                container
            )))
        }
    }
}

#[async_trait]
impl EngineClient for MockEngine {
    async fn list_images(&self) -> ProvisionResult<Vec<ImageRecord>> {
        self.record(Call::ListImages);
        let state = self.state.lock().unwrap();
        if state.fail_listing {
            return Err(ProvisionError::EngineUnreachable(
                "permission denied while listing images".to_string(),
            ));
        }
        Ok(state.images.clone())
    }

    fn pull_image(&self, tag: &str) -> ByteStream {
        self.record(Call::PullImage(tag.to_string()));
        let mut state = self.state.lock().unwrap();

        if state.fail_pull {
            return Box::pin(stream::iter(vec![
                Ok(Bytes::from_static(b"{\"status\":\"Pulling from library\"}\n")),
                Err(ProvisionError::InvalidSpec(format!(
                    "pull access denied for {}",
                    tag
                ))),
            ]));
        }

        state.images.push(ImageRecord {
            tags: vec![tag.to_string()],
        });
        let status = format!("{{\"status\":\"Status: Downloaded newer image for {}\"}}\n", tag);
        Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"{\"status\":\"Pulling from library\"}\n")),
            Ok(Bytes::from(status)),
        ]))
    }

    async fn create_network(&self, spec: &NetworkSpec) -> ProvisionResult<NetworkId> {
        self.record(Call::CreateNetwork(spec.name.clone()));
        let mut state = self.state.lock().unwrap();

        if spec.check_duplicate && state.networks.contains_key(&spec.name) {
            return Err(ProvisionError::ResourceConflict(format!(
                "network with name {} already exists",
                spec.name
            )));
        }

        state.next_id += 1;
        let id = NetworkId::from(format!("net-{:04}", state.next_id));
        state.networks.insert(spec.name.clone(), id.clone());
        Ok(id)
    }

    async fn create_container(&self, spec: &ContainerSpec) -> ProvisionResult<ContainerId> {
        self.record(Call::CreateContainer(spec.name.clone()));
        let mut state = self.state.lock().unwrap();

        if spec.image.is_empty() {
            return Err(ProvisionError::InvalidSpec("no image specified".to_string()));
        }
        if !state.names.insert(spec.name.clone()) {
            return Err(ProvisionError::ResourceConflict(format!(
                "container name {} is already in use",
                spec.name
            )));
        }

        state.next_id += 1;
        let id = format!("ctr-{:04}", state.next_id);
        state.containers.insert(id.clone(), spec.clone());
        Ok(ContainerId::from(id))
    }

    async fn connect_network(
        &self,
        network: &NetworkId,
        container: &ContainerId,
    ) -> ProvisionResult<()> {
        self.record(Call::ConnectNetwork(
            network.to_string(),
            container.to_string(),
        ));
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        self.known_container(container)
    }

    async fn start_container(&self, container: &ContainerId) -> ProvisionResult<()> {
        self.record(Call::StartContainer(container.to_string()));
        self.known_container(container)
    }

    fn wait_container(&self, container: &ContainerId) -> WaitHandle {
        self.record(Call::WaitContainer(container.to_string()));
        let (status_tx, status_rx) = oneshot::channel();
        let (error_tx, error_rx) = oneshot::channel();

        let script = match self.known_container(container) {
            Ok(()) => self.wait.clone(),
            Err(e) => WaitScript::Fail(e.to_string()),
        };

        tokio::spawn(async move {
            match script {
                WaitScript::ExitAfter(delay, status_code) => {
                    tokio::time::sleep(delay).await;
                    let _ = status_tx.send(ExitStatus {
                        status_code,
                        message: None,
                    });
                }
                WaitScript::NeverExit => {
                    // Keep both senders alive so neither branch resolves.
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    drop((status_tx, error_tx));
                }
                WaitScript::Fail(message) => {
                    let _ = error_tx.send(ProvisionError::Engine(message));
                }
            }
        });

        WaitHandle {
            status: status_rx,
            error: error_rx,
        }
    }

    fn container_logs(&self, container: &ContainerId) -> ByteStream {
        self.record(Call::ContainerLogs(container.to_string()));
        self.state
            .lock()
            .unwrap()
            .logs_requested_at
            .push(Instant::now());

        if self.fail_logs {
            return Box::pin(stream::iter(vec![Err(ProvisionError::Engine(
                "log driver unavailable".to_string(),
            ))]));
        }

        // Split in two chunks to exercise stream concatenation.
        let mid = self.logs.len() / 2;
        let chunks = vec![Ok(self.logs.slice(..mid)), Ok(self.logs.slice(mid..))];
        Box::pin(stream::iter(chunks))
    }
}
