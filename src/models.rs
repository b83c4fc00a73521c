use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Engine-assigned network handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkId(String);

/// Engine-assigned container handle. Only valid once returned by a create call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

macro_rules! opaque_id {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_id!(NetworkId);
opaque_id!(ContainerId);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    pub driver: String,
    pub subnet: String,
    pub internal: bool,
    pub attachable: bool,
    pub check_duplicate: bool,
}

impl NetworkSpec {
    /// Internal, attachable bridge with duplicate detection. IP range and
    /// gateway stay with the engine's default allocator.
    pub fn internal_bridge(name: &str, subnet: &str) -> Self {
        Self {
            name: name.to_string(),
            driver: "bridge".to_string(),
            subnet: subnet.to_string(),
            internal: true,
            attachable: true,
            check_duplicate: true,
        }
    }
}

/// A locally cached image as reported by the engine listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub tty: bool,
}

/// Terminal status reported by the engine once a container stops running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitStatus {
    pub status_code: i64,
    pub message: Option<String>,
}

#[derive(Debug)]
pub enum Outcome {
    Exited(ExitStatus),
    TimedOutWithLogs(Bytes),
    WatchError(crate::error::ProvisionError),
}

impl Outcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Exited(_) => "exited",
            Outcome::TimedOutWithLogs(_) => "timed_out_with_logs",
            Outcome::WatchError(_) => "watch_error",
        }
    }
}

/// Progress of a run through its stages. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Pending,
    NetworkReady,
    ImageReady,
    ContainerCreated,
    ContainerAttached,
    ContainerStarted,
    Completed,
    TimedOut,
    Failed,
}

impl RunStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStage::Completed | RunStage::TimedOut | RunStage::Failed)
    }

    /// Whether `next` is a legal transition from this stage. Any live stage
    /// may fail; otherwise only the immediate successor is allowed.
    pub fn can_advance_to(&self, next: RunStage) -> bool {
        use RunStage::*;

        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Failed)
                | (Pending, NetworkReady)
                | (NetworkReady, ImageReady)
                | (ImageReady, ContainerCreated)
                | (ContainerCreated, ContainerAttached)
                | (ContainerAttached, ContainerStarted)
                | (ContainerStarted, Completed)
                | (ContainerStarted, TimedOut)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub image: String,
    pub network_id: Option<String>,
    pub container_id: Option<String>,
    /// Last stage reached before the run finished.
    pub stage: RunStage,
    pub outcome: Option<String>,
    pub exit_code: Option<i64>,
    pub log_bytes: Option<usize>,
    pub error_kind: Option<String>,
    pub error: Option<String>,
}
