use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

use crate::error::{ProvisionError, ProvisionResult};

/// Deadline handle threaded through every stage of a run.
///
/// The root context carries the overall run deadline, if any. Stages that
/// need a tighter bound derive a child with [`RunContext::with_timeout`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunContext {
    deadline: Option<Instant>,
}

impl RunContext {
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline_in(budget: Option<Duration>) -> Self {
        match budget {
            Some(d) => Self {
                deadline: Some(Instant::now() + d),
            },
            None => Self::background(),
        }
    }

    /// Child context whose deadline is the earlier of the parent's and `now + budget`.
    pub fn with_timeout(&self, budget: Duration) -> Self {
        let sub = Instant::now() + budget;
        let deadline = match self.deadline {
            Some(parent) if parent < sub => parent,
            _ => sub,
        };
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Runs `fut` under this context's deadline. Expiry surfaces as
    /// [`ProvisionError::Timeout`] naming `stage`.
    pub async fn bound<T, F>(&self, stage: &'static str, fut: F) -> ProvisionResult<T>
    where
        F: Future<Output = ProvisionResult<T>>,
    {
        let Some(deadline) = self.deadline else {
            return fut.await;
        };

        let started = Instant::now();
        match timeout_at(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProvisionError::Timeout {
                stage,
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
        }
    }
}
