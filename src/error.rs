use bollard::errors::Error as DockerError;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// The engine could not be reached at all (socket missing, connection refused, I/O).
    #[error("Engine unreachable: {0}")]
    EngineUnreachable(String),

    /// A named resource already exists on the engine.
    #[error("Resource conflict: {0}")]
    ResourceConflict(String),

    /// The engine (or local validation) rejected an image, subnet, name or command.
    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    /// A time-bounded stage exceeded its deadline.
    #[error("{stage} timed out after {elapsed_ms}ms")]
    Timeout { stage: &'static str, elapsed_ms: u64 },

    /// Writing pulled or logged bytes to the operator output failed.
    #[error("Stream copy failed: {0}")]
    StreamCopyFailure(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProvisionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisionError::EngineUnreachable(_) => "engine_unreachable",
            ProvisionError::ResourceConflict(_) => "resource_conflict",
            ProvisionError::InvalidSpec(_) => "invalid_spec",
            ProvisionError::Timeout { .. } => "timeout",
            ProvisionError::StreamCopyFailure(_) => "stream_copy_failure",
            ProvisionError::Engine(_) => "engine",
            ProvisionError::Configuration(_) => "configuration",
        }
    }
}

impl From<DockerError> for ProvisionError {
    fn from(err: DockerError) -> Self {
        match err {
            DockerError::DockerResponseServerError {
                status_code,
                message,
            } => match status_code {
                409 => ProvisionError::ResourceConflict(message),
                400 | 404 => ProvisionError::InvalidSpec(message),
                _ => ProvisionError::Engine(format!("{} (HTTP {})", message, status_code)),
            },
            DockerError::IOError { err } => ProvisionError::EngineUnreachable(err.to_string()),
            DockerError::SocketNotFoundError(path) => {
                ProvisionError::EngineUnreachable(format!("socket not found: {}", path))
            }
            DockerError::RequestTimeoutError => {
                ProvisionError::EngineUnreachable("request to engine timed out".to_string())
            }
            other => ProvisionError::Engine(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ProvisionError {
    fn from(err: std::io::Error) -> Self {
        ProvisionError::StreamCopyFailure(err.to_string())
    }
}

pub type ProvisionResult<T> = Result<T, ProvisionError>;
