use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuagmireError {
    #[error("configuration error: {0}")]
    Config(String),

    /// The response transport cannot flush partial output.
    #[error("transport does not support incremental flushing")]
    TransportUnsupported,

    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("invalid client IP: {0:?}")]
    InvalidIp(String),

    #[error("invalid store key: {0:?}")]
    InvalidKey(String),

    #[error("client disconnected")]
    ClientDisconnected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl QuagmireError {
    /// Whether the error ends a stream without anything being wrong.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, QuagmireError::ClientDisconnected)
    }
}

pub type QuagmireResult<T> = Result<T, QuagmireError>;
