// Error taxonomy shared by the generator and the packer
use thiserror::Error;

/// Failure reported by a remote transport before classification.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Connection, DNS, TLS or timeout failure; no HTTP status was received.
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// The service answered 2xx but the payload could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Transient failures are worth retrying: network trouble, rate limits
    /// and server-side 5xx answers.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Network(_) => true,
            TransportError::Status { code, .. } => *code == 429 || (500..=599).contains(code),
            TransportError::Malformed(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum AiconError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("remote service unavailable after {attempts} attempt(s): {source}")]
    RemoteUnavailable {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("remote request failed: {0}")]
    RemoteRequest(#[from] TransportError),

    #[error("provisioning failed: {0}")]
    Provisioning(String),

    #[error("bundling failed with exit code {code}: {stderr}")]
    Bundling { code: i32, stderr: String },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl AiconError {
    /// Short class label used in status strings.
    pub fn kind(&self) -> &'static str {
        match self {
            AiconError::Configuration(_) => "configuration",
            AiconError::RemoteUnavailable { .. } => "remote unavailable",
            AiconError::RemoteRequest(_) => "remote request",
            AiconError::Provisioning(_) => "provisioning",
            AiconError::Bundling { .. } => "bundling",
            AiconError::Validation(_) => "validation",
            AiconError::Io(_) => "io",
            AiconError::Image(_) => "image",
        }
    }
}

pub type Result<T> = std::result::Result<T, AiconError>;
