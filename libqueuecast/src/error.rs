//! Error types for Queuecast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueuecastError>;

#[derive(Error, Debug)]
pub enum QueuecastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

impl QueuecastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            QueuecastError::Platform(PlatformError::Authentication(_)) => 2,
            QueuecastError::Platform(_) => 1,
            QueuecastError::Config(_) => 1,
            QueuecastError::Queue(_) => 1,
            QueuecastError::Image(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A credential is unset or still holds its placeholder value.
    #[error("{name} is not set. {hint}")]
    MissingCredential { name: String, hint: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to read pending store {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to rewrite pending store {path}: {source}")]
    Rewrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append to completed log {path}: {source}")]
    Append {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Image file not found: {0}")]
    NotFound(String),

    #[error("Failed to read image {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to download image: {0}")]
    Download(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Media upload failed: {0}")]
    Upload(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),
}
