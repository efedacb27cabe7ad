//! Queuecast - queue-driven cross-posting to Bluesky and Mastodon
//!
//! This library reads one entry per run from a flat-file queue, enriches
//! links with page metadata and preview images, and publishes the result to
//! every configured platform.

pub mod config;
pub mod error;
pub mod intent;
pub mod logging;
pub mod media;
pub mod metadata;
pub mod platforms;
pub mod queue;
pub mod runner;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{QueuecastError, Result};
pub use intent::classify;
pub use queue::QueueStore;
pub use runner::Coordinator;
pub use types::{
    ImageBuffer, PageMetadata, PostIntent, PublishOutcome, QueueUpdate, RunReport,
};
