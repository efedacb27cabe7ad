//! Core types for Queuecast

use serde::{Deserialize, Serialize};

/// Classified meaning of one queue line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostIntent {
    /// A web link with a comment, posted with a preview card
    Link { url: String, comment: String },
    /// An image from the local images directory with a caption
    LocalImage { path: String, caption: String },
    /// A plain text status
    Text { body: String },
}

impl PostIntent {
    /// The text that accompanies the post on every platform
    pub fn text(&self) -> &str {
        match self {
            PostIntent::Link { comment, .. } => comment,
            PostIntent::LocalImage { caption, .. } => caption,
            PostIntent::Text { body } => body,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PostIntent::Link { .. } => "link",
            PostIntent::LocalImage { .. } => "image",
            PostIntent::Text { .. } => "text",
        }
    }
}

/// Page information used to build a link preview card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    /// Absolute URL of the preview image, if the page advertises one
    pub preview_image_url: Option<String>,
}

impl PageMetadata {
    /// Metadata used when the page cannot be fetched or parsed
    pub fn fallback(url: &str) -> Self {
        Self {
            title: url.to_string(),
            description: String::new(),
            preview_image_url: None,
        }
    }
}

/// A normalized JPEG image ready for upload
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    bytes: Vec<u8>,
}

impl ImageBuffer {
    pub const MIME_TYPE: &'static str = "image/jpeg";

    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Result of publishing to a single platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    /// Platform name (e.g., "bluesky", "mastodon")
    pub platform: String,
    /// Whether the post was created
    pub success: bool,
    /// URI or URL of the created post (if successful)
    pub reference: Option<String>,
    /// Error message (if failed)
    pub error: Option<String>,
}

impl PublishOutcome {
    pub fn succeeded(platform: impl Into<String>, reference: String) -> Self {
        Self {
            platform: platform.into(),
            success: true,
            reference: Some(reference),
            error: None,
        }
    }

    pub fn failed(platform: impl Into<String>, error: String) -> Self {
        Self {
            platform: platform.into(),
            success: false,
            reference: None,
            error: Some(error),
        }
    }
}

/// State of the queue files after a published run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueUpdate {
    /// Entry removed from the pending store and logged as completed
    Moved,
    /// The pending store could not be rewritten; the entry stays first in line
    /// and will be posted again on the next run
    PendingUnchanged,
    /// The entry left the pending store but is missing from the completed log
    NotLogged,
}

/// What a single coordinator run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// The pending store had nothing to post
    Empty,
    /// At least one platform accepted the post
    Published {
        entry: String,
        outcomes: Vec<PublishOutcome>,
        queue_update: QueueUpdate,
    },
    /// Every platform rejected the post; the queue is untouched
    Failed {
        entry: String,
        outcomes: Vec<PublishOutcome>,
    },
}

impl RunReport {
    pub fn outcomes(&self) -> &[PublishOutcome] {
        match self {
            RunReport::Empty => &[],
            RunReport::Published { outcomes, .. } | RunReport::Failed { outcomes, .. } => outcomes,
        }
    }

    /// Names of the platforms that accepted the post
    pub fn successful_platforms(&self) -> Vec<&str> {
        self.outcomes()
            .iter()
            .filter(|o| o.success)
            .map(|o| o.platform.as_str())
            .collect()
    }
}
