//! Platform abstraction and implementations
//!
//! Each platform turns a classified post intent, plus any fetched page
//! metadata and normalized image, into a post on that platform. The run
//! coordinator only talks to the [`Publisher`] trait.
//!
//! # Examples
//!
//! ```no_run
//! use libqueuecast::platforms::{mastodon::MastodonClient, Publisher};
//! use libqueuecast::PostIntent;
//!
//! # async fn example() -> libqueuecast::error::Result<()> {
//! let mut platform = MastodonClient::new(
//!     "https://mastodon.social".to_string(),
//!     "your-access-token".to_string(),
//! )?;
//!
//! platform.authenticate().await?;
//!
//! let intent = PostIntent::Text { body: "Hello, fediverse!".to_string() };
//! let url = platform.publish(&intent, None, None).await?;
//! println!("Posted: {}", url);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ImageBuffer, PageMetadata, PostIntent};

pub mod bluesky;
pub mod mastodon;

// Available for all builds (not just tests) to support integration tests
pub mod mock;

/// Unified publishing interface for social platforms
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Lowercase platform identifier (e.g., "bluesky", "mastodon")
    fn name(&self) -> &str;

    /// Establish a session with the platform
    ///
    /// Must be called once before [`Publisher::publish`].
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` if the credentials are
    /// rejected, or `PlatformError::Network` if the server is unreachable.
    async fn authenticate(&mut self) -> Result<()>;

    /// Create a post for `intent`
    ///
    /// `metadata` accompanies link intents when it could be fetched;
    /// `image` is the normalized preview image for links or the post
    /// image for local image intents.
    ///
    /// # Returns
    ///
    /// The reference of the created post (AT URI for Bluesky, status URL
    /// for Mastodon).
    async fn publish(
        &self,
        intent: &PostIntent,
        metadata: Option<&PageMetadata>,
        image: Option<&ImageBuffer>,
    ) -> Result<String>;
}

/// Truncate to at most `max` characters, respecting char boundaries
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
