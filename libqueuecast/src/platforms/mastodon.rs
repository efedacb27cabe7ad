//! Mastodon platform implementation
//!
//! This module provides integration with Mastodon and other Fediverse platforms
//! using the megalodon library.

use async_trait::async_trait;
use megalodon::entities::UploadMedia;
use megalodon::megalodon::{PostStatusInputOptions, PostStatusOutput};
use megalodon::{Megalodon, SNS};
use tracing::{debug, info};

use crate::config::{normalize_base_url, MastodonConfig};
use crate::error::{PlatformError, Result};
use crate::platforms::Publisher;
use crate::types::{ImageBuffer, PageMetadata, PostIntent};

/// Mastodon platform client
///
/// Provides posting capabilities to Mastodon and other Fediverse platforms
/// that implement the Mastodon API.
pub struct MastodonClient {
    /// The megalodon client for API interactions
    client: Box<dyn Megalodon + Send + Sync>,

    /// The instance URL (e.g., "https://mastodon.social")
    instance_url: String,
}

impl MastodonClient {
    /// Create a new Mastodon client
    ///
    /// # Arguments
    ///
    /// * `instance_url` - The base URL of the Mastodon instance (e.g., "https://mastodon.social")
    /// * `access_token` - OAuth access token for authentication
    pub fn new(instance_url: String, access_token: String) -> Result<Self> {
        let instance_url = normalize_base_url(&instance_url);
        let client = megalodon::generator(
            SNS::Mastodon,
            instance_url.clone(),
            Some(access_token),
            None,
        )
        .map_err(|e| {
            PlatformError::Authentication(format!("Failed to create Mastodon client: {:?}", e))
        })?;

        Ok(Self {
            client,
            instance_url,
        })
    }

    /// Create a Mastodon client from configuration
    pub fn from_config(config: &MastodonConfig) -> Result<Self> {
        Self::new(config.instance_url.clone(), config.token().to_string())
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    /// Upload a JPEG as status media and return its media ID
    async fn upload_media(&self, image: &ImageBuffer) -> Result<String> {
        debug!("Uploading {} byte image to Mastodon", image.len());

        let reader = std::io::Cursor::new(image.as_bytes().to_vec());
        let response = self
            .client
            .upload_media_reader(Box::new(reader), None)
            .await
            .map_err(|e| {
                PlatformError::Upload(format!(
                    "Mastodon media upload failed: {}",
                    map_megalodon_error(e, "upload media")
                ))
            })?;

        let media_id = match response.json {
            UploadMedia::Attachment(attachment) => attachment.id,
            UploadMedia::AsyncAttachment(attachment) => attachment.id,
        };
        info!("Uploaded image to Mastodon as media {}", media_id);

        Ok(media_id)
    }

    /// Post a status, optionally with attached media, and return its URL
    async fn post_status(&self, text: String, media_ids: Vec<String>) -> Result<String> {
        let options = if media_ids.is_empty() {
            None
        } else {
            Some(PostStatusInputOptions {
                media_ids: Some(media_ids),
                ..Default::default()
            })
        };

        debug!("Posting to Mastodon: {} characters", text.chars().count());

        let response = self
            .client
            .post_status(text, options.as_ref())
            .await
            .map_err(|e| map_megalodon_error(e, "post status"))?;

        // PostStatusOutput is an enum, we need to match on it
        let reference = match response.json {
            PostStatusOutput::Status(status) => status.url.unwrap_or(status.uri),
            PostStatusOutput::ScheduledStatus(scheduled) => scheduled.id,
        };

        Ok(reference)
    }
}

/// Status text for a link post: the comment, a blank line, then the URL
///
/// Mastodon has no card embed in its posting API; the instance builds the
/// preview from the URL itself.
pub fn link_status_text(comment: &str, url: &str) -> String {
    if comment.is_empty() {
        url.to_string()
    } else {
        format!("{}\n\n{}", comment, url)
    }
}

#[async_trait]
impl Publisher for MastodonClient {
    fn name(&self) -> &str {
        "mastodon"
    }

    async fn authenticate(&mut self) -> Result<()> {
        // Verify credentials by calling the verify_credentials endpoint
        self.client
            .verify_account_credentials()
            .await
            .map_err(|e| map_megalodon_error(e, "authenticate"))?;

        Ok(())
    }

    async fn publish(
        &self,
        intent: &PostIntent,
        _metadata: Option<&PageMetadata>,
        image: Option<&ImageBuffer>,
    ) -> Result<String> {
        match intent {
            PostIntent::Link { url, comment } => {
                let media_ids = match image {
                    Some(image) => vec![self.upload_media(image).await?],
                    None => Vec::new(),
                };
                self.post_status(link_status_text(comment, url), media_ids)
                    .await
            }
            PostIntent::LocalImage { path, caption } => {
                let image = image.ok_or_else(|| {
                    PlatformError::Validation(format!("No image data for {}", path))
                })?;
                let media_id = self.upload_media(image).await?;
                self.post_status(caption.clone(), vec![media_id]).await
            }
            PostIntent::Text { body } => self.post_status(body.clone(), Vec::new()).await,
        }
    }
}

/// Map megalodon errors to PlatformError
///
/// # Error Mapping
///
/// - HTTP 401/403 → `PlatformError::Authentication` (OAuth token issues)
/// - HTTP 413/415/422 → `PlatformError::Validation` (content or media rejected)
/// - HTTP 429 → `PlatformError::RateLimit` (rate limit exceeded)
/// - HTTP 5xx → `PlatformError::Network` (server errors)
/// - Parse errors → `PlatformError::Posting` (response parsing failures)
/// - URL errors → `PlatformError::Authentication` (invalid instance URL)
/// - Other errors → `PlatformError::Network` (network/connection issues)
fn map_megalodon_error(error: megalodon::error::Error, context: &str) -> PlatformError {
    classify_megalodon_message(&error.to_string(), context)
}

fn classify_megalodon_message(error_str: &str, context: &str) -> PlatformError {
    let error_lower = error_str.to_lowercase();

    match extract_http_status(error_str) {
        Some(401) | Some(403) => PlatformError::Authentication(format!(
            "Mastodon authentication failed ({}): {}. \
                    Suggestion: Verify your access token is valid and has 'write' scope.",
            context, error_str
        )),
        Some(413) | Some(415) | Some(422) => PlatformError::Validation(format!(
            "Mastodon validation failed ({}): {}. \
                    Suggestion: Check that your content meets the instance's requirements.",
            context, error_str
        )),
        Some(429) => PlatformError::RateLimit(format!(
            "Mastodon rate limit exceeded ({}): {}",
            context, error_str
        )),
        Some(500..=599) => PlatformError::Network(format!(
            "Mastodon server error ({}): {}. \
                    Suggestion: The instance may be experiencing issues.",
            context, error_str
        )),
        Some(_) => {
            PlatformError::Network(format!("Mastodon HTTP error ({}): {}", context, error_str))
        }
        None => {
            if error_lower.contains("unauthorized")
                || error_lower.contains("forbidden")
                || error_lower.contains("authentication")
                || error_lower.contains("token")
            {
                PlatformError::Authentication(format!(
                    "Mastodon authentication failed ({}): {}",
                    context, error_str
                ))
            } else if error_lower.contains("parse")
                || error_lower.contains("json")
                || error_lower.contains("deserialize")
            {
                PlatformError::Posting(format!(
                    "Mastodon response parse error ({}): {}. \
                        Suggestion: The instance may have returned an unexpected response format.",
                    context, error_str
                ))
            } else if error_lower.contains("url")
                || error_lower.contains("invalid") && error_lower.contains("instance")
            {
                PlatformError::Authentication(format!(
                    "Invalid Mastodon instance URL ({}): {}. \
                        Suggestion: It should be in the format 'https://mastodon.social'.",
                    context, error_str
                ))
            } else if error_lower.contains("rate limit")
                || error_lower.contains("too many requests")
            {
                PlatformError::RateLimit(format!(
                    "Mastodon rate limit exceeded ({}): {}",
                    context, error_str
                ))
            } else {
                PlatformError::Network(format!(
                    "Mastodon error ({}): {}. \
                        Suggestion: Check your network connection and instance availability.",
                    context, error_str
                ))
            }
        }
    }
}

/// Extract HTTP status code from error message
///
/// Looks for patterns like "HTTP 401", "status 403", "401:", etc.
fn extract_http_status(error_str: &str) -> Option<u16> {
    let prefixes = ["HTTP ", "status ", "code: ", "status_code: "];

    for prefix in &prefixes {
        if let Some(pos) = error_str.find(prefix) {
            let after_prefix = &error_str[pos + prefix.len()..];
            if let Some(code_str) = after_prefix.get(0..3) {
                if let Ok(code) = code_str.parse::<u16>() {
                    if (100..=599).contains(&code) {
                        return Some(code);
                    }
                }
            }
        }
    }

    // Standalone 3-digit codes followed by colon or space
    for (i, window) in error_str.as_bytes().windows(4).enumerate() {
        if window[0].is_ascii_digit()
            && window[1].is_ascii_digit()
            && window[2].is_ascii_digit()
            && (window[3] == b':' || window[3] == b' ')
        {
            if let Ok(code_str) = std::str::from_utf8(&window[0..3]) {
                if let Ok(code) = code_str.parse::<u16>() {
                    // Make sure it's not part of a larger number
                    if (100..=599).contains(&code)
                        && (i == 0 || !error_str.as_bytes()[i - 1].is_ascii_digit())
                    {
                        return Some(code);
                    }
                }
            }
        }
    }

    None
}
