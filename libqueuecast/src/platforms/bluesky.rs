//! Bluesky platform implementation
//!
//! Talks to the account's PDS over AT Protocol XRPC: a session from
//! `com.atproto.server.createSession`, image blobs through
//! `com.atproto.repo.uploadBlob` and posts as `app.bsky.feed.post` records.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{normalize_base_url, BlueskyConfig};
use crate::error::{PlatformError, Result};
use crate::intent::absolute_url;
use crate::platforms::{truncate_chars, Publisher};
use crate::types::{ImageBuffer, PageMetadata, PostIntent};

/// Longest card title Bluesky accepts
pub const MAX_CARD_TITLE: usize = 300;

/// Longest card description Bluesky accepts
pub const MAX_CARD_DESCRIPTION: usize = 1000;

const POST_COLLECTION: &str = "app.bsky.feed.post";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Map Bluesky/AT Protocol errors to PlatformError
///
/// XRPC failures carry an HTTP status and an error name such as
/// `InvalidRequest` or `AuthenticationRequired`; both end up in the
/// message inspected here.
///
/// # Arguments
///
/// * `error` - The error message or error value
/// * `context` - The operation context (e.g., "authentication", "posting")
fn map_bluesky_error<E: std::fmt::Display>(error: E, context: &str) -> PlatformError {
    let error_msg = error.to_string();

    if error_msg.contains("401")
        || error_msg.contains("403")
        || error_msg.contains("AuthenticationRequired")
        || error_msg.contains("InvalidToken")
        || error_msg.contains("ExpiredToken")
    {
        return PlatformError::Authentication(format!(
            "Bluesky authentication failed during {}: {}. Please check your credentials and re-authenticate.",
            context, error_msg
        ));
    }

    if error_msg.contains("InvalidCredentials")
        || error_msg.contains("AccountNotFound")
        || (context == "authentication" && error_msg.contains("invalid"))
    {
        return PlatformError::Authentication(format!(
            "Invalid Bluesky credentials: {}. Please check your handle and app password.",
            error_msg
        ));
    }

    if error_msg.contains("400")
        || error_msg.contains("InvalidRequest")
        || error_msg.contains("InvalidRecord")
        || error_msg.contains("BlobTooLarge")
    {
        return PlatformError::Validation(format!(
            "Bluesky rejected the request during {}: {}. Check content format and length.",
            context, error_msg
        ));
    }

    if error_msg.contains("429")
        || error_msg.contains("RateLimitExceeded")
        || error_msg.contains("TooManyRequests")
    {
        return PlatformError::RateLimit(format!(
            "Bluesky rate limit exceeded during {}: {}",
            context, error_msg
        ));
    }

    if error_msg.contains("connection")
        || error_msg.contains("timeout")
        || error_msg.contains("timed out")
        || error_msg.contains("unreachable")
        || error_msg.contains("dns")
        || error_msg.contains("error sending request")
    {
        return PlatformError::Network(format!(
            "Network error while connecting to Bluesky PDS during {}: {}. Check your internet connection and PDS availability.",
            context, error_msg
        ));
    }

    PlatformError::Posting(format!(
        "Bluesky operation failed during {}: {}",
        context, error_msg
    ))
}

/// Authenticated session returned by `createSession`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
    handle: String,
}

#[derive(Debug, Deserialize)]
struct XrpcError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadBlobOutput {
    blob: Value,
}

#[derive(Debug, Deserialize)]
struct CreateRecordOutput {
    uri: String,
}

pub struct BlueskyClient {
    http: reqwest::Client,
    service_url: String,
    handle: String,
    app_password: SecretString,
    session: Option<Session>,
}

impl BlueskyClient {
    /// Create a new Bluesky client
    ///
    /// # Arguments
    ///
    /// * `http` - HTTP client used for XRPC calls
    /// * `service_url` - PDS base URL (e.g., "https://bsky.social")
    /// * `handle` - The Bluesky handle (e.g., "user.bsky.social")
    /// * `app_password` - The app password for authentication
    pub fn new(
        http: reqwest::Client,
        service_url: &str,
        handle: String,
        app_password: SecretString,
    ) -> Self {
        Self {
            http,
            service_url: normalize_base_url(service_url),
            handle,
            app_password,
            session: None,
        }
    }

    pub fn from_config(http: reqwest::Client, config: &BlueskyConfig) -> Self {
        Self::new(
            http,
            &config.service_url,
            config.handle.clone(),
            SecretString::from(config.password().to_string()),
        )
    }

    fn xrpc_url(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.service_url, method)
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| PlatformError::Authentication("Not authenticated".to_string()).into())
    }

    /// Create a session with Bluesky
    async fn create_session(&mut self) -> Result<()> {
        debug!("Creating Bluesky session for handle: {}", self.handle);

        let response = self
            .http
            .post(self.xrpc_url("com.atproto.server.createSession"))
            .timeout(REQUEST_TIMEOUT)
            .json(&json!({
                "identifier": self.handle,
                "password": self.app_password.expose_secret(),
            }))
            .send()
            .await
            .map_err(|e| map_bluesky_error(e, "authentication"))?;

        let session: Session = read_json(response, "authentication").await?;
        debug!("Bluesky session created for {} ({})", session.handle, session.did);
        self.session = Some(session);

        Ok(())
    }

    /// Upload a JPEG and return the blob reference to embed in a record
    ///
    /// Any failure after the session check is reported as
    /// `PlatformError::Upload`.
    async fn upload_blob(&self, image: &ImageBuffer) -> Result<Value> {
        let session = self.session()?;
        debug!("Uploading {} byte blob to Bluesky", image.len());

        let blob = self.send_blob(session, image).await.map_err(|e| {
            PlatformError::Upload(format!("Bluesky blob upload failed: {}", e))
        })?;
        Ok(blob)
    }

    async fn send_blob(&self, session: &Session, image: &ImageBuffer) -> Result<Value> {
        let response = self
            .http
            .post(self.xrpc_url("com.atproto.repo.uploadBlob"))
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&session.access_jwt)
            .header(reqwest::header::CONTENT_TYPE, ImageBuffer::MIME_TYPE)
            .body(image.as_bytes().to_vec())
            .send()
            .await
            .map_err(|e| map_bluesky_error(e, "blob upload"))?;

        let output: UploadBlobOutput = read_json(response, "blob upload").await?;
        Ok(output.blob)
    }

    /// Create an `app.bsky.feed.post` record and return its AT URI
    async fn create_post(&self, text: &str, embed: Option<Value>) -> Result<String> {
        let session = self.session()?;

        let mut record = json!({
            "$type": POST_COLLECTION,
            "text": text,
            "createdAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        if let Some(embed) = embed {
            record["embed"] = embed;
        }

        debug!("Posting to Bluesky: {} characters", text.chars().count());

        let response = self
            .http
            .post(self.xrpc_url("com.atproto.repo.createRecord"))
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&session.access_jwt)
            .json(&json!({
                "repo": session.did,
                "collection": POST_COLLECTION,
                "record": record,
            }))
            .send()
            .await
            .map_err(|e| map_bluesky_error(e, "posting"))?;

        let output: CreateRecordOutput = read_json(response, "posting").await?;
        debug!("Posted to Bluesky: {}", output.uri);

        Ok(output.uri)
    }

    /// Build the external card embed, with thumbnail when the image uploads
    async fn link_card(
        &self,
        url: &str,
        metadata: &PageMetadata,
        image: Option<&ImageBuffer>,
    ) -> Value {
        let mut external = json!({
            "uri": absolute_url(url),
            "title": truncate_chars(&metadata.title, MAX_CARD_TITLE),
            "description": truncate_chars(&metadata.description, MAX_CARD_DESCRIPTION),
        });

        if let Some(image) = image {
            match self.upload_blob(image).await {
                Ok(blob) => {
                    external["thumb"] = blob;
                    info!("Uploaded card thumbnail to Bluesky");
                }
                Err(e) => warn!("Failed to upload image to Bluesky, posting without it: {}", e),
            }
        }

        json!({
            "$type": "app.bsky.embed.external",
            "external": external,
        })
    }
}

/// Decode a successful XRPC response or map the XRPC error body
async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = match serde_json::from_str::<XrpcError>(&body) {
            Ok(XrpcError { error, message }) => format!(
                "{}: {}",
                error.unwrap_or_else(|| "UnknownError".to_string()),
                message.unwrap_or_default()
            ),
            Err(_) => body,
        };
        return Err(map_bluesky_error(format!("HTTP {} {}", status.as_u16(), detail), context).into());
    }

    response.json::<T>().await.map_err(|e| {
        PlatformError::Posting(format!(
            "Bluesky returned an unexpected response during {}: {}",
            context, e
        ))
        .into()
    })
}

#[async_trait]
impl Publisher for BlueskyClient {
    fn name(&self) -> &str {
        "bluesky"
    }

    async fn authenticate(&mut self) -> Result<()> {
        self.create_session().await
    }

    async fn publish(
        &self,
        intent: &PostIntent,
        metadata: Option<&PageMetadata>,
        image: Option<&ImageBuffer>,
    ) -> Result<String> {
        match intent {
            PostIntent::Link { url, comment } => match metadata {
                Some(metadata) => {
                    let card = self.link_card(url, metadata, image).await;
                    self.create_post(comment, Some(card)).await
                }
                None => self.create_post(comment, None).await,
            },
            PostIntent::LocalImage { path, caption } => {
                let image = image.ok_or_else(|| {
                    PlatformError::Validation(format!("No image data for {}", path))
                })?;
                let blob = self.upload_blob(image).await?;
                let embed = json!({
                    "$type": "app.bsky.embed.images",
                    "images": [{ "alt": "", "image": blob }],
                });
                self.create_post(caption, Some(embed)).await
            }
            PostIntent::Text { body } => self.create_post(body, None).await,
        }
    }
}
