//! Mock publisher for testing
//!
//! Simulates authentication and publishing outcomes and records every call,
//! so the coordinator can be exercised without credentials or network access.
//! All counters live behind `Arc<Mutex<_>>`; keep a clone of the
//! [`MockConfig`] to inspect them after the publisher has been boxed.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::{PlatformError, Result};
use crate::platforms::Publisher;
use crate::types::{ImageBuffer, PageMetadata, PostIntent};

/// One call to [`Publisher::publish`] as seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    pub intent: PostIntent,
    pub metadata: Option<PageMetadata>,
    pub image_len: Option<usize>,
}

/// Configuration for mock publisher behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform name (e.g., "mock-bluesky")
    pub name: String,

    pub auth_succeeds: bool,
    pub publish_succeeds: bool,

    /// Error message returned on authentication failure
    pub auth_error: Option<String>,

    /// Error message returned on publish failure
    pub publish_error: Option<String>,

    pub auth_call_count: Arc<Mutex<usize>>,
    pub publish_call_count: Arc<Mutex<usize>>,

    /// Successful publishes, in call order
    pub published: Arc<Mutex<Vec<PublishedRecord>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            auth_succeeds: true,
            publish_succeeds: true,
            auth_error: None,
            publish_error: None,
            auth_call_count: Arc::new(Mutex::new(0)),
            publish_call_count: Arc::new(Mutex::new(0)),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockConfig {
    pub fn auth_calls(&self) -> usize {
        *self.auth_call_count.lock().unwrap()
    }

    pub fn publish_calls(&self) -> usize {
        *self.publish_call_count.lock().unwrap()
    }

    pub fn published(&self) -> Vec<PublishedRecord> {
        self.published.lock().unwrap().clone()
    }
}

/// Mock publisher for testing
pub struct MockPublisher {
    config: MockConfig,
    authenticated: bool,
}

impl MockPublisher {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            authenticated: false,
        }
    }

    /// Create a mock publisher that always succeeds
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// Create a mock publisher that rejects its credentials
    pub fn auth_failure(name: &str, error: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            auth_succeeds: false,
            auth_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    /// Create a mock publisher that authenticates but fails every post
    pub fn publish_failure(name: &str, error: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            publish_succeeds: false,
            publish_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    /// Shared handle to the call counters and records
    pub fn config(&self) -> MockConfig {
        self.config.clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn authenticate(&mut self) -> Result<()> {
        *self.config.auth_call_count.lock().unwrap() += 1;

        if self.config.auth_succeeds {
            self.authenticated = true;
            Ok(())
        } else {
            let error_msg = self
                .config
                .auth_error
                .clone()
                .unwrap_or_else(|| "Mock authentication failed".to_string());
            Err(PlatformError::Authentication(error_msg).into())
        }
    }

    async fn publish(
        &self,
        intent: &PostIntent,
        metadata: Option<&PageMetadata>,
        image: Option<&ImageBuffer>,
    ) -> Result<String> {
        *self.config.publish_call_count.lock().unwrap() += 1;

        if !self.authenticated {
            return Err(PlatformError::Authentication("Not authenticated".to_string()).into());
        }

        if !self.config.publish_succeeds {
            let error_msg = self
                .config
                .publish_error
                .clone()
                .unwrap_or_else(|| "Mock publishing failed".to_string());
            return Err(PlatformError::Posting(error_msg).into());
        }

        self.config.published.lock().unwrap().push(PublishedRecord {
            intent: intent.clone(),
            metadata: metadata.cloned(),
            image_len: image.map(ImageBuffer::len),
        });

        Ok(format!("{}:mock-{}", self.config.name, uuid::Uuid::new_v4()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_intent() -> PostIntent {
        PostIntent::Text {
            body: "Hello".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_success() {
        let mut publisher = MockPublisher::success("test");
        let handle = publisher.config();
        assert_eq!(publisher.name(), "test");

        publisher.authenticate().await.unwrap();
        assert_eq!(handle.auth_calls(), 1);

        let image = ImageBuffer::new(vec![1, 2, 3]);
        let reference = publisher
            .publish(&text_intent(), None, Some(&image))
            .await
            .unwrap();
        assert!(reference.starts_with("test:mock-"));
        assert_eq!(handle.publish_calls(), 1);

        let published = handle.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].intent, text_intent());
        assert_eq!(published[0].image_len, Some(3));
        assert_eq!(published[0].metadata, None);
    }

    #[tokio::test]
    async fn test_mock_auth_failure() {
        let mut publisher = MockPublisher::auth_failure("test", "Invalid credentials");

        let err = publisher.authenticate().await.unwrap_err();
        assert!(err.to_string().contains("Invalid credentials"));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_mock_publish_failure() {
        let mut publisher = MockPublisher::publish_failure("test", "Server on fire");
        let handle = publisher.config();
        publisher.authenticate().await.unwrap();

        let err = publisher
            .publish(&text_intent(), None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Server on fire"));
        assert_eq!(handle.publish_calls(), 1);
        assert!(handle.published().is_empty());
    }

    #[tokio::test]
    async fn test_mock_requires_authentication() {
        let publisher = MockPublisher::success("test");

        let result = publisher.publish(&text_intent(), None, None).await;
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Not authenticated"));
    }
}
