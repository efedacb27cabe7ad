//! Run coordination
//!
//! One call to [`Coordinator::run_once`] takes the head of the pending store
//! through classification, enrichment and publishing, then advances the
//! queue if any platform accepted the post.

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{QueueError, QueuecastError, Result};
use crate::intent::classify;
use crate::media::ImageProcessor;
use crate::metadata::MetadataFetcher;
use crate::platforms::{bluesky::BlueskyClient, mastodon::MastodonClient, Publisher};
use crate::queue::QueueStore;
use crate::types::{
    ImageBuffer, PageMetadata, PostIntent, PublishOutcome, QueueUpdate, RunReport,
};

/// Processes one queue entry per run against a fixed set of publishers
pub struct Coordinator {
    queue: QueueStore,
    fetcher: MetadataFetcher,
    images: ImageProcessor,
    publishers: Vec<Box<dyn Publisher>>,
}

impl Coordinator {
    pub fn new(
        queue: QueueStore,
        fetcher: MetadataFetcher,
        images: ImageProcessor,
        publishers: Vec<Box<dyn Publisher>>,
    ) -> Self {
        Self {
            queue,
            fetcher,
            images,
            publishers,
        }
    }

    /// Build a coordinator publishing to Bluesky and Mastodon
    ///
    /// No network activity happens here; sessions are established by
    /// [`Coordinator::run_once`].
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = config.http.build_client()?;

        let publishers: Vec<Box<dyn Publisher>> = vec![
            Box::new(BlueskyClient::from_config(client.clone(), &config.bluesky)),
            Box::new(MastodonClient::from_config(&config.mastodon)?),
        ];

        Ok(Self::new(
            QueueStore::from_config(&config.queue),
            MetadataFetcher::new(client.clone(), config.http.page_timeout()),
            ImageProcessor::new(
                client,
                config.queue.images_path(),
                config.http.image_timeout(),
            ),
            publishers,
        ))
    }

    /// Process the head of the pending store
    ///
    /// # Errors
    ///
    /// Fails without touching the queue when the pending store cannot be
    /// read, a local image cannot be loaded, or any publisher fails to
    /// authenticate. Per-platform publish failures are reported in the
    /// returned [`RunReport`] instead.
    pub async fn run_once(&mut self) -> Result<RunReport> {
        let Some(entry) = self.queue.head()? else {
            info!("No content to post");
            return Ok(RunReport::Empty);
        };
        info!("Found content to post: {}", entry);

        let intent = classify(&entry);
        debug!("Classified entry as {}", intent.kind());

        let (metadata, image) = self.enrich(&intent).await?;

        for publisher in self.publishers.iter_mut() {
            publisher.authenticate().await?;
            info!("Authenticated with {}", publisher.name());
        }

        let mut outcomes = Vec::with_capacity(self.publishers.len());
        for publisher in &self.publishers {
            let outcome = match publisher
                .publish(&intent, metadata.as_ref(), image.as_ref())
                .await
            {
                Ok(reference) => {
                    info!("Posted to {}: {}", publisher.name(), reference);
                    PublishOutcome::succeeded(publisher.name(), reference)
                }
                Err(e) => {
                    warn!("Failed to post to {}: {}", publisher.name(), e);
                    PublishOutcome::failed(publisher.name(), e.to_string())
                }
            };
            outcomes.push(outcome);
        }

        if !outcomes.iter().any(|o| o.success) {
            error!("No platform accepted the post; leaving queue unchanged");
            return Ok(RunReport::Failed { entry, outcomes });
        }

        let queue_update = self.advance_queue(&entry, &outcomes);

        Ok(RunReport::Published {
            entry,
            outcomes,
            queue_update,
        })
    }

    /// Move a published entry out of the pending store, reporting which file is
    /// left inconsistent when that fails
    fn advance_queue(&self, entry: &str, outcomes: &[PublishOutcome]) -> QueueUpdate {
        let err = match self.queue.complete(entry) {
            Ok(()) => {
                info!("Moved entry to {}", self.queue.completed_path().display());
                return QueueUpdate::Moved;
            }
            Err(e) => e,
        };

        let posted: Vec<&str> = outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| o.platform.as_str())
            .collect();

        match err {
            QueuecastError::Queue(QueueError::Append { .. }) => {
                error!(
                    "Posted to {} and removed the entry from {}, but it is missing from {}: {}",
                    posted.join(", "),
                    self.queue.pending_path().display(),
                    self.queue.completed_path().display(),
                    err
                );
                QueueUpdate::NotLogged
            }
            _ => {
                error!(
                    "Posted to {} but could not rewrite {}; the entry will be posted again: {}",
                    posted.join(", "),
                    self.queue.pending_path().display(),
                    err
                );
                QueueUpdate::PendingUnchanged
            }
        }
    }

    /// Fetch link metadata and load whichever image the intent needs
    async fn enrich(
        &self,
        intent: &PostIntent,
    ) -> Result<(Option<PageMetadata>, Option<ImageBuffer>)> {
        match intent {
            PostIntent::Link { url, .. } => {
                let metadata = self.fetcher.fetch(url).await;
                debug!(
                    title = %metadata.title,
                    description = %metadata.description,
                    image = ?metadata.preview_image_url,
                    "Fetched page metadata"
                );

                let image = match &metadata.preview_image_url {
                    Some(image_url) => self.images.from_url(image_url).await,
                    None => None,
                };

                Ok((Some(metadata), image))
            }
            PostIntent::LocalImage { path, .. } => {
                let image = self.images.from_local(path).map_err(|e| {
                    error!("Cannot load local image {}: {}", path, e);
                    e
                })?;
                Ok((None, Some(image)))
            }
            PostIntent::Text { .. } => Ok((None, None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::MockPublisher;
    use std::time::Duration;
    use tempfile::TempDir;

    fn coordinator(dir: &TempDir, publishers: Vec<Box<dyn Publisher>>) -> Coordinator {
        let client = reqwest::Client::new();
        Coordinator::new(
            QueueStore::new(dir.path().join("topost.txt"), dir.path().join("posted.txt")),
            MetadataFetcher::new(client.clone(), Duration::from_secs(1)),
            ImageProcessor::new(client, dir.path().join("images"), Duration::from_secs(1)),
            publishers,
        )
    }

    #[tokio::test]
    async fn test_text_entry_published_everywhere() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("topost.txt"), "Hello world\nNext\n").unwrap();

        let a = MockPublisher::success("a");
        let b = MockPublisher::success("b");
        let (ha, hb) = (a.config(), b.config());

        let mut runner = coordinator(&dir, vec![Box::new(a), Box::new(b)]);
        let report = runner.run_once().await.unwrap();

        assert_eq!(report.successful_platforms(), vec!["a", "b"]);
        assert_eq!(ha.published()[0].intent.text(), "Hello world");
        assert_eq!(hb.auth_calls(), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("topost.txt")).unwrap(),
            "Next\n"
        );
    }

    #[tokio::test]
    async fn test_empty_queue_skips_sessions() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("topost.txt"), "").unwrap();

        let a = MockPublisher::success("a");
        let handle = a.config();

        let mut runner = coordinator(&dir, vec![Box::new(a)]);
        assert_eq!(runner.run_once().await.unwrap(), RunReport::Empty);
        assert_eq!(handle.auth_calls(), 0);
        assert!(!dir.path().join("posted.txt").exists());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_other() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("topost.txt"), "Hello\n").unwrap();

        let failing = MockPublisher::publish_failure("a", "boom");
        let ok = MockPublisher::success("b");
        let handle = ok.config();

        let mut runner = coordinator(&dir, vec![Box::new(failing), Box::new(ok)]);
        let report = runner.run_once().await.unwrap();

        assert_eq!(handle.publish_calls(), 1);
        match report {
            RunReport::Published {
                outcomes,
                queue_update,
                ..
            } => {
                assert_eq!(queue_update, QueueUpdate::Moved);
                assert!(!outcomes[0].success);
                assert!(outcomes[0].error.as_deref().unwrap().contains("boom"));
                assert!(outcomes[1].success);
            }
            other => panic!("Expected Published, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_completed_log_failure_reports_not_logged() {
        let dir = TempDir::new().unwrap();
        let pending = dir.path().join("topost.txt");
        std::fs::write(&pending, "Hello\nNext\n").unwrap();
        let completed = dir.path().join("posted.txt");
        std::fs::create_dir(&completed).unwrap();

        let mut runner = coordinator(&dir, vec![Box::new(MockPublisher::success("a"))]);
        let report = runner.run_once().await.unwrap();

        match report {
            RunReport::Published {
                outcomes,
                queue_update,
                ..
            } => {
                assert_eq!(queue_update, QueueUpdate::NotLogged);
                assert!(outcomes[0].success);
            }
            other => panic!("Expected Published, got {:?}", other),
        }
        assert_eq!(std::fs::read_to_string(&pending).unwrap(), "Next\n");
        assert!(completed.is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pending_rewrite_failure_reports_pending_unchanged() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let queue_dir = dir.path().join("queue");
        std::fs::create_dir(&queue_dir).unwrap();
        let pending = queue_dir.join("topost.txt");
        std::fs::write(&pending, "Hello\nNext\n").unwrap();
        let completed = dir.path().join("posted.txt");

        std::fs::set_permissions(&queue_dir, std::fs::Permissions::from_mode(0o555)).unwrap();
        // Privileged users can still write into a read-only directory
        let permissions_enforced = std::fs::write(queue_dir.join("check"), "").is_err();
        if !permissions_enforced {
            std::fs::set_permissions(&queue_dir, std::fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let client = reqwest::Client::new();
        let mut runner = Coordinator::new(
            QueueStore::new(&pending, &completed),
            MetadataFetcher::new(client.clone(), Duration::from_secs(1)),
            ImageProcessor::new(client, dir.path().join("images"), Duration::from_secs(1)),
            vec![Box::new(MockPublisher::success("a"))],
        );
        let report = runner.run_once().await;

        std::fs::set_permissions(&queue_dir, std::fs::Permissions::from_mode(0o755)).unwrap();

        match report.unwrap() {
            RunReport::Published { queue_update, .. } => {
                assert_eq!(queue_update, QueueUpdate::PendingUnchanged);
            }
            other => panic!("Expected Published, got {:?}", other),
        }
        assert_eq!(
            std::fs::read_to_string(&pending).unwrap(),
            "Hello\nNext\n"
        );
        assert!(!completed.exists());
    }
}
