//! Image loading and normalization
//!
//! Both platforms receive the same JPEG: RGB only, no side longer than
//! [`MAX_DIMENSION`], encoded at [`JPEG_QUALITY`].

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ImageError, Result};
use crate::types::ImageBuffer;

/// Longest allowed side of an uploaded image, in pixels
pub const MAX_DIMENSION: u32 = 1200;

pub const JPEG_QUALITY: u8 = 85;

/// Loads preview images from the web and post images from disk
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    client: reqwest::Client,
    images_dir: PathBuf,
    timeout: Duration,
}

impl ImageProcessor {
    pub fn new(client: reqwest::Client, images_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            client,
            images_dir: images_dir.into(),
            timeout,
        }
    }

    /// Download and normalize a remote image
    ///
    /// Returns `None` on any failure; a missing preview image only reduces
    /// the post to a card without thumbnail.
    pub async fn from_url(&self, url: &str) -> Option<ImageBuffer> {
        let result = async {
            let bytes = self.download(url).await?;
            normalize(&bytes)
        }
        .await;

        match result {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                warn!("Error downloading/processing image {}: {}", url, e);
                None
            }
        }
    }

    /// Load and normalize an image from the images directory
    ///
    /// # Errors
    ///
    /// Returns `ImageError::NotFound` if the file does not exist, or a read
    /// or decode error. Local image posts cannot degrade, so the caller
    /// must abort the run.
    pub fn from_local(&self, filename: &str) -> Result<ImageBuffer> {
        let path = self.images_dir.join(filename);

        let bytes = std::fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ImageError::NotFound(path.display().to_string())
            } else {
                ImageError::Io {
                    path: path.display().to_string(),
                    source,
                }
            }
        })?;

        debug!("Read {} bytes from {}", bytes.len(), path.display());
        normalize(&bytes)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ImageError::Download(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImageError::Download(e.to_string()))?;

        Ok(bytes.to_vec())
    }
}

/// Decode any supported image format and re-encode it as a bounded JPEG
///
/// Palette and alpha color modes are flattened to RGB. Images with a side
/// over [`MAX_DIMENSION`] are scaled down with Lanczos3, keeping the aspect
/// ratio; smaller images keep their size.
pub fn normalize(bytes: &[u8]) -> Result<ImageBuffer> {
    let img = image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))?;
    let (width, height) = img.dimensions();

    let img = if width > MAX_DIMENSION || height > MAX_DIMENSION {
        let resized = img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3);
        debug!(
            "Resized image from {}x{} to {}x{}",
            width,
            height,
            resized.width(),
            resized.height()
        );
        resized
    } else {
        img
    };

    let rgb = img.to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| ImageError::Encode(e.to_string()))?;

    Ok(ImageBuffer::new(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueuecastError;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 90, 128]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn decoded_dimensions(buffer: &ImageBuffer) -> (u32, u32) {
        assert_eq!(
            image::guess_format(buffer.as_bytes()).unwrap(),
            ImageFormat::Jpeg
        );
        image::load_from_memory(buffer.as_bytes()).unwrap().dimensions()
    }

    fn processor(dir: &Path) -> ImageProcessor {
        ImageProcessor::new(reqwest::Client::new(), dir, Duration::from_secs(5))
    }

    #[test]
    fn test_normalize_downscales_wide_image() {
        let buffer = normalize(&png_bytes(2400, 1600)).unwrap();
        assert_eq!(decoded_dimensions(&buffer), (1200, 800));
    }

    #[test]
    fn test_normalize_downscales_tall_image() {
        let buffer = normalize(&png_bytes(1000, 3000)).unwrap();
        assert_eq!(decoded_dimensions(&buffer), (400, 1200));
    }

    #[test]
    fn test_normalize_keeps_small_image_size() {
        let buffer = normalize(&png_bytes(300, 200)).unwrap();
        assert_eq!(decoded_dimensions(&buffer), (300, 200));
    }

    #[test]
    fn test_normalize_exact_limit_untouched() {
        let buffer = normalize(&png_bytes(1200, 1200)).unwrap();
        assert_eq!(decoded_dimensions(&buffer), (1200, 1200));
    }

    #[test]
    fn test_normalize_output_is_rgb() {
        let buffer = normalize(&png_bytes(10, 10)).unwrap();
        let decoded = image::load_from_memory(buffer.as_bytes()).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        let result = normalize(b"definitely not an image");
        assert!(matches!(
            result,
            Err(QueuecastError::Image(ImageError::Decode(_)))
        ));
    }

    #[test]
    fn test_from_local_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = processor(dir.path()).from_local("cat.jpg");

        match result {
            Err(QueuecastError::Image(ImageError::NotFound(path))) => {
                assert!(path.ends_with("cat.jpg"));
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_from_local_corrupt_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"\x89PNG truncated").unwrap();

        let result = processor(dir.path()).from_local("broken.png");
        assert!(matches!(
            result,
            Err(QueuecastError::Image(ImageError::Decode(_)))
        ));
    }

    #[test]
    fn test_from_local_reads_images_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("big.png"), png_bytes(1800, 900)).unwrap();

        let buffer = processor(dir.path()).from_local("big.png").unwrap();
        assert_eq!(decoded_dimensions(&buffer), (1200, 600));
    }

    #[tokio::test]
    async fn test_from_url_downloads_and_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(png_bytes(64, 32), "image/png"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let buffer = processor(dir.path())
            .from_url(&format!("{}/img.png", server.uri()))
            .await
            .unwrap();
        assert_eq!(decoded_dimensions(&buffer), (64, 32));
    }

    #[tokio::test]
    async fn test_from_url_server_error_degrades() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let result = processor(dir.path())
            .from_url(&format!("{}/img.png", server.uri()))
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_from_url_undecodable_body_degrades() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let result = processor(dir.path())
            .from_url(&format!("{}/not-an-image", server.uri()))
            .await;
        assert!(result.is_none());
    }
}
