//! Configuration management for Queuecast
//!
//! Platform credentials are read from the environment and validated once at
//! startup. Queue locations and HTTP settings have defaults that an optional
//! TOML file can override.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

pub const BLUESKY_HANDLE_VAR: &str = "BLUESKY_HANDLE";
pub const BLUESKY_PASSWORD_VAR: &str = "BLUESKY_PASSWORD";
pub const BLUESKY_SERVICE_VAR: &str = "BLUESKY_SERVICE_URL";
pub const MASTODON_INSTANCE_VAR: &str = "MASTODON_INSTANCE_URL";
pub const MASTODON_TOKEN_VAR: &str = "MASTODON_ACCESS_TOKEN";

const HANDLE_PLACEHOLDER: &str = "your-handle.bsky.social";
const PASSWORD_PLACEHOLDER: &str = "your-app-password";
const TOKEN_PLACEHOLDER: &str = "your-access-token";

pub const DEFAULT_BLUESKY_SERVICE: &str = "https://bsky.social";
pub const DEFAULT_MASTODON_INSTANCE: &str = "https://mastodon.social";

/// Browser-like user agent used for page and image fetches
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug)]
pub struct Config {
    pub bluesky: BlueskyConfig,
    pub mastodon: MastodonConfig,
    pub queue: QueueConfig,
    pub http: HttpConfig,
}

#[derive(Debug)]
pub struct BlueskyConfig {
    pub handle: String,
    pub app_password: SecretString,
    /// PDS base URL used for XRPC calls
    pub service_url: String,
}

#[derive(Debug)]
pub struct MastodonConfig {
    pub instance_url: String,
    pub access_token: SecretString,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueueConfig {
    pub pending_file: String,
    pub completed_file: String,
    pub images_dir: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            pending_file: "topost.txt".to_string(),
            completed_file: "posted.txt".to_string(),
            images_dir: "images".to_string(),
        }
    }
}

impl QueueConfig {
    pub fn pending_path(&self) -> PathBuf {
        expand_path(&self.pending_file)
    }

    pub fn completed_path(&self) -> PathBuf {
        expand_path(&self.completed_file)
    }

    pub fn images_path(&self) -> PathBuf {
        expand_path(&self.images_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub page_timeout_secs: u64,
    pub image_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            page_timeout_secs: 10,
            image_timeout_secs: 15,
        }
    }
}

impl HttpConfig {
    pub fn page_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.page_timeout_secs)
    }

    pub fn image_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.image_timeout_secs)
    }

    /// Build the HTTP client shared by page and image fetches
    ///
    /// Timeouts are applied per request, so the client itself has none.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "http".to_string(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(client)
    }
}

/// The non-secret part of the configuration, as stored in `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub queue: QueueConfig,
    pub http: HttpConfig,
}

impl FileConfig {
    /// Load the file configuration from the default location
    ///
    /// An explicitly requested file (`QUEUECAST_CONFIG`) must exist; the XDG
    /// default is optional and falls back to built-in defaults.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("QUEUECAST_CONFIG") {
            return Self::load_from_path(&expand_path(&path));
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load_from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load the file configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: FileConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }
}

impl Config {
    /// Load configuration from the default file location and the environment
    pub fn load() -> Result<Self> {
        Self::from_lookup(FileConfig::load()?, |name| std::env::var(name).ok())
    }

    /// Load configuration from a specific file and the environment
    pub fn load_from_path(path: &Path) -> Result<Self> {
        Self::from_lookup(FileConfig::load_from_path(path)?, |name| {
            std::env::var(name).ok()
        })
    }

    /// Build a configuration from file settings and a variable lookup
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingCredential` if a credential is unset,
    /// empty, or still holds its placeholder value.
    pub fn from_lookup<F>(file: FileConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let handle = require(
            &lookup,
            BLUESKY_HANDLE_VAR,
            HANDLE_PLACEHOLDER,
            bluesky_hint(),
        )?;
        let app_password = require(
            &lookup,
            BLUESKY_PASSWORD_VAR,
            PASSWORD_PLACEHOLDER,
            bluesky_hint(),
        )?;
        let access_token = require(
            &lookup,
            MASTODON_TOKEN_VAR,
            TOKEN_PLACEHOLDER,
            mastodon_hint(),
        )?;

        let service_url = lookup(BLUESKY_SERVICE_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BLUESKY_SERVICE.to_string());
        let instance_url = lookup(MASTODON_INSTANCE_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MASTODON_INSTANCE.to_string());

        if file.http.page_timeout_secs == 0 || file.http.image_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "http timeouts".to_string(),
                reason: "must be at least one second".to_string(),
            }
            .into());
        }

        Ok(Self {
            bluesky: BlueskyConfig {
                handle,
                app_password: SecretString::from(app_password),
                service_url: normalize_base_url(&service_url),
            },
            mastodon: MastodonConfig {
                instance_url: normalize_base_url(&instance_url),
                access_token: SecretString::from(access_token),
            },
            queue: file.queue,
            http: file.http,
        })
    }
}

impl BlueskyConfig {
    pub fn password(&self) -> &str {
        self.app_password.expose_secret()
    }
}

impl MastodonConfig {
    pub fn token(&self) -> &str {
        self.access_token.expose_secret()
    }
}

fn require<F>(lookup: &F, name: &str, placeholder: &str, hint: String) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() && value.trim() != placeholder => {
            Ok(value.trim().to_string())
        }
        _ => Err(ConfigError::MissingCredential {
            name: name.to_string(),
            hint,
        }
        .into()),
    }
}

fn bluesky_hint() -> String {
    format!(
        "Set your Bluesky credentials: export {}='yourname.bsky.social' and export {}='your-app-password'",
        BLUESKY_HANDLE_VAR, BLUESKY_PASSWORD_VAR
    )
}

fn mastodon_hint() -> String {
    format!(
        "Set your Mastodon credentials: export {}='https://your-instance.social' and export {}='your-access-token'. \
         To get a token, create an application with 'write' permissions under Settings -> Development.",
        MASTODON_INSTANCE_VAR, MASTODON_TOKEN_VAR
    )
}

/// Ensure a base URL has a scheme and no trailing slash
pub fn normalize_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// Expand `~` and environment variables in a configured path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// Resolve the default configuration file path following XDG Base Directory spec
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("queuecast").join("config.toml"))
}
