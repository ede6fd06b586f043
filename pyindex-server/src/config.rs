//! # Configuration Management
//!
//! Server configuration is a JSON document with these sections:
//!
//! - [`ServerConfig`]: bind address
//! - [`StorageConfig`]: storage root and listing cache
//! - [`RouteConfig`]: externally visible URL prefix
//! - [`LimitsConfig`]: upload size and multipart field limits
//! - [`UploadConfig`]: duplicate upload policy
//!
//! Built-in defaults live in the embedded `config.json`. A file given with
//! `--config` replaces them; sections missing from that file fall back to
//! their defaults. Command line flags are applied last.
//!
//! ```rust,no_run
//! # use pyindex_server::config::Config;
//! let config = Config::load_or_default("pyindex.json")?;
//! # Ok::<(), pyindex_server::AppError>(())
//! ```

use crate::error::AppResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub routes: RouteConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host/IP address to bind to
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per normalized project name
    pub root: PathBuf,
    /// Memoize sorted project listings between uploads
    #[serde(default = "default_true")]
    pub listing_cache: bool,
}

/// URL layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Path prefix all routes are mounted under, e.g. `/pypi`. Empty mounts
    /// at the root.
    #[serde(default)]
    pub url_prefix: String,
}

/// Upload and request limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_upload_size_mb: usize,
    pub max_multipart_fields: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            max_upload_size_mb: 100,
            max_multipart_fields: 32,
        }
    }
}

/// What to do when an uploaded filename already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Always answer 409 Conflict
    #[default]
    Reject,
    /// Answer 200 when the stored file has the same SHA-256, 409 otherwise
    AllowIdentical,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config_str = fs::read_to_string(path)?;
        let config = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    /// Load configuration from file, or the built-in defaults if the file
    /// does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.limits.max_upload_size_mb.saturating_mul(1024 * 1024)
    }

    /// The URL prefix with a leading `/` and no trailing `/`, or `""`.
    pub fn url_prefix(&self) -> String {
        let trimmed = self.routes.url_prefix.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        serde_json::from_str(include_str!("../config.json"))
            .expect("Failed to parse embedded config.json")
    }
}
