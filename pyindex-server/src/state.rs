//! # Application State Management
//!
//! [`AppState`] is built once at startup and shared by every handler through
//! axum's `State` extractor.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pyindex_core::{FileStore, IndexEngine};
//! use pyindex_server::{config::Config, state::AppState};
//!
//! # async fn build() -> anyhow::Result<()> {
//! let config = Config::default();
//! let store = FileStore::open(&config.storage.root).await?;
//! let state = AppState::new(IndexEngine::new(store), config);
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use pyindex_core::{render::encode_path_segment, IndexEngine};
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<IndexEngine>,
    pub config: Arc<Config>,
    /// Normalized URL prefix, computed once from `config`
    pub url_prefix: Arc<str>,
}

impl AppState {
    pub fn new(engine: IndexEngine, config: Config) -> Self {
        let url_prefix: Arc<str> = Arc::from(config.url_prefix());
        Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
            url_prefix,
        }
    }

    /// Absolute path of the download directory for `project`, with a
    /// trailing slash.
    pub fn files_base(&self, project: &str) -> String {
        format!("{}/files/{}/", self.url_prefix, encode_path_segment(project))
    }

    pub fn simple_path(&self, project: Option<&str>) -> String {
        match project {
            Some(project) => format!(
                "{}/simple/{}/",
                self.url_prefix,
                encode_path_segment(project)
            ),
            None => format!("{}/simple/", self.url_prefix),
        }
    }
}

/// Body of a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub project: String,
    pub filename: String,
    pub sha256: String,
    pub size: u64,
}
