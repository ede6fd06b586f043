//! Common test utilities and helpers
//!
//! Every test gets its own storage root inside a temporary directory and an
//! in-process `TestServer` around the real router.

#![allow(dead_code)]

use std::sync::Arc;

use axum_test::{
    multipart::{MultipartForm, Part},
    TestResponse, TestServer,
};
use pyindex_server::{build_router, build_state, AppState, Config};
use tempfile::TempDir;

pub const JSON_V1: &str = "application/vnd.pypi.simple.v1+json";
pub const HTML_V1: &str = "application/vnd.pypi.simple.v1+html";

pub struct TestIndex {
    pub temp_dir: TempDir,
    pub state: Arc<AppState>,
    pub server: TestServer,
}

impl TestIndex {
    pub fn root(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("packages")
    }

    /// Upload through the legacy API with only the required fields.
    pub async fn upload(&self, name: &str, filename: &str, content: &[u8]) -> TestResponse {
        let prefix = self.state.url_prefix.to_string();
        self.server
            .post(&format!("{prefix}/legacy/"))
            .multipart(upload_form(name, filename, content))
            .await
    }
}

pub async fn test_index() -> TestIndex {
    test_index_with(|_| {}).await
}

pub async fn test_index_with(configure: impl FnOnce(&mut Config)) -> TestIndex {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config::default();
    config.storage.root = temp_dir.path().join("packages");
    configure(&mut config);

    let state = build_state(config).await.expect("should open storage root");
    let server =
        TestServer::new(build_router(state.clone())).expect("should create test server");

    TestIndex {
        temp_dir,
        state,
        server,
    }
}

pub fn content_part(filename: &str, content: &[u8]) -> Part {
    Part::bytes(content.to_vec())
        .file_name(filename.to_string())
        .mime_type("application/octet-stream")
}

pub fn upload_form(name: &str, filename: &str, content: &[u8]) -> MultipartForm {
    MultipartForm::new()
        .add_text(":action", "file_upload")
        .add_text("name", name.to_string())
        .add_part("content", content_part(filename, content))
}
