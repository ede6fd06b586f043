//! # pyindex server
//!
//! HTTP front end for the [`pyindex_core`] engine: a "Simple Repository API"
//! package index that installers (`pip`, `uv`) read from and `twine` uploads
//! to.
//!
//! ## Routes
//!
//! All routes are mounted under the configured URL prefix.
//!
//! | Method     | Path                          | Handler                      |
//! |------------|-------------------------------|------------------------------|
//! | GET, HEAD  | `/simple/`                    | [`simple::project_root`]     |
//! | GET, HEAD  | `/simple/{project}/`          | [`simple::project_index`]    |
//! | GET, HEAD  | `/files/{project}/{filename}` | [`files::download_file`]     |
//! | POST       | `/legacy/`                    | [`upload::upload_package`]   |
//! | GET        | `/ping`, `/health`, `/status` | operational probes           |
//!
//! ## Key Modules
//!
//! - [`config`]: Configuration management and settings
//! - [`state`]: Application state shared by handlers
//! - [`error`]: Error handling and standardized responses
//! - [`negotiate`]: PEP 691 content negotiation and entity tags
//! - [`cli`]: the `pyindex` command line

pub mod cli;
pub mod config;
pub mod error;
pub mod files;
pub mod negotiate;
pub mod server;
pub mod simple;
pub mod state;
pub mod upload;

pub use config::Config;
pub use error::{ApiErrorResponse, AppError, AppResult, ErrorCode};
pub use server::{build_router, build_state, run_server};
pub use state::{AppState, UploadResponse};
