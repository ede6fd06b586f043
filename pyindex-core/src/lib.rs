//! # pyindex-core
//!
//! Index and storage engine for a "Simple Repository API" package index.
//!
//! Distribution files are stored under `{root}/{normalized-name}/{filename}`
//! and served as PEP 503 / PEP 691 listings ordered by PEP 440 version.
//!
//! ## Modules
//!
//! - [`normalize`]: PEP 503 project name normalization
//! - [`version`]: PEP 440 version parsing and ordering
//! - [`filename`]: wheel and sdist filename parsing
//! - [`store`]: atomic on-disk file store
//! - [`engine`]: listing, ingestion and the listing cache
//! - [`render`]: HTML and JSON listing pages
//!
//! This crate performs no logging and knows nothing about HTTP; every
//! failure is returned as a typed error.

pub mod engine;
pub mod error;
pub mod filename;
pub mod hash;
pub mod normalize;
pub mod render;
pub mod store;
pub mod version;

pub use engine::{FileEntry, IndexEngine, ListingCache};
pub use error::{IndexError, IndexResult, ParseError, RenderError, StoreError, StoreResult};
pub use filename::{parse_version, DistributionFilename, DistributionKind};
pub use normalize::{normalize, NormalizedName};
pub use store::{FileStore, StoredFile, StoredReader};
pub use version::VersionKey;
