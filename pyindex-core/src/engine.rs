//! # Index Engine
//!
//! Composes normalization, filename parsing, version ordering and the file
//! store into the operations the HTTP layer needs.
//!
//! The engine holds no copy of file content. Listings are recomputed from the
//! store and optionally memoized per project in a [`ListingCache`]. The cache
//! is never authoritative: every successful ingest bumps the project's
//! generation and drops its listing before returning, and a reader only
//! installs a listing if the generation it observed before reading the
//! directory is still current.

use crate::error::{IndexError, IndexResult, ParseError};
use crate::filename::parse_version;
use crate::filename::DistributionFilename;
use crate::normalize::{normalize, NormalizedName};
use crate::store::{validate_filename, FileStore, StoredFile, StoredReader};
use crate::version::VersionKey;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::cmp::Ordering;
use std::sync::Arc;

/// One file in a project listing.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub filename: String,
    pub version: Result<VersionKey, ParseError>,
    pub sha256: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl From<StoredFile> for FileEntry {
    fn from(file: StoredFile) -> Self {
        FileEntry {
            version: parse_version(&file.filename),
            filename: file.filename,
            sha256: file.sha256,
            size: file.size,
            uploaded_at: file.uploaded_at,
        }
    }
}

/// Listing order: parseable versions ascending (ties by filename), then
/// unparseable files by filename.
pub fn listing_order(a: &FileEntry, b: &FileEntry) -> Ordering {
    match (&a.version, &b.version) {
        (Ok(va), Ok(vb)) => va.cmp(vb).then_with(|| a.filename.cmp(&b.filename)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.filename.cmp(&b.filename),
    }
}

#[derive(Debug, Default)]
struct CacheSlot {
    generation: u64,
    listing: Option<Arc<Vec<FileEntry>>>,
}

/// Per-project memo of sorted listings, locked per entry.
#[derive(Debug, Default)]
pub struct ListingCache {
    slots: DashMap<NormalizedName, CacheSlot>,
}

impl ListingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached listing, or the generation to hand back to [`install`](Self::install).
    pub fn lookup(&self, project: &NormalizedName) -> Result<Arc<Vec<FileEntry>>, u64> {
        match self.slots.get(project) {
            Some(slot) => match &slot.listing {
                Some(listing) => Ok(Arc::clone(listing)),
                None => Err(slot.generation),
            },
            None => Err(0),
        }
    }

    /// Store `listing` unless the project was written since `generation`
    /// was observed. Returns whether the listing was installed.
    pub fn install(
        &self,
        project: &NormalizedName,
        generation: u64,
        listing: Arc<Vec<FileEntry>>,
    ) -> bool {
        let mut slot = self.slots.entry(project.clone()).or_default();
        if slot.generation != generation {
            return false;
        }
        slot.listing = Some(listing);
        true
    }

    pub fn invalidate(&self, project: &NormalizedName) {
        let mut slot = self.slots.entry(project.clone()).or_default();
        slot.generation += 1;
        slot.listing = None;
    }
}

/// The index and storage engine.
#[derive(Debug)]
pub struct IndexEngine {
    store: FileStore,
    cache: Option<ListingCache>,
}

impl IndexEngine {
    /// Engine with the listing cache enabled.
    pub fn new(store: FileStore) -> Self {
        Self {
            store,
            cache: Some(ListingCache::new()),
        }
    }

    pub fn without_cache(store: FileStore) -> Self {
        Self { store, cache: None }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// All projects with at least one stored file, in lexicographic order.
    pub async fn list_projects(&self) -> IndexResult<Vec<NormalizedName>> {
        Ok(self.store.list_projects().await?.into_iter().collect())
    }

    /// The sorted listing of one project. `NotFound` if it has no files.
    pub async fn list_files(&self, project: &NormalizedName) -> IndexResult<Arc<Vec<FileEntry>>> {
        let observed = match &self.cache {
            Some(cache) => match cache.lookup(project) {
                Ok(listing) => return Ok(listing),
                Err(generation) => Some(generation),
            },
            None => None,
        };

        let mut entries: Vec<FileEntry> = self
            .store
            .list(project)
            .await?
            .into_iter()
            .map(FileEntry::from)
            .collect();
        if entries.is_empty() {
            return Err(IndexError::NotFound(project.to_string()));
        }
        entries.sort_by(listing_order);
        let listing = Arc::new(entries);

        if let (Some(cache), Some(generation)) = (&self.cache, observed) {
            cache.install(project, generation, Arc::clone(&listing));
        }
        Ok(listing)
    }

    /// Validate and store an uploaded distribution file.
    ///
    /// `raw_name` is the project name as the client sent it. The filename
    /// must be a wheel or sdist whose embedded name normalizes to the same
    /// project. An unparseable version inside an otherwise valid filename is
    /// accepted.
    pub async fn ingest(
        &self,
        raw_name: &str,
        filename: &str,
        content: Bytes,
    ) -> IndexResult<StoredFile> {
        let project = normalize(raw_name);

        validate_filename(filename)?;
        let parsed =
            DistributionFilename::parse(filename).map_err(|e| IndexError::InvalidFilename {
                filename: filename.to_string(),
                reason: e.to_string(),
            })?;
        if parsed.project() != &project {
            return Err(IndexError::NameMismatch {
                project,
                found: parsed.project().clone(),
            });
        }

        let stored = self.store.put(&project, filename, content).await?;
        if let Some(cache) = &self.cache {
            cache.invalidate(&project);
        }
        Ok(stored)
    }

    pub async fn open(&self, project: &NormalizedName, filename: &str) -> IndexResult<StoredReader> {
        Ok(self.store.get(project, filename).await?)
    }

    pub async fn stat(&self, project: &NormalizedName, filename: &str) -> IndexResult<StoredFile> {
        Ok(self.store.stat(project, filename).await?)
    }
}
