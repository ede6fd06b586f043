//! # On-Disk File Store
//!
//! Owns the storage tree `{root}/{normalized-name}/{filename}`. There are no
//! sidecar files: the hash and size of a stored file are computed from its
//! bytes, and its upload time is the file's modification time.
//!
//! Writes go to a hidden temporary file inside the project directory, are
//! fsynced, and are then moved into place with a no-clobber rename. Racing
//! writers of the same filename are serialized by the filesystem: exactly
//! one rename succeeds and the others observe `AlreadyExists`. Listings never
//! take a lock and skip entries that are still in flight or that disappear
//! while the directory is being read.
//!
//! All blocking filesystem work runs on the tokio blocking pool.

use crate::error::{StoreError, StoreResult};
use crate::hash::{sha256_file, sha256_hash};
use crate::normalize::NormalizedName;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fs::{self, Metadata};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Prefix of in-flight upload files. Anything starting with `.` is hidden
/// from listings.
pub const TEMP_FILE_PREFIX: &str = ".tmp-";

const MAX_FILENAME_LENGTH: usize = 255;

const RESERVED_WINDOWS_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Metadata of one stored distribution file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub project: NormalizedName,
    pub filename: String,
    pub sha256: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// An open stored file, ready to be streamed to a client.
#[derive(Debug)]
pub struct StoredReader {
    pub file: tokio::fs::File,
    pub size: u64,
}

/// Handle over a storage root. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: Arc<PathBuf>,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project: &NormalizedName) -> StoreResult<PathBuf> {
        validate_project_dir(project)?;
        Ok(self.root.join(project.as_str()))
    }

    /// Atomically create `{project}/{filename}` with `content`.
    pub async fn put(
        &self,
        project: &NormalizedName,
        filename: &str,
        content: Bytes,
    ) -> StoreResult<StoredFile> {
        validate_filename(filename)?;
        let dir = self.project_dir(project)?;
        let project = project.clone();
        let filename = filename.to_string();

        blocking(move || {
            let dest = dir.join(&filename);
            if dest.try_exists()? {
                return Err(StoreError::AlreadyExists { project, filename });
            }

            fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::Builder::new()
                .prefix(TEMP_FILE_PREFIX)
                .tempfile_in(&dir)?;
            tmp.write_all(&content)?;
            tmp.as_file().sync_all()?;

            if let Err(e) = tmp.persist_noclobber(&dest) {
                if e.error.kind() == io::ErrorKind::AlreadyExists {
                    return Err(StoreError::AlreadyExists { project, filename });
                }
                return Err(StoreError::Io(e.error));
            }

            let metadata = fs::metadata(&dest)?;
            Ok(StoredFile {
                project,
                filename,
                sha256: sha256_hash(&content),
                size: content.len() as u64,
                uploaded_at: modified_at(&metadata)?,
            })
        })
        .await
    }

    /// List the files of one project, sorted by filename.
    pub async fn list(&self, project: &NormalizedName) -> StoreResult<Vec<StoredFile>> {
        let dir = self.project_dir(project)?;
        let project = project.clone();

        blocking(move || {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(StoreError::NotFound(project.to_string()));
                }
                Err(e) => return Err(e.into()),
            };

            let mut files = Vec::new();
            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(e.into()),
                };
                let Some(filename) = visible_name(&entry.file_name()) else {
                    continue;
                };
                match describe(&project, &entry.path(), filename) {
                    Ok(Some(file)) => files.push(file),
                    Ok(None) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }

            files.sort_by(|a, b| a.filename.cmp(&b.filename));
            Ok(files)
        })
        .await
    }

    /// Project directories that hold at least one visible file.
    ///
    /// Directories whose name is not in normalized form are ignored; they
    /// cannot have been created by [`put`](Self::put).
    pub async fn list_projects(&self) -> StoreResult<BTreeSet<NormalizedName>> {
        let root = Arc::clone(&self.root);

        blocking(move || {
            let mut projects = BTreeSet::new();
            for entry in fs::read_dir(root.as_path())? {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(e.into()),
                };
                let Some(name) = visible_name(&entry.file_name()) else {
                    continue;
                };
                if !NormalizedName::is_normalized(&name) {
                    continue;
                }
                let is_dir = match entry.file_type() {
                    Ok(file_type) => file_type.is_dir(),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => false,
                    Err(e) => return Err(e.into()),
                };
                if is_dir && has_visible_file(&entry.path())? {
                    projects.insert(NormalizedName::from(name.as_str()));
                }
            }
            Ok(projects)
        })
        .await
    }

    /// Open a stored file for streaming.
    pub async fn get(&self, project: &NormalizedName, filename: &str) -> StoreResult<StoredReader> {
        let path = self.file_path(project, filename)?;
        let not_found = || StoreError::NotFound(format!("{project}/{filename}"));

        match tokio::fs::symlink_metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(not_found()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        }
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let metadata = file.metadata().await?;

        Ok(StoredReader {
            file,
            size: metadata.len(),
        })
    }

    /// Metadata and hash of one stored file.
    pub async fn stat(&self, project: &NormalizedName, filename: &str) -> StoreResult<StoredFile> {
        let path = self.file_path(project, filename)?;
        let project = project.clone();
        let filename = filename.to_string();

        blocking(move || {
            let not_found = || StoreError::NotFound(format!("{project}/{filename}"));
            match describe(&project, &path, filename.clone()) {
                Ok(Some(file)) => Ok(file),
                Ok(None) => Err(not_found()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Err(not_found()),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    fn file_path(&self, project: &NormalizedName, filename: &str) -> StoreResult<PathBuf> {
        validate_filename(filename)?;
        Ok(self.project_dir(project)?.join(filename))
    }
}

async fn blocking<T, F>(f: F) -> StoreResult<T>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Io(io::Error::other(format!("spawn_blocking failed: {e}"))))?
}

fn visible_name(raw: &std::ffi::OsStr) -> Option<String> {
    let name = raw.to_str()?;
    if name.starts_with('.') {
        return None;
    }
    Some(name.to_string())
}

fn has_visible_file(dir: &Path) -> StoreResult<bool> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    for entry in entries.flatten() {
        if visible_name(&entry.file_name()).is_some()
            && entry.file_type().map(|t| t.is_file()).unwrap_or(false)
        {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Describe a regular file; `None` for directories, symlinks and the like.
fn describe(project: &NormalizedName, path: &Path, filename: String) -> io::Result<Option<StoredFile>> {
    let metadata = fs::symlink_metadata(path)?;
    if !metadata.is_file() {
        return Ok(None);
    }
    let sha256 = sha256_file(path)?;
    Ok(Some(StoredFile {
        project: project.clone(),
        filename,
        sha256,
        size: metadata.len(),
        uploaded_at: modified_at(&metadata)?,
    }))
}

fn modified_at(metadata: &Metadata) -> io::Result<DateTime<Utc>> {
    Ok(DateTime::<Utc>::from(metadata.modified()?))
}

fn invalid(filename: &str, reason: impl Into<String>) -> StoreError {
    StoreError::InvalidFilename {
        filename: filename.to_string(),
        reason: reason.into(),
    }
}

/// Validate that a filename is a single, safe path component.
///
/// Rejects empty and over-long names, NUL and control characters, path
/// separators, parent references, absolute paths, drive letters, hidden
/// names and reserved Windows device names.
pub fn validate_filename(filename: &str) -> StoreResult<()> {
    if filename.is_empty() {
        return Err(invalid(filename, "filename cannot be empty"));
    }

    if filename.len() > MAX_FILENAME_LENGTH {
        return Err(invalid(
            filename,
            format!(
                "filename too long: {} bytes (max: {})",
                filename.len(),
                MAX_FILENAME_LENGTH
            ),
        ));
    }

    if filename.contains('\0') {
        return Err(invalid(filename, "filename contains null byte"));
    }

    if filename.chars().any(|c| c.is_control()) {
        return Err(invalid(filename, "filename contains control characters"));
    }

    if filename.contains("..") {
        return Err(invalid(
            filename,
            "filename contains parent directory reference (..)",
        ));
    }

    if filename.starts_with('/') || filename.starts_with('\\') {
        return Err(invalid(filename, "filename cannot be an absolute path"));
    }

    if filename.contains('/') || filename.contains('\\') {
        return Err(invalid(filename, "filename cannot contain path separators"));
    }

    let mut chars = filename.chars();
    if let (Some(first), Some(':')) = (chars.next(), chars.next()) {
        if first.is_ascii_alphabetic() {
            return Err(invalid(filename, "filename cannot contain drive letter"));
        }
    }

    if filename.starts_with('.') {
        return Err(invalid(filename, "filename cannot be hidden"));
    }

    let base_name = filename.split('.').next().unwrap_or(filename);
    if RESERVED_WINDOWS_NAMES
        .iter()
        .any(|reserved| base_name.eq_ignore_ascii_case(reserved))
    {
        return Err(invalid(filename, "filename is a reserved system name"));
    }

    Ok(())
}

/// A project directory only has to be one path component. Device names
/// such as `con` are valid project names and stay allowed.
fn validate_project_dir(project: &NormalizedName) -> StoreResult<()> {
    let name = project.as_str();
    let single_component = !name.is_empty()
        && name != "."
        && name != ".."
        && name.len() <= MAX_FILENAME_LENGTH
        && !name.contains(['/', '\\'])
        && !name.chars().any(|c| c.is_control());
    if single_component {
        Ok(())
    } else {
        Err(StoreError::InvalidProjectName(name.to_string()))
    }
}
