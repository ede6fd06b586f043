//! Legacy upload API, as spoken by `twine upload`.
//!
//! `POST {prefix}/legacy/` with a multipart body:
//!
//! | Field           | Required | Meaning                                   |
//! |-----------------|----------|-------------------------------------------|
//! | `:action`       | no       | must be `file_upload` when present        |
//! | `name`          | yes      | project name as the client spells it      |
//! | `version`       | no       | must agree with the filename's version    |
//! | `sha256_digest` | no       | must match the uploaded bytes             |
//! | `content`       | yes      | the distribution file, with a filename    |
//!
//! Other metadata fields are read and ignored.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use pyindex_core::{hash::sha256_hash, normalize, parse_version, IndexError, VersionKey};
use tracing::{debug, info, warn};

use crate::config::DuplicatePolicy;
use crate::state::UploadResponse;
use crate::{AppError, AppResult, AppState};

const FILE_UPLOAD_ACTION: &str = "file_upload";

#[derive(Debug, Default)]
struct UploadForm {
    action: Option<String>,
    name: Option<String>,
    version: Option<String>,
    sha256_digest: Option<String>,
    content: Option<(String, Bytes)>,
}

async fn read_form(multipart: &mut Multipart, max_fields: usize) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();
    let mut field_count = 0;

    while let Some(field) = multipart.next_field().await? {
        field_count += 1;
        if field_count > max_fields {
            warn!(field_count = %field_count, "Too many multipart fields");
            return Err(AppError::UploadError(format!(
                "Too many multipart fields: {} (max: {})",
                field_count, max_fields
            )));
        }

        let name = field.name().unwrap_or("").to_string();
        debug!(field_name = %name, "Processing multipart field");

        match name.as_str() {
            "content" => {
                let filename = field
                    .file_name()
                    .ok_or_else(|| {
                        AppError::BadRequest("Missing filename in upload".to_string())
                    })?
                    .to_string();
                let data = field.bytes().await?;
                debug!(filename = %filename, size = data.len(), "Read package data");
                form.content = Some((filename, data));
            }
            ":action" => form.action = Some(field.text().await?),
            "name" => form.name = Some(field.text().await?),
            "version" => form.version = Some(field.text().await?),
            "sha256_digest" => form.sha256_digest = Some(field.text().await?),
            _ => {
                let ignored = field.bytes().await?;
                debug!(field_name = %name, size = ignored.len(), "Ignoring metadata field");
            }
        }
    }

    Ok(form)
}

fn check_version(declared: &str, filename: &str) -> AppResult<()> {
    if let (Ok(declared_key), Ok(file_key)) = (VersionKey::parse(declared), parse_version(filename)) {
        if declared_key != file_key {
            return Err(AppError::BadRequest(format!(
                "version field '{declared}' does not match filename version '{file_key}'"
            )));
        }
    }
    Ok(())
}

/// `POST {prefix}/legacy/`
pub async fn upload_package(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    info!("Processing package upload");
    let form = read_form(&mut multipart, state.config.limits.max_multipart_fields).await?;

    if let Some(action) = form.action.as_deref() {
        if action != FILE_UPLOAD_ACTION {
            return Err(AppError::BadRequest(format!(
                "Unsupported :action '{action}'"
            )));
        }
    }

    let raw_name = form
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing 'name' field".to_string()))?;
    let (filename, data) = form
        .content
        .ok_or_else(|| AppError::BadRequest("No content field found".to_string()))?;

    if let Some(version) = form.version.as_deref().filter(|v| !v.trim().is_empty()) {
        check_version(version, &filename)?;
    }

    let sha256 = sha256_hash(&data);
    if let Some(expected) = form.sha256_digest.as_deref().filter(|d| !d.is_empty()) {
        if !expected.trim().eq_ignore_ascii_case(&sha256) {
            warn!(filename = %filename, expected = %expected, actual = %sha256, "Digest mismatch");
            return Err(AppError::BadRequest(format!(
                "sha256_digest does not match uploaded content (got {sha256})"
            )));
        }
    }

    info!(name = %raw_name, filename = %filename, size = data.len(), "Uploading distribution");
    match state.engine.ingest(&raw_name, &filename, data).await {
        Ok(stored) => {
            info!(project = %stored.project, filename = %stored.filename, "Distribution stored");
            Ok(Json(UploadResponse {
                message: "Upload successful".to_string(),
                project: stored.project.to_string(),
                filename: stored.filename,
                sha256: stored.sha256,
                size: stored.size,
            }))
        }
        Err(IndexError::AlreadyExists { project, filename })
            if state.config.uploads.duplicate_policy == DuplicatePolicy::AllowIdentical =>
        {
            let existing = state.engine.stat(&project, &filename).await?;
            if existing.sha256 == sha256 {
                info!(project = %project, filename = %filename, "Identical file already stored");
                Ok(Json(UploadResponse {
                    message: "File already exists with identical content".to_string(),
                    project: project.to_string(),
                    filename,
                    sha256: existing.sha256,
                    size: existing.size,
                }))
            } else {
                Err(AppError::Conflict(format!(
                    "{project}/{filename} already exists with different content"
                )))
            }
        }
        Err(e) => {
            if let IndexError::NameMismatch { .. } = &e {
                warn!(name = %raw_name, normalized = %normalize(&raw_name), filename = %filename, "Filename does not belong to project");
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_version() {
        assert!(check_version("1.0", "foo-1.0.tar.gz").is_ok());
        assert!(check_version("1.0.0", "foo-1.0-py3-none-any.whl").is_ok());
        assert!(check_version("1.0", "foo-2.0.tar.gz").is_err());
        // Unparseable on either side is not checked.
        assert!(check_version("nightly", "foo-1.0.tar.gz").is_ok());
        assert!(check_version("1.0", "foo-snapshot.tar.gz").is_ok());
    }
}
