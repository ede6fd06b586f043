//! Simple repository listing handlers (PEP 503 / PEP 691).

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use pyindex_core::{normalize, render, NormalizedName};
use tracing::{debug, info};

use crate::{negotiate::listing_response, negotiate::MediaType, AppError, AppResult, AppState};

/// 301 to `location` (`Redirect::permanent` is a 308).
fn moved_permanently(location: &str) -> AppResult<Response> {
    let location = HeaderValue::from_str(location).map_err(|e| {
        AppError::InternalError(format!("invalid redirect location {location}: {e}"))
    })?;
    Ok((StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response())
}

/// `GET {prefix}/simple`
pub async fn root_redirect(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    moved_permanently(&state.simple_path(None))
}

/// `GET {prefix}/simple/`
pub async fn project_root(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let media_type = MediaType::negotiate(&headers)?;
    let names = state.engine.list_projects().await?;
    info!(projects = names.len(), media_type = ?media_type, "Serving project root");

    let body = match media_type {
        MediaType::JsonV1 => render::project_list(&names).to_json()?,
        MediaType::HtmlV1 => render::render_project_root(&names)?,
    };
    listing_response(&headers, media_type, body)
}

/// `GET {prefix}/simple/{project}`
pub async fn project_redirect(
    State(state): State<Arc<AppState>>,
    Path(project): Path<String>,
) -> AppResult<Response> {
    let normalized = normalize(&project);
    moved_permanently(&state.simple_path(Some(normalized.as_str())))
}

/// `GET {prefix}/simple/{project}/`
pub async fn project_index(
    State(state): State<Arc<AppState>>,
    Path(project): Path<String>,
    headers: HeaderMap,
) -> AppResult<Response> {
    if !NormalizedName::is_normalized(&project) {
        let normalized = normalize(&project);
        debug!(requested = %project, normalized = %normalized, "Redirecting to normalized project name");
        return moved_permanently(&state.simple_path(Some(normalized.as_str())));
    }

    let media_type = MediaType::negotiate(&headers)?;
    let project = normalize(&project);
    let files = state.engine.list_files(&project).await?;
    info!(project = %project, files = files.len(), media_type = ?media_type, "Serving project index");

    let base_url = state.files_base(project.as_str());
    let body = match media_type {
        MediaType::JsonV1 => render::project_detail(&project, &files, &base_url).to_json()?,
        MediaType::HtmlV1 => render::render_project_index(&project, &files, &base_url)?,
    };
    listing_response(&headers, media_type, body)
}
