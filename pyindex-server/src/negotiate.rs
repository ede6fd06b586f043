//! Content negotiation (PEP 691) and conditional requests for listing pages.

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use pyindex_core::hash::sha256_hash;

use crate::{AppError, AppResult};

const JSON_V1: &str = "application/vnd.pypi.simple.v1+json";
const HTML_V1: &str = "application/vnd.pypi.simple.v1+html";

const ACCEPT_JSON: &[&str] = &[JSON_V1, "application/vnd.pypi.simple.latest+json"];
const ACCEPT_HTML: &[&str] = &[
    HTML_V1,
    "application/vnd.pypi.simple.latest+html",
    "text/html",
    "*/*",
];

/// Representation chosen for a listing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    JsonV1,
    HtmlV1,
}

impl MediaType {
    pub fn content_type(self) -> &'static str {
        match self {
            MediaType::JsonV1 => JSON_V1,
            MediaType::HtmlV1 => HTML_V1,
        }
    }

    /// Pick the representation for a request. JSON wins when both are
    /// acceptable; a missing `Accept` header means `*/*`. Quality values are
    /// not weighed.
    pub fn negotiate(headers: &HeaderMap) -> AppResult<Self> {
        let accept = match headers.get(header::ACCEPT) {
            None => return Ok(MediaType::HtmlV1),
            Some(value) => value
                .to_str()
                .map_err(|_| AppError::NotAcceptable("<non-ASCII Accept header>".to_string()))?,
        };

        let offered: Vec<&str> = accept
            .split(',')
            .map(|item| item.split(';').next().unwrap_or("").trim())
            .filter(|item| !item.is_empty())
            .collect();

        let wants = |acceptable: &[&str]| {
            offered
                .iter()
                .any(|item| acceptable.iter().any(|a| a.eq_ignore_ascii_case(item)))
        };

        if wants(ACCEPT_JSON) {
            Ok(MediaType::JsonV1)
        } else if wants(ACCEPT_HTML) {
            Ok(MediaType::HtmlV1)
        } else {
            tracing::warn!(accept = %accept, "No acceptable media type");
            Err(AppError::NotAcceptable(accept.to_string()))
        }
    }
}

/// Weak entity tag over the exact response body.
pub fn etag_for(body: &[u8]) -> String {
    format!("W/\"{}\"", sha256_hash(body))
}

fn header_matches(value: &HeaderValue, etag: &str) -> bool {
    value
        .to_str()
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .any(|candidate| candidate == "*" || candidate == etag)
        })
        .unwrap_or(false)
}

/// Build a listing response, honouring `If-None-Match` and `If-Match`.
pub fn listing_response(
    headers: &HeaderMap,
    media_type: MediaType,
    body: String,
) -> AppResult<Response> {
    let etag = etag_for(body.as_bytes());
    let etag_value = HeaderValue::from_str(&etag)
        .map_err(|e| AppError::InternalError(format!("invalid ETag header: {e}")))?;

    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH) {
        if header_matches(if_none_match, &etag) {
            tracing::debug!(etag = %etag, "Listing not modified");
            return Ok((
                StatusCode::NOT_MODIFIED,
                [(header::ETAG, etag_value), (header::VARY, HeaderValue::from_static("Accept"))],
            )
                .into_response());
        }
    } else if let Some(if_match) = headers.get(header::IF_MATCH) {
        if !header_matches(if_match, &etag) {
            return Err(AppError::PreconditionFailed(format!(
                "current entity tag is {etag}"
            )));
        }
    }

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(media_type.content_type()),
            ),
            (header::ETAG, etag_value),
            (header::VARY, HeaderValue::from_static("Accept")),
        ],
        body,
    )
        .into_response())
}
