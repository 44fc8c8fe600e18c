//! REST API module.
//!
//! Public projections are returned as plain JSON documents, the shape the
//! web client reads. Write and internal endpoints use the success envelope.

mod internal;
mod public;
mod submission;

pub use internal::*;
pub use public::*;
pub use submission::*;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppErrorWithRevision};
use crate::l10n::{negotiate_language, primary_accept_language};
use crate::AppState;

/// Header carrying the language explicitly picked in the web client.
pub const LANGUAGE_HEADER: &str = "gl-language";

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError, revision_id: i64) -> ApiResult<T> {
    Err(err.with_revision(revision_id))
}

/// Query parameters shared by the localized endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct LanguageQuery {
    pub lang: Option<String>,
}

/// Pick the language of a localized response.
///
/// `?lang=` wins over the client language header, which wins over
/// `Accept-Language`. Languages not enabled on the node fall back to the
/// node default language.
pub async fn request_language(
    state: &AppState,
    query: &LanguageQuery,
    headers: &HeaderMap,
) -> Result<String, AppError> {
    let settings = state.repo.get_node_settings().await?;
    let enabled = state.repo.list_enabled_languages().await?;

    let requested = query
        .lang
        .clone()
        .or_else(|| header_value(headers, LANGUAGE_HEADER))
        .or_else(|| {
            header_value(headers, axum::http::header::ACCEPT_LANGUAGE.as_str())
                .and_then(|value| primary_accept_language(&value))
        });

    Ok(negotiate_language(
        requested.as_deref(),
        &enabled,
        &settings.default_language,
    ))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
