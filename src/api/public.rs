//! Public, unauthenticated endpoints.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde_json::Value;

use super::{request_language, LanguageQuery};
use crate::errors::{AppError, AppErrorWithRevision};
use crate::public::{serialize_ahmia, serialize_public_resources, RuntimeFlags};
use crate::AppState;

pub const PUBLIC_RESOURCE: &str = "public";
pub const AHMIA_RESOURCE: &str = "ahmia";

/// GET /api/public - Node, public contexts and receivers in one document.
pub async fn get_public_resources(
    State(state): State<AppState>,
    Query(query): Query<LanguageQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppErrorWithRevision> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let language = request_language(&state, &query, &headers)
        .await
        .map_err(|e| e.with_revision(revision_id))?;

    let flags = RuntimeFlags::from(state.config.as_ref());
    let repo = state.repo.clone();
    let value = state
        .cache
        .get_or_compute(PUBLIC_RESOURCE, &language, revision_id, || async {
            let snapshot = repo.load_public_snapshot().await?;
            Ok::<_, AppError>(serialize_public_resources(&snapshot, &language, flags))
        })
        .await
        .map_err(|e| e.with_revision(revision_id))?;

    Ok(Json(value.as_ref().clone()))
}

/// GET /description.json - Descriptor for the ahmia.fi onion search engine.
pub async fn get_ahmia_description(
    State(state): State<AppState>,
    Query(query): Query<LanguageQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppErrorWithRevision> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);
    let settings = state
        .repo
        .get_node_settings()
        .await
        .map_err(|e| e.with_revision(revision_id))?;

    if !settings.ahmia {
        return Err(
            AppError::NotFound("Ahmia descriptor is disabled".to_string())
                .with_revision(revision_id),
        );
    }

    let language = request_language(&state, &query, &headers)
        .await
        .map_err(|e| e.with_revision(revision_id))?;

    let repo = state.repo.clone();
    let value = state
        .cache
        .get_or_compute(AHMIA_RESOURCE, &language, revision_id, || async {
            let node = repo.load_node_snapshot().await?;
            Ok::<_, AppError>(serialize_ahmia(&node, &language))
        })
        .await
        .map_err(|e| e.with_revision(revision_id))?;

    Ok(Json(value.as_ref().clone()))
}

/// GET /robots.txt - Crawling policy following the node indexing flag.
pub async fn get_robots_txt(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppErrorWithRevision> {
    let settings = state
        .repo
        .get_node_settings()
        .await
        .map_err(|e| e.with_revision(0))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        robots_txt(settings.allow_indexing),
    ))
}

pub fn robots_txt(allow_indexing: bool) -> String {
    let rule = if allow_indexing { "Allow" } else { "Disallow" };
    format!("User-agent: *\n{}: /", rule)
}
