//! `/documents/*` route handlers, one per `spec.md` §6.1 table row,
//! grounded line-for-line on `documentstore/restfulapi.py`'s `documents`/
//! `manifest`/`assets_list`/`assets`/`diff`/`front` view functions.

use std::collections::HashMap;

use axum::{
    extract::{
        Path,
        Query,
        State,
    },
    http::{
        header,
        StatusCode,
    },
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use application::document::manifest_to_json;
use errors::KernelError;

use crate::{
    error::ApiError,
    front,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct DocumentDataQuery {
    #[serde(default)]
    pub when: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssetEntry {
    pub asset_id: String,
    pub asset_url: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterDocumentBody {
    pub data: String,
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
}

#[derive(Debug, Deserialize)]
pub struct PutAssetBody {
    pub asset_url: String,
}

#[derive(Debug, Deserialize)]
pub struct DiffQuery {
    #[serde(default)]
    pub from_when: Option<String>,
    #[serde(default)]
    pub to_when: Option<String>,
}

pub async fn fetch_document_data(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DocumentDataQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let xml = state.handlers.fetch_document_data(&id, -1, query.when.as_deref()).await?;
    Ok(([(header::CONTENT_TYPE, "text/xml")], xml))
}

/// Registers or updates a document. Matches `put_document`'s dispatch:
/// attempt a fresh registration first; an `AlreadyExists` falls back to
/// the update path, where a `VersionAlreadySet` is swallowed as the
/// idempotent no-op spec §8.1's property 4 requires.
pub async fn put_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RegisterDocumentBody>,
) -> Result<StatusCode, ApiError> {
    let assets: Vec<(String, String)> = body.assets.into_iter().map(|a| (a.asset_id, a.asset_url)).collect();

    match state.handlers.register_document(&id, &body.data, &assets).await {
        Ok(()) => Ok(StatusCode::CREATED),
        Err(KernelError::AlreadyExists { .. }) => {
            match state.handlers.register_document_version(&id, &body.data, &assets).await {
                Ok(()) | Err(KernelError::VersionAlreadySet) => Ok(StatusCode::NO_CONTENT),
                Err(err) => Err(err.into()),
            }
        },
        Err(err) => Err(err.into()),
    }
}

pub async fn get_manifest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let manifest = state.handlers.fetch_document_manifest(&id).await?;
    Ok(Json(manifest_to_json(&manifest)))
}

pub async fn get_assets_list(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let assets = state.handlers.fetch_document_assets(&id).await?;
    Ok(Json(json!({ "assets": assets })))
}

/// Resolves `slug` back to an asset id via the latest version's asset
/// list (matching `put_asset`'s `slugify_assets_ids` round-trip) before
/// registering the new URL.
pub async fn put_asset(
    State(state): State<AppState>,
    Path((id, slug)): Path<(String, String)>,
    Json(body): Json<PutAssetBody>,
) -> Result<StatusCode, ApiError> {
    let assets = state.handlers.fetch_document_assets(&id).await?;
    let by_slug: HashMap<&str, &str> = assets.iter().map(|a| (a.slug.as_str(), a.id.as_str())).collect();
    let asset_id = by_slug
        .get(slug.as_str())
        .copied()
        .ok_or_else(|| KernelError::DoesNotExist { kind: "asset", id: slug.clone() })?
        .to_string();

    match state.handlers.register_asset_version(&id, &asset_id, &body.asset_url).await {
        Ok(()) | Err(KernelError::VersionAlreadySet) => Ok(StatusCode::NO_CONTENT),
        Err(err) => Err(err.into()),
    }
}

/// `from_when` is mandatory (spec §6.1); its absence is a 400, not a 404,
/// matching `diff_document_versions`'s explicit `HTTPBadRequest`.
pub async fn diff_document_versions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DiffQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(from_when) = query.from_when else {
        return Err(KernelError::InvalidMetadata {
            field: "from_when",
            reason: "missing attribute from_when".to_string(),
        }
        .into());
    };
    let diff = state.handlers.diff_document_versions(&id, &from_when, query.to_when.as_deref()).await?;
    Ok(([(header::CONTENT_TYPE, "text/plain")], diff))
}

pub async fn fetch_document_front(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let xml = state.handlers.fetch_document_data(&id, -1, None).await?;
    let front_matter = front::sanitize_document_front(&xml)?;
    Ok(Json(front_matter))
}
