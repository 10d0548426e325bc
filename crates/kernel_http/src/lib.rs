//! The HTTP surface: a thin `axum` adapter over [`application::Handlers`] —
//! request validation, dispatch, response shaping (XML / JSON / plain
//! text) — and nothing else, mirroring `documentstore/restfulapi.py`'s
//! Pyramid views one-for-one (spec §6.1).

pub mod documents;
pub mod error;
pub mod front;

use std::sync::Arc;

use axum::{
    routing::{
        get,
        put,
    },
    Router,
};

use application::Handlers;

#[derive(Clone)]
pub struct AppState {
    pub handlers: Arc<Handlers>,
}

/// Builds the complete route table from spec §6.1. `kernel_cli` owns
/// binding the listener and calling `axum::serve`.
pub fn router(handlers: Arc<Handlers>) -> Router {
    Router::new()
        .route("/documents/:document_id", get(documents::fetch_document_data).put(documents::put_document))
        .route("/documents/:document_id/manifest", get(documents::get_manifest))
        .route("/documents/:document_id/assets", get(documents::get_assets_list))
        .route("/documents/:document_id/assets/:asset_slug", put(documents::put_asset))
        .route("/documents/:document_id/diff", get(documents::diff_document_versions))
        .route("/documents/:document_id/front", get(documents::fetch_document_front))
        .with_state(AppState { handlers })
}
