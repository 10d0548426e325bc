//! Document-centric handlers: register, fetch, diff, asset/rendition
//! versions, delete (spec §4.7), grounded on `services.py`'s
//! `RegisterDocument`/`RegisterDocumentVersion`/`RegisterAssetVersion`/
//! `RegisterRenditionVersion`/`DiffDocumentVersions`/`DeleteDocument`.

use serde::Serialize;
use serde_json::{
    json,
    Value,
};

use errors::KernelError;
use manifest::Manifest;
use model::{
    Document,
    DocumentVersion,
    RenditionView,
};
use storage::Repository;

use crate::{
    events::Event,
    Handlers,
};

/// One entry of `GET /documents/{id}/assets`: the asset's own id, its
/// current URL, and a URL-safe slug derived from the id (spec §6.1).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetListEntry {
    pub slug: String,
    pub id: String,
    pub url: String,
}

impl Handlers {
    /// Registers a brand-new document. Fails with
    /// [`KernelError::AlreadyExists`] if `id` is already in use — the
    /// update path is [`Handlers::register_document_version`].
    pub async fn register_document(
        &self,
        id: &str,
        data_url: &str,
        assets: &[(String, String)],
    ) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut document = Document::new(id);
        document.new_version(data_url, self.fetcher.as_ref(), self.timeout, manifest::Timestamp::now).await?;
        for (asset_id, asset_url) in assets {
            document.new_asset_version(asset_id, asset_url, manifest::Timestamp::now)?;
        }
        session.documents.add(&document).await?;
        let timestamp = document.version(-1)?.timestamp();
        session.notify(Event::DocumentRegistered, json!({"id": id, "timestamp": timestamp.to_string()})).await;
        Ok(())
    }

    /// Registers a new version of an already-registered document.
    /// `VersionAlreadySet` surfaces unchanged — the HTTP boundary treats it
    /// as an idempotent no-op (spec §7).
    pub async fn register_document_version(
        &self,
        id: &str,
        data_url: &str,
        assets: &[(String, String)],
    ) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut document = session.documents.fetch(id).await?;
        document.new_version(data_url, self.fetcher.as_ref(), self.timeout, manifest::Timestamp::now).await?;
        for (asset_id, asset_url) in assets {
            document.new_asset_version(asset_id, asset_url, manifest::Timestamp::now)?;
        }
        session.documents.update(&document).await?;
        let timestamp = document.version(-1)?.timestamp();
        session.notify(Event::DocumentVersionRegistered, json!({"id": id, "timestamp": timestamp.to_string()})).await;
        Ok(())
    }

    /// Materialises the requested version's XML, rewriting asset
    /// `xlink:href`s to their resolved historical URIs. `version_at`, when
    /// given, takes priority over `version_index`.
    pub async fn fetch_document_data(
        &self,
        id: &str,
        version_index: i64,
        version_at: Option<&str>,
    ) -> Result<Vec<u8>, KernelError> {
        let session = self.session().await?;
        let document = session.documents.fetch(id).await?;
        document.data(version_index, version_at, self.fetcher.as_ref(), self.timeout).await
    }

    pub async fn fetch_document_manifest(&self, id: &str) -> Result<Manifest, KernelError> {
        let session = self.session().await?;
        let document = session.documents.fetch(id).await?;
        Ok(document.into_manifest())
    }

    /// Latest version's assets as `{slug, id, url}` entries, slugs derived
    /// via the same URL-safe transform `kernel_http` uses to route
    /// `PUT /documents/{id}/assets/{slug}` back to an asset id.
    pub async fn fetch_document_assets(&self, id: &str) -> Result<Vec<AssetListEntry>, KernelError> {
        let session = self.session().await?;
        let document = session.documents.fetch(id).await?;
        match document.version(-1)? {
            DocumentVersion::Live { assets, .. } => Ok(assets
                .into_iter()
                .map(|(asset_id, url)| AssetListEntry { slug: slug::slugify(&asset_id), id: asset_id, url })
                .collect()),
            DocumentVersion::Deleted { .. } => Err(KernelError::DeletedVersion),
        }
    }

    pub async fn register_asset_version(
        &self,
        id: &str,
        asset_id: &str,
        asset_url: &str,
    ) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut document = session.documents.fetch(id).await?;
        document.new_asset_version(asset_id, asset_url, manifest::Timestamp::now)?;
        session.documents.update(&document).await?;
        let timestamp = document.version(-1)?.timestamp();
        session
            .notify(
                Event::AssetVersionRegistered,
                json!({"id": id, "asset_id": asset_id, "timestamp": timestamp.to_string()}),
            )
            .await;
        Ok(())
    }

    pub async fn register_rendition_version(
        &self,
        id: &str,
        filename: &str,
        data_url: &str,
        mimetype: &str,
        lang: &str,
        size_bytes: u64,
    ) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut document = session.documents.fetch(id).await?;
        document.new_rendition_version(filename, data_url, mimetype, lang, size_bytes, manifest::Timestamp::now)?;
        session.documents.update(&document).await?;
        let timestamp = document.version(-1)?.timestamp();
        session
            .notify(
                Event::RenditionVersionRegistered,
                json!({"id": id, "filename": filename, "timestamp": timestamp.to_string()}),
            )
            .await;
        Ok(())
    }

    pub async fn fetch_document_renditions(
        &self,
        id: &str,
        version_index: i64,
        version_at: Option<&str>,
    ) -> Result<Vec<RenditionView>, KernelError> {
        let session = self.session().await?;
        let document = session.documents.fetch(id).await?;
        let version = match version_at {
            Some(ts) => document.version_at(ts)?,
            None => document.version(version_index)?,
        };
        match version {
            DocumentVersion::Live { renditions, .. } => Ok(renditions),
            DocumentVersion::Deleted { .. } => Ok(Vec::new()),
        }
    }

    /// Tombstones the document. A second call against an already-deleted
    /// document fails with `VersionAlreadySet`, treated the same
    /// idempotent way every other retryable error is at the HTTP boundary.
    pub async fn delete_document(&self, id: &str) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut document = session.documents.fetch(id).await?;
        document.new_deleted_version(manifest::Timestamp::now)?;
        session.documents.update(&document).await?;
        let timestamp = document.version(-1)?.timestamp();
        session.notify(Event::DocumentDeleted, json!({"id": id, "timestamp": timestamp.to_string()})).await;
        Ok(())
    }

    /// Unified diff between two materialised versions' byte content,
    /// selected by `version_at` timestamp. `to_version_at` absent means
    /// "the latest version", labelled `latest` in the diff header, exactly
    /// as `DiffDocumentVersions` does in the original.
    pub async fn diff_document_versions(
        &self,
        id: &str,
        from_version_at: &str,
        to_version_at: Option<&str>,
    ) -> Result<String, KernelError> {
        let session = self.session().await?;
        let document = session.documents.fetch(id).await?;

        let from_bytes = document.data(-1, Some(from_version_at), self.fetcher.as_ref(), self.timeout).await?;
        let to_bytes = document.data(-1, to_version_at, self.fetcher.as_ref(), self.timeout).await?;

        let from_text = String::from_utf8_lossy(&from_bytes);
        let to_text = String::from_utf8_lossy(&to_bytes);
        let to_label = to_version_at.unwrap_or("latest");

        let diff = similar::TextDiff::from_lines(from_text.as_ref(), to_text.as_ref());
        Ok(diff.unified_diff().header(from_version_at, to_label).to_string())
    }
}

/// Materialised response shape for `GET /documents/{id}/manifest`
/// (`application/json` raw manifest, spec §6.1).
pub fn manifest_to_json(manifest: &Manifest) -> Value {
    serde_json::to_value(manifest).expect("Manifest serialization never fails")
}
