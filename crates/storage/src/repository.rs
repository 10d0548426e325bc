//! `Repository<T>` persists an entity's manifest by its primary id, mirroring
//! `documentstore/adapters.py`'s `DocumentStore` one-for-one, generalised to
//! the three entity kinds (spec §4.5, §4.6).

use async_trait::async_trait;
use manifest::Manifest;
use mongodb::{
    bson::doc,
    Collection,
    Database,
};
use serde::{
    Deserialize,
    Serialize,
};

use errors::KernelError;
use model::{
    bundle::BundleManifest,
    Document,
    DocumentsBundle,
    Journal,
};

#[async_trait]
pub trait Repository<T>: Send + Sync {
    async fn add(&self, entity: &T) -> Result<(), KernelError>;
    async fn update(&self, entity: &T) -> Result<(), KernelError>;
    async fn fetch(&self, id: &str) -> Result<T, KernelError>;
}

/// True when `err` is a MongoDB duplicate-key write error (code 11000),
/// the same signal `pymongo.errors.DuplicateKeyError` carries in the
/// original adapter.
pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::ErrorKind;
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(mongodb::error::WriteFailure::WriteError(we)) if we.code == 11_000
    )
}

fn transport_error(kind: &'static str, err: mongodb::error::Error) -> KernelError {
    KernelError::Terminal(format!("mongodb error while accessing {kind}: {err}"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredManifest {
    #[serde(rename = "_id")]
    id: String,
    #[serde(flatten)]
    manifest: Manifest,
}

pub struct DocumentRepository {
    collection: Collection<StoredManifest>,
}

impl DocumentRepository {
    pub const COLLECTION_NAME: &'static str = "documents";
    pub const KIND: &'static str = "document";

    pub fn new(db: &Database) -> Self {
        Self { collection: db.collection(Self::COLLECTION_NAME) }
    }
}

#[async_trait]
impl Repository<Document> for DocumentRepository {
    async fn add(&self, entity: &Document) -> Result<(), KernelError> {
        let manifest = entity.manifest().clone();
        let stored = StoredManifest { id: manifest.id.clone(), manifest };
        self.collection.insert_one(stored).await.map_err(|err| {
            if is_duplicate_key(&err) {
                KernelError::AlreadyExists { kind: Self::KIND, id: entity.id().to_string() }
            } else {
                transport_error(Self::KIND, err)
            }
        })?;
        Ok(())
    }

    async fn update(&self, entity: &Document) -> Result<(), KernelError> {
        let manifest = entity.manifest().clone();
        let stored = StoredManifest { id: manifest.id.clone(), manifest };
        let result = self
            .collection
            .replace_one(doc! { "_id": entity.id() }, stored)
            .await
            .map_err(|err| transport_error(Self::KIND, err))?;
        if result.matched_count == 0 {
            return Err(KernelError::DoesNotExist { kind: Self::KIND, id: entity.id().to_string() });
        }
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Document, KernelError> {
        let stored = self
            .collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(|err| transport_error(Self::KIND, err))?
            .ok_or_else(|| KernelError::DoesNotExist { kind: Self::KIND, id: id.to_string() })?;
        Ok(Document::from_manifest(stored.manifest))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredBundle {
    #[serde(rename = "_id")]
    id: String,
    #[serde(flatten)]
    manifest: BundleManifest,
}

pub struct BundleRepository {
    collection: Collection<StoredBundle>,
}

impl BundleRepository {
    pub const COLLECTION_NAME: &'static str = "documents_bundles";
    pub const KIND: &'static str = "documents_bundle";

    pub fn new(db: &Database) -> Self {
        Self { collection: db.collection(Self::COLLECTION_NAME) }
    }
}

#[async_trait]
impl Repository<DocumentsBundle> for BundleRepository {
    async fn add(&self, entity: &DocumentsBundle) -> Result<(), KernelError> {
        let manifest = entity.manifest().clone();
        let stored = StoredBundle { id: manifest.id.clone(), manifest };
        self.collection.insert_one(stored).await.map_err(|err| {
            if is_duplicate_key(&err) {
                KernelError::AlreadyExists { kind: Self::KIND, id: entity.id().to_string() }
            } else {
                transport_error(Self::KIND, err)
            }
        })?;
        Ok(())
    }

    async fn update(&self, entity: &DocumentsBundle) -> Result<(), KernelError> {
        let manifest = entity.manifest().clone();
        let stored = StoredBundle { id: manifest.id.clone(), manifest };
        let result = self
            .collection
            .replace_one(doc! { "_id": entity.id() }, stored)
            .await
            .map_err(|err| transport_error(Self::KIND, err))?;
        if result.matched_count == 0 {
            return Err(KernelError::DoesNotExist { kind: Self::KIND, id: entity.id().to_string() });
        }
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<DocumentsBundle, KernelError> {
        let stored = self
            .collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(|err| transport_error(Self::KIND, err))?
            .ok_or_else(|| KernelError::DoesNotExist { kind: Self::KIND, id: id.to_string() })?;
        Ok(DocumentsBundle::from_manifest(stored.manifest))
    }
}

pub struct JournalRepository {
    collection: Collection<StoredBundle>,
}

impl JournalRepository {
    pub const COLLECTION_NAME: &'static str = "journals";
    pub const KIND: &'static str = "journal";

    pub fn new(db: &Database) -> Self {
        Self { collection: db.collection(Self::COLLECTION_NAME) }
    }
}

#[async_trait]
impl Repository<Journal> for JournalRepository {
    async fn add(&self, entity: &Journal) -> Result<(), KernelError> {
        let manifest = entity.manifest().clone();
        let stored = StoredBundle { id: manifest.id.clone(), manifest };
        self.collection.insert_one(stored).await.map_err(|err| {
            if is_duplicate_key(&err) {
                KernelError::AlreadyExists { kind: Self::KIND, id: entity.id().to_string() }
            } else {
                transport_error(Self::KIND, err)
            }
        })?;
        Ok(())
    }

    async fn update(&self, entity: &Journal) -> Result<(), KernelError> {
        let manifest = entity.manifest().clone();
        let stored = StoredBundle { id: manifest.id.clone(), manifest };
        let result = self
            .collection
            .replace_one(doc! { "_id": entity.id() }, stored)
            .await
            .map_err(|err| transport_error(Self::KIND, err))?;
        if result.matched_count == 0 {
            return Err(KernelError::DoesNotExist { kind: Self::KIND, id: entity.id().to_string() });
        }
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Journal, KernelError> {
        let stored = self
            .collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(|err| transport_error(Self::KIND, err))?
            .ok_or_else(|| KernelError::DoesNotExist { kind: Self::KIND, id: id.to_string() })?;
        Ok(Journal::from_manifest(stored.manifest))
    }
}
