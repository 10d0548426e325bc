//! `DocumentsBundle` handlers: create, fetch, metadata updates, document
//! list operations, grounded on `services.py`'s `CreateDocumentsBundle`/
//! `FetchDocumentsBundle`/`UpdateDocumentsBundleMetadata`/
//! `AddDocumentToDocumentsBundle`/`InsertDocumentToDocumentsBundle`/
//! `UpdateDocumentInDocumentsBundle` (spec §4.3, §4.7).

use serde_json::{
    json,
    Map,
    Value,
};

use errors::KernelError;
use manifest::Timestamp;
use model::DocumentsBundle;
use storage::Repository;

use crate::{
    events::Event,
    Handlers,
};

/// Applies a `{field: value}` metadata bag to a bundle via its typed
/// accessors, matching the original's generic `setattr(bundle, name,
/// value)` loop but validated per field instead of accepting anything a
/// Python object would.
fn apply_metadata(bundle: &mut DocumentsBundle, metadata: &Map<String, Value>) -> Result<(), KernelError> {
    for (name, value) in metadata {
        match name.as_str() {
            "publication_year" => {
                let value = expect_str(name, value)?;
                bundle.set_publication_year(value, Timestamp::now)?;
            },
            "volume" => bundle.set_volume(expect_str(name, value)?, Timestamp::now),
            "number" => bundle.set_number(expect_str(name, value)?, Timestamp::now),
            "supplement" => bundle.set_supplement(expect_str(name, value)?, Timestamp::now),
            "titles" => bundle.set_titles(expect_object_array(name, value)?, Timestamp::now),
            other => {
                return Err(KernelError::InvalidMetadata {
                    field: "metadata",
                    reason: format!("unknown documents-bundle metadata field \"{other}\""),
                })
            },
        }
    }
    Ok(())
}


fn expect_str<'a>(field: &'static str, value: &'a Value) -> Result<&'a str, KernelError> {
    value
        .as_str()
        .ok_or_else(|| KernelError::InvalidMetadata { field, reason: "expected a string".to_string() })
}

fn expect_object_array(field: &'static str, value: &Value) -> Result<Vec<Map<String, Value>>, KernelError> {
    let Value::Array(items) = value else {
        return Err(KernelError::InvalidMetadata { field, reason: "expected an array of objects".to_string() });
    };
    items
        .iter()
        .map(|item| match item {
            Value::Object(obj) => Ok(obj.clone()),
            _ => Err(KernelError::InvalidMetadata { field, reason: "expected an array of objects".to_string() }),
        })
        .collect()
}

impl Handlers {
    pub async fn create_documents_bundle(
        &self,
        id: &str,
        docs: &[String],
        metadata: &Map<String, Value>,
    ) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut bundle = DocumentsBundle::new(id, Timestamp::now);
        for doc in docs {
            bundle.add_document(doc, Timestamp::now)?;
        }
        apply_metadata(&mut bundle, metadata)?;
        session.documents_bundles.add(&bundle).await?;
        session
            .notify(Event::DocumentsBundleCreated, json!({"id": id, "timestamp": bundle.manifest().updated.to_string()}))
            .await;
        Ok(())
    }

    pub async fn fetch_documents_bundle(&self, id: &str) -> Result<Value, KernelError> {
        let session = self.session().await?;
        Ok(session.documents_bundles.fetch(id).await?.data())
    }

    pub async fn update_documents_bundle_metadata(
        &self,
        id: &str,
        metadata: &Map<String, Value>,
    ) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut bundle = session.documents_bundles.fetch(id).await?;
        apply_metadata(&mut bundle, metadata)?;
        session.documents_bundles.update(&bundle).await?;
        session
            .notify(
                Event::DocumentsBundleMetadataUpdated,
                json!({"id": id, "timestamp": bundle.manifest().updated.to_string()}),
            )
            .await;
        Ok(())
    }

    pub async fn add_document_to_documents_bundle(&self, id: &str, doc: &str) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut bundle = session.documents_bundles.fetch(id).await?;
        bundle.add_document(doc, Timestamp::now)?;
        session.documents_bundles.update(&bundle).await?;
        session
            .notify(
                Event::DocumentAddedToDocumentsBundle,
                json!({"id": id, "doc": doc, "timestamp": bundle.manifest().updated.to_string()}),
            )
            .await;
        Ok(())
    }

    pub async fn insert_document_to_documents_bundle(
        &self,
        id: &str,
        index: i64,
        doc: &str,
    ) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut bundle = session.documents_bundles.fetch(id).await?;
        bundle.insert_document(index, doc, Timestamp::now)?;
        session.documents_bundles.update(&bundle).await?;
        session
            .notify(
                Event::DocumentInsertedToDocumentsBundle,
                json!({"id": id, "doc": doc, "index": index, "timestamp": bundle.manifest().updated.to_string()}),
            )
            .await;
        Ok(())
    }

    /// Replaces the bundle's whole document list: logically `remove_all;
    /// add_each(docs)`, matching `UpdateDocumentInDocumentsBundle`.
    pub async fn update_documents_in_documents_bundle(&self, id: &str, docs: &[String]) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut bundle = session.documents_bundles.fetch(id).await?;
        bundle.update_documents(docs, Timestamp::now)?;
        session.documents_bundles.update(&bundle).await?;
        session
            .notify(Event::IssueDocumentsUpdated, json!({"id": id, "timestamp": bundle.manifest().updated.to_string()}))
            .await;
        Ok(())
    }
}
