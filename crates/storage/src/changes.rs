//! Append-only change-log store, mirroring `documentstore/services.py`'s
//! `log_change` record shape and `interfaces.ChangesDataStore` contract
//! (spec §4.5).

use futures::stream::TryStreamExt;
use mongodb::{
    bson::doc,
    options::FindOptions,
    Collection,
    Database,
};
use serde::{
    Deserialize,
    Serialize,
};

use errors::KernelError;
use crate::repository::is_duplicate_key;

pub const DEFAULT_LIMIT: i64 = 500;

/// One entry in the change feed: which entity kind changed, its id, when,
/// and whether the change was a deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub timestamp: String,
    pub entity: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

pub struct ChangesStore {
    collection: Collection<ChangeRecord>,
}

impl ChangesStore {
    pub const COLLECTION_NAME: &'static str = "changes";

    pub fn new(db: &Database) -> Self {
        Self { collection: db.collection(Self::COLLECTION_NAME) }
    }

    /// Inserts `record`. A clash on `timestamp`'s unique index surfaces as
    /// [`KernelError::AlreadyExists`], the same way a `(event, now())`
    /// collision does in the original — the handler is expected to retry
    /// with a fresh timestamp (spec §5's ordering guarantees).
    pub async fn add(&self, record: ChangeRecord) -> Result<(), KernelError> {
        self.collection.insert_one(&record).await.map_err(|err| {
            if is_duplicate_key(&err) {
                KernelError::AlreadyExists { kind: "change", id: record.timestamp.clone() }
            } else {
                KernelError::Terminal(format!("mongodb error while appending a change: {err}"))
            }
        })?;
        Ok(())
    }

    /// Entries with `timestamp > since`, ascending, capped at `limit`
    /// (defaulting to [`DEFAULT_LIMIT`]). Lexical string comparison is
    /// correct here because every timestamp is rendered in fixed-width
    /// ISO-8601 UTC form (spec §4.5).
    pub async fn filter(&self, since: &str, limit: Option<i64>) -> Result<Vec<ChangeRecord>, KernelError> {
        let filter = if since.is_empty() { doc! {} } else { doc! { "timestamp": { "$gt": since } } };
        let options = FindOptions::builder()
            .sort(doc! { "timestamp": 1 })
            .limit(limit.unwrap_or(DEFAULT_LIMIT))
            .build();

        let mut cursor = self
            .collection
            .find(filter)
            .with_options(options)
            .await
            .map_err(|err| KernelError::Terminal(format!("mongodb error while filtering changes: {err}")))?;

        let mut records = Vec::new();
        while let Some(record) = cursor
            .try_next()
            .await
            .map_err(|err| KernelError::Terminal(format!("mongodb error while reading changes: {err}")))?
        {
            records.push(record);
        }
        Ok(records)
    }
}
