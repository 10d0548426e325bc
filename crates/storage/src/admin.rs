//! Index and collection bootstrap, mirroring `adapters.MongoDB`'s
//! `create_indexes`/`create_collections` admin operations, driven by
//! `kernel_cli`'s `create-indexes`/`create-collections` subcommands
//! (spec §4.5, §6.2).

use mongodb::{
    bson::doc,
    options::IndexOptions,
    Database,
    IndexModel,
};

use errors::KernelError;

use crate::{
    changes::ChangesStore,
    repository::{
        BundleRepository,
        DocumentRepository,
        JournalRepository,
    },
};

const ENTITY_COLLECTIONS: [&str; 4] = [
    DocumentRepository::COLLECTION_NAME,
    BundleRepository::COLLECTION_NAME,
    JournalRepository::COLLECTION_NAME,
    ChangesStore::COLLECTION_NAME,
];

fn to_terminal(kind: &str, err: mongodb::error::Error) -> KernelError {
    KernelError::Terminal(format!("mongodb error while creating {kind}: {err}"))
}

/// Creates every collection explicitly, required for transactional mode on
/// MongoDB versions below 4.4 where an implicit first-write collection
/// creation can't happen inside a transaction.
pub async fn create_collections(db: &Database) -> Result<(), KernelError> {
    for name in ENTITY_COLLECTIONS {
        match db.create_collection(name).await {
            Ok(()) => {},
            // Already exists: same idempotent no-op the original's
            // best-effort collection bootstrap allows.
            Err(err) if is_namespace_exists(&err) => {},
            Err(err) => return Err(to_terminal(name, err)),
        }
    }
    Ok(())
}

fn is_namespace_exists(err: &mongodb::error::Error) -> bool {
    use mongodb::error::ErrorKind;
    matches!(err.kind.as_ref(), ErrorKind::Command(command_error) if command_error.code == 48)
}

/// Creates the unique indexes every `_id` collection gets implicitly from
/// MongoDB plus the one index this system actually needs explicitly: the
/// change log's uniqueness constraint on `timestamp`, the mechanism that
/// turns a clock-skew collision into a surfaced `AlreadyExists` (spec §5).
pub async fn create_indexes(db: &Database) -> Result<(), KernelError> {
    let changes: mongodb::Collection<mongodb::bson::Document> = db.collection(ChangesStore::COLLECTION_NAME);
    let index = IndexModel::builder()
        .keys(doc! { "timestamp": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();
    changes.create_index(index).await.map_err(|err| to_terminal("changes.timestamp index", err))?;
    Ok(())
}
