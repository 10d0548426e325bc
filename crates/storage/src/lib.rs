//! MongoDB-backed persistence: one collection per entity kind plus the
//! append-only change log, mirroring `documentstore/adapters.py`
//! (spec §4.5).

pub mod admin;
pub mod changes;
pub mod client;
pub mod repository;

pub use changes::{
    ChangeRecord,
    ChangesStore,
    DEFAULT_LIMIT,
};
pub use client::MongoHandle;
pub use repository::{
    BundleRepository,
    DocumentRepository,
    JournalRepository,
    Repository,
};
