//! Command handlers: one per use case, each opening a fresh [`Session`],
//! mutating an aggregate, persisting it and emitting a domain event,
//! mirroring `documentstore/services.py`'s `CommandHandler` subclasses and
//! `get_handlers` factory one-for-one (spec §4.7).
//!
//! `Handlers` is the factory: it owns the collaborators every use case
//! needs (the lazy Mongo handle, the object-store client, the fetch
//! timeout) and hands out a freshly-wired [`Session`] — with the default
//! change-log subscribers already installed — to each handler method.

pub mod bundle;
pub mod changes;
pub mod document;
pub mod events;
pub mod journal;

use std::{
    sync::Arc,
    time::Duration,
};

use errors::KernelError;
use object_store::FetchAssets;
use session::Session;
use storage::MongoHandle;

pub use events::Event;

pub struct Handlers {
    mongo: MongoHandle,
    fetcher: Arc<dyn FetchAssets>,
    timeout: Duration,
}

impl Handlers {
    pub fn new(mongo: MongoHandle, fetcher: Arc<dyn FetchAssets>, timeout: Duration) -> Self {
        Self { mongo, fetcher, timeout }
    }

    /// Produces a fresh `Session` with the default change-log subscriber
    /// set already installed, matching `services.get_handlers`'s
    /// `SessionWrapper` (spec §8.3).
    async fn session(&self) -> Result<Session<Event>, KernelError> {
        let mut session = Session::connect(&self.mongo).await?;
        events::install_default_subscribers(&mut session);
        Ok(session)
    }
}

/// Every list/object-shaped handler argument that carries open-schema
/// key/value metadata, re-exported so callers don't need to depend on
/// `serde_json` directly just to build one.
pub type Metadata = serde_json::Map<String, serde_json::Value>;
