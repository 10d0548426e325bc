//! The change feed read path: `fetch_changes`, mirroring
//! `services.py`'s `FetchChanges` (spec §4.5, §6.1). It is a pure read —
//! unlike every other handler in this crate it never mutates state or
//! emits an event.

use errors::KernelError;
use storage::ChangeRecord;

use crate::Handlers;

impl Handlers {
    /// Entries strictly after `since`, ascending by timestamp, capped at
    /// `limit` (defaulting to [`storage::DEFAULT_LIMIT`]).
    pub async fn fetch_changes(&self, since: &str, limit: Option<i64>) -> Result<Vec<ChangeRecord>, KernelError> {
        let session = self.session().await?;
        session.changes.filter(since, limit).await
    }
}
