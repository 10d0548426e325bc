//! The complete domain event taxonomy (spec §4.7) and the default
//! change-log subscriber set every handler factory installs (spec §8.3),
//! mirroring `documentstore/services.py`'s `Events` enum and
//! `DEFAULT_SUBSCRIBERS` list one-for-one.

use serde_json::Value;
use session::{
    Callback,
    Session,
};
use storage::ChangeRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    DocumentRegistered,
    DocumentVersionRegistered,
    AssetVersionRegistered,
    RenditionVersionRegistered,
    DocumentDeleted,
    DocumentsBundleCreated,
    DocumentsBundleMetadataUpdated,
    DocumentAddedToDocumentsBundle,
    DocumentInsertedToDocumentsBundle,
    IssueDocumentsUpdated,
    JournalCreated,
    JournalMetadataUpdated,
    IssueAddedToJournal,
    IssueInsertedToJournal,
    IssueRemovedFromJournal,
    JournalIssuesUpdated,
    AheadOfPrintBundleSetToJournal,
    AheadOfPrintBundleRemovedFromJournal,
}

/// The four entity tags a change-log record can carry (spec §3.3).
#[derive(Debug, Clone, Copy)]
enum EntityKind {
    Document,
    DocumentsBundle,
    Journal,
    DocumentRendition,
}

impl EntityKind {
    fn as_str(self) -> &'static str {
        match self {
            EntityKind::Document => "Document",
            EntityKind::DocumentsBundle => "DocumentsBundle",
            EntityKind::Journal => "Journal",
            EntityKind::DocumentRendition => "DocumentRendition",
        }
    }
}

/// Installs one change-log subscriber per event in the taxonomy, tagged
/// with the entity kind that event affects and `deleted=true` for
/// `DocumentDeleted`, matching `services.DEFAULT_SUBSCRIBERS` (spec §8.3).
pub fn install_default_subscribers(session: &mut Session<Event>) {
    let subscribers: &[(Event, EntityKind, bool)] = &[
        (Event::DocumentRegistered, EntityKind::Document, false),
        (Event::DocumentVersionRegistered, EntityKind::Document, false),
        (Event::AssetVersionRegistered, EntityKind::Document, false),
        (Event::RenditionVersionRegistered, EntityKind::DocumentRendition, false),
        (Event::DocumentDeleted, EntityKind::Document, true),
        (Event::DocumentsBundleCreated, EntityKind::DocumentsBundle, false),
        (Event::DocumentsBundleMetadataUpdated, EntityKind::DocumentsBundle, false),
        (Event::DocumentAddedToDocumentsBundle, EntityKind::DocumentsBundle, false),
        (Event::DocumentInsertedToDocumentsBundle, EntityKind::DocumentsBundle, false),
        (Event::IssueDocumentsUpdated, EntityKind::DocumentsBundle, false),
        (Event::JournalCreated, EntityKind::Journal, false),
        (Event::JournalMetadataUpdated, EntityKind::Journal, false),
        (Event::IssueAddedToJournal, EntityKind::Journal, false),
        (Event::IssueInsertedToJournal, EntityKind::Journal, false),
        (Event::IssueRemovedFromJournal, EntityKind::Journal, false),
        (Event::JournalIssuesUpdated, EntityKind::Journal, false),
        (Event::AheadOfPrintBundleSetToJournal, EntityKind::Journal, false),
        (Event::AheadOfPrintBundleRemovedFromJournal, EntityKind::Journal, false),
    ];
    for (event, entity, deleted) in subscribers.iter().copied() {
        session.observe(event, change_log_subscriber(entity, deleted));
    }
}

#[cfg(test)]
mod tests {
    use storage::MongoHandle;

    use super::*;

    const ALL_EVENTS: [Event; 18] = [
        Event::DocumentRegistered,
        Event::DocumentVersionRegistered,
        Event::AssetVersionRegistered,
        Event::RenditionVersionRegistered,
        Event::DocumentDeleted,
        Event::DocumentsBundleCreated,
        Event::DocumentsBundleMetadataUpdated,
        Event::DocumentAddedToDocumentsBundle,
        Event::DocumentInsertedToDocumentsBundle,
        Event::IssueDocumentsUpdated,
        Event::JournalCreated,
        Event::JournalMetadataUpdated,
        Event::IssueAddedToJournal,
        Event::IssueInsertedToJournal,
        Event::IssueRemovedFromJournal,
        Event::JournalIssuesUpdated,
        Event::AheadOfPrintBundleSetToJournal,
        Event::AheadOfPrintBundleRemovedFromJournal,
    ];

    // `Session::connect` resolves no I/O (the mongodb driver connects
    // lazily), so this exercises the subscriber table against a real
    // `Session` without a reachable MongoDB instance, matching
    // `session`'s own test helper.
    async fn bare_session() -> Session<Event> {
        let mongo = MongoHandle::new("mongodb://localhost:27017", "kernel_test");
        Session::connect(&mongo).await.expect("constructing a Session performs no I/O")
    }

    #[tokio::test]
    async fn installs_exactly_one_subscriber_per_event_in_the_taxonomy() {
        let mut session = bare_session().await;
        install_default_subscribers(&mut session);
        for event in ALL_EVENTS {
            assert_eq!(session.subscriber_count(&event), 1, "{event:?} should have exactly one subscriber");
        }
    }
}

/// Builds the callback that appends one [`ChangeRecord`] per notification,
/// reading `id` out of the event payload (every handler supplies it, per
/// `log_change`'s `data["id"]` lookup in the original) and stamping the
/// record with its own fresh `now()` rather than the payload's
/// `timestamp` — an asset/rendition append doesn't advance the version's
/// own timestamp (manifest::algebra keeps that per-version), so reusing
/// it here would collide with the change record already written for that
/// version under the change log's unique `timestamp` index, and the
/// second write would be silently dropped by `Session::notify`'s
/// best-effort error isolation. `log_change` in the original stamps every
/// record with a fresh `utcnow()` for the same reason.
fn change_log_subscriber(entity: EntityKind, deleted: bool) -> Callback<Event> {
    std::sync::Arc::new(move |data: &Value, session: &Session<Event>| {
        let entity = entity.as_str();
        let id = data.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        let timestamp = manifest::Timestamp::now().to_string();
        Box::pin(async move {
            let record = ChangeRecord {
                timestamp,
                entity: entity.to_string(),
                id,
                deleted: deleted.then_some(true),
            };
            session.changes.add(record).await
        })
    })
}
