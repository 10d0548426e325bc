//! `Session`: a short-lived unit of work bundling the three repositories,
//! the change log, and a publish/subscribe event bus, mirroring
//! `documentstore/interfaces.py::Session` and `adapters.py::Session`
//! (spec §4.6).
//!
//! Generic over the event type so this crate never needs to depend on
//! `application`'s `Events` enum — the dependency points the other way.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::Arc,
};

use errors::KernelError;
use futures::future::BoxFuture;
use serde_json::Value;
use storage::{
    BundleRepository,
    ChangesStore,
    DocumentRepository,
    JournalRepository,
    MongoHandle,
};

/// A subscriber: receives the event payload and the session it fired on,
/// matching `callback(data, self)` in the original. Change-log writes are
/// themselves a database round-trip, so the callback hands back a boxed
/// future rather than running synchronously; `notify` awaits each one in
/// turn before moving to the next (spec §4.6's isolation requirement still
/// applies — a failed future is logged, not propagated, and never stops
/// the remaining subscribers).
pub type Callback<E> =
    Arc<dyn for<'a> Fn(&'a Value, &'a Session<E>) -> BoxFuture<'a, Result<(), KernelError>> + Send + Sync>;

pub struct Session<E> {
    pub documents: DocumentRepository,
    pub documents_bundles: BundleRepository,
    pub journals: JournalRepository,
    pub changes: ChangesStore,
    observers: HashMap<E, Vec<Callback<E>>>,
}

impl<E> Session<E>
where
    E: Eq + Hash + Clone,
{
    pub async fn connect(mongo: &MongoHandle) -> Result<Self, KernelError> {
        let db = mongo.database().await?;
        Ok(Self {
            documents: DocumentRepository::new(&db),
            documents_bundles: BundleRepository::new(&db),
            journals: JournalRepository::new(&db),
            changes: ChangesStore::new(&db),
            observers: HashMap::new(),
        })
    }

    /// Registers `callback` for `event`. Deduplicated by callback identity
    /// (`Arc::ptr_eq`), matching the original's behavior of a plain `list`
    /// accepting the same function object twice only tolerating it because
    /// Python never deduplicates — this rendition is intentionally
    /// stricter per spec §4.6's explicit "duplicate registrations are
    /// deduplicated" requirement.
    pub fn observe(&mut self, event: E, callback: Callback<E>) {
        let callbacks = self.observers.entry(event).or_default();
        if callbacks.iter().any(|existing| Arc::ptr_eq(existing, &callback)) {
            return;
        }
        callbacks.push(callback);
    }

    /// Number of subscribers currently registered for `event`. Mainly
    /// useful for verifying a handler factory's default subscriber set
    /// installs exactly one callback per event (spec §8.3).
    pub fn subscriber_count(&self, event: &E) -> usize {
        self.observers.get(event).map_or(0, Vec::len)
    }

    /// Invokes every callback registered for `event` with `data`, in
    /// registration order. A callback's failure is logged and does not
    /// stop, or get surfaced to, the remaining callbacks (spec §4.6's
    /// isolation requirement).
    pub async fn notify(&self, event: E, data: Value)
    where
        E: std::fmt::Debug,
    {
        let Some(callbacks) = self.observers.get(&event) else { return };
        for callback in callbacks {
            if let Err(err) = callback(&data, self).await {
                tracing::error!(?event, %err, "observer callback failed; continuing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{
            AtomicUsize,
            Ordering,
        },
        Mutex,
    };

    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestEvent {
        Registered,
    }

    // `MongoHandle::database()` only resolves the client and calls
    // `Client::database`, neither of which performs network I/O — the
    // driver connects lazily on the first real command. This lets the
    // observer table be exercised against a real `Session` without a
    // reachable MongoDB instance.
    async fn bare_session() -> Session<TestEvent> {
        let mongo = MongoHandle::new("mongodb://localhost:27017", "kernel_test");
        Session::connect(&mongo).await.expect("constructing a Session performs no I/O")
    }

    #[tokio::test]
    async fn duplicate_callback_registrations_are_deduplicated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let callback: Callback<TestEvent> = Arc::new(move |_data, _session| {
            let calls = calls_clone.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });

        let mut session = bare_session().await;
        session.observe(TestEvent::Registered, callback.clone());
        session.observe(TestEvent::Registered, callback.clone());
        session.notify(TestEvent::Registered, json!({})).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_failing_observer_does_not_prevent_later_ones_from_running() {
        let second_ran = Arc::new(Mutex::new(false));
        let second_ran_clone = second_ran.clone();

        let mut session = bare_session().await;
        session.observe(
            TestEvent::Registered,
            Arc::new(|_data, _session| Box::pin(async { Err(KernelError::Terminal("boom".to_string())) })),
        );
        session.observe(
            TestEvent::Registered,
            Arc::new(move |_data, _session| {
                let second_ran = second_ran_clone.clone();
                Box::pin(async move {
                    *second_ran.lock().unwrap() = true;
                    Ok(())
                })
            }),
        );
        session.notify(TestEvent::Registered, json!({})).await;

        assert!(*second_ran.lock().unwrap());
    }
}
