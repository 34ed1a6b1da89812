//! Change-feed plumbing: subscription handles and version-based snapshot
//! reconciliation for optimistic local views.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{events::DomainEvent, store::Document};

/// A standing change-feed subscription. Must be released with [`close`]
/// (or by dropping the handle) when no longer needed, otherwise the listener
/// keeps receiving and forwarding events indefinitely.
///
/// [`close`]: Subscription::close
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<DomainEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<DomainEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self { rx, task }
    }

    /// Next event, or `None` once the feed is closed.
    pub async fn next_event(&mut self) -> Option<DomainEvent> {
        self.rx.recv().await
    }

    /// Non-blocking drain of everything currently buffered.
    pub fn drain(&mut self) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Release the listener. Idempotent.
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.rx.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// A client-local view of one collection, reconciled against incoming
/// documents by per-document version rather than blind overwrite: a stale
/// snapshot can never clobber a newer local document.
#[derive(Debug, Default)]
pub struct DocumentView<T> {
    docs: HashMap<String, T>,
}

impl<T: Document> DocumentView<T> {
    pub fn new() -> Self {
        Self { docs: HashMap::new() }
    }

    pub fn get(&self, doc_id: &str) -> Option<&T> {
        self.docs.get(doc_id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.docs.values()
    }

    /// Apply one incoming document. Returns whether the view changed.
    pub fn apply(&mut self, incoming: T) -> bool {
        match self.docs.get(incoming.doc_id()) {
            Some(existing) if existing.version() >= incoming.version() => false,
            _ => {
                self.docs.insert(incoming.doc_id().to_string(), incoming);
                true
            }
        }
    }

    /// Insert a locally-applied, not-yet-confirmed document (version 0).
    /// Snapshot reconciliation will not evict it until a confirmed version
    /// arrives.
    pub fn apply_optimistic(&mut self, doc: T) {
        self.docs.insert(doc.doc_id().to_string(), doc);
    }

    /// Reconcile a full result-set delivery. Per-document version diffing:
    /// newer documents are taken, older ones ignored, and documents absent
    /// from the snapshot are dropped unless they are unconfirmed optimistic
    /// inserts. Returns the number of changes applied.
    pub fn apply_snapshot(&mut self, snapshot: Vec<T>) -> usize {
        let seen: HashSet<String> = snapshot.iter().map(|d| d.doc_id().to_string()).collect();
        let mut changed = 0;
        for doc in snapshot {
            if self.apply(doc) {
                changed += 1;
            }
        }
        let before = self.docs.len();
        self.docs
            .retain(|id, doc| seen.contains(id) || doc.version() == 0);
        changed + (before - self.docs.len())
    }

    pub fn remove(&mut self, doc_id: &str) -> Option<T> {
        self.docs.remove(doc_id)
    }
}
