//! In-memory store: the same port as the Redis adapter, used as the test
//! double and for embedded demos. Commits are all-or-nothing under one lock.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use log::warn;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use crate::{
    errors::ForumError,
    store::{
        CommitReceipt, DocumentStore, WriteCommand, WritePlan,
        feed::Subscription,
    },
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

type Collections = HashMap<String, BTreeMap<String, Value>>;

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Collections>>,
    events: broadcast::Sender<crate::events::DomainEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn doc_version(value: &Value) -> u64 {
    value.get("version").and_then(Value::as_u64).unwrap_or(0)
}

impl DocumentStore for MemoryStore {
    async fn fetch(&self, collection: &str, doc_id: &str) -> Result<Option<Value>, ForumError> {
        let guard = self.inner.lock().expect("store mutex poisoned");
        Ok(guard
            .get(collection)
            .and_then(|docs| docs.get(doc_id))
            .cloned())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>, ForumError> {
        let guard = self.inner.lock().expect("store mutex poisoned");
        Ok(guard
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn commit(&self, plan: WritePlan) -> Result<Vec<CommitReceipt>, ForumError> {
        let receipts = {
            let mut guard = self.inner.lock().expect("store mutex poisoned");

            // Validate every guard before touching anything.
            for write in &plan.writes {
                match write {
                    WriteCommand::Put {
                        collection,
                        id,
                        expected_version,
                        ..
                    } => {
                        let actual = guard
                            .get(collection.as_str())
                            .and_then(|docs| docs.get(id))
                            .map(doc_version);
                        match (*expected_version, actual) {
                            (0, Some(actual)) => {
                                return Err(ForumError::VersionConflict {
                                    expected: Some(0),
                                    actual: Some(actual),
                                });
                            }
                            (0, None) => {}
                            (_, None) => return Err(ForumError::not_found(id.clone())),
                            (expected, Some(actual)) if actual != expected => {
                                return Err(ForumError::VersionConflict {
                                    expected: Some(expected),
                                    actual: Some(actual),
                                });
                            }
                            _ => {}
                        }
                    }
                    WriteCommand::Delete {
                        collection,
                        id,
                        expected_version,
                    } => {
                        let actual = guard
                            .get(collection.as_str())
                            .and_then(|docs| docs.get(id))
                            .map(doc_version);
                        match (expected_version, actual) {
                            (_, None) => return Err(ForumError::not_found(id.clone())),
                            (Some(expected), Some(actual)) if actual != *expected => {
                                return Err(ForumError::VersionConflict {
                                    expected: Some(*expected),
                                    actual: Some(actual),
                                });
                            }
                            _ => {}
                        }
                    }
                }
            }

            let mut receipts = Vec::with_capacity(plan.writes.len());
            for write in &plan.writes {
                match write {
                    WriteCommand::Put {
                        collection, id, body, ..
                    } => {
                        let version = doc_version(body);
                        guard
                            .entry(collection.clone())
                            .or_default()
                            .insert(id.clone(), body.clone());
                        receipts.push(CommitReceipt {
                            collection: collection.clone(),
                            id: id.clone(),
                            version,
                        });
                    }
                    WriteCommand::Delete { collection, id, .. } => {
                        let removed = guard
                            .get_mut(collection.as_str())
                            .and_then(|docs| docs.remove(id));
                        receipts.push(CommitReceipt {
                            collection: collection.clone(),
                            id: id.clone(),
                            version: removed.as_ref().map(doc_version).unwrap_or(0),
                        });
                    }
                }
            }
            receipts
        };

        for event in plan.events {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }

        Ok(receipts)
    }

    async fn subscribe(&self) -> Result<Subscription, ForumError> {
        let mut feed = self.events.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("change feed lagged, skipped {skipped} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(Subscription::new(rx, Some(task)))
    }
}
