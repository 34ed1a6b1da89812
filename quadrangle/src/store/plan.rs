use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{errors::ForumError, events::DomainEvent, store::Document};

/// One write within a plan. Every put carries an optimistic version guard:
/// `expected_version == 0` means the document must not exist yet, `n > 0`
/// means it must currently be at version `n`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteCommand {
    Put {
        collection: String,
        id: String,
        expected_version: u64,
        body: Value,
    },
    Delete {
        collection: String,
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        expected_version: Option<u64>,
    },
}

/// An ordered set of writes applied atomically, plus the typed events
/// describing the transition. The store commits the whole plan or none of it,
/// then publishes the events to the change feed.
#[derive(Debug, Clone, Default)]
pub struct WritePlan {
    pub writes: Vec<WriteCommand>,
    pub events: Vec<DomainEvent>,
}

impl WritePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.events.is_empty()
    }

    /// Enqueue a create. Fails at commit if the document already exists.
    pub fn create<T: Document>(&mut self, doc: &T) -> Result<&mut Self, ForumError> {
        self.push_put(doc, 0)
    }

    /// Enqueue an update guarded by the document's current version.
    pub fn update<T: Document>(&mut self, doc: &T) -> Result<&mut Self, ForumError> {
        self.push_put(doc, doc.version())
    }

    fn push_put<T: Document>(&mut self, doc: &T, expected_version: u64) -> Result<&mut Self, ForumError> {
        let mut body = serde_json::to_value(doc)?;
        let Value::Object(ref mut map) = body else {
            return Err(ForumError::other("document body must be a JSON object"));
        };
        map.insert("version".to_string(), Value::from(expected_version + 1));
        self.writes.push(WriteCommand::Put {
            collection: T::COLLECTION.to_string(),
            id: doc.doc_id().to_string(),
            expected_version,
            body,
        });
        Ok(self)
    }

    /// Enqueue a delete, optionally guarded by the version last read.
    pub fn delete<T: Document>(&mut self, doc_id: &str, expected_version: Option<u64>) -> &mut Self {
        self.writes.push(WriteCommand::Delete {
            collection: T::COLLECTION.to_string(),
            id: doc_id.to_string(),
            expected_version,
        });
        self
    }

    /// Attach a domain event published iff the plan commits.
    pub fn emit(&mut self, event: DomainEvent) -> &mut Self {
        self.events.push(event);
        self
    }
}

/// Per-write acknowledgement: the version each document reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub collection: String,
    pub id: String,
    pub version: u64,
}
