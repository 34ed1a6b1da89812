//! Document store port and its two adapters: [`RedisStore`] for production
//! and [`MemoryStore`] as the in-process fake used by the test suite.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::errors::ForumError;

pub mod feed;
pub mod memory;
pub mod plan;
pub mod redis;
pub mod scripts;

pub use feed::{DocumentView, Subscription};
pub use memory::MemoryStore;
pub use plan::{CommitReceipt, WriteCommand, WritePlan};
pub use redis::RedisStore;

/// Bound number of optimistic read-modify-write attempts before a
/// [`ForumError::VersionConflict`] is surfaced to the caller.
pub const MAX_WRITE_ATTEMPTS: usize = 3;

/// A typed document bound to its collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;

    fn doc_id(&self) -> &str;

    /// Store-managed optimistic concurrency version; 0 means never committed.
    fn version(&self) -> u64;

    fn set_version(&mut self, version: u64);
}

/// Collection-scoped CRUD plus atomic plan commit and the typed change feed.
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    async fn fetch(&self, collection: &str, doc_id: &str) -> Result<Option<Value>, ForumError>;

    async fn list(&self, collection: &str) -> Result<Vec<Value>, ForumError>;

    /// Apply the whole plan or none of it, then publish its events.
    async fn commit(&self, plan: WritePlan) -> Result<Vec<CommitReceipt>, ForumError>;

    /// Open a change-feed subscription. The handle must be closed (or
    /// dropped) when no longer needed; it releases the listener.
    async fn subscribe(&self) -> Result<Subscription, ForumError>;
}

/// Typed convenience layer over the raw port.
#[allow(async_fn_in_trait)]
pub trait DocumentStoreExt: DocumentStore {
    async fn get<T: Document>(&self, doc_id: &str) -> Result<Option<T>, ForumError> {
        match self.fetch(T::COLLECTION, doc_id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn require<T: Document>(&self, doc_id: &str) -> Result<T, ForumError> {
        self.get(doc_id)
            .await?
            .ok_or_else(|| ForumError::not_found(doc_id))
    }

    async fn list_all<T: Document>(&self) -> Result<Vec<T>, ForumError> {
        self.list(T::COLLECTION)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(ForumError::from))
            .collect()
    }

    async fn find_where<T, P>(&self, mut predicate: P) -> Result<Vec<T>, ForumError>
    where
        T: Document,
        P: FnMut(&T) -> bool,
    {
        Ok(self
            .list_all::<T>()
            .await?
            .into_iter()
            .filter(|doc| predicate(doc))
            .collect())
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}
