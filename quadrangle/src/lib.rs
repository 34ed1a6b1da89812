//! Quadrangle: the consistency layer of a campus community forum.
//!
//! Posts, friendships, conversations, and notifications live in separate
//! collections of a shared document store, yet every user-facing operation
//! must leave them mutually consistent: accepting a friend request flips the
//! request and creates the friendship edge together, a new message and its
//! recipient's unread counter move in one step, and every qualifying
//! transition produces exactly one notification.
//!
//! The crate is split into:
//! - [`store`]: the document store port, version-guarded write plans, the
//!   Redis adapter, and an in-process fake for tests.
//! - [`model`]: the typed documents of each collection and their queries.
//! - [`service`]: the domain state machines built on top.
//! - [`events`]: the typed change feed connecting them to live views.

pub mod errors;
pub mod events;
pub mod id;
pub mod keys;
pub mod model;
pub mod service;
pub mod store;

pub use errors::ForumError;
pub use events::DomainEvent;
pub use store::{
    CommitReceipt, Document, DocumentStore, DocumentStoreExt, DocumentView, MemoryStore, RedisStore, Subscription,
    WritePlan,
};

// Re-exported so applications depend on one redis version.
pub use redis;
