//! Production adapter over Redis. Documents are JSON strings under
//! `{prefix}:{collection}:{id}`; plans commit atomically through a single Lua
//! script which also publishes the plan's events on `{prefix}:events`.

use std::borrow::Cow;

use futures_util::StreamExt;
use log::warn;
use redis::{aio::ConnectionManager, cmd};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{
    errors::ForumError,
    events::DomainEvent,
    keys::KeyContext,
    store::{
        CommitReceipt, DocumentStore, WriteCommand, WritePlan,
        feed::Subscription,
        scripts::PLAN_COMMIT_SCRIPT,
    },
};

const SCAN_COUNT: usize = 512;

#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, ForumError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            client,
            conn,
            prefix: prefix.into(),
        })
    }

    fn keys(&self) -> KeyContext<'_> {
        KeyContext::new(&self.prefix)
    }

    /// Glob pattern for all of this store's keys, for test cleanup.
    pub fn key_pattern(&self) -> String {
        format!("{}:*", self.prefix)
    }
}

/// Bodies travel to the Lua script pre-encoded so the script can store them
/// verbatim; cjson re-encoding would mangle empty maps into arrays.
fn plan_payload(plan: &WritePlan) -> Result<String, ForumError> {
    let mut writes = Vec::with_capacity(plan.writes.len());
    for write in &plan.writes {
        match write {
            WriteCommand::Put {
                collection,
                id,
                expected_version,
                body,
            } => {
                let body_json = serde_json::to_string(body)?;
                writes.push(serde_json::json!({
                    "op": "put",
                    "collection": collection,
                    "id": id,
                    "expected_version": expected_version,
                    "body_json": body_json,
                }));
            }
            WriteCommand::Delete {
                collection,
                id,
                expected_version,
            } => {
                let mut value = serde_json::json!({
                    "op": "delete",
                    "collection": collection,
                    "id": id,
                });
                if let Some(expected) = expected_version {
                    value["expected_version"] = Value::from(*expected);
                }
                writes.push(value);
            }
        }
    }
    Ok(serde_json::to_string(&serde_json::json!({ "writes": writes }))?)
}

fn decode_commit_response(raw: &str) -> Result<Vec<CommitReceipt>, ForumError> {
    let value: Value = serde_json::from_str(raw).map_err(|err| ForumError::Other {
        message: Cow::Owned(format!("failed to parse lua response: {err}")),
    })?;

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(match error {
            "version_conflict" => ForumError::VersionConflict {
                expected: value.get("expected").and_then(Value::as_u64),
                actual: value.get("actual").and_then(Value::as_u64),
            },
            "not_found" => ForumError::NotFound {
                doc_id: value
                    .get("doc_id")
                    .and_then(Value::as_str)
                    .map(|s| s.to_string()),
            },
            other => ForumError::Other {
                message: Cow::Owned(other.to_string()),
            },
        });
    }

    // cjson encodes an empty receipt list as an object; treat both shapes.
    match value.get("receipts") {
        Some(Value::Array(receipts)) => receipts
            .iter()
            .map(|r| serde_json::from_value(r.clone()).map_err(ForumError::from))
            .collect(),
        _ => Ok(Vec::new()),
    }
}

impl DocumentStore for RedisStore {
    async fn fetch(&self, collection: &str, doc_id: &str) -> Result<Option<Value>, ForumError> {
        let key = self.keys().document(collection, doc_id);
        let mut conn = self.conn.clone();
        let raw: Option<String> = cmd("GET").arg(&key).query_async(&mut conn).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>, ForumError> {
        let pattern = self.keys().collection_pattern(collection);
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        keys.sort();
        let raw: Vec<Option<String>> = cmd("MGET").arg(&keys).query_async(&mut conn).await?;
        raw.into_iter()
            .flatten()
            .map(|json| serde_json::from_str(&json).map_err(ForumError::from))
            .collect()
    }

    async fn commit(&self, plan: WritePlan) -> Result<Vec<CommitReceipt>, ForumError> {
        if plan.is_empty() {
            return Ok(Vec::new());
        }
        let payload = plan_payload(&plan)?;
        let events_json = serde_json::to_string(&plan.events)?;
        let channel = self.keys().events_channel();

        let mut conn = self.conn.clone();
        let mut invocation = PLAN_COMMIT_SCRIPT.prepare_invoke();
        invocation
            .arg(payload)
            .arg(&self.prefix)
            .arg(channel)
            .arg(events_json);
        let raw: String = invocation.invoke_async(&mut conn).await?;
        decode_commit_response(&raw)
    }

    async fn subscribe(&self) -> Result<Subscription, ForumError> {
        let client = self.client.clone();
        let channel = self.keys().events_channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            let mut pubsub = match client.get_async_pubsub().await {
                Ok(pubsub) => pubsub,
                Err(err) => {
                    warn!("change feed connection failed: {err}");
                    return;
                }
            };
            if let Err(err) = pubsub.subscribe(&channel).await {
                warn!("change feed subscribe failed: {err}");
                return;
            }
            let mut stream = pubsub.on_message();
            while let Some(message) = stream.next().await {
                let payload: String = match message.get_payload() {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!("dropping unreadable change feed message: {err}");
                        continue;
                    }
                };
                match serde_json::from_str::<Vec<DomainEvent>>(&payload) {
                    Ok(events) => {
                        for event in events {
                            if tx.send(event).is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) => warn!("dropping undecodable change feed payload: {err}"),
                }
            }
        });
        Ok(Subscription::new(rx, Some(task)))
    }
}
