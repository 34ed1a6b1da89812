/// Common key-construction helpers shared by the Redis adapter.
#[derive(Debug, Clone)]
pub struct KeyContext<'a> {
    pub prefix: &'a str,
}

impl<'a> KeyContext<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }

    pub fn document(&self, collection: &str, doc_id: &str) -> String {
        format!("{}:{}:{}", self.prefix, collection, doc_id)
    }

    /// Glob pattern matching every document in a collection.
    pub fn collection_pattern(&self, collection: &str) -> String {
        format!("{}:{}:*", self.prefix, collection)
    }

    /// Pub/sub channel carrying the typed change feed.
    pub fn events_channel(&self) -> String {
        format!("{}:events", self.prefix)
    }
}
