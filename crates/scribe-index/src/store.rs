//! The document store seam.
//!
//! [`DocumentStore`] is the narrow surface the cache and the processors
//! write through; [`crate::client::ElasticClient`] is the production
//! implementation. Keeping the seam a trait lets the pipeline run against
//! an in-memory store in tests.

use serde_json::Value;

use crate::error::Result;

/// Logical type tag under which a document is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocKind {
    BlockStates,
    Blocks,
    Transactions,
    TransactionTraces,
    Actions,
    Accounts,
}

impl DocKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            DocKind::BlockStates => "block_states",
            DocKind::Blocks => "blocks",
            DocKind::Transactions => "transactions",
            DocKind::TransactionTraces => "transaction_traces",
            DocKind::Actions => "actions",
            DocKind::Accounts => "accounts",
        }
    }
}

impl std::fmt::Display for DocKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operation in a bulk request.
#[derive(Debug, Clone)]
pub enum BulkOp {
    /// Index a new document, optionally under an explicit id.
    Index { id: Option<String>, body: String },
    /// Merge a partial document into an existing one.
    Update { id: String, doc: String },
}

/// A batch of operations against a single document kind.
#[derive(Debug, Clone)]
pub struct BulkBatch {
    pub kind: DocKind,
    pub ops: Vec<BulkOp>,
}

impl BulkBatch {
    pub fn new(kind: DocKind) -> Self {
        BulkBatch {
            kind,
            ops: Vec::new(),
        }
    }

    pub fn index(&mut self, id: Option<&str>, body: &str) {
        self.ops.push(BulkOp::Index {
            id: id.map(str::to_owned),
            body: body.to_owned(),
        });
    }

    pub fn update(&mut self, id: &str, doc: &str) {
        self.ops.push(BulkOp::Update {
            id: id.to_owned(),
            doc: doc.to_owned(),
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Typed operations against the external index backend.
///
/// Implementations are used from a single thread; none of the operations
/// require `&mut self`.
pub trait DocumentStore: Send {
    /// Create the index with the given mapping body.
    fn create_index(&self, mappings: &str) -> Result<()>;

    /// Delete the index; absence is treated as success.
    fn delete_index(&self) -> Result<()>;

    /// Write one document, optionally under an explicit id.
    fn index(&self, kind: DocKind, body: &str, id: Option<&str>) -> Result<()>;

    /// Count documents of a kind, optionally restricted by a query.
    fn count(&self, kind: DocKind, query: Option<&str>) -> Result<u64>;

    /// Run a search query, returning the raw response body.
    fn search(&self, kind: DocKind, query: &str) -> Result<Value>;

    /// Delete every document matching a query.
    fn delete_by_query(&self, kind: DocKind, query: &str) -> Result<()>;

    /// Perform a batch of operations; fails if any item fails.
    fn bulk(&self, batch: &BulkBatch) -> Result<()>;
}

impl<S: DocumentStore + Send + Sync> DocumentStore for std::sync::Arc<S> {
    fn create_index(&self, mappings: &str) -> Result<()> {
        (**self).create_index(mappings)
    }

    fn delete_index(&self) -> Result<()> {
        (**self).delete_index()
    }

    fn index(&self, kind: DocKind, body: &str, id: Option<&str>) -> Result<()> {
        (**self).index(kind, body, id)
    }

    fn count(&self, kind: DocKind, query: Option<&str>) -> Result<u64> {
        (**self).count(kind, query)
    }

    fn search(&self, kind: DocKind, query: &str) -> Result<Value> {
        (**self).search(kind, query)
    }

    fn delete_by_query(&self, kind: DocKind, query: &str) -> Result<()> {
        (**self).delete_by_query(kind, query)
    }

    fn bulk(&self, batch: &BulkBatch) -> Result<()> {
        (**self).bulk(batch)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory store used by cache, processor, and pipeline tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use super::{BulkBatch, BulkOp, DocKind, DocumentStore};
    use crate::error::Result;

    #[derive(Debug, Clone)]
    pub struct StoredDoc {
        pub id: String,
        pub body: Value,
    }

    /// In-memory [`DocumentStore`] with term-query search support.
    #[derive(Default)]
    pub struct MemoryStore {
        docs: Mutex<HashMap<&'static str, Vec<StoredDoc>>>,
        next_id: AtomicU64,
        pub created_with: Mutex<Option<String>>,
        pub deletes: AtomicU64,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            MemoryStore::default()
        }

        pub fn docs(&self, kind: DocKind) -> Vec<StoredDoc> {
            self.docs
                .lock()
                .get(kind.as_str())
                .cloned()
                .unwrap_or_default()
        }

        pub fn insert(&self, kind: DocKind, body: Value) -> String {
            let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
            self.docs
                .lock()
                .entry(kind.as_str())
                .or_default()
                .push(StoredDoc {
                    id: id.clone(),
                    body,
                });
            id
        }

        /// Extract the single `{"query":{"term":{field: value}}}` pair.
        fn term_of(query: &Value) -> Option<(String, Value)> {
            let term = query.get("query")?.get("term")?.as_object()?;
            let (field, value) = term.iter().next()?;
            Some((field.clone(), value.clone()))
        }
    }

    impl DocumentStore for MemoryStore {
        fn create_index(&self, mappings: &str) -> Result<()> {
            *self.created_with.lock() = Some(mappings.to_owned());
            Ok(())
        }

        fn delete_index(&self) -> Result<()> {
            self.docs.lock().clear();
            self.deletes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn index(&self, kind: DocKind, body: &str, id: Option<&str>) -> Result<()> {
            let parsed: Value = serde_json::from_str(body)?;
            let mut docs = self.docs.lock();
            let entries = docs.entry(kind.as_str()).or_default();
            match id {
                Some(id) => {
                    if let Some(existing) = entries.iter_mut().find(|d| d.id == id) {
                        existing.body = parsed;
                    } else {
                        entries.push(StoredDoc {
                            id: id.to_owned(),
                            body: parsed,
                        });
                    }
                }
                None => {
                    let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
                    entries.push(StoredDoc { id, body: parsed });
                }
            }
            Ok(())
        }

        fn count(&self, kind: DocKind, _query: Option<&str>) -> Result<u64> {
            Ok(self.docs(kind).len() as u64)
        }

        fn search(&self, kind: DocKind, query: &str) -> Result<Value> {
            let parsed: Value = serde_json::from_str(query)?;
            let matches: Vec<StoredDoc> = match Self::term_of(&parsed) {
                Some((field, value)) => self
                    .docs(kind)
                    .into_iter()
                    .filter(|d| d.body.get(&field) == Some(&value))
                    .collect(),
                None => self.docs(kind),
            };
            let hits: Vec<Value> = matches
                .iter()
                .map(|d| json!({"_id": d.id, "_source": d.body}))
                .collect();
            Ok(json!({"hits": {"total": matches.len(), "hits": hits}}))
        }

        fn delete_by_query(&self, kind: DocKind, query: &str) -> Result<()> {
            let parsed: Value = serde_json::from_str(query)?;
            if let Some((field, value)) = Self::term_of(&parsed) {
                let mut docs = self.docs.lock();
                if let Some(entries) = docs.get_mut(kind.as_str()) {
                    entries.retain(|d| d.body.get(&field) != Some(&value));
                }
            }
            Ok(())
        }

        fn bulk(&self, batch: &BulkBatch) -> Result<()> {
            for op in &batch.ops {
                match op {
                    BulkOp::Index { id, body } => {
                        self.index(batch.kind, body, id.as_deref())?;
                    }
                    BulkOp::Update { id, doc } => {
                        let patch: Value = serde_json::from_str(doc)?;
                        let mut docs = self.docs.lock();
                        let entries = docs.entry(batch.kind.as_str()).or_default();
                        let target = entries.iter_mut().find(|d| d.id == *id);
                        if let (Some(target), Value::Object(fields)) = (target, patch) {
                            for (k, v) in fields {
                                target.body[k] = v;
                            }
                        }
                    }
                }
            }
            Ok(())
        }
    }
}
