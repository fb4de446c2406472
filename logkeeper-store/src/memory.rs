use crate::sink::{Sink, SinkError};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

/// In-memory document store keyed by document ID.
///
/// Cloning shares the underlying map, so a test can keep a handle while
/// the pipeline owns another.
#[derive(Clone, Default)]
pub struct MemorySink {
    documents: Arc<DashMap<String, Bytes>>,
    upserts: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored body for `doc_id`.
    pub fn get(&self, doc_id: &str) -> Option<Bytes> {
        self.documents.get(doc_id).map(|d| d.value().clone())
    }

    /// Number of distinct documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Total upsert calls, including overwrites.
    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Sorted list of stored document IDs.
    pub fn doc_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.documents.iter().map(|d| d.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn upsert(&self, doc_id: &str, body: Bytes) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Unavailable("memory sink closed".into()));
        }
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.documents.insert(doc_id.to_string(), body);
        debug!(doc_id, "Document stored");
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "memory"
    }
}
