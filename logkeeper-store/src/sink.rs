use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors a sink can report for a single call or at construction.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("invalid sink node {node:?}: {reason}")]
    InvalidNode { node: String, reason: String },

    #[error("no sink nodes configured")]
    NoNodes,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("document {doc_id} rejected with status {status}: {reason}")]
    Rejected {
        doc_id: String,
        status: u16,
        reason: String,
    },

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Document store used by the worker pool.
///
/// The only write operation is an upsert keyed by document ID: writing the
/// same ID twice must leave exactly one document holding the latest body.
/// Implementations are shared by every worker and must accept concurrent
/// calls.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Insert or overwrite the document stored under `doc_id`.
    async fn upsert(&self, doc_id: &str, body: Bytes) -> Result<(), SinkError>;

    /// Release client resources. Called once, after every worker exited.
    fn close(&self) {}

    /// Short name used in log lines.
    fn name(&self) -> &str;
}
