use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured access log entry, one per completed request.
///
/// Entries are facts: the pipeline never mutates them. The pair
/// `(service, request_id)` identifies an entry in the sink, see
/// [`LogEntry::doc_id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Instant the entry was recorded (RFC 3339 on the wire).
    pub timestamp: DateTime<Utc>,
    /// Client address as seen by the producer (forwarded-for preferred).
    pub ip: String,
    /// Response status. Passed through unchecked.
    pub status_code: i64,
    /// Correlation identifier, unique per originating request.
    pub request_id: String,
    pub method: String,
    pub path: String,
    /// Elapsed seconds.
    pub duration_sec: f64,
    /// Producing component.
    pub service: String,
}

impl LogEntry {
    /// Document identifier in the sink: `service` immediately followed by
    /// `request_id`, no separator.
    pub fn doc_id(&self) -> String {
        doc_id(&self.service, &self.request_id)
    }
}

/// Build the idempotency document ID from its two key fields.
pub fn doc_id(service: &str, request_id: &str) -> String {
    let mut id = String::with_capacity(service.len() + request_id.len());
    id.push_str(service);
    id.push_str(request_id);
    id
}

/// Shorten an identifier for log lines: at most 6 characters, then `...`.
pub fn shorten(s: &str) -> String {
    match s.char_indices().nth(6) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
