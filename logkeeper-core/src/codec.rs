//! Wire codec for [`LogEntry`] payloads.
//!
//! Payloads are JSON objects with the exact field names of [`LogEntry`].
//! Every field is required; unknown fields are ignored. No range or
//! format checks are made beyond what the types demand.

use crate::entry::LogEntry;
use thiserror::Error;

/// A payload could not be turned into a [`LogEntry`].
#[derive(Error, Debug)]
#[error("malformed log entry: {source}")]
pub struct DecodeError {
    #[from]
    source: serde_json::Error,
}

impl DecodeError {
    /// Byte column of the failure within the payload's line, when known.
    pub fn column(&self) -> usize {
        self.source.column()
    }

    /// `true` when the payload was valid JSON with the wrong shape.
    pub fn is_schema_mismatch(&self) -> bool {
        self.source.is_data()
    }
}

/// Decode a raw broker payload.
pub fn decode(payload: &[u8]) -> Result<LogEntry, DecodeError> {
    Ok(serde_json::from_slice(payload)?)
}

/// A [`LogEntry`] could not be written in its wire form.
#[derive(Error, Debug)]
pub enum EncodeError {
    /// JSON has no NaN or infinity; serde_json would write `null`, which
    /// [`decode`] then rejects.
    #[error("duration_sec must be finite, got {0}")]
    NonFiniteDuration(f64),

    #[error("failed to serialize log entry: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode an entry into its wire form.
///
/// Whatever this returns decodes back into an equal entry.
pub fn encode(entry: &LogEntry) -> Result<Vec<u8>, EncodeError> {
    if !entry.duration_sec.is_finite() {
        return Err(EncodeError::NonFiniteDuration(entry.duration_sec));
    }
    Ok(serde_json::to_vec(entry)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const GATEWAY_ENTRY: &str = r#"{"timestamp":"2024-01-01T00:00:00Z","ip":"1.2.3.4","status_code":200,"request_id":"abc123","method":"GET","path":"/x","duration_sec":0.01,"service":"gateway"}"#;

    #[test]
    fn decode_reads_all_fields() {
        let entry = decode(GATEWAY_ENTRY.as_bytes()).unwrap();
        assert_eq!(
            entry.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(entry.ip, "1.2.3.4");
        assert_eq!(entry.status_code, 200);
        assert_eq!(entry.request_id, "abc123");
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.path, "/x");
        assert_eq!(entry.duration_sec, 0.01);
        assert_eq!(entry.service, "gateway");
        assert_eq!(entry.doc_id(), "gatewayabc123");
    }

    #[test]
    fn decode_accepts_offset_timestamps() {
        let payload = GATEWAY_ENTRY.replace("2024-01-01T00:00:00Z", "2024-01-01T02:00:00+02:00");
        let entry = decode(payload.as_bytes()).unwrap();
        assert_eq!(
            entry.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn decode_ignores_unknown_fields() {
        let payload = GATEWAY_ENTRY.replace("\"service\"", "\"extra\":[1,2],\"service\"");
        let entry = decode(payload.as_bytes()).unwrap();
        assert_eq!(entry.service, "gateway");
    }

    #[test]
    fn decode_passes_out_of_range_status_through() {
        let payload = GATEWAY_ENTRY.replace("200", "-7");
        let entry = decode(payload.as_bytes()).unwrap();
        assert_eq!(entry.status_code, -7);
    }

    #[test]
    fn decode_rejects_non_json() {
        let err = decode(b"definitely not json").unwrap_err();
        assert!(!err.is_schema_mismatch());
        assert!(err.to_string().starts_with("malformed log entry"));
    }

    #[test]
    fn decode_rejects_missing_field() {
        let payload = r#"{"timestamp":"2024-01-01T00:00:00Z","ip":"1.2.3.4","status_code":200}"#;
        let err = decode(payload.as_bytes()).unwrap_err();
        assert!(err.is_schema_mismatch());
    }

    #[test]
    fn decode_rejects_wrong_types() {
        let payload = GATEWAY_ENTRY.replace("200", "\"200\"");
        assert!(decode(payload.as_bytes()).unwrap_err().is_schema_mismatch());

        let payload = GATEWAY_ENTRY.replace("2024-01-01T00:00:00Z", "yesterday");
        assert!(decode(payload.as_bytes()).is_err());
    }

    #[test]
    fn decode_rejects_empty_payload() {
        assert!(decode(b"").is_err());
    }

    #[test]
    fn encode_then_decode_is_identity() {
        let entry = LogEntry {
            timestamp: Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap(),
            ip: "2001:db8::1".to_string(),
            status_code: 503,
            request_id: "f00d".to_string(),
            method: "POST".to_string(),
            path: "/api/news?page=2".to_string(),
            duration_sec: 1.5,
            service: "news".to_string(),
        };
        let decoded = decode(&encode(&entry).unwrap()).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn encode_rejects_non_finite_duration() {
        let mut entry = decode(GATEWAY_ENTRY.as_bytes()).unwrap();
        for duration in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            entry.duration_sec = duration;
            let err = encode(&entry).unwrap_err();
            assert!(matches!(err, EncodeError::NonFiniteDuration(_)));
            assert!(err.to_string().starts_with("duration_sec must be finite"));
        }
    }
}
