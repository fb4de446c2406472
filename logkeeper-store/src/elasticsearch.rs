//! Elasticsearch sink over the document index API.
//!
//! Each upsert is a single `PUT {node}/{index}/_doc/{doc_id}` carrying the
//! raw entry payload. Elasticsearch's index operation replaces an existing
//! document with the same ID, which is what makes redelivery harmless.

use crate::sink::{Sink, SinkError};
use async_trait::async_trait;
use bytes::Bytes;
use logkeeper_core::config::SinkConfig;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Longest error body kept in a [`SinkError::Rejected`].
const MAX_REASON_CHARS: usize = 512;

pub struct ElasticsearchSink {
    client: Client,
    nodes: Vec<Url>,
    index: String,
    next_node: AtomicUsize,
}

impl ElasticsearchSink {
    /// Build the HTTP client and validate every node address.
    pub fn new(config: &SinkConfig) -> Result<Self, SinkError> {
        let nodes = config
            .nodes
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(parse_node)
            .collect::<Result<Vec<_>, _>>()?;
        if nodes.is_empty() {
            return Err(SinkError::NoNodes);
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        info!(
            nodes = nodes.len(),
            index = %config.index,
            "Elasticsearch sink initialized"
        );

        Ok(Self {
            client,
            nodes,
            index: config.index.clone(),
            next_node: AtomicUsize::new(0),
        })
    }

    /// `{node}/{index}/_doc/{doc_id}` with every segment percent-encoded.
    pub fn document_url(&self, node: &Url, doc_id: &str) -> Url {
        let mut url = node.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(&self.index)
                .push("_doc")
                .push(doc_id);
        }
        url
    }

    /// Round-robin over the configured nodes.
    fn pick_node(&self) -> &Url {
        let i = self.next_node.fetch_add(1, Ordering::Relaxed) % self.nodes.len();
        &self.nodes[i]
    }

    pub fn nodes(&self) -> &[Url] {
        &self.nodes
    }
}

#[async_trait]
impl Sink for ElasticsearchSink {
    async fn upsert(&self, doc_id: &str, body: Bytes) -> Result<(), SinkError> {
        let url = self.document_url(self.pick_node(), doc_id);
        let resp = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            debug!(doc_id, status = status.as_u16(), "Document indexed");
            return Ok(());
        }

        let reason: String = resp
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(MAX_REASON_CHARS)
            .collect();
        Err(SinkError::Rejected {
            doc_id: doc_id.to_string(),
            status: status.as_u16(),
            reason,
        })
    }

    fn close(&self) {
        info!(index = %self.index, "Elasticsearch sink closed");
    }

    fn name(&self) -> &str {
        "elasticsearch"
    }
}

/// Accept `host:port` as well as full URLs; bare addresses get `http://`.
fn parse_node(node: &str) -> Result<Url, SinkError> {
    let with_scheme = if node.contains("://") {
        node.to_string()
    } else {
        format!("http://{node}")
    };
    let url = Url::parse(&with_scheme).map_err(|e| SinkError::InvalidNode {
        node: node.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(SinkError::InvalidNode {
            node: node.to_string(),
            reason: "expected an http(s) base URL".to_string(),
        });
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(nodes: &[&str]) -> SinkConfig {
        SinkConfig {
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            index: "logs".to_string(),
            request_timeout_ms: 1000,
        }
    }

    #[test]
    fn new_rejects_empty_node_list() {
        let err = ElasticsearchSink::new(&config(&[])).err().unwrap();
        assert!(matches!(err, SinkError::NoNodes));
        let err = ElasticsearchSink::new(&config(&["", "  "])).err().unwrap();
        assert!(matches!(err, SinkError::NoNodes));
    }

    #[test]
    fn new_rejects_non_http_nodes() {
        let err = ElasticsearchSink::new(&config(&["ftp://es:21"])).err().unwrap();
        assert!(matches!(err, SinkError::InvalidNode { .. }));
    }

    #[test]
    fn bare_host_port_gets_http_scheme() {
        let sink = ElasticsearchSink::new(&config(&["es-1:9200"])).unwrap();
        assert_eq!(sink.nodes()[0].as_str(), "http://es-1:9200/");
    }

    #[test]
    fn document_url_appends_index_and_id() {
        let sink = ElasticsearchSink::new(&config(&["http://es:9200"])).unwrap();
        let url = sink.document_url(&sink.nodes()[0], "gatewayabc123");
        assert_eq!(url.as_str(), "http://es:9200/logs/_doc/gatewayabc123");
    }

    #[test]
    fn document_url_keeps_node_path_prefix() {
        let sink = ElasticsearchSink::new(&config(&["https://proxy.local/es/"])).unwrap();
        let url = sink.document_url(&sink.nodes()[0], "a");
        assert_eq!(url.as_str(), "https://proxy.local/es/logs/_doc/a");
    }

    #[test]
    fn document_url_escapes_reserved_characters() {
        let sink = ElasticsearchSink::new(&config(&["http://es:9200"])).unwrap();
        let url = sink.document_url(&sink.nodes()[0], "svc/a b?c");
        assert_eq!(url.as_str(), "http://es:9200/logs/_doc/svc%2Fa%20b%3Fc");
    }

    #[test]
    fn nodes_are_used_round_robin() {
        let sink = ElasticsearchSink::new(&config(&["http://a:9200", "http://b:9200"])).unwrap();
        let picked: Vec<String> = (0..4)
            .map(|_| sink.pick_node().host_str().unwrap().to_string())
            .collect();
        assert_eq!(picked, vec!["a", "b", "a", "b"]);
    }
}
