//! End-to-end tests: ChannelBroker → Pipeline → ElasticsearchSink → stub node
//!
//! The stub is a tiny axum app serving `PUT /{index}/_doc/{id}` from its
//! own thread and runtime, like a remote Elasticsearch node. Several
//! workers share one `ElasticsearchSink` and therefore one HTTP connection
//! pool, so these tests cover connections opened by one worker and reused
//! by another.

use axum::Router;
use axum::body::Bytes as BodyBytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::put;
use chrono::{TimeZone, Utc};
use logkeeper_core::config::SinkConfig;
use logkeeper_core::{LogEntry, encode};
use logkeeper_observability::PipelineMetrics;
use logkeeper_pipeline::{ChannelBroker, Pipeline, PipelineSettings, PipelineState};
use logkeeper_store::ElasticsearchSink;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ── Stub node ────────────────────────────────────────────────────────────────

type Docs = Arc<Mutex<HashMap<String, Vec<u8>>>>;

async fn put_doc(
    State(docs): State<Docs>,
    Path((index, id)): Path<(String, String)>,
    body: BodyBytes,
) -> StatusCode {
    let previous = docs
        .lock()
        .unwrap()
        .insert(format!("{index}/{id}"), body.to_vec());
    match previous {
        Some(_) => StatusCode::OK,
        None => StatusCode::CREATED,
    }
}

/// Start the stub on a dedicated thread; returns its base URL.
fn spawn_stub_node() -> (String, Docs) {
    let docs = Docs::default();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new()
        .route("/{index}/_doc/{id}", put(put_doc))
        .with_state(docs.clone());
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    (format!("http://{addr}"), docs)
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn entry(request_id: &str) -> Vec<u8> {
    encode(&LogEntry {
        timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ip: "10.1.2.3".to_string(),
        status_code: 201,
        request_id: request_id.to_string(),
        method: "PUT".to_string(),
        path: "/api/comments".to_string(),
        duration_sec: 0.003,
        service: "comments".to_string(),
    })
    .unwrap()
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[test]
fn trickled_entries_are_all_indexed_by_several_workers() {
    let (node, docs) = spawn_stub_node();
    let sink = ElasticsearchSink::new(&SinkConfig {
        nodes: vec![node],
        index: "logs".to_string(),
        request_timeout_ms: 2000,
    })
    .unwrap();

    let (broker, publisher) = ChannelBroker::new("logs");
    let pipeline = Pipeline::start(
        PipelineSettings {
            workers: 3,
            queue_capacity: 15,
            sink_timeout: Duration::from_secs(2),
            read_retry_delay: Duration::from_millis(1),
        },
        Box::new(broker),
        Arc::new(sink),
        Arc::new(PipelineMetrics::disabled()),
    )
    .unwrap();

    // Pauses leave the worker that opened a pooled connection idle while
    // another worker picks up the next job.
    let mut payloads = HashMap::new();
    for n in 0..8 {
        let request_id = format!("es-{n}");
        let payload = entry(&request_id);
        payloads.insert(format!("logs/comments{request_id}"), payload.clone());
        publisher.publish(payload);
        std::thread::sleep(Duration::from_millis(150));
    }
    assert!(wait_until(Duration::from_secs(10), || docs.lock().unwrap().len() == 8));

    let coordinator = pipeline.coordinator();
    pipeline.shutdown();
    let stats = pipeline.wait();
    assert_eq!(coordinator.state(), PipelineState::Stopped);

    assert_eq!(stats.sink_failures, 0);
    assert_eq!(stats.indexed, 8);
    assert_eq!(*docs.lock().unwrap(), payloads);
}
