use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Pipeline metrics. Every recorder is gated behind `enabled`.
///
/// When `enabled = false` no registry is created and no counters are
/// allocated; the `record_*` methods return immediately.
pub struct PipelineMetrics {
    enabled: bool,
    registry: Option<Registry>,
    pub messages_consumed: Option<IntCounter>,
    pub read_errors: Option<IntCounter>,
    pub decode_failures: Option<IntCounter>,
    pub documents_indexed: Option<IntCounterVec>,
    pub sink_failures: Option<IntCounter>,
    pub sink_duration: Option<Histogram>,
    pub queue_depth: Option<IntGauge>,
}

impl PipelineMetrics {
    /// Create a new collector. When `enabled = false`, everything is None.
    pub fn new(enabled: bool) -> anyhow::Result<Self> {
        if !enabled {
            return Ok(Self::disabled());
        }

        let registry = Registry::new();

        let messages_consumed = IntCounter::with_opts(
            Opts::new("messages_consumed_total", "Messages read from the broker")
                .namespace("logkeeper"),
        )?;
        let read_errors = IntCounter::with_opts(
            Opts::new("read_errors_total", "Failed broker reads").namespace("logkeeper"),
        )?;
        let decode_failures = IntCounter::with_opts(
            Opts::new("decode_failures_total", "Payloads dropped as malformed")
                .namespace("logkeeper"),
        )?;
        let documents_indexed = IntCounterVec::new(
            Opts::new("documents_indexed_total", "Documents upserted into the sink")
                .namespace("logkeeper"),
            &["service", "status"],
        )?;
        let sink_failures = IntCounter::with_opts(
            Opts::new("sink_failures_total", "Upserts that failed or timed out")
                .namespace("logkeeper"),
        )?;
        let sink_duration = Histogram::with_opts(
            HistogramOpts::new("sink_request_duration_seconds", "Upsert latency")
                .namespace("logkeeper")
                .buckets(vec![
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ]),
        )?;
        let queue_depth = IntGauge::with_opts(
            Opts::new("queue_depth", "Jobs buffered between consumer and workers")
                .namespace("logkeeper"),
        )?;

        registry.register(Box::new(messages_consumed.clone()))?;
        registry.register(Box::new(read_errors.clone()))?;
        registry.register(Box::new(decode_failures.clone()))?;
        registry.register(Box::new(documents_indexed.clone()))?;
        registry.register(Box::new(sink_failures.clone()))?;
        registry.register(Box::new(sink_duration.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;

        Ok(Self {
            enabled: true,
            registry: Some(registry),
            messages_consumed: Some(messages_consumed),
            read_errors: Some(read_errors),
            decode_failures: Some(decode_failures),
            documents_indexed: Some(documents_indexed),
            sink_failures: Some(sink_failures),
            sink_duration: Some(sink_duration),
            queue_depth: Some(queue_depth),
        })
    }

    /// No-op collector.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            registry: None,
            messages_consumed: None,
            read_errors: None,
            decode_failures: None,
            documents_indexed: None,
            sink_failures: None,
            sink_duration: None,
            queue_depth: None,
        }
    }

    #[inline]
    pub fn record_consumed(&self) {
        if let Some(ref c) = self.messages_consumed {
            c.inc();
        }
    }

    #[inline]
    pub fn record_read_error(&self) {
        if let Some(ref c) = self.read_errors {
            c.inc();
        }
    }

    #[inline]
    pub fn record_decode_failure(&self) {
        if let Some(ref c) = self.decode_failures {
            c.inc();
        }
    }

    /// Record a successful upsert (no-op when disabled).
    #[inline]
    pub fn record_indexed(&self, service: &str, status_code: i64, duration_secs: f64) {
        if !self.enabled {
            return;
        }
        if let Some(ref counter) = self.documents_indexed {
            let mut buf = itoa::Buffer::new();
            let status_str = buf.format(status_code);
            counter.with_label_values(&[service, status_str]).inc();
        }
        if let Some(ref hist) = self.sink_duration {
            hist.observe(duration_secs);
        }
    }

    #[inline]
    pub fn record_sink_failure(&self, duration_secs: f64) {
        if let Some(ref c) = self.sink_failures {
            c.inc();
        }
        if let Some(ref hist) = self.sink_duration {
            hist.observe(duration_secs);
        }
    }

    #[inline]
    pub fn set_queue_depth(&self, depth: usize) {
        if let Some(ref g) = self.queue_depth {
            g.set(depth as i64);
        }
    }

    /// Render prometheus text exposition format.
    pub fn render(&self) -> String {
        if let Some(ref registry) = self.registry {
            let encoder = TextEncoder::new();
            let metric_families = registry.gather();
            let mut buffer = Vec::new();
            if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                tracing::warn!(error = %e, "Failed to encode metrics");
            }
            String::from_utf8(buffer).unwrap_or_default()
        } else {
            String::new()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::disabled()
    }
}
