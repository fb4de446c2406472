use crate::error::LogkeeperError;
use figment::{
    Figment,
    providers::{Env, Format, Toml, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level Logkeeper configuration.
///
/// Unknown top-level keys are rejected so that a misspelled or flat
/// camelCase key (`kafkaBrokers`, `numWorkers`) fails loudly instead of
/// leaving its section at the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogkeeperConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Kafka consumer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_group_id")]
    pub group_id: String,
    /// Minimum bytes the broker accumulates before answering a fetch.
    #[serde(default = "default_min_bytes")]
    pub min_bytes: usize,
    /// Upper bound on a single fetch response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    /// Pause before retrying a failed read. 0 = retry immediately.
    #[serde(default = "default_read_retry_delay")]
    pub read_retry_delay_ms: u64,
}

/// Elasticsearch sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default = "default_nodes")]
    pub nodes: Vec<String>,
    #[serde(default = "default_index")]
    pub index: String,
    /// Bound on a single upsert call, enforced by the workers.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

/// Worker pool and queue sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of worker threads. 0 = number of CPU cores.
    #[serde(default)]
    pub workers: usize,
    /// Queue slots per worker.
    #[serde(default = "default_burst_factor")]
    pub burst_factor: usize,
}

/// Health/metrics HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_admin_addr")]
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// When false, no prometheus counters are updated.
    #[serde(default)]
    pub enabled: bool,
}

// ── Defaults ──────────────────────────────────────────────────

fn default_log_level() -> String { "info".into() }
fn default_brokers() -> Vec<String> { vec!["localhost:9092".into()] }
fn default_topic() -> String { "logs".into() }
fn default_group_id() -> String { "logkeeper".into() }
fn default_min_bytes() -> usize { 10_000 }
fn default_max_bytes() -> usize { 10_000_000 }
fn default_read_retry_delay() -> u64 { 100 }
fn default_nodes() -> Vec<String> { vec!["http://localhost:9200".into()] }
fn default_index() -> String { "logs".into() }
fn default_request_timeout() -> u64 { 5000 }
fn default_burst_factor() -> usize { 5 }
fn default_admin_addr() -> String { "0.0.0.0:9180".into() }

// ── Impls ─────────────────────────────────────────────────────

impl Default for LogkeeperConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            broker: BrokerConfig::default(),
            sink: SinkConfig::default(),
            pipeline: PipelineConfig::default(),
            admin: AdminConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            topic: default_topic(),
            group_id: default_group_id(),
            min_bytes: default_min_bytes(),
            max_bytes: default_max_bytes(),
            read_retry_delay_ms: default_read_retry_delay(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            index: default_index(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            burst_factor: default_burst_factor(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_admin_addr(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: false }
    }
}

impl LogkeeperConfig {
    /// Load configuration from a TOML or YAML file + env overrides.
    ///
    /// Files ending in `.toml` are read as TOML, anything else as YAML.
    /// Environment variables use the `LOGKEEPER_` prefix with `__`
    /// between nested keys, e.g. `LOGKEEPER_SINK__INDEX=access`.
    /// Fails on unknown top-level keys from either source.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let figment = if path.extension().is_some_and(|ext| ext == "toml") {
            Figment::new().merge(Toml::file(path))
        } else {
            Figment::new().merge(Yaml::file(path))
        };
        let config: LogkeeperConfig = figment
            .merge(Env::prefixed("LOGKEEPER_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot start with.
    pub fn validate(&self) -> Result<(), LogkeeperError> {
        let invalid = |msg: &str| Err(LogkeeperError::ConfigError(msg.to_string()));

        if self.broker.brokers.iter().all(|b| b.trim().is_empty()) {
            return invalid("broker.brokers must list at least one address");
        }
        if self.broker.topic.is_empty() {
            return invalid("broker.topic must not be empty");
        }
        if self.broker.group_id.is_empty() {
            return invalid("broker.group_id must not be empty");
        }
        if self.broker.min_bytes > self.broker.max_bytes {
            return invalid("broker.min_bytes must not exceed broker.max_bytes");
        }
        if self.sink.nodes.iter().all(|n| n.trim().is_empty()) {
            return invalid("sink.nodes must list at least one address");
        }
        if self.sink.index.is_empty() {
            return invalid("sink.index must not be empty");
        }
        if self.sink.request_timeout_ms == 0 {
            return invalid("sink.request_timeout_ms must be positive");
        }
        if self.pipeline.burst_factor == 0 {
            return invalid("pipeline.burst_factor must be positive");
        }
        Ok(())
    }

    /// Effective worker count (0 → available CPUs).
    pub fn effective_workers(&self) -> usize {
        if self.pipeline.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.pipeline.workers
        }
    }

    /// Job queue capacity: workers × burst factor.
    pub fn queue_capacity(&self) -> usize {
        self.effective_workers() * self.pipeline.burst_factor
    }
}
