use thiserror::Error;

/// Unified error type for Logkeeper configuration.
///
/// Per-message failures never escape a worker as this type; they are
/// logged and counted where they happen.
#[derive(Error, Debug)]
pub enum LogkeeperError {
    #[error("Config error: {0}")]
    ConfigError(String),
}
