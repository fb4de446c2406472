pub mod codec;
pub mod config;
pub mod entry;
pub mod error;

pub use codec::{DecodeError, EncodeError, decode, encode};
pub use config::LogkeeperConfig;
pub use entry::LogEntry;
pub use error::LogkeeperError;
