pub mod elasticsearch;
pub mod memory;
pub mod sink;

pub use elasticsearch::ElasticsearchSink;
pub use memory::MemorySink;
pub use sink::{Sink, SinkError};
