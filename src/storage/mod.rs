pub mod queue;
pub mod records;

// Re-export common types
pub use queue::TaskQueue;
pub use records::{JsonLinesSink, RecordSink};
