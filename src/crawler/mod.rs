pub mod controller;
pub mod pipeline;
pub mod quota;
pub mod task;

// Re-export common types
pub use controller::CrawlerController;
pub use task::{CrawlTask, Stage};
