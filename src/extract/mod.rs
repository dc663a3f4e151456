pub mod cascade;
pub mod classify;
pub mod links;
pub mod listing;
pub mod merge;
pub mod pagination;
pub mod record;
pub mod salary;
pub mod sanitize;
pub mod structured;
pub mod text;

use thiserror::Error;

// Re-export common types
pub use record::{JobRecord, ListingSeed, PartialRecord};

/// Per-record and per-link extraction failures.
///
/// None of these abort a crawl; callers drop the affected link or record
/// and carry on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("record for {url} has no title")]
    MissingTitle { url: String },

    #[error("cannot resolve link '{href}'")]
    InvalidUrl { href: String },

    #[error("unsupported scheme in {url}")]
    UnsupportedScheme { url: String },
}
