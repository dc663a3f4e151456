use std::fmt;

use serde::{Deserialize, Serialize};

use crate::extract::ListingSeed;

/// Which kind of page a document is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// A search-results page of job cards
    List,

    /// A single job posting
    Detail,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::List => write!(f, "list"),
            Stage::Detail => write!(f, "detail"),
        }
    }
}

/// Represents a page to fetch and run through the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlTask {
    /// URL to fetch
    pub url: String,

    /// How the fetched document is processed
    pub stage: Stage,

    /// List page number within its pagination branch (1 for the first page)
    pub page_number: u32,

    /// Canonical start URL of the pagination branch this task belongs to
    pub branch: String,

    /// Card fields carried from the list page to its detail page
    pub seed: Option<ListingSeed>,
}

impl CrawlTask {
    /// First page of a new pagination branch
    pub fn list(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            branch: url.clone(),
            url,
            stage: Stage::List,
            page_number: 1,
            seed: None,
        }
    }

    /// The page after this list page, on the same branch
    pub fn next_page(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stage: Stage::List,
            page_number: self.page_number + 1,
            branch: self.branch.clone(),
            seed: None,
        }
    }

    /// A detail page found on this list page
    pub fn detail(&self, url: impl Into<String>, seed: ListingSeed) -> Self {
        Self {
            url: url.into(),
            stage: Stage::Detail,
            page_number: self.page_number,
            branch: self.branch.clone(),
            seed: Some(seed),
        }
    }
}
