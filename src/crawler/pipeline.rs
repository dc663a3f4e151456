//! Stage dispatch: one fetched document in, links or a record out.
//!
//! Everything here is synchronous; the parsed document never outlives a
//! single call, so callers may run it between awaits.

use std::collections::HashMap;
use std::sync::Arc;

use scraper::Html;
use tracing::{debug, warn};
use url::Url;

use super::quota::{DetailOutcome, ListingDecision, QuotaController};
use super::task::{CrawlTask, Stage};
use crate::extract::cascade::cascade_fields;
use crate::extract::links::canonicalize;
use crate::extract::listing::{ListingHarvest, ListingRules};
use crate::extract::merge::merge;
use crate::extract::pagination::next_page_url;
use crate::extract::structured::{find_job_posting, structured_fields};
use crate::extract::{ExtractError, JobRecord, ListingSeed, PartialRecord};

/// What a list page produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOutput {
    /// Canonical detail URLs in document order
    pub links: Vec<String>,

    /// Card seeds keyed by canonical detail URL
    pub seeds_by_url: HashMap<String, ListingSeed>,

    /// Absent once the branch should stop
    pub next_page_url: Option<String>,

    /// Records emitted straight from seeds
    pub records: Vec<JobRecord>,

    /// Detail pages admitted by the quota
    pub follow_ups: Vec<(String, ListingSeed)>,
}

/// What a detail page produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailOutput {
    pub record: Option<JobRecord>,

    /// The page was read but yielded no valid record. Duplicate and
    /// over-quota pages are skipped, not dropped.
    pub dropped: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageOutput {
    List(ListOutput),
    Detail(DetailOutput),
}

/// Read a list page without touching crawl state.
pub fn extract_listing(html: &str, url: &Url, rules: &ListingRules) -> (ListingHarvest, Option<Url>) {
    let document = Html::parse_document(html);
    let harvest = rules.harvest(&document, url);
    let next = next_page_url(&document, url);
    (harvest, next)
}

/// Build the record for a detail page without touching crawl state.
pub fn extract_detail(
    html: &str,
    url: &Url,
    seed: Option<&ListingSeed>,
    currency: &str,
) -> Result<JobRecord, ExtractError> {
    let document = Html::parse_document(html);

    let cascade = cascade_fields(&document, url);
    let structured = match find_job_posting(&document) {
        Some(node) => structured_fields(&node, url, currency),
        None => {
            debug!("No structured job posting on {}", url);
            PartialRecord::default()
        }
    };

    let seed = seed.cloned().unwrap_or_default();
    merge(&seed, &cascade, &structured, canonicalize(url))
}

/// The per-document entry point the engine calls.
pub struct Pipeline {
    quota: Arc<QuotaController>,
    rules: ListingRules,
    currency: String,
}

impl Pipeline {
    pub fn new(quota: Arc<QuotaController>, rules: ListingRules, currency: impl Into<String>) -> Self {
        Self {
            quota,
            rules,
            currency: currency.into(),
        }
    }

    pub fn quota(&self) -> &QuotaController {
        &self.quota
    }

    /// Process the fetched body of `task`.
    pub fn process(&self, html: &str, task: &CrawlTask) -> Result<PageOutput, ExtractError> {
        let url = Url::parse(&task.url).map_err(|_| ExtractError::InvalidUrl {
            href: task.url.clone(),
        })?;

        match task.stage {
            Stage::List => Ok(PageOutput::List(self.process_list(html, &url, task))),
            Stage::Detail => Ok(PageOutput::Detail(self.process_detail(html, &url, task.seed.as_ref()))),
        }
    }

    fn process_list(&self, html: &str, url: &Url, task: &CrawlTask) -> ListOutput {
        let (harvest, next) = extract_listing(html, url, &self.rules);
        debug!(
            "List page {} yielded {} links and {} seeds",
            url,
            harvest.links.len(),
            harvest.seeds.len()
        );

        let (records, follow_ups) = match self.quota.admit_listing(&harvest) {
            ListingDecision::Push(records) => (records, Vec::new()),
            ListingDecision::Enqueue(follow_ups) => (Vec::new(), follow_ups),
        };

        let keep_going = self
            .quota
            .should_continue(&task.branch, task.page_number, harvest.links.len());

        ListOutput {
            next_page_url: next.filter(|_| keep_going).map(String::from),
            seeds_by_url: harvest.seeds.into_iter().collect(),
            links: harvest.links,
            records,
            follow_ups,
        }
    }

    fn process_detail(&self, html: &str, url: &Url, seed: Option<&ListingSeed>) -> DetailOutput {
        if self.quota.is_exhausted() || self.quota.is_visited(url.as_str()) {
            debug!("Skipping detail page {}", url);
            return DetailOutput::default();
        }

        let record = match extract_detail(html, url, seed, &self.currency) {
            Ok(record) => record,
            Err(e) => {
                warn!("Dropping record: {}", e);
                return DetailOutput {
                    record: None,
                    dropped: true,
                };
            }
        };

        match self.quota.record_detail(record) {
            DetailOutcome::Emitted(record) => DetailOutput {
                record: Some(record),
                dropped: false,
            },
            DetailOutcome::Duplicate | DetailOutcome::QuotaReached => DetailOutput::default(),
        }
    }
}
