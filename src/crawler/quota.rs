use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::debug;

use crate::extract::links::canonicalize_str;
use crate::extract::listing::ListingHarvest;
use crate::extract::{JobRecord, ListingSeed};

/// Limits the quota controller enforces
#[derive(Debug, Clone, Copy)]
pub struct QuotaSettings {
    /// Maximum number of records emitted over the whole crawl
    pub target: usize,

    /// Last list page number a pagination branch may reach
    pub max_pages: u32,

    /// Visit detail pages instead of emitting list-page seeds directly
    pub collect_full_details: bool,
}

/// Process-wide crawl bookkeeping
#[derive(Debug, Default)]
struct CrawlState {
    produced: usize,
    enqueued: usize,
    /// Canonical URLs of emitted records; only ever grows
    visited: HashSet<String>,
    /// Canonical URLs already handed out as detail follow-ups
    scheduled: HashSet<String>,
    current_pages: HashMap<String, u32>,
}

/// What to do with a list page's seeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingDecision {
    /// Records built straight from seeds, already counted as produced
    Push(Vec<JobRecord>),

    /// Detail pages to visit, each with the seed from its card
    Enqueue(Vec<(String, ListingSeed)>),
}

/// Fate of a finished detail record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailOutcome {
    Emitted(JobRecord),
    Duplicate,
    QuotaReached,
}

/// Read-only view of the crawl counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuotaSnapshot {
    pub produced: usize,
    pub enqueued: usize,
    pub visited: usize,
    pub pages: HashMap<String, u32>,
}

/// Owns `CrawlState`; every decision that reads and then changes a counter
/// happens under one lock so concurrent workers cannot overshoot.
#[derive(Debug)]
pub struct QuotaController {
    settings: QuotaSettings,
    state: Mutex<CrawlState>,
}

impl QuotaController {
    pub fn new(settings: QuotaSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(CrawlState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, CrawlState> {
        // Counters stay consistent even if a holder panicked mid-update
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Turn a list page's harvest into pushed records or detail follow-ups,
    /// never exceeding what is left of the target.
    pub fn admit_listing(&self, harvest: &ListingHarvest) -> ListingDecision {
        let mut state = self.state();

        if !self.settings.collect_full_details {
            let remaining = self.settings.target.saturating_sub(state.produced);
            let mut records = Vec::new();

            for (url, seed) in &harvest.seeds {
                if records.len() >= remaining {
                    break;
                }
                if state.visited.contains(url) {
                    continue;
                }
                let Some(record) = seed.clone().into_record(url.clone()) else {
                    debug!("Seed for {} has no title, skipping", url);
                    continue;
                };
                state.visited.insert(url.clone());
                records.push(record);
            }

            state.produced += records.len();
            return ListingDecision::Push(records);
        }

        let remaining = self.settings.target.saturating_sub(state.enqueued);
        let mut follow_ups = Vec::new();

        for url in &harvest.links {
            if follow_ups.len() >= remaining {
                break;
            }
            if state.visited.contains(url) || !state.scheduled.insert(url.clone()) {
                continue;
            }
            let seed = harvest.seed_for(url).cloned().unwrap_or_default();
            follow_ups.push((url.clone(), seed));
        }

        state.enqueued += follow_ups.len();
        ListingDecision::Enqueue(follow_ups)
    }

    /// Record that `branch` is on `page` and report whether it may move on
    /// to the next page.
    pub fn should_continue(&self, branch: &str, page: u32, links_found: usize) -> bool {
        let mut state = self.state();
        state.current_pages.insert(branch.to_string(), page);

        let target = self.settings.target;
        !(state.produced >= target
            || state.enqueued >= target
            || page >= self.settings.max_pages
            || links_found == 0)
    }

    /// Whether a record for this URL has already been emitted.
    pub fn is_visited(&self, url: &str) -> bool {
        let key = canonicalize_str(url).unwrap_or_else(|| url.to_string());
        self.state().visited.contains(&key)
    }

    /// Whether any more records can be emitted.
    pub fn is_exhausted(&self) -> bool {
        self.state().produced >= self.settings.target
    }

    /// Admit a validated detail record, at most once per canonical URL.
    pub fn record_detail(&self, record: JobRecord) -> DetailOutcome {
        let key = canonicalize_str(&record.url).unwrap_or_else(|| record.url.clone());
        let mut state = self.state();

        if state.produced >= self.settings.target {
            return DetailOutcome::QuotaReached;
        }
        if !state.visited.insert(key) {
            return DetailOutcome::Duplicate;
        }

        state.produced += 1;
        DetailOutcome::Emitted(record)
    }

    pub fn snapshot(&self) -> QuotaSnapshot {
        let state = self.state();
        QuotaSnapshot {
            produced: state.produced,
            enqueued: state.enqueued,
            visited: state.visited.len(),
            pages: state.current_pages.clone(),
        }
    }
}
