use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Crawl metrics collector
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    /// In-memory metrics store
    metrics: Arc<Mutex<CrawlMetrics>>,
}

/// Counters for a single crawl run
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CrawlMetrics {
    /// Run identifier
    pub run_id: String,

    /// Start time of the run
    pub start_time: DateTime<Utc>,

    /// End time, set when the run finishes
    pub end_time: Option<DateTime<Utc>>,

    /// Pages fetched with a success status
    pub pages_fetched: usize,

    /// Fetches that failed outright or returned an error status
    pub pages_failed: usize,

    /// 403/429 responses
    pub pages_blocked: usize,

    /// Records handed to the sink
    pub records_emitted: usize,

    /// Detail pages whose record was rejected, e.g. for a missing title
    pub records_dropped: usize,

    /// Bytes downloaded
    pub bytes_downloaded: usize,

    /// Total fetch time in milliseconds
    pub fetch_time_ms: u64,

    /// HTTP status code counts
    pub status_codes: HashMap<u16, usize>,
}

impl CrawlMetrics {
    /// Average fetch latency in milliseconds
    pub fn average_fetch_ms(&self) -> u64 {
        let fetches = self.pages_fetched + self.pages_failed + self.pages_blocked;
        if fetches == 0 {
            0
        } else {
            self.fetch_time_ms / fetches as u64
        }
    }

    /// Wall-clock duration of the run so far
    pub fn elapsed_seconds(&self) -> i64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_seconds()
    }
}

/// How a fetch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Success,
    Blocked,
    Failed,
}

impl MetricsCollector {
    /// Create a collector for a new run
    pub fn new(run_id: impl Into<String>) -> Self {
        let metrics = CrawlMetrics {
            run_id: run_id.into(),
            start_time: Utc::now(),
            ..Default::default()
        };

        Self {
            metrics: Arc::new(Mutex::new(metrics)),
        }
    }

    /// Record a fetch
    pub async fn record_fetch(&self, outcome: FetchOutcome, duration_ms: u64, status_code: Option<u16>, bytes: usize) {
        let mut metrics = self.metrics.lock().await;

        match outcome {
            FetchOutcome::Success => metrics.pages_fetched += 1,
            FetchOutcome::Blocked => metrics.pages_blocked += 1,
            FetchOutcome::Failed => metrics.pages_failed += 1,
        }

        metrics.bytes_downloaded += bytes;
        metrics.fetch_time_ms += duration_ms;

        if let Some(code) = status_code {
            *metrics.status_codes.entry(code).or_default() += 1;
        }
    }

    pub async fn record_emitted(&self, count: usize) {
        self.metrics.lock().await.records_emitted += count;
    }

    pub async fn record_dropped(&self) {
        self.metrics.lock().await.records_dropped += 1;
    }

    /// Start timing a request
    pub fn start_timer(&self) -> RequestTimer {
        RequestTimer {
            start: Instant::now(),
        }
    }

    /// Stamp the end time and return the final counters
    pub async fn finish(&self) -> CrawlMetrics {
        let mut metrics = self.metrics.lock().await;
        metrics.end_time = Some(Utc::now());
        metrics.clone()
    }
}

/// Request timer for measuring request durations
pub struct RequestTimer {
    /// Start time of the request
    start: Instant,
}

impl RequestTimer {
    /// End timing and get the duration in milliseconds
    pub fn end(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_by_outcome() {
        let collector = MetricsCollector::new("run-1");
        collector.record_fetch(FetchOutcome::Success, 100, Some(200), 1024).await;
        collector.record_fetch(FetchOutcome::Blocked, 50, Some(429), 0).await;
        collector.record_fetch(FetchOutcome::Failed, 30, None, 0).await;
        collector.record_emitted(3).await;
        collector.record_dropped().await;

        let metrics = collector.finish().await;
        assert_eq!(metrics.run_id, "run-1");
        assert_eq!(metrics.pages_fetched, 1);
        assert_eq!(metrics.pages_blocked, 1);
        assert_eq!(metrics.pages_failed, 1);
        assert_eq!(metrics.records_emitted, 3);
        assert_eq!(metrics.records_dropped, 1);
        assert_eq!(metrics.bytes_downloaded, 1024);
        assert_eq!(metrics.status_codes.get(&429), Some(&1));
        assert_eq!(metrics.average_fetch_ms(), 60);
        assert!(metrics.end_time.is_some());
    }
}
