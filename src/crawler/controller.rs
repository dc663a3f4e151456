use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::FutureExt;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use super::pipeline::{PageOutput, Pipeline};
use super::quota::{QuotaController, QuotaSettings, QuotaSnapshot};
use super::task::CrawlTask;
use crate::cli::config::{DelayRange, HarvesterConfig};
use crate::extract::listing::ListingRules;
use crate::extract::JobRecord;
use crate::storage::{RecordSink, TaskQueue};
use crate::utils::{CrawlMetrics, FetchOutcome, MetricsCollector};

/// Final state of a crawl run
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub run_id: String,
    pub metrics: CrawlMetrics,
    pub quota: QuotaSnapshot,
}

/// Drives fetch workers over the task queue and feeds the pipeline
pub struct CrawlerController {
    config: HarvesterConfig,
    run_id: String,
    worker: Worker,
}

/// Everything a worker needs, cheap to clone into each spawned task
#[derive(Clone)]
struct Worker {
    client: reqwest::Client,
    queue: Arc<TaskQueue>,
    pipeline: Arc<Pipeline>,
    sink: Arc<dyn RecordSink>,
    metrics: MetricsCollector,
    delay: DelayRange,
}

enum Fetched {
    Page(String),
    Blocked(u16),
    Failed(String),
}

impl CrawlerController {
    /// Create a new crawler controller with the given configuration
    pub fn new(config: HarvesterConfig, sink: Arc<dyn RecordSink>) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .user_agent(config.crawler.user_agent.clone())
            .timeout(Duration::from_secs(config.crawler.request_timeout_secs))
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        let rules = ListingRules::new(&config.site.detail_link_pattern, &config.site.card_selectors)
            .context(format!("Invalid detail link pattern: {}", config.site.detail_link_pattern))?;

        let quota = Arc::new(QuotaController::new(QuotaSettings {
            target: config.crawler.target_record_count,
            max_pages: config.crawler.max_pages,
            collect_full_details: config.crawler.collect_full_details,
        }));

        let run_id = Uuid::new_v4().to_string();
        let worker = Worker {
            client,
            queue: Arc::new(TaskQueue::new()),
            pipeline: Arc::new(Pipeline::new(quota, rules, config.site.currency.clone())),
            sink,
            metrics: MetricsCollector::new(run_id.clone()),
            delay: config.crawler.politeness_delay,
        };

        Ok(Self { config, run_id, worker })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Crawl from `start_url` until the queue drains or the quota is met
    pub async fn run(&self, start_url: Url) -> Result<CrawlSummary> {
        let concurrency = self.config.crawler.concurrency;
        info!(
            "Starting crawl {} at {} with {} workers (target {} records)",
            self.run_id, start_url, concurrency, self.config.crawler.target_record_count
        );

        self.worker.queue.push_task(CrawlTask::list(start_url.as_str())).await;

        let handles: Vec<_> = (0..concurrency)
            .map(|i| {
                let worker = self.worker.clone();
                tokio::spawn(async move { worker.run(i).await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Worker task failed: {}", e);
            }
        }

        self.worker.sink.flush().await.context("Failed to flush record sink")?;

        let metrics = self.worker.metrics.finish().await;
        let quota = self.worker.pipeline.quota().snapshot();

        info!(
            "Crawl {} finished in {}s: {} records, {} pages fetched, {} failed, {} blocked",
            self.run_id,
            metrics.elapsed_seconds(),
            metrics.records_emitted,
            metrics.pages_fetched,
            metrics.pages_failed,
            metrics.pages_blocked
        );
        if metrics.pages_blocked > 0 {
            warn!("{} responses were blocked (403/429); the session may need attention", metrics.pages_blocked);
        }

        Ok(CrawlSummary {
            run_id: self.run_id.clone(),
            metrics,
            quota,
        })
    }
}

impl Worker {
    async fn run(self, id: usize) {
        debug!("Worker {} started", id);

        while let Some(task) = self.queue.pop_task().await {
            debug!("Worker {} processing {} page: {}", id, task.stage, task.url);
            let url = task.url.clone();

            // The task must be completed even if handling it panicked
            if AssertUnwindSafe(self.handle(task)).catch_unwind().await.is_err() {
                error!("Worker {} panicked while handling {}", id, url);
            }
            self.queue.complete().await;

            if self.pipeline.quota().is_exhausted() {
                self.queue.close().await;
            }
        }

        debug!("Worker {} finished", id);
    }

    async fn handle(&self, task: CrawlTask) {
        self.politeness_delay().await;

        let body = match self.fetch(&task.url).await {
            Fetched::Page(body) => body,
            Fetched::Blocked(status) => {
                warn!("Blocked with status {} on {}", status, task.url);
                return;
            }
            Fetched::Failed(reason) => {
                warn!("Failed to fetch {}: {}", task.url, reason);
                return;
            }
        };

        let output = match self.pipeline.process(&body, &task) {
            Ok(output) => output,
            Err(e) => {
                warn!("Skipping {}: {}", task.url, e);
                return;
            }
        };

        match output {
            PageOutput::List(list) => {
                debug!(
                    "{} links and {} seeds on {}",
                    list.links.len(),
                    list.seeds_by_url.len(),
                    task.url
                );
                self.store_all(&list.records).await;

                for (url, seed) in list.follow_ups {
                    self.queue.push_task(task.detail(url, seed)).await;
                }
                if let Some(next) = list.next_page_url {
                    self.queue.push_task(task.next_page(next)).await;
                }
            }
            PageOutput::Detail(detail) => match detail.record {
                Some(record) => self.store_all(std::slice::from_ref(&record)).await,
                None if detail.dropped => self.metrics.record_dropped().await,
                None => {}
            },
        }
    }

    async fn store_all(&self, records: &[JobRecord]) {
        for record in records {
            match self.sink.store(record).await {
                Ok(()) => self.metrics.record_emitted(1).await,
                Err(e) => error!("Failed to store record {}: {:#}", record.url, e),
            }
        }
    }

    async fn politeness_delay(&self) {
        let millis = {
            let mut rng = rand::thread_rng();
            rng.gen_range(self.delay.min_ms..=self.delay.max_ms)
        };
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    async fn fetch(&self, url: &str) -> Fetched {
        let timer = self.metrics.start_timer();

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.record_fetch(FetchOutcome::Failed, timer.end(), None, 0).await;
                return Fetched::Failed(e.to_string());
            }
        };

        let status = response.status();
        let code = status.as_u16();

        if matches!(code, 403 | 429) {
            self.metrics.record_fetch(FetchOutcome::Blocked, timer.end(), Some(code), 0).await;
            return Fetched::Blocked(code);
        }
        if !status.is_success() {
            self.metrics.record_fetch(FetchOutcome::Failed, timer.end(), Some(code), 0).await;
            return Fetched::Failed(format!("HTTP {}", status));
        }

        match response.text().await {
            Ok(body) => {
                self.metrics
                    .record_fetch(FetchOutcome::Success, timer.end(), Some(code), body.len())
                    .await;
                Fetched::Page(body)
            }
            Err(e) => {
                self.metrics.record_fetch(FetchOutcome::Failed, timer.end(), Some(code), 0).await;
                Fetched::Failed(e.to_string())
            }
        }
    }
}
