use anyhow::{Context, Result};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::cli::config::{HarvesterConfig, PostedWithin};
use crate::crawler::pipeline::{extract_detail, extract_listing};
use crate::crawler::{CrawlerController, Stage};
use crate::extract::listing::ListingRules;
use crate::storage::JsonLinesSink;

/// Command line values that take precedence over the loaded configuration
#[derive(Debug, Default)]
pub struct CrawlOverrides {
    pub limit: Option<usize>,
    pub max_pages: Option<u32>,
    pub no_details: bool,
    pub concurrency: Option<usize>,
    pub output: Option<PathBuf>,
    pub posted_within: Option<PostedWithin>,
}

impl CrawlOverrides {
    fn apply(self, config: &mut HarvesterConfig) {
        if let Some(limit) = self.limit {
            config.crawler.target_record_count = limit;
        }
        if let Some(max_pages) = self.max_pages {
            config.crawler.max_pages = max_pages;
        }
        if self.no_details {
            config.crawler.collect_full_details = false;
        }
        if let Some(concurrency) = self.concurrency {
            config.crawler.concurrency = concurrency;
        }
        if let Some(output) = self.output {
            config.output.path = output;
        }
        if let Some(posted_within) = self.posted_within {
            config.crawler.posted_within = posted_within;
        }
    }
}

fn load_config(profile: Option<&str>) -> Result<HarvesterConfig> {
    match profile {
        Some(name) => HarvesterConfig::load_profile(name).context(format!("Failed to load profile: {}", name)),
        None => HarvesterConfig::load_default(),
    }
}

/// Run a crawl and append the records to the output file
pub async fn crawl(url: Option<String>, profile: Option<String>, overrides: CrawlOverrides) -> Result<()> {
    let mut config = load_config(profile.as_deref())?;
    overrides.apply(&mut config);
    config.validate()?;

    let start_url = match url {
        Some(url) => Url::parse(&url).context(format!("Invalid start URL: {}", url))?,
        None => config.site.search_url(config.crawler.posted_within)?,
    };

    let sink = Arc::new(JsonLinesSink::open(&config.output.path).await?);
    let controller = CrawlerController::new(config, sink.clone())?;

    let summary = controller.run(start_url).await?;

    info!("Records written to: {}", sink.path().display());
    println!("Run ID: {}", summary.run_id);
    println!("Records: {}", summary.metrics.records_emitted);
    println!(
        "Pages: {} fetched, {} failed, {} blocked",
        summary.metrics.pages_fetched, summary.metrics.pages_failed, summary.metrics.pages_blocked
    );
    println!("Average fetch: {}ms", summary.metrics.average_fetch_ms());
    println!("Output: {}", sink.path().display());

    Ok(())
}

/// Run the extraction pipeline on a saved document
pub async fn extract(file: PathBuf, url: String, stage: Stage, profile: Option<String>) -> Result<()> {
    let config = load_config(profile.as_deref())?;
    let html = tokio::fs::read_to_string(&file)
        .await
        .context(format!("Failed to read document: {}", file.display()))?;
    let url = Url::parse(&url).context(format!("Invalid document URL: {}", url))?;

    let output = match stage {
        Stage::List => {
            let rules = ListingRules::new(&config.site.detail_link_pattern, &config.site.card_selectors)
                .context("Invalid detail link pattern")?;
            let (harvest, next) = extract_listing(&html, &url, &rules);
            json!({
                "links": harvest.links,
                "seeds_by_url": harvest.seeds.into_iter().collect::<std::collections::BTreeMap<_, _>>(),
                "next_page_url": next.map(String::from),
            })
        }
        Stage::Detail => match extract_detail(&html, &url, None, &config.site.currency) {
            Ok(record) => json!({ "record": record }),
            Err(e) => {
                warn!("No record: {}", e);
                json!({ "record": null })
            }
        },
    };

    let rendered = serde_json::to_string_pretty(&output).context("Failed to serialize output")?;
    println!("{}", rendered);

    Ok(())
}

/// List all available configuration profiles
pub fn list_profiles() -> Result<()> {
    let profiles = HarvesterConfig::list_profiles()?;

    println!("Available configuration profiles:");
    for profile in profiles {
        println!("  - {}", profile);
    }

    Ok(())
}

/// Show a profile, creating it from defaults when missing
pub fn manage_profile(profile_name: String) -> Result<()> {
    let path = HarvesterConfig::profile_path(&profile_name);
    let (config, created) = HarvesterConfig::load_or_create(&path)
        .context(format!("Failed to load profile: {}", profile_name))?;

    if created {
        warn!("Profile '{}' did not exist. Created a default profile.", profile_name);
        println!("Created default profile: {} ({})", profile_name, path.display());
    } else {
        println!("Profile: {}", profile_name);
        println!("{}", serde_yaml::to_string(&config).context("Failed to serialize configuration")?);
    }

    Ok(())
}

/// Show the current configuration
pub fn show_config() -> Result<()> {
    let config = HarvesterConfig::load_default()?;
    println!("Current configuration:");
    println!("{}", serde_yaml::to_string(&config).context("Failed to serialize configuration")?);

    Ok(())
}
