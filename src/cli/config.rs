use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use url::Url;

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HarvesterConfig {
    pub crawler: CrawlerSettings,
    pub site: SiteProfile,
    pub output: OutputSettings,
}

/// How much and how fast to crawl
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CrawlerSettings {
    pub target_record_count: usize,
    pub max_pages: u32,
    pub collect_full_details: bool,
    pub posted_within: PostedWithin,
    pub concurrency: usize,
    pub politeness_delay: DelayRange, // Jittered delay before each fetch
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

/// Inclusive millisecond range
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

/// Recency window for the initial search
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum,
)]
pub enum PostedWithin {
    #[default]
    #[serde(rename = "anytime")]
    #[value(name = "anytime")]
    Anytime,

    #[serde(rename = "24h")]
    #[value(name = "24h")]
    Day,

    #[serde(rename = "7d")]
    #[value(name = "7d")]
    Week,

    #[serde(rename = "30d")]
    #[value(name = "30d")]
    Month,
}

impl fmt::Display for PostedWithin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PostedWithin::Anytime => "anytime",
            PostedWithin::Day => "24h",
            PostedWithin::Week => "7d",
            PostedWithin::Month => "30d",
        };
        f.write_str(label)
    }
}

/// Everything specific to the recruiting site being crawled
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SiteProfile {
    pub base_url: String,
    pub search_path: String,
    pub posted_within_param: Option<String>,
    pub posted_within_values: HashMap<PostedWithin, String>,
    pub detail_link_pattern: String, // Regex over the URL path
    pub card_selectors: Vec<String>,
    pub currency: String,
}

/// Where records go
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OutputSettings {
    pub path: PathBuf,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            crawler: CrawlerSettings {
                target_record_count: 100,
                max_pages: 999,
                collect_full_details: true,
                posted_within: PostedWithin::Anytime,
                concurrency: 4,
                politeness_delay: DelayRange {
                    min_ms: 250,
                    max_ms: 750,
                },
                request_timeout_secs: 30,
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            },
            site: SiteProfile {
                base_url: "https://www.jobberman.com".to_string(),
                search_path: "/jobs".to_string(),
                posted_within_param: Some("created_at".to_string()),
                posted_within_values: HashMap::from([
                    (PostedWithin::Day, "24 hours".to_string()),
                    (PostedWithin::Week, "7 days".to_string()),
                    (PostedWithin::Month, "30 days".to_string()),
                ]),
                detail_link_pattern: r"^/listings/[^/]+/?$".to_string(),
                card_selectors: vec![
                    "div[data-cy='listing-cards-components']".to_string(),
                    "article.search-result".to_string(),
                ],
                currency: "NGN".to_string(),
            },
            output: OutputSettings {
                path: PathBuf::from("jobs.jsonl"),
            },
        }
    }
}

impl SiteProfile {
    /// First list page for a crawl restricted to `posted_within`
    pub fn search_url(&self, posted_within: PostedWithin) -> Result<Url> {
        let base = Url::parse(&self.base_url)
            .context(format!("Invalid site base URL: {}", self.base_url))?;
        let mut url = base
            .join(&self.search_path)
            .context(format!("Invalid search path: {}", self.search_path))?;

        if let (Some(param), Some(value)) = (
            self.posted_within_param.as_deref(),
            self.posted_within_values.get(&posted_within),
        ) {
            url.query_pairs_mut().append_pair(param, value);
        }

        Ok(url)
    }
}

impl HarvesterConfig {
    /// Get the path to the config directory
    fn config_dir() -> PathBuf {
        let mut path = if let Some(proj_dirs) = directories::ProjectDirs::from("com", "job-harvester", "job-harvester") {
            proj_dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from("./config")
        };

        path.push("sites");
        if !path.exists() {
            if let Err(e) = fs::create_dir_all(&path) {
                error!("Failed to create config directory: {}", e);
            }
        }

        path.pop();
        path
    }

    /// Load the default configuration, writing it out on first use
    pub fn load_default() -> Result<Self> {
        let config_path = Self::config_dir().join("default.yaml");

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            info!("Default configuration not found. Creating...");
            let config = Self::default();
            config.save_as_default()?;
            Ok(config)
        }
    }

    /// Where the named site profile lives
    pub fn profile_path(profile: &str) -> PathBuf {
        Self::config_dir().join("sites").join(format!("{}.yaml", profile))
    }

    /// Load a site profile
    pub fn load_profile(profile: &str) -> Result<Self> {
        let profile_path = Self::profile_path(profile);

        if profile_path.exists() {
            Self::load_from_file(&profile_path)
        } else {
            anyhow::bail!("Profile '{}' not found", profile)
        }
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .context(format!("Failed to parse configuration file: {}", path.display()))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the crawl cannot run with
    pub fn validate(&self) -> Result<()> {
        let crawler = &self.crawler;
        if crawler.target_record_count == 0 {
            anyhow::bail!("target_record_count must be positive");
        }
        if crawler.max_pages == 0 {
            anyhow::bail!("max_pages must be positive");
        }
        if crawler.concurrency == 0 {
            anyhow::bail!("concurrency must be positive");
        }
        if crawler.politeness_delay.min_ms > crawler.politeness_delay.max_ms {
            anyhow::bail!(
                "politeness_delay min ({}ms) exceeds max ({}ms)",
                crawler.politeness_delay.min_ms,
                crawler.politeness_delay.max_ms
            );
        }

        Url::parse(&self.site.base_url)
            .context(format!("Invalid site base URL: {}", self.site.base_url))?;
        Regex::new(&self.site.detail_link_pattern)
            .context(format!("Invalid detail link pattern: {}", self.site.detail_link_pattern))?;

        Ok(())
    }

    /// Save the configuration as the default
    pub fn save_as_default(&self) -> Result<()> {
        let config_path = Self::config_dir().join("default.yaml");
        self.save_to_file(&config_path)
    }

    /// Load the configuration at `path`, writing the defaults there first
    /// when no file exists. Returns whether the file was created. An
    /// existing file that fails to load is an error and is left untouched.
    pub fn load_or_create(path: &Path) -> Result<(Self, bool)> {
        if path.exists() {
            return Ok((Self::load_from_file(path)?, false));
        }

        let config = Self::default();
        config.save_to_file(path)?;
        Ok((config, true))
    }

    fn save_to_file(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let contents = serde_yaml::to_string(self)
            .context("Failed to serialize configuration")?;

        fs::write(path, contents)
            .context(format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// List all available profiles
    pub fn list_profiles() -> Result<Vec<String>> {
        let sites_dir = Self::config_dir().join("sites");

        if !sites_dir.exists() {
            return Ok(vec![]);
        }

        let mut profiles = Vec::new();

        for entry in fs::read_dir(sites_dir)? {
            let path = entry?.path();

            if path.is_file() && path.extension().map_or(false, |ext| ext == "yaml") {
                if let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) {
                    profiles.push(name.to_string());
                }
            }
        }

        profiles.sort();
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = HarvesterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.crawler.target_record_count, 100);
        assert_eq!(config.crawler.max_pages, 999);
        assert!(config.crawler.collect_full_details);
        assert_eq!(config.site.currency, "NGN");
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = HarvesterConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("posted_within: anytime"));
        assert_eq!(HarvesterConfig::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = HarvesterConfig::default();
        config.crawler.target_record_count = 0;
        assert!(config.validate().is_err());

        let mut config = HarvesterConfig::default();
        config.crawler.politeness_delay = DelayRange { min_ms: 900, max_ms: 100 };
        assert!(config.validate().is_err());

        let mut config = HarvesterConfig::default();
        config.site.detail_link_pattern = "([".to_string();
        assert!(config.validate().is_err());

        let mut config = HarvesterConfig::default();
        config.site.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    fn temp_profile() -> PathBuf {
        std::env::temp_dir()
            .join(format!("job-harvester-{}", uuid::Uuid::new_v4()))
            .join("sites")
            .join("board.yaml")
    }

    #[test]
    fn test_load_or_create_writes_missing_profile() {
        let path = temp_profile();

        let (config, created) = HarvesterConfig::load_or_create(&path).unwrap();
        assert!(created);
        assert_eq!(config, HarvesterConfig::default());
        assert!(path.exists());

        let (_, created) = HarvesterConfig::load_or_create(&path).unwrap();
        assert!(!created);

        let _ = fs::remove_dir_all(path.parent().and_then(Path::parent).unwrap());
    }

    #[test]
    fn test_load_or_create_keeps_broken_profile() {
        let path = temp_profile();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let broken = "crawler:\n  target_record_count: [oops\n";
        fs::write(&path, broken).unwrap();

        assert!(HarvesterConfig::load_or_create(&path).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), broken);

        let invalid = serde_yaml::to_string(&HarvesterConfig::default())
            .unwrap()
            .replace("concurrency: 4", "concurrency: 0");
        fs::write(&path, &invalid).unwrap();

        assert!(HarvesterConfig::load_or_create(&path).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), invalid);

        let _ = fs::remove_dir_all(path.parent().and_then(Path::parent).unwrap());
    }

    #[test]
    fn test_search_url_uses_posted_within() {
        let site = HarvesterConfig::default().site;
        assert_eq!(
            site.search_url(PostedWithin::Anytime).unwrap().as_str(),
            "https://www.jobberman.com/jobs"
        );
        assert_eq!(
            site.search_url(PostedWithin::Week).unwrap().as_str(),
            "https://www.jobberman.com/jobs?created_at=7+days"
        );
    }
}
