pub mod commands;
pub mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::cli::config::PostedWithin;
use crate::crawler::Stage;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to a file (the platform data dir when no path is given)
    #[arg(long, global = true, num_args = 0..=1, value_name = "PATH")]
    pub log_file: Option<Option<PathBuf>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a recruiting site and write job records
    Crawl {
        /// List page to start from (defaults to the profile's search page)
        url: Option<String>,

        /// Site profile to use (defaults to the default configuration)
        #[arg(short, long)]
        profile: Option<String>,

        /// Maximum number of records to produce
        #[arg(short, long)]
        limit: Option<usize>,

        /// Maximum list page number per pagination branch
        #[arg(short, long)]
        max_pages: Option<u32>,

        /// Emit records from list pages without visiting detail pages
        #[arg(long)]
        no_details: bool,

        /// Number of concurrent fetch workers
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// JSON Lines output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only jobs posted within this window
        #[arg(long, value_enum)]
        posted_within: Option<PostedWithin>,
    },

    /// Run extraction on a saved document and print the result as JSON
    Extract {
        /// Saved HTML document
        #[arg(required = true)]
        file: PathBuf,

        /// URL the document was fetched from
        #[arg(short, long)]
        url: String,

        /// Kind of page
        #[arg(short, long, value_enum, default_value_t = Stage::Detail)]
        stage: Stage,

        /// Site profile to use
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Manage configuration profiles
    Config {
        /// Profile name to manage
        #[arg(required = false)]
        profile: Option<String>,

        /// List all available profiles
        #[arg(short, long)]
        list: bool,
    },
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Crawl {
            url,
            profile,
            limit,
            max_pages,
            no_details,
            concurrency,
            output,
            posted_within,
        } => {
            info!("Starting crawl with profile {}", profile.as_deref().unwrap_or("default"));
            let overrides = commands::CrawlOverrides {
                limit,
                max_pages,
                no_details,
                concurrency,
                output,
                posted_within,
            };
            commands::crawl(url, profile, overrides).await
        }
        Commands::Extract { file, url, stage, profile } => {
            info!("Extracting {} page from {}", stage, file.display());
            commands::extract(file, url, stage, profile).await
        }
        Commands::Config { profile, list } => {
            if list {
                info!("Listing all configuration profiles");
                commands::list_profiles()
            } else if let Some(profile_name) = profile {
                info!("Managing configuration profile: {}", profile_name);
                commands::manage_profile(profile_name)
            } else {
                info!("Showing current configuration");
                commands::show_config()
            }
        }
    }
}
