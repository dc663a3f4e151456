use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the filter for the requested verbosity
fn env_filter(verbose: bool) -> Result<EnvFilter> {
    let crate_level = if verbose { "job_harvester=debug" } else { "job_harvester=info" };
    Ok(EnvFilter::from_default_env()
        .add_directive(crate_level.parse()?)
        .add_directive("warn".parse()?))
}

/// Create the log file, and its directory if needed
fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .context(format!("Failed to create log directory: {}", parent.display()))?;
    }
    fs::File::create(path).context(format!("Failed to create log file: {}", path.display()))
}

/// Initialize the logging system; `log_file` adds a plain-text copy on disk
pub fn init_logging(verbose: bool, log_file: Option<PathBuf>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => Some(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(open_log_file(&path)?),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter(verbose)?)
        .with(fmt::layer().with_target(true).with_span_events(FmtSpan::CLOSE))
        .with(file_layer)
        .init();

    Ok(())
}

/// Create a default log file path
pub fn default_log_file() -> PathBuf {
    let mut path = if let Some(proj_dirs) = directories::ProjectDirs::from("com", "job-harvester", "job-harvester") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from("./logs")
    };

    path.push("harvester.log");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_parse() {
        assert!(env_filter(false).is_ok());
        assert!(env_filter(true).is_ok());
    }

    #[test]
    fn test_open_log_file_creates_directory() {
        let dir = std::env::temp_dir().join(format!("job-harvester-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("harvester.log");

        assert!(open_log_file(&path).is_ok());
        assert!(path.is_file());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_default_log_file_name() {
        assert!(default_log_file().ends_with("harvester.log"));
    }
}
