use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::extract::JobRecord;

/// Destination for emitted job records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist a single record
    async fn store(&self, record: &JobRecord) -> Result<()>;

    /// Flush buffered output
    async fn flush(&self) -> Result<()>;
}

/// Appends one JSON object per line to a file
pub struct JsonLinesSink {
    /// Output file path
    path: PathBuf,

    /// Open handle, serialized across workers
    file: Mutex<fs::File>,
}

impl JsonLinesSink {
    /// Open (or create) the output file for appending
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create output directory {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context(format!("Failed to open output file {}", path.display()))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSink for JsonLinesSink {
    async fn store(&self, record: &JobRecord) -> Result<()> {
        let mut line = serde_json::to_string(record).context("Failed to serialize record")?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .context(format!("Failed to write record to {}", self.path.display()))?;

        debug!("Stored record: {}", record.url);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let mut file = self.file.lock().await;
        file.flush().await.context("Failed to flush output file")?;
        Ok(())
    }
}

/// Keeps records in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<JobRecord>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<JobRecord> {
        self.records.lock().await.clone()
    }
}

#[cfg(test)]
#[async_trait]
impl RecordSink for MemorySink {
    async fn store(&self, record: &JobRecord) -> Result<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u32) -> JobRecord {
        JobRecord {
            url: format!("https://www.example.com/listings/{}", id),
            title: format!("Job {}", id),
            ..Default::default()
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("job-harvester-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_json_lines_sink_appends() {
        let path = temp_path("records.jsonl");

        tokio_test::block_on(async {
            let sink = JsonLinesSink::open(&path).await.unwrap();
            sink.store(&record(1)).await.unwrap();
            sink.store(&record(2)).await.unwrap();
            sink.flush().await.unwrap();
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<JobRecord> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines, vec![record(1), record(2)]);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[tokio::test]
    async fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        sink.store(&record(7)).await.unwrap();
        assert_eq!(sink.records().await, vec![record(7)]);
    }

    #[tokio::test]
    async fn test_mock_sink_surfaces_errors() {
        let mut sink = MockRecordSink::new();
        sink.expect_store()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("disk full")));

        let err = sink.store(&record(1)).await.unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }
}
