//! Append-only log of AQI payloads, one JSON object per line

use ivy_shared::AqiPayload;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone)]
pub struct AqiLog {
    path: PathBuf,
}

impl AqiLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, payload: &AqiPayload) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_vec(payload)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(utc_time: i64) -> AqiPayload {
        AqiPayload {
            utc_time,
            calibrating_state: false,
            baseline_tvoc: 37415,
            baseline_eco2: 36172,
            eco2: 410,
            tvoc: 5,
            using_fallback: false,
        }
    }

    #[tokio::test]
    async fn test_append_creates_parents_and_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = AqiLog::new(dir.path().join("nested/aqi.jsonl"));

        log.append(&payload(1)).await.unwrap();
        log.append(&payload(2)).await.unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: AqiPayload = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second, payload(2));
        assert!(content.ends_with('\n'));
    }
}
