//! File-backed store: one JSON record per key, written atomically via a tmp
//! file + rename. Survives process restarts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::CacheStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    key: String,
    value: String,
    /// Unix millis.
    expires_at: i64,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating cache dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn record_path(&self, key: &str) -> PathBuf {
        // Keys come from upstream data, so hash them into safe file names
        let digest = Sha256::digest(key.as_bytes());
        let mut name = String::with_capacity(36);
        for b in digest.iter().take(16) {
            use std::fmt::Write as _;
            let _ = write!(&mut name, "{b:02x}");
        }
        self.dir.join(format!("{name}.json"))
    }
}

/// Per-process sequence for temp file names; concurrent writers of one key
/// must never share a temp file.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.record_path(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let rec: Record = serde_json::from_str(&raw)
            .with_context(|| format!("decoding cache record {}", path.display()))?;
        if rec.key != key {
            return Ok(None);
        }
        if rec.expires_at <= now_millis() {
            // best-effort cleanup; a concurrent writer may already have replaced it
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }
        Ok(Some(rec.value))
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let rec = Record {
            key: key.to_string(),
            value: value.to_string(),
            expires_at: now_millis().saturating_add(ttl_ms),
        };
        let path = self.record_path(key);
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.{}.{seq}.tmp", std::process::id()));
        let json = serde_json::to_vec(&rec)?;
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
