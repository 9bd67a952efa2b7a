//! TTL disk cache shared by the schedule lookup and the generic extractor.
//!
//! Each entry is one file named after its code. Freshness is the file's
//! modification time: an entry older than the TTL is a miss and is never
//! returned. Entries are checked lazily on access; [`DiskCache::sweep_expired`]
//! removes stale files opportunistically at startup.
//!
//! A bounded in-memory tier sits in front of the files so that a backfill
//! of many tickets for the same train reads the schedule once. The memory
//! tier records the file's write time and applies the same TTL rule.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use moka::future::Cache as MokaCache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Default TTL: one week.
const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// File extension of cache entries.
const ENTRY_EXTENSION: &str = "txt";

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Folder holding the entry files.
    pub folder: PathBuf,

    /// How long an entry stays fresh after it was written.
    pub ttl: Duration,

    /// Maximum number of entries held in memory.
    pub max_capacity: u64,
}

impl CacheConfig {
    /// Create a config for the given folder with the default TTL.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            ttl: DEFAULT_TTL,
            max_capacity: 256,
        }
    }

    /// Set a custom TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// In-memory copy of an entry file.
#[derive(Clone)]
struct MemoryEntry {
    text: Arc<str>,
    written: SystemTime,
}

/// Get-or-compute cache keyed by opaque codes.
#[derive(Clone)]
pub struct DiskCache {
    folder: PathBuf,
    ttl: Duration,
    memory: MokaCache<PathBuf, MemoryEntry>,
}

impl fmt::Debug for DiskCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskCache")
            .field("folder", &self.folder)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl DiskCache {
    /// Create a cache. The folder is created lazily on first write.
    pub fn new(config: &CacheConfig) -> Self {
        let memory = MokaCache::builder().max_capacity(config.max_capacity).build();
        Self {
            folder: config.folder.clone(),
            ttl: config.ttl,
            memory,
        }
    }

    /// A cache over a sub-folder, sharing TTL and memory tier.
    ///
    /// Lets independent data sources use the same code space (a train
    /// number and a file stem may coincide) without colliding.
    pub fn scoped(&self, name: &str) -> Self {
        Self {
            folder: self.folder.join(file_stem(name)),
            ttl: self.ttl,
            memory: self.memory.clone(),
        }
    }

    /// The cache folder.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Path of the entry file for `code`.
    pub fn entry_path(&self, code: &str) -> PathBuf {
        self.folder
            .join(format!("{}.{ENTRY_EXTENSION}", file_stem(code)))
    }

    /// Return the fresh cached value for `code`, or compute, store and return it.
    ///
    /// A present entry that fails to deserialize is treated as a miss. Errors
    /// from `compute` are returned unchanged and nothing is stored. Failure
    /// to write the entry is logged; the computed value is still returned.
    pub async fn get_or_compute<T, E, F, Fut, S, SE, D, DE>(
        &self,
        code: &str,
        compute: F,
        serialize: S,
        deserialize: D,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        S: FnOnce(&T) -> Result<String, SE>,
        SE: fmt::Display,
        D: Fn(&str) -> Result<T, DE>,
        DE: fmt::Display,
    {
        let path = self.entry_path(code);

        if let Some(text) = self.read_fresh(&path).await {
            match deserialize(&text) {
                Ok(value) => {
                    debug!(code, "cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(code, error = %e, "corrupt cache entry, recomputing");
                    self.memory.invalidate(&path).await;
                }
            }
        } else {
            debug!(code, "cache miss");
        }

        let value = compute().await?;

        match serialize(&value) {
            Ok(text) => {
                if let Err(e) = self.write(&path, text).await {
                    warn!(code, path = %path.display(), error = %e, "failed to write cache entry");
                }
            }
            Err(e) => warn!(code, error = %e, "failed to serialize cache entry"),
        }

        Ok(value)
    }

    /// [`get_or_compute`](Self::get_or_compute) with JSON as the entry format.
    pub async fn get_or_compute_json<T, E, F, Fut>(&self, code: &str, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get_or_compute(
            code,
            compute,
            |value: &T| serde_json::to_string(value),
            |text: &str| serde_json::from_str::<T>(text),
        )
        .await
    }

    /// Drop the entry for `code` from disk and memory.
    pub async fn invalidate(&self, code: &str) {
        let path = self.entry_path(code);
        self.memory.invalidate(&path).await;
        if let Err(e) = tokio::fs::remove_file(&path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(code, error = %e, "failed to remove cache entry");
        }
    }

    /// Delete entry files older than the TTL, best-effort.
    ///
    /// Returns the number of files removed. Errors are ignored.
    pub fn sweep_expired(&self) -> usize {
        sweep_folder(&self.folder, self.ttl, SystemTime::now())
    }

    async fn read_fresh(&self, path: &Path) -> Option<String> {
        let now = SystemTime::now();

        if let Some(entry) = self.memory.get(path).await {
            if is_fresh(entry.written, now, self.ttl) {
                return Some(entry.text.to_string());
            }
            self.memory.invalidate(path).await;
        }

        let metadata = tokio::fs::metadata(path).await.ok()?;
        let written = metadata.modified().ok()?;
        if !metadata.is_file() || !is_fresh(written, now, self.ttl) {
            return None;
        }

        let text = tokio::fs::read_to_string(path).await.ok()?;
        self.memory
            .insert(
                path.to_path_buf(),
                MemoryEntry {
                    text: Arc::from(text.as_str()),
                    written,
                },
            )
            .await;
        Some(text)
    }

    async fn write(&self, path: &Path, text: String) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.folder).await?;

        // Readers never see a half-written entry
        let tmp = path.with_extension(format!("{ENTRY_EXTENSION}.tmp"));
        tokio::fs::write(&tmp, text.as_bytes()).await?;
        tokio::fs::rename(&tmp, path).await?;

        let written = tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .unwrap_or_else(|_| SystemTime::now());
        self.memory
            .insert(
                path.to_path_buf(),
                MemoryEntry {
                    text: Arc::from(text),
                    written,
                },
            )
            .await;
        Ok(())
    }
}

/// An entry written at `written` is fresh at `now` if younger than `ttl`.
///
/// Modification times in the future (clock skew) count as age zero.
fn is_fresh(written: SystemTime, now: SystemTime, ttl: Duration) -> bool {
    let age = now.duration_since(written).unwrap_or(Duration::ZERO);
    age < ttl
}

fn sweep_folder(folder: &Path, ttl: Duration, now: SystemTime) -> usize {
    let Ok(entries) = std::fs::read_dir(folder) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if metadata.is_dir() {
            removed += sweep_folder(&path, ttl, now);
            continue;
        }
        let stale = metadata
            .modified()
            .map(|written| !is_fresh(written, now, ttl))
            .unwrap_or(false);
        if stale && std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    removed
}

/// File name for a code.
///
/// Codes that are already safe file names are used as they are. Anything
/// else is cleaned up and suffixed with `~` and a digest of the original,
/// so distinct codes never share a file. `~` never appears in a safe name.
fn file_stem(code: &str) -> String {
    let cleaned: String = code
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').trim();
    if !cleaned.is_empty() && cleaned == code {
        return cleaned.to_string();
    }
    let digest = hex::encode(&Sha256::digest(code.as_bytes())[..8]);
    format!("{cleaned}~{digest}")
}
