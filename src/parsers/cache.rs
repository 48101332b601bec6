//! Entity cache keyed by project-relative file path.
//!
//! The scanner only relies on the [`EntityCache`] contract. Two backends
//! ship with the crate: [`MemoryCache`], which can be snapshotted to bytes
//! between runs, and [`DiskCache`], which keeps one bincode file per entry.

use bincode::Options;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::EXTRACTOR_VERSION;
use crate::core::{fingerprint, Diagnostic, FileRole, RawEntity};
use crate::error::CacheError;

/// Everything extraction produced for one file, plus the fingerprint of the
/// content it was produced from.
///
/// `path` stays the first field: [`DiskCache`] reads it back as a header
/// without decoding the rest of the entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: String,
    pub fingerprint: String,
    pub extractor_version: u32,
    pub roles: Vec<FileRole>,
    pub entities: Vec<RawEntity>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CacheEntry {
    pub fn new(
        path: String,
        fingerprint: String,
        roles: Vec<FileRole>,
        entities: Vec<RawEntity>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self {
            path,
            fingerprint,
            extractor_version: EXTRACTOR_VERSION,
            roles,
            entities,
            diagnostics,
        }
    }

    /// True when the entry was produced from exactly this content by the
    /// current extractor.
    pub fn is_fresh(&self, fingerprint: &str) -> bool {
        self.fingerprint == fingerprint && self.extractor_version == EXTRACTOR_VERSION
    }
}

/// Key-value store the scanner reads before extracting a file and writes
/// after. Keys are independent: implementations never need cross-key
/// coordination, so one writer per key is enough for parallel scans.
pub trait EntityCache: Send + Sync {
    fn get(&self, path: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Replaces any existing entry for `entry.path`.
    fn put(&self, entry: CacheEntry) -> Result<(), CacheError>;

    fn evict(&self, path: &str) -> Result<(), CacheError>;

    fn keys(&self) -> Result<Vec<String>, CacheError>;
}

/// Process-local cache backed by a concurrent hash map.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes every entry, sorted by path, into an opaque byte blob.
    pub fn snapshot(&self) -> Result<Vec<u8>, CacheError> {
        let mut entries: Vec<CacheEntry> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        bincode::serialize(&entries).map_err(|err| CacheError::Encode(err.to_string()))
    }

    /// Rebuilds a cache from [`MemoryCache::snapshot`] output.
    pub fn restore(bytes: &[u8]) -> Result<Self, CacheError> {
        let entries: Vec<CacheEntry> =
            bincode::deserialize(bytes).map_err(|err| CacheError::Corrupt {
                key: "<snapshot>".to_string(),
                reason: err.to_string(),
            })?;
        let cache = Self::new();
        for entry in entries {
            cache.entries.insert(entry.path.clone(), entry);
        }
        Ok(cache)
    }
}

impl EntityCache for MemoryCache {
    fn get(&self, path: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.get(path).map(|entry| entry.value().clone()))
    }

    fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries.insert(entry.path.clone(), entry);
        Ok(())
    }

    fn evict(&self, path: &str) -> Result<(), CacheError> {
        self.entries.remove(path);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut keys: Vec<String> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        Ok(keys)
    }
}

/// Upper bound on an entry header; anything larger is not a path.
const MAX_KEY_BYTES: u64 = 64 * 1024;

/// Persistent cache storing one bincode file per source file, fronted by an
/// in-memory map of entries already loaded this process.
pub struct DiskCache {
    cache_dir: PathBuf,
    memory_cache: DashMap<String, CacheEntry>,
}

impl DiskCache {
    /// Opens (or creates) `cache_dir`. Staging files left behind by an
    /// interrupted write are removed.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)?;
        let cache = Self {
            cache_dir,
            memory_cache: DashMap::new(),
        };
        for staging in cache.files_with_extension("tmp")? {
            warn!("Removing stale cache staging file {}", staging.display());
            fs::remove_file(staging)?;
        }
        Ok(cache)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Removes every entry from memory and disk.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.memory_cache.clear();
        for file in self.entry_files()? {
            fs::remove_file(file)?;
        }
        Ok(())
    }

    fn cache_path(&self, path: &str) -> PathBuf {
        let digest = fingerprint(path.as_bytes());
        self.cache_dir.join(format!("entry_{}.bincode", &digest[..32]))
    }

    fn entry_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        self.files_with_extension("bincode")
    }

    fn files_with_extension(&self, extension: &str) -> Result<Vec<PathBuf>, CacheError> {
        let mut files = Vec::new();
        for dir_entry in fs::read_dir(&self.cache_dir)? {
            let file = dir_entry?.path();
            if file.extension().and_then(|ext| ext.to_str()) == Some(extension) {
                files.push(file);
            }
        }
        Ok(files)
    }

    /// Decodes only the leading `path` of an entry file.
    fn read_key(&self, file: &Path) -> Result<String, CacheError> {
        let reader = BufReader::new(File::open(file)?);
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .with_limit(MAX_KEY_BYTES)
            .deserialize_from(reader)
            .map_err(|err| CacheError::Encode(err.to_string()))
    }

    fn load_from_disk(&self, cache_path: &Path, key: &str) -> Result<CacheEntry, CacheError> {
        let data = fs::read(cache_path)?;
        bincode::deserialize(&data).map_err(|err| CacheError::Corrupt {
            key: key.to_string(),
            reason: err.to_string(),
        })
    }

    /// Writes through a temporary file so an interrupted run never leaves a
    /// half-written entry behind.
    fn store_to_disk(&self, cache_path: &Path, entry: &CacheEntry) -> Result<(), CacheError> {
        let data = bincode::serialize(entry).map_err(|err| CacheError::Encode(err.to_string()))?;
        let staging = cache_path.with_extension("tmp");
        fs::write(&staging, data)?;
        fs::rename(&staging, cache_path)?;
        Ok(())
    }
}

impl EntityCache for DiskCache {
    fn get(&self, path: &str) -> Result<Option<CacheEntry>, CacheError> {
        if let Some(entry) = self.memory_cache.get(path) {
            return Ok(Some(entry.value().clone()));
        }

        let cache_path = self.cache_path(path);
        if !cache_path.exists() {
            return Ok(None);
        }
        let entry = self.load_from_disk(&cache_path, path)?;
        if entry.path != path {
            return Err(CacheError::Corrupt {
                key: path.to_string(),
                reason: format!("entry belongs to {}", entry.path),
            });
        }
        self.memory_cache.insert(path.to_string(), entry.clone());
        Ok(Some(entry))
    }

    fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let cache_path = self.cache_path(&entry.path);
        self.store_to_disk(&cache_path, &entry)?;
        self.memory_cache.insert(entry.path.clone(), entry);
        Ok(())
    }

    fn evict(&self, path: &str) -> Result<(), CacheError> {
        self.memory_cache.remove(path);
        let cache_path = self.cache_path(path);
        if cache_path.exists() {
            fs::remove_file(cache_path)?;
        }
        Ok(())
    }

    /// Unreadable entry files are deleted; they would only ever be misses.
    fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut keys = Vec::new();
        for file in self.entry_files()? {
            match self.read_key(&file) {
                Ok(key) => keys.push(key),
                Err(err) => {
                    warn!("Dropping unreadable cache file {}: {}", file.display(), err);
                    fs::remove_file(&file)?;
                }
            }
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}
