use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{AnalyzerConfig, PathRules, ScanMode};
use crate::core::{Diagnostic, DiagnosticKind, FileClassifier, FileRole, RawEntity};
use crate::error::{CacheError, Result};
use crate::parsers::cache::{CacheEntry, EntityCache};
use crate::parsers::EntityExtractor;

/// SHA-256 of raw file bytes, lowercase hex.
pub fn fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStatus {
    CachedHit,
    ReExtracted,
    Unreadable,
    NotExtracted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    /// Absent only when the file could not be read at all.
    pub fingerprint: Option<String>,
    pub roles: Vec<FileRole>,
    /// Fingerprint the cache held for this path before the scan.
    pub previous_fingerprint: Option<String>,
    pub status: ScanStatus,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanStats {
    pub files: usize,
    pub cache_hits: usize,
    pub re_extracted: usize,
    pub not_extracted: usize,
    pub unreadable: usize,
    pub evicted: usize,
}

/// Everything one walk of the project produced, sorted by path.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub files: Vec<FileRecord>,
    pub entities: Vec<RawEntity>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: ScanStats,
}

struct FileScan {
    record: FileRecord,
    entities: Vec<RawEntity>,
    diagnostics: Vec<Diagnostic>,
}

impl FileScan {
    fn unreadable(path: String, fingerprint: Option<String>, reason: String) -> Self {
        Self {
            diagnostics: vec![Diagnostic::new(
                path.clone(),
                DiagnosticKind::UnreadableFile,
                reason,
            )],
            record: FileRecord {
                path,
                fingerprint,
                roles: Vec::new(),
                previous_fingerprint: None,
                status: ScanStatus::Unreadable,
            },
            entities: Vec::new(),
        }
    }
}

/// Walks a project tree, classifies each included file and extracts its
/// entities, reusing cache entries whose fingerprint still matches.
pub struct ProjectScanner {
    classifier: FileClassifier,
    extractor: EntityExtractor,
    rules: PathRules,
    mode: ScanMode,
    parallel: bool,
}

impl ProjectScanner {
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        let rules = config.path_rules()?;
        Ok(Self {
            classifier: FileClassifier::with_rules(rules.clone()),
            extractor: EntityExtractor::new(),
            rules,
            mode: config.mode,
            parallel: config.parallel,
        })
    }

    /// Relative, `/`-separated paths of every included file, sorted.
    pub fn discover(&self, root: &Path) -> Vec<String> {
        self.walk(root).paths
    }

    fn walk(&self, root: &Path) -> Walk {
        let mut walk = Walk::default();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let dir = err
                        .path()
                        .and_then(|path| relative_path(root, path))
                        .unwrap_or_else(|| ".".to_string());
                    warn!("Skipping unreadable directory {}: {}", dir, err);
                    walk.unreadable_dirs.push((dir, err.to_string()));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(relative) = relative_path(root, entry.path()) {
                if self.rules.is_included(&relative) {
                    walk.paths.push(relative);
                }
            }
        }
        walk.paths.sort();
        walk.unreadable_dirs.sort();
        walk
    }

    pub fn scan(&self, root: &Path, cache: &dyn EntityCache) -> Result<ScanOutcome> {
        let Walk {
            paths,
            unreadable_dirs,
        } = self.walk(root);
        info!("Scanning {} files under {}", paths.len(), root.display());

        let scans: Vec<FileScan> = if self.parallel {
            paths
                .par_iter()
                .map(|path| self.scan_file(root, path, cache))
                .collect::<Result<_>>()?
        } else {
            paths
                .iter()
                .map(|path| self.scan_file(root, path, cache))
                .collect::<Result<_>>()?
        };

        let mut outcome = ScanOutcome::default();
        let mut cached_paths = BTreeSet::new();
        for scan in scans {
            match scan.record.status {
                ScanStatus::CachedHit => outcome.stats.cache_hits += 1,
                ScanStatus::ReExtracted => outcome.stats.re_extracted += 1,
                ScanStatus::NotExtracted => outcome.stats.not_extracted += 1,
                ScanStatus::Unreadable => outcome.stats.unreadable += 1,
            }
            if matches!(
                scan.record.status,
                ScanStatus::CachedHit | ScanStatus::ReExtracted
            ) {
                cached_paths.insert(scan.record.path.clone());
            }
            outcome.entities.extend(scan.entities);
            outcome.diagnostics.extend(scan.diagnostics);
            outcome.files.push(scan.record);
        }
        for (dir, reason) in &unreadable_dirs {
            outcome.diagnostics.push(Diagnostic::new(
                dir.as_str(),
                DiagnosticKind::UnreadableFile,
                format!("cannot read directory: {reason}"),
            ));
        }
        outcome.stats.files = outcome.files.len();
        outcome.stats.evicted = self.evict_stale(cache, &cached_paths, &unreadable_dirs);

        outcome.files.sort_by(|a, b| a.path.cmp(&b.path));
        outcome.entities.sort_by(|a, b| {
            (&a.source_file, a.order).cmp(&(&b.source_file, b.order))
        });
        outcome.diagnostics.sort();

        info!(
            "Scan complete: {} cache hits, {} re-extracted, {} unreadable, {} evicted",
            outcome.stats.cache_hits,
            outcome.stats.re_extracted,
            outcome.stats.unreadable,
            outcome.stats.evicted
        );
        Ok(outcome)
    }

    fn scan_file(&self, root: &Path, path: &str, cache: &dyn EntityCache) -> Result<FileScan> {
        let bytes = match fs::read(root.join(path)) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Failed to read {}: {}", path, err);
                return Ok(FileScan::unreadable(
                    path.to_string(),
                    None,
                    format!("cannot read file: {err}"),
                ));
            }
        };
        let digest = fingerprint(&bytes);
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(err) => {
                warn!("Failed to decode {}: {}", path, err);
                return Ok(FileScan::unreadable(
                    path.to_string(),
                    Some(digest),
                    format!("file is not valid UTF-8: {err}"),
                ));
            }
        };

        let roles = self.classifier.classify(path, &content);
        let mut record = FileRecord {
            path: path.to_string(),
            fingerprint: Some(digest.clone()),
            roles: roles.clone(),
            previous_fingerprint: None,
            status: ScanStatus::NotExtracted,
        };
        if !roles.iter().any(|role| role.is_extractable()) {
            debug!("{}: no extractable role", path);
            return Ok(FileScan {
                record,
                entities: Vec::new(),
                diagnostics: Vec::new(),
            });
        }

        let mut diagnostics = Vec::new();
        if self.mode == ScanMode::Incremental {
            match cache.get(path) {
                Ok(Some(entry)) => {
                    record.previous_fingerprint = Some(entry.fingerprint.clone());
                    if entry.is_fresh(&digest) && entry.roles == roles {
                        debug!("{}: cache hit", path);
                        record.status = ScanStatus::CachedHit;
                        return Ok(FileScan {
                            record,
                            entities: entry.entities,
                            diagnostics: entry.diagnostics,
                        });
                    }
                }
                Ok(None) => {}
                Err(CacheError::Corrupt { reason, .. }) => {
                    warn!("Corrupt cache entry for {}: {}", path, reason);
                    diagnostics.push(Diagnostic::new(
                        path,
                        DiagnosticKind::CacheCorrupt,
                        format!("cache entry discarded: {reason}"),
                    ));
                }
                Err(err) => warn!("Cache lookup failed for {}: {}", path, err),
            }
        }

        debug!("{}: extracting as {:?}", path, roles);
        let extraction = self.extractor.extract(path, &content, &roles)?;
        let entry = CacheEntry::new(
            path.to_string(),
            digest,
            roles,
            extraction.entities,
            extraction.diagnostics,
        );
        if let Err(err) = cache.put(entry.clone()) {
            warn!("Failed to cache {}: {}", path, err);
        }

        record.status = ScanStatus::ReExtracted;
        diagnostics.extend(entry.diagnostics);
        Ok(FileScan {
            record,
            entities: entry.entities,
            diagnostics,
        })
    }

    /// Drops cache entries for files that no longer produce one. Entries
    /// under a directory the walk could not enter are left alone.
    fn evict_stale(
        &self,
        cache: &dyn EntityCache,
        live: &BTreeSet<String>,
        unreadable_dirs: &[(String, String)],
    ) -> usize {
        let keys = match cache.keys() {
            Ok(keys) => keys,
            Err(err) => {
                warn!("Failed to list cache keys: {}", err);
                return 0;
            }
        };
        let mut evicted = 0;
        let hidden = |key: &str| {
            unreadable_dirs.iter().any(|(dir, _)| {
                dir == "."
                    || key
                        .strip_prefix(dir.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
        };
        for key in keys
            .into_iter()
            .filter(|key| !live.contains(key) && !hidden(key.as_str()))
        {
            match cache.evict(&key) {
                Ok(()) => {
                    debug!("{}: evicted from cache", key);
                    evicted += 1;
                }
                Err(err) => warn!("Failed to evict {}: {}", key, err),
            }
        }
        evicted
    }
}

#[derive(Default)]
struct Walk {
    paths: Vec<String>,
    /// `(relative directory, reason)` for every directory that could not be read.
    unreadable_dirs: Vec<(String, String)>,
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .filter_map(|component| component.as_os_str().to_str())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
