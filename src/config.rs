//! Options record consumed by the analysis pipeline.
//!
//! The pipeline never reads configuration files on its own; callers build an
//! [`AnalyzerConfig`] directly or load one from TOML with
//! [`AnalyzerConfig::load`].

use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::FileRole;
use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Globs (relative to the project root) a file must match to be scanned.
    pub include: Vec<String>,
    /// Globs that remove files from the scan even if included.
    pub exclude: Vec<String>,
    /// Forced roles for matching files; replaces content detection.
    pub role_overrides: Vec<RoleOverride>,
    /// Directory for the on-disk entity cache. `None` keeps the cache in memory.
    pub cache_dir: Option<PathBuf>,
    pub mode: ScanMode,
    /// Extract files on the rayon thread pool.
    pub parallel: bool,
    pub tie_break: TieBreak,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            include: vec!["**/*.py".to_string()],
            exclude: vec![
                "**/.git/**".to_string(),
                "**/venv/**".to_string(),
                "**/.venv/**".to_string(),
                "**/env/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/site-packages/**".to_string(),
                "**/__pycache__/**".to_string(),
            ],
            role_overrides: Vec::new(),
            cache_dir: None,
            mode: ScanMode::Incremental,
            parallel: true,
            tie_break: TieBreak::RolePreference,
        }
    }
}

impl AnalyzerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| AnalysisError::Config(err.to_string()))
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_role_override(mut self, pattern: &str, roles: &[FileRole]) -> Self {
        self.role_overrides.push(RoleOverride {
            pattern: pattern.to_string(),
            roles: roles.to_vec(),
        });
        self
    }

    /// Compiles every glob, failing on the first invalid pattern.
    pub fn path_rules(&self) -> Result<PathRules> {
        Ok(PathRules {
            include: compile_all(&self.include)?,
            exclude: compile_all(&self.exclude)?,
            overrides: self
                .role_overrides
                .iter()
                .map(|rule| Ok((compile(&rule.pattern)?, rule.roles.clone())))
                .collect::<Result<_>>()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleOverride {
    pub pattern: String,
    pub roles: Vec<FileRole>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    /// Reuse cache entries whose fingerprint still matches.
    #[default]
    Incremental,
    /// Ignore cached entries and extract every file again.
    FullRescan,
}

/// How the resolver picks a target among several same-named candidates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Prefer the entity kind the link kind expects, then the referencing
    /// file, then path order.
    #[default]
    RolePreference,
    /// Prefer the referencing file, then path order.
    PathOrder,
}

/// Compiled include/exclude/override globs.
#[derive(Debug, Clone, Default)]
pub struct PathRules {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    overrides: Vec<(Pattern, Vec<FileRole>)>,
}

impl PathRules {
    /// An empty include list admits everything.
    pub fn is_included(&self, relative_path: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|p| p.matches(relative_path));
        included && !self.exclude.iter().any(|p| p.matches(relative_path))
    }

    /// Roles forced by the first matching override, if any.
    pub fn override_roles(&self, relative_path: &str) -> Option<&[FileRole]> {
        self.overrides
            .iter()
            .find(|(pattern, _)| pattern.matches(relative_path))
            .map(|(_, roles)| roles.as_slice())
    }
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern)
        .map_err(|err| AnalysisError::Config(format!("invalid glob `{pattern}`: {err}")))
}

fn compile_all(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns.iter().map(|pattern| compile(pattern)).collect()
}
