//! Configuration for holoreg.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (HOLOREG_HOME, HOLOREG_BACKEND, HOLOREG_PRINCIPAL)
//! 2. Config file (.holoreg/config.yaml)
//! 3. Defaults (~/.holoreg, journal backend)
//!
//! Config file discovery:
//! - Searches current directory and parents for .holoreg/config.yaml
//! - `store.home` in the config file is relative to the .holoreg/ directory

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::Vocabulary;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub vocabulary: VocabularyConfig,
    /// Default caller identity for the CLI
    #[serde(default)]
    pub principal: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// memory | journal | sqlite
    pub backend: Option<Backend>,
    /// Data directory (relative to the .holoreg/ directory)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VocabularyConfig {
    /// Extra content type names beyond the built-in ones
    #[serde(default)]
    pub content_types: Vec<String>,
    /// Extra license type names beyond the built-in ones
    #[serde(default)]
    pub license_types: Vec<String>,
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Memory,
    #[default]
    Journal,
    Sqlite,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Memory => write!(f, "memory"),
            Backend::Journal => write!(f, "journal"),
            Backend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(Backend::Memory),
            "journal" | "jsonl" => Ok(Backend::Journal),
            "sqlite" | "db" => Ok(Backend::Sqlite),
            _ => anyhow::bail!("Unknown store backend: {}", s),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Data directory for file-backed stores
    pub home: PathBuf,
    /// Selected storage backend
    pub backend: Backend,
    /// Accepted extension names
    pub vocabulary: Vocabulary,
    /// Default caller identity (if configured)
    pub principal: Option<String>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Configuration rooted at `home` with defaults for everything else
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            backend: Backend::default(),
            vocabulary: Vocabulary::new(),
            principal: None,
            config_file: None,
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".holoreg").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge file settings, environment and defaults
fn resolve(config_file: Option<PathBuf>, file: Option<ConfigFile>) -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".holoreg");

    let (store, vocabulary, principal) = match file {
        Some(file) => (file.store, file.vocabulary, file.principal),
        None => (StoreConfig::default(), VocabularyConfig::default(), None),
    };

    let home = if let Ok(env_home) = std::env::var("HOLOREG_HOME") {
        PathBuf::from(env_home)
    } else if let (Some(home_path), Some(config_path)) = (&store.home, &config_file) {
        let holoreg_dir = config_path.parent().unwrap_or(Path::new("."));
        resolve_path(holoreg_dir, home_path)
    } else {
        default_home
    };

    let backend = match std::env::var("HOLOREG_BACKEND") {
        Ok(raw) => raw.parse()?,
        Err(_) => store.backend.unwrap_or_default(),
    };

    let principal = std::env::var("HOLOREG_PRINCIPAL").ok().or(principal);

    let vocabulary = Vocabulary::new()
        .with_content_types(&vocabulary.content_types)
        .with_license_types(&vocabulary.license_types);

    Ok(ResolvedConfig {
        home,
        backend,
        vocabulary,
        principal,
        config_file,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let config_file = find_config_file();
    let file = config_file.as_deref().map(load_config_file).transpose()?;
    resolve(config_file, file)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
