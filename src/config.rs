use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::CacheMode;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub mode: CacheMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            mode: CacheMode::Disk,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Maximum ids per channel lookup request.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Environment variable holding a bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// OAuth token JSON file; takes precedence over `token_env` when set.
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
            token_env: default_token_env(),
            token_file: None,
        }
    }
}

fn default_base_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}
fn default_page_size() -> usize {
    50
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_token_env() -> String {
    "YOUTUBE_ACCESS_TOKEN".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.json".to_string()]
}

/// Upper bound the channels endpoint accepts for `id` lists.
pub const MAX_PAGE_SIZE: usize = 50;

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.api.page_size == 0 || config.api.page_size > MAX_PAGE_SIZE {
        anyhow::bail!("api.page_size must be in 1..={}", MAX_PAGE_SIZE);
    }

    if config.api.timeout_secs == 0 {
        anyhow::bail!("api.timeout_secs must be > 0");
    }

    if config.api.base_url.trim().is_empty() {
        anyhow::bail!("api.base_url must not be empty");
    }

    if config.import.include_globs.is_empty() {
        anyhow::bail!("import.include_globs must list at least one pattern");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("subs.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "[db]\npath = \"./data/subs.sqlite\"\n");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.api.page_size, 50);
        assert_eq!(cfg.cache.mode, CacheMode::Disk);
        assert_eq!(cfg.api.token_env, "YOUTUBE_ACCESS_TOKEN");
        assert_eq!(cfg.import.include_globs, vec!["**/*.json"]);
    }

    #[test]
    fn cache_mode_parses() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "[db]\npath = \"x.sqlite\"\n[cache]\ndir = \"c\"\nmode = \"refresh\"\n",
        );
        assert_eq!(load_config(&path).unwrap().cache.mode, CacheMode::Refresh);
    }

    #[test]
    fn page_size_bounds_enforced() {
        let tmp = TempDir::new().unwrap();
        let zero = write(&tmp, "[db]\npath = \"x\"\n[api]\npage_size = 0\n");
        assert!(load_config(&zero).is_err());
        let big = write(&tmp, "[db]\npath = \"x\"\n[api]\npage_size = 51\n");
        assert!(load_config(&big).is_err());
    }
}
