//! Access-token providers for the upstream API.
//!
//! Token acquisition and refresh happen elsewhere (an OAuth consent flow
//! writes a token file, or the caller exports a token). This module only
//! reads an existing token.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::config::ApiConfig;

/// Yields a bearer token for API requests.
pub trait CredentialProvider: Send + Sync {
    fn access_token(&self) -> Result<String>;
}

/// Reads the token from an environment variable.
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvToken {
    fn access_token(&self) -> Result<String> {
        let token = std::env::var(&self.var)
            .with_context(|| format!("{} environment variable not set", self.var))?;
        if token.trim().is_empty() {
            bail!("{} environment variable is empty", self.var);
        }
        Ok(token.trim().to_string())
    }
}

/// Reads `access_token` from an OAuth token JSON file.
pub struct TokenFile {
    path: PathBuf,
}

#[derive(Deserialize)]
struct StoredToken {
    access_token: String,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialProvider for TokenFile {
    fn access_token(&self) -> Result<String> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read token file: {}", self.path.display()))?;
        let token: StoredToken = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse token file: {}", self.path.display()))?;
        if token.access_token.trim().is_empty() {
            bail!("token file {} has an empty access_token", self.path.display());
        }
        Ok(token.access_token)
    }
}

/// The provider selected by `[api]`: the token file when set, else the env var.
pub fn from_config(api: &ApiConfig) -> Box<dyn CredentialProvider> {
    match &api.token_file {
        Some(path) => Box::new(TokenFile::new(path.clone())),
        None => Box::new(EnvToken::new(api.token_env.clone())),
    }
}
