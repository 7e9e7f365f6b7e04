//! Runtime configuration.
//!
//! Layering, lowest to highest precedence: built-in defaults, an optional TOML
//! file, environment variables, command-line flags (applied by the binary).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::DEFAULT_BASE_URL;
use crate::enrich::{EnrichOptions, RelationMode, DEFAULT_BATCH_SIZE};
use crate::error::ConfigError;
use crate::fetch::RefreshOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub api_base_url: String,
    /// How many Pokémon one refresh lists and enriches.
    pub limit: usize,
    pub offset: usize,
    /// Concurrent detail fetches per batch.
    pub batch_size: usize,
    pub request_timeout_secs: u64,
    pub relation_mode: RelationMode,
    pub fetch_descriptions: bool,
    pub fetch_sprites: bool,
    /// Entries per page in the viewer.
    pub page_size: usize,
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            limit: 151,
            offset: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            request_timeout_secs: 10,
            relation_mode: RelationMode::AllTypes,
            fetch_descriptions: true,
            fetch_sprites: true,
            page_size: 20,
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&data, &path.display().to_string())
    }

    /// Defaults, or the file at `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Apply `POKEMON_LIMIT` and `POKEDEX_API_URL` from `lookup`. Unparsable
    /// values are rejected rather than ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("POKEMON_LIMIT") {
            self.limit = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("POKEMON_LIMIT={:?} is not a count", raw)))?;
        }
        if let Some(url) = lookup("POKEDEX_API_URL") {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be at least 1".into()));
        }
        if self.limit == 0 {
            return Err(ConfigError::Invalid("limit must be at least 1".into()));
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "api_base_url {:?} is not an http(s) URL",
                self.api_base_url
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn enrich_options(&self) -> EnrichOptions {
        EnrichOptions {
            batch_size: self.batch_size,
            request_timeout: self.request_timeout(),
            relation_mode: self.relation_mode,
            fetch_descriptions: self.fetch_descriptions,
        }
    }

    pub fn refresh_options(&self) -> RefreshOptions {
        RefreshOptions {
            limit: self.limit,
            offset: self.offset,
            enrich: self.enrich_options(),
            data_dir: self.data_dir.clone(),
            fetch_sprites: self.fetch_sprites,
        }
    }
}
