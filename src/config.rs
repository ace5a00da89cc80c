use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::adapters::llm::ProviderKind;

/// Problems with the run's inputs. These are reported before any git or
/// network activity happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("file path, source revision, and target revision are required")]
    MissingInput,

    #[error("unknown provider '{0}'. Use 'anthropic' or 'openai'")]
    UnknownProvider(String),

    #[error("{env} environment variable not set. Use --key flag or set the environment variable.")]
    MissingCredential { env: &'static str },

    #[error("no files selected")]
    NoFilesSelected,

    #[error("invalid exclude pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffEngine {
    #[default]
    Builtin,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_provider")]
    pub provider: String,

    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,

    #[serde(default)]
    pub diff_engine: DiffEngine,

    #[serde(default = "default_diff_command")]
    pub diff_command: String,

    /// Glob patterns hidden from the interactive picker.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key: None,
            base_url: None,
            request_timeout_secs: None,
            diff_engine: DiffEngine::default(),
            diff_command: default_diff_command(),
            exclude: Vec::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        for candidate in [".safeguard.yml", ".safeguard.yaml"] {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".safeguard.yml");
            if home_config.exists() {
                return Self::load_from(&home_config);
            }
        }

        Ok(Config::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn merge_with_cli(
        &mut self,
        cli_provider: Option<String>,
        cli_model: Option<String>,
        cli_key: Option<String>,
    ) {
        if let Some(provider) = cli_provider {
            self.provider = provider;
        }
        if let Some(model) = cli_model {
            self.model = Some(model);
        }
        if let Some(key) = cli_key {
            self.api_key = Some(key);
        }
    }

    pub fn provider_kind(&self) -> Result<ProviderKind, ConfigError> {
        self.provider.parse()
    }

    pub fn model_for(&self, provider: ProviderKind) -> String {
        self.model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| provider.default_model().to_string())
    }

    pub fn exclude_patterns(&self) -> Result<Vec<glob::Pattern>, ConfigError> {
        self.exclude
            .iter()
            .map(|pattern| {
                glob::Pattern::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect()
    }
}

/// Resolves the provider credential: explicit value first, then the
/// provider's environment variable. Empty strings count as absent.
pub fn resolve_credential<F>(
    explicit: Option<&str>,
    provider: ProviderKind,
    lookup: F,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = explicit.filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }

    let env = provider.api_key_env();
    lookup(env)
        .filter(|k| !k.is_empty())
        .ok_or(ConfigError::MissingCredential { env })
}

fn default_provider() -> String {
    "anthropic".to_string()
}

fn default_diff_command() -> String {
    "diff".to_string()
}
