//! Configuration management for agri-sentinel
//!
//! Resolution order: explicit `--config` path, `AGRI_SENTINEL_CONFIG`, then
//! `<config dir>/agri-sentinel/config.toml` when it exists, else defaults.
//! `AGRI_SENTINEL_MODEL_PATH` overrides `model.path` from any of them.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::policy::{DEFAULT_MOISTURE_THRESHOLD, DecisionPolicy};
use crate::preprocess::DEFAULT_INPUT_SIZE;

pub const CONFIG_ENV: &str = "AGRI_SENTINEL_CONFIG";
pub const MODEL_PATH_ENV: &str = "AGRI_SENTINEL_MODEL_PATH";

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Serialized classifier. No default: it must be configured.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Run on the CUDA execution provider.
    #[serde(default)]
    pub cuda: bool,

    /// Used for height/width when the model leaves them dynamic.
    #[serde(default = "default_input_size")]
    pub input_size: u32,

    /// Upper bound on one forward pass.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_moisture_threshold")]
    pub moisture_threshold: f32,
}

fn default_input_size() -> u32 {
    DEFAULT_INPUT_SIZE
}

fn default_moisture_threshold() -> f32 {
    DEFAULT_MOISTURE_THRESHOLD
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: None,
            cuda: false,
            input_size: default_input_size(),
            timeout_ms: None,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            moisture_threshold: default_moisture_threshold(),
        }
    }
}

impl Config {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("agri-sentinel").join("config.toml"))
    }

    /// Resolves and loads the config, then applies environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    tracing::debug!("no config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "loading config");
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::from_toml_str_with(content, |key| std::env::var(key).ok())
    }

    /// Parses `content`, then replaces `${VAR}` in string values with `lookup(VAR)`.
    pub fn from_toml_str_with<F>(content: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut document = toml::Value::Table(toml::from_str::<toml::Table>(content)?);
        let mut missing = Vec::new();
        substitute_env_vars(&mut document, &lookup, &mut missing);
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "config references unset environment variables: {}",
                missing.join(", ")
            )));
        }
        Ok(document.try_into()?)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(MODEL_PATH_ENV).filter(|p| !p.is_empty()) {
            self.model.path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.input_size == 0 {
            return Err(Error::Config("model.input_size must be positive".to_string()));
        }
        if self.model.timeout_ms == Some(0) {
            return Err(Error::Config("model.timeout_ms must be positive".to_string()));
        }
        if !(0.0..=100.0).contains(&self.policy.moisture_threshold) {
            return Err(Error::Config(format!(
                "policy.moisture_threshold must be within 0-100, got {}",
                self.policy.moisture_threshold
            )));
        }
        Ok(())
    }

    pub fn model_path(&self) -> Result<&Path> {
        self.model.path.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "model path not configured; set model.path, {MODEL_PATH_ENV} or --model"
            ))
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.model.timeout_ms.map(Duration::from_millis)
    }

    pub fn decision_policy(&self) -> Result<DecisionPolicy> {
        DecisionPolicy::with_threshold(self.policy.moisture_threshold)
    }
}

/// Expands `${VAR}` in every string value of an already parsed document, so
/// comments are never expanded and inserted text needs no TOML escaping.
fn substitute_env_vars<F>(value: &mut toml::Value, lookup: &F, missing: &mut Vec<String>)
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        toml::Value::String(text) => {
            if !ENV_VAR.is_match(text) {
                return;
            }
            let replaced = ENV_VAR
                .replace_all(text, |caps: &Captures| {
                    let name = &caps[1];
                    lookup(name).unwrap_or_else(|| {
                        missing.push(name.to_string());
                        String::new()
                    })
                })
                .into_owned();
            *text = replaced;
        }
        toml::Value::Array(items) => {
            for item in items {
                substitute_env_vars(item, lookup, missing);
            }
        }
        toml::Value::Table(table) => {
            for (_, item) in table.iter_mut() {
                substitute_env_vars(item, lookup, missing);
            }
        }
        _ => {}
    }
}
