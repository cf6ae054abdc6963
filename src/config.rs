//! Service configuration.
//!
//! Loaded from a TOML file when one exists, otherwise defaults; environment
//! variables override either.

use crate::provider::ChatOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILE: &str = "companion.toml";
const APP_DIR_NAME: &str = "wellness-companion";
const LONG_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Capability check budget
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Full round trip budget for one completion
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_top_p")]
    pub top_p: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// `tracing_subscriber` EnvFilter directive
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default = "default_log_to_file")]
    pub log_to_file: bool,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.9
}

fn default_max_tokens() -> u32 {
    500
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .map(|p| p.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_log_to_file() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            model: default_model(),
            probe_timeout_secs: default_probe_timeout(),
            request_timeout_secs: default_request_timeout(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            data_dir: default_data_dir(),
            log_filter: default_log_filter(),
            log_to_file: default_log_to_file(),
        }
    }
}

impl Config {
    /// The file [`Config::load`] reads: `path` if given, else `companion.toml` in the
    /// working directory. `None` when that file does not exist.
    pub fn source(path: Option<&Path>) -> Option<PathBuf> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        path.exists().then_some(path)
    }

    /// Reads [`Config::source`] if it exists, else defaults. Runs before logging is up,
    /// so it logs nothing itself.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match Self::source(path) {
            Some(path) => Self::from_toml(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Overrides from `COMPANION_*` variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("COMPANION_OLLAMA_URL") {
            self.ollama_url = url;
        }
        if let Some(model) = lookup("COMPANION_MODEL") {
            self.model = model;
        }
        if let Some(dir) = lookup("COMPANION_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(filter) = lookup("COMPANION_LOG") {
            self.log_filter = filter;
        }
    }

    /// Callers wait this long before a slow model falls back.
    pub fn has_long_timeout(&self) -> bool {
        self.request_timeout_secs > LONG_REQUEST_TIMEOUT_SECS
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ollama_url.trim().is_empty() {
            return Err(ConfigError::Invalid("ollama_url is empty".into()));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model is empty".into()));
        }
        if self.probe_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} outside 0..=2",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ConfigError::Invalid(format!("top_p {} outside 0..=1", self.top_p)));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".into()));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            temperature: self.temperature,
            top_p: self.top_p,
            num_predict: self.max_tokens,
        }
    }
}
