//! Configuration loader and validator for the movie browser.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_TMDB_BASE: &str = "https://api.themoviedb.org/3/";
pub const DEFAULT_MIN_VOTE_COUNT: u32 = 1000;
const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub tmdb: Tmdb,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
}

/// TMDB API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tmdb {
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// ISO 639-1 language code sent with every request. Falls back to `LANG`.
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_min_vote_count")]
    pub min_vote_count: u32,
}

fn default_min_vote_count() -> u32 {
    DEFAULT_MIN_VOTE_COUNT
}

impl Config {
    /// Ensure required directories exist (creates the resolved data dir if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        self.ensure_dirs_with_home(std::env::var("HOME").ok().as_deref())
    }

    fn ensure_dirs_with_home(&self, home: Option<&str>) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(expand_home(&self.app.data_dir, home))
    }

    /// Data directory with a leading `~/` expanded against `HOME`.
    pub fn resolved_data_dir(&self) -> String {
        expand_home(&self.app.data_dir, std::env::var("HOME").ok().as_deref())
    }

    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/mymovies.db", self.resolved_data_dir()))
    }

    pub fn base_url(&self) -> &str {
        self.tmdb
            .base_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_TMDB_BASE)
    }

    /// Language for API requests: explicit config first, then the locale in `LANG`.
    pub fn language(&self) -> String {
        if let Some(lang) = self.tmdb.language.as_deref().filter(|s| !s.trim().is_empty()) {
            return lang.trim().to_string();
        }
        language_from_locale(std::env::var("LANG").ok().as_deref())
    }
}

fn expand_home(path: &str, home: Option<&str>) -> String {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path.to_string(),
    }
}

/// Extract the language code from a POSIX locale such as `de_DE.UTF-8`.
pub fn language_from_locale(locale: Option<&str>) -> String {
    let Some(locale) = locale else {
        return DEFAULT_LANGUAGE.to_string();
    };
    let code = locale
        .split(['_', '.', '@', '-'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if code.len() < 2 || code == "c" || code == "posix" || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        DEFAULT_LANGUAGE.to_string()
    } else {
        code
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.tmdb.api_key.trim().is_empty() {
        return Err(ConfigError::Invalid("tmdb.api_key must be non-empty"));
    }
    if let Some(base) = cfg.tmdb.base_url.as_deref() {
        if !base.trim().is_empty() && reqwest::Url::parse(base).is_err() {
            return Err(ConfigError::Invalid("tmdb.base_url must be a valid URL"));
        }
    }
    Ok(())
}

/// Example configuration written by users as a starting point.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"

tmdb:
  api_key: "YOUR_TMDB_API_KEY"
  language: "en"
  min_vote_count: 1000
"#
}
