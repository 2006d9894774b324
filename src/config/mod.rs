//! Configuration: API origin and request timeout
//!
//! Values resolve from (highest first) environment variables, the
//! `config.toml` file in the platform config directory, then defaults.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5050";
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
/// Timeouts below this are rejected in favour of the default.
pub const MIN_TIMEOUT_MS: u64 = 1_000;

const ENV_BASE_URL: &str = "SUPPORT_CONSOLE_API_BASE_URL";
const ENV_TIMEOUT_MS: &str = "SUPPORT_CONSOLE_TIMEOUT_MS";

/// On-disk settings. Both fields optional; absent means "use the default".
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub api_base_url: Option<String>,
    /// Integer, float or numeric string.
    pub timeout_ms: Option<toml::Value>,
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    /// The timeout as text for [`parse_timeout_ms`]; other TOML types read as unset.
    fn timeout_text(&self) -> Option<String> {
        match self.timeout_ms.as_ref()? {
            toml::Value::Integer(v) => Some(v.to_string()),
            toml::Value::Float(v) => Some(v.to_string()),
            toml::Value::String(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// Resolved runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// API origin without trailing slash
    pub api_base_url: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Get config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "support-console", "support-console")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk and environment.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let file = if path.exists() {
            let content = fs::read_to_string(&path).context("Failed to read config file")?;
            FileConfig::parse(&content)?
        } else {
            FileConfig::default()
        };

        let config = Self::resolve(&file, |key| std::env::var(key).ok());
        tracing::debug!(
            "Config resolved: base={} timeout={}ms",
            config.api_base_url,
            config.timeout_ms
        );
        Ok(config)
    }

    /// Merge file settings with environment lookups.
    pub fn resolve(file: &FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let base = env(ENV_BASE_URL)
            .map(|v| normalize_base_url(&v))
            .filter(|v| !v.is_empty())
            .or_else(|| {
                file.api_base_url
                    .as_deref()
                    .map(normalize_base_url)
                    .filter(|v| !v.is_empty())
            })
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let timeout_raw = env(ENV_TIMEOUT_MS).or_else(|| file.timeout_text());
        let timeout_ms = parse_timeout_ms(timeout_raw.as_deref().unwrap_or(""));

        Self {
            api_base_url: base,
            timeout_ms,
        }
    }

    /// Replace the API origin (e.g. from `--base-url`).
    pub fn with_base_url(mut self, base: &str) -> Self {
        let normalized = normalize_base_url(base);
        if !normalized.is_empty() {
            self.api_base_url = normalized;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Trim whitespace and trailing slashes.
pub fn normalize_base_url(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}

/// Parse a millisecond timeout; blank, non-numeric or sub-floor values fall back to the default.
pub fn parse_timeout_ms(raw: &str) -> u64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return DEFAULT_TIMEOUT_MS;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= MIN_TIMEOUT_MS as f64 => v.floor() as u64,
        _ => DEFAULT_TIMEOUT_MS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_configured() {
        let config = Config::resolve(&FileConfig::default(), env_of(&[]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let file = FileConfig {
            api_base_url: Some("http://file.local".to_string()),
            timeout_ms: Some(toml::Value::String("5000".to_string())),
        };
        let config = Config::resolve(
            &file,
            env_of(&[(ENV_BASE_URL, " https://api.example.com// ")]),
        );
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.timeout_ms, 5000);
    }

    #[test]
    fn test_timeout_floor_and_garbage() {
        assert_eq!(parse_timeout_ms(""), DEFAULT_TIMEOUT_MS);
        assert_eq!(parse_timeout_ms("abc"), DEFAULT_TIMEOUT_MS);
        assert_eq!(parse_timeout_ms("999"), DEFAULT_TIMEOUT_MS);
        assert_eq!(parse_timeout_ms("1000"), 1000);
        assert_eq!(parse_timeout_ms("2500.7"), 2500);
    }

    #[test]
    fn test_file_timeout_accepts_integer_and_string() {
        let file = FileConfig::parse("api_base_url = \"http://file.local/\"\ntimeout_ms = 5000\n")
            .unwrap();
        let config = Config::resolve(&file, env_of(&[]));
        assert_eq!(config.api_base_url, "http://file.local");
        assert_eq!(config.timeout_ms, 5000);

        let file = FileConfig::parse("timeout_ms = \"2500\"").unwrap();
        assert_eq!(Config::resolve(&file, env_of(&[])).timeout_ms, 2500);

        let file = FileConfig::parse("timeout_ms = 200").unwrap();
        assert_eq!(Config::resolve(&file, env_of(&[])).timeout_ms, DEFAULT_TIMEOUT_MS);

        let file = FileConfig::parse("timeout_ms = true").unwrap();
        assert_eq!(Config::resolve(&file, env_of(&[])).timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_blank_base_url_keeps_default() {
        let config = Config::default().with_base_url("   ");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }
}
