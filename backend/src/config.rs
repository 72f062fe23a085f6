use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/server.yaml";
pub const DEFAULT_NEWS_FEED_URL: &str =
    "https://news.google.com/rss/search?q=agriculture+india&hl=en-IN&gl=IN&ceid=IN:en";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: Option<String>,
    pub model: ModelConfig,
    pub uploads: UploadConfig,
    pub gemini: GeminiConfig,
    pub news: NewsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_path: PathBuf,
    pub features_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Only ever populated from the environment.
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub feed_url: String,
    pub poll_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origin: None,
            model: ModelConfig::default(),
            uploads: UploadConfig::default(),
            gemini: GeminiConfig::default(),
            news: NewsConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/crop_yield_model.json"),
            features_path: PathBuf::from("models/model_features.json"),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 60,
            api_key: None,
        }
    }
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_NEWS_FEED_URL.to_string(),
            poll_limit: 5,
        }
    }
}

impl ServerConfig {
    /// Defaults, then the YAML file (if present), then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let config_path = std::env::var("FARMBAZAAR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if config_path.exists() {
            log::info!("Loading configuration from {}", config_path.display());
            Self::from_file(&config_path)?
        } else {
            log::info!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = serde_yaml::from_str(config_str)?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = parse_value("PORT", port)?;
        }
        if let Some(origin) = lookup("CORS_ORIGIN") {
            self.cors_origin = Some(origin);
        }
        if let Some(path) = lookup("MODEL_PATH") {
            self.model.model_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("FEATURES_PATH") {
            self.model.features_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("UPLOAD_DIR") {
            self.uploads.dir = PathBuf::from(dir);
        }
        if let Some(max) = lookup("MAX_UPLOAD_BYTES") {
            self.uploads.max_bytes = parse_value("MAX_UPLOAD_BYTES", max)?;
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(endpoint) = lookup("GEMINI_ENDPOINT") {
            self.gemini.endpoint = endpoint;
        }
        if let Some(timeout) = lookup("GEMINI_TIMEOUT_SECS") {
            self.gemini.timeout_secs = parse_value("GEMINI_TIMEOUT_SECS", timeout)?;
        }
        if let Some(url) = lookup("NEWS_FEED_URL") {
            self.news.feed_url = url;
        }
        self.gemini.api_key = lookup("GEMINI_API_KEY").filter(|key| !key.trim().is_empty());
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}
