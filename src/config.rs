//! Process configuration, read once from the environment at startup.
//!
//! The resulting [`Config`] is shared behind an `Arc` and passed to every
//! adapter and handler; nothing reads the environment after startup.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// Default OpenAI-compatible proxy root.
pub const DEFAULT_API_BASE: &str = "https://aiproxy.sanand.workers.dev/openai/v1";

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token for the remote model service. `None` makes every
    /// remote-dependent operation fail with a configuration error.
    pub api_token: Option<String>,

    /// Root URL of the OpenAI-compatible API (no trailing slash).
    pub api_base: String,

    /// Model used for tool selection and plain chat tasks.
    pub chat_model: String,

    /// Vision-capable model used for image extraction.
    pub vision_model: String,

    pub embedding_model: String,

    pub transcription_model: String,

    /// Listen address for the HTTP facade.
    pub host: String,
    pub port: u16,

    /// Origins allowed by the CORS layer.
    pub cors_origins: Vec<String>,

    /// Fixed directory searched by the markdown index operation.
    pub docs_dir: PathBuf,

    /// Fixed output path of the markdown index operation.
    pub docs_index_path: PathBuf,

    /// Timeout applied to website scraping (the only bounded remote call).
    pub scrape_timeout_secs: u64,

    /// Skip TLS certificate validation on outbound requests.
    pub accept_invalid_certs: bool,

    /// Enables `setup_and_run_datagen`, which downloads and executes a remote script.
    pub allow_remote_exec: bool,

    /// Directory the datagen script is downloaded to and run from.
    pub datagen_workdir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            transcription_model: "whisper-1".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost".to_string(),
                "http://127.0.0.1".to_string(),
            ],
            docs_dir: PathBuf::from("data/"),
            docs_index_path: PathBuf::from("data/index.json"),
            scrape_timeout_secs: 10,
            accept_invalid_certs: true,
            allow_remote_exec: false,
            datagen_workdir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let cors_origins = match get("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.cors_origins,
        };

        Ok(Self {
            api_token: get("AIPROXY_TOKEN"),
            api_base: get("AIPROXY_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            chat_model: get("CHAT_MODEL").unwrap_or(defaults.chat_model),
            vision_model: get("VISION_MODEL").unwrap_or(defaults.vision_model),
            embedding_model: get("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            transcription_model: get("TRANSCRIPTION_MODEL")
                .unwrap_or(defaults.transcription_model),
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", get("PORT"), defaults.port)?,
            cors_origins,
            docs_dir: get("DOCS_DIR").map(PathBuf::from).unwrap_or(defaults.docs_dir),
            docs_index_path: get("DOCS_INDEX_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.docs_index_path),
            scrape_timeout_secs: parse_var(
                "SCRAPE_TIMEOUT_SECS",
                get("SCRAPE_TIMEOUT_SECS"),
                defaults.scrape_timeout_secs,
            )?,
            accept_invalid_certs: parse_flag(
                "ACCEPT_INVALID_CERTS",
                get("ACCEPT_INVALID_CERTS"),
                defaults.accept_invalid_certs,
            )?,
            allow_remote_exec: parse_flag(
                "ALLOW_REMOTE_EXEC",
                get("ALLOW_REMOTE_EXEC"),
                defaults.allow_remote_exec,
            )?,
            datagen_workdir: get("DATAGEN_WORKDIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.datagen_workdir),
        })
    }

    /// Socket address string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => match value.parse() {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ConfigError::InvalidValue {
                name,
                reason: e.to_string(),
                value,
            }),
        },
    }
}

fn parse_flag(name: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = raw else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value,
            reason: "expected a boolean".to_string(),
        }),
    }
}
