//! Configuration types.
//!
//! Everything comes from environment variables (a `.env` file is honored),
//! except the subject keyword list, which lives in a YAML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::attachments::SearchTerms;
use crate::channels::{EmailConfig, WhatsAppConfig};
use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

pub const DEFAULT_EMAIL_HOST: &str = "imap.gmail.com";
pub const DEFAULT_EMAIL_PORT: u16 = 993;
pub const DEFAULT_FETCH_LIMIT: usize = 10;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_KEYWORDS_FILE: &str = "config/keywords.yaml";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub email: EmailConfig,
    pub whatsapp: WhatsAppConfig,
    /// `None` when the selected backend has no API key.
    pub llm: Option<LlmConfig>,
    pub llm_backend: LlmBackend,
    pub poll_interval: Duration,
    pub http_port: u16,
    pub keywords_file: PathBuf,
    pub search_terms: SearchTerms,
}

impl AppConfig {
    /// Build config from the process environment, after loading `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.into()));

        let email = EmailConfig {
            host: get("EMAIL_HOST").unwrap_or_else(|| DEFAULT_EMAIL_HOST.to_string()),
            port: parse_or(get("EMAIL_PORT"), "EMAIL_PORT", DEFAULT_EMAIL_PORT)?,
            username: require("EMAIL_USER")?,
            password: SecretString::from(require("EMAIL_PASSWORD")?),
            fetch_limit: parse_or(get("EMAIL_FETCH_LIMIT"), "EMAIL_FETCH_LIMIT", DEFAULT_FETCH_LIMIT)?,
        };

        let whatsapp = WhatsAppConfig {
            account_sid: require("TWILIO_ACCOUNT_SID")?,
            auth_token: SecretString::from(require("TWILIO_AUTH_TOKEN")?),
            from_number: require("TWILIO_PHONE_NUMBER")?,
            to_number: require("MY_PHONE_NUMBER")?,
        };

        let llm_backend: LlmBackend = match get("LLM_BACKEND") {
            Some(name) => name.parse()?,
            None => LlmBackend::Gemini,
        };
        let llm = get(llm_backend.api_key_var()).map(|key| LlmConfig {
            backend: llm_backend,
            api_key: SecretString::from(key),
            model: get("LLM_MODEL").unwrap_or_else(|| llm_backend.default_model().to_string()),
        });

        let poll_secs: u64 = parse_or(
            get("POLL_INTERVAL_SECS"),
            "POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        if poll_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "POLL_INTERVAL_SECS".into(),
                message: "must be at least 1".into(),
            });
        }

        let search_terms = match get("SEARCH_TERMS") {
            Some(list) => SearchTerms::new(
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            ),
            None => SearchTerms::default(),
        };

        Ok(Self {
            email,
            whatsapp,
            llm,
            llm_backend,
            poll_interval: Duration::from_secs(poll_secs),
            http_port: parse_or(get("HTTP_PORT"), "HTTP_PORT", DEFAULT_HTTP_PORT)?,
            keywords_file: get("KEYWORDS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_KEYWORDS_FILE)),
            search_terms,
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.into(),
            message: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}

/// Everything startup needs before wiring the pipeline.
#[derive(Debug, Clone)]
pub struct Settings {
    pub app: AppConfig,
    pub keywords: Vec<String>,
}

impl Settings {
    /// Load the environment config, then the keyword file it names.
    pub fn load() -> crate::error::Result<Self> {
        let app = AppConfig::from_env()?;
        let keywords = load_keywords(&app.keywords_file)?;
        Ok(Self { app, keywords })
    }

    pub fn from_lookup<F>(lookup: F) -> crate::error::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app = AppConfig::from_lookup(lookup)?;
        let keywords = load_keywords(&app.keywords_file)?;
        Ok(Self { app, keywords })
    }
}

#[derive(Debug, Deserialize)]
struct KeywordsFile {
    #[serde(default)]
    keywords: Vec<String>,
}

/// Load subject keywords from a YAML file of the form `keywords: [...]`.
pub fn load_keywords(path: &Path) -> Result<Vec<String>, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    parse_keywords(&raw)
}

fn parse_keywords(raw: &str) -> Result<Vec<String>, ConfigError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let file: KeywordsFile =
        serde_yaml::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    Ok(file
        .keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect())
}
