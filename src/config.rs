use crate::error::AppError;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const SERVICE_NAME: &str = "equinix-billing";
pub const TOKEN_ENV: &str = "EQUINIX_TOKEN";
pub const BIGQUERY_TOKEN_ENV: &str = "BIGQUERY_ACCESS_TOKEN";
pub const HOME_ENV: &str = "EQUINIX_BILLING_HOME";

pub const DEFAULT_API_BASE_URL: &str = "https://api.equinix.com/metal/v1";
pub const DEFAULT_BIGQUERY_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

fn app_home_dir() -> Result<PathBuf, AppError> {
    if let Ok(custom) = std::env::var(HOME_ENV) {
        return Ok(PathBuf::from(custom));
    }

    if let Some(dirs) = ProjectDirs::from("io", "ipfs-shipyard", SERVICE_NAME) {
        return Ok(dirs.config_dir().to_path_buf());
    }

    let cwd = std::env::current_dir()?;
    Ok(cwd.join(".equinix-billing"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub bigquery_base_url: String,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            bigquery_base_url: DEFAULT_BIGQUERY_BASE_URL.into(),
            connect_timeout_secs: None,
            request_timeout_secs: None,
            log_level: "info".into(),
            log_format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

pub fn config_path() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join("config.toml"))
}

fn normalize_base_url(field: &str, raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| AppError::Config(format!("{field} {raw:?} is not a valid URL: {e}")))?;
    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(AppError::Config(format!(
            "{field} must use http or https, got {raw:?}"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_config(config: &mut AppConfig) -> Result<(), AppError> {
    config.api_base_url = normalize_base_url("api_base_url", &config.api_base_url)?;
    config.bigquery_base_url = normalize_base_url("bigquery_base_url", &config.bigquery_base_url)?;
    config.log_level = config.log_level.trim().to_ascii_lowercase();
    if config.log_level.is_empty() {
        config.log_level = "info".into();
    }
    Ok(())
}

pub fn parse_config(raw: &str) -> Result<AppConfig, AppError> {
    let mut parsed: AppConfig = toml::from_str(raw)?;
    normalize_config(&mut parsed)?;
    Ok(parsed)
}

pub fn load_config() -> Result<AppConfig, AppError> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(&path)?;
    parse_config(&raw)
}

fn read_token(env_name: &str) -> Result<String, AppError> {
    match std::env::var(env_name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(AppError::Config(format!(
            "Please set the {env_name} environment variable"
        ))),
    }
}

pub fn get_api_token() -> Result<String, AppError> {
    read_token(TOKEN_ENV)
}

pub fn get_bigquery_token() -> Result<String, AppError> {
    read_token(BIGQUERY_TOKEN_ENV)
}
