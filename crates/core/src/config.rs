use std::env;
use std::fs;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

/// Effective runtime configuration, resolved with env > file > default
/// precedence. Secrets are wrapped in [`SecretString`] so they cannot leak
/// through `Debug` output or log lines.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub zscaler: ZscalerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Chat-completion endpoint settings (OpenAI-compatible wire format).
#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Environment-level default Zscaler credentials, used only when a tool call
/// supplies no tenant name. A named tenant never falls back here.
#[derive(Clone, Debug, Default)]
pub struct ZscalerConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub vanity_domain: Option<String>,
    pub customer_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://sentra.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 60,
            },
            zscaler: ZscalerConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

/// Partial file representation; every field optional so the file can set
/// only what it needs and defaults cover the rest.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    database: FileDatabase,
    #[serde(default)]
    llm: FileLlm,
    #[serde(default)]
    zscaler: FileZscaler,
    #[serde(default)]
    logging: FileLogging,
}

#[derive(Debug, Default, Deserialize)]
struct FileDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLlm {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct FileZscaler {
    client_id: Option<String>,
    client_secret: Option<String>,
    vanity_domain: Option<String>,
    customer_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let file = load_file(&options)?;
        resolve(file, &|key| env::var(key).ok())
    }
}

fn load_file(options: &LoadOptions) -> Result<Option<FileConfig>, ConfigError> {
    let path = options
        .config_path
        .clone()
        .or_else(|| env::var("SENTRA_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("sentra.toml"));

    if !path.exists() {
        if options.require_file {
            return Err(ConfigError::MissingConfigFile(path));
        }
        return Ok(None);
    }

    let raw = fs::read_to_string(&path)
        .map_err(|source| ConfigError::ReadFile { path: path.clone(), source })?;
    let parsed =
        toml::from_str(&raw).map_err(|source| ConfigError::ParseFile { path, source })?;
    Ok(Some(parsed))
}

/// Merge defaults, file values, and environment overrides. Split out from
/// [`AppConfig::load`] so tests can inject an environment lookup.
pub fn resolve(
    file: Option<FileConfig>,
    env_lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::default();
    let file = file.unwrap_or_default();

    if let Some(url) = file.database.url {
        config.database.url = url;
    }
    if let Some(max) = file.database.max_connections {
        config.database.max_connections = max;
    }
    if let Some(secs) = file.database.timeout_secs {
        config.database.timeout_secs = secs;
    }
    if let Some(key) = file.llm.api_key {
        config.llm.api_key = Some(key.into());
    }
    if let Some(base) = file.llm.base_url {
        config.llm.base_url = base;
    }
    if let Some(model) = file.llm.model {
        config.llm.model = model;
    }
    if let Some(secs) = file.llm.timeout_secs {
        config.llm.timeout_secs = secs;
    }
    config.zscaler.client_id = file.zscaler.client_id;
    config.zscaler.client_secret = file.zscaler.client_secret.map(Into::into);
    config.zscaler.vanity_domain = file.zscaler.vanity_domain;
    config.zscaler.customer_id = file.zscaler.customer_id;
    if let Some(level) = file.logging.level {
        config.logging.level = level;
    }
    if let Some(format) = file.logging.format {
        config.logging.format = format;
    }

    if let Some(url) = env_lookup("SENTRA_DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(raw) = env_lookup("SENTRA_DATABASE_MAX_CONNECTIONS") {
        config.database.max_connections = parse_env("SENTRA_DATABASE_MAX_CONNECTIONS", &raw)?;
    }
    if let Some(raw) = env_lookup("SENTRA_DATABASE_TIMEOUT_SECS") {
        config.database.timeout_secs = parse_env("SENTRA_DATABASE_TIMEOUT_SECS", &raw)?;
    }
    if let Some(key) = env_lookup("SENTRA_LLM_API_KEY") {
        config.llm.api_key = Some(key.into());
    }
    if let Some(base) = env_lookup("SENTRA_LLM_BASE_URL") {
        config.llm.base_url = base;
    }
    if let Some(model) = env_lookup("SENTRA_LLM_MODEL") {
        config.llm.model = model;
    }
    if let Some(raw) = env_lookup("SENTRA_LLM_TIMEOUT_SECS") {
        config.llm.timeout_secs = parse_env("SENTRA_LLM_TIMEOUT_SECS", &raw)?;
    }
    if let Some(id) = env_lookup("SENTRA_ZSCALER_CLIENT_ID") {
        config.zscaler.client_id = Some(id);
    }
    if let Some(secret) = env_lookup("SENTRA_ZSCALER_CLIENT_SECRET") {
        config.zscaler.client_secret = Some(secret.into());
    }
    if let Some(domain) = env_lookup("SENTRA_ZSCALER_VANITY_DOMAIN") {
        config.zscaler.vanity_domain = Some(domain);
    }
    if let Some(customer) = env_lookup("SENTRA_ZSCALER_CUSTOMER_ID") {
        config.zscaler.customer_id = Some(customer);
    }
    if let Some(level) = env_lookup("SENTRA_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(raw) = env_lookup("SENTRA_LOG_FORMAT") {
        config.logging.format = match raw.as_str() {
            "compact" => LogFormat::Compact,
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            _ => {
                return Err(ConfigError::InvalidEnvOverride {
                    key: "SENTRA_LOG_FORMAT".to_string(),
                    value: raw,
                })
            }
        };
    }

    validate(&config)?;
    Ok(config)
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    if config.database.url.is_empty() {
        return Err(ConfigError::Validation("database.url must not be empty".into()));
    }
    if config.database.max_connections == 0 {
        return Err(ConfigError::Validation("database.max_connections must be at least 1".into()));
    }
    if config.llm.base_url.is_empty() || config.llm.model.is_empty() {
        return Err(ConfigError::Validation(
            "llm.base_url and llm.model must not be empty".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{resolve, ConfigError, FileConfig, LogFormat};

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let config = resolve(None, &|_| None).unwrap();
        assert_eq!(config.database.url, "sqlite://sentra.db");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.zscaler.client_id.is_none());
    }

    #[test]
    fn file_overrides_defaults() {
        let file: FileConfig = toml::from_str(
            r#"
            [database]
            url = "sqlite:///tmp/other.db"
            [llm]
            model = "gpt-4.1"
            [zscaler]
            client_id = "env-client"
            "#,
        )
        .unwrap();
        let config = resolve(Some(file), &|_| None).unwrap();
        assert_eq!(config.database.url, "sqlite:///tmp/other.db");
        assert_eq!(config.llm.model, "gpt-4.1");
        assert_eq!(config.zscaler.client_id.as_deref(), Some("env-client"));
    }

    #[test]
    fn env_wins_over_file() {
        let file: FileConfig = toml::from_str("[llm]\nmodel = \"from-file\"\n").unwrap();
        let env = env_of(&[("SENTRA_LLM_MODEL", "from-env")]);
        let config = resolve(Some(file), &|key| env.get(key).cloned()).unwrap();
        assert_eq!(config.llm.model, "from-env");
    }

    #[test]
    fn invalid_numeric_override_is_rejected() {
        let env = env_of(&[("SENTRA_DATABASE_MAX_CONNECTIONS", "lots")]);
        let error = resolve(None, &|key| env.get(key).cloned()).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidEnvOverride { .. }));
    }

    #[test]
    fn zero_connections_fails_validation() {
        let env = env_of(&[("SENTRA_DATABASE_MAX_CONNECTIONS", "0")]);
        let error = resolve(None, &|key| env.get(key).cloned()).unwrap_err();
        assert!(matches!(error, ConfigError::Validation(_)));
    }
}
