use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use sentra_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", "SENTRA_DATABASE_URL"),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", "SENTRA_DATABASE_MAX_CONNECTIONS"),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", "SENTRA_DATABASE_TIMEOUT_SECS"),
    ));

    lines.push(render_line(
        "llm.base_url",
        &config.llm.base_url,
        source("llm.base_url", "SENTRA_LLM_BASE_URL"),
    ));
    lines.push(render_line("llm.model", &config.llm.model, source("llm.model", "SENTRA_LLM_MODEL")));
    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line("llm.api_key", llm_api_key, source("llm.api_key", "SENTRA_LLM_API_KEY")));
    lines.push(render_line(
        "llm.timeout_secs",
        &config.llm.timeout_secs.to_string(),
        source("llm.timeout_secs", "SENTRA_LLM_TIMEOUT_SECS"),
    ));

    lines.push(render_line(
        "zscaler.client_id",
        config.zscaler.client_id.as_deref().unwrap_or("<unset>"),
        source("zscaler.client_id", "SENTRA_ZSCALER_CLIENT_ID"),
    ));
    let zscaler_secret = if config.zscaler.client_secret.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "zscaler.client_secret",
        zscaler_secret,
        source("zscaler.client_secret", "SENTRA_ZSCALER_CLIENT_SECRET"),
    ));
    lines.push(render_line(
        "zscaler.vanity_domain",
        config.zscaler.vanity_domain.as_deref().unwrap_or("<unset>"),
        source("zscaler.vanity_domain", "SENTRA_ZSCALER_VANITY_DOMAIN"),
    ));
    lines.push(render_line(
        "zscaler.customer_id",
        config.zscaler.customer_id.as_deref().unwrap_or("<unset>"),
        source("zscaler.customer_id", "SENTRA_ZSCALER_CUSTOMER_ID"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "SENTRA_LOG_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "SENTRA_LOG_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    if let Some(explicit) = env::var_os("SENTRA_CONFIG") {
        let path = PathBuf::from(explicit);
        return path.exists().then_some(path);
    }

    let root = PathBuf::from("sentra.toml");
    root.exists().then_some(root)
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
