use std::env;
use std::sync::{Mutex, OnceLock};

use sentra_cli::commands::{doctor, migrate, tenant};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("SENTRA_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn tenant_upsert_then_list_round_trips_with_redaction() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}/tenants.db", dir.path().display());

    with_env(&[("SENTRA_DATABASE_URL", &url)], || {
        let result = tenant::upsert(tenant::UpsertArgs {
            name: "Acme".to_string(),
            client_id: Some("id-123".to_string()),
            client_secret: Some("super-secret".to_string()),
            vanity_domain: Some("acme".to_string()),
            customer_id: None,
            test_tenant: false,
        });
        assert_eq!(result.exit_code, 0, "expected successful upsert: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "ok");
        assert!(payload["message"].as_str().unwrap_or("").contains("complete"));

        let listed = tenant::list();
        assert_eq!(listed.exit_code, 0);
        let payload = parse_payload(&listed.output);
        let message = payload["message"].as_str().expect("list message");
        assert!(message.contains("Acme"));
        assert!(message.contains("[redacted]"));
        assert!(!message.contains("super-secret"));
    });
}

#[test]
fn tenant_remove_unknown_name_fails_cleanly() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}/tenants.db", dir.path().display());

    with_env(&[("SENTRA_DATABASE_URL", &url)], || {
        let result = tenant::remove("ghost");
        assert_eq!(result.exit_code, 6, "expected not-found exit code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "not_found");
    });
}

#[test]
fn doctor_passes_with_local_endpoint_and_reachable_db() {
    with_env(
        &[
            ("SENTRA_DATABASE_URL", "sqlite::memory:"),
            ("SENTRA_LLM_BASE_URL", "http://localhost:11434/v1"),
        ],
        || {
            let output = doctor::run(true);
            let payload: Value = serde_json::from_str(&output).expect("doctor json");
            assert_eq!(payload["overall_status"], "pass", "report: {output}");

            let checks = payload["checks"].as_array().expect("checks array");
            let env_check = checks
                .iter()
                .find(|check| check["name"] == "environment_credentials")
                .expect("environment credential check present");
            assert_eq!(env_check["status"], "skipped");
        },
    );
}

#[test]
fn doctor_fails_when_database_is_unreachable() {
    with_env(
        &[
            ("SENTRA_DATABASE_URL", "sqlite:///nonexistent-dir/sentra.db"),
            ("SENTRA_LLM_BASE_URL", "http://localhost:11434/v1"),
        ],
        || {
            let output = doctor::run(true);
            let payload: Value = serde_json::from_str(&output).expect("doctor json");
            assert_eq!(payload["overall_status"], "fail");
        },
    );
}

#[test]
fn doctor_flags_partial_environment_credentials() {
    with_env(
        &[
            ("SENTRA_DATABASE_URL", "sqlite::memory:"),
            ("SENTRA_LLM_BASE_URL", "http://localhost:11434/v1"),
            ("SENTRA_ZSCALER_CLIENT_ID", "id-only"),
        ],
        || {
            let output = doctor::run(true);
            let payload: Value = serde_json::from_str(&output).expect("doctor json");
            assert_eq!(payload["overall_status"], "fail");

            let checks = payload["checks"].as_array().expect("checks array");
            let env_check = checks
                .iter()
                .find(|check| check["name"] == "environment_credentials")
                .expect("environment credential check present");
            assert_eq!(env_check["status"], "fail");
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SENTRA_CONFIG",
        "SENTRA_DATABASE_URL",
        "SENTRA_DATABASE_MAX_CONNECTIONS",
        "SENTRA_DATABASE_TIMEOUT_SECS",
        "SENTRA_LLM_API_KEY",
        "SENTRA_LLM_BASE_URL",
        "SENTRA_LLM_MODEL",
        "SENTRA_LLM_TIMEOUT_SECS",
        "SENTRA_ZSCALER_CLIENT_ID",
        "SENTRA_ZSCALER_CLIENT_SECRET",
        "SENTRA_ZSCALER_VANITY_DOMAIN",
        "SENTRA_ZSCALER_CUSTOMER_ID",
        "SENTRA_LOG_LEVEL",
        "SENTRA_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
