use sentra_core::config::{AppConfig, LoadOptions};
use sentra_db::connect_with_settings;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_environment_credentials(&config));
            checks.push(check_llm_readiness(&config));
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["environment_credentials", "llm_readiness", "database_connectivity"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Environment-default credentials are optional (named tenants carry their
/// own), so absence is a skip, not a failure.
fn check_environment_credentials(config: &AppConfig) -> DoctorCheck {
    let zscaler = &config.zscaler;
    let present = [
        ("client_id", zscaler.client_id.is_some()),
        ("client_secret", zscaler.client_secret.is_some()),
        ("vanity_domain", zscaler.vanity_domain.is_some()),
    ];

    let missing: Vec<&str> =
        present.iter().filter(|(_, set)| !set).map(|(name, _)| *name).collect();

    if missing.len() == present.len() {
        return DoctorCheck {
            name: "environment_credentials",
            status: CheckStatus::Skipped,
            details: "not configured; tool calls must name a tenant".to_string(),
        };
    }
    if !missing.is_empty() {
        return DoctorCheck {
            name: "environment_credentials",
            status: CheckStatus::Fail,
            details: format!("partially configured; missing {}", missing.join(", ")),
        };
    }
    DoctorCheck {
        name: "environment_credentials",
        status: CheckStatus::Pass,
        details: "environment-default credential set is complete".to_string(),
    }
}

fn check_llm_readiness(config: &AppConfig) -> DoctorCheck {
    if config.llm.api_key.is_none() && config.llm.base_url.contains("api.openai.com") {
        return DoctorCheck {
            name: "llm_readiness",
            status: CheckStatus::Fail,
            details: "SENTRA_LLM_API_KEY is unset and llm.base_url points at a hosted endpoint"
                .to_string(),
        };
    }
    DoctorCheck {
        name: "llm_readiness",
        status: CheckStatus::Pass,
        details: format!("chat endpoint `{}` model `{}`", config.llm.base_url, config.llm.model),
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match crate::commands::block_on_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
