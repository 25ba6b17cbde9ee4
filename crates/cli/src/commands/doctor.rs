use devisio_core::config::{AppConfig, EmailDriver, LoadOptions};
use devisio_db::{connect_with_settings, migrations};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
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
            checks.extend(database_checks(&config));
            checks.push(check_wkhtmltopdf(&config));
            checks.push(check_email_transport(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in
                ["database_connectivity", "schema_migrations", "wkhtmltopdf", "email_transport"]
            {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let overall_status = if checks
        .iter()
        .any(|check| matches!(check.status, CheckStatus::Fail | CheckStatus::Skipped))
    {
        CheckStatus::Fail
    } else if checks.iter().any(|check| check.status == CheckStatus::Warn) {
        CheckStatus::Warn
    } else {
        CheckStatus::Pass
    };
    let summary = match overall_status {
        CheckStatus::Pass => "doctor: all readiness checks passed",
        CheckStatus::Warn => "doctor: readiness checks passed with warnings",
        _ => "doctor: one or more readiness checks failed",
    }
    .to_string();

    DoctorReport { overall_status, summary, checks }
}

/// Connects once and reports both connectivity and schema currency.
fn database_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Fail,
                    details: format!("failed to initialize async runtime: {error}"),
                },
                DoctorCheck {
                    name: "schema_migrations",
                    status: CheckStatus::Skipped,
                    details: "skipped because the database was not reachable".to_string(),
                },
            ];
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

        let status = migrations::status(&pool).await;
        pool.close().await;
        Ok::<_, String>(status)
    });

    match result {
        Ok(status) => {
            let connectivity = DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Pass,
                details: format!("connected using `{}`", config.database.url),
            };
            vec![connectivity, schema_check(status)]
        }
        Err(error) => vec![
            DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: error,
            },
            DoctorCheck {
                name: "schema_migrations",
                status: CheckStatus::Skipped,
                details: "skipped because the database was not reachable".to_string(),
            },
        ],
    }
}

fn schema_check<E>(status: Result<migrations::MigrationStatus, E>) -> DoctorCheck {
    match status {
        Ok(status) if status.pending == 0 => DoctorCheck {
            name: "schema_migrations",
            status: CheckStatus::Pass,
            details: format!("schema is current ({} migrations applied)", status.applied),
        },
        Ok(status) => DoctorCheck {
            name: "schema_migrations",
            status: CheckStatus::Fail,
            details: format!("{} pending migrations: run `devisio migrate`", status.pending),
        },
        Err(_) => DoctorCheck {
            name: "schema_migrations",
            status: CheckStatus::Fail,
            details: "migrations table not found: run `devisio migrate`".to_string(),
        },
    }
}

fn check_wkhtmltopdf(config: &AppConfig) -> DoctorCheck {
    match &config.documents.wkhtmltopdf_path {
        Some(path) if path.exists() => DoctorCheck {
            name: "wkhtmltopdf",
            status: CheckStatus::Pass,
            details: format!("using configured converter at {}", path.display()),
        },
        Some(path) => DoctorCheck {
            name: "wkhtmltopdf",
            status: CheckStatus::Warn,
            details: format!(
                "configured converter {} does not exist, documents will fall back to HTML",
                path.display()
            ),
        },
        None => match which::which("wkhtmltopdf") {
            Ok(path) => DoctorCheck {
                name: "wkhtmltopdf",
                status: CheckStatus::Pass,
                details: format!("found wkhtmltopdf on PATH at {}", path.display()),
            },
            Err(_) => DoctorCheck {
                name: "wkhtmltopdf",
                status: CheckStatus::Warn,
                details: "wkhtmltopdf not found on PATH, documents will fall back to HTML"
                    .to_string(),
            },
        },
    }
}

fn check_email_transport(config: &AppConfig) -> DoctorCheck {
    match config.email.driver {
        EmailDriver::Log => DoctorCheck {
            name: "email_transport",
            status: CheckStatus::Pass,
            details: "log driver configured, emails will be written to the application log"
                .to_string(),
        },
        EmailDriver::Smtp => {
            let endpoint = format!("{}:{}", config.email.smtp_host, config.email.smtp_port);
            if config.email.smtp_username.is_some() && config.email.smtp_password.is_some() {
                DoctorCheck {
                    name: "email_transport",
                    status: CheckStatus::Pass,
                    details: format!("smtp transport configured for {endpoint}"),
                }
            } else {
                DoctorCheck {
                    name: "email_transport",
                    status: CheckStatus::Warn,
                    details: format!(
                        "smtp transport for {endpoint} has no credentials, the relay must accept anonymous mail"
                    ),
                }
            }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
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
