use std::fs;

use serde::Serialize;
use taskpilot_core::config::{AppConfig, LoadOptions};
use taskpilot_knowledge::{open_store, VectorStore};

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

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
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
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and required credentials are present",
            ));
            checks.push(check_knowledge_source(&config));
            checks.push(check_vector_store(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.push(DoctorCheck::skipped("knowledge_source"));
            checks.push(DoctorCheck::skipped("vector_store_connectivity"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_knowledge_source(config: &AppConfig) -> DoctorCheck {
    let path = &config.knowledge.source_path;
    match fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => {
            DoctorCheck::fail("knowledge_source", format!("`{}` is empty", path.display()))
        }
        Ok(content) => DoctorCheck::pass(
            "knowledge_source",
            format!("`{}` readable ({} bytes)", path.display(), content.len()),
        ),
        Err(error) => DoctorCheck::fail(
            "knowledge_source",
            format!("cannot read `{}`: {error}", path.display()),
        ),
    }
}

fn check_vector_store(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck::fail(
                "vector_store_connectivity",
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let collection = config.knowledge.collection.clone();
    let result = runtime.block_on(async {
        let store = open_store(&config.knowledge)
            .await
            .map_err(|error| format!("failed to open vector store: {error}"))?;
        store
            .collection_exists(&collection)
            .await
            .map_err(|error| format!("vector store query failed: {error}"))
    });

    match result {
        Ok(indexed) => {
            let index_state = if indexed { "indexed" } else { "not yet indexed" };
            DoctorCheck::pass(
                "vector_store_connectivity",
                format!(
                    "connected using `{}`; collection `{collection}` {index_state}",
                    config.knowledge.store_url
                ),
            )
        }
        Err(error) => DoctorCheck::fail("vector_store_connectivity", error),
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
