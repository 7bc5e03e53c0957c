use std::path::Path;

use readycheck_core::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;

use super::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Verdict {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct Probe {
    name: &'static str,
    status: Verdict,
    details: String,
}

impl Probe {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: Verdict::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: Verdict::Fail, details: details.into() }
    }

    fn skip(name: &'static str) -> Self {
        Self {
            name,
            status: Verdict::Skipped,
            details: "skipped because configuration did not load".to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Readiness {
    overall_status: Verdict,
    summary: String,
    checks: Vec<Probe>,
}

/// Reports readiness without gating on it: the exit code stays zero either
/// way, the report says what is broken.
pub fn run(json_output: bool) -> CommandResult {
    let report = diagnose();

    let output = if json_output {
        serde_json::to_string_pretty(&report)
            .unwrap_or_else(|error| format!("doctor serialization failed: {error}"))
    } else {
        render_text(&report)
    };
    CommandResult { exit_code: 0, output }
}

fn diagnose() -> Readiness {
    let mut checks = vec![probe_config_file()];

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(Probe::pass("config_validation", "configuration loaded and validated"));
            checks.push(probe_token(&config));
            checks.push(probe_offset(&config));
        }
        Err(load_failure) => {
            checks.push(Probe::fail("config_validation", load_failure.to_string()));
            checks.push(Probe::skip("token_readiness"));
            checks.push(Probe::skip("offset_sanity"));
        }
    }

    let healthy = checks.iter().all(|probe| probe.status == Verdict::Pass);
    Readiness {
        overall_status: if healthy { Verdict::Pass } else { Verdict::Fail },
        summary: if healthy {
            "doctor: ready to run".to_owned()
        } else {
            "doctor: not ready, see the checks below".to_owned()
        },
        checks,
    }
}

fn probe_config_file() -> Probe {
    let found = ["readycheck.toml", "config/readycheck.toml"]
        .into_iter()
        .find(|candidate| Path::new(candidate).exists());
    match found {
        Some(candidate) => Probe::pass("config_file", format!("found {candidate}")),
        None => Probe::fail("config_file", "no readycheck.toml or config/readycheck.toml found"),
    }
}

fn probe_token(config: &AppConfig) -> Probe {
    if config.chat.bot_token.expose_secret().trim().is_empty() {
        Probe::fail("token_readiness", "chat.bot_token is empty")
    } else {
        Probe::pass("token_readiness", "chat.bot_token is set")
    }
}

fn probe_offset(config: &AppConfig) -> Probe {
    match config.session.utc_offset() {
        Ok(offset) => Probe::pass("offset_sanity", format!("sessions run in {offset}")),
        Err(offset_failure) => Probe::fail("offset_sanity", offset_failure.to_string()),
    }
}

fn render_text(report: &Readiness) -> String {
    let mut lines = vec![report.summary.clone()];
    for probe in &report.checks {
        let marker = match probe.status {
            Verdict::Pass => "ok",
            Verdict::Fail => "fail",
            Verdict::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", probe.name, probe.details));
    }
    lines.join("\n")
}
