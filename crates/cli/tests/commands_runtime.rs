use std::env;
use std::sync::{Mutex, OnceLock};

use readycheck_cli::commands::config::{self, OutputFormat};
use readycheck_cli::commands::{doctor, parse};
use serde_json::Value;

#[test]
fn parse_resolves_a_range_against_a_fixed_instant() {
    with_env(&[], || {
        let result = parse::run("5-10", Some("2026-06-05T12:00:00+00:00"));
        assert_eq!(result.exit_code, 0, "expected the range to resolve");
        assert_eq!(result.output, "available from 06/05 17:00 to 06/05 22:00");
    });
}

#[test]
fn parse_applies_the_default_start_for_until() {
    with_env(&[], || {
        let result = parse::run("until 10", Some("2026-06-05T12:00:00+00:00"));
        assert_eq!(result.exit_code, 0, "expected the end-only form to resolve");
        assert_eq!(result.output, "available from 06/05 12:00 to 06/05 22:00");
    });
}

#[test]
fn parse_reports_failures_in_the_bot_voice() {
    with_env(&[], || {
        let result = parse::run("wat", None);
        assert_eq!(result.exit_code, 1, "expected a parse failure code");
        assert_eq!(result.output, "no idea what 'wat' means");
    });
}

#[test]
fn parse_rejects_a_malformed_now() {
    with_env(&[], || {
        let result = parse::run("5-10", Some("yesterday"));
        assert_eq!(result.exit_code, 2, "expected a usage failure code");
        assert!(result.output.contains("RFC 3339"));
    });
}

#[test]
fn config_show_attributes_sources() {
    with_env(&[("READYCHECK_BOT_TOKEN", "xbot-test")], || {
        let result = config::run(OutputFormat::Text, false);
        assert_eq!(result.exit_code, 0, "expected config show to succeed");
        assert!(result
            .output
            .contains("- chat.bot_token = xbot-*** (source: env (READYCHECK_BOT_TOKEN))"));
        assert!(result.output.contains("- session.players_needed = 5 (source: default)"));
        assert!(result.output.contains("- chat.command_prefix = ! (source: default)"));
    });
}

#[test]
fn config_show_emits_parseable_json() {
    with_env(&[("READYCHECK_BOT_TOKEN", "xbot-test")], || {
        let result = config::run(OutputFormat::Json, false);
        assert_eq!(result.exit_code, 0, "expected config show to succeed");

        let payload: Value =
            serde_json::from_str(&result.output).expect("command output should be valid JSON");
        let entries = payload.as_array().expect("entries array");
        let token = entries
            .iter()
            .find(|entry| entry["key"] == "chat.bot_token")
            .expect("token entry present");
        assert_eq!(token["value"], "xbot-***");
        assert_eq!(token["source"], "env (READYCHECK_BOT_TOKEN)");
    });
}

#[test]
fn config_check_validates_quietly() {
    with_env(&[], || {
        let result = config::run(OutputFormat::Text, true);
        assert_eq!(result.exit_code, 0, "expected defaults to validate");
        assert_eq!(result.output, "config ok");
    });

    with_env(&[("READYCHECK_PLAYERS_NEEDED", "0")], || {
        let result = config::run(OutputFormat::Text, true);
        assert_eq!(result.exit_code, 2, "expected a broken config to fail the check");
        assert!(result.output.contains("players_needed"));
    });
}

#[test]
fn doctor_reports_check_results() {
    with_env(&[("READYCHECK_BOT_TOKEN", "xbot-test")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "doctor reports, it does not gate");

        let payload: Value =
            serde_json::from_str(&result.output).expect("doctor output should be valid JSON");
        let checks = payload["checks"].as_array().expect("checks array");
        let status_of = |name: &str| {
            checks
                .iter()
                .find(|check| check["name"] == name)
                .unwrap_or_else(|| panic!("missing check {name}"))["status"]
                .clone()
        };
        assert_eq!(status_of("config_validation"), "pass");
        assert_eq!(status_of("token_readiness"), "pass");
        assert_eq!(status_of("offset_sanity"), "pass");
        assert_eq!(status_of("config_file"), "fail");
        assert_eq!(payload["overall_status"], "fail");
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_is_broken() {
    with_env(&[("READYCHECK_PLAYERS_NEEDED", "0")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 0, "doctor reports, it does not gate");
        assert!(result.output.contains("- [fail] config_validation"));
        assert!(result.output.contains("- [skip] token_readiness"));
        assert!(result.output.contains("- [skip] offset_sanity"));
    });
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "READYCHECK_BOT_TOKEN",
        "READYCHECK_CHANNEL",
        "READYCHECK_COMMAND_PREFIX",
        "READYCHECK_PLAYERS_NEEDED",
        "READYCHECK_DEFAULT_DURATION_MINUTES",
        "READYCHECK_VOTE_WINDOW_MINUTES",
        "READYCHECK_UTC_OFFSET_MINUTES",
        "READYCHECK_LOG_LEVEL",
        "READYCHECK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, previous) in previous_values {
        match previous {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
