use chrono::DateTime;
use readycheck_core::clock::minute_floor;
use readycheck_core::{parse_expression, AppConfig, LoadOptions, SessionClock};

use super::CommandResult;

/// Resolves an expression exactly the way the bot would, against the
/// configured defaults and timezone.
pub fn run(expression: &str, now_override: Option<&str>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult {
                exit_code: 2,
                output: format!("config validation failed: {error}"),
            };
        }
    };
    let offset = match config.session.utc_offset() {
        Ok(offset) => offset,
        Err(error) => {
            return CommandResult {
                exit_code: 2,
                output: format!("config validation failed: {error}"),
            };
        }
    };

    let now = match now_override {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(instant) => minute_floor(instant.with_timezone(&offset)),
            Err(error) => {
                return CommandResult {
                    exit_code: 2,
                    output: format!("--now must be an RFC 3339 timestamp: {error}"),
                };
            }
        },
        None => SessionClock::new(offset).now(),
    };

    match parse_expression(expression, now, config.session.default_duration()) {
        Ok(outcome) => CommandResult { exit_code: 0, output: outcome.window.to_string() },
        Err(failure) => CommandResult { exit_code: 1, output: failure.to_string() },
    }
}
