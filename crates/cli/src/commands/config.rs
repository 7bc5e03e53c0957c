use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use readycheck_core::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;
use toml::Value;

use super::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run(format: OutputFormat, check: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult {
                exit_code: 2,
                output: format!("config validation failed: {error}"),
            };
        }
    };

    if check {
        return CommandResult { exit_code: 0, output: "config ok".to_string() };
    }

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let doc = config_file_doc.as_ref();
    let path = config_file_path.as_deref();

    let entries = vec![
        entry(
            "chat.bot_token",
            redact_token(config.chat.bot_token.expose_secret()),
            "READYCHECK_BOT_TOKEN",
            doc,
            path,
        ),
        entry(
            "chat.channel",
            config.chat.channel.as_deref().unwrap_or("<unset>").to_string(),
            "READYCHECK_CHANNEL",
            doc,
            path,
        ),
        entry(
            "chat.command_prefix",
            config.chat.command_prefix.clone(),
            "READYCHECK_COMMAND_PREFIX",
            doc,
            path,
        ),
        entry(
            "session.players_needed",
            config.session.players_needed.to_string(),
            "READYCHECK_PLAYERS_NEEDED",
            doc,
            path,
        ),
        entry(
            "session.default_duration_minutes",
            config.session.default_duration_minutes.to_string(),
            "READYCHECK_DEFAULT_DURATION_MINUTES",
            doc,
            path,
        ),
        entry(
            "session.vote_window_minutes",
            config.session.vote_window_minutes.to_string(),
            "READYCHECK_VOTE_WINDOW_MINUTES",
            doc,
            path,
        ),
        entry(
            "session.utc_offset_minutes",
            config.session.utc_offset_minutes.to_string(),
            "READYCHECK_UTC_OFFSET_MINUTES",
            doc,
            path,
        ),
        entry("logging.level", config.logging.level.clone(), "READYCHECK_LOG_LEVEL", doc, path),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            "READYCHECK_LOG_FORMAT",
            doc,
            path,
        ),
    ];

    let output = match format {
        OutputFormat::Text => render_text(&entries),
        OutputFormat::Json => render_json(&entries),
    };
    CommandResult { exit_code: 0, output }
}

fn entry(
    key: &'static str,
    value: String,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> ConfigEntry {
    ConfigEntry { key, value, source: field_source(key, env_key, config_file_doc, config_file_path) }
}

fn render_text(entries: &[ConfigEntry]) -> String {
    std::iter::once("effective configuration (env beats file beats default):".to_owned())
        .chain(entries.iter().map(|entry| {
            format!("- {} = {} (source: {})", entry.key, entry.value, entry.source)
        }))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_json(entries: &[ConfigEntry]) -> String {
    serde_json::to_string_pretty(entries)
        .unwrap_or_else(|error| format!("config serialization failed: {error}"))
}

fn detect_config_path() -> Option<PathBuf> {
    ["readycheck.toml", "config/readycheck.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    fs::read_to_string(path?).ok()?.parse::<Value>().ok()
}

/// Attributes a value to the layer that set it, mirroring load order.
fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }
    match (config_file_doc, config_file_path) {
        (Some(doc), Some(file_path)) if contains_path(doc, key_path) => {
            format!("file ({})", file_path.display())
        }
        _ => "default".to_owned(),
    }
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |table, key| table.get(key)).is_some()
}

/// Keeps only the token's vendor prefix, enough to tell which kind of
/// credential is configured without reprinting it.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    match trimmed.split_once('-') {
        _ if trimmed.is_empty() => "<empty>".to_owned(),
        Some((prefix, _)) => format!("{prefix}-***"),
        None => "<redacted>".to_owned(),
    }
}
