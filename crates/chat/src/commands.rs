//! Command grammar and routing. Commands arrive as ordinary messages with
//! a configurable prefix, and verbs may be abbreviated to any unambiguous
//! prefix: `!a 6-12`, `!un`, `!st`.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::render;

/// A message as the transport hands it over: where it was said, who said
/// it, and the exact text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessageEvent {
    pub channel_id: String,
    pub sender_id: String,
    pub sender_handle: String,
    pub text: String,
    pub message_ts: String,
}

/// Everything the group can ask for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    Available { expression: String },
    Unavailable,
    Count { requested: Option<u32> },
    Status,
    Setup,
    Debug,
    Nodebug,
    Help,
}

const COMMAND_NAMES: [&str; 8] =
    ["available", "unavailable", "count", "status", "setup", "debug", "nodebug", "help"];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unknown command {verb:?}")]
    UnknownCommand { verb: String },

    #[error("ambiguous command {verb:?}")]
    AmbiguousCommand { verb: String, candidates: Vec<&'static str> },

    #[error("invalid player count {value:?}")]
    InvalidCount { value: String },
}

impl CommandParseError {
    /// The reply the sender sees. Matches the bot's long-standing voice.
    pub fn chat_line(&self) -> String {
        match self {
            Self::UnknownCommand { .. } => "huh? what does that mean?".to_owned(),
            Self::AmbiguousCommand { candidates, .. } => {
                format!("Ambiguous command: {}", candidates.join(", "))
            }
            Self::InvalidCount { value } => format!("couldn't make a number out of '{value}'"),
        }
    }
}

/// `None` when the message is not addressed to the bot at all.
pub fn parse_command(text: &str, prefix: &str) -> Option<Result<SessionCommand, CommandParseError>> {
    let stripped = text.trim().strip_prefix(prefix)?;
    let mut words = stripped.trim().split_whitespace();
    let verb = words.next()?.to_lowercase();
    let args = words.collect::<Vec<_>>().join(" ");
    Some(resolve_verb(&verb).and_then(|name| build_command(name, &args)))
}

fn resolve_verb(verb: &str) -> Result<&'static str, CommandParseError> {
    let candidates: Vec<&'static str> =
        COMMAND_NAMES.into_iter().filter(|name| name.starts_with(verb)).collect();
    match candidates.as_slice() {
        [] => Err(CommandParseError::UnknownCommand { verb: verb.to_owned() }),
        [name] => Ok(name),
        _ => Err(CommandParseError::AmbiguousCommand { verb: verb.to_owned(), candidates }),
    }
}

fn build_command(name: &'static str, args: &str) -> Result<SessionCommand, CommandParseError> {
    match name {
        "available" => Ok(SessionCommand::Available { expression: args.to_owned() }),
        "unavailable" => Ok(SessionCommand::Unavailable),
        "count" => {
            if args.is_empty() {
                Ok(SessionCommand::Count { requested: None })
            } else {
                args.parse()
                    .map(|requested| SessionCommand::Count { requested: Some(requested) })
                    .map_err(|_| CommandParseError::InvalidCount { value: args.to_owned() })
            }
        }
        "status" => Ok(SessionCommand::Status),
        "setup" => Ok(SessionCommand::Setup),
        "debug" => Ok(SessionCommand::Debug),
        "nodebug" => Ok(SessionCommand::Nodebug),
        "help" => Ok(SessionCommand::Help),
        // a verb in COMMAND_NAMES without an arm here is a wiring bug
        other => Err(CommandParseError::UnknownCommand { verb: other.to_owned() }),
    }
}

/// What goes back to the channel after a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandReply {
    Text(String),
    React(&'static str),
    Silent,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command handling failed: {0}")]
    Service(String),
}

/// Handlers the router dispatches into. Domain failures come back as
/// friendly [`CommandReply`]s; `Err` is for real breakage only.
#[async_trait]
pub trait SessionCommandService: Send + Sync {
    async fn submit_availability(
        &self,
        message: &ChatMessageEvent,
        expression: &str,
    ) -> Result<CommandReply, CommandRouteError>;

    async fn withdraw_availability(
        &self,
        message: &ChatMessageEvent,
    ) -> Result<CommandReply, CommandRouteError>;

    async fn quorum_size(
        &self,
        message: &ChatMessageEvent,
        requested: Option<u32>,
    ) -> Result<CommandReply, CommandRouteError>;

    async fn status(&self, message: &ChatMessageEvent) -> Result<CommandReply, CommandRouteError>;

    async fn bind_channel(
        &self,
        message: &ChatMessageEvent,
    ) -> Result<CommandReply, CommandRouteError>;

    async fn set_debug(
        &self,
        message: &ChatMessageEvent,
        enabled: bool,
    ) -> Result<CommandReply, CommandRouteError>;
}

/// Placeholder service that acknowledges nothing. Useful for wiring and
/// tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSessionCommandService;

#[async_trait]
impl SessionCommandService for NoopSessionCommandService {
    async fn submit_availability(
        &self,
        _message: &ChatMessageEvent,
        _expression: &str,
    ) -> Result<CommandReply, CommandRouteError> {
        Ok(CommandReply::Silent)
    }

    async fn withdraw_availability(
        &self,
        _message: &ChatMessageEvent,
    ) -> Result<CommandReply, CommandRouteError> {
        Ok(CommandReply::Silent)
    }

    async fn quorum_size(
        &self,
        _message: &ChatMessageEvent,
        _requested: Option<u32>,
    ) -> Result<CommandReply, CommandRouteError> {
        Ok(CommandReply::Silent)
    }

    async fn status(&self, _message: &ChatMessageEvent) -> Result<CommandReply, CommandRouteError> {
        Ok(CommandReply::Silent)
    }

    async fn bind_channel(
        &self,
        _message: &ChatMessageEvent,
    ) -> Result<CommandReply, CommandRouteError> {
        Ok(CommandReply::Silent)
    }

    async fn set_debug(
        &self,
        _message: &ChatMessageEvent,
        _enabled: bool,
    ) -> Result<CommandReply, CommandRouteError> {
        Ok(CommandReply::Silent)
    }
}

pub struct CommandRouter<S> {
    service: S,
    command_prefix: String,
}

impl<S: SessionCommandService> CommandRouter<S> {
    pub fn new(service: S, command_prefix: impl Into<String>) -> Self {
        Self { service, command_prefix: command_prefix.into() }
    }

    pub fn command_prefix(&self) -> &str {
        &self.command_prefix
    }

    /// `None` when the message is not addressed to the bot. Parse problems
    /// become replies; only service breakage surfaces as `Err`.
    pub async fn route(
        &self,
        message: &ChatMessageEvent,
    ) -> Option<Result<CommandReply, CommandRouteError>> {
        let command = match parse_command(&message.text, &self.command_prefix)? {
            Ok(command) => command,
            Err(parse_failure) => {
                debug!(
                    event_name = "ingress.chat.command_rejected",
                    error = %parse_failure,
                    "command not understood"
                );
                return Some(Ok(CommandReply::Text(parse_failure.chat_line())));
            }
        };
        Some(match command {
            SessionCommand::Available { expression } => {
                self.service.submit_availability(message, &expression).await
            }
            SessionCommand::Unavailable => self.service.withdraw_availability(message).await,
            SessionCommand::Count { requested } => self.service.quorum_size(message, requested).await,
            SessionCommand::Status => self.service.status(message).await,
            SessionCommand::Setup => self.service.bind_channel(message).await,
            SessionCommand::Debug => self.service.set_debug(message, true).await,
            SessionCommand::Nodebug => self.service.set_debug(message, false).await,
            SessionCommand::Help => {
                Ok(CommandReply::Text(render::help_message(&self.command_prefix)))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn message(text: &str) -> ChatMessageEvent {
        ChatMessageEvent {
            channel_id: "C123".to_owned(),
            sender_id: "U777".to_owned(),
            sender_handle: "@kai".to_owned(),
            text: text.to_owned(),
            message_ts: "1770000000.000100".to_owned(),
        }
    }

    #[test]
    fn messages_without_the_prefix_are_not_commands() {
        assert!(parse_command("anyone up for tonight?", "!").is_none());
        assert!(parse_command("!", "!").is_none());
    }

    #[test]
    fn full_verbs_parse_with_their_arguments() {
        assert_eq!(
            parse_command("!available 6-12", "!"),
            Some(Ok(SessionCommand::Available { expression: "6-12".to_owned() }))
        );
        assert_eq!(parse_command("!unavailable", "!"), Some(Ok(SessionCommand::Unavailable)));
        assert_eq!(
            parse_command("!count 3", "!"),
            Some(Ok(SessionCommand::Count { requested: Some(3) }))
        );
        assert_eq!(parse_command("!count", "!"), Some(Ok(SessionCommand::Count { requested: None })));
    }

    #[test]
    fn any_unambiguous_prefix_works() {
        assert_eq!(
            parse_command("!a in 1 hour", "!"),
            Some(Ok(SessionCommand::Available { expression: "in 1 hour".to_owned() }))
        );
        assert_eq!(parse_command("!u", "!"), Some(Ok(SessionCommand::Unavailable)));
        assert_eq!(parse_command("!st", "!"), Some(Ok(SessionCommand::Status)));
        assert_eq!(parse_command("!se", "!"), Some(Ok(SessionCommand::Setup)));
        assert_eq!(parse_command("!AVAILABLE 6-12", "!").map(|r| r.is_ok()), Some(true));
    }

    #[test]
    fn ambiguous_prefixes_name_the_candidates() {
        let result = parse_command("!s", "!");
        let Some(Err(failure)) = result else { panic!("expected a parse failure") };
        assert_eq!(failure.chat_line(), "Ambiguous command: status, setup");
    }

    #[test]
    fn unknown_verbs_get_the_confused_reply() {
        let Some(Err(failure)) = parse_command("!dance", "!") else {
            panic!("expected a parse failure")
        };
        assert!(matches!(failure, CommandParseError::UnknownCommand { .. }));
        assert_eq!(failure.chat_line(), "huh? what does that mean?");
    }

    #[test]
    fn a_bad_count_argument_is_rejected() {
        let Some(Err(failure)) = parse_command("!count lots", "!") else {
            panic!("expected a parse failure")
        };
        assert_eq!(failure.chat_line(), "couldn't make a number out of 'lots'");
    }

    #[test]
    fn every_known_verb_builds_its_own_command() {
        for name in COMMAND_NAMES {
            let command = build_command(name, "").expect("known verb");
            assert_eq!(
                command == SessionCommand::Help,
                name == "help",
                "verb {name} fell through to help"
            );
        }
    }

    #[test]
    fn alternate_prefixes_are_respected() {
        assert_eq!(parse_command("?status", "?"), Some(Ok(SessionCommand::Status)));
        assert!(parse_command("!status", "?").is_none());
    }

    struct RecordingService {
        calls: Mutex<Vec<&'static str>>,
    }

    impl RecordingService {
        fn new() -> Self {
            Self { calls: Mutex::new(Vec::new()) }
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().expect("calls").push(call);
        }
    }

    #[async_trait]
    impl SessionCommandService for RecordingService {
        async fn submit_availability(
            &self,
            _message: &ChatMessageEvent,
            _expression: &str,
        ) -> Result<CommandReply, CommandRouteError> {
            self.record("submit_availability");
            Ok(CommandReply::React("👍"))
        }

        async fn withdraw_availability(
            &self,
            _message: &ChatMessageEvent,
        ) -> Result<CommandReply, CommandRouteError> {
            self.record("withdraw_availability");
            Ok(CommandReply::Silent)
        }

        async fn quorum_size(
            &self,
            _message: &ChatMessageEvent,
            _requested: Option<u32>,
        ) -> Result<CommandReply, CommandRouteError> {
            self.record("quorum_size");
            Ok(CommandReply::Silent)
        }

        async fn status(
            &self,
            _message: &ChatMessageEvent,
        ) -> Result<CommandReply, CommandRouteError> {
            self.record("status");
            Ok(CommandReply::Silent)
        }

        async fn bind_channel(
            &self,
            _message: &ChatMessageEvent,
        ) -> Result<CommandReply, CommandRouteError> {
            self.record("bind_channel");
            Ok(CommandReply::Silent)
        }

        async fn set_debug(
            &self,
            _message: &ChatMessageEvent,
            _enabled: bool,
        ) -> Result<CommandReply, CommandRouteError> {
            self.record("set_debug");
            Ok(CommandReply::Silent)
        }
    }

    #[tokio::test]
    async fn routing_reaches_the_matching_handler() {
        let router = CommandRouter::new(RecordingService::new(), "!");

        let reply = router.route(&message("!available 6-12")).await;
        assert_eq!(reply, Some(Ok(CommandReply::React("👍"))));
        router.route(&message("!u")).await;
        router.route(&message("!count 4")).await;
        router.route(&message("!setup")).await;
        router.route(&message("!nodebug")).await;

        let calls = router.service.calls.lock().expect("calls").clone();
        assert_eq!(
            calls,
            vec![
                "submit_availability",
                "withdraw_availability",
                "quorum_size",
                "bind_channel",
                "set_debug"
            ]
        );
    }

    #[tokio::test]
    async fn parse_failures_never_reach_the_service() {
        let router = CommandRouter::new(RecordingService::new(), "!");
        let reply = router.route(&message("!zzz")).await;
        assert_eq!(reply, Some(Ok(CommandReply::Text("huh? what does that mean?".to_owned()))));
        assert!(router.service.calls.lock().expect("calls").is_empty());
    }

    #[tokio::test]
    async fn help_is_rendered_without_the_service() {
        let router = CommandRouter::new(RecordingService::new(), "!");
        let reply = router.route(&message("!help")).await;
        let Some(Ok(CommandReply::Text(text))) = reply else { panic!("expected help text") };
        assert!(text.contains("!available"));
        assert!(router.service.calls.lock().expect("calls").is_empty());
    }

    #[tokio::test]
    async fn unaddressed_messages_are_ignored() {
        let router = CommandRouter::new(RecordingService::new(), "!");
        assert!(router.route(&message("see you at 6")).await.is_none());
        assert!(router.service.calls.lock().expect("calls").is_empty());
    }
}
