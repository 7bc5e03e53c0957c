use std::sync::Arc;

use readycheck_chat::{
    ChannelDirectory, ChatSessionService, ChatTransport, CommandRouter, GatewayRunner,
    NoopChatTransport, ReactionVoteCollector, TransportAnnouncer, DEFAULT_CHANNEL_NAME,
};
use readycheck_core::{AppConfig, ConfigError, Coordinator, SessionClock, SessionTuning};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub runner: GatewayRunner<ChatSessionService>,
    pub transport: Arc<dyn ChatTransport>,
    pub transport_mode: &'static str,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("chat.bot_token must be set to talk to the chat backend")]
    MissingBotToken,
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    if config.chat.bot_token.expose_secret().is_empty() {
        return Err(BootstrapError::MissingBotToken);
    }
    let offset = config.session.utc_offset()?;

    // The concrete chat backend plugs in here; until one is wired the
    // server runs against the noop transport.
    let transport: Arc<dyn ChatTransport> = Arc::new(NoopChatTransport);
    let transport_mode = "noop";

    let channels =
        Arc::new(ChannelDirectory::new(config.chat.channel.clone(), DEFAULT_CHANNEL_NAME));
    let tuning = SessionTuning {
        players_needed: config.session.players_needed,
        default_duration: config.session.default_duration(),
        vote_window: config.session.vote_window(),
    };
    let coordinator = Coordinator::new(
        tuning,
        Arc::new(TransportAnnouncer::new(Arc::clone(&transport), Arc::clone(&channels))),
        Arc::new(ReactionVoteCollector::new(Arc::clone(&transport), Arc::clone(&channels))),
    );

    let service = ChatSessionService::new(coordinator, SessionClock::new(offset), channels);
    let router = CommandRouter::new(service, config.chat.command_prefix.clone());
    let runner = GatewayRunner::new(Arc::clone(&transport), router);

    info!(
        event_name = "system.bootstrap.ready",
        players_needed = tuning.players_needed,
        utc_offset_minutes = config.session.utc_offset_minutes,
        "application wired"
    );

    Ok(Application { config, runner, transport, transport_mode })
}

#[cfg(test)]
mod tests {
    use readycheck_core::{AppConfig, ConfigOverrides, LoadOptions};
    use secrecy::SecretString;

    use crate::bootstrap::{bootstrap_with_config, BootstrapError};

    #[tokio::test]
    async fn bootstrap_fails_fast_without_a_bot_token() {
        let config = AppConfig::load(LoadOptions::default()).expect("load");
        let result = bootstrap_with_config(config).await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_wires_the_application_from_overrides() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                bot_token: Some("xbot-test".to_string()),
                channel: Some("C123".to_string()),
                players_needed: Some(3),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("load");
        let app = bootstrap_with_config(config)
            .await
            .expect("bootstrap should succeed with a token");

        assert_eq!(app.transport_mode, "noop");
        assert_eq!(app.config.session.players_needed, 3);
        assert_eq!(app.config.chat.command_prefix, "!");
    }

    #[tokio::test]
    async fn bootstrap_rejects_an_offset_outside_a_day() {
        let mut config = AppConfig::default();
        config.chat.bot_token = SecretString::from("xbot-test".to_owned());
        config.session.utc_offset_minutes = 24 * 60 + 30;

        let result = bootstrap_with_config(config).await;
        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }
}
