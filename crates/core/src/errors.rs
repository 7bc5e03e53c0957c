//! Error ladder for the scheduling engine. Domain failures carry exact
//! wording for the chat surface; application failures wrap everything the
//! process can hit around them.

use thiserror::Error;

use crate::domain::ParticipantId;
use crate::timeexpr::ParseError;

/// Failures with domain meaning. Everything here is safe to show to the
/// group verbatim or via [`ApplicationError::user_message`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("that window would be over before it began")]
    DegenerateWindow { duration: chrono::Duration },

    #[error("{participant} has no availability on record")]
    NotRegistered { participant: ParticipantId },

    #[error("can't look for {requested} players")]
    InvalidQuorumSize { requested: u32 },
}

/// Process-level failures: domain errors plus the plumbing around them.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("no session channel is configured or bound")]
    MissingChannel,

    #[error("chat transport failure: {0}")]
    Transport(String),

    #[error("internal failure: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// What the group sees when an operation fails. Parse problems are
    /// reported word for word; anything unexpected gets the stock apology.
    pub fn user_message(&self) -> String {
        match self {
            Self::Domain(DomainError::Parse(parse)) => parse.to_string(),
            Self::Domain(DomainError::DegenerateWindow { .. }) => {
                "that window would be over before it began".to_owned()
            }
            Self::Domain(DomainError::NotRegistered { .. }) => {
                "We weren't expecting you!".to_owned()
            }
            Self::Domain(DomainError::InvalidQuorumSize { requested }) => {
                format!("can't look for {requested} players")
            }
            Self::MissingChannel | Self::Transport(_) | Self::Internal(_) => {
                "failed to parse command. sorry.".to_owned()
            }
        }
    }
}
