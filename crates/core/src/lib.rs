pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod roster;
pub mod session;
pub mod timeexpr;

pub use clock::SessionClock;
pub use config::{
    AppConfig, ChatConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, LoggingConfig,
    SessionConfig,
};
pub use domain::{ParticipantEntry, ParticipantId, Tier, TimeWindow};
pub use errors::{ApplicationError, DomainError};
pub use roster::{common_start_time, Roster};
pub use session::{
    Announcer, CapabilityError, Coordinator, NoopAnnouncer, NoopVoteCollector, SessionTuning,
    StatusEntry, StatusReport, SubmitOutcome, VoteCollector, VoteHandle,
};
pub use timeexpr::{parse_expression, ParseError, ParseOutcome};
