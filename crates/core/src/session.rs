//! Quorum coordination: collects availability, finds the common start,
//! counts down to it, and runs over-quorum replacement votes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::domain::{ParticipantId, Tier, TimeWindow};
use crate::errors::DomainError;
use crate::roster::{common_start_time, Roster};
use crate::timeexpr;

/// Failures from the capabilities the coordinator borrows from the chat
/// surface.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("announce failed: {0}")]
    Announce(String),

    #[error("vote request failed: {0}")]
    VoteRequest(String),

    #[error("vote tally failed: {0}")]
    VoteTally(String),
}

/// Opaque reference to a running poll, round-tripped between
/// [`VoteCollector::request_vote`] and [`VoteCollector::tally`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteHandle(pub String);

/// Posts a line where the whole group reads it.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, text: &str) -> Result<(), CapabilityError>;
}

/// Runs a group poll: post a prompt, let approvals accumulate, count them.
#[async_trait]
pub trait VoteCollector: Send + Sync {
    async fn request_vote(&self, text: &str) -> Result<VoteHandle, CapabilityError>;

    async fn tally(&self, handle: &VoteHandle) -> Result<u32, CapabilityError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAnnouncer;

#[async_trait]
impl Announcer for NoopAnnouncer {
    async fn announce(&self, _text: &str) -> Result<(), CapabilityError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopVoteCollector;

#[async_trait]
impl VoteCollector for NoopVoteCollector {
    async fn request_vote(&self, _text: &str) -> Result<VoteHandle, CapabilityError> {
        Ok(VoteHandle("noop".to_owned()))
    }

    async fn tally(&self, _handle: &VoteHandle) -> Result<u32, CapabilityError> {
        Ok(0)
    }
}

/// Knobs the coordinator runs with.
#[derive(Clone, Copy, Debug)]
pub struct SessionTuning {
    pub players_needed: u32,
    pub default_duration: Duration,
    pub vote_window: Duration,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            players_needed: 5,
            default_duration: Duration::hours(6),
            vote_window: Duration::hours(6),
        }
    }
}

/// What a submission earned the sender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub window: TimeWindow,
    pub tier: Tier,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusEntry {
    pub participant: ParticipantId,
    pub window: TimeWindow,
    pub tier: Tier,
    pub available_now: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusReport {
    pub players_needed: u32,
    pub confirmed_start: Option<DateTime<FixedOffset>>,
    pub vote_open: bool,
    pub entries: Vec<StatusEntry>,
}

struct Session {
    roster: Roster,
    players_needed: u32,
    confirmed_start: Option<DateTime<FixedOffset>>,
    vote_open: bool,
}

struct CoordinatorInner {
    session: Mutex<Session>,
    announcer: Arc<dyn Announcer>,
    votes: Arc<dyn VoteCollector>,
    tuning: SessionTuning,
}

/// Owns the availability book and the confirmation state machine. Cheap to
/// clone; every clone shares one session behind a single async mutex.
///
/// Timed waits (the start countdown, the vote window) run in spawned tasks
/// that never hold the lock while sleeping and re-validate state on wake, so
/// a superseded countdown goes quiet instead of firing stale.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

impl Coordinator {
    pub fn new(
        tuning: SessionTuning,
        announcer: Arc<dyn Announcer>,
        votes: Arc<dyn VoteCollector>,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                session: Mutex::new(Session {
                    roster: Roster::new(),
                    players_needed: tuning.players_needed,
                    confirmed_start: None,
                    vote_open: false,
                }),
                announcer,
                votes,
                tuning,
            }),
        }
    }

    /// Parses `text` against `now` and records the window. Landing selected
    /// re-checks quorum; landing backup may open a replacement vote.
    pub async fn submit_availability(
        &self,
        participant: ParticipantId,
        text: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<SubmitOutcome, DomainError> {
        let outcome = timeexpr::parse_expression(text, now, self.inner.tuning.default_duration)?;
        let window = outcome.window;

        let mut notices = Vec::new();
        let tier = {
            let mut guard = self.inner.session.lock().await;
            let session = &mut *guard;
            self.reconcile(session, now, &mut notices);
            let tier = session.roster.upsert(participant.clone(), window, session.players_needed);
            info!(
                event_name = "session.availability.recorded",
                participant = %participant,
                tier = ?tier,
                start = %window.start(),
                end = %window.end(),
                "availability recorded"
            );
            match tier {
                Tier::Selected => self.refresh_confirmation(session, now),
                Tier::Backup => self.maybe_open_vote(session, now),
            }
            tier
        };
        self.flush(notices).await;
        Ok(SubmitOutcome { window, tier })
    }

    /// Removes the sender's entry. A selected departure refills from the
    /// backups and cancels the confirmed start when quorum is lost.
    pub async fn withdraw_availability(
        &self,
        participant: &ParticipantId,
        now: DateTime<FixedOffset>,
    ) -> Result<(), DomainError> {
        let mut notices = Vec::new();
        let result = {
            let mut guard = self.inner.session.lock().await;
            let session = &mut *guard;
            self.reconcile(session, now, &mut notices);
            match session.roster.remove(participant) {
                None => Err(DomainError::NotRegistered { participant: participant.clone() }),
                Some(entry) => {
                    info!(
                        event_name = "session.availability.withdrawn",
                        participant = %participant,
                        tier = ?entry.tier,
                        "availability withdrawn"
                    );
                    if entry.tier == Tier::Selected {
                        session.roster.promote_until(session.players_needed);
                        if (session.roster.selected_count() as u32) < session.players_needed {
                            self.drop_confirmation(
                                session,
                                std::slice::from_ref(participant),
                                &mut notices,
                            );
                        } else {
                            self.refresh_confirmation(session, now);
                        }
                    }
                    Ok(())
                }
            }
        };
        self.flush(notices).await;
        result
    }

    /// Changes how many players make a session. Shrinking demotes the
    /// latest-joined extras; growing refills from the backups.
    pub async fn set_quorum_size(
        &self,
        requested: u32,
        now: DateTime<FixedOffset>,
    ) -> Result<(), DomainError> {
        if requested == 0 {
            return Err(DomainError::InvalidQuorumSize { requested });
        }
        let mut notices = Vec::new();
        {
            let mut guard = self.inner.session.lock().await;
            let session = &mut *guard;
            self.reconcile(session, now, &mut notices);
            session.players_needed = requested;
            session.roster.demote_overflow(requested);
            session.roster.promote_until(requested);
            info!(
                event_name = "session.quorum.resized",
                players_needed = requested,
                "quorum size changed"
            );
            if (session.roster.selected_count() as u32) < requested {
                self.drop_confirmation(session, &[], &mut notices);
            } else {
                self.refresh_confirmation(session, now);
            }
        }
        self.flush(notices).await;
        Ok(())
    }

    pub async fn quorum_size(&self) -> u32 {
        self.inner.session.lock().await.players_needed
    }

    /// Current registry snapshot, pruned as of `now`.
    pub async fn status(&self, now: DateTime<FixedOffset>) -> StatusReport {
        let mut notices = Vec::new();
        let report = {
            let mut guard = self.inner.session.lock().await;
            let session = &mut *guard;
            self.reconcile(session, now, &mut notices);
            StatusReport {
                players_needed: session.players_needed,
                confirmed_start: session.confirmed_start,
                vote_open: session.vote_open,
                entries: session
                    .roster
                    .iter()
                    .map(|entry| StatusEntry {
                        participant: entry.participant.clone(),
                        window: entry.window,
                        tier: entry.tier,
                        available_now: entry.window.contains(now),
                    })
                    .collect(),
            }
        };
        self.flush(notices).await;
        report
    }

    /// Drops expired entries and repairs whatever that broke. Runs at the
    /// top of every operation, under the lock.
    fn reconcile(&self, session: &mut Session, now: DateTime<FixedOffset>, notices: &mut Vec<String>) {
        let expired = session.roster.prune(now);
        if expired.is_empty() {
            return;
        }
        for entry in &expired {
            debug!(
                event_name = "session.availability.expired",
                participant = %entry.participant,
                "availability expired"
            );
        }
        let culprits: Vec<ParticipantId> = expired
            .iter()
            .filter(|entry| entry.tier == Tier::Selected)
            .map(|entry| entry.participant.clone())
            .collect();
        if culprits.is_empty() {
            return;
        }
        session.roster.promote_until(session.players_needed);
        if (session.roster.selected_count() as u32) < session.players_needed {
            self.drop_confirmation(session, &culprits, notices);
        } else {
            self.refresh_confirmation(session, now);
        }
    }

    /// Re-derives the common start from the selected bench. Owns both the
    /// idle-to-waiting transition and superseding an earlier countdown.
    fn refresh_confirmation(&self, session: &mut Session, now: DateTime<FixedOffset>) {
        if (session.roster.selected_count() as u32) != session.players_needed {
            return;
        }
        match common_start_time(&session.roster.selected_windows()) {
            Some(start) => {
                if session.confirmed_start == Some(start) {
                    return;
                }
                session.confirmed_start = Some(start);
                info!(
                    event_name = "session.quorum.reached",
                    start = %start,
                    players = session.players_needed,
                    "quorum reached, counting down to start"
                );
                self.spawn_start_countdown(start, now);
            }
            None => {
                if session.confirmed_start.take().is_some() {
                    info!(
                        event_name = "session.confirmation.stale",
                        "no common window anymore, countdown dropped"
                    );
                }
            }
        }
    }

    fn drop_confirmation(
        &self,
        session: &mut Session,
        culprits: &[ParticipantId],
        notices: &mut Vec<String>,
    ) {
        let Some(start) = session.confirmed_start.take() else { return };
        info!(event_name = "session.cancelled", start = %start, "confirmed start cancelled");
        let remaining: Vec<ParticipantId> = session
            .roster
            .iter()
            .filter(|entry| entry.tier == Tier::Selected)
            .map(|entry| entry.participant.clone())
            .collect();
        if !remaining.is_empty() {
            notices.push(cancellation_notice(culprits, &remaining, start));
        }
    }

    /// A backup joining a full bench challenges the weakest seat. One vote
    /// runs at a time.
    fn maybe_open_vote(&self, session: &mut Session, now: DateTime<FixedOffset>) {
        if session.vote_open {
            return;
        }
        let Some(weakest) = session.roster.weakest_selected() else { return };
        let Some(replacement) = session.roster.earliest_backup() else { return };
        let incumbent = weakest.participant.clone();
        let challenger = replacement.participant.clone();
        let prompt = vote_prompt(&incumbent, &challenger, session.players_needed);
        session.vote_open = true;
        info!(
            event_name = "session.vote.opened",
            incumbent = %incumbent,
            challenger = %challenger,
            "replacement vote opened"
        );
        let coordinator = self.clone();
        tokio::spawn(async move {
            coordinator.run_vote(incumbent, challenger, prompt, now).await;
        });
    }

    fn spawn_start_countdown(&self, target: DateTime<FixedOffset>, now: DateTime<FixedOffset>) {
        let coordinator = self.clone();
        let delay = (target - now).to_std().unwrap_or_default();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            coordinator.finish_countdown(target).await;
        });
    }

    async fn finish_countdown(&self, target: DateTime<FixedOffset>) {
        let message = {
            let mut guard = self.inner.session.lock().await;
            let session = &mut *guard;
            if session.confirmed_start != Some(target) {
                debug!(
                    event_name = "session.announce.superseded",
                    target = %target,
                    "countdown no longer current"
                );
                return;
            }
            let starters: Vec<ParticipantId> = session
                .roster
                .iter()
                .filter(|entry| entry.tier == Tier::Selected)
                .map(|entry| entry.participant.clone())
                .collect();
            session.roster.clear();
            session.confirmed_start = None;
            session.vote_open = false;
            start_announcement(&starters, target)
        };
        info!(event_name = "session.announce.sent", target = %target, "session start announced");
        if let Err(failure) = self.inner.announcer.announce(&message).await {
            error!(
                event_name = "session.announce.failed",
                error = %failure,
                "failed to deliver start announcement"
            );
        }
    }

    async fn run_vote(
        &self,
        incumbent: ParticipantId,
        challenger: ParticipantId,
        prompt: String,
        now: DateTime<FixedOffset>,
    ) {
        let handle = match self.inner.votes.request_vote(&prompt).await {
            Ok(handle) => handle,
            Err(failure) => {
                error!(event_name = "session.vote.failed", error = %failure, "could not open vote");
                self.inner.session.lock().await.vote_open = false;
                return;
            }
        };

        let window = self.inner.tuning.vote_window;
        tokio::time::sleep(window.to_std().unwrap_or_default()).await;

        let affirmative = match self.inner.votes.tally(&handle).await {
            Ok(count) => count,
            Err(failure) => {
                error!(event_name = "session.vote.failed", error = %failure, "could not tally vote");
                0
            }
        };

        let resumed = now + window;
        let mut notices = Vec::new();
        {
            let mut guard = self.inner.session.lock().await;
            let session = &mut *guard;
            session.vote_open = false;
            let threshold = session.players_needed / 2;
            if affirmative <= threshold {
                info!(
                    event_name = "session.vote.insufficient",
                    affirmative,
                    threshold,
                    "vote closed without a swap"
                );
                return;
            }
            let still_selected =
                session.roster.get(&incumbent).map(|entry| entry.tier) == Some(Tier::Selected);
            let still_backup =
                session.roster.get(&challenger).map(|entry| entry.tier) == Some(Tier::Backup);
            if !(still_selected && still_backup) {
                info!(event_name = "session.vote.stale", "vote subjects changed, swap dropped");
                return;
            }
            session.roster.set_tier(&incumbent, Tier::Backup);
            session.roster.set_tier(&challenger, Tier::Selected);
            info!(
                event_name = "session.vote.swap",
                incumbent = %incumbent,
                challenger = %challenger,
                affirmative,
                "vote passed, tiers swapped"
            );
            self.reconcile(session, resumed, &mut notices);
            self.refresh_confirmation(session, resumed);
        }
        self.flush(notices).await;
    }

    async fn flush(&self, notices: Vec<String>) {
        for notice in notices {
            if let Err(failure) = self.inner.announcer.announce(&notice).await {
                error!(
                    event_name = "session.announce.failed",
                    error = %failure,
                    "failed to deliver notice"
                );
            }
        }
    }
}

fn roll_call(participants: &[ParticipantId]) -> String {
    participants.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
}

fn start_announcement(starters: &[ParticipantId], start: DateTime<FixedOffset>) -> String {
    format!(
        "{} we've got enough players, session starts at {}",
        roll_call(starters),
        start.format("%m/%d %H:%M")
    )
}

fn vote_prompt(incumbent: &ParticipantId, challenger: &ParticipantId, players_needed: u32) -> String {
    format!(
        "{challenger} wants in but all {players_needed} seats are taken. \
         Swap out {incumbent} (latest start) for {challenger} (earliest backup)? \
         React 👍 to approve."
    )
}

fn cancellation_notice(
    culprits: &[ParticipantId],
    remaining: &[ParticipantId],
    start: DateTime<FixedOffset>,
) -> String {
    let when = start.format("%m/%d %H:%M");
    if culprits.is_empty() {
        format!("{} we're short on players again, {when} is off", roll_call(remaining))
    } else {
        format!(
            "{} {} dropped out, {when} is off until we find more players",
            roll_call(remaining),
            culprits.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        )
    }
}
