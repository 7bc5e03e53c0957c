//! The availability book: who has signed up, for when, and at what tier.
//! Insertion order is load-bearing here; it breaks every tie.

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;

use crate::clock::minute_floor;
use crate::domain::{ParticipantEntry, ParticipantId, Tier, TimeWindow};

#[derive(Debug, Default)]
pub struct Roster {
    entries: IndexMap<ParticipantId, ParticipantEntry>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create-or-replace. Tier is decided at join time: selected while the
    /// bench is short of `players_needed`, backup otherwise. A participant
    /// replacing their own entry competes for the seat they already hold,
    /// not for a second one.
    pub fn upsert(
        &mut self,
        participant: ParticipantId,
        window: TimeWindow,
        players_needed: u32,
    ) -> Tier {
        let occupied = self
            .entries
            .iter()
            .filter(|(id, entry)| entry.tier == Tier::Selected && **id != participant)
            .count();
        let tier = if (occupied as u32) < players_needed { Tier::Selected } else { Tier::Backup };
        let entry = ParticipantEntry { participant: participant.clone(), window, tier };
        self.entries.insert(participant, entry);
        tier
    }

    pub fn remove(&mut self, participant: &ParticipantId) -> Option<ParticipantEntry> {
        self.entries.shift_remove(participant)
    }

    /// Drops every entry whose window ended strictly before `now` (floored
    /// to the minute, same precision the windows carry). Running it twice
    /// with the same `now` removes nothing the second time.
    pub fn prune(&mut self, now: DateTime<FixedOffset>) -> Vec<ParticipantEntry> {
        let cutoff = minute_floor(now);
        let expired: Vec<ParticipantId> = self
            .entries
            .values()
            .filter(|entry| entry.window.end() < cutoff)
            .map(|entry| entry.participant.clone())
            .collect();
        expired.iter().filter_map(|id| self.entries.shift_remove(id)).collect()
    }

    pub fn get(&self, participant: &ParticipantId) -> Option<&ParticipantEntry> {
        self.entries.get(participant)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticipantEntry> {
        self.entries.values()
    }

    pub fn currently_available(&self, now: DateTime<FixedOffset>) -> Vec<&ParticipantEntry> {
        self.entries.values().filter(|entry| entry.window.contains(now)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn selected_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.tier == Tier::Selected).count()
    }

    pub fn selected_windows(&self) -> Vec<TimeWindow> {
        self.entries
            .values()
            .filter(|entry| entry.tier == Tier::Selected)
            .map(|entry| entry.window)
            .collect()
    }

    pub fn set_tier(&mut self, participant: &ParticipantId, tier: Tier) -> bool {
        match self.entries.get_mut(participant) {
            Some(entry) => {
                entry.tier = tier;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Fills selected vacancies from backups in insertion order. Never
    /// demotes anyone.
    pub fn promote_until(&mut self, players_needed: u32) -> Vec<ParticipantId> {
        let mut selected = self.selected_count() as u32;
        let mut promoted = Vec::new();
        for entry in self.entries.values_mut() {
            if selected >= players_needed {
                break;
            }
            if entry.tier == Tier::Backup {
                entry.tier = Tier::Selected;
                selected += 1;
                promoted.push(entry.participant.clone());
            }
        }
        promoted
    }

    /// Demotes the latest-joined selected entries until the bench fits
    /// `players_needed` again.
    pub fn demote_overflow(&mut self, players_needed: u32) -> Vec<ParticipantId> {
        let mut selected = self.selected_count() as u32;
        let mut demoted = Vec::new();
        for entry in self.entries.values_mut().rev() {
            if selected <= players_needed {
                break;
            }
            if entry.tier == Tier::Selected {
                entry.tier = Tier::Backup;
                selected -= 1;
                demoted.push(entry.participant.clone());
            }
        }
        demoted
    }

    /// The selected entry with the latest start, the natural candidate to
    /// swap out. Earlier joiners win ties.
    pub fn weakest_selected(&self) -> Option<&ParticipantEntry> {
        self.entries
            .values()
            .filter(|entry| entry.tier == Tier::Selected)
            .reduce(|best, entry| if entry.window.start() > best.window.start() { entry } else { best })
    }

    /// The backup with the earliest start, the natural candidate to swap
    /// in. Earlier joiners win ties.
    pub fn earliest_backup(&self) -> Option<&ParticipantEntry> {
        self.entries
            .values()
            .filter(|entry| entry.tier == Tier::Backup)
            .reduce(|best, entry| if entry.window.start() < best.window.start() { entry } else { best })
    }
}

/// The latest start among the windows, provided every window still covers
/// it. `None` when the set is empty or some window ends too early.
pub fn common_start_time(windows: &[TimeWindow]) -> Option<DateTime<FixedOffset>> {
    let candidate = windows.iter().map(|window| window.start()).max()?;
    windows.iter().all(|window| window.end() >= candidate).then_some(candidate)
}
