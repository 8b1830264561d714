//! Penalties for channel occurrences and the netsplit grace tracker.

use std::collections::BTreeMap;

use crate::config::PenaltyConfig;

use super::types::{name_key, Character};

/// Something the transport reported about a character's nick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Occurrence {
    Message { len: usize },
    Part,
    Kick,
    Quit,
    NickChange { new_nick: String },
    Logout,
    NetsplitDeparture,
    NetsplitRejoin,
}

impl Occurrence {
    /// Fixed occurrence → penalty table. Netsplit departures are deferred
    /// to the grace tracker; rejoins are never penalised.
    pub fn penalty_kind(&self) -> Option<PenaltyKind> {
        match self {
            Occurrence::Message { .. } => Some(PenaltyKind::Message),
            Occurrence::Part => Some(PenaltyKind::Part),
            Occurrence::Kick => Some(PenaltyKind::Kick),
            Occurrence::Quit => Some(PenaltyKind::Quit),
            Occurrence::NickChange { .. } => Some(PenaltyKind::Nick),
            Occurrence::Logout => Some(PenaltyKind::Logout),
            Occurrence::NetsplitDeparture | Occurrence::NetsplitRejoin => None,
        }
    }

    /// Magnitude multiplier: message length, otherwise one.
    pub fn units(&self) -> i64 {
        match self {
            Occurrence::Message { len } => *len as i64,
            _ => 1,
        }
    }

    /// Whether the character leaves the game afterwards.
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            Occurrence::Part | Occurrence::Kick | Occurrence::Quit | Occurrence::Logout
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PenaltyKind {
    Message,
    Nick,
    Part,
    Kick,
    Quit,
    Dropped,
    Quest,
    Logout,
}

impl PenaltyKind {
    pub fn label(self) -> &'static str {
        match self {
            PenaltyKind::Message => "messaging",
            PenaltyKind::Nick => "changing nicks",
            PenaltyKind::Part => "parting",
            PenaltyKind::Kick => "being kicked",
            PenaltyKind::Quit => "quitting",
            PenaltyKind::Dropped => "dropping from the realm",
            PenaltyKind::Quest => "failing a quest",
            PenaltyKind::Logout => "logging out",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PenaltyTable {
    cfg: PenaltyConfig,
}

impl PenaltyTable {
    pub fn new(cfg: &PenaltyConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    pub fn magnitude(&self, kind: PenaltyKind) -> i64 {
        match kind {
            PenaltyKind::Message => self.cfg.message,
            PenaltyKind::Nick => self.cfg.nick,
            PenaltyKind::Part => self.cfg.part,
            PenaltyKind::Kick => self.cfg.kick,
            PenaltyKind::Quit => self.cfg.quit,
            PenaltyKind::Dropped => self.cfg.dropped,
            PenaltyKind::Quest => self.cfg.quest,
            PenaltyKind::Logout => self.cfg.logout,
        }
    }

    /// `floor(magnitude * units * step^level)` before the ceiling.
    pub fn raw(&self, kind: PenaltyKind, units: i64, level: u32) -> i64 {
        let base = self.magnitude(kind).saturating_mul(units.max(1));
        (base as f64 * self.cfg.step.powi(level as i32)) as i64
    }

    /// Adds the penalty to the character's TTL and totals, clipped so the
    /// penalty accumulated within the current level never exceeds the
    /// configured limit. Returns the seconds actually applied.
    pub fn apply(&self, character: &mut Character, kind: PenaltyKind, units: i64) -> i64 {
        let raw = self.raw(kind, units, character.level);
        let applied = match self.cfg.limit {
            Some(limit) => raw.min((limit - character.level_penalty).max(0)),
            None => raw,
        };
        if applied <= 0 {
            return 0;
        }
        character.ttl = character.ttl.saturating_add(applied);
        character.level_penalty = character.level_penalty.saturating_add(applied);
        let totals = &mut character.penalties;
        let slot = match kind {
            PenaltyKind::Message => &mut totals.message,
            PenaltyKind::Nick => &mut totals.nick,
            PenaltyKind::Part => &mut totals.part,
            PenaltyKind::Kick => &mut totals.kick,
            PenaltyKind::Quit => &mut totals.quit,
            PenaltyKind::Dropped => &mut totals.dropped,
            PenaltyKind::Quest => &mut totals.quest,
            PenaltyKind::Logout => &mut totals.logout,
        };
        *slot = slot.saturating_add(applied);
        applied
    }
}

/// Characters that left through a netsplit, with the tick at which their
/// grace runs out.
#[derive(Debug, Clone, Default)]
pub struct NetsplitTracker {
    grace_ticks: u64,
    pending: BTreeMap<String, u64>,
}

impl NetsplitTracker {
    pub fn new(grace_ticks: u64) -> Self {
        Self {
            grace_ticks,
            pending: BTreeMap::new(),
        }
    }

    pub fn depart(&mut self, name: &str, tick: u64) {
        self.pending
            .entry(name_key(name))
            .or_insert(tick + self.grace_ticks);
    }

    /// Clears a pending entry. True when the character was within grace.
    pub fn rejoin(&mut self, name: &str) -> bool {
        self.pending.remove(&name_key(name)).is_some()
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains_key(&name_key(name))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes and returns every entry whose deadline is at or before `tick`.
    pub fn expire(&mut self, tick: u64) -> Vec<String> {
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= tick)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.pending.remove(key);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn table(limit: Option<i64>) -> PenaltyTable {
        let mut cfg = Config::default().penalties;
        cfg.limit = limit;
        PenaltyTable::new(&cfg)
    }

    #[test]
    fn message_penalty_scales_with_length_and_level() {
        let t = table(None);
        assert_eq!(t.raw(PenaltyKind::Message, 10, 0), 10);
        assert_eq!(t.raw(PenaltyKind::Part, 1, 0), 200);
        assert_eq!(t.raw(PenaltyKind::Part, 1, 2), (200.0 * 1.14f64 * 1.14) as i64);
    }

    #[test]
    fn ceiling_clips_accumulated_penalty() {
        let t = table(Some(250));
        let mut ch = Character::new("x", "y", "h", 100, 0);
        assert_eq!(t.apply(&mut ch, PenaltyKind::Part, 1), 200);
        assert_eq!(t.apply(&mut ch, PenaltyKind::Kick, 1), 50);
        assert_eq!(t.apply(&mut ch, PenaltyKind::Quit, 1), 0);
        assert_eq!(ch.ttl, 350);
        assert_eq!(ch.penalties.part, 200);
        assert_eq!(ch.penalties.kick, 50);
        assert_eq!(ch.penalties.quit, 0);
        assert_eq!(ch.level_penalty, 250);
    }

    #[test]
    fn steep_penalties_saturate_instead_of_overflowing() {
        let mut cfg = Config::default().penalties;
        cfg.step = 10.0;
        cfg.limit = None;
        let t = PenaltyTable::new(&cfg);
        let mut ch = Character::new("x", "y", "h", i64::MAX - 5, 0);
        ch.level = 200;
        assert_eq!(t.raw(PenaltyKind::Kick, 1, 200), i64::MAX);
        t.apply(&mut ch, PenaltyKind::Kick, 1);
        t.apply(&mut ch, PenaltyKind::Kick, 1);
        assert_eq!(ch.ttl, i64::MAX);
        assert_eq!(ch.penalties.kick, i64::MAX);
        assert_eq!(ch.penalties.total(), i64::MAX);
    }

    #[test]
    fn occurrence_table_is_fixed() {
        assert_eq!(
            Occurrence::Message { len: 4 }.penalty_kind(),
            Some(PenaltyKind::Message)
        );
        assert_eq!(Occurrence::Message { len: 4 }.units(), 4);
        assert_eq!(Occurrence::NetsplitDeparture.penalty_kind(), None);
        assert!(Occurrence::Quit.ends_session());
        assert!(!Occurrence::NickChange { new_nick: "n".into() }.ends_session());
    }

    #[test]
    fn tracker_expires_at_deadline() {
        let mut tracker = NetsplitTracker::new(3);
        tracker.depart("Mira", 10);
        tracker.depart("mira", 11);
        assert!(tracker.expire(12).is_empty());
        assert_eq!(tracker.expire(13), vec!["mira".to_string()]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn tracker_rejoin_clears_entry() {
        let mut tracker = NetsplitTracker::new(3);
        tracker.depart("Mira", 10);
        assert!(tracker.rejoin("MIRA"));
        assert!(!tracker.rejoin("MIRA"));
        assert!(tracker.expire(100).is_empty());
    }
}
