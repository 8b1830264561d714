//! Event-log records and the per-pass outbox that collects narrative.

use serde::{Deserialize, Serialize};

use super::types::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Register,
    LevelUp,
    AllyGained,
    AllyLevelUp,
    Penalty,
    Dropped,
    Battle,
    ItemFound,
    Modifier,
    QuestStart,
    QuestSuccess,
    QuestFailure,
    HandOfGod,
    Calamity,
    Godsend,
    Archive,
    Challenge,
    CriticalStrike,
    ItemSwap,
    UniqueItem,
    TeamBattle,
    Evilness,
    Goodness,
}

impl EventKind {
    pub const ALL: [EventKind; 23] = [
        EventKind::Register,
        EventKind::LevelUp,
        EventKind::AllyGained,
        EventKind::AllyLevelUp,
        EventKind::Penalty,
        EventKind::Dropped,
        EventKind::Battle,
        EventKind::ItemFound,
        EventKind::Modifier,
        EventKind::QuestStart,
        EventKind::QuestSuccess,
        EventKind::QuestFailure,
        EventKind::HandOfGod,
        EventKind::Calamity,
        EventKind::Godsend,
        EventKind::Archive,
        EventKind::Challenge,
        EventKind::CriticalStrike,
        EventKind::ItemSwap,
        EventKind::UniqueItem,
        EventKind::TeamBattle,
        EventKind::Evilness,
        EventKind::Goodness,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Register => "register",
            EventKind::LevelUp => "level_up",
            EventKind::AllyGained => "ally_gained",
            EventKind::AllyLevelUp => "ally_level_up",
            EventKind::Penalty => "penalty",
            EventKind::Dropped => "dropped",
            EventKind::Battle => "battle",
            EventKind::ItemFound => "item_found",
            EventKind::Modifier => "modifier",
            EventKind::QuestStart => "quest_start",
            EventKind::QuestSuccess => "quest_success",
            EventKind::QuestFailure => "quest_failure",
            EventKind::HandOfGod => "hand_of_god",
            EventKind::Calamity => "calamity",
            EventKind::Godsend => "godsend",
            EventKind::Archive => "archive",
            EventKind::Challenge => "challenge",
            EventKind::CriticalStrike => "critical_strike",
            EventKind::ItemSwap => "item_swap",
            EventKind::UniqueItem => "unique_item",
            EventKind::TeamBattle => "team_battle",
            EventKind::Evilness => "evilness",
            EventKind::Goodness => "goodness",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        EventKind::ALL.into_iter().find(|k| k.as_str() == text)
    }
}

/// One append-only log entry. `magnitude` is the signed TTL change in
/// seconds, or the new level for level-ups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub at: Timestamp,
    pub character: String,
    pub kind: EventKind,
    pub magnitude: i64,
    pub text: String,
}

/// A private line for one nick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub nick: String,
    pub text: String,
}

/// Everything one mutation pass produced, in emission order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Report {
    /// Lines for the channel.
    pub lines: Vec<String>,
    pub notices: Vec<Notice>,
    pub records: Vec<EventRecord>,
    /// Quest state changed and its artifact needs rewriting.
    pub quest_changed: bool,
    pub level_ups: usize,
}

impl Report {
    pub fn say(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn tell(&mut self, nick: &str, text: impl Into<String>) {
        self.notices.push(Notice {
            nick: nick.to_string(),
            text: text.into(),
        });
    }

    /// Emits a line and logs it as an event.
    pub fn announce(&mut self, at: Timestamp, character: &str, kind: EventKind, magnitude: i64, text: String) {
        self.records.push(EventRecord {
            at,
            character: character.to_string(),
            kind,
            magnitude,
            text: text.clone(),
        });
        self.lines.push(text);
    }

    /// Logs an event without a channel line.
    pub fn record(&mut self, at: Timestamp, character: &str, kind: EventKind, magnitude: i64, text: String) {
        self.records.push(EventRecord {
            at,
            character: character.to_string(),
            kind,
            magnitude,
            text,
        });
    }

    pub fn merge(&mut self, other: Report) {
        self.lines.extend(other.lines);
        self.notices.extend(other.notices);
        self.records.extend(other.records);
        self.quest_changed |= other.quest_changed;
        self.level_ups += other.level_ups;
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.notices.is_empty() && self.records.is_empty() && !self.quest_changed
    }
}
