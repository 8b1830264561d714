//! Quest-status artifact read by the website.
//!
//! Rewritten through [`write_file_locked`] so a reader sees either the old
//! or the new document, never a partial one.

use serde::Serialize;
use std::path::Path;

use super::{write_file_locked, StoreError};
use crate::game::ledger::Ledger;
use crate::game::quest::{Quest, QuestOutcome, QuestPhase};
use crate::game::types::{Pos, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestParticipant {
    pub name: String,
    pub level: u32,
    pub class: String,
    pub online: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestStatus {
    pub updated_at: Timestamp,
    pub phase: QuestPhase,
    pub description: String,
    pub participants: Vec<QuestParticipant>,
    pub started_at: Option<Timestamp>,
    pub next_quest_at: Timestamp,
    pub start: Option<Pos>,
    pub goal: Option<Pos>,
    pub position: Option<Pos>,
    pub path: Vec<Pos>,
    pub progress: usize,
    pub outcome: QuestOutcome,
    pub failure: Option<String>,
}

impl QuestStatus {
    pub fn new(quest: &Quest, ledger: &Ledger, now: Timestamp) -> Self {
        let participants = quest
            .participants
            .iter()
            .map(|name| match ledger.get(name) {
                Some(c) => QuestParticipant {
                    name: c.name.clone(),
                    level: c.level,
                    class: c.class.clone(),
                    online: c.online,
                },
                None => QuestParticipant {
                    name: name.clone(),
                    level: 0,
                    class: String::new(),
                    online: false,
                },
            })
            .collect();
        Self {
            updated_at: now,
            phase: quest.phase,
            description: quest.description.clone(),
            participants,
            started_at: quest.started_at,
            next_quest_at: quest.next_quest_at,
            start: quest.start,
            goal: quest.goal,
            position: quest.current_cell(),
            path: quest.path.clone(),
            progress: quest.progress,
            outcome: quest.outcome,
            failure: quest.failure.clone(),
        }
    }
}

pub fn write_quest_status(path: &Path, quest: &Quest, ledger: &Ledger, now: Timestamp) -> Result<(), StoreError> {
    let status = QuestStatus::new(quest, ledger, now);
    let json = serde_json::to_vec_pretty(&status)?;
    write_file_locked(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::Character;
    use tempfile::TempDir;

    #[test]
    fn status_reflects_progress() {
        let mut ledger = Ledger::new();
        let mut mira = Character::new("Mira", "Bard", "h", 100, 0);
        mira.level = 30;
        mira.online = true;
        ledger.insert(mira).unwrap();

        let quest = Quest {
            phase: QuestPhase::Pathfinding,
            description: "find the well".into(),
            participants: vec!["Mira".into(), "Gone".into()],
            start: Some(Pos::new(0, 0)),
            goal: Some(Pos::new(2, 0)),
            path: vec![Pos::new(1, 0), Pos::new(2, 0)],
            progress: 1,
            ..Quest::idle(500)
        };

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quest.json");
        write_quest_status(&path, &quest, &ledger, 42).unwrap();
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["phase"], "pathfinding");
        assert_eq!(value["position"]["x"], 1);
        assert_eq!(value["participants"][0]["level"], 30);
        assert_eq!(value["participants"][1]["online"], false);
        assert_eq!(value["outcome"], "pending");
    }
}
