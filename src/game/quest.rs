//! The quest state machine: idle → accumulating → pathfinding → resolving.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::logutil::escape_log;

use super::events::{EventKind, Report};
use super::format::{duration, name_list};
use super::map;
use super::pathfind::find_path;
use super::penalty::PenaltyKind;
use super::types::{name_key, percent_of, Pos, Timestamp};
use super::{narrate_encounter, World};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestPhase {
    #[default]
    Idle,
    Accumulating,
    Pathfinding,
    Resolving,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestOutcome {
    #[default]
    Pending,
    Success,
    Failure,
}

/// The singleton quest. After resolution the participants, goal and
/// outcome are kept so the status artifact can show the last quest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quest {
    pub phase: QuestPhase,
    pub description: String,
    pub started_at: Option<Timestamp>,
    pub next_quest_at: Timestamp,
    pub participants: Vec<String>,
    pub start: Option<Pos>,
    pub goal: Option<Pos>,
    pub path: Vec<Pos>,
    /// Waypoints already walked.
    pub progress: usize,
    pub outcome: QuestOutcome,
    /// Set when something has doomed the running quest.
    pub failure: Option<String>,
}

impl Quest {
    pub fn idle(next_quest_at: Timestamp) -> Self {
        Self {
            next_quest_at,
            ..Self::default()
        }
    }

    /// Participants are frozen and walking or awaiting resolution.
    pub fn is_active(&self) -> bool {
        matches!(self.phase, QuestPhase::Pathfinding | QuestPhase::Resolving)
    }

    pub fn has_participant(&self, name: &str) -> bool {
        let key = name_key(name);
        self.participants.iter().any(|p| name_key(p) == key)
    }

    /// The party's cell: the last waypoint reached, or the gathering cell.
    pub fn current_cell(&self) -> Option<Pos> {
        match self.progress {
            0 => self.start,
            n => self.path.get(n - 1).copied(),
        }
    }

    pub fn remaining_steps(&self) -> usize {
        self.path.len().saturating_sub(self.progress)
    }
}

impl World {
    pub(super) fn advance_quest(&mut self, now: Timestamp, report: &mut Report) {
        match self.quest.phase {
            QuestPhase::Idle => {
                if now >= self.quest.next_quest_at {
                    debug!("Quest timer elapsed; gathering participants");
                    self.quest.phase = QuestPhase::Accumulating;
                    report.quest_changed = true;
                    self.try_start_quest(now, report);
                }
            }
            QuestPhase::Accumulating => self.try_start_quest(now, report),
            QuestPhase::Pathfinding => self.walk_quest(now, report),
            QuestPhase::Resolving => self.resolve_quest(now, report),
        }
    }

    /// Meets the level and online-time requirements.
    fn qualifies(&self, name: &str) -> bool {
        let cfg = &self.config.quest;
        self.ledger
            .get(name)
            .is_some_and(|c| c.level >= cfg.min_level && c.idled >= cfg.min_login_secs)
    }

    /// Still counts as present for a running quest: online, or set aside by
    /// a restart while the resume grace lasts.
    fn present(&self, name: &str) -> bool {
        let Some(character) = self.ledger.get(name) else {
            return false;
        };
        if character.archived {
            return false;
        }
        character.online
            || (self.tick <= self.resume_grace_until && self.awaiting_rejoin.contains(&character.key()))
    }

    fn try_start_quest(&mut self, now: Timestamp, report: &mut Report) {
        let mut eligible: Vec<String> = self
            .ledger
            .active_names()
            .into_iter()
            .filter(|n| self.qualifies(n))
            .collect();
        if eligible.is_empty() {
            debug!("No characters eligible for a quest yet");
            return;
        }

        // Partial Fisher-Yates over the ledger order, then back to name order.
        let take = self.config.quest.max_participants.min(eligible.len());
        for i in 0..take {
            let j = i + self.dice.below((eligible.len() - i) as u64) as usize;
            eligible.swap(i, j);
        }
        eligible.truncate(take);
        eligible.sort_by_key(|n| name_key(n));

        let Some(start) = self.ledger.get(&eligible[0]).map(|c| c.pos) else {
            return;
        };
        let goal = match self.config.quest.goal {
            Some([x, y]) => Some(Pos::new(x, y)),
            None => self.grid.random_passable(self.dice.as_mut()),
        };
        let Some(goal) = goal else {
            debug!("No passable goal drawn; retrying next tick");
            return;
        };
        let Some(path) = find_path(&self.grid, start, goal) else {
            info!("Quest goal {} unreachable from {}; retrying next tick", goal, start);
            return;
        };

        assert_eq!(
            self.quest.phase,
            QuestPhase::Accumulating,
            "quest started outside the accumulating phase"
        );
        for name in &eligible {
            if let Some(character) = self.ledger.get_mut(name) {
                character.pos = start;
            }
        }

        let descriptions = &self.config.quest.descriptions;
        let description = if descriptions.is_empty() {
            "seek out the edge of the known realm".to_string()
        } else {
            descriptions[self.dice.below(descriptions.len() as u64) as usize].clone()
        };

        self.quest = Quest {
            phase: if path.is_empty() {
                QuestPhase::Resolving
            } else {
                QuestPhase::Pathfinding
            },
            description,
            started_at: Some(now),
            next_quest_at: self.quest.next_quest_at,
            participants: eligible,
            start: Some(start),
            goal: Some(goal),
            path,
            progress: 0,
            outcome: QuestOutcome::Pending,
            failure: None,
        };
        report.quest_changed = true;

        let text = format!(
            "{} have been chosen by the gods to {}. Participants must reach {}.",
            name_list(&self.quest.participants),
            self.quest.description,
            goal
        );
        info!(
            "Quest started with {} participant(s), {} steps to {}",
            self.quest.participants.len(),
            self.quest.path.len(),
            goal
        );
        report.say(text.clone());
        for name in &self.quest.participants {
            report.record(now, name, EventKind::QuestStart, self.quest.path.len() as i64, text.clone());
        }
    }

    fn walk_quest(&mut self, now: Timestamp, report: &mut Report) {
        if self.quest.failure.is_none() {
            if let Some(gone) = self.quest.participants.iter().find(|p| !self.present(p)) {
                self.quest.failure = Some(format!("{gone} abandoned the party"));
            }
        }
        if self.quest.failure.is_some() {
            self.quest.phase = QuestPhase::Resolving;
            report.quest_changed = true;
            return;
        }

        let Some(next) = self.quest.path.get(self.quest.progress).copied() else {
            self.quest.phase = QuestPhase::Resolving;
            report.quest_changed = true;
            return;
        };
        for name in &self.quest.participants {
            if let Some(character) = self.ledger.get_mut(name) {
                character.pos = next;
            }
        }
        self.quest.progress += 1;
        report.quest_changed = true;

        let bystanders: Vec<String> = self
            .ledger
            .iter()
            .filter(|c| c.is_active() && c.pos == next && !self.quest.has_participant(&c.name))
            .map(|c| c.name.clone())
            .collect();
        let participants = self.quest.participants.clone();
        for bystander in &bystanders {
            for questor in &participants {
                let (first, second) = if name_key(bystander) < name_key(questor) {
                    (bystander, questor)
                } else {
                    (questor, bystander)
                };
                if let Some(encounter) =
                    map::battle(&mut self.ledger, first, second, &self.config.battle, self.dice.as_mut())
                {
                    narrate_encounter(&encounter, now, report);
                }
            }
        }

        if self.quest.remaining_steps() == 0 {
            report.say(format!(
                "{} have reached {} and await the judgement of the gods.",
                name_list(&self.quest.participants),
                next
            ));
            self.quest.phase = QuestPhase::Resolving;
        }
    }

    fn resolve_quest(&mut self, now: Timestamp, report: &mut Report) {
        let failed = self.quest.failure.is_some() || self.dice.percent(self.config.quest.failure_pct);
        let names = name_list(&self.quest.participants);
        let participants = self.quest.participants.clone();

        if failed {
            let reason = self
                .quest
                .failure
                .clone()
                .unwrap_or_else(|| "the gods frowned upon them".to_string());
            report.say(format!(
                "{names} have failed their quest because {reason}! Each is penalized for their failure."
            ));
            for name in &participants {
                let Some(character) = self.ledger.get_mut(name) else {
                    continue;
                };
                let applied = self.penalties.apply(character, PenaltyKind::Quest, 1);
                report.record(
                    now,
                    name,
                    EventKind::QuestFailure,
                    applied,
                    format!("{name} failed a quest; {} added to their timer.", duration(applied)),
                );
            }
            info!("Quest failed: {}", escape_log(&reason));
            self.quest.outcome = QuestOutcome::Failure;
        } else {
            let pct = i64::from(self.config.quest.reward_pct);
            report.say(format!(
                "{names} have completed their journey! {pct}% of their burden is eliminated."
            ));
            for name in &participants {
                let Some(character) = self.ledger.get_mut(name) else {
                    continue;
                };
                let cut = percent_of(character.ttl.max(0), pct);
                character.ttl -= cut;
                report.record(
                    now,
                    name,
                    EventKind::QuestSuccess,
                    -cut,
                    format!(
                        "{name} completed a quest; next level in {}.",
                        duration(character.ttl)
                    ),
                );
            }
            info!("Quest completed by {}", escape_log(&names));
            self.quest.outcome = QuestOutcome::Success;
        }

        let wait = self.dice.between(
            self.config.quest.interval_min_secs as i64,
            self.config.quest.interval_max_secs as i64,
        );
        self.quest.phase = QuestPhase::Idle;
        self.quest.next_quest_at = now + wait;
        report.quest_changed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::penalty::Occurrence;
    use crate::game::rng::ScriptedDice;

    fn quest_world() -> World {
        let mut config = Config::default();
        config.game.tick_secs = 10;
        config.map.width = 10;
        config.map.height = 10;
        config.map.step = 0;
        config.leveling.levelup_item_odds = 0;
        config.events.hand_of_god_days = 0;
        config.events.calamity_days = 0;
        config.events.godsend_days = 0;
        config.events.team_battle_days = 0;
        config.events.evilness_days = 0;
        config.events.goodness_days = 0;
        config.battle.challenge_on_level_up = false;
        config.battle.duel_interval_secs = 0;
        config.quest.interval_min_secs = 100;
        config.quest.interval_max_secs = 100;
        config.quest.min_level = 0;
        config.quest.min_login_secs = 0;
        config.quest.failure_pct = 0;
        config.quest.goal = Some([3, 0]);
        config.penalties.limit = None;
        let mut world = World::new(&config, Vec::new(), None, Box::new(ScriptedDice::constant(0)), 0);
        for name in ["b", "a"] {
            world.register(name, "Tester", "hash", name, "u@h", 0).unwrap();
        }
        world
    }

    #[test]
    fn waits_for_the_timer() {
        let mut world = quest_world();
        world.tick(50);
        assert_eq!(world.quest().phase, QuestPhase::Idle);
    }

    #[test]
    fn walks_to_goal_and_rewards_every_participant() {
        let mut world = quest_world();
        let report = world.tick(100);
        assert_eq!(world.quest().phase, QuestPhase::Pathfinding);
        assert_eq!(world.quest().participants, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(world.quest().path.len(), 3);
        assert!(report.lines[0].starts_with("a and b have been chosen by the gods to"));
        assert!(world.is_questor("A"));

        world.tick(110);
        world.tick(120);
        world.tick(130);
        assert_eq!(world.quest().phase, QuestPhase::Resolving);
        assert_eq!(world.ledger().get("a").unwrap().pos, Pos::new(3, 0));

        let report = world.tick(140);
        assert_eq!(world.quest().phase, QuestPhase::Idle);
        assert_eq!(world.quest().outcome, QuestOutcome::Success);
        assert_eq!(world.quest().next_quest_at, 240);
        assert!(!world.is_questor("a"));
        // 600 - 140 = 460, less a quarter
        assert_eq!(world.ledger().get("a").unwrap().ttl, 345);
        assert_eq!(world.ledger().get("b").unwrap().ttl, 345);
        assert_eq!(
            report
                .records
                .iter()
                .filter(|r| r.kind == EventKind::QuestSuccess)
                .count(),
            2
        );
    }

    #[test]
    fn penalised_questor_fails_the_whole_party() {
        let mut world = quest_world();
        world.tick(100);
        world.apply_occurrence("a", Occurrence::Message { len: 5 }, 105);
        assert!(world.quest().failure.is_some());

        world.tick(110);
        assert_eq!(world.quest().phase, QuestPhase::Resolving);
        world.tick(120);
        assert_eq!(world.quest().outcome, QuestOutcome::Failure);
        // 600 - 120 + 5 message + 15 quest
        assert_eq!(world.ledger().get("a").unwrap().ttl, 500);
        assert_eq!(world.ledger().get("b").unwrap().ttl, 495);
    }

    #[test]
    fn unlucky_roll_fails_and_penalises_everyone() {
        let mut world = quest_world();
        world.config.quest.failure_pct = 50;
        for t in [100, 110, 120, 130] {
            world.tick(t);
        }
        assert_eq!(world.quest().phase, QuestPhase::Resolving);
        assert!(world.quest().failure.is_none());

        // constant zero dice roll under any non-zero failure chance
        let report = world.tick(140);
        assert_eq!(world.quest().outcome, QuestOutcome::Failure);
        assert!(report.lines[0].contains("because the gods frowned upon them"));
        let failures: Vec<_> = report
            .records
            .iter()
            .filter(|r| r.kind == EventKind::QuestFailure)
            .collect();
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|r| r.magnitude == 15));
        for name in ["a", "b"] {
            let questor = world.ledger().get(name).unwrap();
            assert_eq!(questor.penalties.quest, 15);
            assert_eq!(questor.ttl, 600 - 140 + 15);
        }
    }

    #[test]
    fn bystander_on_the_path_is_fought() {
        let mut world = quest_world();
        world.tick(100);
        world.register("c", "Tester", "hash", "c", "u@h", 100).unwrap();
        world.ledger_mut().get_mut("c").unwrap().pos = Pos::new(1, 0);
        world.config.battle.item_find_odds = 0;

        let report = world.tick(110);
        assert_eq!(world.quest().progress, 1);
        let battles: Vec<_> = report
            .records
            .iter()
            .filter(|r| r.kind == EventKind::Battle)
            .collect();
        // every roll is zero, so each questor wins on the name-order tie
        assert_eq!(battles.len(), 2);
        assert!(battles.iter().all(|r| r.character == "c"));
        // 590 plus 7% twice
        assert_eq!(world.ledger().get("c").unwrap().ttl, 675);
        assert_eq!(world.ledger().get("a").unwrap().ttl, 600 - 110);
    }

    #[test]
    fn departed_participant_forces_failure() {
        let mut world = quest_world();
        world.tick(100);
        world.apply_occurrence("b", Occurrence::Quit, 101);
        world.tick(110);
        assert_eq!(
            world.quest().failure.as_deref(),
            Some("b was penalized")
        );
        world.tick(120);
        assert_eq!(world.quest().outcome, QuestOutcome::Failure);
    }

    #[test]
    fn no_eligible_characters_keeps_accumulating() {
        let mut world = quest_world();
        world.config.quest.min_level = 50;
        world.tick(100);
        world.tick(110);
        assert_eq!(world.quest().phase, QuestPhase::Accumulating);
    }

    #[test]
    fn blocked_goal_retries() {
        let mut world = quest_world();
        world.grid.block(Pos::new(3, 0));
        world.tick(100);
        assert_eq!(world.quest().phase, QuestPhase::Accumulating);
    }

    #[test]
    fn quest_state_survives_json() {
        let mut world = quest_world();
        world.tick(100);
        let json = serde_json::to_string(world.quest()).unwrap();
        let back: Quest = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, world.quest());
        assert!(json.contains("\"pathfinding\""));
    }
}
