//! # Game World
//!
//! [`World`] owns every piece of mutable game state: the ledger, the quest,
//! the grid, pending netsplits and the dice. It is driven from exactly two
//! entry points, [`World::tick`] and the occurrence/command methods, and the
//! server never runs them concurrently.
//!
//! ## Tick order
//!
//! 1. expire netsplit grace entries
//! 2. leveling: burn elapsed time off every active character, then
//!    challenges for those who levelled
//! 3. quest engine
//! 4. random walk and collisions (questors excluded)
//! 5. world events (hand of god, team battle, calamity, godsend, evilness,
//!    goodness)
//! 6. the scheduled high-level duel
//!
//! Each step writes narrative and event records into the returned
//! [`Report`]; nothing here touches the network or the disk.

mod duel;
pub mod events;
pub mod format;
mod fortune;
pub mod items;
pub mod ledger;
pub mod leveling;
pub mod map;
pub mod pathfind;
pub mod penalty;
pub mod quest;
pub mod rng;
pub mod types;

use log::{debug, info, warn};
use std::collections::BTreeSet;

use crate::config::Config;
use crate::logutil::escape_log;

use events::{EventKind, Report};
use format::duration;
use items::{find_item, Find, Offer};
use ledger::{Ledger, LedgerError};
use leveling::{Climber, Curve};
use map::{Encounter, Grid};
use penalty::{NetsplitTracker, Occurrence, PenaltyKind, PenaltyTable};
use quest::Quest;
use rng::Dice;
use types::{name_key, Alignment, Character, Timestamp};

pub struct World {
    config: Config,
    ledger: Ledger,
    quest: Quest,
    grid: Grid,
    splits: NetsplitTracker,
    /// Characters online when the world was last saved (or dropped by a
    /// netsplit), waiting to be recognised by nick and userhost.
    awaiting_rejoin: BTreeSet<String>,
    /// Until this tick, characters awaiting rejoin still count as present
    /// for quest eligibility.
    resume_grace_until: u64,
    curve: Curve,
    ally_curve: Curve,
    penalties: PenaltyTable,
    dice: Box<dyn Dice>,
    tick: u64,
    last_tick_at: Timestamp,
    next_duel_at: Timestamp,
}

impl World {
    /// Builds the world from loaded records. Characters that were online at
    /// save time are set offline and recognised again when they reappear.
    pub fn new(
        config: &Config,
        characters: Vec<Character>,
        quest: Option<Quest>,
        mut dice: Box<dyn Dice>,
        now: Timestamp,
    ) -> Self {
        let (mut ledger, rejected) = Ledger::from_characters(characters);
        for dup in rejected {
            warn!("Ignoring duplicate character record '{}'", escape_log(&dup.name));
        }
        let grid = Grid::from_config(&config.map);
        let mut awaiting_rejoin = BTreeSet::new();
        for character in ledger.iter_mut() {
            if !grid.passable(character.pos) {
                warn!(
                    "{} was at {} off the open map; placing anew",
                    escape_log(&character.name),
                    character.pos
                );
                character.pos = grid.place(dice.as_mut());
            }
            if character.online {
                character.online = false;
                awaiting_rejoin.insert(character.key());
            }
        }
        let quest = quest.unwrap_or_else(|| {
            let wait = dice.between(
                config.quest.interval_min_secs as i64,
                config.quest.interval_max_secs as i64,
            );
            Quest::idle(now + wait)
        });
        Self {
            config: config.clone(),
            ledger,
            quest,
            grid,
            splits: NetsplitTracker::new(config.grace_ticks()),
            awaiting_rejoin,
            resume_grace_until: config.grace_ticks(),
            curve: Curve::character(&config.leveling),
            ally_curve: Curve::ally(&config.leveling),
            penalties: PenaltyTable::new(&config.penalties),
            dice,
            tick: 0,
            last_tick_at: now,
            next_duel_at: now.saturating_add(i64::try_from(config.battle.duel_interval_secs).unwrap_or(i64::MAX)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    pub fn quest(&self) -> &Quest {
        &self.quest
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn splits(&self) -> &NetsplitTracker {
        &self.splits
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn is_awaiting_rejoin(&self, name: &str) -> bool {
        self.awaiting_rejoin.contains(&name_key(name))
    }

    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    /// Runs one clock tick at wall-clock time `now`.
    pub fn tick(&mut self, now: Timestamp) -> Report {
        let mut report = Report::default();
        self.tick += 1;
        let dt = (now - self.last_tick_at).max(0);
        self.last_tick_at = now;

        self.expire_splits(now, &mut report);
        self.advance_levels(dt, now, &mut report);
        self.advance_quest(now, &mut report);
        self.move_and_collide(now, &mut report);
        self.world_events(now, &mut report);
        self.scheduled_duel(now, &mut report);
        report
    }

    fn expire_splits(&mut self, now: Timestamp, report: &mut Report) {
        for key in self.splits.expire(self.tick) {
            let Some(character) = self.ledger.get_mut(&key) else {
                continue;
            };
            if !character.online {
                continue;
            }
            let applied = self.penalties.apply(character, PenaltyKind::Dropped, 1);
            character.online = false;
            let name = character.name.clone();
            self.awaiting_rejoin.insert(key);
            info!("Netsplit grace expired for {}", escape_log(&name));
            report.announce(
                now,
                &name,
                EventKind::Dropped,
                applied,
                format!(
                    "{} did not return from the netsplit. Penalty of {} added to their timer.",
                    name,
                    duration(applied)
                ),
            );
            self.note_penalty(&name);
        }
    }

    fn advance_levels(&mut self, dt: i64, now: Timestamp, report: &mut Report) {
        if dt <= 0 {
            return;
        }
        let unlock = self.config.leveling.ally_unlock_level;
        let item_odds = self.config.leveling.levelup_item_odds;
        let unique_odds = self.config.battle.unique_item_odds;
        let mut levelled = Vec::new();
        for name in self.ledger.active_names() {
            let Some(character) = self.ledger.get_mut(&name) else {
                continue;
            };
            let ups = leveling::advance(character, dt, &self.curve, &self.ally_curve);
            if ups.is_empty() {
                continue;
            }
            report.level_ups += ups.len();
            for up in &ups {
                match up.who {
                    Climber::Character => report.announce(
                        now,
                        &name,
                        EventKind::LevelUp,
                        i64::from(up.level),
                        format!(
                            "{}, the {}, has attained level {}! Next level in {}.",
                            character.name,
                            character.class,
                            up.level,
                            duration(up.ttl)
                        ),
                    ),
                    Climber::Ally => report.announce(
                        now,
                        &name,
                        EventKind::AllyLevelUp,
                        i64::from(up.level),
                        format!(
                            "{}'s ally has attained level {}! Next ally level in {}.",
                            character.name,
                            up.level,
                            duration(up.ttl)
                        ),
                    ),
                }
            }
            if !ups.iter().any(|u| u.who == Climber::Character) {
                continue;
            }
            levelled.push(name.clone());

            if character.ally.is_none() && character.level >= unlock {
                let ally = leveling::new_ally(&self.ally_curve);
                character.ally = Some(ally);
                report.announce(
                    now,
                    &name,
                    EventKind::AllyGained,
                    0,
                    format!(
                        "{} has gained an ally! Their ally reaches level 1 in {}.",
                        character.name,
                        duration(ally.ttl)
                    ),
                );
            }

            if self.dice.one_in(item_odds) {
                let find = find_item(character, unique_odds, self.dice.as_mut());
                narrate_find(&character.name, &find, now, report);
            }
        }

        let battle = &self.config.battle;
        if !battle.challenge_on_level_up {
            return;
        }
        let (min_level, low_odds) = (battle.challenge_min_level, battle.low_level_challenge_odds);
        for name in levelled {
            let Some(level) = self.ledger.get(&name).map(|c| c.level) else {
                continue;
            };
            if level >= min_level || self.dice.one_in(low_odds) {
                self.challenge(&name, now, report);
            }
        }
    }

    fn move_and_collide(&mut self, now: Timestamp, report: &mut Report) {
        let walkers: Vec<String> = self
            .ledger
            .active_names()
            .into_iter()
            .filter(|n| !self.is_questor(n))
            .collect();
        if walkers.is_empty() {
            return;
        }
        let moved = map::wander(
            &mut self.ledger,
            &walkers,
            &self.grid,
            self.config.map.step,
            self.dice.as_mut(),
        );
        for (first, second) in map::collisions(&self.ledger, &walkers, &moved) {
            if let Some(encounter) = map::battle(
                &mut self.ledger,
                &first,
                &second,
                &self.config.battle,
                self.dice.as_mut(),
            ) {
                narrate_encounter(&encounter, now, report);
            }
        }
    }

    /// True while `name` takes part in a running quest.
    pub fn is_questor(&self, name: &str) -> bool {
        self.quest.is_active() && self.quest.has_participant(name)
    }

    /// A penalised questor dooms the whole party.
    fn note_penalty(&mut self, name: &str) {
        if self.is_questor(name) && self.quest.failure.is_none() {
            info!("Questor {} was penalized; quest will fail", escape_log(name));
            self.quest.failure = Some(format!("{name} was penalized"));
        }
    }

    /// Creates a character, logs it in and places it on the map.
    pub fn register(
        &mut self,
        name: &str,
        class: &str,
        password_hash: &str,
        nick: &str,
        userhost: &str,
        now: Timestamp,
    ) -> Result<Report, LedgerError> {
        if self.ledger.contains(name) {
            return Err(LedgerError::Duplicate(name.to_string()));
        }
        let mut character = Character::new(name, class, password_hash, self.curve.step_for(0), now);
        character.pos = self.grid.place(self.dice.as_mut());
        self.ledger.insert(character)?;
        let character = self.ledger.login(name, nick, userhost, now)?;
        let mut report = Report::default();
        report.announce(
            now,
            name,
            EventKind::Register,
            0,
            format!(
                "Welcome {}'s new player {}, the {}! Next level in {}.",
                nick,
                character.name,
                character.class,
                duration(character.ttl)
            ),
        );
        info!("Registered {} for {}", escape_log(name), escape_log(nick));
        Ok(report)
    }

    pub fn login(
        &mut self,
        name: &str,
        nick: &str,
        userhost: &str,
        now: Timestamp,
    ) -> Result<Report, LedgerError> {
        let character = self.ledger.login(name, nick, userhost, now)?;
        let key = character.key();
        let mut report = Report::default();
        report.say(format!(
            "{}, the level {} {}, is now online from nickname {}. Next level in {}.",
            character.name,
            character.level,
            character.class,
            nick,
            duration(character.ttl)
        ));
        self.awaiting_rejoin.remove(&key);
        self.splits.rejoin(&key);
        Ok(report)
    }

    /// Logs a character back in without a password when it was online before
    /// a restart or netsplit drop and `nick`/`userhost` still match.
    pub fn autologin(&mut self, nick: &str, userhost: &str, now: Timestamp) -> Report {
        let found = self.awaiting_rejoin.iter().find(|key| {
            self.ledger
                .get(key)
                .is_some_and(|c| !c.archived && c.nick.eq_ignore_ascii_case(nick) && c.userhost == userhost)
        });
        let Some(key) = found.cloned() else {
            return Report::default();
        };
        match self.login(&key, nick, userhost, now) {
            Ok(report) => report,
            Err(e) => {
                debug!("Automatic login for {} skipped: {}", escape_log(nick), e);
                self.awaiting_rejoin.remove(&key);
                Report::default()
            }
        }
    }

    /// Applies one transport occurrence for whichever character holds `nick`.
    pub fn apply_occurrence(&mut self, nick: &str, occurrence: Occurrence, now: Timestamp) -> Report {
        let mut report = Report::default();
        let Some(name) = self.ledger.name_for_nick(nick) else {
            return report;
        };
        match occurrence {
            Occurrence::NetsplitDeparture => {
                debug!("{} left in a netsplit", escape_log(&name));
                self.splits.depart(&name, self.tick);
                return report;
            }
            Occurrence::NetsplitRejoin => {
                if self.splits.rejoin(&name) {
                    debug!("{} returned within netsplit grace", escape_log(&name));
                }
                return report;
            }
            _ => {}
        }
        // Speaking or leaving means they are no longer split off.
        self.splits.rejoin(&name);

        let Some(kind) = occurrence.penalty_kind() else {
            return report;
        };
        let Some(character) = self.ledger.get_mut(&name) else {
            return report;
        };
        let applied = self.penalties.apply(character, kind, occurrence.units());
        if let Occurrence::NickChange { new_nick } = &occurrence {
            character.nick = new_nick.clone();
        }
        if occurrence.ends_session() {
            character.online = false;
        }
        let reply_nick = character.nick.clone();
        if applied > 0 {
            let text = format!(
                "Penalty of {} added to {}'s timer for {}.",
                duration(applied),
                name,
                kind.label()
            );
            report.record(now, &name, EventKind::Penalty, applied, text.clone());
            if !occurrence.ends_session() {
                report.tell(&reply_nick, text);
            }
            self.note_penalty(&name);
        }
        report
    }

    pub fn set_alignment(&mut self, name: &str, alignment: Alignment) -> Result<(), LedgerError> {
        let character = self
            .ledger
            .get_mut(name)
            .ok_or_else(|| LedgerError::NotFound(name.to_string()))?;
        character.alignment = alignment;
        Ok(())
    }

    pub fn archive(&mut self, name: &str, now: Timestamp) -> Result<Report, LedgerError> {
        self.ledger.archive(name)?;
        self.awaiting_rejoin.remove(&name_key(name));
        self.splits.rejoin(name);
        let mut report = Report::default();
        report.record(now, name, EventKind::Archive, 0, format!("{name} has been retired."));
        Ok(report)
    }

    /// "Top players" announcement lines.
    pub fn top_players(&self, count: usize) -> Vec<String> {
        let top = self.ledger.top(count);
        if top.is_empty() {
            return Vec::new();
        }
        let mut lines = vec!["Idle RPG Top Players:".to_string()];
        for (rank, c) in top.iter().enumerate() {
            lines.push(format!(
                "{}, the level {} {}, is #{}! Next level in {}.",
                c.name,
                c.level,
                c.class,
                rank + 1,
                duration(c.ttl)
            ));
        }
        lines
    }
}

fn narrate_find(name: &str, find: &Find, now: Timestamp, report: &mut Report) {
    match *find {
        Find::Unique { unique, item } => report.announce(
            now,
            name,
            EventKind::UniqueItem,
            i64::from(item.rating),
            format!(
                "The light of the gods shines down upon {}! They have found the level {} {}! {}",
                name, item.rating, unique.name, unique.flavor
            ),
        ),
        Find::Regular { slot, item, outcome } => {
            let text = match outcome {
                Offer::Equipped { previous } => format!(
                    "{} found a level {} {}! Their old {} was level {}, so it seems Luck is with them!",
                    name,
                    item.rating,
                    slot.name(),
                    slot.name(),
                    previous.map(|p| p.effective()).unwrap_or(0)
                ),
                Offer::Discarded { current } => format!(
                    "{} found a level {} {}. Their current {} is level {}, so it seems Luck is against them. They toss it away.",
                    name,
                    item.rating,
                    slot.name(),
                    slot.name(),
                    current.effective()
                ),
            };
            report.announce(now, name, EventKind::ItemFound, i64::from(item.rating), text);
        }
    }
}

fn narrate_encounter(encounter: &Encounter, now: Timestamp, report: &mut Report) {
    report.announce(
        now,
        &encounter.loser,
        EventKind::Battle,
        encounter.penalty,
        format!(
            "{} [{}/{}] has come upon {} [{}/{}] and taken them in combat! {}'s TTL is increased by {}.",
            encounter.winner,
            encounter.winner_roll,
            encounter.winner_power,
            encounter.loser,
            encounter.loser_roll,
            encounter.loser_power,
            encounter.loser,
            duration(encounter.penalty)
        ),
    );
    let Some(loot) = &encounter.loot else {
        return;
    };
    let winner = &encounter.winner;
    let text = match loot.outcome {
        Offer::Equipped { .. } => format!(
            "{} found a level {} {} on the battlefield and equips it!",
            winner,
            loot.item.rating,
            loot.slot.name()
        ),
        Offer::Discarded { current } => format!(
            "{} found a level {} {} on the battlefield, but keeps their level {} {}.",
            winner,
            loot.item.rating,
            loot.slot.name(),
            current.effective(),
            loot.slot.name()
        ),
    };
    report.announce(now, winner, EventKind::ItemFound, i64::from(loot.item.rating), text);
    if let Some(pct) = loot.modifier {
        let text = if pct >= 0 {
            format!("A blessing settles over {winner}'s gear: every item grows {pct}% stronger.")
        } else {
            format!(
                "A curse creeps over {winner}'s gear: every item grows {}% weaker.",
                -pct
            )
        };
        report.announce(now, winner, EventKind::Modifier, i64::from(pct), text);
    }
}
