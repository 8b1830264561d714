//! Challenges: one character against a random rival or the house champion.
//!
//! A challenge follows every character level-up (always from
//! `challenge_min_level`, one time in `low_level_challenge_odds` below it)
//! and, once per `duel_interval_secs`, one high-level character is picked
//! to fight when enough of the online characters are high level.

use log::debug;

use crate::config::AlignmentOdds;
use crate::logutil::escape_log;

use super::events::{EventKind, Report};
use super::format::duration;
use super::items::find_item;
use super::map::battle_power;
use super::types::{name_key, percent_of, Alignment, ItemSlot, Timestamp};
use super::{narrate_find, World};

pub fn odds_for(odds: &AlignmentOdds, alignment: Alignment) -> u64 {
    match alignment {
        Alignment::Good => odds.good,
        Alignment::Neutral => odds.neutral,
        Alignment::Evil => odds.evil,
    }
}

impl World {
    /// Pits `name` against a random other online character, or the
    /// champion, which is drawn like one more rival.
    pub fn challenge(&mut self, name: &str, now: Timestamp, report: &mut Report) {
        let mut field: Vec<Option<String>> = self
            .ledger
            .active_names()
            .into_iter()
            .filter(|n| name_key(n) != name_key(name))
            .map(Some)
            .collect();
        field.push(None);
        let pick = self.dice.below(field.len() as u64) as usize;
        let rival = field.swap_remove(pick);
        self.duel(name, rival.as_deref(), now, report);
    }

    /// Power of the strongest character plus one.
    fn champion_power(&self) -> i64 {
        let cfg = &self.config.battle;
        self.ledger
            .iter()
            .filter(|c| !c.archived)
            .map(|c| battle_power(c, cfg))
            .max()
            .unwrap_or(0)
            .saturating_add(1)
    }

    fn duel(&mut self, name: &str, rival: Option<&str>, now: Timestamp, report: &mut Report) {
        let cfg = self.config.battle.clone();
        let Some(challenger) = self.ledger.get(name) else {
            return;
        };
        let challenger_name = challenger.name.clone();
        let challenger_level = challenger.level;
        let alignment = challenger.alignment;
        let power = battle_power(challenger, &cfg);
        let (rival_name, rival_power, rival_level) = match rival {
            Some(r) => {
                let Some(opponent) = self.ledger.get(r) else {
                    return;
                };
                (opponent.name.clone(), battle_power(opponent, &cfg), Some(opponent.level))
            }
            None => (cfg.champion_name.clone(), self.champion_power(), None),
        };
        let roll = self.dice.between(0, power.max(0));
        let rival_roll = self.dice.between(0, rival_power.max(0));
        debug!(
            "Challenge {} [{}/{}] vs {} [{}/{}]",
            escape_log(&challenger_name),
            roll,
            power,
            escape_log(&rival_name),
            rival_roll,
            rival_power
        );

        if roll >= rival_roll {
            let pct = rival_level.map_or(20, |l| i64::from((l / 4).max(7)));
            let Some(challenger) = self.ledger.get_mut(name) else {
                return;
            };
            let gain = percent_of(challenger.ttl.max(0), pct);
            challenger.ttl -= gain;
            report.announce(
                now,
                &challenger_name,
                EventKind::Challenge,
                -gain,
                format!(
                    "{challenger_name} [{roll}/{power}] has challenged {rival_name} [{rival_roll}/{rival_power}] and won! {} is removed from {challenger_name}'s clock.",
                    duration(gain)
                ),
            );
            if rival.is_some() {
                self.spoils_of_victory(&challenger_name, &rival_name, challenger_level, alignment, now, report);
            }
        } else {
            let pct = rival_level.map_or(10, |l| i64::from((l / 7).max(7)));
            let Some(challenger) = self.ledger.get_mut(name) else {
                return;
            };
            let loss = percent_of(challenger.ttl.max(0), pct);
            challenger.ttl = challenger.ttl.saturating_add(loss);
            report.announce(
                now,
                &challenger_name,
                EventKind::Challenge,
                loss,
                format!(
                    "{challenger_name} [{roll}/{power}] has challenged {rival_name} [{rival_roll}/{rival_power}] and lost! {} is added to {challenger_name}'s clock.",
                    duration(loss)
                ),
            );
        }

        if self.dice.one_in(odds_for(&cfg.spoils_odds, alignment)) {
            report.say(format!(
                "While recovering from battle, {challenger_name} notices a glint in the mud. Upon investigation, they find an old lost item!"
            ));
            let Some(challenger) = self.ledger.get_mut(name) else {
                return;
            };
            let find = find_item(challenger, cfg.unique_item_odds, self.dice.as_mut());
            narrate_find(&challenger_name, &find, now, report);
        }
    }

    /// A critical strike on the loser, or failing that a chance to take the
    /// loser's better item in one slot.
    fn spoils_of_victory(
        &mut self,
        winner: &str,
        loser: &str,
        winner_level: u32,
        alignment: Alignment,
        now: Timestamp,
        report: &mut Report,
    ) {
        let cfg = &self.config.battle;
        if self.dice.one_in(odds_for(&cfg.critical_odds, alignment)) {
            let pct = self.dice.between(5, 25);
            let Some(victim) = self.ledger.get_mut(loser) else {
                return;
            };
            let penalty = percent_of(victim.ttl.max(0), pct);
            victim.ttl = victim.ttl.saturating_add(penalty);
            report.announce(
                now,
                loser,
                EventKind::CriticalStrike,
                penalty,
                format!(
                    "{winner} has dealt {loser} a Critical Strike! {} is added to {loser}'s clock.",
                    duration(penalty)
                ),
            );
        } else if winner_level > cfg.swap_min_level && self.dice.one_in(cfg.swap_odds) {
            let slot = ItemSlot::ALL[self.dice.below(ItemSlot::ALL.len() as u64) as usize];
            let rating = |who: &str| {
                self.ledger
                    .get(who)
                    .and_then(|c| c.items.get(&slot))
                    .map_or(0, |i| i.effective())
            };
            let (mine, theirs) = (rating(winner), rating(loser));
            if theirs <= mine || !self.ledger.swap_items(winner, loser, slot) {
                return;
            }
            let text = format!(
                "In the fierce battle, {loser} dropped their level {theirs} {slot}! {winner} picks it up, tossing their old level {mine} {slot} to {loser}.",
                slot = slot.name()
            );
            report.say(text.clone());
            report.record(now, winner, EventKind::ItemSwap, theirs, text.clone());
            report.record(now, loser, EventKind::ItemSwap, mine, text);
        }
    }

    /// Once per `duel_interval_secs`, a random high-level character
    /// challenges when they make up more than `duel_min_share_pct` of
    /// everyone online.
    pub(super) fn scheduled_duel(&mut self, now: Timestamp, report: &mut Report) {
        let cfg = &self.config.battle;
        if cfg.duel_interval_secs == 0 || now < self.next_duel_at {
            return;
        }
        self.next_duel_at = now.saturating_add(i64::try_from(cfg.duel_interval_secs).unwrap_or(i64::MAX));
        let online = self.ledger.active_names();
        let high: Vec<String> = online
            .iter()
            .filter(|n| self.ledger.get(n).is_some_and(|c| c.level >= cfg.duel_min_level))
            .cloned()
            .collect();
        if high.is_empty() || high.len() as u64 * 100 <= online.len() as u64 * u64::from(cfg.duel_min_share_pct) {
            return;
        }
        let pick = self.dice.below(high.len() as u64) as usize;
        debug!("Scheduled duel for {}", escape_log(&high[pick]));
        self.challenge(&high[pick], now, report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::rng::ScriptedDice;
    use crate::game::types::Item;

    fn arena(names: &[&str]) -> World {
        let mut config = Config::default();
        config.quest.interval_min_secs = 1_000_000;
        config.quest.interval_max_secs = 1_000_000;
        config.battle.duel_interval_secs = 3600;
        let mut world = World::new(&config, Vec::new(), None, Box::new(ScriptedDice::constant(0)), 0);
        for name in names {
            world.register(name, "Tester", "hash", name, "u@h", 0).unwrap();
            world.ledger_mut().get_mut(name).unwrap().ttl = 1000;
        }
        world
    }

    fn script(world: &mut World, values: impl IntoIterator<Item = u64>) {
        world.dice = Box::new(ScriptedDice::new(values));
    }

    #[test]
    fn beating_the_champion_takes_a_fifth() {
        let mut world = arena(&["mira"]);
        world.ledger_mut().get_mut("mira").unwrap().level = 10;
        // only the champion in the field; rolls 10 vs 0; no spoils
        script(&mut world, [0, 10, 0, 1]);
        let mut report = Report::default();
        world.challenge("mira", 0, &mut report);
        assert_eq!(world.ledger().get("mira").unwrap().ttl, 800);
        assert_eq!(report.records[0].kind, EventKind::Challenge);
        assert!(report.lines[0].contains("IdleBot [0/11]"));
    }

    #[test]
    fn losing_to_the_champion_costs_a_tenth() {
        let mut world = arena(&["mira"]);
        // power 0 rolls nothing; the champion rolls 1
        script(&mut world, [0, 1, 1]);
        let mut report = Report::default();
        world.challenge("mira", 0, &mut report);
        assert_eq!(world.ledger().get("mira").unwrap().ttl, 1100);
        assert_eq!(report.records[0].magnitude, 100);
    }

    #[test]
    fn good_winner_may_land_a_critical_strike() {
        let mut world = arena(&["a", "b"]);
        world.set_alignment("a", Alignment::Good).unwrap();
        world.ledger_mut().get_mut("a").unwrap().level = 5;
        // field [b, champion] picks b; a rolls 5 against b's zero power;
        // critical hits for 5 + 15 = 20%
        script(&mut world, [0, 5, 0, 15, 1]);
        let mut report = Report::default();
        world.challenge("a", 0, &mut report);
        assert_eq!(world.ledger().get("a").unwrap().ttl, 930);
        assert_eq!(world.ledger().get("b").unwrap().ttl, 1200);
        assert_eq!(report.records[1].kind, EventKind::CriticalStrike);
        assert_eq!(report.records[1].character, "b");
    }

    #[test]
    fn high_level_winner_takes_the_better_item() {
        let mut world = arena(&["a", "b"]);
        {
            let a = world.ledger_mut().get_mut("a").unwrap();
            a.level = 30;
            a.items.insert(ItemSlot::Weapon, Item::new(10));
        }
        world
            .ledger_mut()
            .get_mut("b")
            .unwrap()
            .items
            .insert(ItemSlot::Weapon, Item::new(20));
        // pick b; rolls 40 vs 0; critical misses; swap hits on the weapon; no spoils
        script(&mut world, [0, 40, 0, 1, 0, 3, 1]);
        let mut report = Report::default();
        world.challenge("a", 0, &mut report);
        assert_eq!(world.ledger().get("a").unwrap().items[&ItemSlot::Weapon], Item::new(20));
        assert_eq!(world.ledger().get("b").unwrap().items[&ItemSlot::Weapon], Item::new(10));
        assert!(report.records.iter().any(|r| r.kind == EventKind::ItemSwap));
    }

    #[test]
    fn spoils_can_turn_up_a_unique() {
        let mut world = arena(&["mira"]);
        world.ledger_mut().get_mut("mira").unwrap().level = 25;
        // champion; rolls 0 vs 26 loses; spoils; crown hits with spread 5
        script(&mut world, [0, 0, 26, 0, 0, 5]);
        let mut report = Report::default();
        world.challenge("mira", 0, &mut report);
        let mira = world.ledger().get("mira").unwrap();
        assert_eq!(mira.items[&ItemSlot::Helm], Item::unique(55, 'a'));
        assert!(report.records.iter().any(|r| r.kind == EventKind::UniqueItem));
    }

    #[test]
    fn scheduled_duel_needs_enough_veterans() {
        let mut world = arena(&["a", "b", "c", "d", "e", "f", "g"]);
        world.ledger_mut().get_mut("a").unwrap().level = 45;
        world.dice = Box::new(ScriptedDice::constant(0));
        let mut report = Report::default();
        world.scheduled_duel(3600, &mut report);
        assert!(report.is_empty());
        assert_eq!(world.next_duel_at, 7200);

        world.ledger_mut().get_mut("b").unwrap().level = 50;
        world.scheduled_duel(3601, &mut report);
        assert!(report.is_empty());
        world.scheduled_duel(7200, &mut report);
        assert_eq!(report.records[0].kind, EventKind::Challenge);
        assert_eq!(report.records[0].character, "a");
    }
}
