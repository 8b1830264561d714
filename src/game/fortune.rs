//! Random acts of the gods: hand of god, calamities and godsends, team
//! battles, and the deeds of the evil and the good.

use log::debug;

use super::events::{EventKind, Report};
use super::format::duration;
use super::map::battle_power;
use super::types::{percent_of, Alignment, ItemSlot, Timestamp};
use super::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fate {
    HandOfGod,
    TeamBattle,
    Calamity,
    Godsend,
    Evilness,
    Goodness,
}

impl World {
    /// Rolls each world event once per tick. An event fires with probability
    /// `weight / (days * ticks per day)`, where the weight is the number of
    /// online characters (evil ones for evilness, good ones for goodness),
    /// so each of them meets it about once in `days` days.
    pub(super) fn world_events(&mut self, now: Timestamp, report: &mut Report) {
        let online = self.ledger.active_count() as u64;
        if online == 0 {
            return;
        }
        let (good, evil) = (
            self.count_online(Alignment::Good),
            self.count_online(Alignment::Evil),
        );
        let ticks_per_day = (86_400 / self.config.game.tick_secs.max(1)).max(1);
        let events = &self.config.events;
        let schedule = [
            (Fate::HandOfGod, events.hand_of_god_days, online),
            (Fate::TeamBattle, events.team_battle_days, online),
            (Fate::Calamity, events.calamity_days, online),
            (Fate::Godsend, events.godsend_days, online),
            (Fate::Evilness, events.evilness_days, evil),
            (Fate::Goodness, events.goodness_days, good),
        ];
        for (fate, days, weight) in schedule {
            if days == 0 || weight == 0 {
                continue;
            }
            if self.dice.below(days.saturating_mul(ticks_per_day)) >= weight {
                continue;
            }
            debug!("World event {:?} fires", fate);
            match fate {
                Fate::TeamBattle => self.team_battle(now, report),
                Fate::Evilness => self.evilness(now, report),
                Fate::Goodness => self.goodness(now, report),
                Fate::HandOfGod | Fate::Calamity | Fate::Godsend => {
                    let Some(name) = self.pick_online() else {
                        return;
                    };
                    match fate {
                        Fate::HandOfGod => self.hand_of_god(&name, now, report),
                        Fate::Calamity => self.calamity(&name, now, report),
                        _ => self.godsend(&name, now, report),
                    }
                }
            }
        }
    }

    fn count_online(&self, alignment: Alignment) -> u64 {
        self.ledger
            .iter()
            .filter(|c| c.is_active() && c.alignment == alignment)
            .count() as u64
    }

    fn online_with(&self, alignment: Alignment) -> Vec<String> {
        self.ledger
            .iter()
            .filter(|c| c.is_active() && c.alignment == alignment)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Removes `count` random names from `pool`.
    fn draw(&mut self, pool: &mut Vec<String>, count: usize) -> Vec<String> {
        let mut drawn = Vec::with_capacity(count);
        while drawn.len() < count && !pool.is_empty() {
            let idx = self.dice.below(pool.len() as u64) as usize;
            drawn.push(pool.remove(idx));
        }
        drawn
    }

    /// Three random online characters fight three others. The first team
    /// wins or loses a fifth of the smallest TTL among all six; the second
    /// team is unaffected.
    pub fn team_battle(&mut self, now: Timestamp, report: &mut Report) {
        let mut pool = self.ledger.active_names();
        if pool.len() < 6 {
            return;
        }
        let six = self.draw(&mut pool, 6);
        let cfg = &self.config.battle;
        let sum = |names: &[String]| -> i64 {
            names
                .iter()
                .filter_map(|n| self.ledger.get(n))
                .map(|c| battle_power(c, cfg))
                .fold(0, i64::saturating_add)
        };
        let (team_a, team_b) = (sum(&six[..3]), sum(&six[3..]));
        let smallest = six
            .iter()
            .filter_map(|n| self.ledger.get(n))
            .map(|c| c.ttl.max(0))
            .min()
            .unwrap_or(0);
        let gain = percent_of(smallest, 20);
        let roll_a = self.dice.between(0, team_a.max(0));
        let roll_b = self.dice.between(0, team_b.max(0));
        let won = roll_a >= roll_b;
        for name in &six[..3] {
            if let Some(character) = self.ledger.get_mut(name) {
                if won {
                    character.ttl -= gain;
                } else {
                    character.ttl = character.ttl.saturating_add(gain);
                }
            }
        }
        let text = format!(
            "{}, {}, and {} [{}/{}] have team battled {}, {}, and {} [{}/{}] and {}! {} is {} their clocks.",
            six[0],
            six[1],
            six[2],
            roll_a,
            team_a,
            six[3],
            six[4],
            six[5],
            roll_b,
            team_b,
            if won { "won" } else { "lost" },
            duration(gain),
            if won { "removed from" } else { "added to" }
        );
        report.say(text.clone());
        let magnitude = if won { -gain } else { gain };
        for name in &six[..3] {
            report.record(now, name, EventKind::TeamBattle, magnitude, text.clone());
        }
    }

    /// A random evil character either tries to steal a better item from a
    /// good one (half the time) or is forsaken by their god for 1-6% of
    /// their TTL.
    pub fn evilness(&mut self, now: Timestamp, report: &mut Report) {
        let mut evil = self.online_with(Alignment::Evil);
        let Some(name) = self.draw(&mut evil, 1).pop() else {
            return;
        };
        if self.dice.one_in(2) {
            let mut good = self.online_with(Alignment::Good);
            let Some(target) = self.draw(&mut good, 1).pop() else {
                return;
            };
            let slot = ItemSlot::ALL[self.dice.below(ItemSlot::ALL.len() as u64) as usize];
            let rating = |who: &str| {
                self.ledger
                    .get(who)
                    .and_then(|c| c.items.get(&slot))
                    .map_or(0, |i| i.effective())
            };
            let (mine, theirs) = (rating(&name), rating(&target));
            if mine < theirs && self.ledger.swap_items(&name, &target, slot) {
                let text = format!(
                    "{name} stole {target}'s level {theirs} {slot} while they were sleeping! {name} leaves their old level {mine} {slot} behind, which {target} then takes.",
                    slot = slot.name()
                );
                report.say(text.clone());
                report.record(now, &name, EventKind::Evilness, theirs, text.clone());
                report.record(now, &target, EventKind::Evilness, mine, text);
            } else if let Some(thief) = self.ledger.get(&name) {
                report.tell(
                    &thief.nick,
                    format!(
                        "You made to steal {target}'s {}, but realized it was lower level than your own. You creep back into the shadows.",
                        slot.name()
                    ),
                );
            }
            return;
        }
        let pct = self.dice.between(1, 6);
        let Some(character) = self.ledger.get_mut(&name) else {
            return;
        };
        let amount = percent_of(character.ttl.max(0), pct);
        character.ttl = character.ttl.saturating_add(amount);
        report.announce(
            now,
            &name,
            EventKind::Evilness,
            amount,
            format!(
                "{name} is forsaken by their evil god. {} is added to their clock.",
                duration(amount)
            ),
        );
    }

    /// Two random good characters pray together and each lose 5-13% of
    /// their TTL.
    pub fn goodness(&mut self, now: Timestamp, report: &mut Report) {
        let mut good = self.online_with(Alignment::Good);
        if good.len() < 2 {
            return;
        }
        let pair = self.draw(&mut good, 2);
        let pct = self.dice.between(5, 13);
        report.say(format!(
            "{} and {} have not let the iniquities of evil people poison them. Together have they prayed to their god, and light now shines down upon them. {}% of their time is removed from their clocks.",
            pair[0], pair[1], pct
        ));
        for name in &pair {
            let Some(character) = self.ledger.get_mut(name) else {
                continue;
            };
            let amount = percent_of(character.ttl.max(0), pct);
            character.ttl -= amount;
            report.record(
                now,
                name,
                EventKind::Goodness,
                -amount,
                format!("{name} prayed with the faithful and gained {}.", duration(amount)),
            );
        }
    }

    fn pick_online(&mut self) -> Option<String> {
        let names = self.ledger.active_names();
        if names.is_empty() {
            return None;
        }
        let idx = self.dice.below(names.len() as u64) as usize;
        names.into_iter().nth(idx)
    }

    /// Moves `name` 5-75% of its TTL toward (80%) or away from its next level.
    pub fn hand_of_god(&mut self, name: &str, now: Timestamp, report: &mut Report) {
        let pct = self.dice.between(5, 75);
        let blessed = self.dice.percent(80);
        let Some(character) = self.ledger.get_mut(name) else {
            return;
        };
        let change = percent_of(character.ttl.max(0), pct);
        let next = character.level + 1;
        let (magnitude, text) = if blessed {
            character.ttl -= change;
            (
                -change,
                format!(
                    "Verily I say unto thee, the Heavens have burst forth, and the blessed hand of God carried {} {} toward level {}.",
                    character.name,
                    duration(change),
                    next
                ),
            )
        } else {
            character.ttl = character.ttl.saturating_add(change);
            (
                change,
                format!(
                    "Thereupon He stretched out His little finger among them and consumed {} with fire, slowing the heathen {} from level {}.",
                    character.name,
                    duration(change),
                    next
                ),
            )
        };
        report.announce(now, name, EventKind::HandOfGod, magnitude, text);
    }

    fn calamity(&mut self, name: &str, now: Timestamp, report: &mut Report) {
        self.misfortune(name, now, report, false);
    }

    fn godsend(&mut self, name: &str, now: Timestamp, report: &mut Report) {
        self.misfortune(name, now, report, true);
    }

    /// One in ten strikes an equipped item by 10%; otherwise 5-12% of the
    /// TTL moves in the fortunate or unfortunate direction.
    fn misfortune(&mut self, name: &str, now: Timestamp, report: &mut Report, good: bool) {
        let kind = if good {
            EventKind::Godsend
        } else {
            EventKind::Calamity
        };
        if self.dice.one_in(10) {
            let slot = ItemSlot::ALL[self.dice.below(ItemSlot::ALL.len() as u64) as usize];
            let Some(character) = self.ledger.get_mut(name) else {
                return;
            };
            if let Some(item) = character.items.get_mut(&slot) {
                let pct = if good { 10 } else { -10 };
                item.adjust(pct);
                let text = if good {
                    format!(
                        "{}'s {} was blessed by a wandering priest! It gains 10% of its effectiveness.",
                        character.name,
                        slot.name()
                    )
                } else {
                    format!(
                        "{}'s {} was struck by a falling star! It loses 10% of its effectiveness.",
                        character.name,
                        slot.name()
                    )
                };
                report.announce(now, name, kind, i64::from(pct), text);
                return;
            }
        }

        let pct = self.dice.between(5, 12);
        let Some(character) = self.ledger.get_mut(name) else {
            return;
        };
        let change = percent_of(character.ttl.max(0), pct);
        let text = if good {
            character.ttl -= change;
            format!(
                "{} found a shortcut through the Weeping Woods! This wondrous godsend has accelerated them {} towards level {}.",
                character.name,
                duration(change),
                character.level + 1
            )
        } else {
            character.ttl = character.ttl.saturating_add(change);
            format!(
                "{} was lost in a sudden fog for hours. This terrible calamity has slowed them {} from level {}.",
                character.name,
                duration(change),
                character.level + 1
            )
        };
        let magnitude = if good { -change } else { change };
        report.announce(now, name, kind, magnitude, text);
    }
}
