//! The grid, the random walk, and pairwise battles between characters that
//! share a cell.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::config::{BattleConfig, MapConfig};

use super::items::{offer, roll_item, roll_modifier, apply_modifier, Offer};
use super::ledger::Ledger;
use super::rng::Dice;
use super::types::{name_key, percent_of, Alignment, Character, Item, ItemSlot, Pos};

#[derive(Debug, Clone)]
pub struct Grid {
    pub width: u32,
    pub height: u32,
    blocked: HashSet<Pos>,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            blocked: HashSet::new(),
        }
    }

    pub fn from_config(cfg: &MapConfig) -> Self {
        let mut grid = Grid::new(cfg.width, cfg.height);
        for [x, y] in &cfg.blocked {
            grid.block(Pos::new(*x, *y));
        }
        grid
    }

    pub fn block(&mut self, pos: Pos) {
        self.blocked.insert(pos);
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    pub fn passable(&self, pos: Pos) -> bool {
        self.contains(pos) && !self.blocked.contains(&pos)
    }

    /// Moves by `(dx, dy)`, wrapping around the edges.
    pub fn wrap_step(&self, pos: Pos, dx: i64, dy: i64) -> Pos {
        let x = (i64::from(pos.x) + dx).rem_euclid(i64::from(self.width));
        let y = (i64::from(pos.y) + dy).rem_euclid(i64::from(self.height));
        Pos::new(x as u32, y as u32)
    }

    pub fn random_cell(&self, dice: &mut dyn Dice) -> Pos {
        Pos::new(
            dice.below(u64::from(self.width)) as u32,
            dice.below(u64::from(self.height)) as u32,
        )
    }

    /// A random passable cell, or `None` after a bounded number of misses.
    pub fn random_passable(&self, dice: &mut dyn Dice) -> Option<Pos> {
        (0..64)
            .map(|_| self.random_cell(dice))
            .find(|p| self.passable(*p))
    }

    /// Where a newcomer lands: a random passable cell, else the first open
    /// cell in row order, else anywhere.
    pub fn place(&self, dice: &mut dyn Dice) -> Pos {
        self.random_passable(dice)
            .or_else(|| {
                (0..self.height)
                    .flat_map(|y| (0..self.width).map(move |x| Pos::new(x, y)))
                    .find(|p| self.passable(*p))
            })
            .unwrap_or_else(|| self.random_cell(dice))
    }

    /// In-bounds 4-neighbours (no wrapping), passable or not.
    pub fn neighbours(&self, pos: Pos) -> impl Iterator<Item = Pos> + '_ {
        let (x, y) = (i64::from(pos.x), i64::from(pos.y));
        [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)]
            .into_iter()
            .filter(move |(nx, ny)| {
                *nx >= 0 && *ny >= 0 && *nx < i64::from(self.width) && *ny < i64::from(self.height)
            })
            .map(|(nx, ny)| Pos::new(nx as u32, ny as u32))
    }
}

/// Random-walks each named character by up to `step` per axis. A step onto
/// a blocked cell is not taken. Returns the names of characters whose cell
/// changed.
pub fn wander(
    ledger: &mut Ledger,
    names: &[String],
    grid: &Grid,
    step: u32,
    dice: &mut dyn Dice,
) -> BTreeSet<String> {
    let mut moved = BTreeSet::new();
    if step == 0 {
        return moved;
    }
    let step = i64::from(step);
    for name in names {
        let Some(character) = ledger.get_mut(name) else {
            continue;
        };
        let dx = dice.between(-step, step);
        let dy = dice.between(-step, step);
        let next = grid.wrap_step(character.pos, dx, dy);
        if next != character.pos && grid.passable(next) {
            character.pos = next;
            moved.insert(name_key(name));
        }
    }
    moved
}

/// Pairs of characters sharing a cell where at least one of the two moved
/// this tick. Cells are visited in position order, pairs in name order.
pub fn collisions(ledger: &Ledger, names: &[String], moved: &BTreeSet<String>) -> Vec<(String, String)> {
    let mut cells: BTreeMap<Pos, Vec<String>> = BTreeMap::new();
    for name in names {
        if let Some(character) = ledger.get(name) {
            cells.entry(character.pos).or_default().push(character.name.clone());
        }
    }
    let mut pairs = Vec::new();
    for (_, mut occupants) in cells {
        if occupants.len() < 2 {
            continue;
        }
        occupants.sort_by_key(|n| name_key(n));
        for i in 0..occupants.len() {
            for j in (i + 1)..occupants.len() {
                let (a, b) = (&occupants[i], &occupants[j]);
                if moved.contains(&name_key(a)) || moved.contains(&name_key(b)) {
                    pairs.push((a.clone(), b.clone()));
                }
            }
        }
    }
    pairs
}

/// `(level + item sum) * alignment pct / 100`.
pub fn battle_power(character: &Character, cfg: &BattleConfig) -> i64 {
    let pct = match character.alignment {
        Alignment::Good => i64::from(cfg.good_pct),
        Alignment::Evil => i64::from(cfg.evil_pct),
        Alignment::Neutral => 100,
    };
    percent_of(i64::from(character.level).saturating_add(character.item_sum()), pct)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loot {
    pub slot: ItemSlot,
    pub item: Item,
    pub outcome: Offer,
    /// Modifier rolled with the item and applied to every equipped slot.
    pub modifier: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encounter {
    pub winner: String,
    pub loser: String,
    pub winner_roll: i64,
    pub winner_power: i64,
    pub loser_roll: i64,
    pub loser_power: i64,
    /// Seconds added to the loser's TTL.
    pub penalty: i64,
    pub loot: Option<Loot>,
}

/// Resolves one encounter between `first` and `second` (already in name
/// order). Ties go to `first`.
pub fn battle(
    ledger: &mut Ledger,
    first: &str,
    second: &str,
    cfg: &BattleConfig,
    dice: &mut dyn Dice,
) -> Option<Encounter> {
    let (a_power, b_power) = {
        let a = ledger.get(first)?;
        let b = ledger.get(second)?;
        (battle_power(a, cfg), battle_power(b, cfg))
    };
    let a_roll = dice.between(0, a_power.max(0));
    let b_roll = dice.between(0, b_power.max(0));

    let (winner, loser, winner_roll, winner_power, loser_roll, loser_power) = if a_roll >= b_roll {
        (first, second, a_roll, a_power, b_roll, b_power)
    } else {
        (second, first, b_roll, b_power, a_roll, a_power)
    };

    let winner_level = ledger.get(winner)?.level;
    let loss_pct = i64::from(cfg.min_loss_pct).max(i64::from(winner_level / 7));
    let loser_ref = ledger.get_mut(loser)?;
    let penalty = percent_of(loser_ref.ttl.max(0), loss_pct);
    loser_ref.ttl = loser_ref.ttl.saturating_add(penalty);
    let loser_name = loser_ref.name.clone();

    let winner_ref = ledger.get_mut(winner)?;
    let loot = if dice.one_in(cfg.item_find_odds) {
        let (slot, item) = roll_item(winner_ref.level, dice);
        let outcome = offer(winner_ref, slot, item);
        let modifier = if dice.one_in(cfg.modifier_odds) {
            let pct = roll_modifier(cfg.max_modifier_pct, dice);
            apply_modifier(winner_ref, pct);
            Some(pct)
        } else {
            None
        };
        Some(Loot {
            slot,
            item,
            outcome,
            modifier,
        })
    } else {
        None
    };

    Some(Encounter {
        winner: winner_ref.name.clone(),
        loser: loser_name,
        winner_roll,
        winner_power,
        loser_roll,
        loser_power,
        penalty,
        loot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::rng::ScriptedDice;

    fn ledger_with(entries: &[(&str, u32, u32)]) -> Ledger {
        let mut ledger = Ledger::new();
        for (name, x, y) in entries {
            let mut c = Character::new(name, "c", "h", 1000, 0);
            c.pos = Pos::new(*x, *y);
            c.online = true;
            ledger.insert(c).unwrap();
        }
        ledger
    }

    #[test]
    fn walk_wraps_at_edges() {
        let grid = Grid::new(10, 10);
        assert_eq!(grid.wrap_step(Pos::new(0, 9), -1, 1), Pos::new(9, 0));
        assert_eq!(grid.wrap_step(Pos::new(5, 5), 0, 0), Pos::new(5, 5));
    }

    #[test]
    fn zero_step_never_moves() {
        let mut ledger = ledger_with(&[("a", 1, 1)]);
        let mut dice = ScriptedDice::constant(1);
        let moved = wander(&mut ledger, &["a".to_string()], &Grid::new(5, 5), 0, &mut dice);
        assert!(moved.is_empty());
    }

    #[test]
    fn walkers_stay_put_rather_than_enter_blocked_cells() {
        let mut ledger = ledger_with(&[("a", 1, 1)]);
        let mut grid = Grid::new(5, 5);
        grid.block(Pos::new(2, 1));
        // dx = -1 + 2, dy = -1 + 1
        let mut dice = ScriptedDice::new([2, 1]);
        let moved = wander(&mut ledger, &["a".to_string()], &grid, 1, &mut dice);
        assert!(moved.is_empty());
        assert_eq!(ledger.get("a").unwrap().pos, Pos::new(1, 1));

        let mut dice = ScriptedDice::new([1, 2]);
        wander(&mut ledger, &["a".to_string()], &grid, 1, &mut dice);
        assert_eq!(ledger.get("a").unwrap().pos, Pos::new(1, 2));
    }

    #[test]
    fn placement_skips_blocked_cells() {
        let mut grid = Grid::new(3, 2);
        grid.block(Pos::new(0, 0));
        grid.block(Pos::new(1, 0));
        // random rolls keep landing on (0, 0); the scan finds (2, 0)
        assert_eq!(grid.place(&mut ScriptedDice::constant(0)), Pos::new(2, 0));
        assert_eq!(grid.place(&mut ScriptedDice::new([1, 1])), Pos::new(1, 1));
    }

    #[test]
    fn only_moved_pairs_collide() {
        let ledger = ledger_with(&[("c", 2, 2), ("a", 2, 2), ("b", 2, 2), ("d", 4, 4)]);
        let names: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let moved: BTreeSet<String> = ["b".to_string()].into_iter().collect();
        assert_eq!(
            collisions(&ledger, &names, &moved),
            vec![
                ("a".to_string(), "b".to_string()),
                ("b".to_string(), "c".to_string())
            ]
        );
        assert!(collisions(&ledger, &names, &BTreeSet::new()).is_empty());
    }

    #[test]
    fn alignment_shifts_power() {
        let cfg = Config::default().battle;
        let mut c = Character::new("x", "y", "h", 1, 0);
        c.level = 50;
        c.items.insert(ItemSlot::Weapon, Item::new(50));
        c.alignment = Alignment::Good;
        assert_eq!(battle_power(&c, &cfg), 110);
        c.alignment = Alignment::Evil;
        assert_eq!(battle_power(&c, &cfg), 90);
    }

    #[test]
    fn tie_goes_to_first_name_and_loser_pays() {
        let mut ledger = ledger_with(&[("a", 0, 0), ("b", 0, 0)]);
        let mut cfg = Config::default().battle;
        cfg.item_find_odds = 0;
        let mut dice = ScriptedDice::constant(0);
        let enc = battle(&mut ledger, "a", "b", &cfg, &mut dice).unwrap();
        assert_eq!(enc.winner, "a");
        assert_eq!(enc.penalty, 70);
        assert_eq!(ledger.get("b").unwrap().ttl, 1070);
        assert!(enc.loot.is_none());
    }

    #[test]
    fn winner_loot_modifier_hits_all_slots() {
        let mut ledger = ledger_with(&[("a", 0, 0), ("b", 0, 0)]);
        {
            let a = ledger.get_mut("a").unwrap();
            a.level = 10;
            a.items.insert(ItemSlot::Ring, Item::new(5));
            a.items.insert(ItemSlot::Boots, Item::new(5));
        }
        let mut cfg = Config::default().battle;
        cfg.item_find_odds = 1;
        cfg.modifier_odds = 1;
        // a rolls 15 (b has no power to roll), find, weapon, 20/20, modifier 3, positive
        let mut dice = ScriptedDice::new([15, 0, 3, 20, 20, 0, 2, 0]);
        let enc = battle(&mut ledger, "a", "b", &cfg, &mut dice).unwrap();
        let loot = enc.loot.unwrap();
        assert_eq!(loot.slot, ItemSlot::Weapon);
        assert_eq!(loot.modifier, Some(3));
        let a = ledger.get("a").unwrap();
        assert_eq!(a.items.len(), 3);
        assert!(a.items.values().all(|i| i.modifier == 3));
    }
}
