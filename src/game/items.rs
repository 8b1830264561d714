//! Item finds, the unique items, and buff/debuff modifiers.

use super::rng::Dice;
use super::types::{Character, Item, ItemSlot};

/// Draws an item for a character of `level`: a random slot and a rating
/// centred on the level (mean of two uniform rolls over `[0, 2*level]`).
pub fn roll_item(level: u32, dice: &mut dyn Dice) -> (ItemSlot, Item) {
    let slot = ItemSlot::ALL[dice.below(ItemSlot::ALL.len() as u64) as usize];
    let span = u64::from(level) * 2 + 1;
    let rating = (dice.below(span) + dice.below(span)) / 2;
    (slot, Item::new(rating as u32))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// The item was equipped, replacing `previous` if any.
    Equipped { previous: Option<Item> },
    /// The current item is at least as good.
    Discarded { current: Item },
}

/// Equips `item` only if it beats what the slot holds.
pub fn offer(character: &mut Character, slot: ItemSlot, item: Item) -> Offer {
    match character.items.get(&slot).copied() {
        Some(current) if current.effective() >= item.effective() => Offer::Discarded { current },
        previous => {
            character.items.insert(slot, item);
            Offer::Equipped { previous }
        }
    }
}

/// A named item that only characters of `min_level` or more can find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueItem {
    pub tag: char,
    pub min_level: u32,
    pub base: u32,
    /// The rating is `base` plus up to this much.
    pub spread: u32,
    pub slot: ItemSlot,
    pub name: &'static str,
    pub flavor: &'static str,
}

/// Rolled in order, so later entries are rarer.
pub static UNIQUE_ITEMS: [UniqueItem; 8] = [
    UniqueItem {
        tag: 'a',
        min_level: 25,
        base: 50,
        spread: 25,
        slot: ItemSlot::Helm,
        name: "Mattt's Omniscience Grand Crown",
        flavor: "Their enemies fall before them as they anticipate every move.",
    },
    UniqueItem {
        tag: 'b',
        min_level: 25,
        base: 50,
        spread: 25,
        slot: ItemSlot::Ring,
        name: "Juliet's Glorious Ring of Sparkliness",
        flavor: "Their enemies are blinded by both its glory and their greed.",
    },
    UniqueItem {
        tag: 'c',
        min_level: 30,
        base: 75,
        spread: 25,
        slot: ItemSlot::Tunic,
        name: "Res0's Protectorate Plate Mail",
        flavor: "Their enemies cower in fear as their attacks have no effect.",
    },
    UniqueItem {
        tag: 'd',
        min_level: 35,
        base: 100,
        spread: 25,
        slot: ItemSlot::Amulet,
        name: "Dwyn's Storm Magic Amulet",
        flavor: "Their enemies are swept away by an elemental fury before the war has even begun.",
    },
    UniqueItem {
        tag: 'e',
        min_level: 40,
        base: 150,
        spread: 25,
        slot: ItemSlot::Weapon,
        name: "Jotun's Fury Colossal Sword",
        flavor: "Their enemies' hatred is brought to a quick end with one crushing blow.",
    },
    UniqueItem {
        tag: 'f',
        min_level: 45,
        base: 175,
        spread: 26,
        slot: ItemSlot::Weapon,
        name: "Drdink's Cane of Blind Rage",
        flavor: "Their enemies are tossed aside by wild swings that hit everything nearby.",
    },
    UniqueItem {
        tag: 'g',
        min_level: 48,
        base: 250,
        spread: 51,
        slot: ItemSlot::Boots,
        name: "Mrquick's Magical Boots of Swiftness",
        flavor: "Their enemies are left choking on dust as they run away very, very quickly.",
    },
    UniqueItem {
        tag: 'h',
        min_level: 25,
        base: 300,
        spread: 51,
        slot: ItemSlot::Weapon,
        name: "Jeff's Cluehammer of Doom",
        flavor: "Their enemies are left with a sudden and intense clarity of mind... even as it is taken from them.",
    },
];

pub fn unique_item(tag: char) -> Option<&'static UniqueItem> {
    UNIQUE_ITEMS.iter().find(|u| u.tag == tag)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Find {
    /// A unique item, always equipped.
    Unique { unique: &'static UniqueItem, item: Item },
    Regular { slot: ItemSlot, item: Item, outcome: Offer },
}

/// One item find. Each unique item the character is high enough for gets a
/// one-in-`unique_odds` roll first; otherwise a regular item is offered.
pub fn find_item(character: &mut Character, unique_odds: u64, dice: &mut dyn Dice) -> Find {
    for unique in &UNIQUE_ITEMS {
        if character.level >= unique.min_level && dice.one_in(unique_odds) {
            let rating = unique.base + dice.between(0, i64::from(unique.spread)) as u32;
            let item = Item::unique(rating, unique.tag);
            character.items.insert(unique.slot, item);
            return Find::Unique { unique, item };
        }
    }
    let (slot, item) = roll_item(character.level, dice);
    let outcome = offer(character, slot, item);
    Find::Regular { slot, item, outcome }
}

/// A signed modifier of 1..=`max_pct` percent, positive or negative with
/// equal chance.
pub fn roll_modifier(max_pct: u32, dice: &mut dyn Dice) -> i32 {
    let magnitude = dice.between(1, i64::from(max_pct.max(1))) as i32;
    if dice.below(2) == 0 {
        magnitude
    } else {
        -magnitude
    }
}

/// Applies `pct` to every equipped slot. Returns the number of slots touched.
pub fn apply_modifier(character: &mut Character, pct: i32) -> usize {
    for item in character.items.values_mut() {
        item.adjust(pct);
    }
    character.items.len()
}
