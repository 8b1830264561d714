//! Core record types: characters, items, allies, positions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unix timestamp in whole seconds.
pub type Timestamp = i64;

/// `value * pct / 100`, computed wide and saturated back into `i64`.
pub fn percent_of(value: i64, pct: i64) -> i64 {
    let wide = i128::from(value) * i128::from(pct) / 100;
    i64::try_from(wide).unwrap_or(if wide < 0 { i64::MIN } else { i64::MAX })
}

/// Case-folded lookup key for a character name.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Good,
    #[default]
    Neutral,
    Evil,
}

impl Alignment {
    pub fn code(self) -> &'static str {
        match self {
            Alignment::Good => "g",
            Alignment::Neutral => "n",
            Alignment::Evil => "e",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "g" => Some(Alignment::Good),
            "n" => Some(Alignment::Neutral),
            "e" => Some(Alignment::Evil),
            _ => None,
        }
    }

    /// Accepts the full word in any case.
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "good" => Some(Alignment::Good),
            "neutral" => Some(Alignment::Neutral),
            "evil" => Some(Alignment::Evil),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Alignment::Good => "good",
            Alignment::Neutral => "neutral",
            Alignment::Evil => "evil",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSlot {
    Ring,
    Amulet,
    Charm,
    Weapon,
    Helm,
    Tunic,
    Gloves,
    Leggings,
    Shield,
    Boots,
}

impl ItemSlot {
    pub const ALL: [ItemSlot; 10] = [
        ItemSlot::Ring,
        ItemSlot::Amulet,
        ItemSlot::Charm,
        ItemSlot::Weapon,
        ItemSlot::Helm,
        ItemSlot::Tunic,
        ItemSlot::Gloves,
        ItemSlot::Leggings,
        ItemSlot::Shield,
        ItemSlot::Boots,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ItemSlot::Ring => "ring",
            ItemSlot::Amulet => "amulet",
            ItemSlot::Charm => "charm",
            ItemSlot::Weapon => "weapon",
            ItemSlot::Helm => "helm",
            ItemSlot::Tunic => "tunic",
            ItemSlot::Gloves => "gloves",
            ItemSlot::Leggings => "leggings",
            ItemSlot::Shield => "shield",
            ItemSlot::Boots => "boots",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ItemSlot::ALL.into_iter().find(|s| s.name() == name)
    }
}

/// An equipped item. `modifier` is a signed percentage applied to the rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub rating: u32,
    pub modifier: i32,
    /// Letter of the unique item this is, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<char>,
}

impl Item {
    pub const MIN_MODIFIER: i32 = -100;
    pub const MAX_MODIFIER: i32 = 1000;

    /// Ratings are at least one; an empty slot is `None`, never a zero item.
    pub fn new(rating: u32) -> Self {
        Self {
            rating: rating.max(1),
            modifier: 0,
            unique: None,
        }
    }

    /// One of the named items, marked by its letter tag.
    pub fn unique(rating: u32, tag: char) -> Self {
        Self {
            unique: Some(tag),
            ..Self::new(rating)
        }
    }

    pub fn effective(&self) -> i64 {
        i64::from(self.rating) * i64::from(100 + self.modifier) / 100
    }

    pub fn adjust(&mut self, pct: i32) {
        self.modifier = (self.modifier + pct).clamp(Self::MIN_MODIFIER, Self::MAX_MODIFIER);
    }

    /// `"120"`, `"120+5"`, `"120-3"`, or with a unique tag `"300h+2"`.
    pub fn encode(&self) -> String {
        let tag = self.unique.map(String::from).unwrap_or_default();
        match self.modifier {
            0 => format!("{}{}", self.rating, tag),
            m if m > 0 => format!("{}{}+{}", self.rating, tag, m),
            m => format!("{}{}{}", self.rating, tag, m),
        }
    }

    /// Parses [`Item::encode`] output, which also covers the legacy
    /// `"45a"` unique-item form. `"0"` means an empty slot.
    pub fn decode(text: &str) -> Result<Option<Item>, String> {
        let digits_end = text
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(text.len());
        if digits_end == 0 {
            return Err(format!("item '{text}' has no rating"));
        }
        let rating: u32 = text[..digits_end]
            .parse()
            .map_err(|e| format!("item '{text}': {e}"))?;
        let mut rest = &text[digits_end..];
        let unique = match rest.chars().next() {
            Some(c) if c.is_ascii_lowercase() => {
                rest = &rest[1..];
                Some(c)
            }
            _ => None,
        };
        let modifier = if rest.is_empty() {
            0
        } else if rest.starts_with('+') || rest.starts_with('-') {
            rest.parse::<i32>()
                .map_err(|e| format!("item '{text}' modifier: {e}"))?
        } else {
            return Err(format!("item '{text}' has trailing garbage"));
        };
        if rating == 0 && modifier == 0 && unique.is_none() {
            return Ok(None);
        }
        Ok(Some(Item {
            rating: rating.max(1),
            modifier,
            unique,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Pos {
    pub x: u32,
    pub y: u32,
}

impl Pos {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.x, self.y)
    }
}

/// A bonded companion that levels on its own curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ally {
    pub level: u32,
    pub ttl: i64,
}

/// Running penalty totals in seconds, one per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PenaltyTotals {
    pub message: i64,
    pub nick: i64,
    pub part: i64,
    pub kick: i64,
    pub quit: i64,
    pub dropped: i64,
    pub quest: i64,
    pub logout: i64,
}

impl PenaltyTotals {
    pub fn total(&self) -> i64 {
        [
            self.message,
            self.nick,
            self.part,
            self.kick,
            self.quit,
            self.dropped,
            self.quest,
            self.logout,
        ]
        .into_iter()
        .fold(0i64, i64::saturating_add)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    pub name: String,
    pub class: String,
    pub password_hash: String,
    pub is_admin: bool,
    /// Nick and userhost bound at the most recent login.
    pub nick: String,
    pub userhost: String,
    pub level: u32,
    pub ttl: i64,
    /// Accumulated online seconds.
    pub idled: i64,
    pub alignment: Alignment,
    pub pos: Pos,
    pub items: BTreeMap<ItemSlot, Item>,
    pub ally: Option<Ally>,
    pub online: bool,
    pub created: Timestamp,
    pub last_login: Timestamp,
    pub penalties: PenaltyTotals,
    /// Penalty seconds accumulated since the last level-up.
    pub level_penalty: i64,
    pub archived: bool,
}

impl Character {
    pub fn new(name: &str, class: &str, password_hash: &str, ttl: i64, now: Timestamp) -> Self {
        Self {
            name: name.to_string(),
            class: class.to_string(),
            password_hash: password_hash.to_string(),
            is_admin: false,
            nick: String::new(),
            userhost: String::new(),
            level: 0,
            ttl,
            idled: 0,
            alignment: Alignment::Neutral,
            pos: Pos::default(),
            items: BTreeMap::new(),
            ally: None,
            online: false,
            created: now,
            last_login: now,
            penalties: PenaltyTotals::default(),
            level_penalty: 0,
            archived: false,
        }
    }

    pub fn key(&self) -> String {
        name_key(&self.name)
    }

    /// Online and not archived: the only state in which time accrues.
    pub fn is_active(&self) -> bool {
        self.online && !self.archived
    }

    pub fn item_sum(&self) -> i64 {
        self.items.values().map(Item::effective).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_encoding() {
        assert_eq!(Item::new(120).encode(), "120");
        let mut item = Item::new(120);
        item.adjust(5);
        assert_eq!(item.encode(), "120+5");
        item.adjust(-8);
        assert_eq!(item.encode(), "120-3");
        assert_eq!(Item::decode("120-3"), Ok(Some(item)));

        let mut hammer = Item::unique(310, 'h');
        assert_eq!(hammer.encode(), "310h");
        hammer.adjust(2);
        assert_eq!(hammer.encode(), "310h+2");
        assert_eq!(Item::decode("310h+2"), Ok(Some(hammer)));
    }

    #[test]
    fn legacy_items_decode() {
        assert_eq!(Item::decode("0"), Ok(None));
        assert_eq!(Item::decode("45a"), Ok(Some(Item::unique(45, 'a'))));
        assert!(Item::decode("x12").is_err());
        assert!(Item::decode("12ab").is_err());
        assert!(Item::decode("12+").is_err());
    }

    #[test]
    fn modifier_scales_effective_rating() {
        let mut item = Item::new(200);
        item.adjust(10);
        assert_eq!(item.effective(), 220);
        item.adjust(-500);
        assert_eq!(item.modifier, Item::MIN_MODIFIER);
        assert_eq!(item.effective(), 0);
    }

    #[test]
    fn alignment_codes() {
        for a in [Alignment::Good, Alignment::Neutral, Alignment::Evil] {
            assert_eq!(Alignment::from_code(a.code()), Some(a));
            assert_eq!(Alignment::parse(&a.as_str().to_uppercase()), Some(a));
        }
    }

    #[test]
    fn slot_names_round_trip() {
        for slot in ItemSlot::ALL {
            assert_eq!(ItemSlot::from_name(slot.name()), Some(slot));
        }
    }
}
