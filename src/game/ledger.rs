//! The player ledger: every character record, keyed case-insensitively.

use std::collections::BTreeMap;
use thiserror::Error;

use super::types::{name_key, Character, ItemSlot, Timestamp};

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("a character named {0} already exists")]
    Duplicate(String),

    #[error("no character named {0}")]
    NotFound(String),

    #[error("{0} has been retired")]
    Archived(String),

    #[error("{0} is already logged in")]
    AlreadyOnline(String),
}

/// Characters in case-folded name order. Iteration order is the stable,
/// deterministic order used for every per-tick pass.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    characters: BTreeMap<String, Character>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger from loaded records. Later duplicates of a name are
    /// returned instead of replacing the first.
    pub fn from_characters(characters: Vec<Character>) -> (Self, Vec<Character>) {
        let mut ledger = Ledger::new();
        let mut rejected = Vec::new();
        for character in characters {
            let key = character.key();
            if ledger.characters.contains_key(&key) {
                rejected.push(character);
            } else {
                ledger.characters.insert(key, character);
            }
        }
        (ledger, rejected)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.characters.contains_key(&name_key(name))
    }

    pub fn get(&self, name: &str) -> Option<&Character> {
        self.characters.get(&name_key(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Character> {
        self.characters.get_mut(&name_key(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Character> {
        self.characters.values_mut()
    }

    pub fn insert(&mut self, character: Character) -> Result<(), LedgerError> {
        let key = character.key();
        if self.characters.contains_key(&key) {
            return Err(LedgerError::Duplicate(character.name));
        }
        self.characters.insert(key, character);
        Ok(())
    }

    /// Active character currently using `nick`.
    pub fn by_nick(&self, nick: &str) -> Option<&Character> {
        self.characters
            .values()
            .find(|c| c.is_active() && c.nick.eq_ignore_ascii_case(nick))
    }

    pub fn name_for_nick(&self, nick: &str) -> Option<String> {
        self.by_nick(nick).map(|c| c.name.clone())
    }

    /// Names of active characters, in ledger order.
    pub fn active_names(&self) -> Vec<String> {
        self.characters
            .values()
            .filter(|c| c.is_active())
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.characters.values().filter(|c| c.is_active()).count()
    }

    /// Binds `nick`/`userhost` to the character and marks it online. Any
    /// other active character holding the same nick is logged out first.
    pub fn login(
        &mut self,
        name: &str,
        nick: &str,
        userhost: &str,
        now: Timestamp,
    ) -> Result<&mut Character, LedgerError> {
        let key = name_key(name);
        match self.characters.get(&key) {
            None => return Err(LedgerError::NotFound(name.to_string())),
            Some(c) if c.archived => return Err(LedgerError::Archived(c.name.clone())),
            Some(c) if c.online => return Err(LedgerError::AlreadyOnline(c.name.clone())),
            Some(_) => {}
        }
        for other in self.characters.values_mut() {
            if other.online && other.nick.eq_ignore_ascii_case(nick) {
                other.online = false;
            }
        }
        let character = self
            .characters
            .get_mut(&key)
            .ok_or_else(|| LedgerError::NotFound(name.to_string()))?;
        character.online = true;
        character.nick = nick.to_string();
        character.userhost = userhost.to_string();
        character.last_login = now;
        Ok(character)
    }

    pub fn logout(&mut self, name: &str) -> Result<(), LedgerError> {
        let character = self
            .get_mut(name)
            .ok_or_else(|| LedgerError::NotFound(name.to_string()))?;
        character.online = false;
        Ok(())
    }

    /// Permanently retires a character. The record is kept.
    pub fn archive(&mut self, name: &str) -> Result<(), LedgerError> {
        let character = self
            .get_mut(name)
            .ok_or_else(|| LedgerError::NotFound(name.to_string()))?;
        character.online = false;
        character.archived = true;
        Ok(())
    }

    /// Unarchived characters ordered by level (desc) then TTL (asc).
    pub fn top(&self, n: usize) -> Vec<&Character> {
        let mut ranked: Vec<&Character> = self.characters.values().filter(|c| !c.archived).collect();
        ranked.sort_by(|a, b| b.level.cmp(&a.level).then(a.ttl.cmp(&b.ttl)));
        ranked.truncate(n);
        ranked
    }

    /// Exchanges whatever two characters hold in `slot`, empty slots
    /// included. False if either is unknown or both are the same.
    pub fn swap_items(&mut self, first: &str, second: &str, slot: ItemSlot) -> bool {
        if name_key(first) == name_key(second) || !self.contains(first) || !self.contains(second) {
            return false;
        }
        let from_first = self.get_mut(first).and_then(|c| c.items.remove(&slot));
        let from_second = self.get_mut(second).and_then(|c| c.items.remove(&slot));
        for (name, item) in [(first, from_second), (second, from_first)] {
            if let (Some(character), Some(item)) = (self.get_mut(name), item) {
                character.items.insert(slot, item);
            }
        }
        true
    }

    pub fn snapshot(&self) -> Vec<Character> {
        self.characters.values().cloned().collect()
    }
}
