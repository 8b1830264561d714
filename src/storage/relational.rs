//! SQLite store.

use std::collections::HashMap;
use std::path::PathBuf;

use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{GameStore, LoadReport, Snapshot, StoreError};
use crate::config::StorageConfig;
use crate::game::events::EventRecord;
use crate::game::quest::Quest;
use crate::game::types::{Alignment, Ally, Character, Item, ItemSlot, PenaltyTotals, Pos};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS characters (
    name_key TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    class TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0,
    nick TEXT NOT NULL DEFAULT '',
    userhost TEXT NOT NULL DEFAULT '',
    level INTEGER NOT NULL,
    ttl INTEGER NOT NULL,
    idled INTEGER NOT NULL,
    alignment TEXT NOT NULL,
    x INTEGER NOT NULL,
    y INTEGER NOT NULL,
    online INTEGER NOT NULL,
    created INTEGER NOT NULL,
    last_login INTEGER NOT NULL,
    pen_message INTEGER NOT NULL DEFAULT 0,
    pen_nick INTEGER NOT NULL DEFAULT 0,
    pen_part INTEGER NOT NULL DEFAULT 0,
    pen_kick INTEGER NOT NULL DEFAULT 0,
    pen_quit INTEGER NOT NULL DEFAULT 0,
    pen_dropped INTEGER NOT NULL DEFAULT 0,
    pen_quest INTEGER NOT NULL DEFAULT 0,
    pen_logout INTEGER NOT NULL DEFAULT 0,
    level_penalty INTEGER NOT NULL DEFAULT 0,
    ally_level INTEGER,
    ally_ttl INTEGER,
    archived INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS items (
    owner TEXT NOT NULL REFERENCES characters(name_key) ON DELETE CASCADE,
    slot TEXT NOT NULL,
    rating INTEGER NOT NULL,
    modifier INTEGER NOT NULL DEFAULT 0,
    tag TEXT,
    PRIMARY KEY (owner, slot)
);

CREATE TABLE IF NOT EXISTS quest (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    state_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    at INTEGER NOT NULL,
    character TEXT NOT NULL,
    kind TEXT NOT NULL,
    magnitude INTEGER NOT NULL,
    text TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_at ON events(at);
";

pub struct SqliteStore {
    conn: Connection,
    path: PathBuf,
    event_log_max_rows: u64,
}

impl SqliteStore {
    pub fn open(cfg: &StorageConfig) -> Result<Self, StoreError> {
        let path = cfg.data_path(&cfg.database_file);
        let conn = Connection::open(&path)?;
        let store = Self {
            conn,
            path,
            event_log_max_rows: cfg.event_log_max_rows,
        };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    fn configure(&self) -> Result<(), StoreError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        // Databases created before unique items lack the tag column.
        let has_tag = self
            .conn
            .prepare("SELECT 1 FROM pragma_table_info('items') WHERE name = 'tag'")?
            .exists([])?;
        if !has_tag {
            self.conn.execute_batch("ALTER TABLE items ADD COLUMN tag TEXT")?;
        }
        Ok(())
    }

    pub fn event_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Most recent events, newest first.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<EventRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT at, character, kind, magnitude, text FROM events ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let mut events = Vec::new();
        for row in rows {
            let (at, character, kind, magnitude, text) = row?;
            let Some(kind) = crate::game::events::EventKind::parse(&kind) else {
                warn!("Skipping event with unknown kind '{}'", kind);
                continue;
            };
            events.push(EventRecord {
                at,
                character,
                kind,
                magnitude,
                text,
            });
        }
        Ok(events)
    }

    fn load_items(&self, report: &mut LoadReport) -> Result<HashMap<String, Vec<(ItemSlot, Item)>>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT owner, slot, rating, modifier, tag FROM items")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;
        let mut items: HashMap<String, Vec<(ItemSlot, Item)>> = HashMap::new();
        for row in rows {
            let (owner, slot, rating, modifier, tag) = match row {
                Ok(values) => values,
                Err(e) => {
                    warn!("Skipping unreadable item row: {}", e);
                    report.dropped += 1;
                    continue;
                }
            };
            let item = ItemSlot::from_name(&slot).zip(decode_item(rating, modifier, tag.as_deref()));
            match item {
                Some((slot, item)) => items.entry(owner).or_default().push((slot, item)),
                None => {
                    warn!("Skipping item '{}' of {}: rating {} modifier {}", slot, owner, rating, modifier);
                    report.dropped += 1;
                }
            }
        }
        Ok(items)
    }
}

fn decode_item(rating: i64, modifier: i64, tag: Option<&str>) -> Option<Item> {
    let rating = u32::try_from(rating).ok().filter(|r| *r >= 1)?;
    let modifier = i32::try_from(modifier)
        .ok()
        .filter(|m| (Item::MIN_MODIFIER..=Item::MAX_MODIFIER).contains(m))?;
    let unique = match tag {
        None => None,
        Some(tag) => {
            let mut chars = tag.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_lowercase() => Some(c),
                _ => return None,
            }
        }
    };
    Some(Item {
        rating,
        modifier,
        unique,
    })
}

fn flag(value: bool) -> i64 {
    i64::from(value)
}

fn decode_character(row: &Row<'_>) -> rusqlite::Result<Result<Character, String>> {
    let name: String = row.get("name")?;
    let level: i64 = row.get("level")?;
    let x: i64 = row.get("x")?;
    let y: i64 = row.get("y")?;
    let alignment: String = row.get("alignment")?;
    let ally_level: Option<i64> = row.get("ally_level")?;
    let ally_ttl: Option<i64> = row.get("ally_ttl")?;

    let Ok(level) = u32::try_from(level) else {
        return Ok(Err(format!("{name}: bad level {level}")));
    };
    let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
        return Ok(Err(format!("{name}: bad position {x},{y}")));
    };
    let Some(alignment) = Alignment::from_code(&alignment) else {
        return Ok(Err(format!("{name}: bad alignment '{alignment}'")));
    };
    let ally = match (ally_level, ally_ttl) {
        (Some(level), Some(ttl)) => match u32::try_from(level) {
            Ok(level) => Some(Ally { level, ttl }),
            Err(_) => return Ok(Err(format!("{name}: bad ally level {level}"))),
        },
        _ => None,
    };

    Ok(Ok(Character {
        name,
        class: row.get("class")?,
        password_hash: row.get("password_hash")?,
        is_admin: row.get::<_, i64>("is_admin")? != 0,
        nick: row.get("nick")?,
        userhost: row.get("userhost")?,
        level,
        ttl: row.get("ttl")?,
        idled: row.get("idled")?,
        alignment,
        pos: Pos::new(x, y),
        items: Default::default(),
        ally,
        online: row.get::<_, i64>("online")? != 0,
        created: row.get("created")?,
        last_login: row.get("last_login")?,
        penalties: PenaltyTotals {
            message: row.get("pen_message")?,
            nick: row.get("pen_nick")?,
            part: row.get("pen_part")?,
            kick: row.get("pen_kick")?,
            quit: row.get("pen_quit")?,
            dropped: row.get("pen_dropped")?,
            quest: row.get("pen_quest")?,
            logout: row.get("pen_logout")?,
        },
        level_penalty: row.get("level_penalty")?,
        archived: row.get::<_, i64>("archived")? != 0,
    }))
}

impl GameStore for SqliteStore {
    fn load(&mut self) -> Result<LoadReport, StoreError> {
        let mut report = LoadReport::default();
        let mut items = self.load_items(&mut report)?;

        let mut stmt = self.conn.prepare("SELECT * FROM characters ORDER BY name_key")?;
        let rows = stmt.query_map([], decode_character)?;
        for row in rows {
            match row {
                Ok(Ok(mut character)) => {
                    if let Some(owned) = items.remove(&character.key()) {
                        character.items.extend(owned);
                    }
                    report.characters.push(character);
                }
                Ok(Err(reason)) => {
                    warn!("Skipping character row: {}", reason);
                    report.dropped += 1;
                }
                Err(e) => {
                    warn!("Skipping unreadable character row: {}", e);
                    report.dropped += 1;
                }
            }
        }
        drop(stmt);

        let quest_json: Option<String> = self
            .conn
            .query_row("SELECT state_json FROM quest WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        if let Some(json) = quest_json {
            match serde_json::from_str::<Quest>(&json) {
                Ok(quest) => report.quest = Some(quest),
                Err(e) => {
                    warn!("Discarding unreadable quest state: {}", e);
                    report.dropped += 1;
                }
            }
        }
        Ok(report)
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let quest_json = serde_json::to_string(&snapshot.quest)?;
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM items", [])?;
        tx.execute("DELETE FROM characters", [])?;
        for c in &snapshot.characters {
            tx.execute(
                "INSERT INTO characters (
                    name_key, name, class, password_hash, is_admin, nick, userhost,
                    level, ttl, idled, alignment, x, y, online, created, last_login,
                    pen_message, pen_nick, pen_part, pen_kick, pen_quit, pen_dropped,
                    pen_quest, pen_logout, level_penalty, ally_level, ally_ttl, archived
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                           ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26,
                           ?27, ?28)",
                params![
                    c.key(),
                    c.name,
                    c.class,
                    c.password_hash,
                    flag(c.is_admin),
                    c.nick,
                    c.userhost,
                    i64::from(c.level),
                    c.ttl,
                    c.idled,
                    c.alignment.code(),
                    i64::from(c.pos.x),
                    i64::from(c.pos.y),
                    flag(c.online),
                    c.created,
                    c.last_login,
                    c.penalties.message,
                    c.penalties.nick,
                    c.penalties.part,
                    c.penalties.kick,
                    c.penalties.quit,
                    c.penalties.dropped,
                    c.penalties.quest,
                    c.penalties.logout,
                    c.level_penalty,
                    c.ally.map(|a| i64::from(a.level)),
                    c.ally.map(|a| a.ttl),
                    flag(c.archived),
                ],
            )?;
            for (slot, item) in &c.items {
                tx.execute(
                    "INSERT INTO items (owner, slot, rating, modifier, tag) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        c.key(),
                        slot.name(),
                        i64::from(item.rating),
                        i64::from(item.modifier),
                        item.unique.map(String::from)
                    ],
                )?;
            }
        }
        tx.execute(
            "INSERT INTO quest (id, state_json) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET state_json = excluded.state_json",
            params![quest_json],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn append_events(&mut self, events: &[EventRecord]) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        for event in events {
            tx.execute(
                "INSERT INTO events (at, character, kind, magnitude, text) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![event.at, event.character, event.kind.as_str(), event.magnitude, event.text],
            )?;
        }
        if self.event_log_max_rows > 0 {
            tx.execute(
                "DELETE FROM events WHERE id <= (SELECT MAX(id) FROM events) - ?1",
                params![self.event_log_max_rows as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn backup_sources(&self) -> Vec<PathBuf> {
        vec![self.path.clone()]
    }

    fn describe(&self) -> String {
        format!("sqlite database {}", self.path.display())
    }
}
