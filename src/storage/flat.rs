//! Tab-separated flat-file store.
//!
//! One character per line after a `#` header. Columns 1-32 keep the
//! classic layout so older player files load unchanged; columns 33-37 carry
//! fields the classic format had no room for. A 32-column row loads with
//! defaults for the rest.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use log::{debug, warn};

use super::{append_file_locked, rotate_if_larger, write_file_locked, GameStore, LoadReport, Snapshot, StoreError};
use crate::config::StorageConfig;
use crate::game::events::EventRecord;
use crate::game::quest::Quest;
use crate::game::types::{Alignment, Ally, Character, Item, ItemSlot, PenaltyTotals, Pos};
use crate::logutil::escape_log;

pub const LEGACY_COLUMNS: [&str; 32] = [
    "username", "pass", "is_admin", "level", "class", "next_ttl", "nick", "userhost", "online", "idled", "x",
    "y", "pen_mesg", "pen_nick", "pen_part", "pen_kick", "pen_quit", "pen_quest", "pen_logout", "created",
    "last_login", "amulet", "charm", "helm", "boots", "gloves", "ring", "leggings", "shield", "tunic",
    "weapon", "alignment",
];

pub const EXTENSION_COLUMNS: [&str; 5] = ["pen_dropped", "level_penalty", "ally_level", "ally_ttl", "archived"];

/// Item slots in legacy column order (columns 22-31).
const ITEM_COLUMNS: [ItemSlot; 10] = [
    ItemSlot::Amulet,
    ItemSlot::Charm,
    ItemSlot::Helm,
    ItemSlot::Boots,
    ItemSlot::Gloves,
    ItemSlot::Ring,
    ItemSlot::Leggings,
    ItemSlot::Shield,
    ItemSlot::Tunic,
    ItemSlot::Weapon,
];

pub struct FlatStore {
    players: PathBuf,
    quest: PathBuf,
    events: PathBuf,
    event_log_max_bytes: u64,
}

impl FlatStore {
    pub fn new(cfg: &StorageConfig) -> Self {
        Self {
            players: cfg.data_path(&cfg.players_file),
            quest: cfg.data_path(&cfg.quest_state_file),
            events: cfg.data_path(&cfg.event_log_file),
            event_log_max_bytes: cfg.event_log_max_bytes,
        }
    }

    fn load_quest(&self, report: &mut LoadReport) -> Result<(), StoreError> {
        let text = match fs::read_to_string(&self.quest) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::io(&self.quest, e)),
        };
        match serde_json::from_str::<Quest>(&text) {
            Ok(quest) => report.quest = Some(quest),
            Err(e) => {
                warn!("Discarding unreadable quest state {}: {}", self.quest.display(), e);
                report.dropped += 1;
            }
        }
        Ok(())
    }
}

impl GameStore for FlatStore {
    fn load(&mut self) -> Result<LoadReport, StoreError> {
        let mut report = LoadReport::default();
        match fs::read_to_string(&self.players) {
            Ok(text) => {
                for (idx, line) in text.lines().enumerate() {
                    if line.starts_with('#') || line.trim().is_empty() {
                        continue;
                    }
                    match decode_row(line) {
                        Ok(character) => report.characters.push(character),
                        Err(reason) => {
                            warn!(
                                "Skipping {} line {}: {} ({})",
                                self.players.display(),
                                idx + 1,
                                reason,
                                escape_log(line)
                            );
                            report.dropped += 1;
                        }
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No player file at {}; starting empty", self.players.display());
            }
            Err(e) => return Err(StoreError::io(&self.players, e)),
        }
        self.load_quest(&mut report)?;
        Ok(report)
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let mut out = String::from("# ");
        out.push_str(&LEGACY_COLUMNS.join("\t"));
        out.push('\t');
        out.push_str(&EXTENSION_COLUMNS.join("\t"));
        out.push('\n');
        for character in &snapshot.characters {
            out.push_str(&encode_row(character));
            out.push('\n');
        }
        write_file_locked(&self.players, out.as_bytes())?;
        let quest = serde_json::to_vec_pretty(&snapshot.quest)?;
        write_file_locked(&self.quest, &quest)?;
        Ok(())
    }

    fn append_events(&mut self, events: &[EventRecord]) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }
        let mut out = String::new();
        for event in events {
            out.push_str(&format_event_line(event));
            out.push('\n');
        }
        append_file_locked(&self.events, &out)?;
        rotate_if_larger(&self.events, self.event_log_max_bytes)?;
        Ok(())
    }

    fn backup_sources(&self) -> Vec<PathBuf> {
        vec![self.players.clone(), self.quest.clone(), self.events.clone()]
    }

    fn describe(&self) -> String {
        format!("flat file {}", self.players.display())
    }
}

/// `[MM/DD/YY HH:MM:SS] text`, UTC.
pub fn format_event_line(event: &EventRecord) -> String {
    let stamp = chrono::DateTime::from_timestamp(event.at, 0)
        .map(|dt| dt.format("%m/%d/%y %H:%M:%S").to_string())
        .unwrap_or_else(|| event.at.to_string());
    let text: String = event.text.chars().filter(|c| *c != '\n' && *c != '\r').collect();
    format!("[{stamp}] {text}")
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

pub fn encode_row(c: &Character) -> String {
    let mut cols: Vec<String> = vec![
        c.name.clone(),
        c.password_hash.clone(),
        flag(c.is_admin).into(),
        c.level.to_string(),
        c.class.clone(),
        c.ttl.to_string(),
        c.nick.clone(),
        c.userhost.clone(),
        flag(c.online).into(),
        c.idled.to_string(),
        c.pos.x.to_string(),
        c.pos.y.to_string(),
        c.penalties.message.to_string(),
        c.penalties.nick.to_string(),
        c.penalties.part.to_string(),
        c.penalties.kick.to_string(),
        c.penalties.quit.to_string(),
        c.penalties.quest.to_string(),
        c.penalties.logout.to_string(),
        c.created.to_string(),
        c.last_login.to_string(),
    ];
    for slot in ITEM_COLUMNS {
        cols.push(c.items.get(&slot).map(Item::encode).unwrap_or_else(|| "0".into()));
    }
    cols.push(c.alignment.code().into());
    cols.push(c.penalties.dropped.to_string());
    cols.push(c.level_penalty.to_string());
    match c.ally {
        Some(ally) => {
            cols.push(ally.level.to_string());
            cols.push(ally.ttl.to_string());
        }
        None => {
            cols.push("-".into());
            cols.push("-".into());
        }
    }
    cols.push(flag(c.archived).into());
    // Tabs and newlines would break the row structure.
    cols.iter()
        .map(|col| col.replace(['\t', '\n', '\r'], " "))
        .collect::<Vec<_>>()
        .join("\t")
}

fn field<T: std::str::FromStr>(cols: &[&str], idx: usize) -> Result<T, String> {
    let raw = cols.get(idx).ok_or_else(|| format!("missing column {}", idx + 1))?;
    raw.trim()
        .parse()
        .map_err(|_| format!("bad value '{}' in column {}", raw, idx + 1))
}

fn bool_field(cols: &[&str], idx: usize) -> Result<bool, String> {
    match cols.get(idx).map(|s| s.trim()) {
        Some("1") => Ok(true),
        Some("0") => Ok(false),
        Some(other) => Err(format!("bad flag '{}' in column {}", other, idx + 1)),
        None => Err(format!("missing column {}", idx + 1)),
    }
}

pub fn decode_row(line: &str) -> Result<Character, String> {
    let cols: Vec<&str> = line.split('\t').collect();
    let total = LEGACY_COLUMNS.len() + EXTENSION_COLUMNS.len();
    if cols.len() != LEGACY_COLUMNS.len() && cols.len() != total {
        return Err(format!("expected {} or {} columns, found {}", LEGACY_COLUMNS.len(), total, cols.len()));
    }
    let name = cols[0].trim();
    if name.is_empty() {
        return Err("empty character name".into());
    }

    let mut items = BTreeMap::new();
    for (offset, slot) in ITEM_COLUMNS.iter().enumerate() {
        let idx = 21 + offset;
        match Item::decode(cols[idx].trim()) {
            Ok(Some(item)) => {
                items.insert(*slot, item);
            }
            Ok(None) => {}
            Err(e) => return Err(format!("{} in column {}", e, idx + 1)),
        }
    }
    let alignment = Alignment::from_code(cols[31].trim())
        .ok_or_else(|| format!("bad alignment '{}'", cols[31]))?;

    let extended = cols.len() == total;
    let ally = if extended && cols[34].trim() != "-" {
        Some(Ally {
            level: field(&cols, 34)?,
            ttl: field(&cols, 35)?,
        })
    } else {
        None
    };

    Ok(Character {
        name: name.to_string(),
        class: cols[4].to_string(),
        password_hash: cols[1].to_string(),
        is_admin: bool_field(&cols, 2)?,
        nick: cols[6].to_string(),
        userhost: cols[7].to_string(),
        level: field(&cols, 3)?,
        ttl: field(&cols, 5)?,
        idled: field(&cols, 9)?,
        alignment,
        pos: Pos::new(field(&cols, 10)?, field(&cols, 11)?),
        items,
        ally,
        online: bool_field(&cols, 8)?,
        created: field(&cols, 19)?,
        last_login: field(&cols, 20)?,
        penalties: PenaltyTotals {
            message: field(&cols, 12)?,
            nick: field(&cols, 13)?,
            part: field(&cols, 14)?,
            kick: field(&cols, 15)?,
            quit: field(&cols, 16)?,
            quest: field(&cols, 17)?,
            logout: field(&cols, 18)?,
            dropped: if extended { field(&cols, 32)? } else { 0 },
        },
        level_penalty: if extended { field(&cols, 33)? } else { 0 },
        archived: if extended { bool_field(&cols, 36)? } else { false },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::EventKind;

    fn sample() -> Character {
        let mut c = Character::new("Mira", "Wandering Bard", "$argon2id$v=19$x", 1411, 1_700_000_000);
        c.level = 6;
        c.nick = "mira".into();
        c.userhost = "mira@example.org".into();
        c.online = true;
        c.idled = 9000;
        c.pos = Pos::new(12, 480);
        c.alignment = Alignment::Evil;
        c.items.insert(ItemSlot::Weapon, Item { rating: 30, modifier: -4, unique: None });
        c.items.insert(ItemSlot::Amulet, Item::new(7));
        c.penalties.message = 40;
        c.penalties.dropped = 20;
        c.level_penalty = 60;
        c.ally = Some(Ally { level: 2, ttl: 800 });
        c
    }

    #[test]
    fn row_has_legacy_prefix() {
        let row = encode_row(&sample());
        let cols: Vec<&str> = row.split('\t').collect();
        assert_eq!(cols.len(), 37);
        assert_eq!(cols[0], "Mira");
        assert_eq!(cols[5], "1411");
        assert_eq!(cols[21], "7");
        assert_eq!(cols[30], "30-4");
        assert_eq!(cols[31], "e");
        assert_eq!(decode_row(&row).unwrap(), sample());
    }

    #[test]
    fn legacy_row_loads_with_defaults() {
        let row = encode_row(&sample());
        let legacy: Vec<&str> = row.split('\t').take(32).collect();
        let loaded = decode_row(&legacy.join("\t")).unwrap();
        assert_eq!(loaded.level, 6);
        assert_eq!(loaded.ally, None);
        assert_eq!(loaded.level_penalty, 0);
        assert_eq!(loaded.penalties.dropped, 0);
        assert!(!loaded.archived);
    }

    #[test]
    fn bad_rows_are_rejected() {
        assert!(decode_row("too\tfew").is_err());
        let row = encode_row(&sample()).replacen("1411", "soon", 1);
        assert!(decode_row(&row).unwrap_err().contains("column 6"));
    }

    #[test]
    fn event_lines_use_utc_stamp() {
        let event = EventRecord {
            at: 0,
            character: "Mira".into(),
            kind: EventKind::Battle,
            magnitude: 5,
            text: "Mira won\nagain".into(),
        };
        assert_eq!(format_event_line(&event), "[01/01/70 00:00:00] Mira wonagain");
    }
}
