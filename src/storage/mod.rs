//! # Persistence
//!
//! The game state is saved through a [`GameStore`]. Two interchangeable
//! encodings exist, selected by `storage.format`:
//!
//! - [`flat::FlatStore`] - a tab-separated player file whose first 32
//!   columns follow the classic idle-RPG layout, a JSON quest side file and
//!   a plain-text event log ("mods" file) that is rotated by size.
//! - [`relational::SqliteStore`] - a SQLite database with `characters`,
//!   `items`, `quest` and `events` tables.
//!
//! Both round-trip every character field at second precision. Records that
//! fail to parse are skipped with a warning and counted in
//! [`LoadReport::dropped`]; they never abort a load.
//!
//! File writes go through [`write_file_locked`]: take an exclusive `fs2`
//! lock on the destination, write a unique temp file in the same directory,
//! fsync, rename over the destination and fsync the directory.

pub mod artifacts;
pub mod backup;
pub mod flat;
pub mod relational;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::config::{StorageConfig, StoreFormat};
use crate::game::events::EventRecord;
use crate::game::quest::Quest;
use crate::game::types::Character;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt store: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Everything that is saved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub characters: Vec<Character>,
    pub quest: Quest,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub characters: Vec<Character>,
    /// `None` when no quest was ever saved.
    pub quest: Option<Quest>,
    /// Records skipped because they could not be parsed.
    pub dropped: usize,
}

pub trait GameStore: Send {
    fn load(&mut self) -> Result<LoadReport, StoreError>;

    fn save(&mut self, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Appends to the event log, rotating or truncating it as configured.
    fn append_events(&mut self, events: &[EventRecord]) -> Result<(), StoreError>;

    /// Files a backup must capture.
    fn backup_sources(&self) -> Vec<PathBuf>;

    fn describe(&self) -> String;
}

/// Opens the store configured in `cfg`, creating the data directory.
pub fn open_store(cfg: &StorageConfig) -> Result<Box<dyn GameStore>, StoreError> {
    let dir = Path::new(&cfg.data_dir);
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    Ok(match cfg.format {
        StoreFormat::Flat => Box::new(flat::FlatStore::new(cfg)),
        StoreFormat::Relational => Box::new(relational::SqliteStore::open(cfg)?),
    })
}

/// Atomically replaces `path` with `content` under an exclusive lock.
pub fn write_file_locked(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let wrap = |e: io::Error| StoreError::io(path, e);
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(wrap)?;

    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(wrap)?;
    lock_file.lock_exclusive().map_err(wrap)?;

    let base = path.file_name().and_then(|s| s.to_str()).unwrap_or("data");
    let mut counter = 0u32;
    let tmp_path = loop {
        let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut tmp) => {
                tmp.write_all(content).map_err(wrap)?;
                tmp.flush().map_err(wrap)?;
                let _ = tmp.sync_all();
                break candidate;
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                counter = counter.saturating_add(1);
            }
            Err(e) => return Err(wrap(e)),
        }
    };

    fs::rename(&tmp_path, path).map_err(wrap)?;
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }
    drop(lock_file);
    Ok(())
}

/// Appends `content` to `path` under an exclusive lock.
pub fn append_file_locked(path: &Path, content: &str) -> Result<(), StoreError> {
    let wrap = |e: io::Error| StoreError::io(path, e);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(wrap)?;
    file.lock_exclusive().map_err(wrap)?;
    file.write_all(content.as_bytes()).map_err(wrap)?;
    file.flush().map_err(wrap)?;
    Ok(())
}

/// Moves `path` to `path.1` once it has grown past `max_bytes`. Returns
/// whether a rotation happened. A limit of zero disables rotation.
pub fn rotate_if_larger(path: &Path, max_bytes: u64) -> Result<bool, StoreError> {
    if max_bytes == 0 {
        return Ok(false);
    }
    let len = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    if len <= max_bytes {
        return Ok(false);
    }
    let mut rotated = path.as_os_str().to_owned();
    rotated.push(".1");
    fs::rename(path, &rotated).map_err(|e| StoreError::io(path, e))?;
    log::info!("Rotated {} after {} bytes", path.display(), len);
    Ok(true)
}

/// Copies characters and quest from the store described by `from` into the
/// one described by `to`. Event logs stay where they are. Returns the load
/// report of the source so callers can show what was dropped.
pub fn migrate(from: &StorageConfig, to: &StorageConfig) -> Result<LoadReport, StoreError> {
    if from.format == to.format && from.data_dir == to.data_dir {
        return Err(StoreError::Corrupt("source and destination are the same store".into()));
    }
    let mut source = open_store(from)?;
    let loaded = source.load()?;
    let mut dest = open_store(to)?;
    dest.save(&Snapshot {
        characters: loaded.characters.clone(),
        quest: loaded.quest.clone().unwrap_or_default(),
    })?;
    log::info!(
        "Migrated {} characters from {} to {} ({} records dropped)",
        loaded.characters.len(),
        source.describe(),
        dest.describe(),
        loaded.dropped
    );
    Ok(loaded)
}
