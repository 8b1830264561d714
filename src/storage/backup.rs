//! Backups of the game data files.
//!
//! Each backup is a `tar.gz` holding the store's files under `data/`, with
//! a SHA-256 checksum recorded in `backups.json` next to the archives.
//! Automatic backups beyond the configured count are pruned oldest first;
//! manual backups are only removed explicitly.

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};

use super::write_file_locked;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub id: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub kind: BackupKind,
    pub checksum: String,
    pub verified: bool,
    /// Archive file name, relative to the backup directory.
    pub path: PathBuf,
    /// Data files captured, by file name.
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    Manual,
    Automatic,
}

pub struct BackupManager {
    sources: Vec<PathBuf>,
    backup_dir: PathBuf,
    /// Automatic backups to keep.
    keep: usize,
    backups: HashMap<String, BackupMetadata>,
}

impl BackupManager {
    pub fn new(sources: Vec<PathBuf>, backup_dir: PathBuf, keep: usize) -> io::Result<Self> {
        fs::create_dir_all(&backup_dir)?;
        let mut manager = Self {
            sources,
            backup_dir,
            keep,
            backups: HashMap::new(),
        };
        manager.load_metadata()?;
        Ok(manager)
    }

    fn metadata_path(&self) -> PathBuf {
        self.backup_dir.join("backups.json")
    }

    fn load_metadata(&mut self) -> io::Result<()> {
        let path = self.metadata_path();
        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            self.backups =
                serde_json::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        }
        Ok(())
    }

    fn save_metadata(&self) -> io::Result<()> {
        let contents = serde_json::to_string_pretty(&self.backups)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        write_file_locked(&self.metadata_path(), contents.as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }

    pub fn create_backup(&mut self, label: Option<String>, kind: BackupKind) -> io::Result<BackupMetadata> {
        let timestamp = Utc::now();
        let mut id = format!("backup_{}", timestamp.format("%Y%m%d_%H%M%S_%3f"));
        let mut n = 1;
        while self.backups.contains_key(&id) {
            id = format!("backup_{}_{}", timestamp.format("%Y%m%d_%H%M%S_%3f"), n);
            n += 1;
        }
        let filename = format!("{id}.tar.gz");
        let archive_path = self.backup_dir.join(&filename);
        log::info!("Creating backup {} ({:?})", id, kind);

        let enc = GzEncoder::new(File::create(&archive_path)?, Compression::default());
        let mut tar = Builder::new(enc);
        let mut files = Vec::new();
        for source in &self.sources {
            let Some(name) = source.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !source.is_file() {
                log::debug!("Backup skips missing {}", source.display());
                continue;
            }
            tar.append_path_with_name(source, Path::new("data").join(name))?;
            files.push(name.to_string());
        }
        let enc = tar.into_inner()?;
        enc.finish()?;

        let metadata = BackupMetadata {
            id: id.clone(),
            label,
            created_at: timestamp,
            size_bytes: fs::metadata(&archive_path)?.len(),
            kind,
            checksum: checksum(&archive_path)?,
            verified: false,
            path: PathBuf::from(&filename),
            files,
        };
        self.backups.insert(id.clone(), metadata.clone());
        self.save_metadata()?;
        log::info!("Backup {} written ({} bytes, {} files)", id, metadata.size_bytes, metadata.files.len());
        Ok(metadata)
    }

    pub fn verify_backup(&mut self, id: &str) -> io::Result<bool> {
        let metadata = self
            .backups
            .get(id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "backup not found"))?;
        let archive = self.backup_dir.join(&metadata.path);
        if !archive.exists() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "backup file missing"));
        }
        let valid = checksum(&archive)? == metadata.checksum;
        if valid {
            if let Some(meta) = self.backups.get_mut(id) {
                meta.verified = true;
            }
            self.save_metadata()?;
        } else {
            log::error!("Backup {} failed verification (checksum mismatch)", id);
        }
        Ok(valid)
    }

    /// Unpacks a verified backup into `dest` (files land in `dest/data/`).
    pub fn restore_backup(&self, id: &str, dest: &Path) -> io::Result<()> {
        let metadata = self
            .backups
            .get(id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "backup not found"))?;
        let archive_path = self.backup_dir.join(&metadata.path);
        if checksum(&archive_path)? != metadata.checksum {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "backup checksum mismatch"));
        }
        fs::create_dir_all(dest)?;
        let mut archive = Archive::new(GzDecoder::new(File::open(&archive_path)?));
        archive.unpack(dest)?;
        log::info!("Restored backup {} into {}", id, dest.display());
        Ok(())
    }

    /// Deletes automatic backups beyond the newest `keep`. Returns their ids.
    pub fn apply_retention(&mut self) -> io::Result<Vec<String>> {
        let mut automatic: Vec<&BackupMetadata> = self
            .backups
            .values()
            .filter(|b| b.kind == BackupKind::Automatic)
            .collect();
        automatic.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let expired: Vec<String> = automatic.iter().skip(self.keep).map(|b| b.id.clone()).collect();
        for id in &expired {
            if let Some(metadata) = self.backups.remove(id) {
                let file = self.backup_dir.join(&metadata.path);
                if file.exists() {
                    fs::remove_file(&file)?;
                }
                log::info!("Pruned backup {}", id);
            }
        }
        if !expired.is_empty() {
            self.save_metadata()?;
        }
        Ok(expired)
    }

    /// Newest first.
    pub fn list_backups(&self) -> Vec<BackupMetadata> {
        let mut backups: Vec<_> = self.backups.values().cloned().collect();
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        backups
    }

    pub fn latest(&self) -> Option<&BackupMetadata> {
        self.backups.values().max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
    }

    pub fn delete_backup(&mut self, id: &str) -> io::Result<()> {
        let metadata = self
            .backups
            .remove(id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "backup not found"))?;
        let file = self.backup_dir.join(&metadata.path);
        if file.exists() {
            fs::remove_file(&file)?;
        }
        self.save_metadata()?;
        log::info!("Deleted backup {}", id);
        Ok(())
    }
}

fn checksum(path: &Path) -> io::Result<String> {
    use sha2::{Digest, Sha256};

    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
