//! # Game Server
//!
//! [`GameServer`] owns the [`World`] and is the only thing that mutates it.
//! One `tokio::select!` loop takes turns between the clock, transport
//! events and ctrl-c, so ticks and occurrences never overlap.
//!
//! Around the world it wires the persistence store, the output throttle
//! task, the quest status artifact and automatic backups:
//!
//! - every tick: run the world, enqueue its lines, append its event records
//! - every `save_every_ticks` ticks: save a snapshot
//! - every `top_players_secs`: announce the leaderboard
//! - every `backup_interval_secs`: save, archive the data files, prune
//!
//! On shutdown the in-flight handler finishes, the world is saved one last
//! time and the throttle is given a bounded window to flush.

pub mod commands;

use anyhow::Result;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::auth::PasswordVault;
use crate::config::Config;
use crate::game::events::Report;
use crate::game::penalty::Occurrence;
use crate::game::rng::{Dice, SeededDice};
use crate::game::types::Timestamp;
use crate::game::World;
use crate::logutil::escape_log;
use crate::output::{start_throttle, LineSink, ThrottleHandle, ThrottlePolicy};
use crate::storage::artifacts::write_quest_status;
use crate::storage::backup::{BackupKind, BackupManager};
use crate::storage::{GameStore, Snapshot, StoreError};
use crate::transport::{ChannelEvent, ChannelEventKind};

use commands::CommandProcessor;

pub fn unix_now() -> Timestamp {
    chrono::Utc::now().timestamp()
}

pub struct GameServer {
    config: Config,
    world: World,
    store: Box<dyn GameStore>,
    throttle: ThrottleHandle,
    commands: CommandProcessor,
    backups: Option<BackupManager>,
    quest_status_path: PathBuf,
    ticks_since_save: u64,
    last_top_players: Timestamp,
    last_backup: Timestamp,
    shutdown_requested: bool,
}

impl GameServer {
    /// Loads the world from `store` and starts the throttle task on `sink`.
    /// Must be called inside a Tokio runtime.
    pub fn new(config: Config, store: Box<dyn GameStore>, sink: Box<dyn LineSink>) -> Result<Self> {
        let dice: Box<dyn Dice> = match config.game.seed {
            Some(seed) => {
                info!("Using fixed seed {}", seed);
                Box::new(SeededDice::new(seed))
            }
            None => Box::new(SeededDice::from_entropy()),
        };
        Self::with_dice(config, store, sink, dice, unix_now())
    }

    pub fn with_dice(
        config: Config,
        mut store: Box<dyn GameStore>,
        sink: Box<dyn LineSink>,
        dice: Box<dyn Dice>,
        now: Timestamp,
    ) -> Result<Self> {
        let loaded = store.load()?;
        if loaded.dropped > 0 {
            warn!("{} unreadable records skipped while loading {}", loaded.dropped, store.describe());
        }
        info!("Loaded {} characters from {}", loaded.characters.len(), store.describe());
        let world = World::new(&config, loaded.characters, loaded.quest, dice, now);

        let backups = if config.storage.backup_interval_secs > 0 {
            match BackupManager::new(
                store.backup_sources(),
                PathBuf::from(&config.storage.backup_dir),
                config.storage.backup_keep,
            ) {
                Ok(manager) => Some(manager),
                Err(e) => {
                    warn!("Automatic backups disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let throttle = start_throttle(ThrottlePolicy::from_config(&config.throttle), sink);
        let server = Self {
            quest_status_path: config.storage.data_path(&config.storage.quest_status_file),
            commands: CommandProcessor::new(PasswordVault::from_config(&config.security)),
            config,
            world,
            store,
            throttle,
            backups,
            ticks_since_save: 0,
            last_top_players: now,
            last_backup: now,
            shutdown_requested: false,
        };
        server.write_artifact(now);
        Ok(server)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn throttle(&self) -> &ThrottleHandle {
        &self.throttle
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    /// Main loop. Returns after ctrl-c or an admin `die`, once the final
    /// save and throttle flush are done.
    pub async fn run(&mut self, mut events: mpsc::Receiver<ChannelEvent>) -> Result<()> {
        info!(
            "Game running: tick {}s, {} characters, store {}",
            self.config.game.tick_secs,
            self.world.ledger().len(),
            self.store.describe()
        );
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.game.tick_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut transport_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.handle_tick(unix_now());
                }
                event = events.recv(), if transport_open => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            warn!("Transport event stream closed; the clock keeps running");
                            transport_open = false;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
            if self.shutdown_requested {
                break;
            }
        }
        self.shutdown().await
    }

    /// One clock tick plus the periodic chores that hang off it.
    pub fn handle_tick(&mut self, now: Timestamp) {
        let report = self.world.tick(now);
        self.emit(report, now);

        let top_every = self.config.game.top_players_secs as i64;
        if top_every > 0 && now - self.last_top_players >= top_every {
            self.last_top_players = now;
            for line in self.world.top_players(3) {
                self.throttle.say(line);
            }
        }

        self.ticks_since_save += 1;
        if self.ticks_since_save >= self.config.game.save_every_ticks {
            if let Err(e) = self.save() {
                error!("Periodic save failed: {}", e);
            }
        }

        let backup_every = self.config.storage.backup_interval_secs as i64;
        if backup_every > 0 && now - self.last_backup >= backup_every {
            self.last_backup = now;
            self.automatic_backup();
        }
    }

    pub fn handle_event(&mut self, event: ChannelEvent) {
        let ChannelEvent {
            nick,
            userhost,
            kind,
            at,
        } = event;
        debug!("Event from {}: {:?}", escape_log(&nick), kind);
        match kind {
            ChannelEventKind::Join => {
                let report = self.world.autologin(&nick, &userhost, at);
                self.emit(report, at);
            }
            ChannelEventKind::Private { text } => {
                let outcome = self.commands.process(&mut self.world, &nick, &userhost, &text, at);
                let changed = !outcome.report.lines.is_empty() || !outcome.report.records.is_empty();
                self.emit(outcome.report, at);
                if changed {
                    if let Err(e) = self.save() {
                        error!("Save after command failed: {}", e);
                    }
                }
                if outcome.shutdown {
                    self.shutdown_requested = true;
                }
            }
            other => {
                let Some(occurrence) = other.occurrence() else {
                    return;
                };
                // A return after the grace ran out is a fresh arrival.
                let report = match occurrence {
                    Occurrence::NetsplitRejoin if self.world.ledger().name_for_nick(&nick).is_none() => {
                        self.world.autologin(&nick, &userhost, at)
                    }
                    occurrence => self.world.apply_occurrence(&nick, occurrence, at),
                };
                self.emit(report, at);
            }
        }
    }

    fn emit(&mut self, report: Report, now: Timestamp) {
        for line in report.lines {
            self.throttle.say(line);
        }
        for notice in report.notices {
            self.throttle.tell(&notice.nick, notice.text);
        }
        if !report.records.is_empty() {
            if let Err(e) = self.store.append_events(&report.records) {
                error!("Event log append failed: {}", e);
            }
        }
        if report.quest_changed {
            self.write_artifact(now);
        }
    }

    fn write_artifact(&self, now: Timestamp) {
        if let Err(e) = write_quest_status(&self.quest_status_path, self.world.quest(), self.world.ledger(), now) {
            warn!("Quest status write failed: {}", e);
        }
    }

    pub fn save(&mut self) -> Result<(), StoreError> {
        self.ticks_since_save = 0;
        let snapshot = Snapshot {
            characters: self.world.ledger().snapshot(),
            quest: self.world.quest().clone(),
        };
        self.store.save(&snapshot)?;
        debug!("Saved {} characters", snapshot.characters.len());
        Ok(())
    }

    fn automatic_backup(&mut self) {
        if self.backups.is_none() {
            return;
        }
        if let Err(e) = self.save() {
            error!("Save before backup failed: {}", e);
            return;
        }
        let Some(manager) = self.backups.as_mut() else {
            return;
        };
        match manager.create_backup(None, BackupKind::Automatic) {
            Ok(meta) => {
                if let Err(e) = manager.apply_retention() {
                    warn!("Backup retention failed: {}", e);
                }
                info!("Automatic backup {} taken", meta.id);
            }
            Err(e) => error!("Automatic backup failed: {}", e),
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down game server...");
        self.save()?;
        self.write_artifact(unix_now());
        match self.throttle.shutdown().await {
            Some(stats) => info!(
                "Output flushed: {} delivered, {} late, {} left unsent",
                stats.delivered_total, stats.late_total, stats.queued
            ),
            None => warn!("Output throttle already stopped"),
        }
        Ok(())
    }
}
