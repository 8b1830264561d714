//! # Configuration Management Module
//!
//! All tunable game values live in one TOML file. Every section has sensible
//! defaults so a freshly generated `config.toml` runs out of the box.
//!
//! ## Configuration Structure
//!
//! - [`GameConfig`] - clock tick, save cadence, name limits, announcements
//! - [`LevelingConfig`] - TTL curve for characters and allies
//! - [`PenaltyConfig`] - per-occurrence penalty magnitudes and the ceiling
//! - [`MapConfig`] - grid size, walk step, impassable cells
//! - [`BattleConfig`] - alignment power shift, item finds, modifiers
//! - [`QuestConfig`] - quest cadence, eligibility, reward and failure odds
//! - [`ThrottleConfig`] - output pacing and wrap width
//! - [`StorageConfig`] - store format, file locations, log rotation, backups
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use idlequest::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Tick every {}s", config.game.tick_secs);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [game]
//! tick_secs = 3
//!
//! [leveling]
//! base = 600.0
//! step = 1.16
//!
//! [storage]
//! format = "flat"
//! data_dir = "./data"
//! ```
//!
//! Values are checked by [`Config::validate`] when loaded; an out-of-range
//! value is fatal at startup and never surfaces mid-run.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;

/// Out-of-range or inconsistent configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },

    #[error("quest.interval_min_secs ({min}) exceeds quest.interval_max_secs ({max})")]
    QuestInterval { min: u64, max: u64 },

    #[error("{field} cell ({x},{y}) lies outside the {width}x{height} map")]
    CellOutsideMap {
        field: &'static str,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("quest.goal ({x},{y}) is marked impassable")]
    GoalBlocked { x: u32, y: u32 },

    #[error("{field} of {base} with step {step} grants no time for level 1")]
    EmptyFirstLevel { field: &'static str, base: f64, step: f64 },
}

const MAX_MULTIPLIER: f64 = 10.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Seconds between clock ticks.
    pub tick_secs: u64,
    /// Persist the world every N ticks.
    #[serde(default = "default_save_every_ticks")]
    pub save_every_ticks: u64,
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
    #[serde(default = "default_max_class_len")]
    pub max_class_len: usize,
    /// Seconds between "top players" announcements (0 disables).
    #[serde(default = "default_top_players_secs")]
    pub top_players_secs: u64,
    /// Fixed seed for reproducible runs. Entropy-seeded when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_save_every_ticks() -> u64 {
    20
}

fn default_max_name_len() -> usize {
    16
}

fn default_max_class_len() -> usize {
    30
}

fn default_top_players_secs() -> u64 {
    36000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelingConfig {
    pub base: f64,
    pub step: f64,
    /// Level above which per-level TTL growth becomes linear.
    pub exp_ceiling: u32,
    /// Seconds added per level beyond `exp_ceiling`.
    pub linear_step: i64,
    pub ally_base: f64,
    pub ally_step: f64,
    /// Characters reaching this level gain an ally.
    pub ally_unlock_level: u32,
    /// One-in-N chance of an item find on level-up (0 disables).
    #[serde(default = "default_levelup_item_odds")]
    pub levelup_item_odds: u64,
}

fn default_levelup_item_odds() -> u64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyConfig {
    pub message: i64,
    pub nick: i64,
    pub part: i64,
    pub kick: i64,
    pub quit: i64,
    pub dropped: i64,
    pub quest: i64,
    pub logout: i64,
    /// Multiplier raised to the character's level.
    pub step: f64,
    /// Ceiling on penalty seconds accumulated within one level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    pub width: u32,
    pub height: u32,
    /// Largest per-axis move of the random walk.
    pub step: u32,
    /// Cells nobody may enter, as `[x, y]` pairs.
    #[serde(default)]
    pub blocked: Vec<[u32; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleConfig {
    /// Power multiplier in percent for good characters.
    pub good_pct: u32,
    /// Power multiplier in percent for evil characters.
    pub evil_pct: u32,
    /// Smallest TTL percentage a defeated character loses.
    pub min_loss_pct: u32,
    /// One-in-N chance that a winner finds an item (0 disables).
    pub item_find_odds: u64,
    /// One-in-N chance that a found item carries a modifier (0 disables).
    pub modifier_odds: u64,
    /// Largest modifier magnitude in percent.
    pub max_modifier_pct: u32,
    /// Challenge a random opponent on every level-up.
    #[serde(default = "default_true")]
    pub challenge_on_level_up: bool,
    /// Below this level only one level-up in `low_level_challenge_odds`
    /// leads to a challenge.
    #[serde(default = "default_challenge_min_level")]
    pub challenge_min_level: u32,
    #[serde(default = "default_low_level_challenge_odds")]
    pub low_level_challenge_odds: u64,
    /// Stands in as the opponent when a challenger draws the house.
    #[serde(default = "default_champion_name")]
    pub champion_name: String,
    /// Seconds between high-level duels (0 disables).
    #[serde(default = "default_duel_interval_secs")]
    pub duel_interval_secs: u64,
    #[serde(default = "default_duel_min_level")]
    pub duel_min_level: u32,
    /// Duels only happen while more than this share of the online
    /// characters are high level.
    #[serde(default = "default_duel_min_share_pct")]
    pub duel_min_share_pct: u32,
    /// One-in-N chance of a critical strike after a won challenge.
    #[serde(default = "default_critical_odds")]
    pub critical_odds: AlignmentOdds,
    /// Challengers above this level may take the loser's better item.
    #[serde(default = "default_swap_min_level")]
    pub swap_min_level: u32,
    #[serde(default = "default_swap_odds")]
    pub swap_odds: u64,
    /// One-in-N chance of an item find once a challenge is over.
    #[serde(default = "default_spoils_odds")]
    pub spoils_odds: AlignmentOdds,
    /// One-in-N chance per eligible unique item on each find (0 disables).
    #[serde(default = "default_unique_item_odds")]
    pub unique_item_odds: u64,
}

/// One-in-N odds that differ by alignment. Zero never fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentOdds {
    pub good: u64,
    pub neutral: u64,
    pub evil: u64,
}

fn default_true() -> bool {
    true
}

fn default_challenge_min_level() -> u32 {
    25
}

fn default_low_level_challenge_odds() -> u64 {
    4
}

fn default_champion_name() -> String {
    "IdleBot".to_string()
}

fn default_duel_interval_secs() -> u64 {
    3600
}

fn default_duel_min_level() -> u32 {
    45
}

fn default_duel_min_share_pct() -> u32 {
    15
}

fn default_critical_odds() -> AlignmentOdds {
    AlignmentOdds {
        good: 50,
        neutral: 35,
        evil: 20,
    }
}

fn default_swap_min_level() -> u32 {
    19
}

fn default_swap_odds() -> u64 {
    25
}

fn default_spoils_odds() -> AlignmentOdds {
    AlignmentOdds {
        good: 50,
        neutral: 67,
        evil: 100,
    }
}

fn default_unique_item_odds() -> u64 {
    40
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestConfig {
    pub interval_min_secs: u64,
    pub interval_max_secs: u64,
    pub min_level: u32,
    /// Minimum accumulated online seconds to be eligible.
    pub min_login_secs: i64,
    pub max_participants: usize,
    /// Chance in percent that a quest fails at resolution.
    pub failure_pct: u32,
    /// Percentage of TTL removed from every participant on success.
    pub reward_pct: u32,
    /// Fixed goal cell; a random passable cell is drawn per quest when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<[u32; 2]>,
    /// Quest descriptions ("... chosen by the gods to {description}").
    #[serde(default = "default_quest_descriptions")]
    pub descriptions: Vec<String>,
}

fn default_quest_descriptions() -> Vec<String> {
    vec![
        "recover the lost relic of the northern keep".to_string(),
        "escort the caravan across the salt flats".to_string(),
        "slay the wyrm that nests beneath the old mill".to_string(),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetsplitConfig {
    /// Seconds a split-departed character keeps its online status.
    pub grace_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Lines released per period.
    pub rate: usize,
    pub period_secs: u64,
    /// Maximum characters per transmitted piece.
    pub wrap_width: usize,
    /// Lines still queued this many seconds after creation are reported late.
    #[serde(default = "default_deliver_within_secs")]
    pub deliver_within_secs: u64,
    /// Capacity of the channel between the throttle and the transport writer.
    #[serde(default = "default_transport_buffer")]
    pub transport_buffer: usize,
}

fn default_deliver_within_secs() -> u64 {
    120
}

fn default_transport_buffer() -> usize {
    32
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldEventsConfig {
    /// Each online character meets a hand-of-god event once in this many
    /// days on average. Zero disables the event.
    pub hand_of_god_days: u64,
    pub calamity_days: u64,
    pub godsend_days: u64,
    /// Three against three; needs six online characters.
    #[serde(default = "default_team_battle_days")]
    pub team_battle_days: u64,
    /// Scaled by the number of evil characters online.
    #[serde(default = "default_evilness_days")]
    pub evilness_days: u64,
    /// Scaled by the number of good characters online.
    #[serde(default = "default_goodness_days")]
    pub goodness_days: u64,
}

fn default_team_battle_days() -> u64 {
    24
}

fn default_evilness_days() -> u64 {
    8
}

fn default_goodness_days() -> u64 {
    12
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFormat {
    /// Tab-separated legacy-compatible player file.
    Flat,
    /// SQLite database.
    Relational,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub format: StoreFormat,
    pub data_dir: String,
    #[serde(default = "default_players_file")]
    pub players_file: String,
    #[serde(default = "default_quest_state_file")]
    pub quest_state_file: String,
    #[serde(default = "default_database_file")]
    pub database_file: String,
    /// Quest status artifact read by the website.
    #[serde(default = "default_quest_status_file")]
    pub quest_status_file: String,
    /// Plain-text event log read by the website.
    #[serde(default = "default_event_log_file")]
    pub event_log_file: String,
    #[serde(default = "default_event_log_max_bytes")]
    pub event_log_max_bytes: u64,
    #[serde(default = "default_event_log_max_rows")]
    pub event_log_max_rows: u64,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
    /// Seconds between automatic backups (0 disables).
    #[serde(default = "default_backup_interval_secs")]
    pub backup_interval_secs: u64,
    /// Automatic backups kept after rotation.
    #[serde(default = "default_backup_keep")]
    pub backup_keep: usize,
}

fn default_players_file() -> String {
    "players.tsv".to_string()
}

fn default_quest_state_file() -> String {
    "quest_state.json".to_string()
}

fn default_database_file() -> String {
    "idlequest.db".to_string()
}

fn default_quest_status_file() -> String {
    "quest.json".to_string()
}

fn default_event_log_file() -> String {
    "modifiers.txt".to_string()
}

fn default_event_log_max_bytes() -> u64 {
    1 << 20
}

fn default_event_log_max_rows() -> u64 {
    5000
}

fn default_backup_dir() -> String {
    "./backups".to_string()
}

fn default_backup_interval_secs() -> u64 {
    86400
}

fn default_backup_keep() -> usize {
    7
}

impl StorageConfig {
    pub fn data_path(&self, file: &str) -> PathBuf {
        PathBuf::from(&self.data_dir).join(file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Argon2Config {
    #[serde(default)]
    pub memory_kib: Option<u32>,
    #[serde(default)]
    pub time_cost: Option<u32>,
    #[serde(default)]
    pub parallelism: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub argon2: Option<Argon2Config>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub game: GameConfig,
    pub leveling: LevelingConfig,
    pub penalties: PenaltyConfig,
    pub map: MapConfig,
    pub battle: BattleConfig,
    pub quest: QuestConfig,
    pub netsplit: NetsplitConfig,
    pub throttle: ThrottleConfig,
    pub events: WorldEventsConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

impl Config {
    /// Load and validate configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config
            .validate()
            .map_err(|e| anyhow!("Invalid config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Netsplit grace expressed in whole ticks, rounded up.
    pub fn grace_ticks(&self) -> u64 {
        let tick = self.game.tick_secs.max(1);
        self.netsplit.grace_secs.div_ceil(tick)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("game.tick_secs", self.game.tick_secs as i64)?;
        positive("game.save_every_ticks", self.game.save_every_ticks as i64)?;
        positive("game.max_name_len", self.game.max_name_len as i64)?;
        positive("game.max_class_len", self.game.max_class_len as i64)?;

        multiplier("leveling.step", self.leveling.step)?;
        first_level("leveling.base", self.leveling.base, self.leveling.step)?;
        multiplier("leveling.ally_step", self.leveling.ally_step)?;
        first_level("leveling.ally_base", self.leveling.ally_base, self.leveling.ally_step)?;
        range("leveling.exp_ceiling", self.leveling.exp_ceiling as i64, 1, 200)?;
        positive("leveling.linear_step", self.leveling.linear_step)?;

        let p = &self.penalties;
        for (field, value) in [
            ("penalties.message", p.message),
            ("penalties.nick", p.nick),
            ("penalties.part", p.part),
            ("penalties.kick", p.kick),
            ("penalties.quit", p.quit),
            ("penalties.dropped", p.dropped),
            ("penalties.quest", p.quest),
            ("penalties.logout", p.logout),
        ] {
            range(field, value, 0, i64::from(u32::MAX))?;
        }
        multiplier("penalties.step", p.step)?;
        if let Some(limit) = p.limit {
            positive("penalties.limit", limit)?;
        }

        positive("map.width", self.map.width as i64)?;
        positive("map.height", self.map.height as i64)?;
        for [x, y] in &self.map.blocked {
            self.check_cell("map.blocked", *x, *y)?;
        }

        range("battle.good_pct", self.battle.good_pct as i64, 1, 1000)?;
        range("battle.evil_pct", self.battle.evil_pct as i64, 1, 1000)?;
        range("battle.min_loss_pct", self.battle.min_loss_pct as i64, 0, 100)?;
        range(
            "battle.max_modifier_pct",
            self.battle.max_modifier_pct as i64,
            1,
            100,
        )?;
        range(
            "battle.duel_min_share_pct",
            self.battle.duel_min_share_pct as i64,
            0,
            100,
        )?;
        if self.battle.champion_name.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "battle.champion_name",
            });
        }

        let q = &self.quest;
        if q.interval_min_secs > q.interval_max_secs {
            return Err(ConfigError::QuestInterval {
                min: q.interval_min_secs,
                max: q.interval_max_secs,
            });
        }
        positive("quest.max_participants", q.max_participants as i64)?;
        range("quest.failure_pct", q.failure_pct as i64, 0, 100)?;
        range("quest.reward_pct", q.reward_pct as i64, 0, 100)?;
        range("quest.min_login_secs", q.min_login_secs, 0, i64::MAX)?;
        if let Some([x, y]) = q.goal {
            self.check_cell("quest.goal", x, y)?;
            if self.map.blocked.contains(&[x, y]) {
                return Err(ConfigError::GoalBlocked { x, y });
            }
        }

        positive("throttle.rate", self.throttle.rate as i64)?;
        positive("throttle.period_secs", self.throttle.period_secs as i64)?;
        range("throttle.wrap_width", self.throttle.wrap_width as i64, 16, 4096)?;
        positive("throttle.transport_buffer", self.throttle.transport_buffer as i64)?;

        positive("storage.backup_keep", self.storage.backup_keep as i64)?;
        positive("storage.event_log_max_bytes", self.storage.event_log_max_bytes as i64)?;
        positive("storage.event_log_max_rows", self.storage.event_log_max_rows as i64)?;
        Ok(())
    }

    fn check_cell(&self, field: &'static str, x: u32, y: u32) -> Result<(), ConfigError> {
        if x >= self.map.width || y >= self.map.height {
            return Err(ConfigError::CellOutsideMap {
                field,
                x,
                y,
                width: self.map.width,
                height: self.map.height,
            });
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: i64) -> Result<(), ConfigError> {
    if value <= 0 {
        return Err(ConfigError::NotPositive { field });
    }
    Ok(())
}

/// Growth factors must lie in `[1, 10]`.
fn multiplier(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(1.0..=MAX_MULTIPLIER).contains(&value) {
        return Err(ConfigError::OutOfRange {
            field,
            min: 1,
            max: MAX_MULTIPLIER as i64,
            value: value as i64,
        });
    }
    Ok(())
}

/// Level 1 must grant at least one second, otherwise the first level-up
/// never restores a positive TTL.
fn first_level(field: &'static str, base: f64, step: f64) -> Result<(), ConfigError> {
    if !((base * step).floor() >= 1.0) {
        return Err(ConfigError::EmptyFirstLevel { field, base, step });
    }
    Ok(())
}

fn range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

impl Default for Config {
    fn default() -> Self {
        Config {
            game: GameConfig {
                tick_secs: 3,
                save_every_ticks: default_save_every_ticks(),
                max_name_len: default_max_name_len(),
                max_class_len: default_max_class_len(),
                top_players_secs: default_top_players_secs(),
                seed: None,
            },
            leveling: LevelingConfig {
                base: 600.0,
                step: 1.16,
                exp_ceiling: 60,
                linear_step: 86400,
                ally_base: 1200.0,
                ally_step: 1.18,
                ally_unlock_level: 25,
                levelup_item_odds: default_levelup_item_odds(),
            },
            penalties: PenaltyConfig {
                message: 1,
                nick: 30,
                part: 200,
                kick: 250,
                quit: 20,
                dropped: 20,
                quest: 15,
                logout: 20,
                step: 1.14,
                limit: Some(7 * 86400),
            },
            map: MapConfig {
                width: 500,
                height: 500,
                step: 1,
                blocked: Vec::new(),
            },
            battle: BattleConfig {
                good_pct: 110,
                evil_pct: 90,
                min_loss_pct: 7,
                item_find_odds: 10,
                modifier_odds: 5,
                max_modifier_pct: 10,
                challenge_on_level_up: true,
                challenge_min_level: default_challenge_min_level(),
                low_level_challenge_odds: default_low_level_challenge_odds(),
                champion_name: default_champion_name(),
                duel_interval_secs: default_duel_interval_secs(),
                duel_min_level: default_duel_min_level(),
                duel_min_share_pct: default_duel_min_share_pct(),
                critical_odds: default_critical_odds(),
                swap_min_level: default_swap_min_level(),
                swap_odds: default_swap_odds(),
                spoils_odds: default_spoils_odds(),
                unique_item_odds: default_unique_item_odds(),
            },
            quest: QuestConfig {
                interval_min_secs: 12 * 3600,
                interval_max_secs: 24 * 3600,
                min_level: 24,
                min_login_secs: 36000,
                max_participants: 4,
                failure_pct: 10,
                reward_pct: 25,
                goal: None,
                descriptions: default_quest_descriptions(),
            },
            netsplit: NetsplitConfig { grace_secs: 300 },
            throttle: ThrottleConfig {
                rate: 4,
                period_secs: 1,
                wrap_width: 400,
                deliver_within_secs: default_deliver_within_secs(),
                transport_buffer: default_transport_buffer(),
            },
            events: WorldEventsConfig {
                hand_of_god_days: 20,
                calamity_days: 8,
                godsend_days: 4,
                team_battle_days: default_team_battle_days(),
                evilness_days: default_evilness_days(),
                goodness_days: default_goodness_days(),
            },
            storage: StorageConfig {
                format: StoreFormat::Flat,
                data_dir: "./data".to_string(),
                players_file: default_players_file(),
                quest_state_file: default_quest_state_file(),
                database_file: default_database_file(),
                quest_status_file: default_quest_status_file(),
                event_log_file: default_event_log_file(),
                event_log_max_bytes: default_event_log_max_bytes(),
                event_log_max_rows: default_event_log_max_rows(),
                backup_dir: default_backup_dir(),
                backup_interval_secs: default_backup_interval_secs(),
                backup_keep: default_backup_keep(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("idlequest.log".to_string()),
            },
            security: SecurityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn default_config_survives_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.game.tick_secs, config.game.tick_secs);
        assert_eq!(parsed.storage.format, StoreFormat::Flat);
        assert_eq!(parsed.penalties.limit, config.penalties.limit);
    }

    #[test]
    fn grace_rounds_up_to_whole_ticks() {
        let mut config = Config::default();
        config.game.tick_secs = 7;
        config.netsplit.grace_secs = 300;
        assert_eq!(config.grace_ticks(), 43);
        config.netsplit.grace_secs = 0;
        assert_eq!(config.grace_ticks(), 0);
    }

    #[test]
    fn zero_tick_is_rejected() {
        let mut config = Config::default();
        config.game.tick_secs = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive {
                field: "game.tick_secs"
            })
        );
    }

    #[test]
    fn inverted_quest_interval_is_rejected() {
        let mut config = Config::default();
        config.quest.interval_min_secs = 100;
        config.quest.interval_max_secs = 10;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::QuestInterval { min: 100, max: 10 })
        ));
    }

    #[test]
    fn goal_must_be_on_map_and_passable() {
        let mut config = Config::default();
        config.quest.goal = Some([600, 1]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CellOutsideMap { field: "quest.goal", .. })
        ));
        config.quest.goal = Some([3, 4]);
        config.map.blocked = vec![[3, 4]];
        assert_eq!(config.validate(), Err(ConfigError::GoalBlocked { x: 3, y: 4 }));
    }

    #[test]
    fn curve_that_grants_nothing_is_rejected() {
        let mut config = Config::default();
        config.leveling.base = 0.5;
        config.leveling.step = 1.16;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyFirstLevel { field: "leveling.base", .. })
        ));

        let mut config = Config::default();
        config.leveling.ally_base = 0.8;
        config.leveling.ally_step = 1.2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyFirstLevel { field: "leveling.ally_base", .. })
        ));

        // floor(0.9 * 1.2) == 1 is the smallest usable curve.
        let mut config = Config::default();
        config.leveling.base = 0.9;
        config.leveling.step = 1.2;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn growth_factors_are_bounded() {
        for field in ["leveling.step", "leveling.ally_step", "penalties.step"] {
            let mut config = Config::default();
            match field {
                "leveling.step" => config.leveling.step = 11.0,
                "leveling.ally_step" => config.leveling.ally_step = 1e9,
                _ => config.penalties.step = f64::NAN,
            }
            assert!(
                matches!(config.validate(), Err(ConfigError::OutOfRange { field: f, max: 10, .. }) if f == field),
                "{field} accepted"
            );
        }
        let mut config = Config::default();
        config.penalties.step = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_optional_sections_use_defaults() {
        let mut table = toml::Value::try_from(Config::default()).unwrap();
        let root = table.as_table_mut().unwrap();
        root.remove("security");
        root.get_mut("storage")
            .and_then(|s| s.as_table_mut())
            .unwrap()
            .remove("backup_keep");
        let parsed: Config = toml::from_str(&toml::to_string(&table).unwrap()).unwrap();
        assert!(parsed.security.argon2.is_none());
        assert_eq!(parsed.storage.backup_keep, 7);
    }
}
