//! Test utilities & fixtures shared by the integration tests.

use idlequest::config::{Config, StoreFormat};
use idlequest::game::rng::ScriptedDice;
use idlequest::game::World;

/// A configuration with every random side effect switched off: no walking,
/// no item finds, no world events and quests far in the future. Tests turn
/// on only what they exercise.
pub fn quiet_config() -> Config {
    let mut config = Config::default();
    config.game.tick_secs = 10;
    config.game.top_players_secs = 0;
    config.netsplit.grace_secs = 30;
    config.map.width = 20;
    config.map.height = 20;
    config.map.step = 0;
    config.leveling.levelup_item_odds = 0;
    config.battle.item_find_odds = 0;
    config.events.hand_of_god_days = 0;
    config.events.calamity_days = 0;
    config.events.godsend_days = 0;
    config.events.team_battle_days = 0;
    config.events.evilness_days = 0;
    config.events.goodness_days = 0;
    config.battle.challenge_on_level_up = false;
    config.battle.duel_interval_secs = 0;
    config.quest.interval_min_secs = 1_000_000;
    config.quest.interval_max_secs = 1_000_000;
    config.penalties.limit = None;
    config.storage.backup_interval_secs = 0;
    config
}

/// `quiet_config` with storage rooted in `dir`.
#[allow(dead_code)]
pub fn stored_config(dir: &std::path::Path, format: StoreFormat) -> Config {
    let mut config = quiet_config();
    config.storage.format = format;
    config.storage.data_dir = dir.join("data").to_string_lossy().into_owned();
    config.storage.backup_dir = dir.join("backups").to_string_lossy().into_owned();
    config
}

/// A world on `config` whose dice always roll zero, with each name
/// registered and online under a nick equal to the name.
#[allow(dead_code)]
pub fn world_with(config: &Config, names: &[&str]) -> World {
    let mut world = World::new(config, Vec::new(), None, Box::new(ScriptedDice::constant(0)), 0);
    for name in names {
        world
            .register(name, "Tester", "hash", name, &format!("{name}@host"), 0)
            .unwrap();
    }
    world
}
