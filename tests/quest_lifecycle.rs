mod common;

use idlequest::config::Config;
use idlequest::game::quest::{QuestOutcome, QuestPhase};
use idlequest::game::rng::ScriptedDice;
use idlequest::game::types::Pos;
use idlequest::game::World;

fn quest_config() -> Config {
    let mut config = common::quiet_config();
    config.map.width = 10;
    config.map.height = 10;
    config.quest.interval_min_secs = 100;
    config.quest.interval_max_secs = 100;
    config.quest.min_level = 0;
    config.quest.min_login_secs = 0;
    config.quest.failure_pct = 0;
    config.quest.goal = Some([8, 0]);
    config
}

/// Rebuilds the world from its own saved state, as a restart would.
fn restart(world: &World, config: &Config, now: i64) -> World {
    World::new(
        config,
        world.ledger().snapshot(),
        Some(world.quest().clone()),
        Box::new(ScriptedDice::constant(0)),
        now,
    )
}

#[test]
fn only_qualified_characters_are_chosen() {
    let mut config = quest_config();
    config.quest.min_level = 2;
    let mut world = common::world_with(&config, &["a", "b", "c"]);
    world.ledger_mut().get_mut("a").unwrap().level = 5;
    world.ledger_mut().get_mut("b").unwrap().level = 1;
    world.ledger_mut().get_mut("c").unwrap().level = 3;

    world.tick(100);
    assert_eq!(world.quest().phase, QuestPhase::Pathfinding);
    assert_eq!(world.quest().participants, vec!["a".to_string(), "c".to_string()]);
    assert!(!world.is_questor("b"));
}

#[test]
fn party_size_is_capped() {
    let mut config = quest_config();
    config.quest.max_participants = 2;
    let mut world = common::world_with(&config, &["d", "c", "b", "a"]);
    world.tick(100);
    let party = &world.quest().participants;
    assert_eq!(party.len(), 2);
    let mut sorted = party.clone();
    sorted.sort();
    assert_eq!(*party, sorted);
}

#[test]
fn questors_follow_the_path_while_others_wander() {
    let mut config = quest_config();
    config.quest.min_level = 1;
    config.map.step = 1;
    let mut world = common::world_with(&config, &["a", "b", "drifter"]);
    world.ledger_mut().get_mut("a").unwrap().level = 1;
    world.ledger_mut().get_mut("b").unwrap().level = 1;

    world.tick(100);
    assert_eq!(world.quest().participants.len(), 2);
    assert_eq!(world.ledger().get("a").unwrap().pos, Pos::new(0, 0));
    assert_ne!(world.ledger().get("drifter").unwrap().pos, Pos::new(0, 0));

    world.tick(110);
    assert_eq!(world.ledger().get("a").unwrap().pos, Pos::new(1, 0));
    assert_eq!(world.ledger().get("b").unwrap().pos, Pos::new(1, 0));
    assert_eq!(world.quest().current_cell(), Some(Pos::new(1, 0)));
}

#[test]
fn quest_resumes_after_restart_when_the_party_returns() {
    let config = quest_config();
    let mut world = common::world_with(&config, &["a", "b"]);
    world.tick(100);
    world.tick(110);
    assert_eq!(world.quest().progress, 1);

    let mut world = restart(&world, &config, 115);
    assert_eq!(world.quest().phase, QuestPhase::Pathfinding);
    assert!(world.is_awaiting_rejoin("a"));

    world.tick(120);
    assert_eq!(world.quest().progress, 2);
    assert!(!world.autologin("a", "a@host", 121).is_empty());
    assert!(!world.autologin("b", "b@host", 121).is_empty());

    let mut now = 130;
    while world.quest().phase != QuestPhase::Idle && now < 400 {
        world.tick(now);
        now += 10;
    }
    assert_eq!(world.quest().outcome, QuestOutcome::Success);
    assert_eq!(world.ledger().get("a").unwrap().pos, Pos::new(8, 0));
}

#[test]
fn party_that_never_returns_abandons_the_quest() {
    let config = quest_config();
    assert_eq!(config.grace_ticks(), 3);
    let mut world = common::world_with(&config, &["a", "b"]);
    world.tick(100);

    let mut world = restart(&world, &config, 100);
    for now in [110, 120, 130] {
        world.tick(now);
        assert_eq!(world.quest().phase, QuestPhase::Pathfinding);
    }
    world.tick(140);
    assert_eq!(world.quest().phase, QuestPhase::Resolving);
    assert_eq!(world.quest().failure.as_deref(), Some("a abandoned the party"));

    world.tick(150);
    assert_eq!(world.quest().outcome, QuestOutcome::Failure);
    assert_eq!(world.quest().phase, QuestPhase::Idle);
    // Quest penalty lands even on offline participants.
    assert_eq!(world.ledger().get("b").unwrap().penalties.quest, 15);
}
