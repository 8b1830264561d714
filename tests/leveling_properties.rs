mod common;

use idlequest::config::Config;
use idlequest::game::leveling::{advance, Climber, Curve};
use idlequest::game::types::Character;

fn default_curve() -> Curve {
    Curve::character(&Config::default().leveling)
}

#[test]
fn negative_ttl_at_level_five_grants_level_six_step() {
    let curve = default_curve();
    let mut ch = Character::new("mira", "Bard", "h", 10, 0);
    ch.level = 5;
    let ups = advance(&mut ch, 60, &curve, &curve);
    assert_eq!(ups.len(), 1);
    assert_eq!(ups[0].who, Climber::Character);
    assert_eq!(ch.level, 6);
    // floor(600 * 1.16^6) = 1461
    assert_eq!(ch.ttl, -50 + 1461);
    assert_eq!(ch.ttl, 1411);
}

#[test]
fn decrements_are_additive_across_tick_splits() {
    let curve = default_curve();
    let mut whole = Character::new("a", "c", "h", 600, 0);
    let mut split = whole.clone();
    advance(&mut whole, 5000, &curve, &curve);
    for dt in [1, 7, 333, 1200, 59, 3400] {
        advance(&mut split, dt, &curve, &curve);
    }
    assert_eq!(whole.level, split.level);
    assert_eq!(whole.ttl, split.ttl);
    assert_eq!(whole.idled, split.idled);
}

#[test]
fn large_deficit_levels_in_ascending_order() {
    let curve = default_curve();
    let mut ch = Character::new("a", "c", "h", 600, 0);
    let ups = advance(&mut ch, 600 + 696 + 807, &curve, &curve);
    let levels: Vec<u32> = ups.iter().map(|u| u.level).collect();
    assert_eq!(levels, vec![1, 2, 3]);
    assert!(ch.ttl > 0);
}

#[test]
fn world_ticks_never_accrue_for_offline_characters() {
    let config = common::quiet_config();
    let mut world = common::world_with(&config, &["mira", "tess"]);
    world.ledger_mut().logout("tess").unwrap();
    world.tick(100);
    world.tick(250);
    assert_eq!(world.ledger().get("mira").unwrap().ttl, 600 - 250);
    assert_eq!(world.ledger().get("tess").unwrap().ttl, 600);
    assert_eq!(world.ledger().get("tess").unwrap().idled, 0);
}
