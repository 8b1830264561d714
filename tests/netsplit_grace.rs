mod common;

use idlequest::game::events::EventKind;
use idlequest::game::penalty::Occurrence;

#[test]
fn rejoin_within_grace_costs_nothing() {
    let config = common::quiet_config();
    let mut world = common::world_with(&config, &["mira"]);
    world.tick(10);
    world.apply_occurrence("mira", Occurrence::NetsplitDeparture, 12);
    assert!(world.splits().is_pending("mira"));
    world.tick(20);
    world.tick(30);
    world.apply_occurrence("mira", Occurrence::NetsplitRejoin, 35);
    let report = world.tick(40);

    assert!(report.records.is_empty());
    let mira = world.ledger().get("mira").unwrap();
    assert!(mira.online);
    assert_eq!(mira.ttl, 600 - 40);
    assert_eq!(mira.penalties.total(), 0);
    assert!(world.splits().is_empty());
}

#[test]
fn grace_expiry_drops_and_penalises_once() {
    let config = common::quiet_config();
    assert_eq!(config.grace_ticks(), 3);
    let mut world = common::world_with(&config, &["mira"]);
    world.tick(10);
    world.apply_occurrence("mira", Occurrence::NetsplitDeparture, 12);

    // Still online, still idling while the grace lasts.
    world.tick(20);
    world.tick(30);
    assert!(world.ledger().get("mira").unwrap().online);

    let report = world.tick(40);
    let dropped: Vec<_> = report.records.iter().filter(|r| r.kind == EventKind::Dropped).collect();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].magnitude, 20);

    let mira = world.ledger().get("mira").unwrap();
    assert!(!mira.online);
    assert_eq!(mira.ttl, 600 - 30 + 20);
    assert_eq!(mira.penalties.dropped, 20);
    assert!(world.is_awaiting_rejoin("mira"));

    // Nothing further while offline.
    assert!(world.tick(50).records.is_empty());
    assert_eq!(world.ledger().get("mira").unwrap().ttl, 590);
}

#[test]
fn dropped_character_is_recognised_on_return() {
    let config = common::quiet_config();
    let mut world = common::world_with(&config, &["mira"]);
    world.apply_occurrence("mira", Occurrence::NetsplitDeparture, 0);
    for t in 1..=3 {
        world.tick(t * 10);
    }
    assert!(!world.ledger().get("mira").unwrap().online);

    assert!(world.autologin("mira", "someone@else", 31).is_empty());
    let report = world.autologin("MIRA", "mira@host", 31);
    assert_eq!(report.lines.len(), 1);
    assert!(report.lines[0].contains("is now online"));
    assert!(world.ledger().get("mira").unwrap().online);
    assert!(!world.is_awaiting_rejoin("mira"));
}

#[test]
fn speaking_during_a_split_cancels_it() {
    let config = common::quiet_config();
    let mut world = common::world_with(&config, &["mira"]);
    world.apply_occurrence("mira", Occurrence::NetsplitDeparture, 0);
    let report = world.apply_occurrence("mira", Occurrence::Message { len: 4 }, 1);
    assert_eq!(report.notices.len(), 1);
    assert!(!world.splits().is_pending("mira"));
    for t in 1..=5 {
        world.tick(t * 10);
    }
    let mira = world.ledger().get("mira").unwrap();
    assert!(mira.online);
    assert_eq!(mira.penalties.dropped, 0);
    assert_eq!(mira.penalties.message, 4);
}
