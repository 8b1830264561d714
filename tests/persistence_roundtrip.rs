mod common;

use std::fs;

use idlequest::config::StoreFormat;
use idlequest::game::quest::{Quest, QuestOutcome, QuestPhase};
use idlequest::game::types::{Alignment, Ally, Character, Item, ItemSlot, Pos};
use idlequest::storage::flat::encode_row;
use idlequest::storage::{migrate, open_store, Snapshot};

fn veteran() -> Character {
    let mut c = Character::new("Mira", "Wandering Bard", "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA", 1411, 1_700_000_000);
    c.is_admin = true;
    c.level = 6;
    c.nick = "mira".into();
    c.userhost = "mira@example.org".into();
    c.online = true;
    c.idled = 9000;
    c.alignment = Alignment::Good;
    c.pos = Pos::new(3, 17);
    c.last_login = 1_700_000_500;
    for (n, slot) in ItemSlot::ALL.iter().enumerate() {
        c.items.insert(
            *slot,
            Item {
                rating: 5 + n as u32,
                modifier: n as i32 - 3,
                unique: (*slot == ItemSlot::Boots).then_some('g'),
            },
        );
    }
    c.penalties.message = 12;
    c.penalties.nick = 30;
    c.penalties.part = 200;
    c.penalties.kick = 250;
    c.penalties.quit = 20;
    c.penalties.dropped = 22;
    c.penalties.quest = 15;
    c.penalties.logout = 20;
    c.level_penalty = 55;
    c.ally = Some(Ally { level: 3, ttl: -12 });
    c
}

fn rookie() -> Character {
    let mut c = Character::new("tess", "Hedge Knight", "hash", 600, 1_700_000_100);
    c.alignment = Alignment::Evil;
    c.archived = true;
    c
}

fn running_quest() -> Quest {
    Quest {
        phase: QuestPhase::Pathfinding,
        description: "find the well".into(),
        started_at: Some(1_700_000_200),
        next_quest_at: 1_700_040_000,
        participants: vec!["Mira".into()],
        start: Some(Pos::new(3, 17)),
        goal: Some(Pos::new(5, 17)),
        path: vec![Pos::new(4, 17), Pos::new(5, 17)],
        progress: 1,
        outcome: QuestOutcome::Pending,
        failure: None,
    }
}

fn sorted(mut characters: Vec<Character>) -> Vec<Character> {
    characters.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    characters
}

fn roundtrip(format: StoreFormat) {
    let dir = tempfile::tempdir().unwrap();
    let config = common::stored_config(dir.path(), format);
    let snapshot = Snapshot {
        characters: vec![veteran(), rookie()],
        quest: running_quest(),
    };
    {
        let mut store = open_store(&config.storage).unwrap();
        store.save(&snapshot).unwrap();
    }
    let mut store = open_store(&config.storage).unwrap();
    let loaded = store.load().unwrap();
    assert_eq!(loaded.dropped, 0);
    assert_eq!(sorted(loaded.characters), sorted(snapshot.characters));
    assert_eq!(loaded.quest, Some(running_quest()));
}

#[test]
fn flat_store_roundtrips_every_field() {
    roundtrip(StoreFormat::Flat);
}

#[test]
fn relational_store_roundtrips_every_field() {
    roundtrip(StoreFormat::Relational);
}

#[test]
fn saving_twice_replaces_rather_than_appends() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::stored_config(dir.path(), StoreFormat::Relational);
    let mut store = open_store(&config.storage).unwrap();
    store
        .save(&Snapshot {
            characters: vec![veteran(), rookie()],
            quest: Quest::idle(5),
        })
        .unwrap();
    store
        .save(&Snapshot {
            characters: vec![veteran()],
            quest: Quest::idle(9),
        })
        .unwrap();
    let loaded = store.load().unwrap();
    assert_eq!(loaded.characters.len(), 1);
    assert_eq!(loaded.quest.unwrap().next_quest_at, 9);
}

#[test]
fn legacy_player_file_migrates_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::stored_config(dir.path(), StoreFormat::Flat);
    let row = encode_row(&veteran());
    let legacy: Vec<&str> = row.split('\t').take(32).collect();
    fs::create_dir_all(&config.storage.data_dir).unwrap();
    fs::write(
        config.storage.data_path(&config.storage.players_file),
        format!("# username\tpass\t...\n{}\n", legacy.join("\t")),
    )
    .unwrap();

    let loaded = open_store(&config.storage).unwrap().load().unwrap();
    assert_eq!(loaded.dropped, 0);
    assert!(loaded.quest.is_none());
    let mira = &loaded.characters[0];
    assert_eq!(mira.level, 6);
    assert_eq!(mira.ttl, 1411);
    assert_eq!(mira.items.len(), 10);
    assert_eq!(mira.ally, None);
    assert_eq!(mira.penalties.dropped, 0);
    assert_eq!(mira.level_penalty, 0);
}

#[test]
fn malformed_rows_are_skipped_and_counted() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::stored_config(dir.path(), StoreFormat::Flat);
    fs::create_dir_all(&config.storage.data_dir).unwrap();
    let good = encode_row(&rookie());
    let bad_level = encode_row(&veteran()).replacen("\t6\t", "\tsix\t", 1);
    fs::write(
        config.storage.data_path(&config.storage.players_file),
        format!("# header\n{good}\nnot\ta\trow\n{bad_level}\n\n"),
    )
    .unwrap();
    fs::write(config.storage.data_path(&config.storage.quest_state_file), "{ not json").unwrap();

    let loaded = open_store(&config.storage).unwrap().load().unwrap();
    assert_eq!(loaded.characters.len(), 1);
    assert_eq!(loaded.characters[0].name, "tess");
    assert_eq!(loaded.dropped, 3);
    assert!(loaded.quest.is_none());
}

#[test]
fn migrate_flat_to_relational_and_back() {
    let dir = tempfile::tempdir().unwrap();
    let flat = common::stored_config(dir.path(), StoreFormat::Flat).storage;
    let mut relational = flat.clone();
    relational.format = StoreFormat::Relational;
    let mut back = flat.clone();
    back.data_dir = dir.path().join("again").to_string_lossy().into_owned();

    open_store(&flat)
        .unwrap()
        .save(&Snapshot {
            characters: vec![veteran(), rookie()],
            quest: running_quest(),
        })
        .unwrap();

    let report = migrate(&flat, &relational).unwrap();
    assert_eq!(report.characters.len(), 2);
    migrate(&relational, &back).unwrap();

    let loaded = open_store(&back).unwrap().load().unwrap();
    assert_eq!(sorted(loaded.characters), sorted(vec![veteran(), rookie()]));
    assert_eq!(loaded.quest, Some(running_quest()));
    assert!(migrate(&flat, &flat).is_err());
}
