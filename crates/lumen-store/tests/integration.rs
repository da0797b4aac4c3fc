//! Integration tests for lumen-store.
//!
//! These tests run the store against a real directory.

use lumen_core::{PresetId, PresetRecord, Tier};
use lumen_store::{
    AcquireMode, BufferArbiter, FileSystem, LeaseOwner, RecordStore, StdFs, StoreError,
    factory_presets,
};
use serde_json::Value;
use tempfile::TempDir;

fn id(raw: u8) -> PresetId {
    PresetId::new(raw)
}

fn read_doc(dir: &TempDir, file: &str) -> Value {
    let bytes = std::fs::read(dir.path().join(file)).expect("tier file should exist");
    serde_json::from_slice(&bytes).expect("tier file should be valid JSON")
}

/// Saves written through one store are visible to a fresh store over the same directory.
#[test]
fn test_roundtrip_across_store_instances() {
    let dir = TempDir::new().unwrap();
    let arbiter = BufferArbiter::new(1024);

    {
        let store = RecordStore::new(StdFs::new(dir.path()));
        let mut lease = arbiter
            .acquire(LeaseOwner::Save, AcquireMode::NonBlocking)
            .unwrap();
        let record = PresetRecord::new()
            .with_name("Sunset")
            .with_field("on", true)
            .with_field("bri", 128)
            .with_field("ql", "S");
        store
            .write(&mut lease, Tier::Durable, id(7), &record)
            .unwrap();
    }

    let store = RecordStore::new(StdFs::new(dir.path()));
    let mut lease = arbiter
        .acquire(LeaseOwner::Lookup, AcquireMode::NonBlocking)
        .unwrap();
    let record = store.read(&mut lease, Tier::Durable, id(7)).unwrap();
    assert_eq!(record.name(), Some("Sunset"));
    assert_eq!(record.quick_load(), Some("S"));
    assert_eq!(
        store.find_by_quick_load(&mut lease, "S").unwrap(),
        Some(id(7))
    );

    let doc = read_doc(&dir, "presets.json");
    assert_eq!(doc["0"], serde_json::json!({}));
}

/// Presets {1..5}; delete 3; old 4 is now 3, old 5 is now 4, 5 is gone.
#[test]
fn test_delete_compaction_on_disk() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::new(StdFs::new(dir.path()));
    let arbiter = BufferArbiter::new(1024);
    let mut lease = arbiter
        .acquire(LeaseOwner::Delete, AcquireMode::NonBlocking)
        .unwrap();

    for raw in 1..=5 {
        let record = PresetRecord::new().with_name(&format!("P{raw}"));
        store
            .write(&mut lease, Tier::Durable, id(raw), &record)
            .unwrap();
    }

    let compaction = store.delete(&mut lease, id(3)).unwrap();
    assert_eq!(compaction.resolve(id(3)), None);
    assert_eq!(compaction.resolve(id(4)), Some(id(3)));
    assert_eq!(compaction.resolve(id(2)), Some(id(2)));

    let names = store.names(&mut lease).unwrap();
    let names: Vec<_> = names
        .into_iter()
        .map(|(id, name)| (id.raw(), name.unwrap()))
        .collect();
    assert_eq!(
        names,
        vec![
            (1, "P1".to_string()),
            (2, "P2".to_string()),
            (3, "P4".to_string()),
            (4, "P5".to_string()),
        ]
    );
    assert!(read_doc(&dir, "presets.json").get("5").is_none());
}

/// A fresh directory gets `{"0":{}}` files on first access of each tier.
#[test]
fn test_self_heal_creates_both_tiers() {
    let dir = TempDir::new().unwrap();
    let fs = StdFs::new(dir.path().join("data"));
    let store = RecordStore::new(fs.clone());
    let arbiter = BufferArbiter::new(64);
    let mut lease = arbiter
        .acquire(LeaseOwner::Lookup, AcquireMode::NonBlocking)
        .unwrap();

    assert_eq!(store.count(&mut lease).unwrap(), 0);
    assert!(store.ids(&mut lease, Tier::Ephemeral).unwrap().is_empty());
    assert!(fs.exists("/presets.json"));
    assert!(fs.exists("/tmp.json"));
}

/// Factory seeding, count patch after a save, and protection of the command presets.
#[test]
fn test_factory_layout_lifecycle() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::new(StdFs::new(dir.path())).with_protected([id(1), id(2)]);
    let arbiter = BufferArbiter::new(4096);
    let mut lease = arbiter
        .acquire(LeaseOwner::Save, AcquireMode::NonBlocking)
        .unwrap();

    assert!(store.seed_factory(&mut lease).unwrap());
    assert_eq!(store.count(&mut lease).unwrap(), factory_presets().len());
    assert_eq!(read_doc(&dir, "presets.json")["2"]["win"], "P1=3&P2=9&PL=~");

    store
        .write(
            &mut lease,
            Tier::Durable,
            id(5),
            &PresetRecord::new().with_name("Extra"),
        )
        .unwrap();
    assert_eq!(read_doc(&dir, "presets.json")["2"]["win"], "P1=3&P2=5&PL=~");

    assert!(matches!(
        store.delete(&mut lease, id(1)),
        Err(StoreError::Protected(_))
    ));

    store.delete(&mut lease, id(4)).unwrap();
    let doc = read_doc(&dir, "presets.json");
    assert_eq!(doc["4"]["n"], "Extra");
    assert_eq!(doc["2"]["win"], "P1=3&P2=4&PL=~");
}

/// A quick save does not disturb the durable file.
#[test]
fn test_ephemeral_tier_isolated() {
    let dir = TempDir::new().unwrap();
    let store = RecordStore::new(StdFs::new(dir.path()));
    let arbiter = BufferArbiter::new(256);
    let mut lease = arbiter
        .acquire(LeaseOwner::Save, AcquireMode::NonBlocking)
        .unwrap();

    store
        .write(
            &mut lease,
            Tier::Ephemeral,
            PresetId::QUICK,
            &PresetRecord::new().with_name("Quick"),
        )
        .unwrap();
    assert!(!dir.path().join("presets.json").exists());
    assert_eq!(read_doc(&dir, "tmp.json")["255"]["n"], "Quick");
}
