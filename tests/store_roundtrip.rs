//! JSON store persistence through the driver and the persistence worker

use std::time::{Duration, Instant};

use joycursor::controller::{ButtonType, DeviceId, VirtualPads};
use joycursor::engine::{DriverSettings, PollDriver};
use joycursor::mapping::{Action, ButtonMapping, KeyKind};
use joycursor::output::RecordingSink;
use joycursor::persistence::{JsonProfileStore, PersistenceWorker, ProfileStore, StorePaths};
use serde_json::{json, Value};
use tempfile::TempDir;

#[tokio::test]
async fn test_edits_and_known_devices_survive_restart() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::in_dir(dir.path());
    let pad = DeviceId::from("050000004c050000cc09000000810000");

    let store = JsonProfileStore::open(paths.clone()).await.unwrap();
    let (persist_tx, worker) = PersistenceWorker::spawn();
    let pads = VirtualPads::new();
    let mut driver = PollDriver::create(
        Box::new(pads.clone()),
        Box::new(RecordingSink::new()),
        Box::new(store),
        DriverSettings::default(),
    )
    .with_persistence(persist_tx)
    .start();

    let now = Instant::now();
    pads.connect(&pad, "Wireless Controller");
    driver.tick(now);
    let mapping = ButtonMapping::single(Action::Key(KeyKind::Function(2)));
    driver
        .set_button_mapping(&pad, ButtonType::Start, &mapping)
        .unwrap();
    driver.tick(now + Duration::from_millis(5));

    drop(driver.stop().unwrap());
    worker.join().await.unwrap();

    let reopened = JsonProfileStore::open(paths.clone()).await.unwrap();
    let known = reopened.known_devices();
    assert_eq!(known[&pad].name, "Wireless Controller");
    let stored = reopened.load_mapping(&pad).unwrap();
    assert_eq!(stored["buttons"]["start"]["actions"][0]["action_type"], "keyboard_f2");
    assert_eq!(stored["name"], "Wireless Controller");

    let controllers: Value =
        serde_json::from_str(&tokio::fs::read_to_string(&paths.controllers).await.unwrap())
            .unwrap();
    assert_eq!(controllers["controllers"][0]["guid"], pad.as_str());
    assert!(!dir.path().join("mappings.json.tmp").exists());
}

#[tokio::test]
async fn test_unknown_keys_are_preserved() {
    let dir = TempDir::new().unwrap();
    let paths = StorePaths::in_dir(dir.path());
    let document = json!({
        "mappings": {
            "default": {
                "name": "Default Profile",
                "theme": "dark",
                "buttons": { "button_a": { "enabled": true, "actions": [], "color": "red" } },
            }
        }
    });
    tokio::fs::write(&paths.mappings, document.to_string())
        .await
        .unwrap();

    let mut store = JsonProfileStore::open(paths.clone()).await.unwrap();
    let pad = DeviceId::from("pad-1");
    let copy = store.clone_default_into(&pad).unwrap();
    assert_eq!(copy["theme"], "dark");
    store.flush().await.unwrap();

    let written: Value =
        serde_json::from_str(&tokio::fs::read_to_string(&paths.mappings).await.unwrap()).unwrap();
    assert_eq!(written["mappings"]["pad-1"]["buttons"]["button_a"]["color"], "red");
}
