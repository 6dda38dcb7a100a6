//! Editor API against an engine running in its own task

use std::time::Duration;

use joycursor::controller::{ButtonEdge, ButtonType, DeviceId, StickSide, VirtualPads};
use joycursor::engine::{DriverSettings, EngineError, EngineHandle, PollDriver};
use joycursor::mapping::{Action, ButtonMapping, KeyKind, MouseButton, StickActionType};
use joycursor::output::{OutputAction, RecordingSink};
use joycursor::persistence::{MemoryProfileStore, PersistenceWorker};

const POLL: Duration = Duration::from_millis(5);

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn spawn_engine(pads: &VirtualPads, sink: &RecordingSink) -> EngineHandle {
    let driver = PollDriver::create(
        Box::new(pads.clone()),
        Box::new(sink.clone()),
        Box::new(MemoryProfileStore::with_fallback_default()),
        DriverSettings::default(),
    );
    EngineHandle::spawn(driver, POLL)
}

#[tokio::test]
async fn test_editor_round_trip() {
    let pads = VirtualPads::new();
    let sink = RecordingSink::new();
    let mut engine = spawn_engine(&pads, &sink);
    let client = engine.client();
    let pad = DeviceId::from("pad-1");

    pads.connect(&pad, "Test Pad");
    settle().await;
    assert_eq!(
        client.connected_devices().await.unwrap(),
        vec![(pad.clone(), "Test Pad".to_string())]
    );
    assert!(client.known_devices().await.unwrap().contains_key(&pad));

    let mapping = ButtonMapping::single(Action::Key(KeyKind::Space));
    client
        .set_button_mapping(&pad, ButtonType::Y, mapping.clone())
        .await
        .unwrap();
    client.invalidate_cache(Some(&pad)).await.unwrap();
    assert_eq!(
        client.get_button_mapping(&pad, ButtonType::Y).await.unwrap(),
        mapping
    );

    let mut stick = client.get_stick_mapping(&pad, StickSide::Right).await.unwrap();
    assert_eq!(stick.action_type, StickActionType::Scroll);
    stick.enabled = false;
    client
        .set_stick_mapping(&pad, StickSide::Right, stick)
        .await
        .unwrap();
    client.invalidate_cache(None).await.unwrap();
    assert!(!client.get_stick_mapping(&pad, StickSide::Right).await.unwrap().enabled);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_releases_held_actions() {
    let pads = VirtualPads::new();
    let sink = RecordingSink::new();
    let mut engine = spawn_engine(&pads, &sink);
    let client = engine.client();
    let pad = DeviceId::from("pad-1");

    pads.connect(&pad, "Test Pad");
    settle().await;
    pads.push_edge(&pad, ButtonEdge::pressed(ButtonType::A));
    settle().await;
    assert_eq!(sink.drain(), vec![OutputAction::MouseDown(MouseButton::Left)]);

    engine.shutdown().await.unwrap();
    assert_eq!(sink.drain(), vec![OutputAction::MouseUp(MouseButton::Left)]);

    let result = client.connected_devices().await;
    assert!(matches!(result, Err(EngineError::ChannelError(_))));
}

#[tokio::test]
async fn test_shutdown_flushes_to_persistence_worker() {
    let pads = VirtualPads::new();
    let sink = RecordingSink::new();
    let (persist_tx, worker) = PersistenceWorker::spawn();
    let driver = PollDriver::create(
        Box::new(pads.clone()),
        Box::new(sink.clone()),
        Box::new(MemoryProfileStore::with_fallback_default()),
        DriverSettings::default(),
    )
    .with_persistence(persist_tx);
    let mut engine = EngineHandle::spawn(driver, POLL);

    pads.connect(&DeviceId::from("pad-1"), "Test Pad");
    settle().await;

    engine.shutdown().await.unwrap();
    // In-memory stores produce no snapshots; the worker still exits once
    // the driver has dropped its sender
    tokio::time::timeout(Duration::from_secs(1), worker.join())
        .await
        .unwrap()
        .unwrap();
}
