use std::collections::HashSet;

use tempfile::TempDir;

use super::*;
use crate::queue::{Payload, PayloadKind, QueueOptions};

fn queue() -> QueueService {
    QueueService::new(QueueOptions::default())
}

async fn drain_text(queue: &QueueService, channel: &str) -> HashSet<String> {
    let mut seen = HashSet::new();
    while let Ok(message) = queue.dequeue(channel, PayloadKind::Text).await {
        match message.payload {
            Payload::Text(data) => {
                seen.insert(data);
            }
            Payload::Bytes(_) => panic!("unexpected bytes payload"),
        }
    }
    seen
}

#[tokio::test]
async fn test_snapshot_round_trip_across_channels() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");

    let original = queue();
    original.enqueue("a", Payload::Text("m1".to_string()), "").await;
    original.enqueue("a", Payload::Text("m2".to_string()), "").await;
    original.enqueue("b", Payload::Text("m3".to_string()), "").await;
    PersistenceManager::new(original.clone(), &path)
        .save_snapshot()
        .await
        .unwrap();

    let restored = queue();
    let outcome = PersistenceManager::new(restored.clone(), &path)
        .load_snapshot()
        .await
        .unwrap();

    assert_eq!(
        outcome,
        LoadOutcome::Restored {
            channels: 2,
            messages: 3
        }
    );
    assert_eq!(restored.queue_length("a").await.unwrap(), 2);
    assert_eq!(restored.queue_length("b").await.unwrap(), 1);
    assert_eq!(
        drain_text(&restored, "a").await,
        HashSet::from(["m1".to_string(), "m2".to_string()])
    );
    assert_eq!(
        drain_text(&restored, "b").await,
        HashSet::from(["m3".to_string()])
    );
}

#[tokio::test]
async fn test_snapshot_preserves_ids_bytes_and_trace() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");

    let original = queue();
    let id = original
        .enqueue("blobs", Payload::Bytes(vec![0, 159, 146, 150]), "trace-7")
        .await;
    PersistenceManager::new(original, &path)
        .save_snapshot()
        .await
        .unwrap();

    let restored = queue();
    PersistenceManager::new(restored.clone(), &path)
        .load_snapshot()
        .await
        .unwrap();

    let message = restored.dequeue("blobs", PayloadKind::Bytes).await.unwrap();
    assert_eq!(message.id, id);
    assert_eq!(message.trace_id, "trace-7");
    assert_eq!(message.payload, Payload::Bytes(vec![0, 159, 146, 150]));
}

#[tokio::test]
async fn test_snapshot_file_layout() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");

    let original = queue();
    let id = original.enqueue("orders", Payload::Text("x".to_string()), "").await;
    PersistenceManager::new(original, &path)
        .save_snapshot()
        .await
        .unwrap();

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    let stored = &raw["orders"][&id];
    assert_eq!(stored["id"], id.as_str());
    assert_eq!(stored["channel"], "orders");
    assert_eq!(stored["data"], "x");
}

#[tokio::test]
async fn test_save_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("snapshot.json");

    let q = queue();
    q.enqueue("orders", Payload::Text("x".to_string()), "").await;
    PersistenceManager::new(q, &path).save_snapshot().await.unwrap();

    assert!(path.exists());
}

#[tokio::test]
async fn test_missing_file_empties_known_channels() {
    let dir = TempDir::new().unwrap();
    let q = queue();
    q.enqueue("orders", Payload::Text("x".to_string()), "").await;

    let outcome = PersistenceManager::new(q.clone(), dir.path().join("absent.json"))
        .load_snapshot()
        .await
        .unwrap();

    assert_eq!(outcome, LoadOutcome::Missing);
    assert_eq!(q.queue_length("orders").await.unwrap(), 0);
}

#[tokio::test]
async fn test_load_empties_channels_absent_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");

    let source = queue();
    source.enqueue("a", Payload::Text("kept".to_string()), "").await;
    PersistenceManager::new(source, &path)
        .save_snapshot()
        .await
        .unwrap();

    let target = queue();
    target.enqueue("z", Payload::Text("stale".to_string()), "").await;
    PersistenceManager::new(target.clone(), &path)
        .load_snapshot()
        .await
        .unwrap();

    assert_eq!(target.queue_length("a").await.unwrap(), 1);
    assert_eq!(target.queue_length("z").await.unwrap(), 0);
}

#[tokio::test]
async fn test_corrupt_file_leaves_state_intact() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, b"{ not json").unwrap();

    let q = queue();
    q.enqueue("orders", Payload::Text("x".to_string()), "").await;

    let err = PersistenceManager::new(q.clone(), &path)
        .load_snapshot()
        .await
        .unwrap_err();

    assert!(matches!(err, PersistenceError::Serialize(_)));
    assert_eq!(q.queue_length("orders").await.unwrap(), 1);
}

#[tokio::test]
async fn test_load_does_not_notify() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");

    let source = queue();
    source.enqueue("orders", Payload::Text("x".to_string()), "").await;
    PersistenceManager::new(source, &path)
        .save_snapshot()
        .await
        .unwrap();

    let target = QueueService::new(QueueOptions {
        streaming: true,
        ..Default::default()
    });
    let mut feed = target.take_channel_feed().await.unwrap();
    PersistenceManager::new(target.clone(), &path)
        .load_snapshot()
        .await
        .unwrap();

    let mut announced = feed.try_recv().unwrap();
    assert_eq!(announced.channel, "orders");
    assert!(announced.receiver.try_recv().is_err());
}

#[tokio::test]
async fn test_save_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    // A directory where the file should be
    let path = dir.path().join("taken");
    std::fs::create_dir(&path).unwrap();

    let q = queue();
    q.enqueue("orders", Payload::Text("x".to_string()), "").await;

    let err = PersistenceManager::new(q.clone(), &path)
        .save_snapshot()
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::Io { .. }));
    assert_eq!(q.queue_length("orders").await.unwrap(), 1);
}

#[tokio::test]
async fn test_autosave_writes_immediately() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");

    let q = queue();
    q.enqueue("orders", Payload::Text("x".to_string()), "").await;

    let handle = PersistenceManager::new(q, &path)
        .with_interval(Duration::from_secs(3600))
        .spawn_autosave();

    tokio::time::timeout(Duration::from_secs(5), async {
        while !path.exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    handle.abort();
}

#[tokio::test]
async fn test_shutdown_hook_saves() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");

    let q = queue();
    q.enqueue("orders", Payload::Text("x".to_string()), "").await;
    PersistenceManager::new(q, &path).shutdown_hook().await;

    assert!(path.exists());
}
