//! Concurrency tests
//!
//! Token verification is stateless and the stores are shared across
//! handler tasks; these tests hammer both from many tasks at once.

use playtrace::auth::ingest;
use playtrace::storage::{MemoryStore, TelemetryStore};
use playtrace::telemetry::{EventItem, SessionMode, SessionStartRequest};
use serde_json::Map;
use std::sync::Arc;

const TEST_SECRET: &[u8] = b"test-secret-for-concurrency-tests";

#[tokio::test]
async fn test_concurrent_issue_and_verify() {
    let mut handles = vec![];

    for i in 0..200 {
        handles.push(tokio::spawn(async move {
            let sid = format!("session-{}", i);
            let token = ingest::issue(TEST_SECRET, &sid, 60).unwrap();
            let claims = ingest::verify(TEST_SECRET, &token).unwrap();
            assert_eq!(claims.sid, sid);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_concurrent_batches_all_stored() {
    let store = Arc::new(MemoryStore::new());
    let participant_id = store.create_participant().await.unwrap();
    let session_id = store
        .create_session(&SessionStartRequest {
            participant_id,
            mode: SessionMode::Human,
            agent_skill: None,
            game_version: None,
            model_version: None,
            seed: None,
        })
        .await
        .unwrap();

    let mut handles = vec![];
    for batch in 0..50i64 {
        let store = store.clone();
        let session_id = session_id.clone();
        handles.push(tokio::spawn(async move {
            let events: Vec<EventItem> = (0..10)
                .map(|i| EventItem {
                    t_ms: batch * 10 + i,
                    kind: "tick".to_string(),
                    payload: Map::new(),
                })
                .collect();
            store.append_events(&session_id, &events).await.unwrap()
        }));
    }

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap();
    }
    assert_eq!(total, 500);

    let events = store.list_events(&session_id).await.unwrap();
    assert_eq!(events.len(), 500);
    assert!(events.windows(2).all(|w| w[0].t_ms <= w[1].t_ms));
}
