//! Integration tests for the framed stdio bridge.

use relay_core::Bridge;
use relay_core::bridge::{read_frame, write_frame};
use relay_core::dispatch::{EngineConfig, MSG_SENT, NOTIFICATION_TITLE};
use serde_json::{Value, json};
use tokio::io::{AsyncWriteExt, duplex};

mod support;
use support::{MB, ScriptedDaemon, loaded_store};

const PIPE_CAPACITY: usize = 1024 * 1024;

/// Feeds `frames` to a bridge over in-memory pipes and collects everything it
/// writes back until it shuts down.
async fn run_bridge(
    initial: Value,
    daemon: std::sync::Arc<ScriptedDaemon>,
    frames: &[Value],
    raw_tail: &[u8],
) -> Vec<Value> {
    let (_backend, store) = loaded_store(initial).await;
    let bridge = Bridge::new(store, daemon, EngineConfig::default());

    let (mut client_in, server_in) = duplex(PIPE_CAPACITY);
    let (server_out, mut client_out) = duplex(PIPE_CAPACITY);

    for frame in frames {
        write_frame(&mut client_in, frame).await.unwrap();
    }
    client_in.write_all(raw_tail).await.unwrap();
    client_in.shutdown().await.unwrap();
    drop(client_in);

    bridge.run(server_in, server_out).await.unwrap();

    let mut received = Vec::new();
    while let Some(frame) = read_frame::<_, Value>(&mut client_out).await.unwrap() {
        received.push(frame);
    }
    received
}

fn of_type<'a>(frames: &'a [Value], kind: &str) -> Vec<&'a Value> {
    frames.iter().filter(|f| f["type"] == kind).collect()
}

fn response_for(frames: &[Value], request_id: i64) -> Value {
    of_type(frames, "response")
        .into_iter()
        .find(|f| f["requestId"] == request_id)
        .map(|f| f["response"].clone())
        .unwrap_or(Value::Null)
}

#[tokio::test]
async fn test_control_requests_get_responses() {
    let frames = run_bridge(
        json!({"minSizeMB": 20}),
        ScriptedDaemon::accepting(),
        &[
            json!({"type": "message", "requestId": 1, "request": {"action": "getSettings"}}),
            json!({"type": "message", "requestId": 2, "request": {"action": "explode"}}),
            json!({"type": "message", "requestId": 3, "request": {"action": "checkConnection"}}),
        ],
        &[],
    )
    .await;

    let settings = response_for(&frames, 1);
    assert_eq!(settings["success"], true);
    assert_eq!(settings["data"]["minSizeMB"], 20.0);
    assert_eq!(settings["data"]["autoRetry"], true);

    let unknown = response_for(&frames, 2);
    assert_eq!(unknown, json!({"success": false, "error": "Unknown action"}));

    let health = response_for(&frames, 3);
    assert_eq!(health["data"]["status"], "online");
    assert_eq!(health["data"]["version"], "1.37.0");
}

#[tokio::test]
async fn test_settings_endpoint_uses_persisted_key_name() {
    let frames = run_bridge(
        json!({"motrixUrl": "http://nas:6800/jsonrpc"}),
        ScriptedDaemon::accepting(),
        &[json!({"type": "message", "requestId": 1, "request": {"action": "getSettings"}})],
        &[],
    )
    .await;

    let settings = response_for(&frames, 1);
    assert_eq!(settings["data"]["motrixUrl"], "http://nas:6800/jsonrpc");
    assert!(settings["data"].get("endpointUrl").is_none());
}

#[tokio::test]
async fn test_download_created_emits_commands_and_notification() {
    let daemon = ScriptedDaemon::accepting();
    let frames = run_bridge(
        json!({}),
        daemon.clone(),
        &[json!({
            "type": "downloadCreated",
            "item": {
                "id": 11,
                "url": "https://cdn.test/big.iso",
                "filename": "/home/me/Downloads/big.iso",
                "totalBytes": 64 * MB,
                "state": "in_progress"
            }
        })],
        &[],
    )
    .await;

    assert_eq!(of_type(&frames, "cancelDownload")[0]["id"], 11);
    assert_eq!(of_type(&frames, "eraseDownload")[0]["id"], 11);
    let notification = of_type(&frames, "notification")[0];
    assert_eq!(notification["kind"], "success");
    assert_eq!(notification["title"], NOTIFICATION_TITLE);
    assert!(notification["message"].as_str().unwrap().contains(MSG_SENT));
    assert_eq!(of_type(&frames, "historyUpdated").len(), 1);

    let calls = daemon.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].filename.as_deref(), Some("big.iso"));
}

#[tokio::test]
async fn test_bad_frames_are_skipped() {
    let mut garbage = Vec::new();
    garbage.extend_from_slice(&5u32.to_le_bytes());
    garbage.extend_from_slice(b"nope!");
    let mut trailing = garbage.clone();
    let request = serde_json::to_vec(
        &json!({"type": "message", "requestId": 9, "request": {"action": "getHistory"}}),
    )
    .unwrap();
    trailing.extend_from_slice(&u32::try_from(request.len()).unwrap().to_le_bytes());
    trailing.extend_from_slice(&request);

    let frames = run_bridge(
        json!({}),
        ScriptedDaemon::accepting(),
        &[
            json!({"type": "somethingNew", "payload": 1}),
            json!({"type": "startup"}),
        ],
        &trailing,
    )
    .await;

    assert_eq!(frames.len(), 1);
    assert_eq!(response_for(&frames, 9), json!({"success": true, "data": []}));
}

#[tokio::test]
async fn test_storage_change_outside_local_area_is_ignored() {
    let frames = run_bridge(
        json!({}),
        ScriptedDaemon::accepting(),
        &[
            json!({
                "type": "storageChanged",
                "area": "sync",
                "changes": {"minSizeMB": {"newValue": 99}}
            }),
            json!({
                "type": "storageChanged",
                "area": "local",
                "changes": {"skipNext": {"oldValue": false, "newValue": true}}
            }),
            json!({"type": "message", "requestId": 1, "request": {"action": "getSettings"}}),
        ],
        &[],
    )
    .await;

    let settings = response_for(&frames, 1);
    assert_eq!(settings["data"]["minSizeMB"], 5.0);
    assert_eq!(settings["data"]["skipNext"], true);
}

#[tokio::test]
async fn test_installed_frame_greets_user() {
    let frames = run_bridge(
        json!({}),
        ScriptedDaemon::accepting(),
        &[json!({"type": "installed", "reason": "install"})],
        &[],
    )
    .await;

    let notifications = of_type(&frames, "notification");
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["kind"], "success");
}
