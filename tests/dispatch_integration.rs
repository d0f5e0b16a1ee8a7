//! End-to-end tests for the dispatch engine with test doubles and a mock daemon.

use std::sync::Arc;
use std::time::Duration;

use relay_core::dispatch::{
    DispatchOutcome, EngineConfig, MSG_FAILED, MSG_SENT, NotificationKind,
};
use relay_core::intercept::{Delta, DownloadState, FilterReason};
use relay_core::store::{SettingsStore, keys};
use relay_core::{
    DispatchEngine, DownloadDelta, DownloadDescriptor, DownloadId, HistoryStatus, RpcClient,
};
use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::{
    FailingStore, HostCall, MB, RecordingHost, ScriptedDaemon, loaded_store,
    start_mock_server_or_skip,
};

fn fast_config() -> EngineConfig {
    EngineConfig {
        retry_base_delay: Duration::from_millis(10),
        max_retry_delay: Duration::from_millis(50),
        ..EngineConfig::default()
    }
}

fn zip(id: u64, url: &str) -> DownloadDescriptor {
    DownloadDescriptor::new(id, url)
        .with_filename("file.zip")
        .with_total_bytes(10 * MB)
}

// ==================== Interception ====================

#[tokio::test]
async fn test_large_zip_is_sent_with_real_client() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "abc123"})))
        .expect(1)
        .mount(&server)
        .await;

    let (_backend, store) = loaded_store(json!({
        "motrixUrl": format!("{}/jsonrpc", server.uri()),
    }))
    .await;
    let host = RecordingHost::new();
    let daemon = Arc::new(RpcClient::new(Duration::from_secs(5)).unwrap());
    let engine = DispatchEngine::with_config(store.clone(), daemon, host.clone(), fast_config());

    let outcome = engine.on_download_created(zip(7, "http://x/file.zip")).await;

    assert!(outcome.is_success(), "{outcome:?}");
    assert!(engine.pending_snapshot().is_empty());
    let history = store.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].url, "http://x/file.zip");
    assert_eq!(history[0].filename, "file.zip");
    assert_eq!(history[0].status, HistoryStatus::Success);

    let calls = host.calls();
    assert_eq!(calls[0], HostCall::Cancel(DownloadId(7)));
    assert_eq!(calls[1], HostCall::Erase(DownloadId(7)));
    let notes = host.notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationKind::Success);
    assert!(notes[0].message.contains(MSG_SENT));
    assert_eq!(host.history_updates(), 1);
}

#[tokio::test]
async fn test_text_file_is_never_queued() {
    let (_backend, store) = loaded_store(json!({})).await;
    let host = RecordingHost::new();
    let daemon = ScriptedDaemon::accepting();
    let engine = DispatchEngine::new(store.clone(), daemon.clone(), host.clone());

    let descriptor = DownloadDescriptor::new(1, "http://x/readme.txt")
        .with_filename("readme.txt")
        .with_total_bytes(50 * MB);
    let outcome = engine.on_download_created(descriptor).await;

    assert_eq!(outcome.filter_reason(), Some(FilterReason::UnsupportedType));
    assert_eq!(daemon.call_count(), 0);
    assert!(host.calls().is_empty());
    assert!(store.history().is_empty());
    assert!(!engine.dedup().contains("http://x/readme.txt"));
}

#[tokio::test]
async fn test_skip_next_consumed_once_and_persisted() {
    let (backend, store) = loaded_store(json!({"skipNext": true})).await;
    let host = RecordingHost::new();
    let daemon = ScriptedDaemon::accepting();
    let engine = DispatchEngine::with_config(store.clone(), daemon.clone(), host, fast_config());

    let first = engine.on_download_created(zip(1, "http://x/a.zip")).await;
    assert_eq!(first.filter_reason(), Some(FilterReason::SkipNext));
    assert!(!store.settings().skip_next);
    assert_eq!(backend.snapshot().get(keys::SKIP_NEXT), Some(&json!(false)));

    let second = engine.on_download_created(zip(2, "http://x/a.zip")).await;
    assert!(second.is_success(), "{second:?}");
    assert_eq!(daemon.call_count(), 1);
}

#[tokio::test]
async fn test_magnet_link_bypasses_size_check() {
    let (_backend, store) = loaded_store(json!({})).await;
    let daemon = ScriptedDaemon::accepting();
    let engine = DispatchEngine::new(store, daemon.clone(), RecordingHost::new());

    let outcome = engine
        .on_download_created(DownloadDescriptor::new(3, "magnet:?xt=urn:btih:abc"))
        .await;

    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(daemon.calls()[0].url, "magnet:?xt=urn:btih:abc");
}

// ==================== Dedup ====================

#[tokio::test(start_paused = true)]
async fn test_repeat_after_failure_suppressed_until_window_passes() {
    let (_backend, store) = loaded_store(json!({"autoRetry": false})).await;
    let daemon = ScriptedDaemon::failing();
    let engine = DispatchEngine::new(store, daemon.clone(), RecordingHost::new());

    let first = engine.on_download_created(zip(1, "http://x/a.zip")).await;
    assert!(matches!(first, DispatchOutcome::Failed { .. }));

    let repeat = engine.on_download_created(zip(2, "http://x/a.zip")).await;
    assert_eq!(repeat.filter_reason(), Some(FilterReason::RecentlySeen));

    tokio::time::advance(Duration::from_secs(6)).await;

    let later = engine.on_download_created(zip(3, "http://x/a.zip")).await;
    assert!(matches!(later, DispatchOutcome::Failed { .. }));
    assert_eq!(daemon.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_completed_download_forgotten_after_grace() {
    let (_backend, store) = loaded_store(json!({})).await;
    let engine = DispatchEngine::new(store, ScriptedDaemon::accepting(), RecordingHost::new());

    assert!(
        engine
            .on_download_created(zip(1, "http://x/a.zip"))
            .await
            .is_success()
    );
    tokio::time::advance(Duration::from_secs(6)).await;
    let tracked = engine.on_download_created(zip(2, "http://x/a.zip")).await;
    assert_eq!(tracked.filter_reason(), Some(FilterReason::AlreadyTracked));

    let delta: DownloadDelta = serde_json::from_value(json!({
        "id": 1,
        "url": "http://x/a.zip",
        "state": {"previous": "in_progress", "current": "complete"}
    }))
    .unwrap();
    assert!(delta.is_complete());
    engine.on_download_changed(&delta);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(!engine.dedup().contains("http://x/a.zip"));
    let again = engine.on_download_created(zip(3, "http://x/a.zip")).await;
    assert!(again.is_success(), "{again:?}");
}

// ==================== Retry ====================

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_record_single_error() {
    let (_backend, store) = loaded_store(json!({"maxRetries": 2})).await;
    let host = RecordingHost::new();
    let daemon = ScriptedDaemon::failing();
    let engine = DispatchEngine::with_config(store.clone(), daemon.clone(), host.clone(), fast_config());

    let outcome = engine.on_download_created(zip(1, "http://x/a.zip")).await;

    assert!(matches!(outcome, DispatchOutcome::Failed { .. }));
    assert_eq!(daemon.call_count(), 3);
    let history = store.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, HistoryStatus::Error);
    let notes = host.notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationKind::Error);
    assert!(notes[0].message.contains(MSG_FAILED));
    assert!(engine.pending_snapshot().is_empty());
    assert!(!engine.dedup().contains("http://x/a.zip"));
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_after_transient_failures() {
    let (_backend, store) = loaded_store(json!({"maxRetries": 3})).await;
    let daemon = ScriptedDaemon::scripted(&[false, false]);
    let engine =
        DispatchEngine::with_config(store.clone(), daemon.clone(), RecordingHost::new(), fast_config());

    let outcome = engine.on_download_created(zip(1, "http://x/a.zip")).await;

    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(daemon.call_count(), 3);
    assert_eq!(store.history().len(), 1);
    assert_eq!(store.history()[0].status, HistoryStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn test_auto_retry_disabled_tries_once() {
    let (_backend, store) = loaded_store(json!({"autoRetry": false, "maxRetries": 5})).await;
    let daemon = ScriptedDaemon::failing();
    let engine = DispatchEngine::with_config(store, daemon.clone(), RecordingHost::new(), fast_config());

    let outcome = engine.on_download_created(zip(1, "http://x/a.zip")).await;

    assert!(matches!(outcome, DispatchOutcome::Failed { .. }));
    assert_eq!(daemon.call_count(), 1);
}

// ==================== Host Failures ====================

#[tokio::test]
async fn test_cancel_rejection_does_not_block_dispatch() {
    let (_backend, store) = loaded_store(json!({})).await;
    let host = RecordingHost::rejecting_cancel();
    let daemon = ScriptedDaemon::accepting();
    let engine = DispatchEngine::new(store, daemon.clone(), host.clone());

    let outcome = engine.on_download_created(zip(1, "http://x/a.zip")).await;

    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(daemon.call_count(), 1);
    assert!(
        !host
            .calls()
            .iter()
            .any(|call| matches!(call, HostCall::Erase(_)))
    );
}

#[tokio::test]
async fn test_storage_failure_keeps_history_in_memory() {
    let store = Arc::new(SettingsStore::new(Arc::new(FailingStore)));
    assert!(store.load().await.is_err());
    let host = RecordingHost::new();
    let engine = DispatchEngine::new(store.clone(), ScriptedDaemon::accepting(), host.clone());

    let outcome = engine.on_download_created(zip(1, "http://x/a.zip")).await;

    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(store.history().len(), 1);
    assert_eq!(host.history_updates(), 1);
}

// ==================== Batch Add ====================

#[tokio::test]
async fn test_add_many_records_each_url_and_skips_blanks() {
    let (backend, store) = loaded_store(json!({})).await;
    let host = RecordingHost::new();
    let daemon = ScriptedDaemon::scripted(&[true, false]);
    let engine = DispatchEngine::new(store.clone(), daemon.clone(), host.clone());

    let urls = vec![
        "http://x/one.iso".to_string(),
        "   ".to_string(),
        " http://x/dir/two.zip?sig=1 ".to_string(),
    ];
    let outcomes = engine.add_many(&urls).await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].status, HistoryStatus::Success);
    assert_eq!(outcomes[0].filename, "one.iso");
    assert_eq!(outcomes[1].status, HistoryStatus::Error);
    assert_eq!(outcomes[1].filename, "two.zip");

    let calls = daemon.calls();
    assert!(calls.iter().all(|call| call.filename.is_none()));
    assert_eq!(calls[1].url, "http://x/dir/two.zip?sig=1");

    let history = store.history();
    assert_eq!(history[0].url, "http://x/dir/two.zip?sig=1");
    assert_eq!(history[1].url, "http://x/one.iso");
    assert_eq!(host.history_updates(), 1);
    assert!(host.notifications().is_empty());
    let persisted = backend.snapshot();
    assert_eq!(
        persisted
            .get(keys::DOWNLOAD_HISTORY)
            .and_then(|v| v.as_array())
            .map(Vec::len),
        Some(2)
    );
}

#[tokio::test]
async fn test_native_error_clears_pending_entry() {
    let (_backend, store) = loaded_store(json!({})).await;
    let engine = DispatchEngine::new(store, ScriptedDaemon::accepting(), RecordingHost::new());

    let delta = DownloadDelta {
        id: DownloadId(9),
        url: Some("http://x/a.zip".to_string()),
        state: Some(Delta {
            current: Some(DownloadState::Interrupted),
            previous: Some(DownloadState::InProgress),
        }),
        error: Some(Delta {
            current: Some("NETWORK_FAILED".to_string()),
            previous: None,
        }),
    };
    assert!(delta.is_error());
    assert!(!delta.is_complete());
    engine.on_download_changed(&delta);
    assert!(engine.pending_snapshot().is_empty());
}
