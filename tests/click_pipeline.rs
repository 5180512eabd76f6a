mod common;

use common::TestApp;
use link_resolver::application::services::{Resolution, ResolveRequest};
use link_resolver::config::ExecutionContext;
use link_resolver::domain::click_buffer::STAGING_LIST_KEY;
use link_resolver::domain::click_event::ClientInfo;
use link_resolver::domain::click_worker::{run_background_worker, run_flush_timer};
use link_resolver::domain::entities::ClickEvent;
use link_resolver::infrastructure::cache::FastStore;
use link_resolver::state::AppState;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::watch;

fn request(code: &str) -> ResolveRequest {
    ResolveRequest {
        code: code.to_string(),
        force_revalidate: false,
        client: ClientInfo::new(
            Some("198.51.100.4".to_string()),
            Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148"),
            Some("https://news.example.net/"),
            Some("de"),
        ),
    }
}

fn event(record_id: i64) -> ClickEvent {
    ClickEvent::capture(record_id, &request("x").client, chrono::Utc::now())
}

async fn resolve_times(state: &AppState, code: &str, times: usize) {
    for _ in 0..times {
        let resolution = state.resolver.resolve(&request(code)).await.unwrap();
        assert!(matches!(resolution, Resolution::Found(_)));
    }
}

#[tokio::test]
async fn test_flush_writes_events_and_bumps_counters() {
    let mut app = TestApp::new();
    let link = app.links.seed_live("abc123", "https://example.org/");

    resolve_times(&app.state, "abc123", 3).await;
    app.run_jobs().await;
    assert_eq!(app.state.buffer.len().await, 3);

    let report = app.state.buffer.flush().await.unwrap();

    assert_eq!(report.drained, 3);
    assert_eq!(report.written, 3);
    assert!(app.state.buffer.is_empty().await);

    let stored = app.clicks.stored();
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|e| e.record_id == link.id));
    assert_eq!(stored[0].device, "phone");
    assert_eq!(stored[0].os, "ios");
    assert_eq!(stored[0].geo, "DE");
    assert_eq!(stored[0].referrer, "https://news.example.net/");

    assert_eq!(app.links.get(link.id).unwrap().total_clicks, 3);
}

#[tokio::test]
async fn test_no_capture_outside_production() {
    let mut config = common::test_config();
    config.app_env = ExecutionContext::Staging;
    let mut app = TestApp::with_config(config);
    app.links.seed_live("abc123", "https://example.org/");

    resolve_times(&app.state, "abc123", 2).await;
    app.run_jobs().await;

    assert!(app.state.buffer.is_empty().await);
}

#[tokio::test]
async fn test_failed_write_is_requeued_and_retried_next_cycle() {
    let app = TestApp::new();
    let buffer = Arc::clone(&app.state.buffer);

    for _ in 0..4 {
        buffer.capture(event(1)).await.unwrap();
    }

    app.clicks.set_failing(true);
    let report = buffer.flush().await.unwrap();
    assert_eq!(report.written, 0);
    assert_eq!(report.requeued, 4);
    assert_eq!(buffer.len().await, 4);
    assert!(app.clicks.stored().is_empty());

    app.clicks.set_failing(false);
    let report = buffer.flush().await.unwrap();
    assert_eq!(report.written, 4);
    assert!(buffer.is_empty().await);
    assert_eq!(app.clicks.stored().len(), 4);
}

#[tokio::test]
async fn test_append_during_flush_is_kept_for_next_cycle() {
    let app = TestApp::new();
    let buffer = Arc::clone(&app.state.buffer);

    buffer.capture(event(1)).await.unwrap();
    buffer.capture(event(1)).await.unwrap();

    app.clicks.hold.store(true, Ordering::SeqCst);
    let flushing = tokio::spawn({
        let buffer = Arc::clone(&buffer);
        async move { buffer.flush().await }
    });

    app.clicks.entered.notified().await;
    for _ in 0..3 {
        buffer.capture(event(2)).await.unwrap();
    }
    app.clicks.hold.store(false, Ordering::SeqCst);
    app.clicks.release.notify_one();

    let report = flushing.await.unwrap().unwrap();
    assert_eq!(report.written, 2);
    assert_eq!(buffer.len().await, 3);
    assert_eq!(app.store.list_len(STAGING_LIST_KEY).await.unwrap(), 3);

    let report = buffer.flush().await.unwrap();
    assert_eq!(report.written, 3);
    assert_eq!(app.clicks.stored().len(), 5);
}

#[tokio::test]
async fn test_undecodable_entries_are_dropped() {
    let app = TestApp::new();
    let buffer = Arc::clone(&app.state.buffer);

    app.store
        .push_back(STAGING_LIST_KEY, vec![b"not json".to_vec()])
        .await
        .unwrap();
    assert_eq!(buffer.recover().await.unwrap(), 1);
    buffer.capture(event(1)).await.unwrap();

    let report = buffer.flush().await.unwrap();

    assert_eq!(report.drained, 2);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.written, 1);
    assert!(buffer.is_empty().await);
}

#[tokio::test]
async fn test_threshold_triggers_inline_flush() {
    let mut config = common::test_config();
    config.flush_threshold = 3;
    let app = TestApp::with_config(config);
    let buffer = Arc::clone(&app.state.buffer);

    buffer.capture(event(1)).await.unwrap();
    buffer.capture(event(1)).await.unwrap();
    assert!(app.clicks.stored().is_empty());

    buffer.capture(event(1)).await.unwrap();
    assert_eq!(app.clicks.stored().len(), 3);
    assert!(buffer.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_captures_stay_cheap_while_click_store_is_down() {
    let mut config = common::test_config();
    config.flush_threshold = 3;
    config.flush_retry_attempts = 3;
    let mut app = TestApp::with_config(config);
    app.links.seed_live("abc123", "https://example.org/");
    app.clicks.set_failing(true);

    resolve_times(&app.state, "abc123", 3).await;
    app.run_jobs().await;
    let after_first_threshold = app.clicks.attempts();
    assert_eq!(after_first_threshold, 4);
    assert_eq!(app.state.buffer.len().await, 3);

    resolve_times(&app.state, "abc123", 5).await;
    let started = std::time::Instant::now();
    app.run_jobs().await;
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(app.clicks.attempts(), after_first_threshold);
    assert_eq!(app.state.buffer.len().await, 8);

    app.clicks.set_failing(false);
    let report = app.state.buffer.flush().await.unwrap();
    assert_eq!(report.written, 8);
    assert_eq!(app.clicks.stored().len(), 8);
}

#[tokio::test]
async fn test_shutdown_drains_queue_and_flushes() {
    let app = TestApp::new();
    app.links.seed_live("abc123", "https://example.org/");

    let TestApp {
        state,
        clicks,
        jobs_rx,
        job_context,
        ..
    } = app;
    let buffer = Arc::clone(&state.buffer);

    let worker = tokio::spawn(run_background_worker(jobs_rx, job_context, 2));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let timer = tokio::spawn(run_flush_timer(
        Arc::clone(&buffer),
        Duration::from_secs(3600),
        shutdown_rx,
    ));

    resolve_times(&state, "abc123", 5).await;
    drop(state);

    worker.await.unwrap();
    shutdown_tx.send(true).unwrap();
    timer.await.unwrap();

    assert_eq!(clicks.stored().len(), 5);
    assert!(buffer.is_empty().await);
}
