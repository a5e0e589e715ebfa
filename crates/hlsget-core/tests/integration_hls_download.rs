//! End-to-end tests against a local scripted HTTP server: real fetcher, real
//! SQLite state, real filesystem sink.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::hls_server::HlsServer;
use hlsget_core::config::{HlsgetConfig, RetryConfig};
use hlsget_core::fetch::HttpFetcher;
use hlsget_core::scheduler::{DownloadEvent, Engine, EngineHandle};
use hlsget_core::sink::DirSink;
use hlsget_core::state_db::{JobState, StateDb};
use tokio::sync::mpsc::UnboundedReceiver;

fn test_cfg(capacity: usize) -> HlsgetConfig {
    HlsgetConfig {
        max_concurrent_fetches: capacity,
        retry: Some(RetryConfig {
            max_attempts: 4,
            base_delay_secs: 0.05,
            max_delay_secs: 1,
        }),
        ..HlsgetConfig::default()
    }
}

/// Serve a media playlist at `manifest_path` with `n` segments under the same
/// directory, each a distinct one-byte-pattern body.
fn serve_playlist(server: &HlsServer, manifest_path: &str, n: usize) -> Vec<Vec<u8>> {
    let dir = &manifest_path[..manifest_path.rfind('/').unwrap() + 1];
    let mut manifest = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    let mut bodies = Vec::new();
    for i in 0..n {
        manifest.push_str(&format!("#EXTINF:4.0,\nseg{i}.ts\n"));
        let body = vec![i as u8; 16];
        server.route_bytes(&format!("{dir}seg{i}.ts"), body.clone());
        bodies.push(body);
    }
    manifest.push_str("#EXT-X-ENDLIST\n");
    server.route_text(manifest_path, &manifest);
    bodies
}

struct Harness {
    db: StateDb,
    handle: EngineHandle,
    events: UnboundedReceiver<DownloadEvent>,
    engine: tokio::task::JoinHandle<()>,
    out_dir: tempfile::TempDir,
    _db_dir: tempfile::TempDir,
}

async fn start_engine(cfg: &HlsgetConfig) -> Harness {
    let db_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let db = StateDb::open_at(db_dir.path().join("state.db")).await.unwrap();
    let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(5)).unwrap());
    let sink = Arc::new(DirSink::new(out_dir.path()));
    let (engine, handle, events) = Engine::new(db.clone(), fetcher, sink, cfg);
    let engine = tokio::spawn(engine.exit_when_idle().run());
    Harness {
        db,
        handle,
        events,
        engine,
        out_dir,
        _db_dir: db_dir,
    }
}

async fn drain_until_idle(events: &mut UnboundedReceiver<DownloadEvent>) -> Vec<DownloadEvent> {
    let mut seen = Vec::new();
    loop {
        let ev = tokio::time::timeout(Duration::from_secs(30), events.recv())
            .await
            .expect("engine timed out")
            .expect("event stream closed before idle");
        let idle = matches!(ev, DownloadEvent::Idle);
        seen.push(ev);
        if idle {
            return seen;
        }
    }
}

#[tokio::test]
async fn downloads_manifest_end_to_end() {
    let server = HlsServer::start();
    let bodies = serve_playlist(&server, "/show/index.m3u8", 5);

    let mut h = start_engine(&test_cfg(4)).await;
    let id = h
        .handle
        .enqueue(&server.url("/show/index.m3u8"), Some("Test Show"))
        .await
        .unwrap();
    let seen = drain_until_idle(&mut h.events).await;
    h.engine.await.unwrap();

    let path = seen
        .iter()
        .find_map(|e| match e {
            DownloadEvent::Completed { job_id, path } if *job_id == id => Some(path.clone()),
            _ => None,
        })
        .expect("completed event");
    assert_eq!(path, h.out_dir.path().join("Test_Show.ts"));

    let expected: Vec<u8> = bodies.into_iter().flatten().collect();
    assert_eq!(std::fs::read(&path).unwrap(), expected);

    let job = h.db.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.segment_count, 5);
    let url = server.url("/show/index.m3u8");
    assert!(
        h.db.list_chunk_indices(&url).await.unwrap().is_empty(),
        "chunks purged after delivery"
    );
}

#[tokio::test]
async fn flaky_segment_is_retried_with_backoff() {
    let server = HlsServer::start();
    serve_playlist(&server, "/v/index.m3u8", 3);
    // Two failures then success: backoff should cost at least 50ms + 100ms.
    server.fail_first("/v/seg1.ts", 2);

    let mut h = start_engine(&test_cfg(4)).await;
    let started = Instant::now();
    let id = h
        .handle
        .enqueue(&server.url("/v/index.m3u8"), None)
        .await
        .unwrap();
    let seen = drain_until_idle(&mut h.events).await;
    h.engine.await.unwrap();

    assert!(seen.iter().any(|e| matches!(
        e,
        DownloadEvent::Completed { job_id, .. } if *job_id == id
    )));
    assert_eq!(server.hits("/v/seg1.ts"), 3);
    assert!(
        started.elapsed() >= Duration::from_millis(150),
        "expected two backoff sleeps, elapsed {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn master_playlist_follows_last_variant() {
    let server = HlsServer::start();
    server.route_text(
        "/stream/master.m3u8",
        "#EXTM3U\n\
         #EXT-X-STREAM-INF:BANDWIDTH=800000\n\
         low/index.m3u8\n\
         #EXT-X-STREAM-INF:BANDWIDTH=2400000\n\
         hi/index.m3u8\n",
    );
    serve_playlist(&server, "/stream/low/index.m3u8", 2);
    let bodies = serve_playlist(&server, "/stream/hi/index.m3u8", 2);

    let mut h = start_engine(&test_cfg(4)).await;
    h.handle
        .enqueue(&server.url("/stream/master.m3u8"), Some("variant"))
        .await
        .unwrap();
    let seen = drain_until_idle(&mut h.events).await;
    h.engine.await.unwrap();

    assert!(seen
        .iter()
        .any(|e| matches!(e, DownloadEvent::Completed { .. })));
    assert_eq!(server.hits("/stream/low/index.m3u8"), 0, "low variant untouched");
    let expected: Vec<u8> = bodies.into_iter().flatten().collect();
    assert_eq!(
        std::fs::read(h.out_dir.path().join("variant.ts")).unwrap(),
        expected
    );
}

#[tokio::test]
async fn pause_resume_never_refetches_stored_segments() {
    let server = HlsServer::start();
    serve_playlist(&server, "/p/index.m3u8", 12);
    for i in 0..12 {
        server.delay(&format!("/p/seg{i}.ts"), Duration::from_millis(50));
    }

    let mut h = start_engine(&test_cfg(4)).await;
    let id = h
        .handle
        .enqueue(&server.url("/p/index.m3u8"), None)
        .await
        .unwrap();

    // Pause once durable progress exists, then resume shortly after.
    loop {
        match h.events.recv().await.expect("events closed") {
            DownloadEvent::Progress { stats, .. } if stats.downloaded > 0 => break,
            DownloadEvent::Progress { .. } => continue,
            other => panic!("unexpected event before pause: {other:?}"),
        }
    }
    h.handle.pause(id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.handle.resume(id).await.unwrap();

    let seen = drain_until_idle(&mut h.events).await;
    h.engine.await.unwrap();

    assert!(seen.iter().any(|e| matches!(
        e,
        DownloadEvent::Completed { job_id, .. } if *job_id == id
    )));
    // Pause drained in-flight work into the store; nothing is fetched twice.
    for i in 0..12 {
        assert_eq!(server.hits(&format!("/p/seg{i}.ts")), 1, "seg{i} refetched");
    }
}

#[tokio::test]
async fn cancel_discards_progress_and_reports_nothing() {
    let server = HlsServer::start();
    serve_playlist(&server, "/c/index.m3u8", 6);
    for i in 0..6 {
        server.delay(&format!("/c/seg{i}.ts"), Duration::from_millis(100));
    }

    let mut h = start_engine(&test_cfg(2)).await;
    let id = h
        .handle
        .enqueue(&server.url("/c/index.m3u8"), Some("doomed"))
        .await
        .unwrap();

    loop {
        match h.events.recv().await.expect("events closed") {
            DownloadEvent::Progress { stats, .. } if stats.downloaded > 0 => break,
            DownloadEvent::Progress { .. } => continue,
            other => panic!("unexpected event before cancel: {other:?}"),
        }
    }
    h.handle.cancel(id).await.unwrap();

    let seen = drain_until_idle(&mut h.events).await;
    h.engine.await.unwrap();

    // Silence after cancel: no terminal event for the job.
    assert!(seen.iter().all(|e| !matches!(
        e,
        DownloadEvent::Completed { job_id, .. } | DownloadEvent::Failed { job_id, .. }
            if *job_id == id
    )));
    let job = h.db.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Cancelled);
    let url = server.url("/c/index.m3u8");
    assert!(h.db.list_chunk_indices(&url).await.unwrap().is_empty());
    assert!(!h.out_dir.path().join("doomed.ts").exists());
}

#[tokio::test]
async fn cancelling_active_job_advances_to_next_queued() {
    let server = HlsServer::start();
    serve_playlist(&server, "/first/index.m3u8", 6);
    for i in 0..6 {
        server.delay(&format!("/first/seg{i}.ts"), Duration::from_millis(100));
    }
    let bodies = serve_playlist(&server, "/second/index.m3u8", 2);

    let mut h = start_engine(&test_cfg(2)).await;
    let id_first = h
        .handle
        .enqueue(&server.url("/first/index.m3u8"), Some("dropped"))
        .await
        .unwrap();
    let id_second = h
        .handle
        .enqueue(&server.url("/second/index.m3u8"), Some("kept"))
        .await
        .unwrap();

    // Cancel the active job once it has durable progress.
    loop {
        match h.events.recv().await.expect("events closed") {
            DownloadEvent::Progress { job_id, stats }
                if job_id == id_first && stats.downloaded > 0 =>
            {
                break
            }
            DownloadEvent::Progress { .. } => continue,
            other => panic!("unexpected event before cancel: {other:?}"),
        }
    }
    h.handle.cancel(id_first).await.unwrap();

    let seen = drain_until_idle(&mut h.events).await;
    h.engine.await.unwrap();

    // The queued job ran to completion; the cancelled one stayed silent.
    assert!(seen.iter().any(|e| matches!(
        e,
        DownloadEvent::Completed { job_id, .. } if *job_id == id_second
    )));
    assert!(seen.iter().all(|e| !matches!(
        e,
        DownloadEvent::Completed { job_id, .. } | DownloadEvent::Failed { job_id, .. }
            if *job_id == id_first
    )));

    let expected: Vec<u8> = bodies.into_iter().flatten().collect();
    assert_eq!(
        std::fs::read(h.out_dir.path().join("kept.ts")).unwrap(),
        expected
    );
    let first = h.db.get_job(id_first).await.unwrap().unwrap();
    assert_eq!(first.state, JobState::Cancelled);
    assert_eq!(
        h.db.get_job(id_second).await.unwrap().unwrap().state,
        JobState::Completed
    );
    let first_url = server.url("/first/index.m3u8");
    assert!(h.db.list_chunk_indices(&first_url).await.unwrap().is_empty());
}

#[tokio::test]
async fn preexisting_chunks_are_not_refetched() {
    let server = HlsServer::start();
    let bodies = serve_playlist(&server, "/r/index.m3u8", 4);

    let mut h = start_engine(&test_cfg(4)).await;
    let url = server.url("/r/index.m3u8");
    // Segment 0 already persisted by an earlier run.
    h.db.put_chunk(&url, 0, &bodies[0]).await.unwrap();

    let id = h.handle.enqueue(&url, Some("resumed")).await.unwrap();
    let seen = drain_until_idle(&mut h.events).await;
    h.engine.await.unwrap();

    assert!(seen.iter().any(|e| matches!(
        e,
        DownloadEvent::Completed { job_id, .. } if *job_id == id
    )));
    assert_eq!(server.hits("/r/seg0.ts"), 0, "stored segment refetched");
    let expected: Vec<u8> = bodies.into_iter().flatten().collect();
    assert_eq!(
        std::fs::read(h.out_dir.path().join("resumed.ts")).unwrap(),
        expected
    );
}
