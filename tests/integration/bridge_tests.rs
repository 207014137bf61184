//! Integration tests for the bridge entry points and session history.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;
use session_bridge::bridge::media_information_arguments;
use session_bridge::callbacks::CallbackRegistry;
use session_bridge::config::GlobalConfig;
use session_bridge::models::log::LogRedirectionStrategy;
use session_bridge::models::session::{Session, SessionKind, SessionState};
use session_bridge::pool::WorkerPool;
use session_bridge::{AppError, SessionBridge};

use super::test_helpers::{args, test_bridge, test_config, StubExecutor, WAIT};

#[test]
fn execute_sync_returns_terminal_session_with_ordered_timestamps() {
    let bridge = test_bridge(Arc::new(StubExecutor::succeeding()));

    let session =
        bridge.execute_sync(bridge.ffmpeg_session(args(&["-v", "error", "-i", "in.mp4", "out.mp4"])));

    assert!(session.state().is_terminal());
    let start = session.start_time().expect("start time");
    let end = session.end_time().expect("end time");
    assert!(start >= session.create_time());
    assert!(end >= start);
}

#[test]
fn execute_sync_with_missing_binary_fails_with_timestamps() {
    let config = GlobalConfig {
        ffmpeg_binary: "/nonexistent/bin/ffmpeg".into(),
        ..test_config()
    };
    let bridge = SessionBridge::new(
        config.clone(),
        Arc::new(session_bridge::executor::process::ProcessExecutor::new(
            &config,
            Arc::new(CallbackRegistry::new()),
        )),
        Arc::new(CallbackRegistry::new()),
    )
    .expect("bridge");

    let session =
        bridge.execute_sync(bridge.ffmpeg_session(args(&["-v", "error", "-i", "in.mp4", "out.mp4"])));

    assert_eq!(session.state(), SessionState::Failed);
    assert!(session.return_code().is_none());
    assert!(session.end_time().unwrap() >= session.start_time().unwrap());
    assert!(session.start_time().unwrap() >= session.create_time());
}

#[test]
fn execute_sync_does_not_notify() {
    let bridge = test_bridge(Arc::new(StubExecutor::succeeding()));
    let calls = Arc::new(AtomicUsize::new(0));
    let global_calls = Arc::clone(&calls);
    bridge.registry().set_complete_callback(
        SessionKind::Ffmpeg,
        Some(Arc::new(move |_: &Session| {
            global_calls.fetch_add(1, Ordering::SeqCst);
        })),
    );

    let session = bridge.execute_sync(bridge.ffmpeg_session(Vec::new()));

    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn command_strings_are_parsed() {
    let executor = Arc::new(StubExecutor::succeeding());
    let bridge = test_bridge(executor.clone());

    let session = bridge.execute(SessionKind::Ffprobe, r#"-i "my clip.mp4" -show_format"#);

    assert!(session.is_ffprobe());
    assert_eq!(executor.seen(), [args(&["-i", "my clip.mp4", "-show_format"])]);
}

#[test]
fn command_async_notifies_supplied_callback() {
    let bridge = test_bridge(Arc::new(StubExecutor::succeeding()));
    let (tx, rx) = mpsc::channel();

    let session = bridge.execute_command_async(
        SessionKind::Ffmpeg,
        "-i in.mp4 out.mp4",
        Some(Arc::new(move |session: &Session| {
            tx.send(session.id()).unwrap();
        })),
    );

    assert_eq!(rx.recv_timeout(WAIT).expect("callback"), session.id());
    assert_eq!(session.arguments(), args(&["-i", "in.mp4", "out.mp4"]));
}

#[test]
fn media_information_session_uses_probe_arguments() {
    let executor = Arc::new(StubExecutor::succeeding());
    let bridge = test_bridge(executor.clone());

    let session = bridge.get_media_information("/videos/in.mp4");

    assert!(session.is_media_information());
    assert_eq!(session.arguments(), media_information_arguments("/videos/in.mp4"));
    assert_eq!(
        session.command(),
        "-v error -hide_banner -print_format json -show_format -show_streams -show_chapters -i /videos/in.mp4"
    );
    assert_eq!(executor.seen().len(), 1);
}

#[test]
fn media_information_async_notifies() {
    let bridge = test_bridge(Arc::new(StubExecutor::succeeding()));
    let (tx, rx) = mpsc::channel();

    let session = bridge.get_media_information_async(
        "in.mp4",
        Some(Arc::new(move |session: &Session| {
            tx.send(session.state()).unwrap();
        })),
    );

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), SessionState::Completed);
    assert!(session.is_media_information());
}

#[test]
fn sessions_inherit_configured_log_strategy() {
    let bridge = test_bridge(Arc::new(StubExecutor::succeeding()));
    let session = bridge.ffmpeg_session(Vec::new());
    assert_eq!(
        session.log_redirection_strategy(),
        bridge.config().log_redirection_strategy
    );
    assert_eq!(
        session.log_redirection_strategy(),
        LogRedirectionStrategy::NeverPrintLogs
    );
    assert_eq!(bridge.pool().lanes(), bridge.config().worker_threads);
}

#[test]
fn execute_async_on_custom_pool() {
    let bridge = test_bridge(Arc::new(StubExecutor::succeeding()));
    let pool = WorkerPool::new(1).expect("pool");
    let (tx, rx) = mpsc::channel();

    let session = bridge.execute_async_on(
        bridge
            .ffprobe_session(Vec::new())
            .with_complete_callback(Arc::new(move |_: &Session| tx.send(()).unwrap())),
        &pool,
    );

    rx.recv_timeout(WAIT).expect("callback on custom pool");
    assert_eq!(session.state(), SessionState::Completed);
    pool.shutdown(Duration::from_secs(1));
}

#[test]
fn history_tracks_and_evicts_sessions() {
    let config = GlobalConfig {
        session_history_size: 2,
        ..test_config()
    };
    let bridge = SessionBridge::new(
        config,
        Arc::new(StubExecutor::succeeding()),
        Arc::new(CallbackRegistry::new()),
    )
    .expect("bridge");

    let first = bridge.execute_sync(bridge.ffmpeg_session(Vec::new()));
    let second = bridge.execute_sync(bridge.ffprobe_session(Vec::new()));
    let third = bridge.execute_sync(bridge.ffmpeg_session(Vec::new()));

    let ids: Vec<_> = bridge.sessions().iter().map(|s| s.id()).collect();
    assert_eq!(ids, [second.id(), third.id()]);
    assert!(bridge.session_by_id(first.id()).is_none());
    assert_eq!(bridge.last_session().map(|s| s.id()), Some(third.id()));
    assert_eq!(bridge.sessions_of(SessionKind::Ffprobe).len(), 1);

    bridge.clear_sessions();
    assert!(bridge.sessions().is_empty());
}

#[test]
fn invalid_config_is_rejected() {
    let config = GlobalConfig {
        worker_threads: 0,
        ..GlobalConfig::default()
    };
    let result = SessionBridge::new(
        config,
        Arc::new(StubExecutor::succeeding()),
        Arc::new(CallbackRegistry::new()),
    );
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
#[serial]
fn process_bridge_uses_global_registry() {
    let bridge = SessionBridge::with_process_executor(test_config()).expect("bridge");
    assert!(Arc::ptr_eq(bridge.registry(), &CallbackRegistry::global()));
    bridge.shutdown(Duration::from_secs(1));
}

#[cfg(unix)]
#[test]
fn pipes_are_created_in_configured_directory() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = GlobalConfig {
        pipe_directory: dir.path().join("pipes"),
        ..test_config()
    };
    let bridge = SessionBridge::new(
        config,
        Arc::new(StubExecutor::succeeding()),
        Arc::new(CallbackRegistry::new()),
    )
    .expect("bridge");

    let pipe = bridge.register_new_pipe().expect("pipe");
    assert!(pipe.starts_with(dir.path().join("pipes")));
    bridge.close_pipe(&pipe).expect("close");
    assert!(!pipe.exists());
}
