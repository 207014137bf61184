//! Integration tests for asynchronous execution with callback notification.
//!
//! Covers notification ordering, fault isolation between the per-session and
//! global callbacks, non-blocking submission, and per-session isolation of
//! concurrent notifications.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use session_bridge::callbacks::{CallbackRegistry, CompleteCallback, NotifyOutcome};
use session_bridge::executor::Executor;
use session_bridge::models::session::{ReturnCode, Session, SessionId, SessionKind, SessionState};
use session_bridge::tasks::AsyncExecuteTask;

use super::test_helpers::{args, test_bridge, PanickingExecutor, StubExecutor, WAIT};

fn task(
    session: Session,
    executor: Arc<dyn Executor>,
    registry: &Arc<CallbackRegistry>,
) -> (Arc<Session>, AsyncExecuteTask) {
    let session = Arc::new(session);
    let task = AsyncExecuteTask::new(
        Arc::clone(&session),
        executor,
        Arc::clone(registry),
        Duration::from_millis(100),
    );
    (session, task)
}

fn pushing(order: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> CompleteCallback {
    let order = Arc::clone(order);
    Arc::new(move |_: &Session| order.lock().unwrap().push(tag))
}

#[test]
fn session_callback_runs_before_global_callback() {
    let registry = Arc::new(CallbackRegistry::new());
    let order = Arc::new(Mutex::new(Vec::new()));
    registry.set_complete_callback(SessionKind::Ffmpeg, Some(pushing(&order, "global")));

    let session = Session::new(SessionKind::Ffmpeg, Vec::new())
        .with_complete_callback(pushing(&order, "session"));
    let (_, task) = task(session, Arc::new(StubExecutor::succeeding()), &registry);

    let report = task.run();

    assert_eq!(*order.lock().unwrap(), ["session", "global"]);
    assert_eq!(report.session, NotifyOutcome::Delivered);
    assert_eq!(report.global, NotifyOutcome::Delivered);
}

#[test]
fn callbacks_observe_terminal_session() {
    let registry = Arc::new(CallbackRegistry::new());
    let states = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&states);
    let session = Session::new(SessionKind::Ffprobe, Vec::new()).with_complete_callback(Arc::new(
        move |session: &Session| {
            seen.lock()
                .unwrap()
                .push((session.state(), session.return_code()));
        },
    ));
    let executor = Arc::new(StubExecutor::with(Duration::ZERO, ReturnCode::new(1)));
    let (_, task) = task(session, executor, &registry);

    task.run();

    assert_eq!(
        *states.lock().unwrap(),
        [(SessionState::Failed, Some(ReturnCode::new(1)))]
    );
}

#[test]
fn faulting_session_callback_still_reaches_global_once() {
    let registry = Arc::new(CallbackRegistry::new());
    let global_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&global_calls);
    registry.set_complete_callback(
        SessionKind::Ffmpeg,
        Some(Arc::new(move |_: &Session| {
            counter.fetch_add(1, Ordering::SeqCst);
        })),
    );

    let session = Session::new(SessionKind::Ffmpeg, Vec::new())
        .with_complete_callback(Arc::new(|_: &Session| panic!("session callback failure")));
    let (session, task) = task(session, Arc::new(StubExecutor::succeeding()), &registry);

    let report = task.run();

    assert_eq!(report.session, NotifyOutcome::Faulted);
    assert_eq!(report.global, NotifyOutcome::Delivered);
    assert_eq!(global_calls.load(Ordering::SeqCst), 1);
    assert_eq!(registry.fault_count(), 1);
    assert_eq!(session.state(), SessionState::Completed);
}

#[test]
fn faulting_global_callback_is_contained() {
    let registry = Arc::new(CallbackRegistry::new());
    registry.set_complete_callback(
        SessionKind::Ffmpeg,
        Some(Arc::new(|_: &Session| panic!("global callback failure"))),
    );
    let order = Arc::new(Mutex::new(Vec::new()));
    let session = Session::new(SessionKind::Ffmpeg, Vec::new())
        .with_complete_callback(pushing(&order, "session"));
    let (_, task) = task(session, Arc::new(StubExecutor::succeeding()), &registry);

    let report = task.run();

    assert_eq!(report.session, NotifyOutcome::Delivered);
    assert_eq!(report.global, NotifyOutcome::Faulted);
    assert_eq!(*order.lock().unwrap(), ["session"]);
}

#[test]
fn global_callback_alone_is_notified_exactly_once() {
    let registry = Arc::new(CallbackRegistry::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    registry.set_complete_callback(
        SessionKind::MediaInformation,
        Some(Arc::new(move |_: &Session| {
            counter.fetch_add(1, Ordering::SeqCst);
        })),
    );

    let session = Session::new(SessionKind::MediaInformation, Vec::new());
    let (_, task) = task(session, Arc::new(StubExecutor::succeeding()), &registry);

    let report = task.run();

    assert_eq!(report.session, NotifyOutcome::Absent);
    assert_eq!(report.global, NotifyOutcome::Delivered);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn executor_panic_fails_session_and_still_notifies() {
    let registry = Arc::new(CallbackRegistry::new());
    let order = Arc::new(Mutex::new(Vec::new()));
    let session = Session::new(SessionKind::Ffmpeg, Vec::new())
        .with_complete_callback(pushing(&order, "session"));
    let (session, task) = task(session, Arc::new(PanickingExecutor), &registry);

    task.run();

    assert_eq!(session.state(), SessionState::Failed);
    assert!(session
        .fail_reason()
        .unwrap()
        .contains("executor panicked: executor failure"));
    assert_eq!(*order.lock().unwrap(), ["session"]);
}

#[test]
fn execute_async_returns_before_executor_finishes() {
    let bridge = test_bridge(Arc::new(StubExecutor::sleeping(Duration::from_millis(200))));
    let (tx, rx) = mpsc::channel();
    let session = bridge
        .ffmpeg_session(args(&["-i", "in.mp4", "out.mp4"]))
        .with_complete_callback(Arc::new(move |session: &Session| {
            tx.send(session.state()).unwrap();
        }));

    let started = Instant::now();
    let session = bridge.execute_async(session);
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(50), "took {elapsed:?}");
    assert!(!session.state().is_terminal());

    let notified = rx.recv_timeout(WAIT).expect("completion callback");
    assert_eq!(notified, SessionState::Completed);
    assert_eq!(session.state(), SessionState::Completed);
}

#[test]
fn concurrent_sessions_get_their_own_notifications() {
    let bridge = test_bridge(Arc::new(StubExecutor::sleeping(Duration::from_millis(50))));
    let (tx, rx) = mpsc::channel::<(&'static str, SessionId)>();

    let tx_a = tx.clone();
    let a = bridge.execute_async(bridge.ffmpeg_session(args(&["a"])).with_complete_callback(
        Arc::new(move |session: &Session| tx_a.send(("a", session.id())).unwrap()),
    ));
    let tx_b = tx;
    let b = bridge.execute_async(bridge.ffmpeg_session(args(&["b"])).with_complete_callback(
        Arc::new(move |session: &Session| tx_b.send(("b", session.id())).unwrap()),
    ));

    let mut received = vec![
        rx.recv_timeout(WAIT).expect("first notification"),
        rx.recv_timeout(WAIT).expect("second notification"),
    ];
    received.sort_by_key(|(tag, _)| *tag);

    assert_eq!(received, [("a", a.id()), ("b", b.id())]);
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}
