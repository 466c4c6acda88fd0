//! Lifecycle controller tests: shutdown outcomes, ordering, and failure
//! isolation, driven through in-memory sources and sinks.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use postwatch_core::{
    types::POST_MESSAGE, Author, Event, KeywordRule, Post, PostId, RuleSet, SelfIdentity, Space,
    SpaceKey, Topic, TopicId,
};
use postwatch_daemon::{
    run_blocking, ChannelSource, Controller, DaemonError, EventSource, LifecycleState, Pipeline,
    ShutdownOutcome,
};
use postwatch_dispatch::{DesktopSink, RemoteSink, SinkError, Sinks};
use postwatch_renderer::Composer;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn event(id: i64, message: &str) -> Event {
    Event {
        kind: POST_MESSAGE.to_string(),
        space: Some(Space { key: SpaceKey::from("ABC") }),
        topic: Topic { id: TopicId(1), name: "design".into() },
        post: Post {
            id: PostId(id),
            message: message.into(),
            author: Author { name: "bob".into(), is_bot: false },
        },
        is_direct_message: false,
    }
}

fn rules() -> RuleSet {
    RuleSet {
        target_space_keys: [SpaceKey::from("ABC")].into_iter().collect(),
        keyword_rules: vec![KeywordRule::anywhere("review")],
        desktop_enabled: true,
        ..RuleSet::default()
    }
}

/// Desktop sink that records titles+post URLs and reports each call.
struct Recorder {
    seen: Arc<Mutex<Vec<String>>>,
    notify: mpsc::UnboundedSender<()>,
    fail: bool,
}

impl DesktopSink for Recorder {
    fn send(&self, _title: &str, body: &str) -> Result<(), SinkError> {
        self.seen
            .lock()
            .unwrap()
            .push(body.lines().next().unwrap_or_default().to_string());
        let _ = self.notify.send(());
        if self.fail {
            Err(SinkError::NotConfigured { sink: "desktop" })
        } else {
            Ok(())
        }
    }
}

struct CountingRemote(Arc<Mutex<u32>>);

impl RemoteSink for CountingRemote {
    fn send(&self, _topic_id: TopicId, _body: &str) -> Result<(), SinkError> {
        *self.0.lock().unwrap() += 1;
        Ok(())
    }
}

struct Harness {
    controller: Controller,
    seen: Arc<Mutex<Vec<String>>>,
    calls: mpsc::UnboundedReceiver<()>,
}

fn harness(rules: RuleSet, sinks: impl FnOnce(Sinks) -> Sinks, fail: bool, timeout: Duration) -> Harness {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (notify, calls) = mpsc::unbounded_channel();
    let sinks = sinks(Sinks::new().with_desktop(Recorder {
        seen: seen.clone(),
        notify,
        fail,
    }));
    let pipeline = Pipeline::new(
        rules,
        SelfIdentity::new("carol"),
        Composer::builtin().expect("composer"),
        sinks,
    );
    Harness {
        controller: Controller::new(pipeline, timeout),
        seen,
        calls,
    }
}

fn wait_for_calls(
    mut calls: mpsc::UnboundedReceiver<()>,
    n: usize,
) -> impl Future<Output = ()> {
    async move {
        for _ in 0..n {
            calls.recv().await;
        }
    }
}

/// Source that never yields and never finishes stopping.
struct StuckSource;

impl EventSource for StuckSource {
    async fn next_event(&mut self) -> Result<Option<Event>, DaemonError> {
        std::future::pending().await
    }

    async fn stop(&mut self) {
        std::future::pending::<()>().await
    }
}

/// Source that ends at once but takes a while to release its subscription.
struct SlowStopSource;

impl EventSource for SlowStopSource {
    async fn next_event(&mut self) -> Result<Option<Event>, DaemonError> {
        Ok(None)
    }

    async fn stop(&mut self) {
        tokio::time::sleep(Duration::from_secs(5)).await
    }
}

/// Source that is not ready until its gate opens.
struct GatedSource(Option<oneshot::Receiver<()>>);

impl EventSource for GatedSource {
    async fn ready(&mut self) -> Result<(), DaemonError> {
        if let Some(gate) = self.0.take() {
            gate.await
                .map_err(|_| DaemonError::Source("gate dropped".into()))?;
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<Event>, DaemonError> {
        std::future::pending().await
    }
}

/// Source whose read parks a blocking thread, like tokio's stdin.
struct BlockingReadSource;

impl EventSource for BlockingReadSource {
    async fn next_event(&mut self) -> Result<Option<Event>, DaemonError> {
        tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(30)))
            .await
            .map_err(|e| DaemonError::Source(e.to_string()))?;
        Ok(None)
    }
}

/// Source that fails after yielding its events.
struct FailingSource(Vec<Event>);

impl EventSource for FailingSource {
    async fn next_event(&mut self) -> Result<Option<Event>, DaemonError> {
        if self.0.is_empty() {
            Err(DaemonError::Source("connection reset".into()))
        } else {
            Ok(Some(self.0.remove(0)))
        }
    }
}

// ---------------------------------------------------------------------------
// Shutdown outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_request_completes_and_reports_counts() {
    let h = harness(rules(), |s| s, false, Duration::from_secs(5));
    let (tx, source) = ChannelSource::channel(8);
    tx.send(event(1, "please review")).await.expect("send");
    tx.send(event(2, "nothing")).await.expect("send");
    tx.send(event(3, "review again")).await.expect("send");

    let report = h
        .controller
        .run_until(source, wait_for_calls(h.calls, 2))
        .await;

    assert_eq!(report.outcome, ShutdownOutcome::Completed);
    assert_eq!(report.stats.notified, 2);
    assert_eq!(report.stats.dropped, 1);
    assert_eq!(report.stats.events, 3);
    assert_eq!(report.stats.dispatch_failures, 0);
    drop(tx);
}

#[tokio::test(start_paused = true)]
async fn stuck_source_is_abandoned_after_deadline() {
    let h = harness(rules(), |s| s, false, Duration::from_secs(60));
    let started = tokio::time::Instant::now();

    let report = h.controller.run_until(StuckSource, async {}).await;

    assert_eq!(report.outcome, ShutdownOutcome::TimedOut);
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert_eq!(report.stats.events, 0);
}

#[tokio::test(start_paused = true)]
async fn source_ending_during_shutdown_keeps_its_outcome() {
    let h = harness(rules(), |s| s, false, Duration::from_secs(60));

    let report = h
        .controller
        .run_until(SlowStopSource, tokio::time::sleep(Duration::from_secs(1)))
        .await;

    assert_eq!(report.outcome, ShutdownOutcome::SourceEnded);
}

#[test]
fn blocking_read_does_not_outlive_the_deadline() {
    let h = harness(rules(), |s| s, false, Duration::from_secs(1));
    let started = std::time::Instant::now();

    let report = run_blocking(
        h.controller,
        async { Ok::<_, DaemonError>(BlockingReadSource) },
        async { tokio::time::sleep(Duration::from_millis(200)).await },
    )
    .expect("run");

    assert_eq!(report.outcome, ShutdownOutcome::Completed);
    assert!(
        started.elapsed() < Duration::from_secs(10),
        "returned after {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn end_of_input_stops_in_order() {
    let h = harness(rules(), |s| s, false, Duration::from_secs(5));
    let (tx, source) = ChannelSource::channel(8);
    for id in 1..=4 {
        tx.send(event(id, "review")).await.expect("send");
    }
    drop(tx);

    let report = h
        .controller
        .run_until(source, std::future::pending::<()>())
        .await;

    assert_eq!(report.outcome, ShutdownOutcome::SourceEnded);
    assert_eq!(report.stats.notified, 4);
    let seen = h.seen.lock().unwrap().clone();
    let expected: Vec<String> = (1..=4)
        .map(|id| format!("https://typetalk.com/topics/1/posts/{id}"))
        .collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn source_error_is_reported() {
    let h = harness(rules(), |s| s, false, Duration::from_secs(5));
    let source = FailingSource(vec![event(1, "review")]);

    let report = h
        .controller
        .run_until(source, std::future::pending::<()>())
        .await;

    assert_eq!(report.outcome, ShutdownOutcome::SourceFailed);
    assert_eq!(report.stats.notified, 1);
}

// ---------------------------------------------------------------------------
// Failure isolation and state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failing_desktop_still_reposts() {
    let mut r = rules();
    r.remote_enabled = true;
    r.remote_target_topic_id = TopicId(99);
    let reposts = Arc::new(Mutex::new(0));
    let remote = CountingRemote(reposts.clone());
    let h = harness(r, move |s| s.with_remote(remote), true, Duration::from_secs(5));

    let (tx, source) = ChannelSource::channel(2);
    tx.send(event(1, "review")).await.expect("send");
    drop(tx);

    let report = h
        .controller
        .run_until(source, std::future::pending::<()>())
        .await;

    assert_eq!(report.stats.dispatch_failures, 1);
    assert_eq!(*reposts.lock().unwrap(), 1);
}

#[tokio::test]
async fn state_moves_from_idle_through_running_to_stopped() {
    let h = harness(rules(), |s| s, false, Duration::from_secs(5));
    let state = h.controller.state();
    assert_eq!(*state.borrow(), LifecycleState::Idle);

    let (_tx, source) = ChannelSource::channel(1);
    let mut during = state.clone();
    let report = h
        .controller
        .run_until(source, async move {
            during
                .wait_for(|s| *s == LifecycleState::Running)
                .await
                .expect("state channel");
        })
        .await;

    assert_eq!(report.outcome, ShutdownOutcome::Completed);
    assert_eq!(*state.borrow(), LifecycleState::Stopped);
}

#[tokio::test]
async fn running_waits_for_the_source_to_be_ready() {
    let h = harness(rules(), |s| s, false, Duration::from_secs(5));
    let mut state = h.controller.state();
    let (open, gate) = oneshot::channel();

    let report = h
        .controller
        .run_until(GatedSource(Some(gate)), async move {
            for _ in 0..5 {
                tokio::task::yield_now().await;
            }
            assert_eq!(*state.borrow(), LifecycleState::Subscribing);
            open.send(()).expect("gate");
            state
                .wait_for(|s| *s == LifecycleState::Running)
                .await
                .expect("state channel");
        })
        .await;

    assert_eq!(report.outcome, ShutdownOutcome::Completed);
}
