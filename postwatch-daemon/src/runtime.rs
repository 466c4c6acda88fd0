use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{io_err, DaemonError};
use crate::pipeline::{EventOutcome, Pipeline};
use crate::source::EventSource;

/// Where the controller is in its lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Subscribing,
    Running,
    ShuttingDown,
    Stopped,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownOutcome {
    /// Shutdown was requested and the consumption task finished in time.
    Completed,
    /// Shutdown was requested and the deadline elapsed; the task was abandoned.
    TimedOut,
    /// The source reached end of stream.
    SourceEnded,
    /// The source returned an error.
    SourceFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub events: u64,
    pub notified: u64,
    pub dropped: u64,
    pub dispatch_failures: u64,
    pub render_failures: u64,
}

/// Summary returned when the controller stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub stats: RunStats,
    pub outcome: ShutdownOutcome,
    pub duration_ms: u128,
}

#[derive(Default)]
struct Counters {
    events: AtomicU64,
    notified: AtomicU64,
    dropped: AtomicU64,
    dispatch_failures: AtomicU64,
    render_failures: AtomicU64,
}

impl Counters {
    fn record(&self, outcome: &EventOutcome) {
        self.events.fetch_add(1, Ordering::Relaxed);
        match outcome {
            EventOutcome::Dropped { .. } => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            EventOutcome::Notified { failed, skipped, .. } => {
                self.notified.fetch_add(1, Ordering::Relaxed);
                self.dispatch_failures
                    .fetch_add(*failed as u64, Ordering::Relaxed);
                self.render_failures
                    .fetch_add(*skipped as u64, Ordering::Relaxed);
            }
        }
    }

    fn snapshot(&self) -> RunStats {
        RunStats {
            events: self.events.load(Ordering::Relaxed),
            notified: self.notified.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
enum ConsumeEnd {
    Requested,
    SourceEnded,
    SourceFailed,
}

impl ConsumeEnd {
    fn outcome(self) -> ShutdownOutcome {
        match self {
            ConsumeEnd::Requested => ShutdownOutcome::Completed,
            ConsumeEnd::SourceEnded => ShutdownOutcome::SourceEnded,
            ConsumeEnd::SourceFailed => ShutdownOutcome::SourceFailed,
        }
    }
}

/// Move to `next` only from `from`, so a late transition never goes backwards.
fn advance(state_tx: &watch::Sender<LifecycleState>, from: LifecycleState, next: LifecycleState) {
    state_tx.send_if_modified(|state| {
        if *state != from {
            return false;
        }
        tracing::debug!(state = ?next, "lifecycle transition");
        *state = next;
        true
    });
}

/// Owns the consumption task and enforces the shutdown deadline.
pub struct Controller {
    pipeline: Arc<Pipeline>,
    shutdown_timeout: Duration,
    state_tx: Arc<watch::Sender<LifecycleState>>,
}

impl Controller {
    pub fn new(pipeline: Pipeline, shutdown_timeout: Duration) -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Idle);
        Self {
            pipeline: Arc::new(pipeline),
            shutdown_timeout,
            state_tx: Arc::new(state_tx),
        }
    }

    /// Observe lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: LifecycleState) {
        tracing::debug!(?state, "lifecycle transition");
        self.state_tx.send_replace(state);
    }

    /// Consume `source` until it ends or `shutdown` resolves.
    ///
    /// The state reaches [`LifecycleState::Running`] once the source reports
    /// ready from inside the consumption task.
    ///
    /// On shutdown the consumption task is signalled, allowed to finish the
    /// event in hand and stop the source, and awaited for at most the
    /// shutdown timeout. After the deadline the task is aborted and the report
    /// records [`ShutdownOutcome::TimedOut`].
    pub async fn run_until<S, F>(&self, source: S, shutdown: F) -> RunReport
    where
        S: EventSource + 'static,
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let counters = Arc::new(Counters::default());
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        self.set_state(LifecycleState::Subscribing);
        let mut handle: JoinHandle<ConsumeEnd> = {
            let pipeline = self.pipeline.clone();
            let counters = counters.clone();
            let shutdown_rx = shutdown_tx.subscribe();
            let state_tx = self.state_tx.clone();
            tokio::spawn(consume(source, pipeline, counters, state_tx, shutdown_rx))
        };

        tokio::pin!(shutdown);
        let outcome = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!(timeout_secs = self.shutdown_timeout.as_secs(), "shutdown requested");
                self.set_state(LifecycleState::ShuttingDown);
                let _ = shutdown_tx.send(());
                match tokio::time::timeout(self.shutdown_timeout, &mut handle).await {
                    Ok(Ok(end)) => end.outcome(),
                    Ok(Err(err)) => {
                        tracing::error!(error = %err, "consumption task failed during shutdown");
                        ShutdownOutcome::SourceFailed
                    }
                    Err(_) => {
                        tracing::warn!(
                            timeout_secs = self.shutdown_timeout.as_secs(),
                            "shutdown deadline elapsed; abandoning consumption task"
                        );
                        handle.abort();
                        ShutdownOutcome::TimedOut
                    }
                }
            }
            joined = &mut handle => {
                self.set_state(LifecycleState::ShuttingDown);
                match joined {
                    Ok(end) => end.outcome(),
                    Err(err) => {
                        tracing::error!(error = %err, "consumption task join failure");
                        ShutdownOutcome::SourceFailed
                    }
                }
            }
        };

        self.set_state(LifecycleState::Stopped);
        let report = RunReport {
            stats: counters.snapshot(),
            outcome,
            duration_ms: started.elapsed().as_millis(),
        };
        tracing::info!(
            outcome = ?report.outcome,
            events = report.stats.events,
            notified = report.stats.notified,
            dropped = report.stats.dropped,
            dispatch_failures = report.stats.dispatch_failures,
            "stopped"
        );
        report
    }
}

async fn consume<S: EventSource>(
    mut source: S,
    pipeline: Arc<Pipeline>,
    counters: Arc<Counters>,
    state_tx: Arc<watch::Sender<LifecycleState>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> ConsumeEnd {
    let end = 'run: {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break 'run ConsumeEnd::Requested,
            ready = source.ready() => if let Err(err) = ready {
                tracing::error!(error = %err, "event source failed to become ready");
                break 'run ConsumeEnd::SourceFailed;
            }
        }
        advance(&state_tx, LifecycleState::Subscribing, LifecycleState::Running);
        tracing::info!("consuming events");

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break ConsumeEnd::Requested,
                next = source.next_event() => match next {
                    Ok(Some(event)) => {
                        let pipeline = pipeline.clone();
                        match tokio::task::spawn_blocking(move || pipeline.process(&event)).await {
                            Ok(outcome) => counters.record(&outcome),
                            Err(err) => tracing::error!(error = %err, "event processing panicked"),
                        }
                    }
                    Ok(None) => break ConsumeEnd::SourceEnded,
                    Err(err) => {
                        tracing::error!(error = %err, "event source failed");
                        break ConsumeEnd::SourceFailed;
                    }
                }
            }
        }
    };
    source.stop().await;
    end
}

/// Resolves on ctrl-c, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}

/// Build a multi-threaded runtime, open the source inside it, and run until a
/// signal or end of input.
pub fn start_blocking<S, O>(controller: Controller, open: O) -> Result<RunReport, DaemonError>
where
    S: EventSource + 'static,
    O: Future<Output = Result<S, DaemonError>>,
{
    run_blocking(controller, open, shutdown_signal())
}

/// [`start_blocking`] with a caller-supplied shutdown trigger.
///
/// Returns as soon as the controller stops. Blocking work still in flight
/// (a stdin read, an abandoned sink call) is left to die with the process.
pub fn run_blocking<S, O, F>(
    controller: Controller,
    open: O,
    shutdown: F,
) -> Result<RunReport, DaemonError>
where
    S: EventSource + 'static,
    O: Future<Output = Result<S, DaemonError>>,
    F: Future<Output = ()>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    let result = runtime.block_on(async {
        let source = open.await?;
        Ok(controller.run_until(source, shutdown).await)
    });
    runtime.shutdown_background();
    result
}

/// Install the fmt subscriber. `RUST_LOG` wins; otherwise `debug` selects the
/// default level. Safe to call more than once.
pub fn init_tracing(debug: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
