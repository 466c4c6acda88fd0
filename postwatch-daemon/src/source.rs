//! Event sources feeding the consumption loop.
//!
//! A source yields decoded [`Event`]s until it ends (`Ok(None)`) or fails.
//! `next_event` must be cancel-safe: the runtime races it against the
//! shutdown signal and drops the future when shutdown wins.

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use postwatch_core::Event;

use crate::error::{io_err, DaemonError};

/// Streaming source of chat events.
pub trait EventSource: Send {
    /// Resolves once the subscription is live. A constructed source is ready
    /// unless it says otherwise.
    fn ready(&mut self) -> impl Future<Output = Result<(), DaemonError>> + Send {
        async { Ok(()) }
    }

    /// Next event; `Ok(None)` once the stream has ended.
    fn next_event(&mut self) -> impl Future<Output = Result<Option<Event>, DaemonError>> + Send;

    /// Release the underlying subscription. The runtime bounds this by the
    /// shutdown deadline.
    fn stop(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

// ---------------------------------------------------------------------------
// JsonLinesSource
// ---------------------------------------------------------------------------

/// Newline-delimited JSON events from any async reader.
///
/// Blank lines are skipped; lines that do not decode as an event are logged
/// and skipped.
pub struct JsonLinesSource<R> {
    label: PathBuf,
    lines: Lines<R>,
    line_no: usize,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    /// `label` names the input in error messages (a path, or `-` for stdin).
    pub fn new(label: impl Into<PathBuf>, reader: R) -> Self {
        Self {
            label: label.into(),
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: AsyncBufRead + Unpin + Send> EventSource for JsonLinesSource<R> {
    async fn next_event(&mut self) -> Result<Option<Event>, DaemonError> {
        loop {
            let Some(line) = self
                .lines
                .next_line()
                .await
                .map_err(|e| io_err(&self.label, e))?
            else {
                debug!(input = %self.label.display(), lines = self.line_no, "event input ended");
                return Ok(None);
            };
            self.line_no += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(line) {
                Ok(event) => return Ok(Some(event)),
                Err(err) => warn!(
                    input = %self.label.display(),
                    line = self.line_no,
                    error = %err,
                    "skipping undecodable event"
                ),
            }
        }
    }
}

/// Boxed reader so stdin and files share one source type.
pub type DynReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// Where `run` reads events from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventInput {
    Stdin,
    File(PathBuf),
}

impl EventInput {
    /// `-` means stdin; anything else is a file path.
    pub fn from_arg(arg: Option<&Path>) -> Self {
        match arg {
            None => EventInput::Stdin,
            Some(path) if path.as_os_str() == "-" => EventInput::Stdin,
            Some(path) => EventInput::File(path.to_path_buf()),
        }
    }

    pub async fn open(&self) -> Result<JsonLinesSource<DynReader>, DaemonError> {
        match self {
            EventInput::Stdin => Ok(JsonLinesSource::new(
                "-",
                Box::new(BufReader::new(tokio::io::stdin())) as DynReader,
            )),
            EventInput::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| io_err(path, e))?;
                Ok(JsonLinesSource::new(
                    path.clone(),
                    Box::new(BufReader::new(file)) as DynReader,
                ))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelSource
// ---------------------------------------------------------------------------

/// Events pushed through an mpsc channel; ends when every sender is dropped.
pub struct ChannelSource {
    rx: mpsc::Receiver<Event>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<Event>) -> Self {
        Self { rx }
    }

    /// A bounded channel and the source reading from it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Event>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

impl EventSource for ChannelSource {
    async fn next_event(&mut self) -> Result<Option<Event>, DaemonError> {
        Ok(self.rx.recv().await)
    }

    async fn stop(&mut self) {
        self.rx.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
