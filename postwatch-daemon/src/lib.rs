//! Lifecycle runtime: event sources, the per-event pipeline, and the
//! controller that runs consumption until a signal or end of input.

mod error;
pub mod pipeline;
mod runtime;
pub mod source;

pub use error::DaemonError;
pub use pipeline::{EventOutcome, Pipeline};
pub use runtime::{
    init_tracing, run_blocking, shutdown_signal, start_blocking, Controller, LifecycleState, RunReport,
    RunStats, ShutdownOutcome,
};
pub use source::{ChannelSource, EventInput, EventSource, JsonLinesSource};
