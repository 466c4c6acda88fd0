//! # postwatch-dispatch
//!
//! Notification sinks and payload delivery.
//!
//! [`dispatch`] sends composed payloads to the configured [`Sinks`]; one sink
//! failing never stops the others. Concrete sinks: [`CommandDesktopSink`]
//! (platform notifier program) and [`ApiRemoteSink`] (topic repost through
//! [`ApiClient`]).

pub mod api;
pub mod dispatcher;
pub mod error;
pub mod sink;

pub use api::{ApiClient, ApiRemoteSink, CachedToken, ClientCredentials, CredentialProvider, StaticToken};
pub use dispatcher::{dispatch, dispatch_one, DispatchOutcome};
pub use error::{ApiError, SinkError};
pub use sink::{CommandDesktopSink, DesktopSink, Notifier, RemoteSink, Sinks};
