//! Delivery of composed payloads to their sinks.
//!
//! Payloads are sent in order and independently: a failing sink is logged and
//! recorded in its [`DispatchOutcome`], and the next payload is still sent.

use postwatch_core::{NotificationPayload, SinkTarget};
use tracing::{info, warn};

use crate::error::SinkError;
use crate::sink::Sinks;

/// Result of delivering one payload.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub sink: SinkTarget,
    pub result: Result<(), SinkError>,
}

impl DispatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Send one payload to the sink it names.
pub fn dispatch_one(payload: &NotificationPayload, sinks: &Sinks) -> Result<(), SinkError> {
    match payload.sink {
        SinkTarget::Desktop => sinks
            .desktop
            .as_ref()
            .ok_or(SinkError::NotConfigured { sink: "desktop" })?
            .send(&payload.title, &payload.body),
        SinkTarget::Remote { topic_id } => sinks
            .remote
            .as_ref()
            .ok_or(SinkError::NotConfigured { sink: "remote" })?
            .send(topic_id, &payload.body),
    }
}

/// Send every payload, logging each outcome.
pub fn dispatch(payloads: &[NotificationPayload], sinks: &Sinks) -> Vec<DispatchOutcome> {
    payloads
        .iter()
        .map(|payload| {
            let result = dispatch_one(payload, sinks);
            match &result {
                Ok(()) => info!(sink = %payload.sink, title = %payload.title, "notification sent"),
                Err(e) => warn!(
                    sink = %payload.sink,
                    title = %payload.title,
                    summary = payload.summary(),
                    error = %e,
                    "notification failed"
                ),
            }
            DispatchOutcome {
                sink: payload.sink,
                result,
            }
        })
        .collect()
}
