//! Per-event processing: classify, compose, dispatch.

use serde::Serialize;
use tracing::{debug, warn};

use postwatch_core::{Event, RuleSet, SelfIdentity};
use postwatch_dispatch::{dispatch, Sinks};
use postwatch_filter::{classify, Decision, DropReason};
use postwatch_renderer::Composer;

/// Everything needed to turn an event into notifications. Built once at
/// startup and shared read-only with the consumption task.
pub struct Pipeline {
    rules: RuleSet,
    me: SelfIdentity,
    composer: Composer,
    sinks: Sinks,
}

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum EventOutcome {
    Dropped { reason: DropReason },
    /// `skipped` counts payloads whose template failed to render.
    Notified { sent: usize, failed: usize, skipped: usize },
}

impl Pipeline {
    pub fn new(rules: RuleSet, me: SelfIdentity, composer: Composer, sinks: Sinks) -> Self {
        Self {
            rules,
            me,
            composer,
            sinks,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Process one event to completion. Sink calls block, so run this off the
    /// async executor.
    pub fn process(&self, event: &Event) -> EventOutcome {
        let matched = match classify(event, &self.rules, &self.me) {
            Decision::Drop { reason } => {
                debug!(
                    topic_id = %event.topic.id,
                    post_id = %event.post.id,
                    kind = %event.kind,
                    %reason,
                    "event dropped"
                );
                return EventOutcome::Dropped { reason };
            }
            Decision::Notify { matched_keywords } => matched_keywords,
        };
        debug!(
            topic_id = %event.topic.id,
            post_id = %event.post.id,
            matches = ?matched,
            "event accepted"
        );

        let mut skipped = 0;
        let payloads: Vec<_> = self
            .composer
            .compose_each(event, &matched, &self.rules, &self.me)
            .into_iter()
            .filter_map(|rendered| match rendered {
                Ok(payload) => Some(payload),
                Err(err) => {
                    warn!(
                        topic_id = %event.topic.id,
                        post_id = %event.post.id,
                        error = %err,
                        "payload skipped: render failed"
                    );
                    skipped += 1;
                    None
                }
            })
            .collect();

        let outcomes = dispatch(&payloads, &self.sinks);
        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        EventOutcome::Notified {
            sent: outcomes.len() - failed,
            failed,
            skipped,
        }
    }
}
