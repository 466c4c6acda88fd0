//! Serializable rendering payload built from an accepted event.

use serde::{Deserialize, Serialize};

use postwatch_core::{Event, RuleSet, SelfIdentity};

use crate::error::RenderError;
use crate::truncate::{truncate_chars, truncate_message};

/// Values every notification template can reference.
///
/// `topic_name` and `message` are already truncated; the untruncated message is
/// available as `full_message` for custom templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContext {
    pub post_url: String,
    pub topic_id: i64,
    pub topic_name: String,
    pub post_id: i64,
    pub message: String,
    pub full_message: String,
    pub author: String,
    pub matches: Vec<String>,
    pub self_name: String,
    pub with_mention: bool,
    pub hide_post_url: bool,
}

impl NotificationContext {
    /// Build the context for one accepted event.
    pub fn build(event: &Event, matched: &[String], rules: &RuleSet, me: &SelfIdentity) -> Self {
        let limits = &rules.limits;
        NotificationContext {
            post_url: rules.post_url(event.topic.id, event.post.id),
            topic_id: event.topic.id.0,
            topic_name: truncate_chars(
                &event.topic.name,
                limits.max_topic_name_length,
                &limits.omission_marker,
            ),
            post_id: event.post.id.0,
            message: truncate_message(&event.post.message, limits),
            full_message: event.post.message.clone(),
            author: event.post.author.name.clone(),
            matches: matched.to_vec(),
            self_name: me.name.clone(),
            with_mention: rules.with_mention_on_repost,
            hide_post_url: rules.hide_post_url,
        }
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        Ok(tera::Context::from_serialize(self)?)
    }
}
