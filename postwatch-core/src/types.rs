//! Domain types for Postwatch.
//!
//! Stream events mirror the JSON shape delivered by the event source
//! (camelCase keys, every field except `kind` optional). The [`RuleSet`] is
//! built once from settings and shared read-only by every stage.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Event kind that is evaluated; every other kind is dropped.
pub const POST_MESSAGE: &str = "postMessage";

/// Default host used to build post URLs.
pub const DEFAULT_WEB_URL: &str = "https://typetalk.com";

/// Default text appended to truncated fields.
pub const DEFAULT_OMISSION_MARKER: &str = "...";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed key for a space (organization) on the platform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceKey(pub String);

impl fmt::Display for SpaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SpaceKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SpaceKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A topic identifier. Zero and negative values never name a real topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(pub i64);

impl TopicId {
    /// `true` for ids that can refer to an existing topic (`> 0`).
    pub fn is_set(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for TopicId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A post identifier, unique within a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub i64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for PostId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Stream events
// ---------------------------------------------------------------------------

/// Treat an explicit `null` like an absent key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The space a stream event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Space {
    #[serde(default, deserialize_with = "null_as_default")]
    pub key: SpaceKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Topic {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: TopicId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: PostId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: Author,
}

/// One decoded stream message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<Space>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub topic: Topic,
    #[serde(default, deserialize_with = "null_as_default")]
    pub post: Post,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_direct_message: bool,
}

impl Event {
    /// Space key, if the event carries a non-empty one.
    pub fn space_key(&self) -> Option<&SpaceKey> {
        self.space
            .as_ref()
            .map(|space| &space.key)
            .filter(|key| !key.0.is_empty())
    }

    pub fn is_post_message(&self) -> bool {
        self.kind == POST_MESSAGE
    }
}

/// The authenticated account, fetched once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelfIdentity {
    pub name: String,
}

impl SelfIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

// ---------------------------------------------------------------------------
// Rule set
// ---------------------------------------------------------------------------

/// A keyword to look for, optionally restricted to one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    /// `0` (or negative) matches in any topic.
    #[serde(default)]
    pub scope_topic_id: TopicId,
}

impl KeywordRule {
    pub fn new(keyword: impl Into<String>, scope_topic_id: i64) -> Self {
        Self {
            keyword: keyword.into(),
            scope_topic_id: TopicId(scope_topic_id),
        }
    }

    /// Any-topic rule.
    pub fn anywhere(keyword: impl Into<String>) -> Self {
        Self::new(keyword, 0)
    }

    /// `true` if this rule applies to posts in `topic`.
    pub fn in_scope(&self, topic: TopicId) -> bool {
        !self.scope_topic_id.is_set() || self.scope_topic_id == topic
    }
}

/// Truncation limits for composed text. A limit of `0` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatLimits {
    pub max_topic_name_length: usize,
    pub max_message_length: usize,
    pub max_message_line: usize,
    pub omission_marker: String,
}

impl Default for FormatLimits {
    fn default() -> Self {
        Self {
            max_topic_name_length: 0,
            max_message_length: 0,
            max_message_line: 0,
            omission_marker: DEFAULT_OMISSION_MARKER.to_string(),
        }
    }
}

/// Complete, immutable filtering and formatting parameters for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Empty set rejects every event.
    pub target_space_keys: BTreeSet<SpaceKey>,
    /// Extra text treated as "this post mentions me", in addition to the account name.
    pub mention_marker: Option<String>,
    pub keyword_rules: Vec<KeywordRule>,
    pub case_sensitive: bool,
    pub ignore_bot: bool,
    pub ignored_users: BTreeSet<String>,
    pub desktop_enabled: bool,
    pub remote_enabled: bool,
    /// Topic reposts go to; `0` disables reposting and the loop guard.
    pub remote_target_topic_id: TopicId,
    pub with_mention_on_repost: bool,
    pub limits: FormatLimits,
    pub post_url_base: String,
    pub hide_post_url: bool,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            target_space_keys: BTreeSet::new(),
            mention_marker: None,
            keyword_rules: Vec::new(),
            case_sensitive: true,
            ignore_bot: false,
            ignored_users: BTreeSet::new(),
            desktop_enabled: false,
            remote_enabled: false,
            remote_target_topic_id: TopicId(0),
            with_mention_on_repost: false,
            limits: FormatLimits::default(),
            post_url_base: DEFAULT_WEB_URL.to_string(),
            hide_post_url: false,
        }
    }
}

impl RuleSet {
    /// Canonical link to a post: `<base>/topics/{topic}/posts/{post}`.
    pub fn post_url(&self, topic: TopicId, post: PostId) -> String {
        format!(
            "{}/topics/{}/posts/{}",
            self.post_url_base.trim_end_matches('/'),
            topic,
            post
        )
    }

    /// `true` when reposts are both enabled and pointed at a real topic.
    pub fn reposts_enabled(&self) -> bool {
        self.remote_enabled && self.remote_target_topic_id.is_set()
    }
}

// ---------------------------------------------------------------------------
// Notification payloads
// ---------------------------------------------------------------------------

/// Where a composed payload is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum SinkTarget {
    Desktop,
    Remote { topic_id: TopicId },
}

impl SinkTarget {
    pub fn name(&self) -> &'static str {
        match self {
            SinkTarget::Desktop => "desktop",
            SinkTarget::Remote { .. } => "remote",
        }
    }
}

impl fmt::Display for SinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkTarget::Desktop => write!(f, "desktop"),
            SinkTarget::Remote { topic_id } => write!(f, "remote(topic {topic_id})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub sink: SinkTarget,
    pub title: String,
    pub body: String,
}

impl NotificationPayload {
    /// First body line, for log lines.
    pub fn summary(&self) -> &str {
        self.body.lines().next().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(SpaceKey::from("abc").to_string(), "abc");
        assert_eq!(TopicId(42).to_string(), "42");
        assert_eq!(PostId(7).to_string(), "7");
    }

    #[test]
    fn topic_id_is_set_only_when_positive() {
        assert!(TopicId(1).is_set());
        assert!(!TopicId(0).is_set());
        assert!(!TopicId(-3).is_set());
    }

    #[test]
    fn keyword_rule_scope() {
        assert!(KeywordRule::anywhere("x").in_scope(TopicId(9)));
        assert!(KeywordRule::new("x", -1).in_scope(TopicId(9)));
        assert!(KeywordRule::new("x", 42).in_scope(TopicId(42)));
        assert!(!KeywordRule::new("x", 42).in_scope(TopicId(9)));
    }

    #[test]
    fn post_url_uses_base_without_double_slash() {
        let rules = RuleSet {
            post_url_base: "https://chat.example.com/".to_string(),
            ..RuleSet::default()
        };
        assert_eq!(
            rules.post_url(TopicId(12), PostId(345)),
            "https://chat.example.com/topics/12/posts/345"
        );
    }

    #[test]
    fn empty_space_key_counts_as_absent() {
        let event = Event {
            kind: POST_MESSAGE.to_string(),
            space: Some(Space::default()),
            ..Event::default()
        };
        assert!(event.space_key().is_none());
    }

    #[test]
    fn reposts_require_positive_topic() {
        let mut rules = RuleSet {
            remote_enabled: true,
            ..RuleSet::default()
        };
        assert!(!rules.reposts_enabled());
        rules.remote_target_topic_id = TopicId(5);
        assert!(rules.reposts_enabled());
    }

    #[test]
    fn payload_summary_is_first_line() {
        let payload = NotificationPayload {
            sink: SinkTarget::Desktop,
            title: "t".to_string(),
            body: "https://x/topics/1/posts/2\nhello".to_string(),
        };
        assert_eq!(payload.summary(), "https://x/topics/1/posts/2");
        assert_eq!(SinkTarget::Remote { topic_id: TopicId(3) }.to_string(), "remote(topic 3)");
    }
}
