//! Postwatch core library: event model, rule set, configuration, errors.
//!
//! Public API surface:
//! - [`types`]: newtypes, stream events, [`RuleSet`] and notification payloads
//! - [`config`]: YAML settings, environment overrides, rule-set construction
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::Settings;
pub use error::ConfigError;
pub use types::{
    Author, Event, FormatLimits, KeywordRule, NotificationPayload, Post, PostId, RuleSet,
    SelfIdentity, SinkTarget, Space, SpaceKey, Topic, TopicId,
};
