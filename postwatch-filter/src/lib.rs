//! Event classification for `postwatch-filter`.
//!
//! `classify(event, rules, me)` walks a fixed, ordered table of suppression
//! checks and then collects keyword matches. The first failing check decides the
//! outcome, so step order is part of the contract: the loop guard runs before
//! the keyword match, and the space check runs before everything else.
//!
//! Every check is a pure function of `(event, rules, me)`; no state is carried
//! between events.

use std::fmt;

use postwatch_core::{Event, KeywordRule, RuleSet, SelfIdentity};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// The check that rejected an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Space key absent or not in the target set.
    NotTargetSpace,
    /// Event kind other than `postMessage`.
    NotPostMessage,
    /// Posted into the repost topic.
    NotifyTopic,
    /// Message mentions the operator.
    SelfMention,
    DirectMessage,
    Bot,
    IgnoredUser,
    /// Every check passed but no keyword rule matched.
    NoKeywordMatch,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::NotTargetSpace => "not_target_space",
            DropReason::NotPostMessage => "not_post_message",
            DropReason::NotifyTopic => "notify_topic",
            DropReason::SelfMention => "self_mention",
            DropReason::DirectMessage => "direct_message",
            DropReason::Bot => "bot",
            DropReason::IgnoredUser => "ignored_user",
            DropReason::NoKeywordMatch => "no_keyword_match",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum Decision {
    Drop { reason: DropReason },
    /// Matched keywords in rule order, duplicates kept.
    Notify { matched_keywords: Vec<String> },
}

impl Decision {
    pub fn is_notify(&self) -> bool {
        matches!(self, Decision::Notify { .. })
    }
}

/// A suppression check: returns `true` when the event may continue.
pub type Check = fn(&Event, &RuleSet, &SelfIdentity) -> bool;

/// One entry of the ordered check table.
#[derive(Clone, Copy)]
pub struct Step {
    pub reason: DropReason,
    pub check: Check,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("reason", &self.reason).finish()
    }
}

/// Suppression checks in evaluation order. Keyword matching runs after all of
/// them pass.
pub const STEPS: [Step; 7] = [
    Step { reason: DropReason::NotTargetSpace, check: pass_space },
    Step { reason: DropReason::NotPostMessage, check: pass_kind },
    Step { reason: DropReason::NotifyTopic, check: pass_loop_guard },
    Step { reason: DropReason::SelfMention, check: pass_self_mention },
    Step { reason: DropReason::DirectMessage, check: pass_direct_message },
    Step { reason: DropReason::Bot, check: pass_bot },
    Step { reason: DropReason::IgnoredUser, check: pass_ignored_user },
];

fn pass_space(event: &Event, rules: &RuleSet, _: &SelfIdentity) -> bool {
    is_target_space(event, rules)
}

fn pass_kind(event: &Event, _: &RuleSet, _: &SelfIdentity) -> bool {
    event.is_post_message()
}

fn pass_loop_guard(event: &Event, rules: &RuleSet, _: &SelfIdentity) -> bool {
    !is_notify_topic(event, rules)
}

fn pass_self_mention(event: &Event, rules: &RuleSet, me: &SelfIdentity) -> bool {
    !mentions_self(event, rules, me)
}

fn pass_direct_message(event: &Event, _: &RuleSet, _: &SelfIdentity) -> bool {
    !event.is_direct_message
}

fn pass_bot(event: &Event, rules: &RuleSet, _: &SelfIdentity) -> bool {
    !is_ignored_bot(event, rules)
}

fn pass_ignored_user(event: &Event, rules: &RuleSet, _: &SelfIdentity) -> bool {
    !is_ignored_user(event, rules)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Decide whether `event` is worth a notification.
pub fn classify(event: &Event, rules: &RuleSet, me: &SelfIdentity) -> Decision {
    if let Some(step) = STEPS.iter().find(|step| !(step.check)(event, rules, me)) {
        return Decision::Drop { reason: step.reason };
    }

    let matched_keywords = matched_keywords(event, rules);
    if matched_keywords.is_empty() {
        Decision::Drop { reason: DropReason::NoKeywordMatch }
    } else {
        Decision::Notify { matched_keywords }
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Space key present and listed. An empty target set matches nothing.
pub fn is_target_space(event: &Event, rules: &RuleSet) -> bool {
    event
        .space_key()
        .map(|key| rules.target_space_keys.contains(key))
        .unwrap_or(false)
}

/// Posted into the configured repost topic.
pub fn is_notify_topic(event: &Event, rules: &RuleSet) -> bool {
    rules.remote_target_topic_id.is_set() && event.topic.id == rules.remote_target_topic_id
}

/// Message contains the account name or the configured mention marker.
pub fn mentions_self(event: &Event, rules: &RuleSet, me: &SelfIdentity) -> bool {
    let message = &event.post.message;
    let by_name = !me.name.is_empty() && message.contains(me.name.as_str());
    let by_marker = rules
        .mention_marker
        .as_deref()
        .map(|marker| !marker.is_empty() && message.contains(marker))
        .unwrap_or(false);
    by_name || by_marker
}

pub fn is_ignored_bot(event: &Event, rules: &RuleSet) -> bool {
    rules.ignore_bot && event.post.author.is_bot
}

pub fn is_ignored_user(event: &Event, rules: &RuleSet) -> bool {
    rules.ignored_users.contains(&event.post.author.name)
}

/// Keywords of every rule that matches, in rule order.
pub fn matched_keywords(event: &Event, rules: &RuleSet) -> Vec<String> {
    let folded;
    let message = if rules.case_sensitive {
        event.post.message.as_str()
    } else {
        folded = event.post.message.to_lowercase();
        folded.as_str()
    };

    rules
        .keyword_rules
        .iter()
        .filter(|rule| rule_matches(rule, message, event, rules.case_sensitive))
        .map(|rule| rule.keyword.clone())
        .collect()
}

fn rule_matches(rule: &KeywordRule, message: &str, event: &Event, case_sensitive: bool) -> bool {
    if rule.keyword.is_empty() || !rule.in_scope(event.topic.id) {
        return false;
    }
    if case_sensitive {
        message.contains(rule.keyword.as_str())
    } else {
        message.contains(rule.keyword.to_lowercase().as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use postwatch_core::{types::POST_MESSAGE, Post, Space, SpaceKey, Topic, TopicId};

    use super::*;

    fn event(message: &str) -> Event {
        Event {
            kind: POST_MESSAGE.to_string(),
            space: Some(Space { key: SpaceKey::from("ABC") }),
            topic: Topic { id: TopicId(1), name: "general".into() },
            post: Post { message: message.into(), ..Post::default() },
            is_direct_message: false,
        }
    }

    fn rules(keywords: &[&str]) -> RuleSet {
        RuleSet {
            target_space_keys: [SpaceKey::from("ABC")].into_iter().collect(),
            keyword_rules: keywords.iter().map(|k| KeywordRule::anywhere(*k)).collect(),
            ..RuleSet::default()
        }
    }

    #[test]
    fn steps_are_in_documented_order() {
        let order: Vec<_> = STEPS.iter().map(|s| s.reason).collect();
        assert_eq!(
            order,
            vec![
                DropReason::NotTargetSpace,
                DropReason::NotPostMessage,
                DropReason::NotifyTopic,
                DropReason::SelfMention,
                DropReason::DirectMessage,
                DropReason::Bot,
                DropReason::IgnoredUser,
            ]
        );
    }

    #[test]
    fn space_check_runs_before_kind_check() {
        let mut e = event("review");
        e.kind = "likePost".into();
        e.space = None;
        assert_eq!(
            classify(&e, &rules(&["review"]), &SelfIdentity::default()),
            Decision::Drop { reason: DropReason::NotTargetSpace }
        );
    }

    #[test]
    fn empty_keyword_never_matches() {
        let e = event("anything");
        assert!(matched_keywords(&e, &rules(&[""])).is_empty());
    }

    #[test]
    fn case_insensitive_reports_configured_keyword() {
        let mut r = rules(&["Deploy"]);
        r.case_sensitive = false;
        assert_eq!(matched_keywords(&event("DEPLOY finished"), &r), vec!["Deploy"]);

        r.case_sensitive = true;
        assert!(matched_keywords(&event("DEPLOY finished"), &r).is_empty());
    }

    #[test]
    fn empty_self_name_never_counts_as_mention() {
        let e = event("hello");
        assert!(!mentions_self(&e, &rules(&[]), &SelfIdentity::new("")));
    }

    #[test]
    fn mention_marker_suppresses_like_name() {
        let mut r = rules(&["review"]);
        r.mention_marker = Some("@here".into());
        let e = event("@here please review");
        assert_eq!(
            classify(&e, &r, &SelfIdentity::new("carol")),
            Decision::Drop { reason: DropReason::SelfMention }
        );
    }

    #[test]
    fn decision_serializes_tagged() {
        let d = Decision::Drop { reason: DropReason::Bot };
        let json = serde_json::to_value(&d).expect("json");
        assert_eq!(json["decision"], "drop");
        assert_eq!(json["reason"], "bot");
    }
}
