//! Parameterised classification tests for `postwatch-filter`.
//!
//! Each `#[case]` builds its own event and rule set.

use postwatch_core::{
    types::POST_MESSAGE, Author, Event, KeywordRule, Post, PostId, RuleSet, SelfIdentity, Space,
    SpaceKey, Topic, TopicId,
};
use postwatch_filter::{classify, matched_keywords, Decision, DropReason};
use rstest::rstest;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn me() -> SelfIdentity {
    SelfIdentity::new("carol")
}

fn post_event(space: &str, topic: i64, message: &str) -> Event {
    Event {
        kind: POST_MESSAGE.to_string(),
        space: Some(Space { key: SpaceKey::from(space) }),
        topic: Topic { id: TopicId(topic), name: "design".to_string() },
        post: Post {
            id: PostId(100),
            message: message.to_string(),
            author: Author { name: "bob".to_string(), is_bot: false },
        },
        is_direct_message: false,
    }
}

fn rules_with(keywords: Vec<KeywordRule>) -> RuleSet {
    RuleSet {
        target_space_keys: [SpaceKey::from("ABC")].into_iter().collect(),
        keyword_rules: keywords,
        desktop_enabled: true,
        ..RuleSet::default()
    }
}

fn review_rules() -> RuleSet {
    rules_with(vec![KeywordRule::anywhere("review")])
}

fn notify(keywords: &[&str]) -> Decision {
    Decision::Notify {
        matched_keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

fn dropped(reason: DropReason) -> Decision {
    Decision::Drop { reason }
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_matching_post_notifies() {
    let event = post_event("ABC", 1, "please review the design");
    assert_eq!(classify(&event, &review_rules(), &me()), notify(&["review"]));
}

#[test]
fn null_fields_on_the_wire_do_not_block_a_match() {
    let json = r#"{
        "kind": "postMessage",
        "space": {"key": "ABC"},
        "topic": {"id": 1, "name": null},
        "post": {"id": 100, "message": "please review the design", "author": {"name": "bob", "isBot": null}},
        "isDirectMessage": null
    }"#;
    let event: Event = serde_json::from_str(json).expect("decode");
    assert_eq!(classify(&event, &review_rules(), &me()), notify(&["review"]));
}

#[test]
fn scenario_direct_message_is_dropped() {
    let mut event = post_event("ABC", 1, "please review the design");
    event.is_direct_message = true;
    assert_eq!(
        classify(&event, &review_rules(), &me()),
        dropped(DropReason::DirectMessage)
    );
}

#[test]
fn scenario_bot_is_dropped_when_ignored() {
    let mut rules = review_rules();
    rules.ignore_bot = true;
    let mut event = post_event("ABC", 1, "please review the design");
    event.post.author.is_bot = true;
    assert_eq!(classify(&event, &rules, &me()), dropped(DropReason::Bot));

    rules.ignore_bot = false;
    assert_eq!(classify(&event, &rules, &me()), notify(&["review"]));
}

#[test]
fn scenario_duplicate_keywords_are_preserved() {
    let rules = rules_with(vec![
        KeywordRule::new("urgent", 0),
        KeywordRule::new("urgent", 7),
    ]);
    let event = post_event("ABC", 7, "urgent: prod is down");
    assert_eq!(classify(&event, &rules, &me()), notify(&["urgent", "urgent"]));
}

// ---------------------------------------------------------------------------
// Space and kind checks
// ---------------------------------------------------------------------------

#[rstest]
#[case("other_space", Some("XYZ"))]
#[case("lowercase_key", Some("abc"))]
#[case("empty_key", Some(""))]
#[case("no_space", None)]
fn non_target_space_is_dropped(#[case] label: &str, #[case] key: Option<&str>) {
    let mut event = post_event("ABC", 1, "please review");
    event.space = key.map(|k| Space { key: SpaceKey::from(k) });
    assert_eq!(
        classify(&event, &review_rules(), &me()),
        dropped(DropReason::NotTargetSpace),
        "[{label}]"
    );
}

#[test]
fn empty_target_set_rejects_everything() {
    let mut rules = review_rules();
    rules.target_space_keys.clear();
    let event = post_event("ABC", 1, "please review");
    assert_eq!(classify(&event, &rules, &me()), dropped(DropReason::NotTargetSpace));
}

#[rstest]
#[case("likePost")]
#[case("addTalkMessage")]
#[case("")]
fn non_post_kinds_are_dropped(#[case] kind: &str) {
    let mut event = post_event("ABC", 1, "please review");
    event.kind = kind.to_string();
    assert_eq!(
        classify(&event, &review_rules(), &me()),
        dropped(DropReason::NotPostMessage)
    );
}

// ---------------------------------------------------------------------------
// Suppression checks
// ---------------------------------------------------------------------------

#[test]
fn loop_guard_drops_posts_in_repost_topic_even_with_match() {
    let mut rules = review_rules();
    rules.remote_enabled = true;
    rules.remote_target_topic_id = TopicId(55);
    let event = post_event("ABC", 55, "please review");
    assert_eq!(classify(&event, &rules, &me()), dropped(DropReason::NotifyTopic));

    let elsewhere = post_event("ABC", 56, "please review");
    assert_eq!(classify(&elsewhere, &rules, &me()), notify(&["review"]));
}

#[test]
fn loop_guard_is_off_without_repost_topic() {
    let event = post_event("ABC", 0, "please review");
    assert_eq!(classify(&event, &review_rules(), &me()), notify(&["review"]));
}

#[test]
fn self_mention_drops_even_with_match() {
    let event = post_event("ABC", 1, "carol, please review");
    assert_eq!(
        classify(&event, &review_rules(), &me()),
        dropped(DropReason::SelfMention)
    );
}

#[test]
fn ignored_user_is_dropped() {
    let mut rules = review_rules();
    rules.ignored_users.insert("bob".to_string());
    let event = post_event("ABC", 1, "please review");
    assert_eq!(classify(&event, &rules, &me()), dropped(DropReason::IgnoredUser));
}

#[test]
fn first_failing_check_wins() {
    let mut rules = review_rules();
    rules.ignore_bot = true;
    rules.ignored_users.insert("bob".to_string());
    let mut event = post_event("ABC", 1, "carol, please review");
    event.is_direct_message = true;
    event.post.author.is_bot = true;
    assert_eq!(classify(&event, &rules, &me()), dropped(DropReason::SelfMention));
}

// ---------------------------------------------------------------------------
// Keyword matching
// ---------------------------------------------------------------------------

#[rstest]
#[case(0, 1, true)]
#[case(0, 42, true)]
#[case(-1, 42, true)]
#[case(42, 42, true)]
#[case(42, 41, false)]
fn keyword_topic_scope(#[case] scope: i64, #[case] topic: i64, #[case] expected: bool) {
    let rules = rules_with(vec![KeywordRule::new("deploy", scope)]);
    let event = post_event("ABC", topic, "deploy done");
    assert_eq!(classify(&event, &rules, &me()).is_notify(), expected);
}

#[test]
fn matching_is_case_sensitive_by_default() {
    let event = post_event("ABC", 1, "Please REVIEW");
    assert_eq!(
        classify(&event, &review_rules(), &me()),
        dropped(DropReason::NoKeywordMatch)
    );
}

#[test]
fn matches_preserve_rule_order_not_message_order() {
    let rules = rules_with(vec![
        KeywordRule::anywhere("beta"),
        KeywordRule::anywhere("missing"),
        KeywordRule::anywhere("alpha"),
    ]);
    let event = post_event("ABC", 1, "alpha then beta");
    assert_eq!(matched_keywords(&event, &rules), vec!["beta", "alpha"]);
}

#[test]
fn no_rules_means_no_notification() {
    let rules = rules_with(vec![]);
    let event = post_event("ABC", 1, "anything at all");
    assert_eq!(classify(&event, &rules, &me()), dropped(DropReason::NoKeywordMatch));
}

#[test]
fn multibyte_keywords_match() {
    let rules = rules_with(vec![KeywordRule::anywhere("レビュー")]);
    let event = post_event("ABC", 1, "デザインのレビューをお願いします");
    assert_eq!(classify(&event, &rules, &me()), notify(&["レビュー"]));
}

// ---------------------------------------------------------------------------
// Purity
// ---------------------------------------------------------------------------

#[test]
fn classify_is_idempotent_and_order_independent() {
    let rules = review_rules();
    let events = [
        post_event("ABC", 1, "please review"),
        post_event("XYZ", 1, "please review"),
        post_event("ABC", 1, "carol review"),
        post_event("ABC", 1, "nothing here"),
    ];

    let forward: Vec<_> = events.iter().map(|e| classify(e, &rules, &me())).collect();
    let backward: Vec<_> = events
        .iter()
        .rev()
        .map(|e| classify(e, &rules, &me()))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let again: Vec<_> = events.iter().map(|e| classify(e, &rules, &me())).collect();

    assert_eq!(forward, backward);
    assert_eq!(forward, again);
}
