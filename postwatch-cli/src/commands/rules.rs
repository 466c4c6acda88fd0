//! `postwatch rules`: show the rule set a run would use.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use postwatch_core::RuleSet;

use super::ConfigArgs;

/// Arguments for `postwatch rules`.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct KeywordRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "keyword")]
    keyword: String,
    #[tabled(rename = "topic")]
    topic: String,
}

impl RulesArgs {
    pub fn run(self) -> Result<()> {
        let (path, settings) = self.config.load()?;
        settings
            .validate(false)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        let rules = settings.rule_set();

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rules).context("failed to serialize rules JSON")?
            );
            return Ok(());
        }

        println!(
            "Postwatch v{} | {}",
            env!("CARGO_PKG_VERSION"),
            path.display()
        );
        print_rules(&rules);
        Ok(())
    }
}

fn on_off(flag: bool) -> String {
    if flag {
        "on".green().to_string()
    } else {
        "off".bright_black().to_string()
    }
}

fn list_or_none<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "(none)".bright_black().to_string()
    } else {
        joined
    }
}

fn limit(n: usize) -> String {
    if n == 0 {
        "unlimited".to_string()
    } else {
        n.to_string()
    }
}

fn print_rules(rules: &RuleSet) {
    let spaces = list_or_none(rules.target_space_keys.iter().map(|k| k.0.as_str()));
    let ignored = list_or_none(rules.ignored_users.iter().map(String::as_str));
    let repost = if rules.reposts_enabled() {
        format!(
            "topic {} (mention {})",
            rules.remote_target_topic_id,
            on_off(rules.with_mention_on_repost)
        )
    } else {
        on_off(false)
    };

    println!("spaces:          {spaces}");
    println!("desktop:         {}", on_off(rules.desktop_enabled));
    println!("repost:          {repost}");
    println!(
        "mention marker:  {}",
        rules.mention_marker.as_deref().unwrap_or("(none)")
    );
    println!("ignore bots:     {}", on_off(rules.ignore_bot));
    println!("ignored users:   {ignored}");
    println!("case sensitive:  {}", on_off(rules.case_sensitive));
    println!(
        "limits:          topic {} chars, message {} chars / {} lines, marker {:?}",
        limit(rules.limits.max_topic_name_length),
        limit(rules.limits.max_message_length),
        limit(rules.limits.max_message_line),
        rules.limits.omission_marker,
    );
    println!("post links:      {}", rules.post_url_base);

    if rules.keyword_rules.is_empty() {
        println!("{}", "No keyword rules; nothing will notify.".yellow());
        return;
    }

    let rows: Vec<KeywordRow> = rules
        .keyword_rules
        .iter()
        .enumerate()
        .map(|(i, rule)| KeywordRow {
            index: i + 1,
            keyword: rule.keyword.clone(),
            topic: if rule.scope_topic_id.is_set() {
                rule.scope_topic_id.to_string()
            } else {
                "any".to_string()
            },
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
