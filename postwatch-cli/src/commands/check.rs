//! `postwatch check`: classify one event offline and preview its payloads.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use postwatch_core::{Event, NotificationPayload, SelfIdentity};
use postwatch_filter::{classify, Decision};
use postwatch_renderer::Composer;

use super::ConfigArgs;

/// Arguments for `postwatch check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Account name used for self-mention suppression.
    #[arg(long, value_name = "NAME", default_value = "")]
    pub self_name: String,

    /// Event file, one JSON object as delivered by the stream.
    #[arg(value_name = "EVENT_JSON_FILE")]
    pub event: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let (path, settings) = self.config.load()?;
        settings
            .validate(false)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;

        let text = std::fs::read_to_string(&self.event)
            .with_context(|| format!("failed to read {}", self.event.display()))?;
        let event: Event = serde_json::from_str(&text)
            .with_context(|| format!("{} is not a valid event", self.event.display()))?;

        let rules = settings.rule_set();
        let me = SelfIdentity::new(self.self_name);
        let decision = classify(&event, &rules, &me);

        let payloads = match &decision {
            Decision::Notify { matched_keywords } => Composer::new(&settings.templates)
                .context("failed to compile notification templates")?
                .compose(&event, matched_keywords, &rules, &me)
                .context("failed to render notification")?,
            Decision::Drop { .. } => Vec::new(),
        };

        if self.json {
            print_json(&decision, &payloads)
        } else {
            print_text(&decision, &payloads);
            Ok(())
        }
    }
}

fn print_json(decision: &Decision, payloads: &[NotificationPayload]) -> Result<()> {
    let mut value = serde_json::to_value(decision).context("failed to serialize decision")?;
    value["payloads"] = serde_json::to_value(payloads).context("failed to serialize payloads")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&value).context("failed to serialize check JSON")?
    );
    Ok(())
}

fn print_text(decision: &Decision, payloads: &[NotificationPayload]) {
    match decision {
        Decision::Drop { reason } => {
            println!("{} {}", "DROP".yellow().bold(), reason);
        }
        Decision::Notify { matched_keywords } => {
            println!(
                "{} matched: {}",
                "NOTIFY".green().bold(),
                matched_keywords.join(", ")
            );
            if payloads.is_empty() {
                println!("  (no sink enabled)");
            }
            for payload in payloads {
                println!("{} {}", "→".cyan(), payload.sink.to_string().bold());
                println!("  title: {}", payload.title);
                for line in payload.body.lines() {
                    println!("  │ {line}");
                }
            }
        }
    }
}
