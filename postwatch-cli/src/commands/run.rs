//! `postwatch run`: consume the event stream and dispatch notifications.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{debug, info, warn};

use postwatch_core::{config::split_list, Settings};
use postwatch_daemon::{
    init_tracing, start_blocking, Controller, EventInput, Pipeline, RunReport, ShutdownOutcome,
};
use postwatch_dispatch::{ApiClient, ApiRemoteSink, ClientCredentials, CommandDesktopSink, Sinks};
use postwatch_renderer::Composer;

use super::ConfigArgs;

/// Exit status when `shutdown.fail_on_timeout` is set and the deadline elapsed.
const EXIT_SHUTDOWN_TIMEOUT: u8 = 2;

/// Arguments for `postwatch run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub overrides: Overrides,

    /// Newline-delimited JSON events; `-` or omitted reads stdin.
    #[arg(long, value_name = "PATH")]
    pub events: Option<PathBuf>,
}

/// Command-line overrides, applied over file and environment values.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Enable debug logging.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub debug: Option<bool>,

    #[arg(long, value_name = "ID")]
    pub client_id: Option<String>,

    #[arg(long, value_name = "SECRET")]
    pub client_secret: Option<String>,

    /// Show desktop notifications.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub notify_desktop: Option<bool>,

    /// Repost matches into this topic (0 disables).
    #[arg(long, value_name = "TOPIC_ID")]
    pub notify_remote: Option<i64>,

    /// Mention yourself in reposts.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub with_mention: Option<bool>,

    /// Comma-separated space keys to watch.
    #[arg(long, value_name = "KEYS")]
    pub space_keys: Option<String>,

    /// Comma-separated keywords, added as any-topic rules.
    #[arg(long, value_name = "WORDS")]
    pub keywords: Option<String>,

    /// Skip posts written by bots.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub ignore_bot: Option<bool>,

    /// Comma-separated account names to skip.
    #[arg(long, value_name = "NAMES")]
    pub ignore_users: Option<String>,
}

impl Overrides {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(v) = self.debug {
            settings.debug = v;
        }
        if let Some(v) = &self.client_id {
            settings.client_id = v.clone();
        }
        if let Some(v) = &self.client_secret {
            settings.client_secret = v.clone();
        }
        if let Some(v) = self.notify_desktop {
            settings.notify_desktop = v;
        }
        if let Some(v) = self.notify_remote {
            settings.notify_remote = v;
        }
        if let Some(v) = self.with_mention {
            settings.with_mention = v;
        }
        if let Some(v) = &self.space_keys {
            settings.space_keys = split_list(v);
        }
        if let Some(v) = &self.keywords {
            settings.append_keywords(split_list(v));
        }
        if let Some(v) = self.ignore_bot {
            settings.ignore_bot = v;
        }
        if let Some(v) = &self.ignore_users {
            settings.ignore_users = split_list(v);
        }
    }
}

impl RunArgs {
    pub fn run(self) -> Result<ExitCode> {
        let (path, mut settings) = self.config.load()?;
        self.overrides.apply(&mut settings);
        settings
            .validate(true)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;

        init_tracing(settings.debug);
        info!(config = %path.display(), "configuration loaded");
        debug!(settings = ?settings.redacted(), "effective settings");

        let rules = settings.rule_set();
        let composer =
            Composer::new(&settings.templates).context("failed to compile notification templates")?;

        let credentials = ClientCredentials::new(
            &settings.endpoints.api_url,
            settings.client_id.clone(),
            settings.client_secret.clone(),
            settings.oauth_scope(),
        );
        let client = ApiClient::new(settings.endpoints.api_url.clone(), Arc::new(credentials));
        let me = client
            .my_profile()
            .context("failed to fetch the account profile")?;

        let mut sinks = Sinks::new();
        if rules.desktop_enabled {
            sinks = sinks.with_desktop(CommandDesktopSink::platform());
        }
        if rules.reposts_enabled() {
            sinks = sinks.with_remote(ApiRemoteSink::new(client));
        }
        if !rules.desktop_enabled && !rules.reposts_enabled() {
            warn!("no sink enabled; matches will only be logged");
        }

        let controller = Controller::new(
            Pipeline::new(rules, me, composer, sinks),
            Duration::from_secs(settings.shutdown.timeout_secs),
        );
        let input = EventInput::from_arg(self.events.as_deref());
        let report = start_blocking(controller, async move { input.open().await })
            .context("event loop failed to start")?;

        print_report(&report);
        Ok(ExitCode::from(exit_status(&report, settings.shutdown.fail_on_timeout)))
    }
}

fn exit_status(report: &RunReport, fail_on_timeout: bool) -> u8 {
    if fail_on_timeout && report.outcome == ShutdownOutcome::TimedOut {
        EXIT_SHUTDOWN_TIMEOUT
    } else {
        0
    }
}

fn print_report(report: &RunReport) {
    eprintln!(
        "postwatch stopped ({:?}): {} events, {} notified, {} dropped, {} dispatch failures",
        report.outcome,
        report.stats.events,
        report.stats.notified,
        report.stats.dropped,
        report.stats.dispatch_failures,
    );
}
