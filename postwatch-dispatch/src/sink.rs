//! Sink contracts and the platform desktop notifier.
//!
//! Sinks are synchronous: the daemon calls them from a blocking task so a slow
//! notifier or HTTP call never stalls the consumption loop.

use std::process::Command;

use postwatch_core::TopicId;
use tracing::debug;

use crate::error::SinkError;

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// Delivers a titled alert on the operator's desktop.
pub trait DesktopSink: Send + Sync {
    fn send(&self, title: &str, body: &str) -> Result<(), SinkError>;
}

/// Reposts a message into a chat topic.
pub trait RemoteSink: Send + Sync {
    fn send(&self, topic_id: TopicId, body: &str) -> Result<(), SinkError>;
}

/// The sinks available for one run. A `None` slot means payloads for that
/// sink fail with [`SinkError::NotConfigured`].
#[derive(Default)]
pub struct Sinks {
    pub desktop: Option<Box<dyn DesktopSink>>,
    pub remote: Option<Box<dyn RemoteSink>>,
}

impl Sinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_desktop(mut self, sink: impl DesktopSink + 'static) -> Self {
        self.desktop = Some(Box::new(sink));
        self
    }

    pub fn with_remote(mut self, sink: impl RemoteSink + 'static) -> Self {
        self.remote = Some(Box::new(sink));
        self
    }
}

impl std::fmt::Debug for Sinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sinks")
            .field("desktop", &self.desktop.is_some())
            .field("remote", &self.remote.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// CommandDesktopSink
// ---------------------------------------------------------------------------

/// How the desktop notifier program is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notifier {
    /// `notify-send <title> <body>` (Linux, BSD).
    NotifySend,
    /// `osascript -e 'display notification …'` (macOS).
    Osascript,
    /// PowerShell toast (Windows).
    PowerShell,
    /// Any program; title and body are appended to `args`.
    Custom { program: String, args: Vec<String> },
}

impl Notifier {
    /// Notifier for the build target.
    pub fn platform() -> Self {
        if cfg!(target_os = "macos") {
            Notifier::Osascript
        } else if cfg!(target_os = "windows") {
            Notifier::PowerShell
        } else {
            Notifier::NotifySend
        }
    }

    fn program(&self) -> &str {
        match self {
            Notifier::NotifySend => "notify-send",
            Notifier::Osascript => "osascript",
            Notifier::PowerShell => "powershell",
            Notifier::Custom { program, .. } => program,
        }
    }

    /// Full argument list for one notification.
    pub fn args(&self, title: &str, body: &str) -> Vec<String> {
        match self {
            Notifier::NotifySend => vec![title.to_string(), body.to_string()],
            Notifier::Osascript => {
                let script = format!(
                    r#"display notification "{}" with title "{}""#,
                    apple_escape(&body.replace('\n', " ")),
                    apple_escape(title)
                );
                vec!["-e".to_string(), script]
            }
            Notifier::PowerShell => {
                let script = format!(
                    "[Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] | Out-Null; \
                     $t = [Windows.UI.Notifications.ToastNotificationManager]::GetTemplateContent([Windows.UI.Notifications.ToastTemplateType]::ToastText02); \
                     $x = $t.GetElementsByTagName('text'); \
                     $x[0].AppendChild($t.CreateTextNode('{}')) | Out-Null; \
                     $x[1].AppendChild($t.CreateTextNode('{}')) | Out-Null; \
                     [Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier('postwatch').Show([Windows.UI.Notifications.ToastNotification]::new($t))",
                    title.replace('\'', "''"),
                    body.replace('\'', "''").replace('\n', " ")
                );
                vec!["-Command".to_string(), script]
            }
            Notifier::Custom { args, .. } => {
                let mut all = args.clone();
                all.push(title.to_string());
                all.push(body.to_string());
                all
            }
        }
    }
}

fn apple_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Desktop sink that shells out to a notifier program.
#[derive(Debug, Clone)]
pub struct CommandDesktopSink {
    notifier: Notifier,
}

impl CommandDesktopSink {
    pub fn new(notifier: Notifier) -> Self {
        Self { notifier }
    }

    pub fn platform() -> Self {
        Self::new(Notifier::platform())
    }
}

impl DesktopSink for CommandDesktopSink {
    fn send(&self, title: &str, body: &str) -> Result<(), SinkError> {
        let program = self.notifier.program();
        debug!(program, title, "launching desktop notifier");

        let output = Command::new(program)
            .args(self.notifier.args(title, body))
            .output()
            .map_err(|source| SinkError::Launch {
                program: program.to_string(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(SinkError::CommandFailed {
                program: program.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
