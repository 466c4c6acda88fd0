//! YAML settings and environment overrides.
//!
//! # Precedence
//!
//! ```text
//! config.yml  <  POSTWATCH_* environment  <  CLI flags (applied by the binary)
//! ```
//!
//! # API pattern
//!
//! Loaders take explicit paths and lookups (`load_at`, `apply_env_with`) so tests
//! never touch the real working directory or process environment; the
//! convenience forms (`load`, `apply_env`) delegate to them.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{
    FormatLimits, KeywordRule, RuleSet, SpaceKey, TopicId, DEFAULT_OMISSION_MARKER,
    DEFAULT_WEB_URL,
};

/// Prefix for environment overrides (`POSTWATCH_CLIENT_ID`, …).
pub const ENV_PREFIX: &str = "POSTWATCH";

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Directory name under the platform config dir (`~/.config/postwatch/`).
pub const APP_DIR: &str = "postwatch";

/// Default shutdown deadline for the event source.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// 1. Settings model
// ---------------------------------------------------------------------------

/// Root of the YAML configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub debug: bool,
    pub client_id: String,
    pub client_secret: String,
    pub notify_desktop: bool,
    /// Topic id to repost matches into; `0` disables reposting.
    pub notify_remote: i64,
    pub with_mention: bool,
    pub space_keys: Vec<String>,
    pub keywords: Vec<KeywordSetting>,
    /// Extra self-mention marker, checked alongside the account name.
    pub mention: String,
    pub ignore_bot: bool,
    pub ignore_users: Vec<String>,
    pub case_sensitive: bool,
    pub message: MessageSettings,
    pub templates: TemplateSettings,
    pub endpoints: EndpointSettings,
    pub shutdown: ShutdownSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            client_id: String::new(),
            client_secret: String::new(),
            notify_desktop: false,
            notify_remote: 0,
            with_mention: false,
            space_keys: Vec::new(),
            keywords: Vec::new(),
            mention: String::new(),
            ignore_bot: false,
            ignore_users: Vec::new(),
            case_sensitive: true,
            message: MessageSettings::default(),
            templates: TemplateSettings::default(),
            endpoints: EndpointSettings::default(),
            shutdown: ShutdownSettings::default(),
        }
    }
}

/// One `keywords:` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeywordSetting {
    pub keyword: String,
    #[serde(default)]
    pub topic_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MessageSettings {
    pub max_topic_name_length: usize,
    pub max_message_length: usize,
    pub max_message_line: usize,
    pub omit_word: String,
    pub hide_post_url: bool,
}

impl Default for MessageSettings {
    fn default() -> Self {
        Self {
            max_topic_name_length: 0,
            max_message_length: 0,
            max_message_line: 0,
            omit_word: DEFAULT_OMISSION_MARKER.to_string(),
            hide_post_url: false,
        }
    }
}

/// Optional tera template overrides for composed notifications.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateSettings {
    pub desktop_title: Option<String>,
    pub desktop_body: Option<String>,
    pub remote_body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointSettings {
    /// Base URL for OAuth and REST calls.
    pub api_url: String,
    /// Base URL used when linking to posts.
    pub web_url: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_WEB_URL.to_string(),
            web_url: DEFAULT_WEB_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShutdownSettings {
    pub timeout_secs: u64,
    /// Exit non-zero when the event source misses the shutdown deadline.
    pub fail_on_timeout: bool,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            fail_on_timeout: false,
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Pick the config file: explicit path, else `<cwd>/config.yml`, else
/// `<config_dir>/postwatch/config.yml`. Falls back to the working-directory
/// path so a missing file is reported where the operator expects it.
pub fn resolve_path_at(explicit: Option<&Path>, cwd: &Path, config_dir: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = cwd.join(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return local;
    }
    if let Some(dir) = config_dir {
        let user = dir.join(APP_DIR).join(DEFAULT_CONFIG_FILE);
        if user.exists() {
            return user;
        }
    }
    local
}

/// `resolve_path_at` using the process working directory and `dirs::config_dir()`.
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let cwd = std::env::current_dir()?;
    Ok(resolve_path_at(explicit, &cwd, dirs::config_dir().as_deref()))
}

/// Load settings from a YAML file.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse` (with path
/// and line context) if malformed. An empty file yields the defaults.
pub fn load_at(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    parse_at(path, &contents)
}

/// Parse YAML text, attributing errors to `path`.
pub fn parse_at(path: &Path, contents: &str) -> Result<Settings, ConfigError> {
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve, load and apply the process environment in one step.
pub fn load(explicit: Option<&Path>) -> Result<(PathBuf, Settings), ConfigError> {
    let path = resolve_path(explicit)?;
    let mut settings = load_at(&path)?;
    settings.apply_env()?;
    Ok((path, settings))
}

// ---------------------------------------------------------------------------
// 3. Environment overrides
// ---------------------------------------------------------------------------

fn env_name(key: &str) -> String {
    format!("{ENV_PREFIX}_{key}")
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_i64(var: &str, value: &str) -> Result<i64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

/// Split a comma-separated list, dropping blank entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

impl Settings {
    /// Apply `POSTWATCH_*` overrides read through `lookup`.
    ///
    /// `POSTWATCH_KEYWORDS` appends any-topic rules; every other list replaces
    /// the file value.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            let var = env_name(key);
            lookup(&var).map(|value| (var, value))
        };

        if let Some((_, v)) = get("CLIENT_ID") {
            self.client_id = v;
        }
        if let Some((_, v)) = get("CLIENT_SECRET") {
            self.client_secret = v;
        }
        if let Some((var, v)) = get("DEBUG") {
            self.debug = parse_bool(&var, &v)?;
        }
        if let Some((var, v)) = get("NOTIFY_DESKTOP") {
            self.notify_desktop = parse_bool(&var, &v)?;
        }
        if let Some((var, v)) = get("NOTIFY_REMOTE") {
            self.notify_remote = parse_i64(&var, &v)?;
        }
        if let Some((var, v)) = get("WITH_MENTION") {
            self.with_mention = parse_bool(&var, &v)?;
        }
        if let Some((_, v)) = get("SPACE_KEYS") {
            self.space_keys = split_list(&v);
        }
        if let Some((_, v)) = get("KEYWORDS") {
            self.append_keywords(split_list(&v));
        }
        if let Some((var, v)) = get("IGNORE_BOT") {
            self.ignore_bot = parse_bool(&var, &v)?;
        }
        if let Some((_, v)) = get("IGNORE_USERS") {
            self.ignore_users = split_list(&v);
        }
        Ok(())
    }

    /// `apply_env_with` over the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|var| std::env::var(var).ok())
    }

    /// Append any-topic keyword rules (used by env and CLI overrides).
    pub fn append_keywords<I>(&mut self, keywords: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.keywords.extend(
            keywords
                .into_iter()
                .map(|keyword| KeywordSetting { keyword, topic_id: 0 }),
        );
    }

    // -----------------------------------------------------------------------
    // 4. Validation and rule-set construction
    // -----------------------------------------------------------------------

    /// Reject configurations that cannot run. Credentials are only required
    /// when the platform API is going to be called.
    pub fn validate(&self, require_credentials: bool) -> Result<(), ConfigError> {
        if require_credentials {
            if self.client_id.trim().is_empty() {
                return Err(ConfigError::Invalid("client_id is required".to_string()));
            }
            if self.client_secret.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "client_secret is required".to_string(),
                ));
            }
        }
        if let Some(pos) = self.keywords.iter().position(|k| k.keyword.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "keywords[{pos}]: keyword must not be empty"
            )));
        }
        if self.shutdown.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "shutdown.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// OAuth scope needed for the enabled features.
    pub fn oauth_scope(&self) -> String {
        let mut scope = String::from("my topic.read");
        if self.notify_remote > 0 {
            scope.push_str(" topic.post");
        }
        scope
    }

    /// Build the immutable [`RuleSet`] shared by classifier and composer.
    pub fn rule_set(&self) -> RuleSet {
        let mention_marker = Some(self.mention.trim())
            .filter(|m| !m.is_empty())
            .map(str::to_owned);

        RuleSet {
            target_space_keys: self
                .space_keys
                .iter()
                .map(|key| SpaceKey::from(key.as_str()))
                .collect(),
            mention_marker,
            keyword_rules: self
                .keywords
                .iter()
                .map(|k| KeywordRule {
                    keyword: k.keyword.clone(),
                    scope_topic_id: TopicId(k.topic_id),
                })
                .collect(),
            case_sensitive: self.case_sensitive,
            ignore_bot: self.ignore_bot,
            ignored_users: self.ignore_users.iter().cloned().collect::<BTreeSet<_>>(),
            desktop_enabled: self.notify_desktop,
            remote_enabled: self.notify_remote > 0,
            remote_target_topic_id: TopicId(self.notify_remote.max(0)),
            with_mention_on_repost: self.with_mention,
            limits: FormatLimits {
                max_topic_name_length: self.message.max_topic_name_length,
                max_message_length: self.message.max_message_length,
                max_message_line: self.message.max_message_line,
                omission_marker: self.message.omit_word.clone(),
            },
            post_url_base: self.endpoints.web_url.clone(),
            hide_post_url: self.message.hide_post_url,
        }
    }

    /// Copy with credentials masked, for debug logging.
    pub fn redacted(&self) -> Settings {
        let mask = |s: &str| if s.is_empty() { String::new() } else { "***".to_string() };
        Settings {
            client_secret: mask(&self.client_secret),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
