//! # postwatch-renderer
//!
//! Composes notification payloads for events the classifier accepted.
//!
//! Text is produced by tera templates: built-in ones reproduce the stock
//! layouts, and each can be replaced from the `templates:` config section.
//! Topic names and messages are truncated before they reach a template.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use postwatch_core::{config::TemplateSettings, Event, RuleSet, SelfIdentity};
//! use postwatch_renderer::Composer;
//!
//! fn payloads(event: &Event, matched: &[String], rules: &RuleSet, me: &SelfIdentity) {
//!     if let Ok(composer) = Composer::new(&TemplateSettings::default()) {
//!         if let Ok(payloads) = composer.compose(event, matched, rules, me) {
//!             for p in payloads {
//!                 println!("{}: {}", p.sink, p.summary());
//!             }
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod truncate;

pub use context::NotificationContext;
pub use engine::{Composer, TemplateEngine, TemplateKind};
pub use error::RenderError;
pub use truncate::{truncate_chars, truncate_message};
