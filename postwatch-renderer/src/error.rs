//! Error types for postwatch-renderer.

use thiserror::Error;

/// All errors that can arise while compiling or rendering notification templates.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tera failed to parse a template or render it with the given context.
    #[error("template '{name}' failed: {source}")]
    Template {
        name: &'static str,
        #[source]
        source: tera::Error,
    },

    /// Building the tera context from the notification payload failed.
    #[error("context serialization error: {0}")]
    Context(#[from] tera::Error),
}
