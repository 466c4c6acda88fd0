//! Error types for postwatch-dispatch.

use thiserror::Error;

/// Failures talking to the chat platform's HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure (DNS, connect, TLS, timeout).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    /// The response body was not the expected JSON.
    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convert a ureq failure into [`ApiError`], reading the body of error responses.
pub(crate) fn api_err(url: &str, err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Status(status, response) => ApiError::Status {
            url: url.to_string(),
            status,
            body: response.into_string().unwrap_or_default().trim().to_string(),
        },
        other => ApiError::Transport {
            url: url.to_string(),
            source: Box::new(other),
        },
    }
}

/// A sink could not deliver its payload.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The payload targets a sink that was never built.
    #[error("{sink} sink not configured")]
    NotConfigured { sink: &'static str },

    /// The notifier program could not be started.
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The notifier program ran and reported failure.
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}
