//! Error types for the crawler.

use std::time::Duration;

/// Crawler errors.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// The CLI binary could not be started.
    #[error("failed to spawn `{command}`: {message}")]
    Spawn { command: String, message: String },

    /// The CLI exited with a non-zero status.
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The CLI did not finish within the configured timeout.
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// Stdout was not valid JSON.
    #[error("`{command}` returned invalid JSON: {message}")]
    Parse { command: String, message: String },

    /// JSON did not have the expected shape.
    #[error("`{command}` returned an unexpected shape: {message}")]
    Decode { command: String, message: String },

    /// A required field was absent from the CLI response.
    #[error("`{command}` response is missing `{field}`")]
    MissingField { command: String, field: String },

    /// Filesystem error while writing an artifact.
    #[error("io error on {path}: {message}")]
    Io { path: String, message: String },

    /// Report could not be serialized.
    #[error("failed to serialize report: {message}")]
    Serialize { message: String },

    /// A background fetch task panicked or was cancelled.
    #[error("fetch task failed: {message}")]
    Task { message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl CrawlError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            _ => 1,
        }
    }

    /// Whether the error is a provider throttling failure worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CommandFailed { stderr, .. } => is_throttling_message(stderr),
            _ => false,
        }
    }

    /// The rendered command that produced this error, if any.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Spawn { command, .. }
            | Self::CommandFailed { command, .. }
            | Self::Timeout { command, .. }
            | Self::Parse { command, .. }
            | Self::Decode { command, .. }
            | Self::MissingField { command, .. } => Some(command),
            Self::Io { .. } | Self::Serialize { .. } | Self::Task { .. } | Self::Config { .. } => {
                None
            }
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

const THROTTLING_MARKERS: &[&str] = &[
    "Throttling",
    "TooManyRequestsException",
    "Rate exceeded",
    "RequestLimitExceeded",
];

fn is_throttling_message(stderr: &str) -> bool {
    THROTTLING_MARKERS.iter().any(|m| stderr.contains(m))
}

/// Result type for crawler operations.
pub type CrawlResult<T> = Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stderr: &str) -> CrawlError {
        CrawlError::CommandFailed {
            command: "aws iam list-users".into(),
            status: "exit status: 254".into(),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn test_throttling_is_retryable() {
        let err = failed(
            "An error occurred (Throttling) when calling the ListUsers operation: Rate exceeded",
        );
        assert!(err.is_retryable());
        assert!(failed("TooManyRequestsException").is_retryable());
    }

    #[test]
    fn test_access_denied_is_not_retryable() {
        let err = failed("An error occurred (AccessDenied) when calling the ListUsers operation");
        assert!(!err.is_retryable());

        let timeout = CrawlError::Timeout {
            command: "aws iam list-users".into(),
            timeout: Duration::from_secs(1),
        };
        assert!(!timeout.is_retryable());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CrawlError::config("no profiles").exit_code(), 2);
        assert_eq!(failed("boom").exit_code(), 1);
    }

    #[test]
    fn test_command_accessor() {
        assert_eq!(failed("boom").command(), Some("aws iam list-users"));
        let io = CrawlError::Io {
            path: "/tmp/x".into(),
            message: "denied".into(),
        };
        assert_eq!(io.command(), None);
    }
}
