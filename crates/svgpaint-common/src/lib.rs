//! # svgpaint common
//!
//! Shared error type, logging setup and retry helpers used across the svgpaint crates.
//!
//! ## Features
//!
//! - Unified error type with categories for reporting
//! - Logging configuration on top of `tracing-subscriber`
//! - Retry with exponential backoff and timeouts
//! - Result/Option extension traits

use std::time::Duration;
use thiserror::Error;

pub mod logging;
pub mod retry;

pub use logging::{init_logging, LogConfig, LogFormat};
pub use retry::{retry_with_backoff, retry_with_backoff_if, with_timeout, RetryConfig};

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the svgpaint tools.
#[derive(Error, Debug)]
pub enum SvgPaintError {
    /// Markup or attribute parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Fetching a resource failed.
    #[error("Fetch error: {message}")]
    Fetch {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Decoding an image failed.
    #[error("Decode error: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Rendering failed.
    #[error("Render error: {message}")]
    Render {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Configuration errors.
    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout errors.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        backtrace: Option<backtrace::Backtrace>,
    },
}

impl SvgPaintError {
    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a parse error with source.
    pub fn parse_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Parse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a fetch error.
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
            source: None,
        }
    }

    /// Create a fetch error with source.
    pub fn fetch_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Fetch {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            source: None,
        }
    }

    /// Create a render error.
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source.
    pub fn config_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error with backtrace.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            backtrace: Some(backtrace::Backtrace::new()),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SvgPaintError::Fetch { .. } | SvgPaintError::Timeout(_) | SvgPaintError::Io(_)
        )
    }

    /// Get the error category for reporting.
    pub fn category(&self) -> &'static str {
        match self {
            SvgPaintError::Parse { .. } => "parse",
            SvgPaintError::Fetch { .. } => "fetch",
            SvgPaintError::Decode { .. } => "decode",
            SvgPaintError::Render { .. } => "render",
            SvgPaintError::Config { .. } => "config",
            SvgPaintError::Io(_) => "io",
            SvgPaintError::Timeout(_) => "timeout",
            SvgPaintError::NotFound(_) => "not_found",
            SvgPaintError::InvalidArgument(_) => "invalid_argument",
            SvgPaintError::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for svgpaint operations.
pub type Result<T> = std::result::Result<T, SvgPaintError>;

/// Extension trait for Result.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| SvgPaintError::internal(format!("{}: {}", message.into(), e)))
    }
}

/// Extension trait for Option.
pub trait OptionExt<T> {
    /// Convert None to a NotFound error.
    fn ok_or_not_found(self, resource: impl Into<String>) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, resource: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| SvgPaintError::NotFound(resource.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(SvgPaintError::parse("bad").category(), "parse");
        assert_eq!(SvgPaintError::fetch("404").category(), "fetch");
        assert_eq!(
            SvgPaintError::Timeout(Duration::from_secs(1)).category(),
            "timeout"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(SvgPaintError::fetch("reset").is_retryable());
        assert!(SvgPaintError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!SvgPaintError::decode("truncated png").is_retryable());
        assert!(!SvgPaintError::render("no root").is_retryable());
    }

    #[test]
    fn test_context_wraps_message() {
        let failed: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing.svg",
        ));
        let err = failed.context("reading input").unwrap_err();
        assert_eq!(err.category(), "internal");
        assert!(err.to_string().contains("reading input: missing.svg"));
    }

    #[test]
    fn test_option_ext() {
        let some: Option<i32> = Some(42);
        assert_eq!(some.ok_or_not_found("test").unwrap(), 42);

        let none: Option<i32> = None;
        assert!(matches!(
            none.ok_or_not_found("#gradient"),
            Err(SvgPaintError::NotFound(_))
        ));
    }
}
