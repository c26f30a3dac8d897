use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or parameter that caused the error (e.g., "query.city", "body.email")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., upstream status text)
    pub details: Option<String>,
    /// Source of the error (e.g., "weather_handler", "openweathermap")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable error classes, used for the `errorKind` field of call outcomes and
/// for mapping to HTTP status codes at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Configuration,
    UpstreamUnavailable,
    Timeout,
    RetriesExhausted,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Configuration => "configuration",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RetriesExhausted => "retries_exhausted",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the weather poetry backend.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Not found: {message}{}", format_context(.context))]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    #[error("Upstream error: HTTP {status}: {message}")]
    Upstream {
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Upstream call '{operation}' timed out after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Upstream call '{operation}' failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last: Box<Error>,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new not-found error with structured context
    pub fn not_found_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::NotFound {
            message: msg.into(),
            context,
        }
    }

    /// Shorthand for a required parameter that was missing or blank.
    pub fn missing_field(field: &str) -> Self {
        Error::validation_with_context(
            format!("missing required parameter '{}'", field),
            ErrorContext::new()
                .with_field_path(field)
                .with_source("input_validator"),
        )
    }

    /// Upstream answered with something we could not use.
    pub fn malformed_response(source: &str, details: impl Into<String>) -> Self {
        Error::Upstream {
            status: 200,
            message: format!("malformed response from {}: {}", source, details.into()),
            retryable: true,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::NotFound { context, .. } => Some(context),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::Validation { .. } => ErrorKind::InvalidInput,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Upstream { .. } | Error::Transport(_) => ErrorKind::UpstreamUnavailable,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            Error::Io(_) | Error::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Whether another attempt against the same upstream could succeed.
    ///
    /// Invalid input and missing configuration fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Upstream { retryable, .. } => *retryable,
            Error::Timeout { .. } | Error::Transport(_) => true,
            Error::Serialization(_) => true,
            Error::Configuration { .. }
            | Error::Validation { .. }
            | Error::NotFound { .. }
            | Error::RetriesExhausted { .. }
            | Error::Io(_) => false,
        }
    }

    /// Generic message safe to show to end users. Upstream bodies and status
    /// text stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { message, .. } => message.clone(),
            Error::NotFound { .. } => "Not found".to_string(),
            Error::Configuration { .. } => "Server configuration error".to_string(),
            Error::Upstream { .. }
            | Error::Transport(_)
            | Error::Timeout { .. }
            | Error::RetriesExhausted { .. } => {
                "The service is temporarily unavailable, please try again".to_string()
            }
            Error::Io(_) | Error::Serialization(_) => {
                "Something went wrong, please try again".to_string()
            }
        }
    }
}
