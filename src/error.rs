//! Error types for the Halldyll deployment synchronizer.
//!
//! Every failure maps onto one [`ErrorKind`] of the reconciliation taxonomy
//! (validation, client, not-found, timeout, poll-timeout, unsupported
//! operation, cancellation). The host orchestrator never sees these types
//! directly: the reconciler turns them into [`Diagnostic`] values.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// HTTP statuses classified as a gateway-side timeout.
const TIMEOUT_STATUSES: &[u16] = &[408, 504, 524];

/// Message fragments that mark a timeout when no status is available.
const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out", "deadline exceeded"];

/// The main error type for the Halldyll deployment synchronizer.
#[derive(Debug, Error)]
pub enum HalldyllError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote gateway errors.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Environment variable holds a value that cannot be used.
    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvVar {
        /// Name of the variable.
        name: String,
        /// The rejected value.
        value: String,
    },
}

/// Errors returned by the remote control-plane gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Authentication failed.
    #[error("Control-plane authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Control-plane request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Rate limited.
    #[error("Control-plane rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The addressed resource does not exist.
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Identifier of the missing resource.
        resource: String,
    },

    /// The request timed out, either at the gateway or in transit.
    #[error("Request timed out{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Timeout {
        /// HTTP status code, when the timeout was reported by the server.
        status: Option<u16>,
        /// Description of the timeout.
        message: String,
    },

    /// The remote API has no endpoint for this operation on this kind.
    #[error("Operation '{operation}' is not supported for {kind} resources")]
    Unsupported {
        /// The rejected operation.
        operation: String,
        /// Resource kind.
        kind: String,
    },

    /// Requested GPU class is not currently offered.
    #[error("GPU class not available: {gpu_class}")]
    GpuUnavailable {
        /// Requested GPU class.
        gpu_class: String,
    },

    /// Network error.
    #[error("Network error communicating with the control plane: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from the control plane: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The deletion poller exhausted its deadline without observing not-found.
    #[error(
        "Deletion of {resource} not confirmed after {waited_secs}s ({polls} polls); \
         the remote side may still be deleting it"
    )]
    PollTimeout {
        /// Resource being deleted.
        resource: String,
        /// Seconds waited.
        waited_secs: u64,
        /// Number of polls issued.
        polls: u32,
    },

    /// The caller cancelled an in-flight operation.
    #[error("Operation on {resource} cancelled: {reason}")]
    Cancelled {
        /// Resource being operated on.
        resource: String,
        /// Cancellation cause.
        reason: String,
    },

    /// The resource kind has no update endpoint.
    #[error("Update is not supported for {kind} resources; destroy and recreate explicitly")]
    UnsupportedOperation {
        /// Resource kind.
        kind: String,
    },

    /// The declared change cannot be applied in place.
    #[error("Changes to {} require replacing {resource}", .fields.join(", "))]
    RequiresReplace {
        /// Resource name.
        resource: String,
        /// Fields whose change forces replacement.
        fields: Vec<String>,
    },

    /// A lifecycle transition that the state machine does not allow.
    #[error("Invalid lifecycle transition from {from} on {event}")]
    InvalidTransition {
        /// Phase the resource was in.
        from: String,
        /// Event that was applied.
        event: String,
    },
}

/// Result type alias for Halldyll operations.
pub type Result<T> = std::result::Result<T, HalldyllError>;

/// Reconciliation error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed declared configuration, raised before any remote call.
    Validation,
    /// The remote call failed for a reason other than timeout or not-found.
    Client,
    /// The remote resource does not exist.
    NotFound,
    /// The remote call timed out.
    Timeout,
    /// Deletion was not confirmed before the poll deadline.
    PollTimeout,
    /// The resource kind cannot be updated in place.
    UnsupportedOperation,
    /// The caller cancelled the operation.
    Cancelled,
    /// Anything else.
    Internal,
}

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Non-fatal; the returned state is usable.
    Warning,
    /// Fatal for the operation.
    Error,
}

/// Structured diagnostic handed back to the host orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Error taxonomy kind.
    pub kind: ErrorKind,
    /// One-line summary.
    pub summary: String,
    /// Optional detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HalldyllError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Gateway(GatewayError::RateLimited { .. } | GatewayError::NetworkError { .. })
        )
    }

    /// Returns the wait the remote side asked for, in seconds.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Gateway(GatewayError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Returns true if the remote side reported the resource as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Gateway(GatewayError::NotFound { .. }))
    }

    /// Returns true if the remote call timed out.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Gateway(GatewayError::Timeout { .. }))
    }

    /// Maps this error onto the reconciliation taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Validation,
            Self::Gateway(GatewayError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Gateway(GatewayError::Timeout { .. }) => ErrorKind::Timeout,
            Self::Gateway(GatewayError::Unsupported { .. })
            | Self::Reconcile(ReconcileError::UnsupportedOperation { .. }) => {
                ErrorKind::UnsupportedOperation
            }
            Self::Gateway(_) => ErrorKind::Client,
            Self::Reconcile(ReconcileError::PollTimeout { .. }) => ErrorKind::PollTimeout,
            Self::Reconcile(ReconcileError::Cancelled { .. }) => ErrorKind::Cancelled,
            Self::Reconcile(ReconcileError::RequiresReplace { .. }) => ErrorKind::Validation,
            Self::Reconcile(ReconcileError::InvalidTransition { .. })
            | Self::Io(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl GatewayError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Classifies a failed response by status and message.
    ///
    /// Timeouts are recognised by status (408, 504, 524) or, when the
    /// transport gives no status, by a timeout marker in the message.
    #[must_use]
    pub fn classify(status: Option<u16>, resource: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            Some(404) => Self::NotFound {
                resource: resource.to_string(),
            },
            Some(code) if TIMEOUT_STATUSES.contains(&code) => Self::Timeout {
                status: Some(code),
                message,
            },
            Some(401 | 403) => Self::AuthenticationFailed { message },
            Some(code) => Self::api_error(code, message),
            None if is_timeout_message(&message) => Self::Timeout {
                status: None,
                message,
            },
            None => Self::network(message),
        }
    }
}

fn is_timeout_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    TIMEOUT_MARKERS.iter().any(|marker| lowered.contains(marker))
}

impl Diagnostic {
    /// Creates an error diagnostic.
    #[must_use]
    pub fn error(kind: ErrorKind, summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            summary: summary.into(),
            detail: None,
        }
    }

    /// Creates a warning diagnostic.
    #[must_use]
    pub fn warning(kind: ErrorKind, summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            summary: summary.into(),
            detail: None,
        }
    }

    /// Attaches detail text.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Returns true for error severity.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl From<&HalldyllError> for Diagnostic {
    fn from(err: &HalldyllError) -> Self {
        Self::error(err.kind(), err.to_string())
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{severity}: {}", self.summary)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}
