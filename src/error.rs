use std::fmt;

/// A failure reported by one of the external collaborators (report service,
/// tag service or notifier).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
    /// Throttling or transient transport failure
    pub retryable: bool,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), retryable: false }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self { message: message.into(), retryable: true }
    }
}

/// Errors that abort a notifier run.
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("credential report generation failed: {0}")]
    ReportGeneration(#[source] ServiceError),

    #[error(
        "credential report was not ready after {attempts} attempts{detail}",
        detail = format_last_error(.last_error.as_ref())
    )]
    ReportTimeout { attempts: u32, last_error: Option<ServiceError> },
}

fn format_last_error(err: Option<&ServiceError>) -> String {
    err.map(|e| format!(" (last error: {e})")).unwrap_or_default()
}

/// Tag lookup failed for a single account; the account is treated as having
/// no email address.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to list tags for {account_id}: {source}")]
pub struct TagLookupError {
    pub account_id: String,
    #[source]
    pub source: ServiceError,
}

/// Sending a notification to a single account failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to notify {account_id} <{email}>: {source}")]
pub struct DispatchError {
    pub account_id: String,
    pub email: String,
    #[source]
    pub source: ServiceError,
}

/// Why a report row was skipped during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowParseWarning {
    /// 1-based line number within the report, header included
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for RowParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}
