pub mod aws;
pub mod cli;
pub mod config;
pub mod credential_report;
pub mod error;
pub mod expiry;
pub mod identity;
pub mod notification;
pub mod notifier;
pub mod poll;
pub mod summary;
pub mod template;

pub use credential_report::{parse_report, CredentialReportRow, ParsedReport, PasswordLastChanged};
pub use error::{DispatchError, NotifierError, RowParseWarning, ServiceError, TagLookupError};
pub use notifier::{ExpiryNotifier, NotificationTarget, NotifierConfig, RunState};
pub use summary::RunSummary;
