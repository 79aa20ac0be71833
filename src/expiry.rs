use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::credential_report::{CredentialReportRow, PasswordLastChanged};

pub const DEFAULT_MAX_PASSWORD_AGE_DAYS: u32 = 90;
pub const DEFAULT_WARNING_WINDOW_DAYS: u32 = 12;

/// Maximum password age policy and how early users are warned before it
/// applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpiryPolicy {
    pub max_password_age_days: u32,
    pub warning_window_days: u32,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            max_password_age_days: DEFAULT_MAX_PASSWORD_AGE_DAYS,
            warning_window_days: DEFAULT_WARNING_WINDOW_DAYS,
        }
    }
}

/// Outcome of checking one report row against the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    NotApplicable,
    Unsupported,
    BelowThreshold { days: i64 },
    Qualifies { days: i64 },
}

impl ExpiryPolicy {
    /// Accounts whose password is strictly older than this many days are
    /// notified.
    pub fn threshold_days(&self) -> i64 {
        i64::from(self.max_password_age_days) - i64::from(self.warning_window_days)
    }

    pub fn evaluate(&self, row: &CredentialReportRow, today: NaiveDate) -> Evaluation {
        match row.password_last_changed {
            PasswordLastChanged::NotApplicable => Evaluation::NotApplicable,
            PasswordLastChanged::Unsupported => Evaluation::Unsupported,
            PasswordLastChanged::Present(ts) => {
                let days = days_between(ts.date_naive(), today);
                if days > self.threshold_days() {
                    Evaluation::Qualifies { days }
                } else {
                    Evaluation::BelowThreshold { days }
                }
            }
        }
    }
}

/// Whole calendar days from `changed` to `today`. Negative when the change
/// is in the future (clock skew).
pub fn days_between(changed: NaiveDate, today: NaiveDate) -> i64 {
    today.signed_duration_since(changed).num_days()
}
