use async_trait::async_trait;

use crate::error::ServiceError;

/// Identifies one credential report generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: String,
    /// Provider-reported state at request time (e.g. `STARTED`, `COMPLETE`)
    pub state: Option<String>,
}

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), state: None }
    }
}

/// A key/value tag attached to an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// Generates and serves the credential report.
#[async_trait]
pub trait ReportService: Send + Sync {
    /// Start a report generation job, or reuse one already in progress.
    /// Returns without the report body.
    async fn request_report_generation(&self) -> Result<JobHandle, ServiceError>;

    /// The report body, or `None` while the job has not finished.
    async fn fetch_report(&self, job: &JobHandle) -> Result<Option<Vec<u8>>, ServiceError>;
}

/// Looks up account tags.
#[async_trait]
pub trait TagService: Send + Sync {
    async fn list_tags(&self, account_id: &str) -> Result<Vec<Tag>, ServiceError>;
}

pub const EMAIL_TAG_KEY: &str = "email";

/// The value of the first non-empty `email` tag.
pub fn email_from_tags(tags: &[Tag]) -> Option<&str> {
    tags.iter()
        .find(|t| t.key == EMAIL_TAG_KEY && !t.value.trim().is_empty())
        .map(|t| t.value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_email_tag() {
        let tags = vec![Tag::new("team", "sre"), Tag::new("email", "alice@x.com")];
        assert_eq!(email_from_tags(&tags), Some("alice@x.com"));
    }

    #[test]
    fn key_match_is_exact() {
        let tags = vec![Tag::new("Email", "a@x.com"), Tag::new("email_alt", "b@x.com")];
        assert_eq!(email_from_tags(&tags), None);
    }

    #[test]
    fn blank_email_is_ignored() {
        let tags = vec![Tag::new("email", "  "), Tag::new("email", "c@x.com")];
        assert_eq!(email_from_tags(&tags), Some("c@x.com"));
        assert_eq!(email_from_tags(&[]), None);
    }
}
