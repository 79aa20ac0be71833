use std::io::{self, Write};

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    credential_report::{ParsedReport, PasswordLastChanged},
    error::{DispatchError, RowParseWarning, TagLookupError},
    expiry::{Evaluation, ExpiryPolicy},
    notifier::NotificationTarget,
};

pub const COMPLETION_MESSAGE: &str = "Password expiry notifications sent.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub error: String,
}

impl From<TagLookupError> for FailureRecord {
    fn from(e: TagLookupError) -> Self {
        Self { account_id: e.account_id, email: None, error: e.source.to_string() }
    }
}

impl From<DispatchError> for FailureRecord {
    fn from(e: DispatchError) -> Self {
        Self { account_id: e.account_id, email: Some(e.email), error: e.source.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarningRecord {
    pub line: usize,
    pub reason: String,
}

impl From<&RowParseWarning> for WarningRecord {
    fn from(w: &RowParseWarning) -> Self {
        Self { line: w.line, reason: w.reason.clone() }
    }
}

/// What a notifier run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub rows_parsed: usize,
    pub qualifying: usize,
    /// Targets that were sent a notification (or would have been, in a dry run)
    pub notified: Vec<NotificationTarget>,
    pub skipped_not_applicable: usize,
    pub skipped_unsupported: usize,
    pub below_threshold: usize,
    /// Qualifying accounts without a usable email tag
    pub no_email: Vec<String>,
    pub tag_lookup_failures: Vec<FailureRecord>,
    pub dispatch_failures: Vec<FailureRecord>,
    #[serde(serialize_with = "serialize_warnings")]
    pub parse_warnings: Vec<RowParseWarning>,
}

fn serialize_warnings<S: serde::Serializer>(
    warnings: &[RowParseWarning],
    s: S,
) -> Result<S::Ok, S::Error> {
    s.collect_seq(warnings.iter().map(WarningRecord::from))
}

impl RunSummary {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run, ..Self::default() }
    }

    pub fn message(&self) -> &'static str {
        COMPLETION_MESSAGE
    }

    pub fn sent(&self) -> usize {
        self.notified.len()
    }

    pub fn skipped(&self) -> usize {
        self.skipped_not_applicable
            + self.skipped_unsupported
            + self.below_threshold
            + self.no_email.len()
    }

    pub fn failed(&self) -> usize {
        self.dispatch_failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.dispatch_failures.is_empty()
    }

    /// Order per-account lists by account id so runs are comparable.
    pub fn sort(&mut self) {
        self.notified.sort();
        self.no_email.sort();
        self.tag_lookup_failures.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        self.dispatch_failures.sort_by(|a, b| a.account_id.cmp(&b.account_id));
    }

    pub fn write_pretty<W: Write>(&self, mut w: W) -> io::Result<()> {
        writeln!(w, "{}", self.message())?;
        writeln!(w)?;
        writeln!(w, "Summary{}:", if self.dry_run { " (dry run)" } else { "" })?;
        let sent_label = if self.dry_run { "Would notify:" } else { "Notified:" };
        writeln!(w, "  {:<24} {}", "Accounts in report:", self.rows_parsed)?;
        writeln!(w, "  {:<24} {}", "Passwords expiring:", self.qualifying)?;
        writeln!(w, "  {:<24} {}", sent_label, self.sent())?;
        writeln!(w, "  {:<24} {}", "Skipped:", self.skipped())?;
        writeln!(w, "  {:<24} {}", "Failed:", self.failed())?;

        if !self.notified.is_empty() {
            writeln!(w, "\nNotified accounts:")?;
            for t in &self.notified {
                writeln!(w, "  {} <{}>", t.account_id, t.email_address)?;
            }
        }
        if !self.no_email.is_empty() {
            writeln!(w, "\nExpiring accounts without an email tag:")?;
            for a in &self.no_email {
                writeln!(w, "  {a}")?;
            }
        }
        if !self.dispatch_failures.is_empty() {
            writeln!(w, "\nFailed notifications:")?;
            for f in &self.dispatch_failures {
                writeln!(
                    w,
                    "  {} <{}>: {}",
                    f.account_id,
                    f.email.as_deref().unwrap_or("-"),
                    f.error
                )?;
            }
        }
        if !self.parse_warnings.is_empty() {
            writeln!(w, "\nSkipped report rows:")?;
            for warning in &self.parse_warnings {
                writeln!(w, "  {warning}")?;
            }
        }
        Ok(())
    }

    pub fn write_json<W: Write>(&self, mut w: W) -> io::Result<()> {
        let value = serde_json::json!({
            "message": self.message(),
            "sent": self.sent(),
            "skipped": self.skipped(),
            "failed": self.failed(),
            "summary": self,
        });
        serde_json::to_writer_pretty(&mut w, &value)?;
        writeln!(w)
    }
}

/// One row of the `report` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgeEntry {
    pub account_id: String,
    pub password_last_changed: Option<String>,
    pub days_since_change: Option<i64>,
    pub status: &'static str,
}

/// Password age for every account in a report, without resolving contacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgeReport {
    pub generated_for: NaiveDate,
    pub threshold_days: i64,
    pub entries: Vec<AgeEntry>,
    pub warnings: Vec<WarningRecord>,
}

impl AgeReport {
    pub fn build(parsed: &ParsedReport, policy: &ExpiryPolicy, today: NaiveDate) -> Self {
        let entries = parsed
            .rows
            .iter()
            .map(|row| {
                let (days, status) = match policy.evaluate(row, today) {
                    Evaluation::NotApplicable => (None, "not-applicable"),
                    Evaluation::Unsupported => (None, "unsupported"),
                    Evaluation::BelowThreshold { days } => (Some(days), "ok"),
                    Evaluation::Qualifies { days } => (Some(days), "expiring"),
                };
                let changed = match row.password_last_changed {
                    PasswordLastChanged::Present(ts) => Some(ts.to_rfc3339()),
                    _ => None,
                };
                AgeEntry {
                    account_id: row.account_id.clone(),
                    password_last_changed: changed,
                    days_since_change: days,
                    status,
                }
            })
            .collect();
        Self {
            generated_for: today,
            threshold_days: policy.threshold_days(),
            entries,
            warnings: parsed.warnings.iter().map(WarningRecord::from).collect(),
        }
    }

    pub fn expiring(&self) -> impl Iterator<Item = &AgeEntry> {
        self.entries.iter().filter(|e| e.status == "expiring")
    }

    pub fn write_pretty<W: Write>(&self, mut w: W) -> io::Result<()> {
        let name_width =
            self.entries.iter().map(|e| e.account_id.len()).max().unwrap_or(0).max("Account".len());
        writeln!(
            w,
            "{:name_width$} │ {:>4} │ {:14} │ Last changed",
            "Account",
            "Days",
            "Status",
            name_width = name_width
        )?;
        writeln!(w, "{0:─<name_width$} ┼ {0:─<4} ┼ {0:─<14} ┼ {0:─<25}", "", name_width = name_width)?;
        for e in &self.entries {
            writeln!(
                w,
                "{:name_width$} │ {:>4} │ {:14} │ {}",
                e.account_id,
                e.days_since_change.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                e.status,
                e.password_last_changed.as_deref().unwrap_or("-"),
                name_width = name_width
            )?;
        }
        writeln!(
            w,
            "\n{} of {} accounts have passwords older than {} days",
            self.expiring().count(),
            self.entries.len(),
            self.threshold_days
        )?;
        for warning in &self.warnings {
            writeln!(w, "  skipped line {}: {}", warning.line, warning.reason)?;
        }
        Ok(())
    }

    pub fn write_json<W: Write>(&self, mut w: W) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut w, self)?;
        writeln!(w)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::credential_report::parse_report;

    fn sample_summary() -> RunSummary {
        let mut s = RunSummary::new(false);
        s.rows_parsed = 4;
        s.qualifying = 3;
        s.notified.push(NotificationTarget {
            account_id: "alice".into(),
            email_address: "alice@x.com".into(),
        });
        s.no_email.push("carol".into());
        s.below_threshold = 1;
        s.dispatch_failures.push(FailureRecord {
            account_id: "dave".into(),
            email: Some("dave@x.com".into()),
            error: "MessageRejected".into(),
        });
        s
    }

    #[test]
    fn counts() {
        let s = sample_summary();
        assert_eq!((s.sent(), s.skipped(), s.failed()), (1, 2, 1));
        assert!(s.has_failures());
    }

    #[test]
    fn pretty_output_lists_accounts() {
        let mut buf = Vec::new();
        sample_summary().write_pretty(&mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.starts_with("Password expiry notifications sent.\n"));
        assert!(out.contains("alice <alice@x.com>"));
        assert!(out.contains("dave <dave@x.com>: MessageRejected"));
        assert!(out.contains("  carol"));
    }

    #[test]
    fn json_output_has_counts() {
        let mut buf = Vec::new();
        sample_summary().write_json(&mut buf).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(v["message"], "Password expiry notifications sent.");
        assert_eq!(v["sent"], 1);
        assert_eq!(v["failed"], 1);
        assert_eq!(v["summary"]["notified"][0]["email_address"], "alice@x.com");
    }

    #[test]
    fn age_report_statuses() {
        let body = b"user,arn,created,password_enabled,password_last_used,password_last_changed\n\
            alice,a,x,true,N/A,2024-03-01T00:00:00+00:00\n\
            bob,a,x,true,N/A,2024-05-20T00:00:00+00:00\n\
            <root_account>,a,x,not_supported,N/A,not_supported\n";
        let parsed = parse_report(body);
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let report = AgeReport::build(&parsed, &ExpiryPolicy::default(), today);

        let statuses: Vec<(&str, Option<i64>, &str)> = report
            .entries
            .iter()
            .map(|e| (e.account_id.as_str(), e.days_since_change, e.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("alice", Some(92), "expiring"),
                ("bob", Some(12), "ok"),
                ("<root_account>", None, "unsupported"),
            ]
        );
        assert_eq!(report.expiring().count(), 1);

        let mut buf = Vec::new();
        report.write_pretty(&mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("1 of 3 accounts have passwords older than 78 days"));
    }
}
