use std::{borrow::Cow, collections::HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::RowParseWarning;

const USER_COLUMN: &str = "user";
const PASSWORD_LAST_CHANGED_COLUMN: &str = "password_last_changed";

// Column positions in the AWS credential report, used when the header does
// not name them.
const DEFAULT_USER_INDEX: usize = 0;
const DEFAULT_PASSWORD_LAST_CHANGED_INDEX: usize = 5;

/// When an account's console password was last changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "at")]
pub enum PasswordLastChanged {
    Present(DateTime<Utc>),
    /// The account has no console password (`N/A`)
    NotApplicable,
    /// The account cannot have a password in this report (`not_supported`),
    /// e.g. the AWS root user
    Unsupported,
}

impl PasswordLastChanged {
    /// Decide the variant for a raw report field, or `None` if the field is
    /// not a recognizable timestamp.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match raw {
            "" | "N/A" | "n/a" => return Some(Self::NotApplicable),
            "not_supported" | "unsupported" => return Some(Self::Unsupported),
            _ => {}
        }
        parse_timestamp(raw).map(Self::Present)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Present(ts) => Some(*ts),
            Self::NotApplicable | Self::Unsupported => None,
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// One account's snapshot from the credential report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialReportRow {
    pub account_id: String,
    pub password_last_changed: PasswordLastChanged,
}

#[derive(Debug, Default, Clone)]
pub struct ParsedReport {
    pub rows: Vec<CredentialReportRow>,
    pub warnings: Vec<RowParseWarning>,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    user: usize,
    password_last_changed: usize,
}

impl Columns {
    fn from_header(header: &str) -> Self {
        let names: Vec<&str> = header.split(',').map(str::trim).collect();
        let find = |name: &str, default: usize| {
            names.iter().position(|n| n.eq_ignore_ascii_case(name)).unwrap_or(default)
        };
        Self {
            user: find(USER_COLUMN, DEFAULT_USER_INDEX),
            password_last_changed: find(
                PASSWORD_LAST_CHANGED_COLUMN,
                DEFAULT_PASSWORD_LAST_CHANGED_INDEX,
            ),
        }
    }

    fn min_fields(&self) -> usize {
        self.user.max(self.password_last_changed) + 1
    }
}

/// Parse a credential report body: comma-delimited, one header line, one
/// row per account.
///
/// Rows that cannot be used are skipped and reported as warnings; parsing
/// never fails as a whole.
pub fn parse_report(content: &[u8]) -> ParsedReport {
    let text = String::from_utf8_lossy(content);
    if matches!(text, Cow::Owned(_)) {
        warn!("Credential report is not valid UTF-8; invalid sequences were replaced");
    }

    let mut lines = text.lines().enumerate();
    let Some((_, header)) = lines.next() else {
        return ParsedReport::default();
    };
    let columns = Columns::from_header(header);
    debug!(
        "Credential report columns: user={}, password_last_changed={}",
        columns.user, columns.password_last_changed
    );

    let mut report = ParsedReport::default();
    let mut seen = HashSet::new();

    for (idx, line) in lines {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(line, columns) {
            Ok(row) => {
                if !seen.insert(row.account_id.clone()) {
                    report.warnings.push(RowParseWarning {
                        line: line_no,
                        reason: format!("duplicate account `{}`", row.account_id),
                    });
                    continue;
                }
                report.rows.push(row);
            }
            Err(reason) => report.warnings.push(RowParseWarning { line: line_no, reason }),
        }
    }

    for w in &report.warnings {
        warn!("Skipping credential report row: {w}");
    }
    report
}

fn parse_row(line: &str, columns: Columns) -> Result<CredentialReportRow, String> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < columns.min_fields() {
        return Err(format!(
            "expected at least {} fields, found {}",
            columns.min_fields(),
            fields.len()
        ));
    }

    let account_id = fields[columns.user].trim();
    if account_id.is_empty() {
        return Err("empty account id".to_string());
    }

    let raw = fields[columns.password_last_changed];
    let password_last_changed = PasswordLastChanged::parse(raw).ok_or_else(|| {
        format!("unrecognized password_last_changed value `{}` for `{account_id}`", raw.trim())
    })?;

    Ok(CredentialReportRow { account_id: account_id.to_string(), password_last_changed })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    const HEADER: &str = "user,arn,user_creation_time,password_enabled,password_last_used,password_last_changed,password_next_rotation,mfa_active";

    fn report(rows: &[&str]) -> Vec<u8> {
        let mut s = String::from(HEADER);
        for r in rows {
            s.push('\n');
            s.push_str(r);
        }
        s.into_bytes()
    }

    #[test]
    fn parses_sentinels_and_timestamps() {
        let body = report(&[
            "<root_account>,arn:aws:iam::123:root,2020-01-01T00:00:00+00:00,not_supported,2023-01-01T00:00:00+00:00,not_supported,not_supported,true",
            "alice,arn:aws:iam::123:user/alice,2020-01-01T00:00:00+00:00,true,N/A,2023-03-04T15:16:17+00:00,2023-06-02T15:16:17+00:00,true",
            "svc,arn:aws:iam::123:user/svc,2020-01-01T00:00:00+00:00,false,N/A,N/A,N/A,false",
        ]);
        let parsed = parse_report(&body);

        assert!(parsed.warnings.is_empty());
        assert_eq!(
            parsed.rows,
            vec![
                CredentialReportRow {
                    account_id: "<root_account>".into(),
                    password_last_changed: PasswordLastChanged::Unsupported,
                },
                CredentialReportRow {
                    account_id: "alice".into(),
                    password_last_changed: PasswordLastChanged::Present(
                        Utc.with_ymd_and_hms(2023, 3, 4, 15, 16, 17).unwrap()
                    ),
                },
                CredentialReportRow {
                    account_id: "svc".into(),
                    password_last_changed: PasswordLastChanged::NotApplicable,
                },
            ]
        );
    }

    #[test]
    fn offsets_are_normalized_to_utc() {
        let parsed = PasswordLastChanged::parse("2023-03-04T23:30:00-05:00").unwrap();
        assert_eq!(
            parsed,
            PasswordLastChanged::Present(Utc.with_ymd_and_hms(2023, 3, 5, 4, 30, 0).unwrap())
        );
    }

    #[test]
    fn accepts_naive_forms() {
        assert_eq!(
            PasswordLastChanged::parse("2023-03-04").and_then(|p| p.timestamp()),
            Some(Utc.with_ymd_and_hms(2023, 3, 4, 0, 0, 0).unwrap())
        );
        assert_eq!(
            PasswordLastChanged::parse("2023-03-04 08:00:00").and_then(|p| p.timestamp()),
            Some(Utc.with_ymd_and_hms(2023, 3, 4, 8, 0, 0).unwrap())
        );
        assert_eq!(PasswordLastChanged::parse("unsupported"), Some(PasswordLastChanged::Unsupported));
        assert_eq!(PasswordLastChanged::parse("yesterday"), None);
    }

    #[test]
    fn short_and_garbled_rows_become_warnings() {
        let body = report(&[
            "alice,arn,2020-01-01T00:00:00+00:00",
            "",
            "bob,arn,2020-01-01T00:00:00+00:00,true,N/A,last tuesday,N/A,false",
            ",arn,2020-01-01T00:00:00+00:00,true,N/A,N/A,N/A,false",
            "carol,arn,2020-01-01T00:00:00+00:00,true,N/A,2023-01-01T00:00:00+00:00,N/A,false",
        ]);
        let parsed = parse_report(&body);

        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].account_id, "carol");
        let lines: Vec<usize> = parsed.warnings.iter().map(|w| w.line).collect();
        assert_eq!(lines, vec![2, 4, 5]);
        assert!(parsed.warnings[0].reason.contains("expected at least 6 fields, found 3"));
    }

    #[test]
    fn columns_are_located_from_header() {
        let body = b"password_last_changed,user\r\n2023-01-01T00:00:00+00:00,dave\r\n";
        let parsed = parse_report(body);
        assert!(parsed.warnings.is_empty());
        assert_eq!(parsed.rows[0].account_id, "dave");
    }

    #[test]
    fn duplicate_accounts_keep_first_row() {
        let body = report(&[
            "erin,arn,x,true,N/A,2023-01-01T00:00:00+00:00,N/A,false",
            "erin,arn,x,true,N/A,N/A,N/A,false",
        ]);
        let parsed = parse_report(&body);
        assert_eq!(parsed.rows.len(), 1);
        assert!(parsed.rows[0].password_last_changed.timestamp().is_some());
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn empty_report_has_no_rows() {
        let parsed = parse_report(b"");
        assert!(parsed.rows.is_empty());
        assert!(parsed.warnings.is_empty());
    }
}
