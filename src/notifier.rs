use std::{fmt, sync::Arc};

use chrono::NaiveDate;
use futures::{stream, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    credential_report::{parse_report, CredentialReportRow},
    error::{DispatchError, NotifierError, TagLookupError},
    expiry::{Evaluation, ExpiryPolicy},
    identity::{email_from_tags, ReportService, TagService},
    notification::Notifier,
    poll::{poll_until_ready, PollConfig},
    summary::RunSummary,
    template::TemplateEngine,
};

pub const DEFAULT_CONCURRENCY: usize = 8;

/// An account to be notified and the address resolved from its tags.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct NotificationTarget {
    pub account_id: String,
    pub email_address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotifierConfig {
    pub policy: ExpiryPolicy,
    pub poll: PollConfig,
    pub template: TemplateEngine,
    /// Accounts whose tag lookup and dispatch may be in flight at once
    pub concurrency: usize,
    /// Resolve targets but send nothing
    pub dry_run: bool,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            policy: ExpiryPolicy::default(),
            poll: PollConfig::default(),
            template: TemplateEngine::default(),
            concurrency: DEFAULT_CONCURRENCY,
            dry_run: false,
        }
    }
}

/// Progress of a single notifier run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ReportRequested,
    Polling,
    ReportReady,
    Parsing,
    Evaluating,
    Dispatching,
    Done,
    Failed(String),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::ReportRequested => f.write_str("report-requested"),
            RunState::Polling => f.write_str("polling"),
            RunState::ReportReady => f.write_str("report-ready"),
            RunState::Parsing => f.write_str("parsing"),
            RunState::Evaluating => f.write_str("evaluating"),
            RunState::Dispatching => f.write_str("dispatching"),
            RunState::Done => f.write_str("done"),
            RunState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

enum AccountOutcome {
    Notified(NotificationTarget),
    NoEmail(String),
    TagLookupFailed(TagLookupError),
    DispatchFailed(DispatchError),
}

/// Finds accounts with ageing passwords in the credential report and emails
/// each one.
pub struct ExpiryNotifier {
    reports: Arc<dyn ReportService>,
    tags: Arc<dyn TagService>,
    notifier: Arc<dyn Notifier>,
    config: NotifierConfig,
    state: RunState,
}

impl ExpiryNotifier {
    pub fn new(
        reports: Arc<dyn ReportService>,
        tags: Arc<dyn TagService>,
        notifier: Arc<dyn Notifier>,
        config: NotifierConfig,
    ) -> Self {
        Self { reports, tags, notifier, config, state: RunState::Idle }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    fn transition(&mut self, next: RunState) {
        debug!("Notifier state: {} -> {}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: NotifierError) -> NotifierError {
        self.transition(RunState::Failed(err.to_string()));
        err
    }

    /// Run the workflow once. `today` is the current UTC date.
    ///
    /// Only report generation and polling failures are returned as errors;
    /// per-account problems are recorded in the summary.
    pub async fn run(&mut self, today: NaiveDate) -> Result<RunSummary, NotifierError> {
        self.state = RunState::Idle;

        let job = match self.reports.request_report_generation().await {
            Ok(job) => job,
            Err(e) => return Err(self.fail(NotifierError::ReportGeneration(e))),
        };
        self.transition(RunState::ReportRequested);
        info!(
            "Requested credential report generation (job {}, state {})",
            job.id,
            job.state.as_deref().unwrap_or("unknown")
        );

        self.transition(RunState::Polling);
        let reports = Arc::clone(&self.reports);
        let content = match poll_until_ready(reports.as_ref(), &job, &self.config.poll).await {
            Ok(content) => content,
            Err(e) => return Err(self.fail(e)),
        };
        self.transition(RunState::ReportReady);

        self.transition(RunState::Parsing);
        let parsed = parse_report(&content);
        info!(
            "Parsed credential report: {} accounts, {} skipped rows",
            parsed.rows.len(),
            parsed.warnings.len()
        );

        self.transition(RunState::Evaluating);
        let mut summary = RunSummary::new(self.config.dry_run);
        summary.rows_parsed = parsed.rows.len();
        summary.parse_warnings = parsed.warnings;
        let qualifying = self.evaluate(&parsed.rows, today, &mut summary);
        summary.qualifying = qualifying.len();
        info!(
            "{} accounts have passwords older than {} days",
            qualifying.len(),
            self.config.policy.threshold_days()
        );

        self.transition(RunState::Dispatching);
        let outcomes = self.dispatch_all(qualifying).await;
        for outcome in outcomes {
            match outcome {
                AccountOutcome::Notified(target) => summary.notified.push(target),
                AccountOutcome::NoEmail(account_id) => summary.no_email.push(account_id),
                AccountOutcome::TagLookupFailed(e) => {
                    summary.no_email.push(e.account_id.clone());
                    summary.tag_lookup_failures.push(e.into());
                }
                AccountOutcome::DispatchFailed(e) => summary.dispatch_failures.push(e.into()),
            }
        }
        summary.sort();

        self.transition(RunState::Done);
        info!(
            "Notifier finished: {} notified, {} without email, {} failed",
            summary.notified.len(),
            summary.no_email.len(),
            summary.dispatch_failures.len()
        );
        Ok(summary)
    }

    fn evaluate<'r>(
        &self,
        rows: &'r [CredentialReportRow],
        today: NaiveDate,
        summary: &mut RunSummary,
    ) -> Vec<&'r str> {
        let mut qualifying = Vec::new();
        for row in rows {
            match self.config.policy.evaluate(row, today) {
                Evaluation::NotApplicable => summary.skipped_not_applicable += 1,
                Evaluation::Unsupported => summary.skipped_unsupported += 1,
                Evaluation::BelowThreshold { .. } => summary.below_threshold += 1,
                Evaluation::Qualifies { days } => {
                    debug!("{} changed their password {days} days ago", row.account_id);
                    qualifying.push(row.account_id.as_str());
                }
            }
        }
        qualifying
    }

    async fn dispatch_all(&self, accounts: Vec<&str>) -> Vec<AccountOutcome> {
        let concurrency = self.config.concurrency.max(1);
        stream::iter(accounts)
            .map(|account_id| self.process_account(account_id))
            .buffer_unordered(concurrency)
            .collect()
            .await
    }

    async fn process_account(&self, account_id: &str) -> AccountOutcome {
        let tags = match self.tags.list_tags(account_id).await {
            Ok(tags) => tags,
            Err(source) => {
                let err = TagLookupError { account_id: account_id.to_string(), source };
                warn!("{err}; treating as no email address");
                return AccountOutcome::TagLookupFailed(err);
            }
        };

        let Some(email) = email_from_tags(&tags) else {
            debug!("{account_id} has no email tag; skipping");
            return AccountOutcome::NoEmail(account_id.to_string());
        };
        let target =
            NotificationTarget { account_id: account_id.to_string(), email_address: email.to_string() };

        if self.config.dry_run {
            info!("Dry run: would notify {} <{}>", target.account_id, target.email_address);
            return AccountOutcome::Notified(target);
        }

        let message = self
            .config
            .template
            .render_expiry_notice(&target.account_id, self.config.policy.warning_window_days);
        match self.notifier.send(&target.email_address, &message.subject, &message.html_body).await
        {
            Ok(()) => {
                info!("Notified {} <{}>", target.account_id, target.email_address);
                AccountOutcome::Notified(target)
            }
            Err(source) => {
                let err = DispatchError {
                    account_id: target.account_id,
                    email: target.email_address,
                    source,
                };
                warn!("{err}");
                AccountOutcome::DispatchFailed(err)
            }
        }
    }
}
