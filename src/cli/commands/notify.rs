use std::{io::Write, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use tracing::{debug, info};

use crate::{
    aws::{load_sdk_config, IamReportService, IamTagService, SesNotifier},
    cli::commands::{
        options::{AwsArgs, PolicyArgs, PollArgs},
        output::{OutputArgs, OutputFormat},
    },
    config::{Overrides, Settings},
    notification::{ConsoleNotifier, Notifier},
    notifier::ExpiryNotifier,
    summary::RunSummary,
};

/// Exit status when at least one notification could not be delivered
pub const EXIT_DISPATCH_FAILURES: i32 = 2;

/// Arguments for the `notify` command
#[derive(Args, Debug, Clone, Default)]
pub struct NotifyArgs {
    #[command(flatten)]
    pub policy: PolicyArgs,

    #[command(flatten)]
    pub poll: PollArgs,

    #[command(flatten)]
    pub aws: AwsArgs,

    /// Address notifications are sent from (must be verified in SES)
    #[arg(long, value_name = "ADDRESS", env = "IAMWATCH_SENDER")]
    pub sender: Option<String>,

    /// Resolve who would be notified without sending anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print each message to stdout instead of sending it through SES
    #[arg(long, conflicts_with = "dry_run")]
    pub console: bool,

    /// Accounts processed concurrently during tag lookup and dispatch
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    #[command(flatten)]
    pub output_args: OutputArgs,
}

impl NotifyArgs {
    pub fn settings(&self) -> Result<Settings> {
        let file = self.policy.load_file()?;
        let mut overrides = Overrides {
            sender: self.sender.clone(),
            concurrency: self.concurrency,
            dry_run: self.dry_run,
            ..Overrides::default()
        };
        self.policy.apply(&mut overrides);
        self.poll.apply(&mut overrides);
        self.aws.apply(&mut overrides);
        Ok(Settings::resolve(file, overrides)?)
    }
}

/// Run the `notify` command and return the process exit code
pub async fn run(args: &NotifyArgs) -> Result<i32> {
    let settings = args.settings()?;
    let sdk_config = load_sdk_config(&settings.aws).await;

    let notifier: Arc<dyn Notifier> = if args.console {
        Arc::new(ConsoleNotifier::new(settings.sender.clone()))
    } else {
        Arc::new(SesNotifier::new(&sdk_config, settings.sender.clone()))
    };

    let mut workflow = ExpiryNotifier::new(
        Arc::new(IamReportService::new(&sdk_config)),
        Arc::new(IamTagService::new(&sdk_config)),
        notifier,
        settings.notifier,
    );
    info!(
        "Checking for passwords older than {} days",
        workflow.config().policy.threshold_days()
    );
    debug!(
        "Waiting at most {:?} for the credential report",
        workflow.config().poll.worst_case()
    );

    let summary = workflow
        .run(Utc::now().date_naive())
        .await
        .context("Password expiry notification run failed")?;

    write_summary(&summary, &args.output_args)?;
    Ok(exit_code(&summary))
}

pub fn write_summary(summary: &RunSummary, output: &OutputArgs) -> Result<()> {
    let mut writer = output.get_writer()?;
    match output.format {
        OutputFormat::Pretty => summary.write_pretty(&mut writer)?,
        OutputFormat::Json => summary.write_json(&mut writer)?,
    }
    writer.flush().context("Failed to write summary")?;
    Ok(())
}

pub fn exit_code(summary: &RunSummary) -> i32 {
    if summary.has_failures() {
        EXIT_DISPATCH_FAILURES
    } else {
        0
    }
}
