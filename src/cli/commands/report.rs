use std::{io::Write, path::PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, ValueHint};
use tracing::info;

use crate::{
    aws::{load_sdk_config, IamReportService},
    cli::commands::{
        options::{AwsArgs, PolicyArgs, PollArgs},
        output::{OutputArgs, OutputFormat},
    },
    config::{Overrides, Settings},
    credential_report::parse_report,
    identity::ReportService,
    poll::poll_until_ready,
    summary::AgeReport,
};

/// Arguments for the `report` command
#[derive(Args, Debug, Clone, Default)]
pub struct ReportArgs {
    #[command(flatten)]
    pub policy: PolicyArgs,

    #[command(flatten)]
    pub poll: PollArgs,

    #[command(flatten)]
    pub aws: AwsArgs,

    /// Read a saved credential report CSV instead of fetching one from IAM
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: Option<PathBuf>,

    #[command(flatten)]
    pub output_args: OutputArgs,
}

impl ReportArgs {
    pub fn settings(&self) -> Result<Settings> {
        let file = self.policy.load_file()?;
        let mut overrides = Overrides::default();
        self.policy.apply(&mut overrides);
        self.poll.apply(&mut overrides);
        self.aws.apply(&mut overrides);
        Ok(Settings::resolve(file, overrides)?)
    }
}

/// Run the `report` command
pub async fn run(args: &ReportArgs) -> Result<()> {
    let settings = args.settings()?;

    let content = match &args.input {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("Failed to read credential report {}", path.display()))?,
        None => {
            let sdk_config = load_sdk_config(&settings.aws).await;
            let reports = IamReportService::new(&sdk_config);
            let job = reports
                .request_report_generation()
                .await
                .context("Failed to request credential report generation")?;
            poll_until_ready(&reports, &job, &settings.notifier.poll).await?
        }
    };

    let parsed = parse_report(&content);
    info!("Parsed {} accounts from the credential report", parsed.rows.len());
    let report = AgeReport::build(&parsed, &settings.notifier.policy, Utc::now().date_naive());

    let mut writer = args.output_args.get_writer()?;
    match args.output_args.format {
        OutputFormat::Pretty => report.write_pretty(&mut writer)?,
        OutputFormat::Json => report.write_json(&mut writer)?,
    }
    writer.flush().context("Failed to write report")?;
    Ok(())
}
