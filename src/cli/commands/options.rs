use std::path::PathBuf;

use clap::{Args, ValueHint};

use crate::config::{ConfigError, FileConfig, Overrides};

/// Config file and password policy
#[derive(Args, Debug, Clone, Default)]
pub struct PolicyArgs {
    /// YAML config file
    #[arg(long, value_name = "FILE", env = "IAMWATCH_CONFIG", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Maximum password age enforced by the account password policy
    #[arg(long = "max-age-days", value_name = "DAYS")]
    pub max_age_days: Option<u32>,

    /// How many days before expiry users are warned
    #[arg(long = "warning-days", value_name = "DAYS")]
    pub warning_days: Option<u32>,
}

impl PolicyArgs {
    pub fn load_file(&self) -> Result<FileConfig, ConfigError> {
        match &self.config {
            Some(path) => FileConfig::load(path),
            None => Ok(FileConfig::default()),
        }
    }

    pub fn apply(&self, overrides: &mut Overrides) {
        overrides.max_password_age_days = self.max_age_days;
        overrides.warning_window_days = self.warning_days;
    }
}

/// Waiting for the credential report
#[derive(Args, Debug, Clone, Default)]
pub struct PollArgs {
    /// Seconds to wait before each credential report fetch
    #[arg(long = "poll-interval", value_name = "SECS")]
    pub poll_interval: Option<f64>,

    /// Give up after this many fetches
    #[arg(long = "max-poll-attempts", value_name = "N")]
    pub max_poll_attempts: Option<u32>,
}

impl PollArgs {
    pub fn apply(&self, overrides: &mut Overrides) {
        overrides.poll_interval_secs = self.poll_interval;
        overrides.max_poll_attempts = self.max_poll_attempts;
    }
}

/// AWS connection
#[derive(Args, Debug, Clone, Default)]
pub struct AwsArgs {
    /// Named profile from the shared AWS config
    #[arg(long, value_name = "PROFILE", env = "IAMWATCH_PROFILE")]
    pub profile: Option<String>,

    /// AWS region for IAM and SES
    #[arg(long, value_name = "REGION", env = "IAMWATCH_REGION")]
    pub region: Option<String>,
}

impl AwsArgs {
    pub fn apply(&self, overrides: &mut Overrides) {
        overrides.profile = self.profile.clone();
        overrides.region = self.region.clone();
    }
}
