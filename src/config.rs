use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    expiry::ExpiryPolicy,
    notifier::{NotifierConfig, DEFAULT_CONCURRENCY},
    poll::PollConfig,
    template::TemplateEngine,
};

pub const DEFAULT_SENDER: &str = "cloud-admins@example.com";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Contents of the optional YAML config file. Every field may be omitted.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub sender: Option<String>,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub concurrency: Option<usize>,
    pub policy: Option<ExpiryPolicy>,
    pub poll: Option<PollConfig>,
    pub template: Option<TemplateEngine>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let cfg = serde_yaml::from_str(&data)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        debug!("Loaded config from {}", path.display());
        Ok(cfg)
    }
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub sender: Option<String>,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub concurrency: Option<usize>,
    pub max_password_age_days: Option<u32>,
    pub warning_window_days: Option<u32>,
    pub poll_interval_secs: Option<f64>,
    pub max_poll_attempts: Option<u32>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AwsSettings {
    pub region: Option<String>,
    pub profile: Option<String>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub sender: String,
    pub aws: AwsSettings,
    pub notifier: NotifierConfig,
}

impl Settings {
    /// Merge defaults, the config file and command-line overrides, then
    /// validate the result.
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, ConfigError> {
        let mut policy = file.policy.unwrap_or_default();
        if let Some(days) = overrides.max_password_age_days {
            policy.max_password_age_days = days;
        }
        if let Some(days) = overrides.warning_window_days {
            policy.warning_window_days = days;
        }

        let mut poll = file.poll.unwrap_or_default();
        if let Some(secs) = overrides.poll_interval_secs {
            poll.interval = Duration::try_from_secs_f64(secs).map_err(|e| {
                ConfigError::Invalid(format!("poll interval of {secs} seconds is out of range: {e}"))
            })?;
        }
        if let Some(attempts) = overrides.max_poll_attempts {
            poll.max_attempts = attempts;
        }

        let settings = Self {
            sender: overrides.sender.or(file.sender).unwrap_or_else(|| DEFAULT_SENDER.to_string()),
            aws: AwsSettings {
                region: overrides.region.or(file.region),
                profile: overrides.profile.or(file.profile),
            },
            notifier: NotifierConfig {
                policy,
                poll,
                template: file.template.unwrap_or_default(),
                concurrency: overrides.concurrency.or(file.concurrency).unwrap_or(DEFAULT_CONCURRENCY),
                dry_run: overrides.dry_run,
            },
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let policy = &self.notifier.policy;
        if policy.max_password_age_days == 0 {
            return Err(ConfigError::Invalid("max password age must be at least one day".into()));
        }
        if policy.warning_window_days >= policy.max_password_age_days {
            return Err(ConfigError::Invalid(format!(
                "warning window ({} days) must be shorter than the max password age ({} days)",
                policy.warning_window_days, policy.max_password_age_days
            )));
        }
        let poll = &self.notifier.poll;
        if poll.max_attempts == 0 {
            return Err(ConfigError::Invalid("max poll attempts must be at least 1".into()));
        }
        if !poll.backoff_multiplier.is_finite() || poll.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "backoff multiplier must be >= 1.0, got {}",
                poll.backoff_multiplier
            )));
        }
        if self.notifier.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        let sender = self.sender.trim();
        if sender.is_empty() || !sender.contains('@') {
            return Err(ConfigError::Invalid(format!("sender `{}` is not an email address", self.sender)));
        }
        Ok(())
    }
}
