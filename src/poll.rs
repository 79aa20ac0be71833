use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    error::{NotifierError, ServiceError},
    identity::{JobHandle, ReportService},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 24;

/// Bounds on waiting for the credential report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Wait before the first fetch and between fetches
    #[serde(with = "secs")]
    pub interval: Duration,
    /// Upper bound for the wait after backoff is applied
    #[serde(with = "secs")]
    pub max_interval: Duration,
    /// Factor applied to the wait after each unsuccessful attempt; 1.0 keeps
    /// the interval fixed
    pub backoff_multiplier: f64,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_interval: DEFAULT_MAX_POLL_INTERVAL,
            backoff_multiplier: 1.0,
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

impl PollConfig {
    /// Wait before attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exp);
        let secs = self.interval.as_secs_f64() * factor;
        let ceiling = self.max_interval.max(self.interval);
        let capped = secs.min(ceiling.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(ceiling)
    }

    /// Total time spent waiting if every attempt comes back empty.
    pub fn worst_case(&self) -> Duration {
        (1..=self.max_attempts).fold(Duration::ZERO, |total, a| total.saturating_add(self.delay_for(a)))
    }
}

/// Fetch the report for `job` until it has content or the attempt budget
/// runs out.
pub async fn poll_until_ready(
    reports: &dyn ReportService,
    job: &JobHandle,
    config: &PollConfig,
) -> Result<Vec<u8>, NotifierError> {
    let mut last_error: Option<ServiceError> = None;

    for attempt in 1..=config.max_attempts {
        let delay = config.delay_for(attempt);
        debug!("Waiting {:?} before credential report fetch attempt {attempt}", delay);
        sleep(delay).await;

        match reports.fetch_report(job).await {
            Ok(Some(content)) => {
                debug!("Credential report ready after {attempt} attempts ({} bytes)", content.len());
                return Ok(content);
            }
            Ok(None) => {
                debug!("Credential report not ready (attempt {attempt}/{})", config.max_attempts);
            }
            Err(e) => {
                warn!(
                    "Credential report fetch failed (attempt {attempt}/{}): {e}",
                    config.max_attempts
                );
                last_error = Some(e);
            }
        }
    }

    Err(NotifierError::ReportTimeout { attempts: config.max_attempts, last_error })
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(|e| {
            serde::de::Error::custom(format!(
                "duration must be a non-negative number of seconds, got {secs}: {e}"
            ))
        })
    }
}
