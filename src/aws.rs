use async_trait::async_trait;
use aws_config::{meta::region::RegionProviderChain, BehaviorVersion, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_iam::{
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    Client as IamClient,
};
use aws_sdk_ses::{
    types::{Body, Content, Destination, Message},
    Client as SesClient,
};
use aws_types::region::Region;
use tracing::debug;

use crate::{
    config::AwsSettings,
    error::ServiceError,
    identity::{JobHandle, ReportService, Tag, TagService},
    notification::Notifier,
};

const DEFAULT_REGION: &str = "us-east-1";

/// Load the shared SDK config: default provider chain, optional profile and
/// region, and explicit keys from `IAMWATCH_AWS_KEY` / `IAMWATCH_AWS_SECRET`
/// when both are set.
pub async fn load_sdk_config(settings: &AwsSettings) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(profile) = settings.profile.as_deref() {
        loader = loader.profile_name(profile);
    }

    if let (Ok(key), Ok(secret)) =
        (std::env::var("IAMWATCH_AWS_KEY"), std::env::var("IAMWATCH_AWS_SECRET"))
    {
        let token = std::env::var("IAMWATCH_AWS_SESSION_TOKEN").ok();
        let creds = Credentials::new(key, secret, token, None, "iamwatch_env");
        loader = loader.credentials_provider(creds);
    }

    let region_provider = match settings.region.as_deref() {
        Some(region) => RegionProviderChain::first_try(Region::new(region.to_string())),
        None => RegionProviderChain::default_provider(),
    }
    .or_else(Region::from_static(DEFAULT_REGION));

    let config = loader.region(region_provider).load().await;
    debug!(
        "AWS config loaded (region {})",
        config.region().map(|r| r.as_ref()).unwrap_or(DEFAULT_REGION)
    );
    config
}

fn service_error<E, R>(operation: &str, err: &SdkError<E, R>) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = format!("{operation} failed: {}", DisplayErrorContext(err));
    if is_throttling_or_transient(err) {
        ServiceError::retryable(message)
    } else {
        ServiceError::new(message)
    }
}

fn is_throttling_or_transient<E, R>(err: &SdkError<E, R>) -> bool
where
    E: ProvideErrorMetadata,
{
    match err {
        SdkError::ServiceError(ctx) => {
            let code = ctx.err().code().unwrap_or_default();
            code.contains("Throttl") || code == "ServiceFailure" || code == "ServiceUnavailable"
        }
        SdkError::DispatchFailure(df) => df.is_timeout() || df.is_io(),
        SdkError::TimeoutError(_) => true,
        _ => false,
    }
}

/// Credential report access through IAM.
pub struct IamReportService {
    client: IamClient,
}

impl IamReportService {
    pub fn new(config: &SdkConfig) -> Self {
        Self { client: IamClient::new(config) }
    }
}

#[async_trait]
impl ReportService for IamReportService {
    async fn request_report_generation(&self) -> Result<JobHandle, ServiceError> {
        let resp = self
            .client
            .generate_credential_report()
            .send()
            .await
            .map_err(|e| service_error("iam:GenerateCredentialReport", &e))?;
        let state = resp.state().map(|s| s.as_str().to_string());
        // IAM keeps one report per account, so the handle only carries state.
        Ok(JobHandle { id: "credential-report".to_string(), state })
    }

    async fn fetch_report(&self, _job: &JobHandle) -> Result<Option<Vec<u8>>, ServiceError> {
        match self.client.get_credential_report().send().await {
            Ok(resp) => Ok(resp.content.map(|blob| blob.into_inner())),
            Err(err) => {
                if let Some(service_err) = err.as_service_error() {
                    if service_err.is_credential_report_not_ready_exception()
                        || service_err.is_credential_report_not_present_exception()
                        || service_err.is_credential_report_expired_exception()
                    {
                        debug!("Credential report not ready: {}", service_err.meta());
                        return Ok(None);
                    }
                }
                Err(service_error("iam:GetCredentialReport", &err))
            }
        }
    }
}

/// IAM user tags.
pub struct IamTagService {
    client: IamClient,
}

impl IamTagService {
    pub fn new(config: &SdkConfig) -> Self {
        Self { client: IamClient::new(config) }
    }
}

#[async_trait]
impl TagService for IamTagService {
    async fn list_tags(&self, account_id: &str) -> Result<Vec<Tag>, ServiceError> {
        let mut tags = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut req = self.client.list_user_tags().user_name(account_id);
            if let Some(m) = marker.take() {
                req = req.marker(m);
            }
            let resp = req.send().await.map_err(|e| service_error("iam:ListUserTags", &e))?;

            tags.extend(resp.tags().iter().map(|t| Tag::new(t.key(), t.value())));

            match resp.marker() {
                Some(next) if resp.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(tags)
    }
}

/// Sends notifications through SES.
pub struct SesNotifier {
    client: SesClient,
    source: String,
}

impl SesNotifier {
    pub fn new(config: &SdkConfig, source: impl Into<String>) -> Self {
        Self { client: SesClient::new(config), source: source.into() }
    }
}

fn content(data: &str) -> Result<Content, ServiceError> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .map_err(|e| ServiceError::new(format!("invalid email content: {e}")))
}

#[async_trait]
impl Notifier for SesNotifier {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), ServiceError> {
        let message = Message::builder()
            .subject(content(subject)?)
            .body(Body::builder().html(content(html_body)?).build())
            .build();

        let resp = self
            .client
            .send_email()
            .source(&self.source)
            .destination(Destination::builder().to_addresses(to).build())
            .message(message)
            .send()
            .await
            .map_err(|e| service_error("ses:SendEmail", &e))?;
        debug!("SES accepted message {} for {to}", resp.message_id());
        Ok(())
    }
}
