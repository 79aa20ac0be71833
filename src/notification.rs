use std::io::Write;

use async_trait::async_trait;

use crate::error::ServiceError;

/// Delivers an HTML email to a single recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), ServiceError>;
}

/// Prints messages to stdout instead of sending them.
pub struct ConsoleNotifier {
    sender: String,
}

impl ConsoleNotifier {
    pub fn new(sender: impl Into<String>) -> Self {
        Self { sender: sender.into() }
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), ServiceError> {
        let mut out = std::io::stdout().lock();
        let rendered = format!(
            "{:=<60}\nFrom: {}\nTo: {to}\nSubject: {subject}\n{:-<60}\n{}\n{:=<60}\n",
            "",
            self.sender,
            "",
            html_body.trim(),
            ""
        );
        out.write_all(rendered.as_bytes())
            .map_err(|e| ServiceError::new(format!("failed to write to stdout: {e}")))
    }
}
