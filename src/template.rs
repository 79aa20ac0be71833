use serde::{Deserialize, Serialize};

pub const SUBJECT: &str = "AWS Password Expiry Notification";
pub const DEFAULT_CONSOLE_URL: &str = "https://signin.aws.amazon.com/console";
pub const DEFAULT_SIGNATURE: &str = "Cloud Admins";

/// A rendered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub html_body: String,
}

/// Renders the password expiry notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateEngine {
    pub console_url: String,
    pub signature: String,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self { console_url: DEFAULT_CONSOLE_URL.to_string(), signature: DEFAULT_SIGNATURE.to_string() }
    }
}

impl TemplateEngine {
    pub fn render_expiry_notice(&self, account_id: &str, warning_window_days: u32) -> EmailMessage {
        let user = escape_html(account_id);
        let url = escape_html(&self.console_url);
        let signature = escape_html(&self.signature);
        let html_body = format!(
            r#"<html>
<body>
    <p>Hello {user},</p>
    <p>Your password for the <a href="{url}">AWS web console</a> has expired or will expire within the next {warning_window_days} days.</p>
    <p>If your password is still valid, sign in to the web console and follow the banner instructions to change it now.</p>
    <p>If your password has already expired, or you no longer use this account, reply to this email and we will help you reset or remove it.</p>
    <br>
    <p>Thank you,</p>
    <p>{signature}</p>
</body>
</html>
"#
        );
        EmailMessage { subject: SUBJECT.to_string(), html_body }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
