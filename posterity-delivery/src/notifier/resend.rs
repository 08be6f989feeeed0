use async_trait::async_trait;
use posterity_store::Recipient;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{LetterContent, Notifier, Receipt, render};
use crate::error::NotifyError;

const PLACEHOLDER_API_KEY: &str = "re_your_api_key_here";
const PLACEHOLDER_FROM: &str = "noreply@yourdomain.com";

fn default_base_url() -> String {
    "https://api.resend.com".to_string()
}

/// Settings for the Resend email API
///
/// Every field defaults to empty so that an incomplete configuration still
/// loads and can be reported on by `posterity email-config`.
#[derive(Clone, Deserialize)]
pub struct ResendConfig {
    #[serde(default)]
    pub api_key: String,
    /// Sender address
    #[serde(default)]
    pub from: String,
    /// Sender display name
    #[serde(default)]
    pub from_name: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ResendConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            from: String::new(),
            from_name: String::new(),
            base_url: default_base_url(),
        }
    }
}

impl std::fmt::Debug for ResendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendConfig")
            .field("api_key", &"<redacted>")
            .field("from", &self.from)
            .field("from_name", &self.from_name)
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn is_set(value: &str, placeholder: Option<&str>) -> bool {
    let value = value.trim();
    !value.is_empty() && placeholder != Some(value)
}

/// Which notifier settings are usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigurationStatus {
    pub has_api_key: bool,
    pub has_from: bool,
    pub has_from_name: bool,
}

impl ConfigurationStatus {
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.has_api_key && self.has_from && self.has_from_name
    }

    /// Names of the settings that are absent or placeholders
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (self.has_api_key, "api_key"),
            (self.has_from, "from"),
            (self.has_from_name, "from_name"),
        ]
        .into_iter()
        .filter_map(|(set, name)| (!set).then_some(name))
        .collect()
    }
}

impl ResendConfig {
    #[must_use]
    pub fn status(&self) -> ConfigurationStatus {
        ConfigurationStatus {
            has_api_key: is_set(&self.api_key, Some(PLACEHOLDER_API_KEY)),
            has_from: is_set(&self.from, Some(PLACEHOLDER_FROM)),
            has_from_name: is_set(&self.from_name, None),
        }
    }
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: String,
    to: [&'a str; 1],
    reply_to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: Option<String>,
}

/// Delivers letters as email through the Resend HTTP API
#[derive(Debug, Clone)]
pub struct ResendNotifier {
    config: ResendConfig,
    client: reqwest::Client,
}

impl ResendNotifier {
    /// Create a notifier for `config`.
    ///
    /// An incomplete configuration is accepted here and reported on every
    /// send, so a misconfigured deployment records why letters are failing.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: ResendConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("posterity/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self { config, client })
    }

    #[must_use]
    pub fn configuration_status(&self) -> ConfigurationStatus {
        self.config.status()
    }

    fn endpoint(&self) -> String {
        format!("{}/emails", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn send(
        &self,
        recipient: &Recipient,
        letter: &LetterContent,
    ) -> Result<Receipt, NotifyError> {
        let status = self.configuration_status();
        if !status.is_configured() {
            return Err(NotifyError::NotConfigured(status.missing()));
        }

        let rendered = render(recipient.name.as_deref(), letter);
        let request = SendEmailRequest {
            from: format!("{} <{}>", self.config.from_name, self.config.from),
            to: [recipient.address.as_str()],
            reply_to: &self.config.from,
            subject: &rendered.subject,
            html: &rendered.html,
            text: &rendered.text,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let code = response.status();
        if !code.is_success() {
            let detail = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| format!("Email provider returned {code}"));
            warn!(status = %code, error = %detail, "Email provider rejected letter");
            return Err(NotifyError::Rejected(detail));
        }

        let body = response
            .json::<SendEmailResponse>()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        debug!(message_id = ?body.id, "Email accepted");

        Ok(Receipt {
            message_id: body.id,
        })
    }
}
