//! Outbound e-mail for registration codes.
//!
//! Delivery itself happens elsewhere; this module only hands the message to a
//! backend and reports whether that worked.

use crate::{config::NotificationConfig, entities::account::Role, errors::ServiceError};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns false when the message could not be handed off.
    async fn send_otp(&self, email: &str, code: &str, role: Role) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OtpMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl OtpMessage {
    pub fn new(email: &str, code: &str, role: Role, ttl_minutes: u64) -> Self {
        let role_title = match role {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Cashier => "Cashier",
        };
        Self {
            to: email.to_string(),
            subject: format!("RetailX {role_title} registration code"),
            text: format!(
                "Your RetailX {role_title} registration code is {code}. \
                 It expires in {ttl_minutes} minutes. If you did not request it, ignore this e-mail."
            ),
        }
    }
}

/// Writes the message to the log. Development only.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    ttl_minutes: u64,
}

impl LogNotifier {
    pub fn new(ttl_minutes: u64) -> Self {
        Self { ttl_minutes }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_otp(&self, email: &str, code: &str, role: Role) -> bool {
        let message = OtpMessage::new(email, code, role, self.ttl_minutes);
        info!(to = %message.to, subject = %message.subject, body = %message.text, "otp e-mail (log backend)");
        true
    }
}

/// POSTs `{to, subject, text}` JSON to a mail relay.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    sender: String,
    ttl_minutes: u64,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    from: &'a str,
    #[serde(flatten)]
    message: &'a OtpMessage,
}

impl WebhookNotifier {
    pub fn new(
        url: impl Into<String>,
        sender: impl Into<String>,
        timeout: Duration,
        ttl_minutes: u64,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            sender: sender.into(),
            ttl_minutes,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self, code))]
    async fn send_otp(&self, email: &str, code: &str, role: Role) -> bool {
        let message = OtpMessage::new(email, code, role, self.ttl_minutes);
        let payload = WebhookPayload {
            from: &self.sender,
            message: &message,
        };

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(status = %resp.status(), "mail relay rejected otp e-mail");
                false
            }
            Err(e) => {
                warn!(error = %e, "mail relay unreachable");
                false
            }
        }
    }
}

pub fn build_notifier(
    config: &NotificationConfig,
    otp_ttl_secs: u64,
) -> Result<Arc<dyn Notifier>, ServiceError> {
    let ttl_minutes = (otp_ttl_secs / 60).max(1);
    match (config.backend.as_str(), config.webhook_url.as_deref()) {
        ("webhook", Some(url)) => Ok(Arc::new(WebhookNotifier::new(
            url,
            config.sender.clone(),
            Duration::from_secs(config.timeout_secs),
            ttl_minutes,
        )?)),
        ("webhook", None) => Err(ServiceError::InternalError(
            "webhook notifier needs notifications.webhook_url".to_string(),
        )),
        _ => Ok(Arc::new(LogNotifier::new(ttl_minutes))),
    }
}
