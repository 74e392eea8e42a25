//! Outbound notifications for workflow events.
//!
//! State changes in the approval workflow and the expiry scanner emit events;
//! this service turns them into transactional emails over `lettre` SMTP.
//! Delivery is best-effort and happens off the request path, so every method
//! degrades to a traced no-op when notifications are disabled.

use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;

use crate::config::{FrontendConfig, NotificationConfig};

/// Notification service errors.
#[derive(Debug, Error)]
pub enum NotifierError {
    /// Failed to build email message.
    #[error("Failed to build email: {0}")]
    BuildError(String),
    /// Failed to send email.
    #[error("Failed to send email: {0}")]
    SendError(String),
    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Sends workflow notifications as transactional emails.
#[derive(Clone)]
pub struct Notifier {
    config: NotificationConfig,
    frontend: FrontendConfig,
}

impl Notifier {
    /// Creates a new notifier.
    #[must_use]
    pub const fn new(config: NotificationConfig, frontend: FrontendConfig) -> Self {
        Self { config, frontend }
    }

    /// Creates an SMTP transport.
    fn create_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifierError> {
        let creds = Credentials::new(
            self.config.smtp_username.clone(),
            self.config.smtp_password.clone(),
        );

        AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
            .map_err(|e| NotifierError::SendError(e.to_string()))?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build()
            .pipe(Ok)
    }

    /// Notifies a provider that a sponsor approved their fund application.
    ///
    /// # Errors
    ///
    /// Returns an error if the email cannot be sent.
    pub async fn provider_approved(
        &self,
        to_email: &str,
        provider_name: &str,
        fund_name: &str,
        sponsor_name: &str,
    ) -> Result<(), NotifierError> {
        let dashboard_url = &self.frontend.provider_url;

        let subject = format!("Application approved for {fund_name}");
        let body = format!(
            r"Hi {provider_name},

Good news: {sponsor_name} has approved your application for {fund_name}.

You can now accept vouchers from this fund. Open your dashboard to get started:

{dashboard_url}

Best regards,
The Tegoed Team"
        );

        self.send_email(to_email, &subject, &body).await
    }

    /// Notifies a provider that a sponsor declined their fund application.
    ///
    /// Declined notifications are off by default and only go out when
    /// `notify_on_decline` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the email cannot be sent.
    pub async fn provider_declined(
        &self,
        to_email: &str,
        provider_name: &str,
        fund_name: &str,
        sponsor_name: &str,
    ) -> Result<(), NotifierError> {
        if !self.config.notify_on_decline {
            tracing::debug!(fund = fund_name, "decline notifications disabled, skipping");
            return Ok(());
        }

        let subject = format!("Application declined for {fund_name}");
        let body = format!(
            r"Hi {provider_name},

{sponsor_name} has declined your application for {fund_name}.

If you believe this is a mistake, please contact the sponsor directly.

Best regards,
The Tegoed Team"
        );

        self.send_email(to_email, &subject, &body).await
    }

    /// Reminds a voucher holder that their voucher is about to expire.
    ///
    /// # Errors
    ///
    /// Returns an error if the email cannot be sent.
    pub async fn voucher_expiry_reminder(
        &self,
        to_email: &str,
        fund_name: &str,
        sponsor_name: &str,
        remaining_amount: &str,
        expires_on: &str,
    ) -> Result<(), NotifierError> {
        let webshop_url = &self.frontend.webshop_url;

        let subject = format!("Your {fund_name} voucher expires on {expires_on}");
        let body = format!(
            r"Hi,

Your {fund_name} voucher from {sponsor_name} expires on {expires_on}.

You still have {remaining_amount} left to spend. Find participating providers here:

{webshop_url}

Best regards,
The Tegoed Team"
        );

        self.send_email(to_email, &subject, &body).await
    }

    /// Sends a generic email.
    ///
    /// # Errors
    ///
    /// Returns an error if the email cannot be sent.
    pub async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotifierError> {
        if !self.config.enabled {
            tracing::debug!(to = to_email, subject, "notifications disabled, skipping");
            return Ok(());
        }

        let from = format!("{} <{}>", self.config.from_name, self.config.from_email);

        let email = Message::builder()
            .from(
                from.parse()
                    .map_err(|e| NotifierError::InvalidAddress(format!("{e}")))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| NotifierError::InvalidAddress(format!("{e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifierError::BuildError(e.to_string()))?;

        let transport = self.create_transport()?;
        transport
            .send(email)
            .await
            .map_err(|e| NotifierError::SendError(e.to_string()))?;

        Ok(())
    }
}

/// Pipe trait for fluent API.
trait Pipe: Sized {
    fn pipe<F, R>(self, f: F) -> R
    where
        F: FnOnce(Self) -> R,
    {
        f(self)
    }
}

impl<T> Pipe for T {}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled_notifier() -> Notifier {
        Notifier::new(NotificationConfig::default(), FrontendConfig::default())
    }

    #[test]
    fn test_notification_config_default_disabled() {
        let config = NotificationConfig::default();
        assert!(!config.enabled);
        assert!(!config.notify_on_decline);
    }

    #[tokio::test]
    async fn test_disabled_notifier_skips_send() {
        let notifier = disabled_notifier();
        let result = notifier
            .provider_approved("shop@example.com", "Bakkerij Jansen", "Kindpakket", "Zuidhorn")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_decline_notification_off_by_default() {
        let notifier = disabled_notifier();
        let result = notifier
            .provider_declined("shop@example.com", "Bakkerij Jansen", "Kindpakket", "Zuidhorn")
            .await;
        assert!(result.is_ok());
    }
}
