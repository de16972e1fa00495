//! Notification gateway: outbound email to requesters.
//!
//! The gateway is an injected capability. Sends happen inside the
//! submission/hold/reject transactions, and a failed send must be reported
//! distinctly so the caller can roll the whole operation back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use vestibule_common::config::SmtpConfig;
use vestibule_common::{AppError, AppResult};

/// Outbound notification gateway.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Send a plain-text email. `Err` means the message was not accepted
    /// by the relay and the caller must treat the operation as failed.
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

/// SMTP notification gateway.
pub struct SmtpGateway {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpGateway {
    /// Create a gateway from SMTP configuration.
    pub fn new(config: &SmtpConfig) -> AppResult<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::Mail(format!("Invalid SMTP relay: {e}")))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = config
            .from_address
            .parse()
            .map_err(|e| AppError::Mail(format!("Invalid from address: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl NotificationGateway for SmtpGateway {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| AppError::Mail(format!("Invalid recipient: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::Mail(format!("Failed to build message: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(format!("SMTP send failed: {e}")))?;

        tracing::debug!(subject = %subject, "Sent notification email");
        Ok(())
    }
}

/// Plain-text email templates for the workflow notifications.
pub mod templates {
    use super::{DateTime, Utc};
    use vestibule_common::config::SiteConfig;

    /// Confirmation email carrying the token link, sent on submission.
    #[must_use]
    pub fn confirmation(
        site: &SiteConfig,
        name: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> (String, String) {
        let subject = format!("{} account request", site.name);
        let body = format!(
            "Someone, probably you, requested an account \"{}\" on {}.\n\n\
             To confirm that this email address belongs to you, follow this link:\n\
             {}/confirm-account/{}\n\n\
             The link expires on {}. If you did not request an account, you can\n\
             safely ignore this message.",
            name,
            site.name,
            site.url.trim_end_matches('/'),
            token,
            expires_at.format("%Y-%m-%d %H:%M UTC"),
        );
        (subject, body)
    }

    /// Rejection notice; the body differs when a reason was given.
    #[must_use]
    pub fn rejection(site: &SiteConfig, name: &str, reason: &str) -> (String, String) {
        let subject = format!("{} account request", site.name);
        let body = if reason.is_empty() {
            format!(
                "Your request for an account \"{}\" on {} has been declined.",
                name, site.name
            )
        } else {
            format!(
                "Your request for an account \"{}\" on {} has been declined.\n\n\
                 Reason given by the reviewer:\n{}",
                name, site.name, reason
            )
        };
        (subject, body)
    }

    /// Hold notice; a hold always carries a reason.
    #[must_use]
    pub fn hold_notice(site: &SiteConfig, name: &str, reason: &str) -> (String, String) {
        let subject = format!("{} account request", site.name);
        let body = format!(
            "Your request for an account \"{}\" on {} is on hold pending further\n\
             information.\n\n\
             Reviewer note:\n{}\n\n\
             You may be contacted at this address with follow-up questions.",
            name, site.name, reason
        );
        (subject, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vestibule_common::config::SiteConfig;

    fn test_site() -> SiteConfig {
        SiteConfig {
            name: "Example Wiki".to_string(),
            url: "https://wiki.example.com/".to_string(),
            read_only: false,
        }
    }

    #[test]
    fn test_confirmation_template() {
        let (subject, body) =
            templates::confirmation(&test_site(), "Alice", "tok123", Utc::now());

        assert_eq!(subject, "Example Wiki account request");
        assert!(body.contains("https://wiki.example.com/confirm-account/tok123"));
        assert!(body.contains("Alice"));
    }

    #[test]
    fn test_rejection_template_reason_variants() {
        let (_, with_reason) = templates::rejection(&test_site(), "Alice", "too vague");
        let (_, without_reason) = templates::rejection(&test_site(), "Alice", "");

        assert!(with_reason.contains("too vague"));
        assert!(!without_reason.contains("Reason given"));
    }

    #[test]
    fn test_hold_template() {
        let (_, body) = templates::hold_notice(&test_site(), "Alice", "need more info");
        assert!(body.contains("need more info"));
        assert!(body.contains("on hold"));
    }
}
