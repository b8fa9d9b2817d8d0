//! Outbound notifications
//!
//! Delivered over SMTP when email is configured, otherwise recorded in the log.
//! Callers in the reconciliation path treat delivery failures as non-fatal.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use logoscope_core::{AppError, Config};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Direct sign-in request.
    SignInLink { email: String, link: String },
    /// A paid analysis was created. New accounts also get a sign-in link.
    AnalysisReady {
        email: String,
        analysis_id: Uuid,
        display_name: String,
        sign_in_link: Option<String>,
    },
}

impl Notification {
    pub fn recipient(&self) -> &str {
        match self {
            Notification::SignInLink { email, .. } => email,
            Notification::AnalysisReady { email, .. } => email,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::SignInLink { .. } => "sign_in_link",
            Notification::AnalysisReady { .. } => "analysis_ready",
        }
    }

    /// Subject and plain-text body.
    pub fn render(&self, frontend_url: &str) -> (String, String) {
        match self {
            Notification::SignInLink { link, .. } => (
                "Your Logoscope sign-in link".to_string(),
                format!(
                    "Use the link below to sign in to Logoscope.\n\n{}\n\nIf you did not request it, you can ignore this email.",
                    link
                ),
            ),
            Notification::AnalysisReady {
                analysis_id,
                display_name,
                sign_in_link,
                ..
            } => {
                let analysis_url = format!("{}/analyses/{}", frontend_url, analysis_id);
                let mut body = format!(
                    "Thanks for your purchase. The brand analysis for \"{}\" is ready to run:\n\n{}\n",
                    display_name, analysis_url
                );
                if let Some(link) = sign_in_link {
                    body.push_str(&format!(
                        "\nWe created an account for you. Sign in with this one-time link:\n\n{}\n",
                        link
                    ));
                }
                (format!("Your analysis of {} is ready", display_name), body)
            }
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), AppError>;
}

/// SMTP delivery via lettre.
#[derive(Clone)]
pub struct EmailNotifier {
    mailer: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
    frontend_url: String,
}

impl EmailNotifier {
    /// Returns `None` if email is disabled or SMTP is not configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        if !config.email_enabled() {
            tracing::debug!("Email notifications disabled (EMAIL_ENABLED=false)");
            return None;
        }
        let host = config.smtp_host()?;
        let from: Mailbox = match config.smtp_from()?.parse() {
            Ok(from) => from,
            Err(e) => {
                tracing::error!(error = %e, "Invalid SMTP_FROM; email notifications disabled");
                return None;
            }
        };
        let port = config.smtp_port().unwrap_or(587);

        let builder = if config.smtp_tls() {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .ok()?
                .port(port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port)
        };
        let builder = if let (Some(u), Some(p)) = (config.smtp_user(), config.smtp_password()) {
            builder.credentials(Credentials::new(u.to_string(), p.to_string()))
        } else {
            builder
        };

        tracing::info!(
            host = %host,
            port = port,
            tls = config.smtp_tls(),
            "Email notifier initialized"
        );

        Some(Self {
            mailer: Arc::new(builder.build()),
            from,
            frontend_url: config.frontend_url().to_string(),
        })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        let to: Mailbox = notification.recipient().parse().map_err(|e| {
            AppError::Validation(format!("Invalid recipient address: {}", e))
        })?;
        let (subject, body) = notification.render(&self.frontend_url);

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| AppError::external("smtp", e.to_string()))?;

        tracing::info!(kind = notification.kind(), "Notification email sent");
        Ok(())
    }
}

/// Fallback when SMTP is not configured. Links carry credentials and are not logged.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        tracing::info!(
            kind = notification.kind(),
            "Email disabled; notification not delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_ready_mentions_link_only_for_new_accounts() {
        let id = Uuid::new_v4();
        let existing = Notification::AnalysisReady {
            email: "a@example.com".to_string(),
            analysis_id: id,
            display_name: "Acme".to_string(),
            sign_in_link: None,
        };
        let (subject, body) = existing.render("https://logoscope.test");
        assert!(subject.contains("Acme"));
        assert!(body.contains(&format!("https://logoscope.test/analyses/{}", id)));
        assert!(!body.contains("one-time link"));

        let fresh = Notification::AnalysisReady {
            email: "a@example.com".to_string(),
            analysis_id: id,
            display_name: "Acme".to_string(),
            sign_in_link: Some("https://logoscope.test/auth/verify?token=t".to_string()),
        };
        let (_, body) = fresh.render("https://logoscope.test");
        assert!(body.contains("auth/verify?token=t"));
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_everything() {
        let notification = Notification::SignInLink {
            email: "a@example.com".to_string(),
            link: "https://logoscope.test/auth/verify?token=t".to_string(),
        };
        assert!(LogNotifier.send(&notification).await.is_ok());
        assert_eq!(notification.recipient(), "a@example.com");
    }
}
