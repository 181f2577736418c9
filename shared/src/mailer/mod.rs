//! Transactional email: handlebars templates rendered and sent over SMTP.

use handlebars::Handlebars;
use lettre::{
    message::{header, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::config::EmailConfig;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Invalid address: {0}")]
    Address(String),

    #[error("Send error: {0}")]
    Send(String),
}

pub type MailerResult<T> = Result<T, MailerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTemplate {
    EmailVerification,
    PasswordReset,
    ReviewRequest,
}

impl EmailTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            EmailTemplate::EmailVerification => "email_verification",
            EmailTemplate::PasswordReset => "password_reset",
            EmailTemplate::ReviewRequest => "review_request",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            EmailTemplate::EmailVerification => "Vérifiez votre adresse email - TalentZik",
            EmailTemplate::PasswordReset => "Réinitialisation de votre mot de passe - TalentZik",
            EmailTemplate::ReviewRequest => "Donnez votre avis sur TalentZik",
        }
    }

    fn source(&self) -> &'static str {
        match self {
            EmailTemplate::EmailVerification => {
                include_str!("../../templates/email/email_verification.hbs")
            }
            EmailTemplate::PasswordReset => include_str!("../../templates/email/password_reset.hbs"),
            EmailTemplate::ReviewRequest => include_str!("../../templates/email/review_request.hbs"),
        }
    }

    const ALL: [EmailTemplate; 3] = [
        EmailTemplate::EmailVerification,
        EmailTemplate::PasswordReset,
        EmailTemplate::ReviewRequest,
    ];
}

pub struct Mailer {
    smtp_transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: String,
    from_name: String,
    template_engine: Handlebars<'static>,
}

impl Mailer {
    /// With `enabled = false` messages are rendered and logged instead of sent.
    pub fn new(config: &EmailConfig) -> MailerResult<Self> {
        let smtp_transport = if config.enabled {
            let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

            let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                .map_err(|e| MailerError::Config(format!("Invalid SMTP host: {}", e)))?
                .port(config.smtp_port)
                .credentials(creds)
                .build();
            Some(transport)
        } else {
            None
        };

        let mut template_engine = Handlebars::new();
        for template in EmailTemplate::ALL {
            template_engine
                .register_template_string(template.name(), template.source())
                .map_err(|e| MailerError::Template(format!("Failed to register template: {}", e)))?;
        }

        Ok(Self {
            smtp_transport,
            from_address: config.from_address.clone(),
            from_name: config.from_name.clone(),
            template_engine,
        })
    }

    pub fn render<T: Serialize>(&self, template: EmailTemplate, data: &T) -> MailerResult<String> {
        self.template_engine
            .render(template.name(), data)
            .map_err(|e| MailerError::Template(format!("Failed to render template: {}", e)))
    }

    pub async fn send<T: Serialize>(
        &self,
        template: EmailTemplate,
        recipient: &str,
        data: &T,
    ) -> MailerResult<()> {
        let html_body = self.render(template, data)?;
        let text_body = html_to_text(&html_body);

        let Some(transport) = &self.smtp_transport else {
            info!(
                template = template.name(),
                recipient = %recipient,
                "Email delivery disabled, message not sent:\n{}",
                text_body
            );
            return Ok(());
        };

        let email = Message::builder()
            .from(
                format!("{} <{}>", self.from_name, self.from_address)
                    .parse()
                    .map_err(|e| MailerError::Address(format!("Invalid from address: {}", e)))?,
            )
            .to(recipient
                .parse()
                .map_err(|e| MailerError::Address(format!("Invalid recipient email: {}", e)))?)
            .subject(template.subject())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| MailerError::Send(format!("Failed to build email: {}", e)))?;

        match transport.send(email).await {
            Ok(_) => {
                info!(template = template.name(), "Email sent successfully to {}", recipient);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send email to {}: {}", recipient, e);
                Err(MailerError::Send(format!("SMTP error: {}", e)))
            }
        }
    }
}

/// Plain text alternative of the rendered HTML body.
fn html_to_text(html: &str) -> String {
    let text = html
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n")
        .replace("</p>", "\n\n")
        .replace("</div>", "\n")
        // Remove all HTML tags
        .split('<')
        .enumerate()
        .filter_map(|(i, s)| {
            if i == 0 {
                Some(s.to_string())
            } else {
                s.split_once('>').map(|(_, text)| text.to_string())
            }
        })
        .collect::<Vec<String>>()
        .join("");

    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mailer() -> Mailer {
        Mailer::new(&EmailConfig::default()).unwrap()
    }

    #[test]
    fn test_html_to_text() {
        let html = "<p>Hello <strong>World</strong></p><br/><div>Test</div>";
        let text = html_to_text(html);
        assert!(text.contains("Hello"));
        assert!(text.contains("World"));
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn test_verification_template_renders_link() {
        let body = mailer()
            .render(
                EmailTemplate::EmailVerification,
                &json!({
                    "name": "Charlotte Dipanda",
                    "verification_url": "https://talentzik.com/accounts/verify-email/ABC/",
                }),
            )
            .unwrap();

        assert!(body.contains("Charlotte Dipanda"));
        assert!(body.contains("https://talentzik.com/accounts/verify-email/ABC/"));
        assert!(body.contains("24 heures"));
    }

    #[test]
    fn test_review_request_optional_message() {
        let data = json!({
            "client_name": "Paul",
            "artist_name": "Ténor",
            "event_type": "Anniversaire",
            "event_date": "2026-05-20",
            "event_location": "Douala",
            "review_url": "https://talentzik.com/reviews/leave/public/x/",
            "expires_at": "2026-06-19",
        });
        let body = mailer().render(EmailTemplate::ReviewRequest, &data).unwrap();
        assert!(body.contains("Ténor"));
        assert!(!body.contains("<p></p>"));
    }

    #[tokio::test]
    async fn test_disabled_mailer_logs_instead_of_sending() {
        let result = mailer()
            .send(
                EmailTemplate::PasswordReset,
                "someone@example.cm",
                &json!({"name": "X", "reset_url": "http://localhost/reset"}),
            )
            .await;
        assert!(result.is_ok());
    }
}
