use std::fmt::Debug;

use askama::Template;
use chrono::{DateTime, Utc};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::stub::AsyncStubTransport;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;

use crate::configuration::EmailClientSettings;
use crate::domain::ContactSubmission;

const REPLY_SUBJECT: &str = "Re: Your portfolio inquiry";

#[derive(Clone)]
enum Mailer {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Stub(AsyncStubTransport),
}

/// Sends submission notifications to the site owner.
#[derive(Clone)]
pub struct EmailClient {
    mailer: Mailer,
    sender: Mailbox,
    recipient: Mailbox,
}

impl EmailClient {
    pub fn new(settings: &EmailClientSettings) -> anyhow::Result<Self> {
        let password = settings.password.expose_secret();

        let mailer = if settings.username.is_empty() || password.is_empty() {
            tracing::info!(
                smtp_host = %settings.smtp_host,
                smtp_port = settings.smtp_port,
                "SMTP credentials not configured, using unauthenticated connection"
            );
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.smtp_host)
                .port(settings.smtp_port)
                .build()
        } else {
            tracing::info!(
                smtp_host = %settings.smtp_host,
                smtp_port = settings.smtp_port,
                "Email client initialized with STARTTLS relay"
            );
            let credentials = Credentials::new(settings.username.clone(), password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)?
                .port(settings.smtp_port)
                .credentials(credentials)
                .build()
        };

        Ok(Self {
            mailer: Mailer::Smtp(mailer),
            sender: settings.sender.parse()?,
            recipient: settings.recipient().parse()?,
        })
    }

    /// Build a client that records messages in `transport` instead of
    /// talking to an SMTP server.
    pub fn stub(
        settings: &EmailClientSettings,
        transport: AsyncStubTransport,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            mailer: Mailer::Stub(transport),
            sender: settings.sender.parse()?,
            recipient: settings.recipient().parse()?,
        })
    }

    #[tracing::instrument(
        name = "Sending a submission notification",
        skip(self, submission, page_url),
        fields(recipient = %self.recipient)
    )]
    pub async fn send_notification(
        &self,
        submission: &ContactSubmission,
        page_url: &str,
    ) -> Result<(), NotificationError> {
        let email = NotificationEmail::render(submission, page_url, Utc::now())?;

        let mut builder = Message::builder()
            .from(self.sender.clone())
            .to(self.recipient.clone())
            .subject(email.subject);

        match submission.email.as_ref().parse::<Mailbox>() {
            Ok(reply_to) => builder = builder.reply_to(reply_to),
            Err(error) => tracing::warn!(
                error = %error,
                "Submitter email is not a valid mailbox, omitting Reply-To"
            ),
        }

        let message = builder.multipart(MultiPart::alternative_plain_html(
            email.plain_body,
            email.html_body,
        ))?;

        match &self.mailer {
            Mailer::Smtp(transport) => {
                transport.send(message).await?;
            }
            Mailer::Stub(transport) => {
                transport.send(message).await?;
            }
        }

        tracing::info!("Submission notification sent");
        Ok(())
    }
}

#[derive(Template)]
#[template(path = "emails/contact-notification.html")]
struct NotificationHtmlTemplate<'a> {
    name: &'a str,
    email: &'a str,
    email_link: &'a str,
    service: &'a str,
    message_lines: Vec<&'a str>,
    submitted_at: &'a str,
    page_url: &'a str,
    reply_link: &'a str,
}

#[derive(Template)]
#[template(path = "emails/contact-notification.txt")]
struct NotificationTextTemplate<'a> {
    name: &'a str,
    email: &'a str,
    service: &'a str,
    message: &'a str,
    submitted_at: &'a str,
    page_url: &'a str,
}

struct NotificationEmail {
    subject: String,
    html_body: String,
    plain_body: String,
}

impl NotificationEmail {
    fn render(
        submission: &ContactSubmission,
        page_url: &str,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, askama::Error> {
        let submitted_at = submitted_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let email_link = format!("mailto:{}", mailto_address(submission));
        let reply_link = reply_link(submission);

        let html_body = NotificationHtmlTemplate {
            name: submission.name.as_ref(),
            email: submission.email.as_ref(),
            email_link: &email_link,
            service: submission.service.as_ref(),
            message_lines: submission.message.as_ref().lines().collect(),
            submitted_at: &submitted_at,
            page_url,
            reply_link: &reply_link,
        }
        .render()?;

        let plain_body = NotificationTextTemplate {
            name: submission.name.as_ref(),
            email: submission.email.as_ref(),
            service: submission.service.as_ref(),
            message: submission.message.as_ref(),
            submitted_at: &submitted_at,
            page_url,
        }
        .render()?;

        Ok(Self {
            subject: format!("New Portfolio Contact: {}", submission.name),
            html_body,
            plain_body,
        })
    }
}

/// Submitter address as a `mailto:` path, so `?` or `&` in it cannot add
/// header fields to the link.
fn mailto_address(submission: &ContactSubmission) -> String {
    urlencoding::encode(submission.email.as_ref()).replace("%40", "@")
}

/// `mailto:` link answering the submitter with a greeting already in place.
fn reply_link(submission: &ContactSubmission) -> String {
    format!(
        "mailto:{}?subject={}&body={}",
        mailto_address(submission),
        urlencoding::encode(REPLY_SUBJECT),
        urlencoding::encode(&format!("Hi {},", submission.first_name())),
    )
}

#[derive(thiserror::Error)]
pub enum NotificationError {
    #[error("Failed to render the notification email")]
    Render(#[from] askama::Error),
    #[error("Failed to build the notification email")]
    Message(#[from] lettre::error::Error),
    #[error("Failed to deliver the notification email over SMTP")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("Stub transport rejected the notification email")]
    Stub(#[from] lettre::transport::stub::Error),
}

impl Debug for NotificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::error_chain_fmt(self, f)
    }
}
