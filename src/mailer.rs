use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::MailConfig;

const CONFIRMATION_TEMPLATE: &str = include_str!("../templates/confirmation_email.html");

/// Outbound mail behind a narrow seam; sends are best-effort and callers
/// treat failures as log-only.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_confirmation(
        &self,
        to: &str,
        username: &str,
        confirmation_url: &str,
    ) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> anyhow::Result<Self> {
        let tls = TlsParameters::builder(config.server.clone())
            .dangerous_accept_invalid_certs(!config.validate_certs)
            .build()
            .context("build smtp tls parameters")?;

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
                .port(config.port);
        if config.ssl_tls {
            builder = builder.tls(Tls::Wrapper(tls));
        } else if config.starttls {
            builder = builder.tls(Tls::Required(tls));
        }
        if config.use_credentials {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        let from = format!("{} <{}>", config.from_name, config.from)
            .parse::<Mailbox>()
            .context("parse MAIL_FROM mailbox")?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

fn render_confirmation(username: &str, confirmation_url: &str) -> String {
    CONFIRMATION_TEMPLATE
        .replace("{{username}}", username)
        .replace("{{confirmation_url}}", confirmation_url)
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_confirmation(
        &self,
        to: &str,
        username: &str,
        confirmation_url: &str,
    ) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse::<Mailbox>().context("parse recipient address")?)
            .subject("Confirm your email")
            .header(ContentType::TEXT_HTML)
            .body(render_confirmation(username, confirmation_url))
            .context("build confirmation message")?;

        self.transport
            .send(message)
            .await
            .context("smtp send confirmation")?;
        info!(to = %to, "confirmation email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_embeds_username_and_link() {
        let html = render_confirmation("ada", "https://app.local/auth/confirm_email/tok123");
        assert!(html.contains("ada"));
        assert!(html.contains("https://app.local/auth/confirm_email/tok123"));
        assert!(!html.contains("{{username}}"));
        assert!(!html.contains("{{confirmation_url}}"));
    }
}
