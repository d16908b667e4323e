// ============================
// crates/backend-lib/src/delivery.rs
// ============================
//! Out-of-band passcode delivery.
use anyhow::Context;
use async_trait::async_trait;
use chrono::Duration;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::path::Path;

use crate::config::{MailSettings, MailTransportKind};
use crate::otp::Passcode;

/// Environment variable holding the SMTP password. Never read from config files.
pub const SMTP_PASSWORD_ENV: &str = "PASSRESET_SMTP_PASSWORD";

const SUBJECT: &str = "Password reset code";

/// Hands a freshly issued passcode to its recipient
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, identity: &str, code: &Passcode) -> anyhow::Result<()>;
}

enum MailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    /// Writes `.eml` files to a directory, for development
    Outbox(AsyncFileTransport<Tokio1Executor>),
}

/// Email delivery over an SMTP relay or a file outbox
pub struct MailDelivery {
    transport: MailTransport,
    from: Mailbox,
    validity: Duration,
}

impl MailDelivery {
    /// SMTP relay with credentials; `password` comes from the environment
    pub fn smtp(
        host: &str,
        port: Option<u16>,
        username: &str,
        password: String,
        from: &str,
        validity: Duration,
    ) -> anyhow::Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .with_context(|| format!("invalid SMTP relay {host}"))?
            .credentials(Credentials::new(username.to_string(), password));
        if let Some(port) = port {
            builder = builder.port(port);
        }
        Ok(Self {
            transport: MailTransport::Smtp(builder.build()),
            from: from.parse().context("invalid from address")?,
            validity,
        })
    }

    /// File outbox under `dir`
    pub fn outbox<P: AsRef<Path>>(dir: P, from: &str, validity: Duration) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            transport: MailTransport::Outbox(AsyncFileTransport::new(dir.as_ref())),
            from: from.parse().context("invalid from address")?,
            validity,
        })
    }

    /// Build from settings, reading the SMTP secret from [`SMTP_PASSWORD_ENV`]
    pub fn from_settings(settings: &MailSettings, validity: Duration) -> anyhow::Result<Self> {
        match settings.transport {
            MailTransportKind::Smtp => {
                let host = settings
                    .smtp_host
                    .as_deref()
                    .context("mail.smtp_host is required for SMTP transport")?;
                let username = settings
                    .smtp_username
                    .as_deref()
                    .context("mail.smtp_username is required for SMTP transport")?;
                let password = std::env::var(SMTP_PASSWORD_ENV)
                    .with_context(|| format!("{SMTP_PASSWORD_ENV} must be set for SMTP transport"))?;
                Self::smtp(
                    host,
                    settings.smtp_port,
                    username,
                    password,
                    &settings.from_address,
                    validity,
                )
            },
            MailTransportKind::File => {
                Self::outbox(&settings.outbox_dir, &settings.from_address, validity)
            },
        }
    }

    fn compose(&self, identity: &str, code: &Passcode) -> anyhow::Result<Message> {
        let to: Mailbox = identity.parse().context("invalid recipient address")?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(compose_body(code, self.validity))?;
        Ok(message)
    }
}

/// Plain-text body naming the code and how long it stays valid
fn compose_body(code: &Passcode, validity: Duration) -> String {
    let minutes = validity.num_minutes().max(1);
    format!(
        "Your password reset code is {}.\n\n\
         It is valid for {minutes} minute{}. Never share this code with anyone.\n\n\
         If you did not request a password reset, you can ignore this message.\n",
        code.expose(),
        if minutes == 1 { "" } else { "s" },
    )
}

#[async_trait]
impl Delivery for MailDelivery {
    async fn deliver(&self, identity: &str, code: &Passcode) -> anyhow::Result<()> {
        let message = self.compose(identity, code)?;
        match &self.transport {
            MailTransport::Smtp(smtp) => {
                smtp.send(message).await.context("SMTP send failed")?;
            },
            MailTransport::Outbox(outbox) => {
                outbox.send(message).await.context("outbox write failed")?;
            },
        }
        tracing::debug!(identity, "passcode mail handed to transport");
        Ok(())
    }
}
