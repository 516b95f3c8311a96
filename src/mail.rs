use crate::config::{MailConfig, MailTransportKind};
use crate::error::AppError;
use anyhow::Context;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{FileTransport, Message, SmtpTransport, Transport};
use std::fmt::Display;
use std::path::PathBuf;
use tracing::info;

pub struct AttachmentFile {
    /// Name shown to the recipient.
    pub file_name: String,
    pub path: PathBuf,
    pub content_type: &'static str,
}

pub struct OutboundMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: AttachmentFile,
}

/// Outbound mail with a single attachment. Built once at startup and owned by
/// the request state.
pub trait Mailer {
    fn send(&self, mail: &OutboundMail) -> Result<(), AppError>;

    fn kind(&self) -> &'static str;
}

pub struct LettreMailer<T> {
    transport: T,
    from: Mailbox,
    kind: &'static str,
}

impl<T> LettreMailer<T> {
    fn build_message(&self, mail: &OutboundMail) -> Result<Message, AppError> {
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|e| AppError::validation(format!("invalid email address {}: {e}", mail.to)))?;
        let content_type = ContentType::parse(mail.attachment.content_type)
            .map_err(|e| AppError::Mail(e.to_string()))?;
        let bytes = std::fs::read(&mail.attachment.path)?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.clone())
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(mail.body.clone()))
                    .singlepart(
                        Attachment::new(mail.attachment.file_name.clone()).body(bytes, content_type),
                    ),
            )
            .map_err(|e| AppError::Mail(e.to_string()))
    }
}

impl<T> Mailer for LettreMailer<T>
where
    T: Transport,
    T::Error: Display,
{
    fn send(&self, mail: &OutboundMail) -> Result<(), AppError> {
        let message = self.build_message(mail)?;
        self.transport
            .send(&message)
            .map_err(|e| AppError::Mail(e.to_string()))?;
        info!(to = %mail.to, transport = self.kind, "mail sent");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        self.kind
    }
}

pub fn build_mailer(cfg: &MailConfig) -> anyhow::Result<Box<dyn Mailer>> {
    let from: Mailbox = cfg
        .from
        .parse()
        .with_context(|| format!("invalid sender address {}", cfg.from))?;

    match cfg.transport {
        MailTransportKind::Smtp => {
            let builder = if cfg.tls {
                SmtpTransport::starttls_relay(&cfg.smtp_host)
                    .with_context(|| format!("invalid smtp host {}", cfg.smtp_host))?
            } else {
                SmtpTransport::builder_dangerous(&cfg.smtp_host)
            };
            let mut builder = builder.port(cfg.smtp_port);
            if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
                builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
            }
            Ok(Box::new(LettreMailer {
                transport: builder.build(),
                from,
                kind: "smtp",
            }))
        }
        MailTransportKind::File => {
            let Some(dir) = cfg.dir.as_ref() else {
                anyhow::bail!("file mail transport needs mail.dir (EXAMD_MAIL_DIR)");
            };
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create mail dir {}", dir.to_string_lossy()))?;
            Ok(Box::new(LettreMailer {
                transport: FileTransport::new(dir),
                from,
                kind: "file",
            }))
        }
    }
}
