use anyhow::{Context, Result};
use async_trait::async_trait;
use flume::{bounded, Receiver, Sender, TrySendError};
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::EmailConfig;
use crate::models::contact::ContactForm;

/// Outgoing notification for one contact submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactEmail {
    pub reply_to: String,
    pub subject: String,
    pub body: String,
}

impl ContactEmail {
    pub fn from_form(form: &ContactForm) -> Self {
        let body = format!(
            "New contact form submission from your portfolio:\n\n\
             Name: {}\n\
             Email: {}\n\
             Company: {}\n\
             Subject: {}\n\n\
             Message:\n{}\n\n\
             ---\n\
             This message was sent from your portfolio website.\n",
            form.name,
            form.email,
            form.company.as_deref().unwrap_or("Not provided"),
            form.subject,
            form.message,
        );

        Self {
            reply_to: form.email.clone(),
            subject: format!("Portfolio Contact: {}", form.subject),
            body,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: ContactEmail) -> Result<()>;
}

/// SMTP delivery with STARTTLS and login credentials
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig, user: &str, password: &str) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .context("Failed to build SMTP transport")?
            .port(config.port)
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .build();

        let from: Mailbox = user.parse().context("Invalid sender address")?;
        let to: Mailbox = config.to.parse().context("Invalid destination address")?;

        Ok(Self { transport, from, to })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, email: ContactEmail) -> Result<()> {
        let reply_to: Mailbox = email.reply_to.parse().context("Invalid reply-to address")?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .reply_to(reply_to)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .context("Failed to build email")?;

        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;
        Ok(())
    }
}

/// Fire-and-forget dispatch onto a bounded queue drained by worker tasks.
/// Callers never wait for delivery.
#[derive(Clone)]
pub struct EmailQueue {
    sender: Sender<ContactEmail>,
}

impl EmailQueue {
    /// Spawn `worker_count` workers; must be called inside a tokio runtime
    pub fn new(transport: Arc<dyn MailTransport>, config: &EmailConfig) -> Self {
        let (sender, receiver) = bounded(config.queue_capacity.max(1));
        let worker_count = config.worker_count.max(1);

        info!(
            "Initializing EmailQueue: queue={}, workers={}",
            config.queue_capacity.max(1),
            worker_count
        );

        for worker_id in 0..worker_count {
            let receiver = receiver.clone();
            let transport = transport.clone();
            tokio::spawn(async move {
                Self::worker_loop(worker_id, receiver, transport).await;
            });
        }

        Self { sender }
    }

    /// Returns false when the email was dropped (queue full or workers gone)
    pub fn dispatch(&self, email: ContactEmail) -> bool {
        match self.sender.try_send(email) {
            Ok(()) => true,
            Err(TrySendError::Full(email)) => {
                warn!("Email queue full, dropping email for {}", email.reply_to);
                false
            }
            Err(TrySendError::Disconnected(email)) => {
                error!("Email workers stopped, dropping email for {}", email.reply_to);
                false
            }
        }
    }

    async fn worker_loop(
        worker_id: usize,
        receiver: Receiver<ContactEmail>,
        transport: Arc<dyn MailTransport>,
    ) {
        debug!("Email worker {} started", worker_id);

        while let Ok(email) = receiver.recv_async().await {
            let reply_to = email.reply_to.clone();
            match transport.send(email).await {
                Ok(()) => info!("Email sent successfully for contact from {}", reply_to),
                Err(e) => error!("Failed to send email for contact from {}: {:#}", reply_to, e),
            }
        }

        debug!("Email worker {} stopped", worker_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn form(company: Option<&str>) -> ContactForm {
        ContactForm {
            name: "John Smith".to_string(),
            email: "john.smith@example.com".to_string(),
            company: company.map(str::to_string),
            subject: "Collaboration Opportunity".to_string(),
            message: "Interested in an AI project.".to_string(),
        }
    }

    #[test]
    fn test_email_formatting() {
        let email = ContactEmail::from_form(&form(None));
        assert_eq!(email.subject, "Portfolio Contact: Collaboration Opportunity");
        assert_eq!(email.reply_to, "john.smith@example.com");
        assert!(email.body.contains("Name: John Smith"));
        assert!(email.body.contains("Company: Not provided"));
        assert!(email.body.contains("Interested in an AI project."));

        let email = ContactEmail::from_form(&form(Some("Tech Solutions Inc")));
        assert!(email.body.contains("Company: Tech Solutions Inc"));
    }

    #[tokio::test]
    async fn test_queue_delivers_in_background() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = MockMailTransport::new();
        transport.expect_send().times(1).returning(move |email| {
            tx.send(email).unwrap();
            Ok(())
        });

        let queue = EmailQueue::new(Arc::new(transport), &EmailConfig::default());
        assert!(queue.dispatch(ContactEmail::from_form(&form(None))));

        let delivered = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered.reply_to, "john.smith@example.com");
    }

    #[tokio::test]
    async fn test_transport_failure_is_contained() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = MockMailTransport::new();
        transport.expect_send().times(2).returning(move |_| {
            tx.send(()).unwrap();
            Err(anyhow::anyhow!("smtp down"))
        });

        let config = EmailConfig { worker_count: 1, ..EmailConfig::default() };
        let queue = EmailQueue::new(Arc::new(transport), &config);

        // the worker keeps draining after a failed delivery
        assert!(queue.dispatch(ContactEmail::from_form(&form(None))));
        assert!(queue.dispatch(ContactEmail::from_form(&form(None))));
        for _ in 0..2 {
            tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
        }
    }
}
