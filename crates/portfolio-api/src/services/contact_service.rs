use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::contact::{ContactForm, ContactResponse, ContactSubmission};
use crate::services::email_service::{ContactEmail, EmailQueue};
use crate::storage::ContactStore;

/// Records contact submissions and queues the owner notification.
pub struct ContactService {
    store: Arc<dyn ContactStore>,
    /// `None` when SMTP credentials are not configured
    email_queue: Option<EmailQueue>,
}

impl ContactService {
    pub fn new(store: Arc<dyn ContactStore>, email_queue: Option<EmailQueue>) -> Self {
        Self { store, email_queue }
    }

    pub fn email_enabled(&self) -> bool {
        self.email_queue.is_some()
    }

    /// Input is expected to be validated already.
    /// Email delivery never affects the returned result.
    pub async fn submit(&self, form: ContactForm) -> ContactResponse {
        let message_id = Uuid::new_v4();
        let submission = ContactSubmission::from_form(message_id, &form);

        if let Err(e) = self.store.insert(submission).await {
            error!("Contact form error: {}", e);
            return ContactResponse::failed(e.to_string());
        }

        info!("Contact submission {} stored", message_id);

        if let Some(queue) = &self.email_queue {
            queue.dispatch(ContactEmail::from_form(&form));
        }

        ContactResponse::accepted(message_id)
    }
}
