use anyhow::Result;
use axum::extract::FromRef;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Settings;
use crate::services::conversation::{ContextBuilder, LlmProvider};
use crate::services::email_service::MailTransport;
use crate::services::{ContactService, ConversationManager, EmailQueue, LlmService};
use crate::storage::{ContactStore, SessionStore, StatusStore};

/// Storage handles, usually all backed by the same store
#[derive(Clone)]
pub struct Stores {
    pub sessions: Arc<dyn SessionStore>,
    pub contacts: Arc<dyn ContactStore>,
    pub status: Arc<dyn StatusStore>,
}

impl Stores {
    pub fn shared<T>(store: Arc<T>) -> Self
    where
        T: SessionStore + ContactStore + StatusStore + 'static,
    {
        Self {
            sessions: store.clone(),
            contacts: store.clone(),
            status: store,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub conversation_manager: Arc<ConversationManager>,
    pub contact_service: Arc<ContactService>,
    pub status_store: Arc<dyn StatusStore>,
}

impl AppState {
    /// Wire services from settings. `mailer` is `None` when email is disabled.
    /// Spawns the email workers, so call this inside a tokio runtime.
    pub fn new(
        settings: Settings,
        stores: Stores,
        mailer: Option<Arc<dyn MailTransport>>,
    ) -> Result<Self> {
        let llm_provider = match settings.llm.api_key() {
            Some(key) => {
                let service = LlmService::new(settings.llm.clone(), key.to_string())?;
                Some(Arc::new(service) as Arc<dyn LlmProvider>)
            }
            None => {
                warn!("LLM API key not configured, chat requests will fail");
                None
            }
        };

        let context_builder = ContextBuilder::new(
            settings.chat.system_prompt.clone(),
            settings.chat.history_window,
        );
        let conversation_manager = Arc::new(ConversationManager::new(
            stores.sessions,
            context_builder,
            llm_provider,
        ));

        let email_queue = mailer.map(|transport| EmailQueue::new(transport, &settings.email));
        if email_queue.is_none() {
            info!("Email dispatch disabled");
        }
        let contact_service = Arc::new(ContactService::new(stores.contacts, email_queue));

        Ok(Self {
            settings: Arc::new(settings),
            conversation_manager,
            contact_service,
            status_store: stores.status,
        })
    }
}

impl FromRef<AppState> for Arc<Settings> {
    fn from_ref(state: &AppState) -> Self {
        state.settings.clone()
    }
}

impl FromRef<AppState> for Arc<ConversationManager> {
    fn from_ref(state: &AppState) -> Self {
        state.conversation_manager.clone()
    }
}

impl FromRef<AppState> for Arc<ContactService> {
    fn from_ref(state: &AppState) -> Self {
        state.contact_service.clone()
    }
}

impl FromRef<AppState> for Arc<dyn StatusStore> {
    fn from_ref(state: &AppState) -> Self {
        state.status_store.clone()
    }
}
