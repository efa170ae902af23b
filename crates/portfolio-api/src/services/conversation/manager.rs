use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::chat::{ChatMessage, ChatRequest, ChatResponse, SessionId, StoredMessage};
use crate::services::llm_service::GatewayError;
use crate::storage::SessionStore;

use super::context_builder::ContextBuilder;
use super::types::ChatError;

/// Trait for LLM service
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send the full prompt and return the assistant reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, GatewayError>;
}

/// Coordinates one chat exchange: session resolution, prompt assembly,
/// the gateway call and the history write.
pub struct ConversationManager {
    store: Arc<dyn SessionStore>,
    context_builder: ContextBuilder,
    /// `None` when no gateway credential is configured
    llm_provider: Option<Arc<dyn LlmProvider>>,
}

impl ConversationManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        context_builder: ContextBuilder,
        llm_provider: Option<Arc<dyn LlmProvider>>,
    ) -> Self {
        Self {
            store,
            context_builder,
            llm_provider,
        }
    }

    pub fn generate_session_id() -> SessionId {
        Uuid::new_v4().to_string()
    }

    /// Run one exchange. History is written only after a successful reply
    /// and only while `cancel` has not fired.
    pub async fn handle(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatResponse, ChatError> {
        let start_time = Instant::now();

        let provider = self.llm_provider.as_ref().ok_or(ChatError::Configuration)?;

        let session_id = request
            .requested_session_id()
            .map(str::to_string)
            .unwrap_or_else(Self::generate_session_id);

        info!(
            "Chat request: session={}, message_len={}",
            session_id,
            request.message.len()
        );

        let history = self.load_history(&session_id).await;
        let messages = self.context_builder.build_messages(&history, &request.message);

        debug!(
            "Prompt for session {}: {} messages ({} stored)",
            session_id,
            messages.len(),
            history.len()
        );

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Session {}: request aborted while waiting for gateway", session_id);
                return Err(ChatError::Aborted);
            }
            result = provider.complete(&messages) => result.map_err(|e| {
                error!("Session {}: gateway call failed: {}", session_id, e);
                ChatError::Gateway(e)
            })?,
        };

        if cancel.is_cancelled() {
            warn!("Session {}: request aborted, discarding reply", session_id);
            return Err(ChatError::Aborted);
        }

        // Write failures are logged; the caller still gets the reply
        if let Err(e) = self
            .store
            .append(
                &session_id,
                StoredMessage::user(request.message),
                StoredMessage::assistant(reply.clone()),
            )
            .await
        {
            error!("Session {}: failed to store exchange: {}", session_id, e);
        }

        info!(
            "Chat completed: session={}, reply_len={}, elapsed={}ms",
            session_id,
            reply.len(),
            start_time.elapsed().as_millis()
        );

        Ok(ChatResponse {
            response: reply,
            session_id,
            timestamp: Utc::now(),
        })
    }

    /// Stored history for a session; empty for unknown ids
    pub async fn history(&self, session_id: &str) -> Vec<StoredMessage> {
        self.load_history(session_id).await
    }

    /// Read failures degrade to an empty history
    async fn load_history(&self, session_id: &str) -> Vec<StoredMessage> {
        match self.store.get(session_id).await {
            Ok(history) => history,
            Err(e) => {
                warn!("Session {}: history unavailable, continuing without it: {}", session_id, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StorageError};
    use async_trait::async_trait;
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays scripted replies and records every prompt it receives
    #[derive(Default)]
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String, GatewayError>>>,
        prompts: Mutex<Vec<Vec<ChatMessage>>>,
        delay: Option<Duration>,
    }

    impl ScriptedProvider {
        fn replying(replies: Vec<Result<String, GatewayError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            }
        }

        fn prompts(&self) -> Vec<Vec<ChatMessage>> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, GatewayError> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("default reply".to_string()))
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn get(&self, _session_id: &str) -> Result<Vec<StoredMessage>, StorageError> {
            Err(StorageError::Database("connection refused".to_string()))
        }

        async fn append(
            &self,
            _session_id: &str,
            _user: StoredMessage,
            _assistant: StoredMessage,
        ) -> Result<(), StorageError> {
            Err(StorageError::Database("connection refused".to_string()))
        }
    }

    fn manager_with(
        store: Arc<dyn SessionStore>,
        provider: Option<Arc<dyn LlmProvider>>,
    ) -> ConversationManager {
        ConversationManager::new(store, ContextBuilder::new("persona".to_string(), 10), provider)
    }

    fn request(message: &str, session_id: Option<&str>) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            session_id: session_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_missing_credential_is_configuration_error() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(store.clone(), None);

        let err = manager
            .handle(request("hello", Some("s1")), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Configuration));
        assert!(manager.history("s1").await.is_empty());
    }

    #[tokio::test]
    async fn test_first_exchange_stores_user_and_assistant() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(ScriptedProvider::replying(vec![Ok("hi there".to_string())]));
        let manager = manager_with(store.clone(), Some(provider.clone()));

        let response = manager
            .handle(request("hello", Some("s1")), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.response, "hi there");
        assert_eq!(response.session_id, "s1");

        let history = manager.history("s1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(ChatMessage::from(&history[0]), ChatMessage::user("hello"));
        assert_eq!(ChatMessage::from(&history[1]), ChatMessage::assistant("hi there"));

        // system + new user message only
        assert_eq!(provider.prompts()[0].len(), 2);
    }

    #[tokio::test]
    async fn test_history_grows_by_two_per_exchange_and_is_replayed() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(ScriptedProvider::default());
        let manager = manager_with(store.clone(), Some(provider.clone()));

        for n in 1..=3 {
            manager
                .handle(request(&format!("q{}", n), Some("s1")), CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(manager.history("s1").await.len(), 2 * n);
        }

        let last_prompt = provider.prompts().pop().unwrap();
        assert_eq!(last_prompt.len(), 1 + 4 + 1);
        assert_eq!(last_prompt[1], ChatMessage::user("q1"));
        assert_eq!(last_prompt.last(), Some(&ChatMessage::user("q3")));
    }

    #[tokio::test]
    async fn test_generated_session_ids_are_unique() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(store, Some(Arc::new(ScriptedProvider::default())));

        let mut seen = HashSet::new();
        for blank in [None, Some(""), None, Some("   ")] {
            let response = manager
                .handle(request("hello", blank), CancellationToken::new())
                .await
                .unwrap();
            assert!(!response.session_id.is_empty());
            assert!(seen.insert(response.session_id));
        }
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_history_unchanged() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(ScriptedProvider::replying(vec![
            Ok("first".to_string()),
            Err(GatewayError::HttpStatus(503)),
        ]));
        let manager = manager_with(store.clone(), Some(provider));

        manager
            .handle(request("one", Some("s1")), CancellationToken::new())
            .await
            .unwrap();
        let err = manager
            .handle(request("two", Some("s1")), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Gateway(GatewayError::HttpStatus(503))));
        assert_eq!(manager.history("s1").await.len(), 2);
    }

    #[tokio::test]
    async fn test_aborted_request_does_not_write_history() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(ScriptedProvider {
            delay: Some(Duration::from_secs(5)),
            ..ScriptedProvider::default()
        });
        let manager = Arc::new(manager_with(store.clone(), Some(provider)));

        let cancel = CancellationToken::new();
        let task = {
            let manager = manager.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { manager.handle(request("hello", Some("s1")), cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ChatError::Aborted));
        assert!(manager.history("s1").await.is_empty());
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_storage_failures_do_not_fail_the_reply() {
        let provider = Arc::new(ScriptedProvider::replying(vec![Ok("still here".to_string())]));
        let manager = manager_with(Arc::new(BrokenStore), Some(provider.clone()));

        let response = manager
            .handle(request("hello", Some("s1")), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.response, "still here");
        assert_eq!(provider.prompts()[0].len(), 2);
    }
}
