pub mod contact_service;
pub mod conversation;
pub mod email_service;
pub mod llm_service;

pub use contact_service::ContactService;
pub use conversation::ConversationManager;
pub use email_service::{EmailQueue, SmtpMailer};
pub use llm_service::LlmService;
