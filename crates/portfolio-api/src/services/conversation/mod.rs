//! Chat conversation handling
//!
//! - `ContextBuilder`: pure prompt assembly with a fixed history window
//! - `ConversationManager`: per-request orchestration over a `SessionStore`
//!   and an `LlmProvider`

mod context_builder;
pub mod manager;
pub mod types;

pub use context_builder::ContextBuilder;
pub use manager::{ConversationManager, LlmProvider};
pub use types::ChatError;
