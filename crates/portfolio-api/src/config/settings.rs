use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub llm: LlmConfig,
    pub chat: ChatConfig,
    pub email: EmailConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_prefix: String,
    pub service_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            api_prefix: "/api".to_string(),
            service_name: "Portfolio API - AI Powered".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    /// Bearer token for the gateway. Never log this value.
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub timeout_seconds: u64,
    pub provider_parameters: ProviderParameters,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.venice.ai/api/v1".to_string(),
            api_key: None,
            model: "venice-uncensored".to_string(),
            temperature: 0.7,
            max_completion_tokens: 512,
            timeout_seconds: 30,
            provider_parameters: ProviderParameters::default(),
        }
    }
}

impl LlmConfig {
    /// Configured key, treating a blank value as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Provider-specific generation flags sent alongside the standard body.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ProviderParameters {
    pub include_provider_system_prompt: bool,
    pub enable_web_search: String,
}

impl Default for ProviderParameters {
    fn default() -> Self {
        Self {
            include_provider_system_prompt: false,
            enable_web_search: "off".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of stored messages replayed to the gateway per request
    pub history_window: usize,
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_window: 10,
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_system_prompt() -> String {
    r#"You are the AI assistant of a portfolio website. You represent its owner, an AI generalist and full-stack developer.

Key facts:
- Works on AI integration, LLM application development and prompt engineering
- Full-stack developer (React, Next.js, Python, Rust/WASM, Node.js)
- Strong background in process optimization, data analytics and operational excellence
- Turns complex problems into simple, reliable solutions

Answer questions about the owner's background, skills, projects and expertise.
Be conversational, professional and concise."#
        .to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Destination mailbox for contact submissions
    pub to: String,
    pub worker_count: usize,
    pub queue_capacity: usize,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            user: None,
            password: None,
            to: "owner@example.com".to_string(),
            worker_count: 2,
            queue_capacity: 100,
        }
    }
}

impl EmailConfig {
    /// SMTP credentials, present only when both user and password are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let user = self.user.as_deref().filter(|u| !u.trim().is_empty())?;
        let password = self.password.as_deref().filter(|p| !p.is_empty())?;
        Some((user, password))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection string. In-process storage is used when absent.
    pub url: Option<String>,
    pub pool_max_size: u32,
    pub pool_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_max_size: 5,
            pool_timeout_seconds: 5,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }
}
