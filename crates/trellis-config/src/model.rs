use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level application configuration, loaded from `trellis.toml` plus
/// environment overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gateway: GatewayConfig,
    /// Named LLM provider configurations. The map key is the provider id
    /// used in API requests and in `default_provider`.
    pub llm: BTreeMap<String, LlmProviderConfig>,
    pub default_provider: Option<String>,
    pub embeddings: Option<EmbeddingsConfig>,
    pub search: Option<SearchConfig>,
    pub redmine: Option<RedmineConfig>,
    pub memory: MemoryConfig,
    pub agents: AgentsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
    /// Directory for workflow artifacts (news summaries, vector index).
    pub data_dir: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            allowed_origins: vec!["http://localhost:3000".to_string()],
            rate_limit: RateLimitConfig::default(),
            data_dir: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub per_second: u64,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 1,
            burst_size: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    /// Provider kind: "openai" or "groq". Both speak the OpenAI
    /// chat-completions protocol and differ only in base URL.
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable to read the API key from when `api_key` is unset.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    pub model: String,
    /// Output dimensionality of the embedding model; fixes the vector
    /// index schema.
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
}

fn default_embedding_dimensions() -> usize {
    1536
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: Some("TAVILY_API_KEY".to_string()),
            base_url: None,
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedmineConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Path to the fetched metadata snapshot used by the cache and the
    /// vector index.
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,
}

fn default_metadata_file() -> String {
    "data/redmine_metadata.json".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub max_messages: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { max_messages: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Run the relevance/groundedness/usefulness grading pass on Redmine
    /// chatbot answers. Shipped disabled.
    pub grading_enabled: bool,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            grading_enabled: false,
        }
    }
}

impl LlmProviderConfig {
    /// Resolve the API key: inline value first, then the named env var.
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

impl EmbeddingsConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

impl SearchConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

impl RedmineConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

fn resolve_key(inline: Option<&str>, env_name: Option<&str>) -> Option<String> {
    if let Some(key) = inline {
        let trimmed = key.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    env_name.and_then(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
}
