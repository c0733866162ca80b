pub mod loader;
pub mod model;

pub use loader::ConfigLoader;
pub use model::{
    AgentsConfig, AppConfig, EmbeddingsConfig, GatewayConfig, LlmProviderConfig, MemoryConfig,
    RateLimitConfig, RedmineConfig, SearchConfig,
};
