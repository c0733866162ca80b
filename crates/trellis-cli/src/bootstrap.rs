use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, bail};
use tokio::sync::Mutex;
use tracing::{info, warn};
use trellis_agents::embeddings::{EmbeddingProvider, OpenAiEmbeddings};
use trellis_agents::memory::ConversationMemory;
use trellis_agents::providers::{LlmProvider, OpenAiProvider};
use trellis_agents::routing::{Grader, QueryRouter};
use trellis_agents::tools::catalog::{
    ListCachedResourcesTool, ProjectInfoTool, SearchProjectsTool,
};
use trellis_agents::tools::redmine::{
    CreateIssueTool, GetIssueTool, GetTrackerMetadataTool, ListIssuesTool, ListProjectsTool,
    ListTimeEntriesTool, ListUsersTool, SearchIssuesTool, UpdateIssueTool,
};
use trellis_agents::tools::vector::{SemanticSearchTool, index_cached_issues};
use trellis_agents::tools::web::{WebSearchClient, WebSearchTool};
use trellis_agents::workflows::{
    ChatbotWorkflow, NewsWorkflow, RedmineWorkflow, ResearchWorkflow, WriterWorkflow,
};
use trellis_agents::ToolRegistry;
use trellis_config::{AppConfig, LlmProviderConfig};
use trellis_db::VectorIndex;
use trellis_gateway::{AppState, SharedState};
use trellis_redmine::{MetadataCache, RedmineClient};

const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

fn build_provider(
    id: &str,
    cfg: &LlmProviderConfig,
) -> anyhow::Result<(Arc<dyn LlmProvider>, String)> {
    let api_key = cfg
        .resolved_api_key()
        .with_context(|| format!("no API key configured for provider '{id}'"))?;

    let base_url = cfg.base_url.clone().or_else(|| match cfg.provider.as_str() {
        "groq" => Some(GROQ_BASE_URL.to_string()),
        _ => None,
    });

    let model = cfg.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let provider = OpenAiProvider::with_id(id, api_key, base_url)
        .with_sampling(cfg.temperature, cfg.max_tokens);
    Ok((Arc::new(provider), model))
}

fn default_provider_entry(config: &AppConfig) -> anyhow::Result<(&String, &LlmProviderConfig)> {
    if let Some(name) = &config.default_provider {
        return config
            .llm
            .get_key_value(name)
            .with_context(|| format!("default_provider '{name}' is not defined under [llm]"));
    }
    config
        .llm
        .iter()
        .next()
        .context("no LLM providers configured; add an [llm.<name>] section")
}

/// Assemble every component the gateway needs from the loaded config.
pub async fn build_state(config: AppConfig) -> anyhow::Result<SharedState> {
    let (provider_id, provider_cfg) = default_provider_entry(&config)?;
    let (provider, model) = build_provider(provider_id, provider_cfg)?;
    info!(provider = %provider_id, %model, "using LLM provider");

    let memory = Arc::new(ConversationMemory::new(config.memory.max_messages));

    let search_cfg = config.search.clone().unwrap_or_default();
    let search_key = search_cfg.resolved_api_key().unwrap_or_else(|| {
        warn!("no web search API key configured; web search will fail at call time");
        String::new()
    });
    let search = Arc::new(WebSearchClient::new(
        search_key,
        search_cfg.base_url.clone(),
        search_cfg.max_results,
    ));

    let mut web_tools = ToolRegistry::new();
    web_tools.register(Arc::new(WebSearchTool::new(Arc::clone(&search))));

    let (redmine_workflow, redmine_client) =
        build_redmine(&config, &provider, &model, &memory, &search).await?;

    let state = AppState {
        chatbot: ChatbotWorkflow::new(
            Arc::clone(&provider),
            &model,
            Arc::clone(&memory),
            web_tools,
        ),
        research: ResearchWorkflow::new(Arc::clone(&provider), &model, Arc::clone(&search)),
        writer: WriterWorkflow::new(Arc::clone(&provider), &model),
        news: NewsWorkflow::new(
            Arc::clone(&provider),
            &model,
            Arc::clone(&search),
            &config.gateway.data_dir,
        ),
        redmine: redmine_workflow,
        redmine_client,
        memory,
        config,
        started_at: Instant::now(),
    };
    Ok(Arc::new(state))
}

async fn build_redmine(
    config: &AppConfig,
    provider: &Arc<dyn LlmProvider>,
    model: &str,
    memory: &Arc<ConversationMemory>,
    search: &Arc<WebSearchClient>,
) -> anyhow::Result<(Option<RedmineWorkflow>, Option<RedmineClient>)> {
    let Some(redmine_cfg) = &config.redmine else {
        info!("no [redmine] section; tracker assistant disabled");
        return Ok((None, None));
    };
    let Some(api_key) = redmine_cfg.resolved_api_key() else {
        bail!("[redmine] is configured but no API key could be resolved");
    };

    let client = RedmineClient::new(&redmine_cfg.base_url, api_key);
    let metadata = Arc::new(MetadataCache::load(&redmine_cfg.metadata_file));

    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(ListProjectsTool::new(client.clone())));
    tools.register(Arc::new(ListIssuesTool::new(
        client.clone(),
        Arc::clone(&metadata),
    )));
    tools.register(Arc::new(GetIssueTool::new(client.clone())));
    tools.register(Arc::new(CreateIssueTool::new(
        client.clone(),
        Arc::clone(&metadata),
    )));
    tools.register(Arc::new(UpdateIssueTool::new(
        client.clone(),
        Arc::clone(&metadata),
    )));
    tools.register(Arc::new(ListTimeEntriesTool::new(
        client.clone(),
        Arc::clone(&metadata),
    )));
    tools.register(Arc::new(GetTrackerMetadataTool::new(client.clone())));
    tools.register(Arc::new(SearchIssuesTool::new(
        client.clone(),
        Arc::clone(&metadata),
    )));
    tools.register(Arc::new(ListUsersTool::new(client.clone())));
    tools.register(Arc::new(ProjectInfoTool::new(Arc::clone(&metadata))));
    tools.register(Arc::new(SearchProjectsTool::new(Arc::clone(&metadata))));
    tools.register(Arc::new(ListCachedResourcesTool::new(Arc::clone(&metadata))));
    tools.register(Arc::new(WebSearchTool::new(Arc::clone(search))));

    if let Some(semantic) = build_semantic_search(config, &metadata).await? {
        tools.register(semantic);
    }

    let router = QueryRouter::new(Arc::clone(provider), model);
    let grader = config
        .agents
        .grading_enabled
        .then(|| Grader::new(Arc::clone(provider), model));

    let workflow = RedmineWorkflow::new(
        Arc::clone(provider),
        model,
        metadata,
        Arc::clone(memory),
        tools,
        router,
        grader,
        Arc::clone(search),
    );
    Ok((Some(workflow), Some(client)))
}

async fn build_semantic_search(
    config: &AppConfig,
    metadata: &Arc<MetadataCache>,
) -> anyhow::Result<Option<Arc<SemanticSearchTool>>> {
    let Some(embeddings_cfg) = &config.embeddings else {
        info!("no [embeddings] section; semantic search disabled");
        return Ok(None);
    };
    let Some(api_key) = embeddings_cfg.resolved_api_key() else {
        warn!("[embeddings] configured without a resolvable API key; semantic search disabled");
        return Ok(None);
    };

    let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(OpenAiEmbeddings::new(
        api_key,
        embeddings_cfg.base_url.clone(),
        &embeddings_cfg.model,
        embeddings_cfg.dimensions,
    ));

    let db_path = Path::new(&config.gateway.data_dir).join("vector_index.db");
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let index = Arc::new(Mutex::new(VectorIndex::open(
        &db_path,
        embeddings_cfg.dimensions,
    )?));

    // Seed the index from the metadata snapshot. A failure here degrades
    // semantic search but does not block startup.
    match index_cached_issues(&index, embeddings.as_ref(), metadata).await {
        Ok(indexed) => info!("semantic index ready ({indexed} issues)"),
        Err(e) => warn!("failed to seed semantic index: {e}"),
    }

    Ok(Some(Arc::new(SemanticSearchTool::new(index, embeddings))))
}

/// Run connectivity checks for `trellis check`.
pub async fn check_connectivity(config: &AppConfig) -> Vec<String> {
    let mut report = Vec::new();

    match default_provider_entry(config) {
        Ok((id, cfg)) => match build_provider(id, cfg) {
            Ok((provider, model)) => match provider.health_check().await {
                Ok(true) => report.push(format!("ok   llm provider '{id}' ({model})")),
                Ok(false) => report.push(format!("FAIL llm provider '{id}' unreachable")),
                Err(e) => report.push(format!("FAIL llm provider '{id}': {e}")),
            },
            Err(e) => report.push(format!("FAIL llm provider '{id}': {e}")),
        },
        Err(e) => report.push(format!("FAIL llm config: {e}")),
    }

    match &config.redmine {
        Some(redmine_cfg) => match redmine_cfg.resolved_api_key() {
            Some(key) => {
                let client = RedmineClient::new(&redmine_cfg.base_url, key);
                match client.validate_connection().await {
                    Ok(user) => report.push(format!(
                        "ok   redmine connection (user id {})",
                        user.id
                    )),
                    Err(e) => report.push(format!("FAIL redmine connection: {e}")),
                }
            }
            None => report.push("FAIL redmine: no API key resolved".to_string()),
        },
        None => report.push("skip redmine: not configured".to_string()),
    }

    report
}
