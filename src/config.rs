use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "rag_config.toml";
pub const DEFAULT_COLLECTION: &str = "pdf_paragraphs";
/// Output size of all-MiniLM-L6-v2.
pub const DEFAULT_VECTOR_SIZE: u64 = 384;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "pdf-rag", "pdf-rag")
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VectorStoreConfig {
    /// gRPC endpoint of the Qdrant server.
    pub url: String,
    pub collection: String,
    pub vector_size: u64,
    /// Start (or reuse) a local Qdrant container before connecting.
    #[serde(default)]
    pub ensure_docker: bool,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            vector_size: DEFAULT_VECTOR_SIZE,
            ensure_docker: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            cache_dir: project_dirs().map(|dirs| dirs.cache_dir().join("models")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IndexerConfig {
    pub batch_size: usize,
    /// Indexed by the `index_pdf` CLI when it is given no paths.
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: 40,
            upload_dir: project_dirs().map(|dirs| dirs.data_dir().join("uploaded")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    #[serde(rename = "azure")]
    Azure,
    #[serde(rename = "openai")]
    OpenAi,
}

/// Which query the next decomposition starts from after a retry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompositionSeed {
    /// Always the user's query.
    #[serde(rename = "original")]
    Original,
    /// The query rewritten by the previous attempt.
    #[serde(rename = "previous")]
    Previous,
}

#[derive(Serialize, Deserialize, Clone, PartialEq)]
pub struct AgentConfig {
    pub provider: LlmProvider,
    /// Base URL, e.g. `https://my-resource.openai.azure.com`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Azure deployment name, or the model id for OpenAI.
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub top_k: usize,
    pub tool_call_limit: u32,
    pub decomposition_seed: DecompositionSeed,
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("top_k", &self.top_k)
            .field("tool_call_limit", &self.tool_call_limit)
            .field("decomposition_seed", &self.decomposition_seed)
            .finish()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Azure,
            endpoint: None,
            deployment: None,
            api_version: Some("2024-08-01-preview".to_string()),
            api_key: None,
            temperature: 0.01,
            timeout_secs: 60,
            max_retries: 3,
            top_k: 5,
            tool_call_limit: 1,
            decomposition_seed: DecompositionSeed::Original,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RagConfig {
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Loads configuration from defaults, then `rag_config.toml` (or `RAG_CONFIG_PATH`),
/// then `RAG_`-prefixed environment variables (`__` separates sections).
pub fn load_config() -> Result<RagConfig> {
    let config_path_env = std::env::var("RAG_CONFIG_PATH").ok();
    let config_path = config_path_env.clone().unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    if let Some(ref env_path) = config_path_env {
        if !std::path::Path::new(env_path).exists() {
            return Err(anyhow::anyhow!("Config file not found at RAG_CONFIG_PATH: {}", env_path));
        }
        log::info!("RAG_CONFIG_PATH is set: {}", env_path);
    } else {
        log::info!("RAG_CONFIG_PATH not set, falling back to default: {}", config_path);
    }

    let figment = Figment::new()
        .merge(Serialized::defaults(RagConfig::default()))
        .merge(Toml::file(&config_path))
        .merge(Env::prefixed("RAG_").ignore(&["CONFIG_PATH"]).split("__"));

    let config: RagConfig = figment.extract().context("Failed to extract RagConfig")?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &RagConfig) -> Result<()> {
    if config.vector_store.collection.trim().is_empty() {
        return Err(anyhow::anyhow!("vector_store.collection cannot be empty"));
    }
    if config.vector_store.vector_size == 0 {
        return Err(anyhow::anyhow!("vector_store.vector_size must be greater than zero"));
    }
    if config.indexer.batch_size == 0 {
        return Err(anyhow::anyhow!("indexer.batch_size must be greater than zero"));
    }
    if config.agent.max_retries == 0 {
        return Err(anyhow::anyhow!("agent.max_retries must be at least 1"));
    }
    if config.agent.top_k == 0 {
        return Err(anyhow::anyhow!("agent.top_k must be at least 1"));
    }
    Ok(())
}
