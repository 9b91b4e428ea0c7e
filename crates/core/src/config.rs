//! Configuration management for the ragchat pipeline.
//!
//! This module handles loading and merging configuration from multiple
//! sources:
//! - Config file (ragchat.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! Precedence is defaults < YAML < environment < CLI flags.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Main application configuration.
///
/// This struct holds the endpoints and model identifiers for the external
/// collaborators (completion service, embedding service, search backend)
/// plus the request defaults used when a caller does not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Base URL of the OpenAI-compatible completion/embeddings service
    pub chat_endpoint: String,

    /// Chat model identifier (e.g., "gpt-35-turbo")
    pub model: String,

    /// Vision-capable model identifier used by the vision approach
    pub vision_model: String,

    /// Embedding model identifier
    pub embedding_model: String,

    /// API key for the completion service
    pub api_key: Option<String>,

    /// Base URL of the search backend
    pub search_endpoint: String,

    /// Search index name
    pub search_index: String,

    /// API key for the search backend
    pub search_api_key: Option<String>,

    /// Request defaults for retrieval
    pub retrieval: RetrievalDefaults,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Default retrieval settings applied when a request does not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalDefaults {
    /// Retrieval mode ("text", "vectors", "hybrid")
    pub mode: String,

    /// Number of results to request from the search backend
    pub top: usize,

    /// Enable the backend's semantic reranker
    #[serde(rename = "semanticRanker", default)]
    pub semantic_ranker: bool,

    /// Enable backend semantic captions
    #[serde(rename = "semanticCaptions", default)]
    pub semantic_captions: bool,
}

impl Default for RetrievalDefaults {
    fn default() -> Self {
        Self {
            mode: "hybrid".to_string(),
            top: 3,
            semantic_ranker: false,
            semantic_captions: false,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    chat: Option<ChatConfig>,
    search: Option<SearchConfig>,
    retrieval: Option<RetrievalDefaults>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatConfig {
    endpoint: Option<String>,
    model: Option<String>,
    #[serde(rename = "visionModel")]
    vision_model: Option<String>,
    #[serde(rename = "embeddingModel")]
    embedding_model: Option<String>,
    #[serde(rename = "apiKeyEnv")]
    api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchConfig {
    endpoint: Option<String>,
    index: Option<String>,
    #[serde(rename = "apiKeyEnv")]
    api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            chat_endpoint: "http://localhost:8080/v1".to_string(),
            model: "gpt-35-turbo".to_string(),
            vision_model: "gpt-4".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            api_key: None,
            search_endpoint: "http://localhost:9200".to_string(),
            search_index: "documents".to_string(),
            search_api_key: None,
            retrieval: RetrievalDefaults::default(),
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file and environment variables.
    ///
    /// Environment variables:
    /// - `RAGCHAT_CONFIG`: Path to config file (default: ./ragchat.yaml)
    /// - `RAGCHAT_CHAT_ENDPOINT`: Completion service base URL
    /// - `RAGCHAT_MODEL`: Chat model identifier
    /// - `RAGCHAT_API_KEY`: Completion service API key
    /// - `RAGCHAT_SEARCH_ENDPOINT`: Search backend base URL
    /// - `RAGCHAT_SEARCH_INDEX`: Search index name
    /// - `RAGCHAT_SEARCH_API_KEY`: Search backend API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(config_file) = std::env::var("RAGCHAT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("ragchat.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(endpoint) = std::env::var("RAGCHAT_CHAT_ENDPOINT") {
            config.chat_endpoint = endpoint;
        }

        if let Ok(model) = std::env::var("RAGCHAT_MODEL") {
            config.model = model;
        }

        if let Ok(endpoint) = std::env::var("RAGCHAT_SEARCH_ENDPOINT") {
            config.search_endpoint = endpoint;
        }

        if let Ok(index) = std::env::var("RAGCHAT_SEARCH_INDEX") {
            config.search_index = index;
        }

        if let Ok(key) = std::env::var("RAGCHAT_API_KEY") {
            config.api_key = Some(key);
        }

        if let Ok(key) = std::env::var("RAGCHAT_SEARCH_API_KEY") {
            config.search_api_key = Some(key);
        }

        config.log_level = std::env::var("RUST_LOG").ok().or(config.log_level);

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &PathBuf) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(chat) = config_file.chat {
            if let Some(endpoint) = chat.endpoint {
                result.chat_endpoint = endpoint;
            }
            if let Some(model) = chat.model {
                result.model = model;
            }
            if let Some(vision_model) = chat.vision_model {
                result.vision_model = vision_model;
            }
            if let Some(embedding_model) = chat.embedding_model {
                result.embedding_model = embedding_model;
            }
            if let Some(env_var) = chat.api_key_env {
                if let Ok(key) = std::env::var(&env_var) {
                    result.api_key = Some(key);
                }
            }
        }

        if let Some(search) = config_file.search {
            if let Some(endpoint) = search.endpoint {
                result.search_endpoint = endpoint;
            }
            if let Some(index) = search.index {
                result.search_index = index;
            }
            if let Some(env_var) = search.api_key_env {
                if let Ok(key) = std::env::var(&env_var) {
                    result.search_api_key = Some(key);
                }
            }
        }

        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// This method merges command-line flags with the loaded configuration,
    /// giving precedence to CLI flags over environment variables.
    pub fn with_overrides(
        mut self,
        config_file: Option<PathBuf>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Validate that the endpoints required by the pipeline are present.
    pub fn validate(&self) -> AppResult<()> {
        if self.chat_endpoint.is_empty() {
            return Err(AppError::Config(
                "Completion service endpoint is not configured".to_string(),
            ));
        }

        if self.search_endpoint.is_empty() {
            return Err(AppError::Config(
                "Search backend endpoint is not configured".to_string(),
            ));
        }

        if self.search_index.is_empty() {
            return Err(AppError::Config(
                "Search index name is not configured".to_string(),
            ));
        }

        match self.retrieval.mode.as_str() {
            "text" | "vectors" | "hybrid" => Ok(()),
            other => Err(AppError::Config(format!(
                "Unknown retrieval mode: {}. Supported: text, vectors, hybrid",
                other
            ))),
        }
    }
}
