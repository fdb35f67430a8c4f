use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_base_ms", &self.retry_base_ms)
            .field("embed_batch_size", &self.embed_batch_size)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestionConfig {
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            extensions: default_extensions(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub min_similarity: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: 0.0,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_chat_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_embedding_model() -> String {
    "gemini-embedding-001".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    250
}

fn default_embed_batch_size() -> usize {
    64
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./media")
}

fn default_chunk_size() -> usize {
    300
}

fn default_chunk_overlap() -> usize {
    30
}

fn default_extensions() -> Vec<String> {
    vec!["pdf".to_string()]
}

fn default_top_k() -> usize {
    4
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("policydesk").required(false));
        }

        // Environment variable overrides with POLICYDESK_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("POLICYDESK")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ingestion.extensions"),
        );

        let config: AppConfig = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ingestion.chunk_size == 0 {
            return Err(AppError::Config("ingestion.chunk_size must be > 0".into()));
        }
        if self.ingestion.chunk_overlap >= self.ingestion.chunk_size {
            return Err(AppError::Config(format!(
                "ingestion.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.ingestion.chunk_overlap, self.ingestion.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(AppError::Config("retrieval.top_k must be >= 1".into()));
        }
        if self.gemini.embed_batch_size == 0 {
            return Err(AppError::Config("gemini.embed_batch_size must be >= 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_applied() {
        let file = write_config("[gemini]\napi_key = \"k\"\n");
        let config = AppConfig::load(file.path().to_str()).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.ingestion.chunk_size, 300);
        assert_eq!(config.ingestion.chunk_overlap, 30);
        assert_eq!(config.ingestion.extensions, vec!["pdf"]);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.gemini.chat_model, "gemini-2.5-flash");
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let file = write_config(
            "[gemini]\napi_key = \"k\"\n[ingestion]\nchunk_size = 30\nchunk_overlap = 30\n",
        );
        let err = AppConfig::load(file.path().to_str()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let file = write_config("[gemini]\napi_key = \"k\"\n[retrieval]\ntop_k = 0\n");
        assert!(AppConfig::load(file.path().to_str()).is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let file = write_config("[gemini]\napi_key = \"super-secret\"\n");
        let config = AppConfig::load(file.path().to_str()).unwrap();
        let rendered = format!("{:?}", config.gemini);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
