use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_QDRANT_URL: &str = "http://127.0.0.1:6333";
const DEFAULT_COLLECTION_NAME: &str = "colleges_and_programs";
const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 64;
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_WORKBOOK_PATH: &str = "data/univ_legit.xlsx";
const DEFAULT_SERVER_PORT: u16 = 5000;

/// Problems found while reading settings from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Variable needed by the current code path is unset.
    #[error("Environment variable {0} is not set")]
    MissingVariable(String),
    /// Variable is set but its value does not parse.
    #[error("Environment variable {0} has an invalid value")]
    InvalidValue(String),
}

/// Runtime configuration shared by the query service and the ingestion binary.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores the catalog vectors.
    pub qdrant_url: String,
    /// Name of the Qdrant collection holding catalog records.
    pub qdrant_collection_name: String,
    /// API key sent as `api-key` to Qdrant, if the server needs one.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to vectorize documents and queries.
    pub embedding_provider: EmbeddingProvider,
    /// Model name passed to the embedding provider.
    pub embedding_model: String,
    /// Vector width; must match the collection.
    pub embedding_dimension: usize,
    /// Number of texts sent to the embedding provider per request.
    pub embedding_batch_size: usize,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// API key for the Gemini REST API; required by the query service.
    pub gemini_api_key: Option<String>,
    /// Base URL of the Gemini REST API.
    pub gemini_base_url: String,
    /// Gemini model used for answer and roadmap generation.
    pub gemini_model: String,
    /// Spreadsheet read by the ingestion pipeline.
    pub catalog_workbook_path: String,
    /// Port the HTTP server binds on all interfaces.
    pub server_port: u16,
    /// Allowed CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<Vec<String>>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted Gemini embeddings API.
    Gemini,
    /// Deterministic in-process hashing embeddings.
    Local,
}

impl Config {
    /// Read every setting from the environment, falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            qdrant_url: load_env_or("QDRANT_URL", DEFAULT_QDRANT_URL),
            qdrant_collection_name: load_env_or("QDRANT_COLLECTION_NAME", DEFAULT_COLLECTION_NAME),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: load_env_optional("EMBEDDING_PROVIDER")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".into()))
                })
                .transpose()?
                .unwrap_or(EmbeddingProvider::Ollama),
            embedding_model: load_env_or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            embedding_dimension: parse_env("EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION)?,
            embedding_batch_size: parse_env("EMBEDDING_BATCH_SIZE", DEFAULT_EMBEDDING_BATCH_SIZE)?,
            ollama_url: load_env_or("OLLAMA_URL", DEFAULT_OLLAMA_URL),
            gemini_api_key: load_env_optional("GEMINI_API_KEY"),
            gemini_base_url: load_env_or("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
            gemini_model: load_env_or("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            catalog_workbook_path: load_env_or("CATALOG_WORKBOOK_PATH", DEFAULT_WORKBOOK_PATH),
            server_port: parse_env("SERVER_PORT", DEFAULT_SERVER_PORT)?,
            cors_allowed_origins: load_env_optional("CORS_ALLOWED_ORIGINS")
                .map(|value| split_origins(&value))
                .filter(|origins| !origins.is_empty()),
        })
    }

    /// Return the Gemini API key or a configuration error when it is absent.
    pub fn require_gemini_api_key(&self) -> Result<&str, ConfigError> {
        self.gemini_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVariable("GEMINI_API_KEY".into()))
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

fn split_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "gemini" => Ok(Self::Gemini),
            "local" => Ok(Self::Local),
            _ => Err(()),
        }
    }
}

/// Process-wide settings, set once by [`init_config`].
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Settings installed by [`init_config`]; panics when called before it.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("init_config must run before get_config")
}

/// Load `.env` if present, read the environment and install the result in [`CONFIG`].
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Invalid environment configuration");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        server_port = config.server_port,
        embedding_provider = ?config.embedding_provider,
        gemini_model = %config.gemini_model,
        "Loaded configuration"
    );
    CONFIG
        .set(config)
        .expect("init_config called more than once");
}
