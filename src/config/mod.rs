// src/config/mod.rs
// All tunables live here and are loaded from the environment once at
// startup. The struct is passed into each component at construction so
// tests can vary thresholds without touching process state.

use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    // ── OpenAI Configuration
    pub openai_base_url: String,
    pub openai_api_key: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dim: usize,

    // ── GitHub Configuration
    pub github_api_url: String,
    pub github_token: String,
    pub default_reviewers: Vec<String>,

    // ── Qdrant Configuration
    pub qdrant_url: String,
    pub rules_collection: String,

    // ── Retrieval thresholds
    // Two call sites use different bars: rule retrieval for code review
    // is stricter than conversational retrieval.
    pub rule_min_score: f32,
    pub conversational_min_score: f32,
    pub relaxation_floor: f32,
    pub relaxation_margin: f32,
    pub search_top_k: usize,

    // ── Chunking
    pub chunk_size: usize,
    pub chunk_overlap: usize,

    // ── Analysis limits
    pub max_files_per_review: usize,
    pub max_concurrent_files: usize,
    pub query_snippet_chars: usize,
    pub prompt_snippet_chars: usize,

    // ── Database Configuration
    pub database_url: String,

    // ── Server Configuration
    pub host: String,
    pub port: u16,

    // ── Timeouts (in seconds)
    pub openai_timeout: u64,
    pub qdrant_timeout: u64,
    pub github_timeout: u64,

    // ── Logging
    pub log_level: String,
}

// Handles values with trailing comments and extra whitespace.
fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

fn env_var_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl BotConfig {
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }

        Self {
            openai_base_url: env_var_or("OPENAI_BASE_URL", "https://api.openai.com/v1".to_string()),
            openai_api_key: env_var_or("OPENAI_API_KEY", String::new()),
            chat_model: env_var_or("PRBOT_CHAT_MODEL", "gpt-4o".to_string()),
            embedding_model: env_var_or("PRBOT_EMBEDDING_MODEL", "text-embedding-3-small".to_string()),
            embedding_dim: env_var_or("PRBOT_EMBEDDING_DIM", 1536),
            github_api_url: env_var_or("GITHUB_API_URL", "https://api.github.com".to_string()),
            github_token: env_var_or("GITHUB_TOKEN", String::new()),
            default_reviewers: env_var_list("PRBOT_DEFAULT_REVIEWERS"),
            qdrant_url: env_var_or("QDRANT_URL", "http://localhost:6333".to_string()),
            rules_collection: env_var_or("PRBOT_RULES_COLLECTION", "coding_rules".to_string()),
            rule_min_score: env_var_or("PRBOT_RULE_MIN_SCORE", 0.5),
            conversational_min_score: env_var_or("PRBOT_CONVERSATIONAL_MIN_SCORE", 0.35),
            relaxation_floor: env_var_or("PRBOT_RELAXATION_FLOOR", 0.25),
            relaxation_margin: env_var_or("PRBOT_RELAXATION_MARGIN", 0.05),
            search_top_k: env_var_or("PRBOT_SEARCH_TOP_K", 10),
            chunk_size: env_var_or("PRBOT_CHUNK_SIZE", 1000),
            chunk_overlap: env_var_or("PRBOT_CHUNK_OVERLAP", 200),
            max_files_per_review: env_var_or("PRBOT_MAX_FILES_PER_REVIEW", 50),
            max_concurrent_files: env_var_or("PRBOT_MAX_CONCURRENT_FILES", 4),
            query_snippet_chars: env_var_or("PRBOT_QUERY_SNIPPET_CHARS", 1000),
            prompt_snippet_chars: env_var_or("PRBOT_PROMPT_SNIPPET_CHARS", 3000),
            database_url: env_var_or("DATABASE_URL", "sqlite:./prbot.db".to_string()),
            host: env_var_or("PRBOT_HOST", "0.0.0.0".to_string()),
            port: env_var_or("PRBOT_PORT", 3001),
            openai_timeout: env_var_or("PRBOT_OPENAI_TIMEOUT", 60),
            qdrant_timeout: env_var_or("PRBOT_QDRANT_TIMEOUT", 10),
            github_timeout: env_var_or("PRBOT_GITHUB_TIMEOUT", 30),
            log_level: env_var_or("PRBOT_LOG_LEVEL", "info".to_string()),
        }
    }

    /// Defaults suitable for tests: no real endpoints, thresholds matching
    /// the documented retrieval contract.
    pub fn for_tests() -> Self {
        Self {
            openai_base_url: "http://localhost:0".to_string(),
            openai_api_key: "test".to_string(),
            chat_model: "test-model".to_string(),
            embedding_model: "test-embedding".to_string(),
            embedding_dim: 1536,
            github_api_url: "http://localhost:0".to_string(),
            github_token: "test".to_string(),
            default_reviewers: Vec::new(),
            qdrant_url: "http://localhost:0".to_string(),
            rules_collection: "coding_rules".to_string(),
            rule_min_score: 0.5,
            conversational_min_score: 0.35,
            relaxation_floor: 0.25,
            relaxation_margin: 0.05,
            search_top_k: 10,
            chunk_size: 1000,
            chunk_overlap: 200,
            max_files_per_review: 50,
            max_concurrent_files: 4,
            query_snippet_chars: 1000,
            prompt_snippet_chars: 3000,
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            openai_timeout: 5,
            qdrant_timeout: 5,
            github_timeout: 5,
            log_level: "debug".to_string(),
        }
    }

    /// Get server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Fails fast when a credential the pipeline cannot run without is
    /// missing, instead of erroring mid-review.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.openai_api_key.is_empty() {
            return Err(crate::error::ReviewError::Configuration(
                "OPENAI_API_KEY is not set".to_string(),
            ));
        }
        if self.github_token.is_empty() {
            return Err(crate::error::ReviewError::Configuration(
                "GITHUB_TOKEN is not set".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(crate::error::ReviewError::Configuration(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}
