use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: String,
    pub groq_api_key: Option<String>,
    pub postgres_connection_string: String,
    /// Accepted for compatibility with older deployments that ran a separate
    /// memcached for the response cache; the cache now lives in Redis.
    pub memcached_host: String,
    pub redis_host: String,
    pub port: u16,

    pub ingest_batch_size: usize,
    pub delete_batch_size: usize,

    pub events_cleanup_after: String,
    pub search_history_cleanup_after: String,
    pub events_cleanup_lone_events_after: String,
    pub events_cleanup_lone_events_min_count: i64,
    pub events_cleanup_max_per_person_and_type: i64,

    pub organization: String,

    pub default_llm_provider_and_model: String,
    pub default_openai_llm_model: String,
    pub default_groq_llm_model: String,
    pub aggregations_heavy_model: String,
    pub aggregations_light_model: String,

    pub default_embeddings_model: String,
    pub embeddings_provider_url: String,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| anyhow::anyhow!("{name} must be a valid number")),
        Err(_) => Ok(default),
    }
}

impl Settings {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            groq_api_key: env::var("GROQ_API_KEY").ok(),
            postgres_connection_string: env::var("POSTGRES_CONNECTION_STRING")
                .context("POSTGRES_CONNECTION_STRING must be set")?,
            memcached_host: var_or("MEMCACHED_HOST", "memcached:11211"),
            redis_host: var_or("REDIS_HOST", "redis:6379"),
            port: parse_var_or("PORT", 8080)?,

            ingest_batch_size: parse_var_or("INGEST_BATCH_SIZE", 500)?,
            delete_batch_size: parse_var_or("DELETE_BATCH_SIZE", 100)?,

            events_cleanup_after: var_or("EVENTS_CLEANUP_AFTER", "30d"),
            search_history_cleanup_after: var_or("SEARCH_HISTORY_CLEANUP_AFTER", "3d"),
            events_cleanup_lone_events_after: var_or("EVENTS_CLEANUP_LONE_EVENTS_AFTER", "24h"),
            events_cleanup_lone_events_min_count: parse_var_or(
                "EVENTS_CLEANUP_LONE_EVENTS_MIN_COUNT",
                2,
            )?,
            events_cleanup_max_per_person_and_type: parse_var_or(
                "EVENTS_CLEANUP_MAX_PER_PERSON_AND_TYPE",
                25,
            )?,

            organization: var_or("ORGANIZATION", "default-org"),

            default_llm_provider_and_model: var_or("DEFAULT_LLM_PROVIDER_AND_MODEL", "openai:gpt-4o"),
            default_openai_llm_model: var_or("DEFAULT_OPENAI_LLM_MODEL", "gpt-4o-mini"),
            default_groq_llm_model: var_or("DEFAULT_GROQ_LLM_MODEL", "llama-3.3-70b-versatile"),
            aggregations_heavy_model: var_or("AGGREGATIONS_HEAVY_MODEL", "openai:gpt-4o-mini"),
            aggregations_light_model: var_or("AGGREGATIONS_LIGHT_MODEL", "openai:gpt-4o-mini"),

            default_embeddings_model: var_or("DEFAULT_EMBEDDINGS_MODEL", "text-embedding-3-small"),
            embeddings_provider_url: var_or(
                "EMBEDDINGS_PROVIDER_URL",
                "http://embeddings-provider:80",
            ),
        })
    }

    /// Redis connection URL from the configured host.
    pub fn redis_url(&self) -> String {
        if self.redis_host.starts_with("redis://") {
            self.redis_host.clone()
        } else {
            format!("redis://{}", self.redis_host)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn test_redis_url_adds_scheme() {
        let mut settings = test_settings();
        settings.redis_host = "redis:6379".into();
        assert_eq!(settings.redis_url(), "redis://redis:6379");

        settings.redis_host = "redis://10.0.0.1:6379".into();
        assert_eq!(settings.redis_url(), "redis://10.0.0.1:6379");
    }

    pub(crate) fn test_settings() -> Settings {
        Settings {
            openai_api_key: "sk-test".into(),
            groq_api_key: None,
            postgres_connection_string: "postgres://localhost/test".into(),
            memcached_host: "memcached:11211".into(),
            redis_host: "redis:6379".into(),
            port: 8080,
            ingest_batch_size: 500,
            delete_batch_size: 100,
            events_cleanup_after: "30d".into(),
            search_history_cleanup_after: "3d".into(),
            events_cleanup_lone_events_after: "24h".into(),
            events_cleanup_lone_events_min_count: 2,
            events_cleanup_max_per_person_and_type: 25,
            organization: "test-org".into(),
            default_llm_provider_and_model: "openai:gpt-4o".into(),
            default_openai_llm_model: "gpt-4o-mini".into(),
            default_groq_llm_model: "llama-3.3-70b-versatile".into(),
            aggregations_heavy_model: "openai:gpt-4o-mini".into(),
            aggregations_light_model: "openai:gpt-4o-mini".into(),
            default_embeddings_model: "text-embedding-3-small".into(),
            embeddings_provider_url: "http://localhost:8001".into(),
        }
    }
}
