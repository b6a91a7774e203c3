//! LLM access: provider selection, response caching, usage tracking.
//!
//! The REST plumbing lives in the `llm-client` crate; this wrapper decides
//! which provider serves a `provider:model` selector, caches answers so a
//! retried request never pays for the same completion twice, and tracks
//! cumulative token usage per instance.

use std::sync::{Arc, Mutex};

use llm_client::{
    build_content_parts, ChatRequest, FileInput, FunctionRequest, LlmClient, Message,
    ToolDefinition, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::cache::SafeCache;
use crate::common::hash::stable_hash;
use crate::config::Settings;
use crate::error::{Error, Result};

const SINGLE_QUERY_TTL: u64 = 3600 * 24 * 7;
const FUNCTION_QUERY_TTL: u64 = 3600 * 24 * 7;

const DEFAULT_SYSTEM_PROMPT: &str = "Just respond to the question as laconically as possible";

/// Cumulative token usage of one LLM instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmStats {
    pub total_tokens: u64,
}

/// An LLM bound to one model, with caching and usage tracking.
#[derive(Clone)]
pub struct Llm {
    client: LlmClient,
    model: String,
    cache: SafeCache,
    usage: Arc<Mutex<Usage>>,
}

/// Resolve a `provider:model` selector (`openai:gpt-4o`, `groq:...`).
/// Bare model names default to OpenAI.
pub fn get_llm(settings: &Settings, cache: SafeCache, name: &str) -> Result<Llm> {
    let (provider, model) = match name.split_once(':') {
        Some((provider, model)) => (provider, model),
        None => ("openai", name),
    };

    let client = match provider {
        "openai" => LlmClient::openai(&settings.openai_api_key),
        "groq" => {
            let api_key = settings
                .groq_api_key
                .as_deref()
                .ok_or_else(|| Error::Config("GROQ_API_KEY is not set".into()))?;
            LlmClient::groq(api_key)
        }
        other => return Err(Error::Config(format!("unknown LLM provider: {other}"))),
    };

    Ok(Llm::new(client, model, cache))
}

impl Llm {
    pub fn new(client: LlmClient, model: impl Into<String>, cache: SafeCache) -> Self {
        Self {
            client,
            model: model.into(),
            cache,
            usage: Arc::new(Mutex::new(Usage::default())),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn stats(&self) -> LlmStats {
        let usage = self.usage.lock().unwrap();
        LlmStats {
            total_tokens: usage.total_tokens as u64,
        }
    }

    fn track(&self, usage: Option<&Usage>) {
        if let Some(usage) = usage {
            self.usage.lock().unwrap().add(usage);
        }
    }

    /// One question, one textual answer. Cached for a week.
    pub async fn single_query(
        &self,
        question: &str,
        system_prompts: Option<&[String]>,
    ) -> Result<String> {
        let cache_key = format!("llm:single:{}:{}", self.model, stable_hash(question));
        if let Some(answer) = self.cache.get_string(&cache_key).await {
            return Ok(answer);
        }

        let mut request = ChatRequest::new(&self.model).temperature(0.0);
        match system_prompts {
            Some(prompts) => {
                for prompt in prompts {
                    request = request.message(Message::system(prompt));
                }
            }
            None => request = request.message(Message::system(DEFAULT_SYSTEM_PROMPT)),
        }
        request = request.message(Message::user(question));

        let response = self.client.chat_completion(request).await?;
        self.track(response.usage.as_ref());

        self.cache
            .set_string(&cache_key, &response.content, SINGLE_QUERY_TTL)
            .await;

        Ok(response.content)
    }

    /// Function-calling mode: the model must pick one of the given tools.
    /// Returns the tool name and its arguments. Cached for a week on
    /// (model, question, tool schemas).
    pub async fn function_query(
        &self,
        question: &str,
        tools: &[ToolDefinition],
        files: &[FileInput],
    ) -> Result<(String, Map<String, Value>)> {
        let tools_json = Value::Array(tools.iter().map(|t| t.to_api_format()).collect());
        let cache_key = format!(
            "llm:fn:{}:{}:{}",
            self.model,
            stable_hash(question),
            stable_hash(&tools_json.to_string()),
        );
        if let Some(cached) = self
            .cache
            .get_json::<(String, Map<String, Value>)>(&cache_key)
            .await
        {
            return Ok(cached);
        }

        let user_message = if files.is_empty() {
            Message::user(question)
        } else {
            Message::user_parts(build_content_parts(question, files))
        };

        let request = FunctionRequest::new(&self.model, vec![user_message], tools_json);
        let response = self.client.function_calling(request).await?;
        self.track(response.usage.as_ref());

        let call = response.first_tool_call().ok_or_else(|| {
            Error::LlmBadResponse(format!(
                "model {} returned no tool call for function query",
                self.model
            ))
        })?;

        let arguments = call.parse_arguments().map_err(|e| {
            Error::LlmBadResponse(format!("tool call arguments are not an object: {e}"))
        })?;

        debug!(tool = %call.name, "function query resolved");

        let result = (call.name, arguments);
        self.cache
            .set_json(&cache_key, &result, FUNCTION_QUERY_TTL)
            .await;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::memory_cache;
    use crate::config::tests::test_settings;

    #[test]
    fn test_provider_selection() {
        let settings = test_settings();
        let cache = memory_cache();

        let llm = get_llm(&settings, cache.clone(), "openai:gpt-4o").unwrap();
        assert_eq!(llm.model(), "gpt-4o");

        let llm = get_llm(&settings, cache.clone(), "gpt-4o-mini").unwrap();
        assert_eq!(llm.model(), "gpt-4o-mini");

        assert!(get_llm(&settings, cache.clone(), "groq:llama-3.3-70b-versatile").is_err());
        assert!(get_llm(&settings, cache, "mistral:large").is_err());
    }

    #[test]
    fn test_groq_selection_with_key() {
        let mut settings = test_settings();
        settings.groq_api_key = Some("gsk-test".into());
        let llm = get_llm(&settings, memory_cache(), "groq:llama-3.3-70b-versatile").unwrap();
        assert_eq!(llm.model(), "llama-3.3-70b-versatile");
    }

    #[tokio::test]
    async fn test_single_query_cache_hit_skips_vendor() {
        // Pre-seed the cache under the key single_query computes; the client
        // points at an unroutable address, so a vendor call would error.
        let cache = memory_cache();
        let llm = Llm::new(
            LlmClient::new("sk-test").with_base_url("http://127.0.0.1:1"),
            "gpt-4o",
            cache.clone(),
        );

        let key = format!("llm:single:gpt-4o:{}", stable_hash("ping"));
        cache.set_string(&key, "pong", 60).await;

        assert_eq!(llm.single_query("ping", None).await.unwrap(), "pong");
    }
}
