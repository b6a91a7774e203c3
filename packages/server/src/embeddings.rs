//! Embedding providers: hosted LLM vendor or self-hosted
//! sentence-transformer service, behind one interface with a per-string
//! cache.

use std::sync::Arc;

use async_trait::async_trait;
use llm_client::LlmClient;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::SafeCache;
use crate::common::hash::stable_hash;
use crate::common::value_strings;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::Item;

const EMBEDDINGS_TTL: u64 = 3600 * 24;
const MAX_BATCH: usize = 512;

/// Vector dimension of an embeddings model selector.
pub fn model_vector_size(model: &str) -> Option<usize> {
    if model == "text-embedding-3-large" {
        Some(3072)
    } else if model.starts_with("text-embedding-") {
        Some(1536)
    } else {
        // Everything else is served by the self-hosted provider.
        Some(384)
    }
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model(&self) -> &str;
    fn vector_size(&self) -> usize;

    /// Embed a batch. Either every input comes back or the call fails.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// OpenAI embeddings endpoint.
pub struct OpenAiEmbeddings {
    client: LlmClient,
    model: String,
    size: usize,
}

impl OpenAiEmbeddings {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: LlmClient::openai(api_key),
            model: model.to_string(),
            size: model_vector_size(model).unwrap_or(1536),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn model(&self) -> &str {
        &self.model
    }

    fn vector_size(&self) -> usize {
        self.size
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let refs: Vec<&str> = texts.iter().map(|t| t.as_str()).collect();
        let vectors = self.client.create_embeddings(&refs, &self.model).await?;
        Ok(vectors)
    }
}

#[derive(Serialize)]
struct HostedEmbeddingRequest<'a> {
    documents: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct HostedEmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Self-hosted sentence-transformer HTTP service.
pub struct HostedEmbeddings {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl HostedEmbeddings {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HostedEmbeddings {
    fn model(&self) -> &str {
        &self.model
    }

    fn vector_size(&self) -> usize {
        384
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .http
            .post(format!("{}/embedding", self.base_url))
            .json(&HostedEmbeddingRequest {
                documents: texts,
                model: &self.model,
            })
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "embeddings provider returned {}",
                response.status()
            )));
        }

        let parsed: HostedEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(Error::UpstreamUnavailable(format!(
                "embeddings provider returned {} vectors for {} inputs",
                parsed.embeddings.len(),
                texts.len()
            )));
        }

        Ok(parsed.embeddings)
    }
}

/// Map strings to fixed-dimension vectors, consulting the per-string cache.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    cache: SafeCache,
}

/// Build the embedder serving an embeddings-model selector.
pub fn embedder_for_model(settings: &Settings, cache: SafeCache, model: &str) -> Embedder {
    let provider: Arc<dyn EmbeddingProvider> = if model.starts_with("text-embedding-") {
        Arc::new(OpenAiEmbeddings::new(&settings.openai_api_key, model))
    } else {
        Arc::new(HostedEmbeddings::new(
            &settings.embeddings_provider_url,
            model,
        ))
    };
    Embedder::new(provider, cache)
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cache: SafeCache) -> Self {
        Self { provider, cache }
    }

    pub fn vector_size(&self) -> usize {
        self.provider.vector_size()
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    fn cache_key(&self, text: &str) -> String {
        format!("embeddings:{}:{}", self.provider.model(), stable_hash(text))
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_many(&[text.to_string()]).await?;
        Ok(vectors.pop().unwrap_or_default())
    }

    /// Embed many strings, serving what the cache already has and batching
    /// the rest. Never returns a partial result.
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<usize> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            match self.cache.get_json::<Vec<f32>>(&self.cache_key(text)).await {
                Some(vector) => results.push(Some(vector)),
                None => {
                    results.push(None);
                    missing.push(i);
                }
            }
        }

        for batch in missing.chunks(MAX_BATCH) {
            let inputs: Vec<String> = batch.iter().map(|&i| texts[i].clone()).collect();
            let vectors = self.provider.embed_batch(&inputs).await?;

            for (&index, vector) in batch.iter().zip(vectors) {
                self.cache
                    .set_json(&self.cache_key(&texts[index]), &vector, EMBEDDINGS_TTL)
                    .await;
                results[index] = Some(vector);
            }
        }

        Ok(results.into_iter().map(|v| v.unwrap_or_default()).collect())
    }

    /// Embed an item's description.
    pub async fn embed_item(&self, item: &Item) -> Result<Vec<f32>> {
        self.embed_one(item.description.as_deref().unwrap_or_default())
            .await
    }

    pub async fn embed_items(&self, items: &[Item]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = items
            .iter()
            .map(|item| item.description.clone().unwrap_or_default())
            .collect();
        self.embed_many(&texts).await
    }

    /// Embed a field map through its canonical string form.
    pub async fn embed_fields(&self, fields: &Map<String, Value>) -> Result<Vec<f32>> {
        self.embed_one(&fields_to_string(fields)).await
    }
}

/// Canonicalize a field map to a `k=v1 v2` string. `serde_json::Map` keeps
/// its keys ordered, so the result is independent of caller insertion order.
pub fn fields_to_string(fields: &Map<String, Value>) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, value_strings(value).join(" ")))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::memory_cache;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_model_vector_size() {
        assert_eq!(model_vector_size("text-embedding-3-small"), Some(1536));
        assert_eq!(model_vector_size("text-embedding-3-large"), Some(3072));
        assert_eq!(model_vector_size("all-MiniLM-L6-v2"), Some(384));
    }

    #[test]
    fn test_fields_to_string_order_independent() {
        let a = fields_to_string(&fields(json!({ "make": "opel", "tags": ["a", "b"] })));
        let b = fields_to_string(&fields(json!({ "tags": ["a", "b"], "make": "opel" })));
        assert_eq!(a, b);
        assert_eq!(a, "make=opel, tags=a b");
    }

    struct CountingProvider {
        calls: std::sync::Mutex<usize>,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn model(&self) -> &str {
            "test-model"
        }

        fn vector_size(&self) -> usize {
            3
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            *self.calls.lock().unwrap() += 1;
            Ok(texts.iter().map(|t| vec![t.len() as f32, 0.0, 1.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_embed_many_uses_cache() {
        let provider = Arc::new(CountingProvider {
            calls: std::sync::Mutex::new(0),
        });
        let embedder = Embedder::new(provider.clone(), memory_cache());

        let first = embedder
            .embed_many(&["bmw 316".into(), "opel corsa".into()])
            .await
            .unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(*provider.calls.lock().unwrap(), 1);

        // Second pass is fully served from cache.
        let second = embedder
            .embed_many(&["bmw 316".into(), "opel corsa".into()])
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(*provider.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_embed_one_matches_batch_entry() {
        let provider = Arc::new(CountingProvider {
            calls: std::sync::Mutex::new(0),
        });
        let embedder = Embedder::new(provider, memory_cache());

        let one = embedder.embed_one("bmw 316").await.unwrap();
        let many = embedder.embed_many(&["bmw 316".into()]).await.unwrap();
        assert_eq!(one, many[0]);
    }
}
