//! The search facade: cache, engine, ranker, history.

use serde_json::Value;
use tracing::info;

use crate::common::hash::{canonical_json_of, stable_hash};
use crate::common::vars::Context;
use crate::deps::Deps;
use crate::error::Result;
use crate::models::{Collection, SearchHistory};
use crate::search::ranker::{RandomRanker, ScoreRanker};
use crate::search::similarity::SimilarityEngine;
use crate::search::types::{SearchConfig, SearchResult};

pub struct Searcher<'a> {
    deps: &'a Deps,
    collection: &'a Collection,
}

impl<'a> Searcher<'a> {
    pub fn new(deps: &'a Deps, collection: &'a Collection) -> Self {
        Self { deps, collection }
    }

    fn cache_key(&self, config: &SearchConfig, context: &Context) -> String {
        if let Some(key) = config.cache.as_ref().and_then(|c| c.key.clone()) {
            return key;
        }

        let fingerprint = format!(
            "{}{}{}",
            self.collection.id,
            canonical_json_of(config),
            canonical_json_of(context),
        );
        stable_hash(&fingerprint)
    }

    /// Retrieve, rank and cache, without touching search history.
    pub async fn get_search_results(
        &self,
        config: &SearchConfig,
        context: &Context,
    ) -> Result<SearchResult> {
        let caching = config.cache.as_ref().filter(|c| c.expire > 0);

        if caching.is_some() {
            let key = self.cache_key(config, context);
            if let Some(cached) = self.deps.cache.get_json::<SearchResult>(&key).await {
                info!(key = %key, "returning search results from cache");
                return Ok(cached);
            }
        }

        let parser =
            crate::search::query_parser::QueryParser::new(self.deps, self.collection, context);
        let exclude = parser.item_ids(&config.exclude).await?;

        let engine = SimilarityEngine::new(self.deps, self.collection);
        let items = engine.search(config, &exclude, context).await?;

        let items = match &config.rank {
            Some(rank) if rank.randomize => RandomRanker.rank(items, config.limit),
            Some(rank) => {
                let expression = rank.score_function.as_deref().unwrap_or("score");
                ScoreRanker::parse(expression)?.rank(items, config.limit)
            }
            None => ScoreRanker::parse("score")?.rank(items, config.limit),
        };

        let result = SearchResult { items, id: None };

        if let Some(cache_config) = caching {
            let key = self.cache_key(config, context);
            self.deps
                .cache
                .set_json(&key, &result, cache_config.expire)
                .await;
        }

        Ok(result)
    }

    /// The full search operation: results plus a search-history entry whose
    /// id flows back in the response.
    pub async fn search(&self, config: &SearchConfig, context: &Context) -> Result<SearchResult> {
        let mut result = self.get_search_results(config, context).await?;

        let item_ids: Vec<String> = result.items.iter().map(|item| item.id.clone()).collect();
        let config_snapshot = serde_json::to_value(config).unwrap_or(Value::Null);

        let history_id = SearchHistory::insert(
            &self.deps.pool,
            self.collection.id,
            config.for_person.as_deref(),
            &item_ids,
            &config_snapshot,
        )
        .await?;

        result.id = Some(history_id);
        Ok(result)
    }
}
