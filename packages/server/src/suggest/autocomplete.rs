//! LLM-grounded autocomplete: propose continuations of the query, then
//! ground each one in a real item through a narrow search.

use serde_json::Map;
use tracing::debug;

use super::types::{AutoCompleteConfig, AutoCompleteContext};
use crate::deps::Deps;
use crate::error::Result;
use crate::llm::get_llm;
use crate::models::Collection;
use crate::search::types::{
    Clause, RankConfig, SearchConfig, SearchItem, SimilarConfig, TextClause,
};
use crate::search::Searcher;

const SUGGESTIONS_LIMIT: usize = 10;

const SYSTEM_PROMPT: &str = "\
You are an expert suggestion system. Write {limit} Autocomplete suggestions for the query based on the context, each suggestion should start with the user query. Finish any half-written query.
One suggestion on each line, dont write the numbers of items! try to guess the next query!";

const PROMPT_TEMPLATE: &str = "\
Context:
{context}

Query:
{query}

{info}";

pub struct AutoCompletor<'a> {
    deps: &'a Deps,
    collection: &'a Collection,
    config: &'a AutoCompleteConfig,
}

impl<'a> AutoCompletor<'a> {
    pub fn new(deps: &'a Deps, collection: &'a Collection, config: &'a AutoCompleteConfig) -> Self {
        Self {
            deps,
            collection,
            config,
        }
    }

    /// Render one context's snippet: matched items, one per line.
    async fn context_snippet(&self, context: &AutoCompleteContext) -> Result<String> {
        if context.context_type != "items" {
            return Ok(String::new());
        }

        let searcher = Searcher::new(self.deps, self.collection);
        let result = searcher
            .get_search_results(&context.search, &Map::new())
            .await?;

        let lines: Vec<String> = result
            .items
            .iter()
            .filter_map(|item| item.description.clone())
            .collect();

        let title = context.context_title.as_deref().unwrap_or("items");
        Ok(format!("{title}:\n{}", lines.join("\n")))
    }

    async fn llm_suggestions(&self) -> Result<Vec<String>> {
        let mut snippets = Vec::new();
        for context in &self.config.contexts {
            let snippet = self.context_snippet(context).await?;
            if !snippet.is_empty() {
                snippets.push(snippet);
            }
        }

        let prompt = PROMPT_TEMPLATE
            .replace("{context}", &snippets.join("\n\n"))
            .replace("{query}", &self.config.query)
            .replace("{info}", self.config.extra_info.as_deref().unwrap_or_default());

        let model = self
            .config
            .model
            .as_deref()
            .unwrap_or(&self.deps.settings.default_llm_provider_and_model);
        let llm = get_llm(&self.deps.settings, self.deps.cache.clone(), model)?;

        let system_prompt = SYSTEM_PROMPT.replace("{limit}", &SUGGESTIONS_LIMIT.to_string());
        let answer = llm
            .single_query(&prompt, Some(&[system_prompt]))
            .await?;

        let suggestions: Vec<String> = answer
            .replace("\n\n", "\n")
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .take(SUGGESTIONS_LIMIT)
            .collect();

        debug!(count = suggestions.len(), "LLM autocomplete candidates");
        Ok(suggestions)
    }

    /// Propose continuations and ground each in a real item; ungrounded
    /// candidates and duplicate items drop out.
    pub async fn autocomplete(&self) -> Result<Vec<SearchItem>> {
        let candidates = self.llm_suggestions().await?;

        let mut valid_items: Vec<SearchItem> = Vec::new();
        let mut seen_ids: Vec<String> = Vec::new();

        for candidate in candidates {
            let config = SearchConfig {
                similar: Some(SimilarConfig {
                    of: vec![Clause::Text(TextClause {
                        text: candidate,
                        weight: 1.0,
                        distance_function: None,
                        preprocess: None,
                        score_threshold: None,
                    })],
                }),
                rank: Some(RankConfig {
                    score_function: Some("score + score.popularity * 0.5".to_string()),
                    topn: Some(20),
                    randomize: false,
                }),
                limit: 1,
                cache: None,
                ..Default::default()
            };

            let searcher = Searcher::new(self.deps, self.collection);
            let result = searcher.get_search_results(&config, &Map::new()).await?;

            for item in result.items {
                if seen_ids.contains(&item.id) {
                    continue;
                }
                seen_ids.push(item.id.clone());
                valid_items.push(item);
            }
        }

        Ok(valid_items)
    }
}
