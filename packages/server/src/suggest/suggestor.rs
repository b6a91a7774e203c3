//! Compose suggestions from autocomplete, search and aggregation sources,
//! deduped by field-set equality.

use crate::aggregate::Aggregator;
use crate::deps::Deps;
use crate::error::Result;
use crate::models::Collection;
use crate::search::Searcher;
use crate::suggest::autocomplete::AutoCompletor;
use crate::suggest::types::{SuggestConfig, Suggestion};

pub struct Suggestor<'a> {
    deps: &'a Deps,
    organization_id: i64,
    config: &'a SuggestConfig,
}

fn merge(source: Vec<Suggestion>, accumulated: &mut Vec<Suggestion>) {
    for suggestion in source {
        if !accumulated.iter().any(|existing| existing.is_same(&suggestion)) {
            accumulated.push(suggestion);
        }
    }
}

impl<'a> Suggestor<'a> {
    pub fn new(deps: &'a Deps, organization_id: i64, config: &'a SuggestConfig) -> Self {
        Self {
            deps,
            organization_id,
            config,
        }
    }

    pub async fn suggest(&self) -> Result<Vec<Suggestion>> {
        let mut suggestions: Vec<Suggestion> = Vec::new();

        if let Some(autocomplete) = &self.config.autocomplete {
            let collection = Collection::get_or_create(
                &self.deps.pool,
                self.organization_id,
                &autocomplete.collection,
            )
            .await?;

            let completor = AutoCompletor::new(self.deps, &collection, &autocomplete.config);
            let items = completor.autocomplete().await?;

            let source: Vec<Suggestion> = items
                .into_iter()
                .map(|item| Suggestion {
                    suggestion_type: "autocomplete".to_string(),
                    aggregation_name: None,
                    item_id: Some(item.id),
                    fields: Some(item.fields),
                    score: Some(item.score),
                })
                .collect();
            merge(source, &mut suggestions);
        }

        if self.config.search.is_some() && suggestions.len() < self.config.limit {
            let search = self.config.search.as_ref().unwrap();
            let collection = Collection::get_or_create(
                &self.deps.pool,
                self.organization_id,
                &search.collection,
            )
            .await?;

            let searcher = Searcher::new(self.deps, &collection);
            let result = searcher
                .get_search_results(&search.config, &serde_json::Map::new())
                .await?;

            let source: Vec<Suggestion> = result
                .items
                .into_iter()
                .map(|item| Suggestion {
                    suggestion_type: "search".to_string(),
                    aggregation_name: None,
                    item_id: Some(item.id),
                    fields: Some(item.fields),
                    score: Some(item.score),
                })
                .collect();
            merge(source, &mut suggestions);
        }

        if self.config.aggregate.is_some() && suggestions.len() < self.config.limit {
            let aggregate = self.config.aggregate.as_ref().unwrap();
            let collection = Collection::get_or_create(
                &self.deps.pool,
                self.organization_id,
                &aggregate.collection,
            )
            .await?;

            let aggregator = Aggregator::new(self.deps, &collection, &aggregate.config)?;
            let results = aggregator.aggregate().await?;

            let mut source = Vec::new();
            for aggregation in results {
                for item in aggregation.items {
                    source.push(Suggestion {
                        suggestion_type: "aggregation".to_string(),
                        aggregation_name: Some(aggregation.aggregation.clone()),
                        item_id: None,
                        fields: Some(item),
                        score: Some(1.0),
                    });
                }
            }
            merge(source, &mut suggestions);
        }

        suggestions.truncate(self.config.limit);
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn suggestion(fields: serde_json::Value) -> Suggestion {
        Suggestion {
            suggestion_type: "search".into(),
            aggregation_name: None,
            item_id: None,
            fields: fields.as_object().cloned(),
            score: None,
        }
    }

    #[test]
    fn test_merge_dedupes_by_fields() {
        let mut accumulated = vec![suggestion(json!({ "make": "opel" }))];
        merge(
            vec![
                suggestion(json!({ "make": "opel" })),
                suggestion(json!({ "make": "bmw" })),
            ],
            &mut accumulated,
        );
        assert_eq!(accumulated.len(), 2);
    }
}
