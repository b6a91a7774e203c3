//! Clause list → vector / text / filter streams.

use serde_json::Value;
use tracing::debug;

use crate::common::time::datetime_from_now;
use crate::common::vars::{replace_variables_in_filter, replace_variables_in_string, Context};
use crate::deps::Deps;
use crate::embeddings::{embedder_for_model, Embedder};
use crate::error::{Error, Result};
use crate::llm::get_llm;
use crate::models::{Collection, Event, Item, SearchHistory};
use crate::search::types::{
    Clause, ParsedQueries, Preprocess, TextQuery, VectorQuery,
};

pub struct QueryParser<'a> {
    deps: &'a Deps,
    collection: &'a Collection,
    context: &'a Context,
}

impl<'a> QueryParser<'a> {
    pub fn new(deps: &'a Deps, collection: &'a Collection, context: &'a Context) -> Self {
        Self {
            deps,
            collection,
            context,
        }
    }

    fn embedder(&self) -> Result<Embedder> {
        let model = self.collection.config.embeddings_model.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "collection {} has no embeddings model configured",
                self.collection.name
            ))
        })?;
        Ok(embedder_for_model(
            &self.deps.settings,
            self.deps.cache.clone(),
            model,
        ))
    }

    async fn preprocess(&self, preprocess: &Preprocess, text: &str) -> Result<String> {
        let model = preprocess
            .model
            .as_deref()
            .unwrap_or(&self.deps.settings.default_llm_provider_and_model);
        let llm = get_llm(&self.deps.settings, self.deps.cache.clone(), model)?;

        let rewritten = llm
            .single_query(
                &format!(
                    "{}. The text is the following: '{}'",
                    preprocess.prompt, text
                ),
                None,
            )
            .await?;

        debug!(original = %text, rewritten = %rewritten, "preprocessed query text");
        Ok(rewritten)
    }

    /// Turn the clause list into the three uniform query streams.
    pub async fn parse(&self, clauses: &[Clause]) -> Result<ParsedQueries> {
        let mut parsed = ParsedQueries::default();

        for clause in clauses {
            match clause {
                Clause::Text(text) => {
                    let mut query = text.text.clone();
                    if let Some(preprocess) = &text.preprocess {
                        query = self.preprocess(preprocess, &query).await?;
                    }
                    parsed.texts.push(TextQuery {
                        query,
                        weight: text.weight,
                        distance_function: text.distance_function.clone(),
                        score_threshold: text.score_threshold,
                    });
                }

                Clause::Prompt(prompt) => {
                    let Some(resolved) = self.resolve_prompt(&prompt.prompt) else {
                        continue;
                    };
                    let resolved = match &prompt.preprocess {
                        Some(preprocess) => self.preprocess(preprocess, &resolved).await?,
                        None => resolved,
                    };
                    let vector = self.embedder()?.embed_one(&resolved).await?;
                    parsed.vectors.push(VectorQuery {
                        vector,
                        weight: prompt.weight,
                    });
                }

                Clause::Embeddings(embeddings) => {
                    parsed.vectors.push(VectorQuery {
                        vector: embeddings.embeddings.clone(),
                        weight: embeddings.weight,
                    });
                }

                Clause::SimilarToFields(fields) => {
                    let vector = self
                        .embedder()?
                        .embed_fields(&fields.similar_to_fields)
                        .await?;
                    parsed.vectors.push(VectorQuery {
                        vector,
                        weight: fields.weight,
                    });
                }

                Clause::Item(item_clause) => {
                    let external_ids = item_clause.item.to_vec();
                    let items = Item::get_by_external_ids(
                        &self.deps.pool,
                        self.collection.id,
                        &external_ids,
                    )
                    .await?;

                    for external_id in &external_ids {
                        if !items.iter().any(|i| &i.external_id == external_id) {
                            return Err(Error::ItemNotFound {
                                item_id: external_id.clone(),
                                collection: self.collection.name.clone(),
                            });
                        }
                    }

                    for item in items {
                        if let Some(vector) = item.vector() {
                            parsed.vectors.push(VectorQuery {
                                vector,
                                weight: item_clause.weight,
                            });
                        }
                    }
                }

                Clause::Person(person) => {
                    let since = datetime_from_now(&person.time)?;
                    let interactions = Event::recent_weighted_items(
                        &self.deps.pool,
                        self.collection.id,
                        &person.person.to_vec(),
                        since,
                        person.limit as i64,
                    )
                    .await?;

                    let external_ids: Vec<String> =
                        interactions.iter().map(|(id, _)| id.clone()).collect();
                    let items = Item::get_by_external_ids(
                        &self.deps.pool,
                        self.collection.id,
                        &external_ids,
                    )
                    .await?;

                    for (external_id, event_weight) in interactions {
                        let Some(item) =
                            items.iter().find(|i| i.external_id == external_id)
                        else {
                            continue;
                        };
                        if let Some(vector) = item.vector() {
                            parsed.vectors.push(VectorQuery {
                                vector,
                                weight: event_weight * person.weight,
                            });
                        }
                    }
                }

                Clause::Fields(fields) => {
                    let substituted = replace_variables_in_filter(
                        &Value::Object(fields.fields.clone()),
                        self.context,
                    );
                    if let Value::Object(map) = substituted {
                        parsed.filters.push(map);
                    }
                }

                // Produces item ids, not queries; only meaningful in
                // exclude lists.
                Clause::Recommendations(_) => {}
            }
        }

        Ok(parsed)
    }

    /// Resolve the item ids a clause list refers to (exclude lists).
    pub async fn item_ids(&self, clauses: &[Clause]) -> Result<Vec<String>> {
        let mut ids = Vec::new();

        for clause in clauses {
            match clause {
                Clause::Item(item_clause) => {
                    ids.extend(item_clause.item.to_vec());
                }

                Clause::Person(person) => {
                    let since = datetime_from_now(&person.time)?;
                    let interactions = Event::recent_weighted_items(
                        &self.deps.pool,
                        self.collection.id,
                        &person.person.to_vec(),
                        since,
                        person.limit as i64,
                    )
                    .await?;
                    ids.extend(interactions.into_iter().map(|(id, _)| id));
                }

                Clause::Recommendations(recommendations) => {
                    let since = datetime_from_now(&recommendations.time)?;
                    let served = SearchHistory::served_item_ids(
                        &self.deps.pool,
                        self.collection.id,
                        &recommendations.person_recommendations,
                        since,
                        recommendations.limit as i64,
                    )
                    .await?;
                    ids.extend(served);
                }

                _ => {}
            }
        }

        Ok(ids)
    }

    /// Substitute `$name` references in a prompt. A prompt that is itself an
    /// unresolved reference contributes nothing.
    fn resolve_prompt(&self, prompt: &str) -> Option<String> {
        if let Some(resolved) = crate::common::vars::resolve_reference(prompt, self.context) {
            return match resolved {
                Value::Null => None,
                Value::String(s) => Some(s),
                other => Some(crate::common::scalar_to_string(&other)),
            };
        }

        let substituted = replace_variables_in_string(prompt, self.context);
        Some(substituted)
    }
}
