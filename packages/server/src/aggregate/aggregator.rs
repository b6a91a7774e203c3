//! Prompt → candidate function schemas → LLM function call → topologically
//! ordered field expansion through nested searches → combinations product.

use futures::future::{join_all, BoxFuture, FutureExt};
use indexmap::IndexMap;
use llm_client::ToolDefinition;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::levels::execution_levels;
use super::schema::fields_to_schema;
use super::types::{
    AggregationConfig, AggregationFieldConfig, AggregationQuery, AggregationResult,
    HeavyAndLightLlmStats,
};
use crate::common::hash::{canonical_json, stable_hash};
use crate::common::scalar_to_string;
use crate::common::vars::replace_variables_in_filter;
use crate::deps::Deps;
use crate::error::{Error, Result};
use crate::llm::{get_llm, Llm};
use crate::models::Collection;
use crate::search::types::{
    CacheConfig, Clause, SearchConfig, SimilarConfig, TextClause,
};
use crate::search::Searcher;

const DEFAULT_CLASSIFICATION_PROMPT: &str = "\
Assign to Categories: Match the query to one or more of the most relevant categories from the list below, selecting up to three categories that best fit.

Categories:
{categories}

Instructions:
Identify the category names that best match the user's query and write just them. Don't say anything else.

User's Query:
{prompt}";

const DEFAULT_AGGREGATION_PROMPT: &str = "\
Call the correct function for the following query:
{prompt}";

pub struct Aggregator<'a> {
    deps: &'a Deps,
    collection: &'a Collection,
    config: &'a AggregationConfig,
    light_llm: Llm,
    heavy_llm: Llm,
}

fn listify(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

fn cartesian(possible: &[(String, Vec<Value>)]) -> Vec<Vec<(String, Value)>> {
    let mut combinations: Vec<Vec<(String, Value)>> = vec![Vec::new()];
    for (field, values) in possible {
        let mut next = Vec::new();
        for combination in &combinations {
            for value in values {
                let mut extended = combination.clone();
                extended.push((field.clone(), value.clone()));
                next.push(extended);
            }
        }
        combinations = next;
    }
    combinations
}

fn sort_key(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

impl<'a> Aggregator<'a> {
    pub fn new(
        deps: &'a Deps,
        collection: &'a Collection,
        config: &'a AggregationConfig,
    ) -> Result<Self> {
        let settings = &deps.settings;
        let light_llm = get_llm(
            settings,
            deps.cache.clone(),
            config
                .light_model
                .as_deref()
                .unwrap_or(&settings.aggregations_light_model),
        )?;
        let heavy_llm = get_llm(
            settings,
            deps.cache.clone(),
            config
                .heavy_model
                .as_deref()
                .unwrap_or(&settings.aggregations_heavy_model),
        )?;

        Ok(Self {
            deps,
            collection,
            config,
            light_llm,
            heavy_llm,
        })
    }

    /// Pick the aggregations the prompt fits, via the light model. A single
    /// configured aggregation skips the call.
    async fn matched_aggregations(&self) -> Result<Vec<&'a AggregationQuery>> {
        if self.config.aggregations.len() == 1 {
            return Ok(vec![&self.config.aggregations[0]]);
        }

        let categories = self
            .config
            .aggregations
            .iter()
            .map(|aggregation| {
                format!(
                    "name: {} description: {}",
                    aggregation.name,
                    aggregation.description.as_deref().unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let template = self
            .config
            .classification_prompt
            .as_deref()
            .unwrap_or(DEFAULT_CLASSIFICATION_PROMPT);
        let question = template
            .replace("{categories}", &categories)
            .replace("{prompt}", &self.config.prompt);

        let answer = self.light_llm.single_query(&question, None).await?;
        let normalized = answer.replace('\\', "").replace([',', '\n'], " ");

        info!(answer = %normalized, "classification result");

        let mut matched: Vec<&AggregationQuery> = Vec::new();
        for word in normalized.split_whitespace() {
            for aggregation in &self.config.aggregations {
                if aggregation.name == word.trim()
                    && !matched.iter().any(|m| m.name == aggregation.name)
                {
                    matched.push(aggregation);
                }
            }
        }

        matched.truncate(self.config.limit.max(1));
        Ok(matched)
    }

    fn tool_for(&self, aggregation: &AggregationQuery) -> ToolDefinition {
        let mut description = aggregation.description.clone().unwrap_or_default();
        if !aggregation.facts.is_empty() {
            description = format!(
                "{description}\nFacts:\n{}",
                aggregation.facts.join("\n")
            );
        }

        ToolDefinition::new(
            &aggregation.name,
            description,
            fields_to_schema(&aggregation.fields),
        )
    }

    /// Ask the heavy model for structured arguments: one call allowing any
    /// schema when a single result is wanted, otherwise one call per schema
    /// dispatched concurrently.
    async fn structured_queries(&self) -> Result<Vec<(String, Map<String, Value>)>> {
        let matched = self.matched_aggregations().await?;
        if matched.is_empty() {
            return Ok(Vec::new());
        }

        let tools: Vec<ToolDefinition> =
            matched.iter().map(|aggregation| self.tool_for(aggregation)).collect();

        let template = self
            .config
            .aggregation_prompt
            .as_deref()
            .unwrap_or(DEFAULT_AGGREGATION_PROMPT);
        let question = template.replace("{prompt}", &self.config.prompt);

        if self.config.limit <= 1 {
            let result = self
                .heavy_llm
                .function_query(&question, &tools, &self.config.files)
                .await?;
            return Ok(vec![result]);
        }

        let calls = tools.iter().map(|tool| {
            self.heavy_llm
                .function_query(&question, std::slice::from_ref(tool), &[])
        });
        join_all(calls).await.into_iter().collect()
    }

    fn sort_queries(&self, queries: &mut [(String, Map<String, Value>)]) {
        let Some(sort) = &self.config.sort else {
            return;
        };
        queries.sort_by(|(_, a), (_, b)| {
            let a = sort_key(a.get(&sort.field));
            let b = sort_key(b.get(&sort.field));
            a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
        });
        if sort.order == "desc" {
            queries.reverse();
        }
    }

    pub async fn aggregate(&self) -> Result<Vec<AggregationResult>> {
        let mut structured = self.structured_queries().await?;
        self.sort_queries(&mut structured);

        debug!(count = structured.len(), "structured queries");

        let mut results = Vec::new();

        for (name, arguments) in &structured {
            let aggregation = self
                .config
                .aggregations
                .iter()
                .find(|a| &a.name == name)
                .ok_or_else(|| {
                    Error::LlmBadResponse(format!("tool call names unknown aggregation: {name}"))
                })?;

            let levels = execution_levels(&aggregation.fields)?;

            let mut items: Vec<Map<String, Value>> = Vec::new();
            self.generate_combinations(
                arguments,
                &aggregation.fields,
                &levels,
                0,
                Map::new(),
                &mut items,
            )
            .await?;

            // Literal-valued fields are injected after expansion; the model
            // is never asked for them.
            for (field, config) in &aggregation.fields {
                if let Some(value) = &config.value {
                    for item in &mut items {
                        item.insert(field.clone(), value.clone());
                    }
                }
            }

            results.push(AggregationResult {
                aggregation: name.clone(),
                items,
                llm_stats: HeavyAndLightLlmStats {
                    heavy_llm_stats: self.heavy_llm.stats(),
                    light_llm_stats: self.light_llm.stats(),
                },
            });
        }

        Ok(results)
    }

    /// Expand one level: collect possible values per field (nested searches
    /// for `item` fields), take the Cartesian product, recurse with each
    /// combination as the next context.
    fn generate_combinations<'b>(
        &'b self,
        structured: &'b Map<String, Value>,
        fields: &'b IndexMap<String, AggregationFieldConfig>,
        levels: &'b [Vec<String>],
        level_index: usize,
        context: Map<String, Value>,
        out: &'b mut Vec<Map<String, Value>>,
    ) -> BoxFuture<'b, Result<()>> {
        async move {
            if level_index >= levels.len() {
                out.push(context);
                return Ok(());
            }

            let mut possible: Vec<(String, Vec<Value>)> = Vec::new();

            for field in &levels[level_index] {
                let Some(field_config) = fields.get(field) else {
                    continue;
                };

                if field_config.field_type == "item" {
                    let Some(search) = &field_config.search else {
                        continue;
                    };
                    let value = context
                        .get(field)
                        .or_else(|| structured.get(field))
                        .cloned()
                        .filter(|v| !v.is_null());
                    let Some(value) = value else {
                        continue;
                    };

                    let mut values = Vec::new();
                    for candidate in listify(value) {
                        let candidate = scalar_to_string(&candidate);
                        if candidate.is_empty() {
                            continue;
                        }
                        values.extend(
                            self.expand_item_field(search, &candidate, &context).await?,
                        );
                    }

                    if values.is_empty() {
                        // An unexpandable value drops this combination branch.
                        debug!(field = %field, "item expansion produced no values");
                    }
                    possible.push((field.clone(), values));
                } else {
                    let value = context
                        .get(field)
                        .or_else(|| structured.get(field))
                        .cloned()
                        .unwrap_or(Value::Null);
                    possible.push((field.clone(), vec![value]));
                }
            }

            for combination in cartesian(&possible) {
                let mut next = context.clone();
                for (field, value) in combination {
                    match value {
                        Value::Null => {}
                        Value::String(s) if s.is_empty() => {}
                        value => {
                            next.insert(field, value);
                        }
                    }
                }
                self.generate_combinations(
                    structured,
                    fields,
                    levels,
                    level_index + 1,
                    next,
                    out,
                )
                .await?;
            }

            Ok(())
        }
        .boxed()
    }

    /// Resolve one candidate value of an `item` field through a nested
    /// search; every matched item contributes its export field.
    async fn expand_item_field(
        &self,
        search: &super::types::ItemSearchConfig,
        value: &str,
        context: &Map<String, Value>,
    ) -> Result<Vec<Value>> {
        let filter =
            replace_variables_in_filter(&Value::Object(search.filter.clone()), context);
        let Value::Object(filter) = filter else {
            return Ok(Vec::new());
        };

        let cache_key = stable_hash(&format!(
            "{}_{}_{}",
            canonical_json(&Value::Object(filter.clone())),
            value,
            search.limit,
        ));

        let search_config = SearchConfig {
            cache: Some(CacheConfig {
                expire: 3600,
                key: Some(cache_key),
            }),
            filter,
            similar: Some(SimilarConfig {
                of: vec![Clause::Text(TextClause {
                    text: value.to_string(),
                    weight: 1.0,
                    distance_function: search.distance_function.clone(),
                    preprocess: None,
                    score_threshold: None,
                })],
            }),
            limit: search.limit,
            ..Default::default()
        };

        let searcher = Searcher::new(self.deps, self.collection);
        let result = searcher
            .get_search_results(&search_config, &Map::new())
            .await?;

        Ok(result
            .items
            .into_iter()
            .filter_map(|item| item.fields.get(&search.export).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cartesian_product_order() {
        let combos = cartesian(&[
            ("a".into(), vec![json!(1), json!(2)]),
            ("b".into(), vec![json!("x"), json!("y")]),
        ]);
        assert_eq!(combos.len(), 4);
        assert_eq!(combos[0], vec![("a".into(), json!(1)), ("b".into(), json!("x"))]);
        assert_eq!(combos[3], vec![("a".into(), json!(2)), ("b".into(), json!("y"))]);
    }

    #[test]
    fn test_cartesian_empty_values_drop_everything() {
        let combos = cartesian(&[
            ("a".into(), vec![json!(1)]),
            ("b".into(), Vec::new()),
        ]);
        assert!(combos.is_empty());
    }

    #[test]
    fn test_cartesian_no_fields_is_one_empty_combination() {
        let combos = cartesian(&[]);
        assert_eq!(combos.len(), 1);
        assert!(combos[0].is_empty());
    }

    #[test]
    fn test_sort_key_coercion() {
        assert_eq!(sort_key(Some(&json!(3))), 3.0);
        assert_eq!(sort_key(Some(&json!("2011"))), 2011.0);
        assert_eq!(sort_key(Some(&json!("opel"))), 0.0);
        assert_eq!(sort_key(None), 0.0);
    }

    #[test]
    fn test_listify() {
        assert_eq!(listify(json!(["a", "b"])).len(), 2);
        assert_eq!(listify(json!("a")).len(), 1);
    }
}
