//! Bulk ingest of items and events.
//!
//! Upserts merge fields shallowly, recompute the description and its
//! content hash, and mark dirty flags for the maintenance pass to pick up.

pub mod maintenance;

use chrono::Duration;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::info;

use crate::common::hash::description_hash;
use crate::deps::Deps;
use crate::error::Result;
use crate::llm::get_llm;
use crate::models::item::DescriptionPreprocess;
use crate::models::items_field::best_fit_value_type;
use crate::models::persons_field::PersonsField;
use crate::models::{
    ns_id, Collection, Event, Item, ItemsField, Person, SearchHistory, SimpleEvent, SimpleItem,
    SimplePerson,
};

/// How far back an event looks for the search that served its item.
const RELATED_SEARCH_WINDOW_MINUTES: i64 = 36_000;

/// Upsert a batch of items, in ingest-sized chunks. With `sync`, dirty
/// items are refreshed in-request instead of waiting for maintenance.
pub async fn ingest_items(
    deps: &Deps,
    collection: &Collection,
    items: &[SimpleItem],
    sync: bool,
) -> Result<()> {
    for chunk in items.chunks(deps.settings.ingest_batch_size) {
        upsert_chunk(deps, collection, chunk).await?;
    }

    if sync {
        maintenance::refresh_dirty(deps, collection).await?;
    }

    Ok(())
}

async fn preprocess_description(
    deps: &Deps,
    preprocess: &DescriptionPreprocess,
    description: &str,
) -> Result<String> {
    let model = preprocess
        .model
        .as_deref()
        .unwrap_or(&deps.settings.default_llm_provider_and_model);
    let llm = get_llm(&deps.settings, deps.cache.clone(), model)?;
    llm.single_query(
        &format!(
            "{}. The text is the following: '{}'",
            preprocess.prompt, description
        ),
        None,
    )
    .await
}

async fn upsert_chunk(deps: &Deps, collection: &Collection, items: &[SimpleItem]) -> Result<()> {
    let external_ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
    let existing = Item::get_by_external_ids(&deps.pool, collection.id, &external_ids).await?;

    let mut field_types: IndexMap<String, &'static str> = IndexMap::new();

    for item in items {
        for (name, value) in &item.fields {
            field_types
                .entry(name.clone())
                .or_insert_with(|| best_fit_value_type(value));
        }

        let existing_item = existing.iter().find(|e| e.external_id == item.id);

        let mut merged_fields: Map<String, Value> = existing_item
            .map(|e| e.fields_map())
            .unwrap_or_default();
        for (name, value) in &item.fields {
            merged_fields.insert(name.clone(), value.clone());
        }

        let mut description = item.base_description(&merged_fields);
        if let Some(preprocess) = &item.description_preprocess {
            description = preprocess_description(deps, preprocess, &description).await?;
        }
        let new_hash = description_hash(&description);

        let scores: Map<String, Value> = item
            .scores
            .iter()
            .map(|(name, value)| (name.clone(), Value::from(*value)))
            .collect();

        match existing_item {
            Some(existing_item) => {
                let content_changed =
                    existing_item.description_hash.as_deref() != Some(new_hash.as_str());

                sqlx::query(
                    "UPDATE item SET
                        fields = $2, scores = $3, description = $4, description_hash = $5,
                        is_index_dirty = TRUE,
                        is_embeddings_dirty = is_embeddings_dirty OR $6,
                        last_update = now()
                     WHERE id = $1",
                )
                .bind(existing_item.id)
                .bind(Value::Object(merged_fields))
                .bind(Value::Object(scores))
                .bind(&description)
                .bind(&new_hash)
                .bind(content_changed)
                .execute(&deps.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    "INSERT INTO item
                        (id, collection_id, external_id, fields, scores, description,
                         description_hash, is_index_dirty, is_embeddings_dirty)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, TRUE)
                     ON CONFLICT (collection_id, external_id) DO NOTHING",
                )
                .bind(ns_id())
                .bind(collection.id)
                .bind(&item.id)
                .bind(Value::Object(merged_fields))
                .bind(Value::Object(scores))
                .bind(&description)
                .bind(&new_hash)
                .execute(&deps.pool)
                .await?;
            }
        }
    }

    ItemsField::create_missing(&deps.pool, collection.id, &field_types).await?;

    info!(
        collection = %collection.name,
        count = items.len(),
        "upserted items"
    );
    Ok(())
}

/// Delete items by external id, in delete-sized chunks.
pub async fn delete_items(
    deps: &Deps,
    collection: &Collection,
    external_ids: &[String],
) -> Result<u64> {
    let mut deleted = 0;
    for chunk in external_ids.chunks(deps.settings.delete_batch_size) {
        deleted += Item::delete_by_external_ids(&deps.pool, collection.id, chunk).await?;
    }
    Ok(deleted)
}

/// Upsert persons, tracking field metadata like items do.
pub async fn ingest_persons(
    deps: &Deps,
    collection: &Collection,
    persons: &[SimplePerson],
) -> Result<()> {
    let mut field_types: IndexMap<String, &'static str> = IndexMap::new();

    for person in persons {
        for (name, value) in &person.fields {
            field_types
                .entry(name.clone())
                .or_insert_with(|| best_fit_value_type(value));
        }
        Person::upsert(&deps.pool, collection.id, person).await?;
    }

    PersonsField::create_missing(&deps.pool, collection.id, &field_types).await?;
    Ok(())
}

/// Append events; persons and placeholder items are upserted implicitly and
/// each event back-references the latest search that served its item.
pub async fn ingest_events(
    deps: &Deps,
    collection: &Collection,
    events: &[SimpleEvent],
) -> Result<()> {
    let since = chrono::Utc::now() - Duration::minutes(RELATED_SEARCH_WINDOW_MINUTES);

    for event in events {
        ingest_persons(
            deps,
            collection,
            &[SimplePerson {
                id: event.person.clone(),
                fields: Map::new(),
            }],
        )
        .await?;

        // Placeholder item rows so events can arrive before their items;
        // never overwrites an ingested item.
        sqlx::query(
            "INSERT INTO item (id, collection_id, external_id, is_index_dirty, is_embeddings_dirty)
             VALUES ($1, $2, $3, TRUE, TRUE)
             ON CONFLICT (collection_id, external_id) DO NOTHING",
        )
        .bind(ns_id())
        .bind(collection.id)
        .bind(&event.item)
        .execute(&deps.pool)
        .await?;

        let related_search_id = SearchHistory::latest_serving(
            &deps.pool,
            collection.id,
            &event.person,
            &event.item,
            since,
        )
        .await?;

        Event::insert(&deps.pool, collection.id, event, related_search_id).await?;
    }

    info!(
        collection = %collection.name,
        count = events.len(),
        "ingested events"
    );
    Ok(())
}
