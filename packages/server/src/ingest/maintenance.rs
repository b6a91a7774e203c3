//! Background maintenance: dirty-item refresh, retention cleanups, index
//! reconciliation. Every job is idempotent and guarded by a temporal lock,
//! so at most one runner works per lock name and losing the race is free.

use anyhow::Result as AnyResult;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::common::time::datetime_from_now;
use crate::deps::Deps;
use crate::embeddings::embedder_for_model;
use crate::error::Result;
use crate::index::indexer_for;
use crate::models::{Collection, Event, Item, SearchHistory};

const DIRTY_BATCH: i64 = 500;
const MAINTENANCE_LOCK_TTL: u64 = 3600 * 12;

/// Recompute embeddings and reindex one batch of dirty items, clearing the
/// flags with the update.
pub async fn refresh_items(deps: &Deps, collection: &Collection, items: &[Item]) -> Result<()> {
    if let Some(model) = &collection.config.embeddings_model {
        let embeddings_dirty: Vec<Item> = items
            .iter()
            .filter(|item| item.is_embeddings_dirty)
            .cloned()
            .collect();

        if !embeddings_dirty.is_empty() {
            let embedder = embedder_for_model(&deps.settings, deps.cache.clone(), model);
            let vectors = embedder.embed_items(&embeddings_dirty).await?;

            for (item, vector) in embeddings_dirty.iter().zip(&vectors) {
                item.store_vector(&deps.pool, Some(vector.as_slice())).await?;
            }
        }
    }

    let to_index: Vec<Item> = items
        .iter()
        .filter(|item| item.is_index_dirty || item.is_embeddings_dirty)
        .cloned()
        .collect();

    if !to_index.is_empty() {
        // Reindex with fresh rows so the vectors written above are carried.
        let ids: Vec<i64> = to_index.iter().map(|item| item.id).collect();
        let fresh = Item::get_by_ids(&deps.pool, &ids).await?;

        let indexer = indexer_for(deps, collection)?;
        indexer.index_items(Some(&fresh)).await?;

        Item::clear_index_dirty(&deps.pool, &ids).await?;
    }

    Ok(())
}

/// Refresh every dirty item of a collection, in batches.
pub async fn refresh_dirty(deps: &Deps, collection: &Collection) -> Result<()> {
    loop {
        let batch = Item::dirty_batch(&deps.pool, collection.id, DIRTY_BATCH).await?;
        if batch.is_empty() {
            return Ok(());
        }

        info!(
            collection = %collection.name,
            count = batch.len(),
            "refreshing dirty items"
        );
        refresh_items(deps, collection, &batch).await?;
    }
}

/// The periodic per-collection maintenance pass, guarded by a temporal
/// lock. Failures leave the dirty flags set; the next pass retries.
pub async fn maintain_collection(deps: &Deps, collection: &Collection) -> Result<()> {
    let lock = deps.temporal_lock();
    let lock_name = format!("maintain-collection:{}", collection.id);

    if !lock.acquire(&lock_name, MAINTENANCE_LOCK_TTL).await {
        info!(collection = %collection.name, "maintenance lock held elsewhere, skipping");
        return Ok(());
    }

    let result = refresh_dirty(deps, collection).await;
    lock.release(&lock_name).await;
    result
}

pub async fn maintain_all_collections(deps: &Deps) -> Result<()> {
    for collection in Collection::all(&deps.pool).await? {
        if let Err(e) = maintain_collection(deps, &collection).await {
            error!(collection = %collection.name, error = %e, "maintenance failed");
        }
    }
    Ok(())
}

/// Retention: drop old events, old search history, lone-person events and
/// the per-(person, type) overflow.
pub async fn cleanup_retention(deps: &Deps) -> Result<()> {
    let settings = &deps.settings;

    let cutoff = datetime_from_now(&settings.events_cleanup_after)?;
    let deleted = Event::cleanup_older_than(&deps.pool, cutoff).await?;
    info!(deleted, "events retention cleanup");

    let cutoff = datetime_from_now(&settings.search_history_cleanup_after)?;
    let deleted = SearchHistory::cleanup_older_than(&deps.pool, cutoff).await?;
    info!(deleted, "search history retention cleanup");

    let cutoff = datetime_from_now(&settings.events_cleanup_lone_events_after)?;
    let deleted = Event::cleanup_lone_person_events(
        &deps.pool,
        cutoff,
        settings.events_cleanup_lone_events_min_count,
    )
    .await?;
    info!(deleted, "lone events cleanup");

    let deleted = Event::cleanup_max_per_person_and_type(
        &deps.pool,
        settings.events_cleanup_max_per_person_and_type,
    )
    .await?;
    info!(deleted, "per person/type events cleanup");

    Ok(())
}

/// Wire the periodic jobs: dirty-item maintenance, retention cleanups and
/// orphaned-index reconciliation.
pub async fn start_scheduler(deps: Deps) -> AnyResult<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let maintain_deps = deps.clone();
    let maintain_job = Job::new_async("0 */5 * * * *", move |_uuid, _lock| {
        let deps = maintain_deps.clone();
        Box::pin(async move {
            if let Err(e) = maintain_all_collections(&deps).await {
                error!(error = %e, "collection maintenance task failed");
            }
        })
    })?;
    scheduler.add(maintain_job).await?;

    let retention_deps = deps.clone();
    let retention_job = Job::new_async("0 0 3 * * *", move |_uuid, _lock| {
        let deps = retention_deps.clone();
        Box::pin(async move {
            let lock = deps.temporal_lock();
            if !lock.acquire("cleanup-retention", 3600).await {
                return;
            }
            if let Err(e) = cleanup_retention(&deps).await {
                error!(error = %e, "retention cleanup task failed");
            }
            lock.release("cleanup-retention").await;
        })
    })?;
    scheduler.add(retention_job).await?;

    let index_deps = deps.clone();
    let index_job = Job::new_async("0 30 4 * * *", move |_uuid, _lock| {
        let deps = index_deps.clone();
        Box::pin(async move {
            let lock = deps.temporal_lock();
            if !lock.acquire("cleanup-indexes", 3600).await {
                return;
            }
            if let Err(e) = crate::index::cleanup_all(&deps).await {
                error!(error = %e, "index cleanup task failed");
            }
            lock.release("cleanup-indexes").await;
        })
    })?;
    scheduler.add(index_job).await?;

    scheduler.start().await?;

    info!("scheduled tasks started (maintenance every 5 minutes, cleanups nightly)");
    Ok(scheduler)
}
