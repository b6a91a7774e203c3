//! Shared service dependencies.

use std::sync::Arc;

use anyhow::Result;
use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::cache::{RedisCache, SafeCache, TemporalLock};
use crate::config::Settings;

/// Dependency container handed to every component: database pool, Redis
/// connection (index, cache, locks) and settings. Cheap to clone.
#[derive(Clone)]
pub struct Deps {
    pub pool: PgPool,
    pub redis: ConnectionManager,
    pub cache: SafeCache,
    pub settings: Arc<Settings>,
}

impl Deps {
    /// Connect to Postgres and Redis and run pending migrations.
    pub async fn connect(settings: Settings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&settings.postgres_connection_string)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let client = redis::Client::open(settings.redis_url())?;
        let redis = client.get_connection_manager().await?;
        let cache = SafeCache::new(Arc::new(RedisCache::new(redis.clone())));

        Ok(Self {
            pool,
            redis,
            cache,
            settings: Arc::new(settings),
        })
    }

    pub fn temporal_lock(&self) -> TemporalLock {
        TemporalLock::new(self.redis.clone())
    }
}
