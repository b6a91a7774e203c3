//! External text+vector index backend in Redis (RediSearch).
//!
//! One index per collection over HASH documents `d:<collection>:<item>`.
//! Documents carry the stemmed+raw description, the item's content hash,
//! the external id, the vector and one normalized scalar per field.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

use super::redis_filters::{build_redis_filter, build_text_query};
use super::{normalize_field, IndexHit, IndexSearch, Indexer};
use crate::common::value_strings;
use crate::deps::Deps;
use crate::error::{Error, Result};
use crate::models::{Collection, Item, ItemsField};
use crate::stemmer::stem;

const INDEX_CHUNK: usize = 500;
const DELETE_CHUNK: usize = 100;

pub struct RedisIndexer {
    deps: Deps,
    collection: Collection,
    index_name: String,
    doc_prefix: String,
}

fn doc_prefix_of(collection_id: i64) -> String {
    format!("d:{collection_id}:")
}

impl RedisIndexer {
    pub fn new(deps: Deps, collection: Collection) -> Self {
        let index_name = format!("collection_{}", collection.id);
        let doc_prefix = doc_prefix_of(collection.id);
        Self {
            deps,
            collection,
            index_name,
            doc_prefix,
        }
    }

    fn conn(&self) -> ConnectionManager {
        self.deps.redis.clone()
    }

    fn vector_size(&self) -> usize {
        self.collection.vector_size().unwrap_or(0)
    }

    async fn index_exists(&self) -> bool {
        let mut conn = self.conn();
        redis::cmd("FT.INFO")
            .arg(&self.index_name)
            .query_async::<redis::Value>(&mut conn)
            .await
            .is_ok()
    }

    async fn drop_index(&self) {
        let mut conn = self.conn();
        let _ = redis::cmd("FT.DROPINDEX")
            .arg(&self.index_name)
            .query_async::<redis::Value>(&mut conn)
            .await;
    }

    async fn create_index(&self) -> Result<()> {
        let fields = ItemsField::of_collection(&self.deps.pool, self.collection.id).await?;

        let mut cmd = redis::cmd("FT.CREATE");
        cmd.arg(&self.index_name)
            .arg("ON")
            .arg("HASH")
            .arg("PREFIX")
            .arg(1)
            .arg(&self.doc_prefix)
            .arg("SCHEMA")
            .arg("description")
            .arg("TEXT")
            .arg("NOSTEM")
            .arg("_external_id")
            .arg("TAG");

        let vector_size = self.vector_size();
        if vector_size > 0 {
            cmd.arg("embedding")
                .arg("VECTOR")
                .arg("FLAT")
                .arg(6)
                .arg("TYPE")
                .arg("FLOAT32")
                .arg("DIM")
                .arg(vector_size)
                .arg("DISTANCE_METRIC")
                .arg("COSINE");
        }

        for field in &fields {
            if field.field_name.starts_with('_') {
                continue;
            }
            let name = normalize_field(&field.field_name);
            match field.field_type.as_str() {
                "number" => {
                    cmd.arg(name).arg("NUMERIC");
                }
                // Booleans are stored as 1/0 tags.
                _ => {
                    cmd.arg(name).arg("TAG").arg("SEPARATOR").arg(",");
                }
            }
        }

        let mut conn = self.conn();
        cmd.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        scan_keys(&mut self.conn(), pattern).await
    }

    async fn index_chunk(&self, items: &[Item]) -> Result<()> {
        let vector_size = self.vector_size();
        let stemmer = &self.collection.config.stemmer;

        let mut pipe = redis::pipe();
        for item in items {
            let raw_description = item.description.clone().unwrap_or_default();
            let stemmed = stem(stemmer, &raw_description);

            let key = format!("{}{}", self.doc_prefix, item.id);
            let mut cmd = redis::cmd("HSET");
            cmd.arg(&key)
                .arg("description")
                .arg(format!("{stemmed} - {raw_description}"))
                .arg("_hash")
                .arg(item.content_hash())
                .arg("_external_id")
                .arg(&item.external_id);

            if vector_size > 0 {
                let vector = item
                    .vector()
                    .filter(|v| v.len() == vector_size)
                    .unwrap_or_else(|| vec![0.0; vector_size]);
                cmd.arg("embedding").arg(vector_bytes(&vector));
            }

            for (name, value) in item.fields_map() {
                if name.starts_with('_') {
                    continue;
                }
                let rendered = match &value {
                    serde_json::Value::Bool(true) => "1".to_string(),
                    serde_json::Value::Bool(false) => "0".to_string(),
                    serde_json::Value::Array(_) => value_strings(&value).join(","),
                    other => crate::common::scalar_to_string(other),
                };
                cmd.arg(normalize_field(&name)).arg(rendered);
            }

            pipe.add_command(cmd).ignore();
        }

        let mut conn = self.conn();
        pipe.query_async::<()>(&mut conn).await?;

        info!(
            collection = %self.collection.name,
            count = items.len(),
            "indexed items"
        );
        Ok(())
    }

    fn build_full_query(&self, request: &IndexSearch) -> Result<String> {
        if let Some(raw) = &request.raw_query {
            return Ok(raw.clone());
        }

        let mut parts: Vec<String> = Vec::new();

        if let Some(filters) = &request.filters {
            if !filters.is_empty() {
                parts.push(build_redis_filter(filters));
            }
        }

        if let Some(text_query) = &request.text_query {
            let stemmed = stem(&self.collection.config.stemmer, text_query);
            debug!(query = %stemmed, "text search query");
            parts.push(build_text_query(&stemmed));
        }

        for external_id in &request.exclude_external_ids {
            parts.push(format!("-@_external_id:{{{external_id}}}"));
        }

        parts.retain(|p| !p.is_empty());
        if parts.is_empty() {
            parts.push("*".to_string());
        }

        let filters_query = parts.join(" ");

        if let Some(vector) = &request.vector {
            let expected = self.vector_size();
            if vector.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    got: vector.len(),
                });
            }
            Ok(format!(
                "({filters_query})=>[KNN {} @embedding $vec AS vector_score]",
                request.limit
            ))
        } else {
            Ok(format!("({filters_query})"))
        }
    }
}

fn vector_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

async fn scan_keys(conn: &mut ConnectionManager, pattern: &str) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut cursor: u64 = 0;

    loop {
        let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(500)
            .query_async(conn)
            .await?;

        keys.extend(batch);
        cursor = next;
        if cursor == 0 {
            break;
        }
    }

    Ok(keys)
}

async fn delete_keys(conn: &mut ConnectionManager, keys: &[String]) -> Result<()> {
    for chunk in keys.chunks(DELETE_CHUNK) {
        redis::cmd("DEL")
            .arg(chunk)
            .query_async::<()>(conn)
            .await?;
    }
    Ok(())
}

fn redis_value_to_string(value: &redis::Value) -> Option<String> {
    match value {
        redis::Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        redis::Value::SimpleString(s) => Some(s.clone()),
        redis::Value::Int(i) => Some(i.to_string()),
        redis::Value::Double(d) => Some(d.to_string()),
        _ => None,
    }
}

/// Parse an FT.SEARCH WITHSCORES reply:
/// `[total, key, score, [field, value, ...], ...]`.
fn parse_search_reply(reply: &redis::Value) -> Vec<(String, f64, Vec<(String, String)>)> {
    let redis::Value::Array(elements) = reply else {
        return Vec::new();
    };

    let mut docs = Vec::new();
    let mut i = 1;
    while i + 1 < elements.len() {
        let Some(key) = redis_value_to_string(&elements[i]) else {
            break;
        };
        let score = redis_value_to_string(&elements[i + 1])
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);

        let mut fields = Vec::new();
        if let Some(redis::Value::Array(pairs)) = elements.get(i + 2) {
            for pair in pairs.chunks(2) {
                if let (Some(name), Some(value)) = (
                    pair.first().and_then(redis_value_to_string),
                    pair.get(1).and_then(redis_value_to_string),
                ) {
                    fields.push((name, value));
                }
            }
        }

        docs.push((key, score, fields));
        i += 3;
    }

    docs
}

#[async_trait]
impl Indexer for RedisIndexer {
    async fn recreate(&self) -> Result<()> {
        info!(collection = %self.collection.name, "recreating index");
        self.drop_index().await;
        self.create_index().await?;
        self.index_items(None).await
    }

    async fn cleanup(&self) -> Result<()> {
        if !self.index_exists().await {
            return self.recreate().await;
        }

        let db_items = Item::all_of_collection(&self.deps.pool, self.collection.id).await?;
        let db_keys: Vec<String> = db_items
            .iter()
            .map(|item| format!("{}{}", self.doc_prefix, item.id))
            .collect();

        let index_keys = self.scan_keys(&format!("{}*", self.doc_prefix)).await?;

        let gone: Vec<String> = index_keys
            .iter()
            .filter(|key| !db_keys.contains(key))
            .cloned()
            .collect();
        let missing: Vec<&Item> = db_items
            .iter()
            .filter(|item| {
                let key = format!("{}{}", self.doc_prefix, item.id);
                !index_keys.contains(&key)
            })
            .collect();

        info!(
            collection = %self.collection.name,
            index_count = index_keys.len(),
            store_count = db_keys.len(),
            deleting = gone.len(),
            indexing = missing.len(),
            "reconciling index with item store"
        );

        delete_keys(&mut self.conn(), &gone).await?;

        if !missing.is_empty() {
            let missing: Vec<Item> = missing.into_iter().cloned().collect();
            self.index_items(Some(&missing)).await?;
        }

        Ok(())
    }

    async fn index_items(&self, items: Option<&[Item]>) -> Result<()> {
        match items {
            Some(items) => {
                for chunk in items.chunks(INDEX_CHUNK) {
                    self.index_chunk(chunk).await?;
                }
            }
            None => {
                let all = Item::all_of_collection(&self.deps.pool, self.collection.id).await?;
                for chunk in all.chunks(INDEX_CHUNK) {
                    self.index_chunk(chunk).await?;
                }
            }
        }
        Ok(())
    }

    async fn search(&self, request: &IndexSearch) -> Result<Vec<IndexHit>> {
        let full_query = self.build_full_query(request)?;

        debug!(
            index = %self.index_name,
            query = %full_query,
            "redis index search"
        );

        let with_vector = request.vector.is_some();

        let mut cmd = redis::cmd("FT.SEARCH");
        cmd.arg(&self.index_name)
            .arg(&full_query)
            .arg("SCORER")
            .arg("BM25")
            .arg("WITHSCORES");

        if with_vector {
            cmd.arg("RETURN")
                .arg(2)
                .arg("vector_score")
                .arg("description")
                .arg("SORTBY")
                .arg("vector_score");
        } else {
            cmd.arg("RETURN").arg(1).arg("description");
        }

        cmd.arg("LIMIT").arg(request.offset).arg(request.limit);

        if let Some(vector) = &request.vector {
            cmd.arg("PARAMS")
                .arg(2)
                .arg("vec")
                .arg(vector_bytes(vector));
        }

        cmd.arg("DIALECT").arg(2);

        let mut conn = self.conn();
        let reply = cmd.query_async::<redis::Value>(&mut conn).await?;

        let mut hits = Vec::new();
        for (key, score, fields) in parse_search_reply(&reply) {
            let similarity = if with_vector {
                let distance = fields
                    .iter()
                    .find(|(name, _)| name == "vector_score")
                    .and_then(|(_, value)| value.parse::<f64>().ok())
                    .unwrap_or(1.0);
                1.0 - distance
            } else {
                score
            };

            if similarity < request.score_threshold {
                continue;
            }

            let Some(id) = key.rsplit(':').next().and_then(|id| id.parse::<i64>().ok()) else {
                continue;
            };

            let description = fields
                .iter()
                .find(|(name, _)| name == "description")
                .map(|(_, value)| value.clone())
                .unwrap_or_default();

            hits.push(IndexHit {
                id,
                similarity,
                description,
            });
        }

        Ok(hits)
    }
}

/// Drop index documents whose collection no longer exists or no longer uses
/// the redis backend.
pub async fn cleanup_all(deps: &Deps) -> Result<()> {
    let collections = Collection::all(&deps.pool).await?;
    let prefixes: Vec<String> = collections
        .iter()
        .filter(|c| c.config.indexer == "redis")
        .map(|c| doc_prefix_of(c.id))
        .collect();

    let mut conn = deps.redis.clone();
    let keys = scan_keys(&mut conn, "d:*").await?;

    let orphans: Vec<String> = keys
        .into_iter()
        .filter(|key| !prefixes.iter().any(|prefix| key.starts_with(prefix)))
        .collect();

    if orphans.is_empty() {
        info!("no orphaned index documents");
        return Ok(());
    }

    info!(count = orphans.len(), "deleting orphaned index documents");
    delete_keys(&mut conn, &orphans).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::Value;

    #[test]
    fn test_vector_bytes_little_endian() {
        let bytes = vector_bytes(&[1.0, -2.0]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[0..4], 1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], (-2.0f32).to_le_bytes());
    }

    #[test]
    fn test_parse_search_reply() {
        let reply = Value::Array(vec![
            Value::Int(2),
            Value::BulkString(b"d:7:101".to_vec()),
            Value::BulkString(b"1.5".to_vec()),
            Value::Array(vec![
                Value::BulkString(b"description".to_vec()),
                Value::BulkString(b"opel kors - opel corsa".to_vec()),
            ]),
            Value::BulkString(b"d:7:102".to_vec()),
            Value::BulkString(b"0.5".to_vec()),
            Value::Array(vec![
                Value::BulkString(b"description".to_vec()),
                Value::BulkString(b"bmw 316 - bmw 316".to_vec()),
            ]),
        ]);

        let docs = parse_search_reply(&reply);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].0, "d:7:101");
        assert_eq!(docs[0].1, 1.5);
        assert_eq!(docs[0].2[0].1, "opel kors - opel corsa");
    }

    #[test]
    fn test_parse_search_reply_empty() {
        let reply = Value::Array(vec![Value::Int(0)]);
        assert!(parse_search_reply(&reply).is_empty());
    }

    #[test]
    fn test_doc_prefix_and_id_round_trip() {
        let key = format!("{}42", doc_prefix_of(7));
        assert_eq!(key, "d:7:42");
        let id: i64 = key.rsplit(':').next().unwrap().parse().unwrap();
        assert_eq!(id, 42);
    }
}
