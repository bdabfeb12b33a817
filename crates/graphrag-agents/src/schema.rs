//! Graph schema: loading, caching and prompt rendering.
//!
//! ```text
//! GraphStore ──► StoreSchemaLoader ──► CachedSchemaProvider ──► decomposition prompt
//!                                         │
//!                                  MemorySchemaCache (TTL)
//! ```

use crate::error::{AgentError, GraphStoreError};
use crate::graph::{GraphStore, Row};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Labels beyond this many are not counted, to bound the number of queries
/// a schema load issues.
const MAX_COUNTED_NODE_TYPES: usize = 5;

const NODE_TYPES_QUERY: &str = "CALL db.schema.nodeTypeProperties() \
YIELD nodeType, propertyName \
RETURN nodeType AS label, collect(propertyName) AS properties";

const RELATIONSHIP_TYPES_QUERY: &str = "CALL db.schema.relTypeProperties() \
YIELD relType, propertyName \
RETURN relType AS type, collect(propertyName) AS properties";

const CONNECTIONS_QUERY: &str = "CALL db.schema.visualization() \
YIELD nodes, relationships \
UNWIND relationships AS rel \
RETURN head(nodes) AS source_label, rel.type AS relationship, last(nodes) AS target_label \
LIMIT 100";

/// Snapshot of a graph's labels, relationship types and connection patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSchema {
    /// Node label → property names.
    pub node_types: BTreeMap<String, Vec<String>>,
    /// Relationship type → property names.
    pub relationship_types: BTreeMap<String, Vec<String>>,
    /// Patterns such as `(Person)-[:WORKS_AT]->(Company)`.
    pub relationships: Vec<String>,
    /// Node label → instance count (only for the labels that were counted).
    pub node_counts: BTreeMap<String, u64>,
}

impl GraphSchema {
    pub fn is_empty(&self) -> bool {
        self.node_types.is_empty() && self.relationship_types.is_empty()
    }

    /// Render the schema as the text block embedded in decomposition prompts.
    pub fn to_prompt_text(&self) -> String {
        let mut out = vec!["TAXONOMY SCHEMA:".to_string(), "Node Types:".to_string()];

        for (label, properties) in &self.node_types {
            let count = self.node_counts.get(label).copied().unwrap_or(0);
            out.push(format!("- {label} (Count: {count})"));
            if !properties.is_empty() {
                out.push(format!("  - Properties: {}", properties.join(", ")));
            }
        }

        out.push("\nRelationship Types:".to_string());
        for (rel_type, properties) in &self.relationship_types {
            out.push(format!("- {rel_type}"));
            if !properties.is_empty() {
                out.push(format!("  - Properties: {}", properties.join(", ")));
            }
        }

        out.push("\nRelationship Patterns:".to_string());
        for pattern in &self.relationships {
            out.push(format!("- {pattern}"));
        }

        out.join("\n")
    }
}

/// Source of the current graph schema.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    async fn get_schema(&self, force_refresh: bool) -> Result<GraphSchema, AgentError>;
}

/// A fixed schema, for tests and offline planning.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaProvider {
    schema: GraphSchema,
}

impl StaticSchemaProvider {
    pub fn new(schema: GraphSchema) -> Self {
        Self { schema }
    }
}

#[async_trait]
impl SchemaProvider for StaticSchemaProvider {
    async fn get_schema(&self, _force_refresh: bool) -> Result<GraphSchema, AgentError> {
        Ok(self.schema.clone())
    }
}

// ============================================================================
// Loading from a store
// ============================================================================

/// Reads the schema from a Neo4j-compatible store via `db.schema.*` procedures.
pub struct StoreSchemaLoader {
    store: Arc<dyn GraphStore>,
}

impl StoreSchemaLoader {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    async fn load(&self) -> Result<GraphSchema, GraphStoreError> {
        let node_types = property_table(
            &self.store.execute_query(NODE_TYPES_QUERY, None).await?,
            "label",
        );
        let relationship_types = property_table(
            &self
                .store
                .execute_query(RELATIONSHIP_TYPES_QUERY, None)
                .await?,
            "type",
        );

        let relationships = self
            .store
            .execute_query(CONNECTIONS_QUERY, None)
            .await?
            .iter()
            .filter_map(|row| {
                let source = non_empty_str(row, "source_label")?;
                let rel = non_empty_str(row, "relationship")?;
                let target = non_empty_str(row, "target_label")?;
                Some(format!("({source})-[:{rel}]->({target})"))
            })
            .collect();

        let mut node_counts = BTreeMap::new();
        for label in node_types.keys().take(MAX_COUNTED_NODE_TYPES) {
            let clean = label.replace(['`', ':'], "");
            let query = format!("MATCH (n:{clean}) RETURN count(n) as count");
            let count = match self.store.execute_query(&query, None).await {
                Ok(rows) => rows
                    .first()
                    .and_then(|row| row.get("count"))
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(0),
                Err(err) => {
                    warn!(label = %label, error = %err, "failed to count nodes");
                    0
                }
            };
            node_counts.insert(label.clone(), count);
        }

        Ok(GraphSchema {
            node_types,
            relationship_types,
            relationships,
            node_counts,
        })
    }
}

#[async_trait]
impl SchemaProvider for StoreSchemaLoader {
    async fn get_schema(&self, _force_refresh: bool) -> Result<GraphSchema, AgentError> {
        self.store.connect().await.map_err(AgentError::Connect)?;
        let loaded = self.load().await;
        if let Err(err) = self.store.close().await {
            warn!(error = %err, "failed to close graph store after schema load");
        }

        let schema = loaded.map_err(AgentError::Schema)?;
        info!(
            node_types = schema.node_types.len(),
            relationship_types = schema.relationship_types.len(),
            patterns = schema.relationships.len(),
            "loaded graph schema"
        );
        Ok(schema)
    }
}

fn non_empty_str<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column)
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
}

fn property_table(rows: &[Row], key_column: &str) -> BTreeMap<String, Vec<String>> {
    rows.iter()
        .filter_map(|row| {
            let key = non_empty_str(row, key_column)?;
            let properties = row
                .get("properties")
                .and_then(serde_json::Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            Some((key.to_string(), properties))
        })
        .collect()
}

// ============================================================================
// Caching
// ============================================================================

struct CacheEntry {
    schema: GraphSchema,
    stored_at: Instant,
}

/// Keyed in-memory schema cache with a fixed time-to-live.
pub struct MemorySchemaCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemorySchemaCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached schema, if present and not expired.
    pub fn get(&self, key: &str) -> Option<GraphSchema> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() <= self.ttl)
            .map(|entry| entry.schema.clone())
    }

    pub fn set(&self, key: impl Into<String>, schema: GraphSchema) {
        self.entries.write().insert(
            key.into(),
            CacheEntry {
                schema,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn is_valid(&self, key: &str) -> bool {
        self.entries
            .read()
            .get(key)
            .is_some_and(|entry| entry.stored_at.elapsed() <= self.ttl)
    }

    /// Drop one entry, or every entry when `key` is `None`.
    pub fn invalidate(&self, key: Option<&str>) {
        let mut entries = self.entries.write();
        match key {
            Some(key) => {
                entries.remove(key);
            }
            None => entries.clear(),
        }
    }
}

const SCHEMA_CACHE_KEY: &str = "graph_schema";

/// Wraps any provider with a [`MemorySchemaCache`].
pub struct CachedSchemaProvider<P> {
    inner: P,
    cache: MemorySchemaCache,
}

impl<P: SchemaProvider> CachedSchemaProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            cache: MemorySchemaCache::new(ttl),
        }
    }

    pub fn cache(&self) -> &MemorySchemaCache {
        &self.cache
    }
}

#[async_trait]
impl<P: SchemaProvider> SchemaProvider for CachedSchemaProvider<P> {
    async fn get_schema(&self, force_refresh: bool) -> Result<GraphSchema, AgentError> {
        if force_refresh {
            self.cache.invalidate(Some(SCHEMA_CACHE_KEY));
        } else if let Some(schema) = self.cache.get(SCHEMA_CACHE_KEY) {
            debug!("schema cache hit");
            return Ok(schema);
        }

        let schema = self.inner.get_schema(force_refresh).await?;
        self.cache.set(SCHEMA_CACHE_KEY, schema.clone());
        Ok(schema)
    }
}
