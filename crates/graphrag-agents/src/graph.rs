//! Graph store interface and an in-memory implementation.

use crate::error::GraphStoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// One result row: column name → value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Query parameters: name → value.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Client for a property-graph database.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn connect(&self) -> Result<(), GraphStoreError>;

    async fn execute_query(
        &self,
        query: &str,
        params: Option<&Params>,
    ) -> Result<Vec<Row>, GraphStoreError>;

    async fn close(&self) -> Result<(), GraphStoreError>;
}

#[derive(Default)]
struct MemoryState {
    connected: bool,
    executed: Vec<String>,
    connects: usize,
    closes: usize,
}

/// Scripted store: rows are looked up by exact query text.
///
/// Unknown queries return no rows. Every executed query is recorded so tests
/// can assert on what actually reached the store.
#[derive(Default)]
pub struct MemoryGraphStore {
    responses: HashMap<String, Vec<Row>>,
    failures: HashMap<String, String>,
    refuse_connect: Option<String>,
    state: Mutex<MemoryState>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, query: impl Into<String>, rows: Vec<Row>) -> Self {
        self.responses.insert(query.into(), rows);
        self
    }

    pub fn with_failure(mut self, query: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(query.into(), message.into());
        self
    }

    pub fn refusing_connections(mut self, reason: impl Into<String>) -> Self {
        self.refuse_connect = Some(reason.into());
        self
    }

    /// Queries executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// (connect calls, close calls)
    pub fn lifecycle_counts(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.connects, state.closes)
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn connect(&self) -> Result<(), GraphStoreError> {
        let mut state = self.state.lock();
        state.connects += 1;
        if let Some(reason) = &self.refuse_connect {
            return Err(GraphStoreError::Connection(reason.clone()));
        }
        state.connected = true;
        Ok(())
    }

    async fn execute_query(
        &self,
        query: &str,
        _params: Option<&Params>,
    ) -> Result<Vec<Row>, GraphStoreError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(GraphStoreError::NotConnected);
        }
        state.executed.push(query.to_string());

        if let Some(message) = self.failures.get(query) {
            return Err(GraphStoreError::Query {
                query: query.to_string(),
                message: message.clone(),
            });
        }
        Ok(self.responses.get(query).cloned().unwrap_or_default())
    }

    async fn close(&self) -> Result<(), GraphStoreError> {
        let mut state = self.state.lock();
        state.closes += 1;
        state.connected = false;
        Ok(())
    }
}

/// Build a row from `(column, value)` pairs.
pub fn row<I, K>(columns: I) -> Row
where
    I: IntoIterator<Item = (K, serde_json::Value)>,
    K: Into<String>,
{
    columns.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
