//! Graph retrieval: validate, repair and execute each planned query.
//!
//! Every planned Cypher query goes through [`QueryRepairEngine`] before it
//! reaches the store:
//!
//! - invalid verdict: the query is replaced by a fallback scan
//! - valid with a message: the message is logged and the repaired text runs
//! - valid without a message: the repaired text runs
//!
//! A failing query is recorded on its own entry and does not abort the batch.

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::graph::{GraphStore, Row};
use crate::plan::{PlannedCypher, QueryPlan};
use graphrag_repair::QueryRepairEngine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const NO_QUERIES_MESSAGE: &str = "No queries to execute";

/// Outcome of one planned query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedQuery {
    pub purpose: String,
    pub original_cypher: String,
    pub executed_cypher: String,
    pub was_modified: bool,
    pub validation_message: Option<String>,
    pub rows: Vec<Row>,
    pub result_count: usize,
    /// Set when the store rejected the query; `rows` is then empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalReport {
    pub original_question: String,
    pub thought_process: String,
    pub retrieved: Vec<RetrievedQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RetrievalReport {
    pub fn total_rows(&self) -> usize {
        self.retrieved.iter().map(|q| q.result_count).sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &RetrievedQuery> {
        self.retrieved.iter().filter(|q| q.error.is_some())
    }
}

/// Safe replacement for a query the engine rejected.
pub fn fallback_query(purpose: &str, limit: usize) -> String {
    if purpose.to_lowercase().contains("table") {
        format!("MATCH (n:Table) RETURN n LIMIT {limit}")
    } else {
        format!("MATCH (n) RETURN n LIMIT {limit}")
    }
}

pub struct GraphRetrieverAgent {
    engine: QueryRepairEngine,
    store: Arc<dyn GraphStore>,
    config: AgentConfig,
}

impl GraphRetrieverAgent {
    pub fn new(store: Arc<dyn GraphStore>, config: AgentConfig) -> Self {
        Self::with_engine(QueryRepairEngine::new(), store, config)
    }

    pub fn with_engine(
        engine: QueryRepairEngine,
        store: Arc<dyn GraphStore>,
        config: AgentConfig,
    ) -> Self {
        Self {
            engine,
            store,
            config,
        }
    }

    /// Run every query in `plan` and collect the results.
    ///
    /// The store is connected once per batch and closed on every exit path.
    pub async fn process(
        &self,
        plan: &QueryPlan,
        original_question: &str,
    ) -> Result<RetrievalReport, AgentError> {
        let mut report = RetrievalReport {
            original_question: original_question.to_string(),
            thought_process: plan.thought_process.clone(),
            ..RetrievalReport::default()
        };

        if plan.is_empty() {
            report.error = Some(NO_QUERIES_MESSAGE.to_string());
            return Ok(report);
        }

        info!(queries = plan.query_plan.len(), "retrieving from graph store");
        if let Err(err) = self.store.connect().await {
            error!(error = %err, "failed to connect to graph store");
            self.close_store().await;
            return Err(AgentError::Connect(err));
        }

        for item in &plan.query_plan {
            let Some(cypher) = &item.cypher else {
                warn!(purpose = %item.purpose, "empty Cypher query, skipping");
                continue;
            };
            report.retrieved.push(self.run_one(&item.purpose, cypher).await);
        }

        self.close_store().await;
        info!(
            executed = report.retrieved.len(),
            rows = report.total_rows(),
            "retrieval complete"
        );
        Ok(report)
    }

    async fn run_one(&self, purpose: &str, cypher: &PlannedCypher) -> RetrievedQuery {
        info!(purpose = %purpose, "executing planned query");

        let original = cypher.display_text();
        let verdict = self.engine.validate_optional(cypher.as_text());
        let executed = if !verdict.is_valid {
            let fallback = fallback_query(purpose, self.config.fallback_limit);
            warn!(
                reason = verdict.message.as_deref().unwrap_or_default(),
                original = %original,
                fallback = %fallback,
                "query rejected, using fallback"
            );
            fallback
        } else {
            if let Some(message) = &verdict.message {
                warn!(diagnostic = %message, "query validation message");
            }
            verdict.fixed_query
        };

        info!(cypher = %executed, "executing Cypher query");
        let (rows, error) = match self.store.execute_query(&executed, None).await {
            Ok(rows) => (rows, None),
            Err(err) => {
                error!(purpose = %purpose, error = %err, "query execution failed");
                (Vec::new(), Some(err.to_string()))
            }
        };

        RetrievedQuery {
            purpose: purpose.to_string(),
            was_modified: executed != original,
            original_cypher: original,
            executed_cypher: executed,
            validation_message: verdict.message,
            result_count: rows.len(),
            rows,
            error,
        }
    }

    async fn close_store(&self) {
        match self.store.close().await {
            Ok(()) => info!("closed graph store connection"),
            Err(err) => warn!(error = %err, "failed to close graph store"),
        }
    }
}
