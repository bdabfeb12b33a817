//! GraphRAG agents: the collaborators around the query repair engine.
//!
//! ```text
//!   question
//!      │
//!      ▼
//! ┌──────────────────────────┐   schema    ┌──────────────────────┐
//! │ QueryDecompositionAgent  │◄────────────│ CachedSchemaProvider │◄── StoreSchemaLoader
//! │   (LLMClient)            │             └──────────────────────┘
//! └────────────┬─────────────┘
//!              │ QueryPlan
//!              ▼
//! ┌──────────────────────────┐  validate_and_fix  ┌──────────────────┐
//! │ GraphRetrieverAgent      │───────────────────►│ QueryRepairEngine│
//! │   fallback on rejection  │◄───────────────────│                  │
//! └────────────┬─────────────┘      Verdict       └──────────────────┘
//!              │ execute_query
//!              ▼
//!         GraphStore ──► RetrievalReport
//! ```
//!
//! Every external dependency sits behind a trait (`GraphStore`, `LLMClient`,
//! `SchemaProvider`) with an in-memory implementation for tests and dry runs.

pub mod config;
pub mod decomposition;
pub mod error;
pub mod graph;
pub mod llm;
pub mod plan;
pub mod retriever;
pub mod schema;

pub use config::AgentConfig;
pub use decomposition::QueryDecompositionAgent;
pub use error::{AgentError, ConfigError, GraphStoreError, LLMError};
pub use graph::{GraphStore, MemoryGraphStore, Params, Row};
pub use llm::{GenerateRequest, LLMClient, MockLLMClient};
pub use plan::{PlannedCypher, PlannedQuery, QueryPlan};
pub use retriever::{fallback_query, GraphRetrieverAgent, RetrievalReport, RetrievedQuery};
pub use schema::{
    CachedSchemaProvider, GraphSchema, MemorySchemaCache, SchemaProvider, StaticSchemaProvider,
    StoreSchemaLoader,
};

#[cfg(feature = "openai")]
pub use llm::OpenAIClient;
