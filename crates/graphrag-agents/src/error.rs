//! Error types for the agent layer.

/// Failures talking to the graph store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphStoreError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("not connected")]
    NotConnected,
    #[error("query failed: {message}")]
    Query { query: String, message: String },
}

/// Failures talking to the LLM.
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("LLM not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {name}={value:?} (expected {expected})")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("failed to read {name}: {source}")]
    Unreadable {
        name: &'static str,
        #[source]
        source: std::env::VarError,
    },
}

/// Errors surfaced by the agents themselves.
///
/// Per-query execution failures are not here: the retriever records them on
/// the affected query and keeps going.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("no question provided")]
    EmptyQuestion,
    #[error("failed to connect to graph store: {0}")]
    Connect(#[source] GraphStoreError),
    #[error("schema unavailable: {0}")]
    Schema(#[source] GraphStoreError),
    #[error(transparent)]
    LLM(#[from] LLMError),
    #[error("invalid query plan: {0}")]
    InvalidPlan(String),
}
