//! Query plans produced by decomposition and consumed by retrieval.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const UNKNOWN_PURPOSE: &str = "Unknown purpose";

/// The `cypher` field of a plan item as the model emitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PlannedCypher {
    Text(String),
    /// A non-string value the validator will reject.
    NotText(Value),
}

impl PlannedCypher {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::NotText(_) => None,
        }
    }

    /// Text shown in reports for the value as received.
    pub fn display_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::NotText(v) => v.to_string(),
        }
    }
}

/// One planned graph query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPlannedQuery")]
pub struct PlannedQuery {
    pub purpose: String,
    /// `None` when the model left the query out or emitted an empty value.
    pub cypher: Option<PlannedCypher>,
}

impl PlannedQuery {
    pub fn new(purpose: impl Into<String>, cypher: impl Into<String>) -> Self {
        Self {
            purpose: purpose.into(),
            cypher: Some(PlannedCypher::Text(cypher.into())),
        }
    }
}

#[derive(Deserialize)]
struct RawPlannedQuery {
    #[serde(default)]
    purpose: Value,
    #[serde(default)]
    cypher: Value,
}

impl From<RawPlannedQuery> for PlannedQuery {
    fn from(raw: RawPlannedQuery) -> Self {
        let purpose = match raw.purpose {
            Value::String(s) => s,
            Value::Null => UNKNOWN_PURPOSE.to_string(),
            other => other.to_string(),
        };
        let cypher = match raw.cypher {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(PlannedCypher::Text(s)),
            v if is_blank(&v) => None,
            v => Some(PlannedCypher::NotText(v)),
        };
        Self { purpose, cypher }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::String(s) => s.is_empty(),
    }
}

/// Decomposition output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPlan {
    #[serde(default)]
    pub query_plan: Vec<PlannedQuery>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub thought_process: String,
}

impl QueryPlan {
    /// Parse the structured JSON an LLM returned.
    ///
    /// Unknown fields are ignored; a missing `query_plan` yields an empty plan.
    pub fn from_llm_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn is_empty(&self) -> bool {
        self.query_plan.is_empty()
    }
}

fn lenient_text<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
