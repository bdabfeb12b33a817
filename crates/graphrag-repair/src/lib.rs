//! GraphRAG Query Repair
//!
//! Validation and best-effort repair of LLM-generated Cypher before it reaches
//! the graph store.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      QUERY REPAIR ENGINE                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │   raw query ──► input check ──(empty)──► Verdict { valid: false }│
//! │                      │                                           │
//! │                      ▼                                           │
//! │   ┌──────────────────────────────────────────┐                   │
//! │   │ rule 1 ─► rule 2 ─► ... ─► rule 7        │  one pass each,   │
//! │   │ (template: substitute-all)               │  fixed order      │
//! │   │ (function: collect, splice right-to-left)│                   │
//! │   └──────────────────────────────────────────┘                   │
//! │                      │                                           │
//! │                      ▼                                           │
//! │              heuristic issue checks ──► Verdict { valid: true,   │
//! │              (read-only)                          message: ... } │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine works on text, not on a parse tree. It is optimistic: apart
//! from an empty input it always reports the query as valid, attaching a
//! non-blocking diagnostic when the heuristic checks find something.
//!
//! The engine holds only its compiled rule table, so a single instance can be
//! shared across threads and called concurrently.

pub mod issues;
pub mod rewrite;
pub mod rules;

pub use issues::{IssueReport, KnownIssue};
pub use rewrite::{RepairFn, RuleMatch};
pub use rules::RewriteRule;

use issues::IssueDetector;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Message returned for empty (or absent) input.
pub const INVALID_QUERY_MESSAGE: &str = "Invalid query: Query must be a non-empty string";

/// Fixed/original length ratio outside this range is logged as a significant
/// modification.
const MODIFICATION_RATIO_BOUNDS: (f64, f64) = (0.8, 1.2);

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("invalid repair pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Outcome of validating one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub fixed_query: String,
    pub is_valid: bool,
    pub message: Option<String>,
}

impl Verdict {
    fn invalid(query: &str) -> Self {
        Self {
            fixed_query: query.to_string(),
            is_valid: false,
            message: Some(INVALID_QUERY_MESSAGE.to_string()),
        }
    }

    pub fn into_parts(self) -> (String, bool, Option<String>) {
        (self.fixed_query, self.is_valid, self.message)
    }
}

/// Verdict plus the detail behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairOutcome {
    pub verdict: Verdict,
    /// Names of the rules that changed the text, in application order.
    pub applied_rules: Vec<&'static str>,
    pub issues: IssueReport,
}

impl RepairOutcome {
    pub fn was_modified(&self) -> bool {
        !self.applied_rules.is_empty()
    }
}

pub struct QueryRepairEngine {
    rules: Vec<RewriteRule>,
    detector: IssueDetector,
}

impl Default for QueryRepairEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryRepairEngine {
    /// Engine with the built-in rule table.
    pub fn new() -> Self {
        Self::try_new().expect("built-in repair patterns are valid")
    }

    pub fn try_new() -> Result<Self, RepairError> {
        Ok(Self {
            rules: rules::default_rules()?,
            detector: IssueDetector::new()?,
        })
    }

    /// Rules in application order.
    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Validate and repair `query`.
    pub fn validate_and_fix(&self, query: &str) -> Verdict {
        self.repair(query).verdict
    }

    /// Same as [`validate_and_fix`](Self::validate_and_fix) for input that may
    /// be missing altogether. `None` is rejected like an empty string and
    /// echoed back as empty text.
    pub fn validate_optional(&self, query: Option<&str>) -> Verdict {
        self.validate_and_fix(query.unwrap_or_default())
    }

    /// Full repair pass: rewrites, logging, heuristic checks.
    pub fn repair(&self, query: &str) -> RepairOutcome {
        if query.is_empty() {
            return RepairOutcome {
                verdict: Verdict::invalid(query),
                applied_rules: Vec::new(),
                issues: IssueReport::default(),
            };
        }

        let mut fixed = query.to_string();
        let mut applied_rules = Vec::new();
        for rule in &self.rules {
            let next = rule.apply(&fixed);
            if next != fixed {
                debug!(rule = rule.name(), "repair rule changed query");
                applied_rules.push(rule.name());
                fixed = next;
            }
        }

        if fixed != query {
            info!(original = %query, fixed = %fixed, "modified query before execution");
            let ratio = length_ratio(&fixed, query);
            let (low, high) = MODIFICATION_RATIO_BOUNDS;
            if !(low..=high).contains(&ratio) {
                warn!(
                    ratio,
                    "significant modifications were made to the query - verify results carefully"
                );
            }
        }

        let issues = self.detector.check(&fixed);
        if !issues.is_empty() {
            warn!(issues = %issues.summary(), "potential issues in query");
        }

        RepairOutcome {
            verdict: Verdict {
                fixed_query: fixed,
                is_valid: true,
                message: issues.to_message(),
            },
            applied_rules,
            issues,
        }
    }
}

/// Character-count ratio of `fixed` to `original`. `original` is non-empty.
fn length_ratio(fixed: &str, original: &str) -> f64 {
    fixed.chars().count() as f64 / original.chars().count() as f64
}
