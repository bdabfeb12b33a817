//! Post-rewrite heuristic checks.
//!
//! These never touch the query text. They only describe constructs that are
//! legal but risky so the caller can surface them next to the results.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::RepairError;

/// A known-risky construct found after all rewrites ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnownIssue {
    /// A WHERE clause reads `x.prop` but no MATCH pattern binds a
    /// relationship variable.
    UndefinedRelationshipVariable,
    /// More than one MATCH clause and no WHERE at all.
    CartesianProduct,
    /// More than two OPTIONAL MATCH clauses.
    ExcessiveOptionalMatch,
    /// A `*` inside a relationship pattern with no `*N..` lower bound.
    UnboundedVariableLengthPath,
}

impl KnownIssue {
    pub fn description(self) -> &'static str {
        match self {
            KnownIssue::UndefinedRelationshipVariable => "Possible undefined relationship variable",
            KnownIssue::CartesianProduct => {
                "Possible cartesian product (multiple MATCH without WHERE)"
            }
            KnownIssue::ExcessiveOptionalMatch => {
                "Multiple OPTIONAL MATCH clauses may cause performance issues"
            }
            KnownIssue::UnboundedVariableLengthPath => {
                "Unbounded variable-length path may cause performance issues"
            }
        }
    }
}

impl std::fmt::Display for KnownIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Issues found in one query, in detection order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueReport {
    issues: Vec<KnownIssue>,
}

impl IssueReport {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn contains(&self, issue: KnownIssue) -> bool {
        self.issues.contains(&issue)
    }

    pub fn iter(&self) -> impl Iterator<Item = KnownIssue> + '_ {
        self.issues.iter().copied()
    }

    /// Comma-joined issue descriptions.
    pub fn summary(&self) -> String {
        self.issues
            .iter()
            .map(|i| i.description())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The verdict message for this report, `None` when nothing was found.
    pub fn to_message(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(format!("Query has potential issues: {}", self.summary()))
        }
    }
}

/// Compiled patterns for the heuristic checks.
pub(crate) struct IssueDetector {
    where_property: Regex,
    named_relationship: Regex,
    variable_length: Regex,
    lower_bound: Regex,
}

impl IssueDetector {
    pub(crate) fn new() -> Result<Self, RepairError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|source| RepairError::Pattern {
                pattern: pattern.to_string(),
                source,
            })
        };
        Ok(Self {
            where_property: compile(r"WHERE.*?\w+\.\w+")?,
            named_relationship: compile(r"MATCH.*?\[(\w+):")?,
            variable_length: compile(r"\[.*\*.*\]")?,
            lower_bound: compile(r"\[.*\*\d+\.\.")?,
        })
    }

    pub(crate) fn check(&self, query: &str) -> IssueReport {
        let mut issues = Vec::new();

        if self.where_property.is_match(query) && !self.named_relationship.is_match(query) {
            issues.push(KnownIssue::UndefinedRelationshipVariable);
        }

        if query.matches("MATCH ").count() > 1 && !query.contains("WHERE") {
            issues.push(KnownIssue::CartesianProduct);
        }

        if query.matches("OPTIONAL MATCH").count() > 2 {
            issues.push(KnownIssue::ExcessiveOptionalMatch);
        }

        if self.variable_length.is_match(query) && !self.lower_bound.is_match(query) {
            issues.push(KnownIssue::UnboundedVariableLengthPath);
        }

        IssueReport { issues }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(query: &str) -> IssueReport {
        IssueDetector::new().unwrap().check(query)
    }

    #[test]
    fn test_clean_query_has_no_issues() {
        let report = check("MATCH (a:Person)-[r:KNOWS]->(b:Person) WHERE r.since > 2000 RETURN a, b");
        assert!(report.is_empty());
        assert_eq!(report.to_message(), None);
    }

    #[test]
    fn test_undefined_relationship_variable() {
        let report = check("MATCH (a)-->(b) WHERE r.since > 2000 RETURN a");
        assert!(report.contains(KnownIssue::UndefinedRelationshipVariable));
    }

    #[test]
    fn test_cartesian_product() {
        let report = check("MATCH (a:Person) MATCH (b:Company) RETURN a, b");
        assert_eq!(report.iter().collect::<Vec<_>>(), vec![KnownIssue::CartesianProduct]);
    }

    #[test]
    fn test_optional_match_threshold() {
        let two = "MATCH (a) OPTIONAL MATCH (a)-[r:X]->(b) OPTIONAL MATCH (a)-[s:Y]->(c) WHERE a.id = 1 RETURN a";
        assert!(!check(two).contains(KnownIssue::ExcessiveOptionalMatch));

        let three = format!("{two} OPTIONAL MATCH (a)-[t:Z]->(d)");
        assert!(check(&three).contains(KnownIssue::ExcessiveOptionalMatch));
    }

    #[test]
    fn test_variable_length_bounds() {
        assert!(check("MATCH (a)-[r:PARENT_OF*]->(b) RETURN b")
            .contains(KnownIssue::UnboundedVariableLengthPath));
        assert!(check("MATCH (a)-[r:PARENT_OF*..3]->(b) RETURN b")
            .contains(KnownIssue::UnboundedVariableLengthPath));
        assert!(!check("MATCH (a)-[r:PARENT_OF*1..3]->(b) RETURN b")
            .contains(KnownIssue::UnboundedVariableLengthPath));
    }

    #[test]
    fn test_message_joins_descriptions() {
        let report = check("MATCH (a) MATCH (b)-[r:R*]->(c) RETURN a");
        assert_eq!(report.len(), 2);
        assert_eq!(
            report.to_message().unwrap(),
            "Query has potential issues: Possible cartesian product (multiple MATCH without WHERE), \
             Unbounded variable-length path may cause performance issues"
        );
    }
}
