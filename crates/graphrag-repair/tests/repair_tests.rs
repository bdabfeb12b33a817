//! Behavioral tests for the query repair engine.
//!
//! Covers:
//! 1. Pass-through of clean queries
//! 2. The invalid-input verdict
//! 3. Each rewrite rule through the public entry point
//! 4. Right-to-left splicing with length-changing replacements
//! 5. Heuristic diagnostics that leave the text alone

use graphrag_repair::*;

fn engine() -> QueryRepairEngine {
    QueryRepairEngine::new()
}

// ============================================================================
// Pass-through and invalid input
// ============================================================================

#[test]
fn test_clean_query_passes_through() {
    let query = "MATCH (a:Person)-[r:KNOWS]->(b:Person) WHERE r.since > 2000 RETURN a.name, b.name";
    let verdict = engine().validate_and_fix(query);
    assert_eq!(verdict.into_parts(), (query.to_string(), true, None));
}

#[test]
fn test_simple_return_passes_through() {
    let query = "MATCH (n:Person) RETURN n.name LIMIT 10";
    let verdict = engine().validate_and_fix(query);
    assert_eq!(verdict.into_parts(), (query.to_string(), true, None));
}

#[test]
fn test_empty_and_missing_input() {
    let engine = engine();

    let (fixed, valid, message) = engine.validate_and_fix("").into_parts();
    assert_eq!(fixed, "");
    assert!(!valid);
    assert_eq!(message.as_deref(), Some(INVALID_QUERY_MESSAGE));

    let (fixed, valid, message) = engine.validate_optional(None).into_parts();
    assert_eq!(fixed, "");
    assert!(!valid);
    assert_eq!(
        message.as_deref(),
        Some("Invalid query: Query must be a non-empty string")
    );
}

// ============================================================================
// Rewrite rules
// ============================================================================

#[test]
fn test_duplicate_where_is_folded() {
    let verdict = engine().validate_and_fix("MATCH (a) WHERE a.x = 1 WHERE a.y = 2 RETURN a");
    assert!(verdict.is_valid);
    assert!(verdict.fixed_query.contains("WHERE a.x = 1 AND a.y = 2"));
    assert!(!verdict.fixed_query.contains("WHERE a.y"));
}

#[test]
fn test_duplicate_where_across_lines() {
    let query = r#"
        MATCH path = (c:Category)-[:PARENT_OF*]->(sc:Subcategory)<-[:MAY_VIOLATE]-(pt:ProductType)
        WHERE (pt)-[:MAY_VIOLATE]->(sc) AND (pt)-[:MAY_VIOLATE]->(sc)
        WHERE r.confidence_score >= 0.4
        RETURN [node IN nodes(path) | coalesce(node.label, labels(node)[0])] AS Hierarchy
        "#;

    let verdict = engine().validate_and_fix(query);
    assert!(verdict.is_valid);
    assert!(verdict.fixed_query.contains("AND r.confidence_score"));
    assert!(!verdict.fixed_query.contains("WHERE r.confidence_score"));
}

#[test]
fn test_anonymous_relationship_gets_variable() {
    let verdict = engine().validate_and_fix("MATCH (a)-[:KNOWS]->(b) RETURN b");
    assert!(verdict.fixed_query.contains("-[r:KNOWS]->"));
    assert!(!verdict.fixed_query.contains("[:KNOWS]"));
}

#[test]
fn test_anonymous_relationship_before_filter_on_r() {
    let query = r#"
        MATCH (pt:ProductType)-[:MAY_VIOLATE]->(sc:Subcategory)
        WHERE r.confidence_score >= 0.4
        RETURN pt.name, sc.name
        "#;
    let verdict = engine().validate_and_fix(query);
    assert!(verdict.is_valid);
    assert!(verdict.fixed_query.contains("[r:MAY_VIOLATE]"));
}

#[test]
fn test_trailing_parenthesis_is_closed() {
    let verdict = engine().validate_and_fix("MATCH (a)-[:REL]->(b");
    let fixed = verdict.fixed_query;
    assert!(fixed.ends_with(')'));
    assert_eq!(fixed.matches('(').count(), fixed.matches(')').count());
    assert_eq!(fixed, "MATCH (a)-[r:REL]->(b)");
}

#[test]
fn test_trailing_parenthesis_in_multiline_query() {
    let query = r#"
        MATCH (pt:ProductType)-[:MAY_VIOLATE]->(sc:Subcategory
        WHERE pt.name = 'Test'
        RETURN pt.name, sc.name
        "#;
    let verdict = engine().validate_and_fix(query);
    assert!(verdict.is_valid);
    assert!(verdict.fixed_query.trim_end().ends_with(')'));
}

#[test]
fn test_named_path_start_gets_variable() {
    let verdict = engine().validate_and_fix("MATCH path = (Category:Root)-[r:HAS*1..3]->(x) RETURN path");
    assert!(verdict
        .fixed_query
        .starts_with("MATCH path = (n:Category:Root)"));
}

#[test]
fn test_duplicate_relationship_condition_removed() {
    let verdict =
        engine().validate_and_fix("MATCH (a), (b) WHERE (a)-[:R]->(b) AND (a)-[:R]->(b) RETURN a");
    assert!(!verdict.fixed_query.contains("AND (a)-[:R]->(b)"));
    assert!(!verdict.fixed_query.contains("AND (a)-[r:R]->(b)"));
    assert!(verdict.fixed_query.contains("WHERE (a)-[r:R]->(b) RETURN a"));
}

#[test]
fn test_duplicate_after_distinct_pair_is_removed() {
    let query = "MATCH (a), (b), (c), (d) \
WHERE (a)-[r:R]->(b) AND (c)-[r:R]->(d) AND (c)-[r:R]->(d) RETURN a";
    let verdict = engine().validate_and_fix(query);

    assert!(verdict.is_valid);
    assert_eq!(verdict.fixed_query.matches("(c)-[r:R]->(d)").count(), 1);
    assert_eq!(
        verdict.fixed_query,
        "MATCH (a), (b), (c), (d) WHERE (a)-[r:R]->(b) AND (c)-[r:R]->(d) RETURN a"
    );
}

#[test]
fn test_duplicate_relationship_condition_multiline() {
    let query = r#"
        MATCH (pt:ProductType)-[:MAY_VIOLATE]->(sc:Subcategory)
        WHERE (pt)-[:MAY_VIOLATE]->(sc) AND (pt)-[:MAY_VIOLATE]->(sc)
        RETURN pt.name, sc.name
        "#;
    let verdict = engine().validate_and_fix(query);
    assert!(verdict.is_valid);
    assert!(!verdict
        .fixed_query
        .contains("AND (pt)-[:MAY_VIOLATE]->(sc)"));
}

#[test]
fn test_aliased_relationship_left_alone() {
    let query = r#"
        MATCH (p:ProductType)-[rel:MAY_VIOLATE]->(s:Subcategory)
        WHERE rel.confidence_score >= 0.4
        RETURN p.name, s.name, rel.confidence_score
        "#;
    let verdict = engine().validate_and_fix(query);
    assert!(verdict.is_valid);
    assert_eq!(query.trim(), verdict.fixed_query.trim());
    assert_eq!(verdict.message, None);
}

// ============================================================================
// Right-to-left splicing
// ============================================================================

#[test]
fn test_function_rule_rewrites_every_occurrence() {
    let query = "MATCH (a)-[r:R]->(b) WHERE r.weight     > 1 AND a.name   = 'x' AND rel.kind\t\t= 'y' AND relation.score      < 3 RETURN a";
    let verdict = engine().validate_and_fix(query);
    assert_eq!(
        verdict.fixed_query,
        "MATCH (a)-[r:R]->(b) WHERE r.weight > 1 AND a.name   = 'x' AND rel.kind = 'y' AND relation.score < 3 RETURN a"
    );
}

#[test]
fn test_filtered_relationship_rule_handles_growing_replacements() {
    let engine = engine();
    let rule = engine
        .rules()
        .iter()
        .find(|r| r.name() == "bind_filtered_relationship")
        .unwrap();

    let query = [
        "MATCH (x)-[:K]->(a)-[k:K]->(b) WHERE k.p = 1",
        "MATCH (x)-[:LIKES]->(a)-[likes:LIKES]->(b) WHERE likes.p = 2",
        "MATCH (x)-[:OWNS]->(a)-[ownership:OWNS]->(b) WHERE ownership.p = 3",
    ]
    .join("\n");

    assert_eq!(
        rule.apply(&query),
        [
            "MATCH (x)-[k:K]->(a)-[k:K]->(b) WHERE k.p = 1",
            "MATCH (x)-[likes:LIKES]->(a)-[likes:LIKES]->(b) WHERE likes.p = 2",
            "MATCH (x)-[ownership:OWNS]->(a)-[ownership:OWNS]->(b) WHERE ownership.p = 3",
        ]
        .join("\n")
    );
}

// ============================================================================
// Heuristic diagnostics
// ============================================================================

#[test]
fn test_cartesian_product_flagged_without_mutation() {
    let query = "MATCH (a:Person) MATCH (b:Company) RETURN a, b";
    let verdict = engine().validate_and_fix(query);
    assert!(verdict.is_valid);
    assert_eq!(verdict.fixed_query, query);
    let message = verdict.message.unwrap();
    assert!(message.starts_with("Query has potential issues: "));
    assert!(message.contains("Possible cartesian product"));
}

#[test]
fn test_unbounded_path_flagged() {
    let verdict = engine().validate_and_fix("MATCH (a)-[r:PARENT_OF*]->(b) RETURN b");
    assert!(verdict.is_valid);
    assert!(verdict
        .message
        .unwrap()
        .contains("Unbounded variable-length path"));
}

#[test]
fn test_optional_match_flagged_past_two() {
    let query = "MATCH (a:Person) WHERE a.id = 1 \
                 OPTIONAL MATCH (a)-[r:X]->(b) \
                 OPTIONAL MATCH (a)-[s:Y]->(c) \
                 OPTIONAL MATCH (a)-[t:Z]->(d) RETURN a, b, c, d";
    let outcome = engine().repair(query);
    assert!(outcome.issues.contains(KnownIssue::ExcessiveOptionalMatch));
    assert!(outcome
        .verdict
        .message
        .unwrap()
        .contains("Multiple OPTIONAL MATCH clauses"));
}

#[test]
fn test_undefined_relationship_variable_flagged() {
    let outcome = engine().repair("MATCH (a)-->(b) WHERE r.since > 2000 RETURN a");
    assert!(outcome
        .issues
        .contains(KnownIssue::UndefinedRelationshipVariable));
}

// ============================================================================
// Determinism and sharing
// ============================================================================

#[test]
fn test_repeated_calls_are_identical() {
    let engine = engine();
    let query = "MATCH (a)-[:R]->(b) WHERE a.x = 1 WHERE r.y   = 2 MATCH (c RETURN a";
    assert_eq!(engine.validate_and_fix(query), engine.validate_and_fix(query));
}

#[test]
fn test_engine_is_shareable_across_threads() {
    let engine = engine();
    let query = "MATCH (a)-[:KNOWS]->(b RETURN a";
    let expected = engine.validate_and_fix(query);
    let engine = &engine;

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(move || engine.validate_and_fix(query)))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn test_verdict_serializes_as_triple_fields() {
    let verdict = engine().validate_and_fix("MATCH (n) RETURN n");
    let json = serde_json::to_value(&verdict).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "fixed_query": "MATCH (n) RETURN n",
            "is_valid": true,
            "message": null,
        })
    );
}
