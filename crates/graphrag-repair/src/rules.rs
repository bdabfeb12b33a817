//! The ordered rewrite rule table.
//!
//! Each rule runs exactly once per call, in table order. There is no fixpoint
//! iteration: a rewrite produced by a later rule is never revisited by an
//! earlier one, so the order below is observable behavior.

use crate::rewrite::{splice_right_to_left, substitute_all, RepairFn, RuleMatch};
use crate::RepairError;
use regex::Regex;

/// How a rule rewrites the spans it matches.
pub(crate) enum RuleKind {
    /// Single substitute-all pass with a static replacement template.
    Template {
        pattern: Regex,
        replacement: &'static str,
        /// Capture-group pairs that must be textually equal for a match to
        /// be rewritten.
        equal_groups: &'static [(usize, usize)],
    },
    /// Matches collected first, then replaced right-to-left by a pure function.
    Function { matcher: Matcher, repair: RepairFn },
}

/// Span finders for function rules.
pub(crate) enum Matcher {
    Pattern(Regex),
    /// `MATCH ... -[var:TYPE]-> ... WHERE ... var.prop`, where everything
    /// between `MATCH` and the relationship, and between the relationship and
    /// the property reference, sits on a single line.
    FilteredRelationship { relationship: Regex },
}

impl Matcher {
    fn find_all<'q>(&self, text: &'q str) -> Vec<RuleMatch<'q>> {
        match self {
            Matcher::Pattern(re) => re
                .captures_iter(text)
                .map(|caps| RuleMatch::from_captures(text, &caps))
                .collect(),
            Matcher::FilteredRelationship { relationship } => {
                find_filtered_relationships(relationship, text)
            }
        }
    }
}

/// One entry of the rule table.
pub struct RewriteRule {
    name: &'static str,
    description: &'static str,
    kind: RuleKind,
}

impl RewriteRule {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    /// `"template"` or `"function"`.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            RuleKind::Template { .. } => "template",
            RuleKind::Function { .. } => "function",
        }
    }

    /// Apply this rule once across the whole text.
    pub fn apply(&self, text: &str) -> String {
        match &self.kind {
            RuleKind::Template {
                pattern,
                replacement,
                equal_groups,
            } => substitute_all(pattern, text, replacement, equal_groups),
            RuleKind::Function { matcher, repair } => {
                let matches = matcher.find_all(text);
                if matches.is_empty() {
                    return text.to_string();
                }
                splice_right_to_left(text, &matches, *repair)
            }
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, RepairError> {
    Regex::new(pattern).map_err(|source| RepairError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Build the default rule table, in application order.
pub(crate) fn default_rules() -> Result<Vec<RewriteRule>, RepairError> {
    Ok(vec![
        RewriteRule {
            name: "fold_duplicate_where",
            description: "Merge a second WHERE into the first with AND",
            kind: RuleKind::Template {
                pattern: compile(r"WHERE\s+(.+?)\s+WHERE\s+")?,
                replacement: "WHERE ${1} AND ",
                equal_groups: &[],
            },
        },
        RewriteRule {
            name: "alias_anonymous_relationship",
            description: "Give anonymous relationships like [:TYPE] the variable r",
            kind: RuleKind::Template {
                pattern: compile(r"(\[)(:)([^\]]+)(\])")?,
                replacement: "${1}r${2}${3}${4}",
                equal_groups: &[],
            },
        },
        RewriteRule {
            name: "heal_relationship_reference",
            description: "Re-affirm property access on relationship-like variables",
            kind: RuleKind::Function {
                matcher: Matcher::Pattern(compile(
                    r"([^a-zA-Z0-9_])([a-zA-Z][a-zA-Z0-9_]*)\.([a-zA-Z][a-zA-Z0-9_]*)\s+",
                )?),
                repair: heal_relationship_reference,
            },
        },
        RewriteRule {
            name: "close_trailing_parenthesis",
            description: "Close an open parenthesis left dangling at the end of the query",
            kind: RuleKind::Function {
                // `\n?$` lets the fragment end just before a final newline.
                matcher: Matcher::Pattern(compile(r"\([^()]*?\n?$")?),
                repair: close_trailing_parenthesis,
            },
        },
        RewriteRule {
            name: "alias_path_start_node",
            description: "Insert the node variable n at the start of a named path",
            kind: RuleKind::Template {
                pattern: compile(r"MATCH\s+path\s*=\s*\(([^:)]+):")?,
                replacement: "MATCH path = (n:${1}:",
                equal_groups: &[],
            },
        },
        RewriteRule {
            name: "drop_duplicate_relationship_condition",
            description: "Collapse a relationship condition asserted twice in a row",
            kind: RuleKind::Template {
                pattern: compile(
                    r"(WHERE|AND)\s+\((\w+)\)-\[(.*?)\]->\((\w+)\)\s+AND\s+\((\w+)\)-\[.*?\]->\((\w+)\)",
                )?,
                replacement: "${1} (${2})-[${3}]->(${4})",
                equal_groups: &[(2, 5), (4, 6)],
            },
        },
        RewriteRule {
            name: "bind_filtered_relationship",
            description: "Bind the variable of a filtered relationship in its MATCH clause",
            kind: RuleKind::Function {
                matcher: Matcher::FilteredRelationship {
                    relationship: compile(r"\A-\[(\w+):([^\]]+)\]->")?,
                },
                repair: bind_filtered_relationship,
            },
        },
    ])
}

// ============================================================================
// Repair functions
// ============================================================================

/// Relationship-variable naming heuristic: `r` or anything starting with `rel`.
pub(crate) fn looks_like_relationship_var(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower == "r" || lower.starts_with("rel")
}

/// Groups: 1 = preceding char, 2 = variable, 3 = property.
///
/// Relationship-like references are re-emitted with a single trailing space;
/// anything else is left exactly as matched.
fn heal_relationship_reference(m: &RuleMatch<'_>) -> String {
    let var = m.group(2);
    if looks_like_relationship_var(var) {
        format!("{}{}.{} ", m.group(1), var, m.group(3))
    } else {
        m.as_str().to_string()
    }
}

fn close_trailing_parenthesis(m: &RuleMatch<'_>) -> String {
    let fragment = m.as_str();
    let (body, newline) = match fragment.strip_suffix('\n') {
        Some(body) => (body, "\n"),
        None => (fragment, ""),
    };

    let open = body.matches('(').count();
    let close = body.matches(')').count();
    if open <= close {
        return fragment.to_string();
    }
    format!("{body}{}{newline}", ")".repeat(open - close))
}

/// Groups: 1 = MATCH clause prefix, 2 = variable, 3 = relationship type,
/// 4 = referenced property.
///
/// When the prefix carries an anonymous `-[:TYPE]->` of the same type, it is
/// rewritten to `-[var:TYPE]->`. Everything else is returned unchanged.
fn bind_filtered_relationship(m: &RuleMatch<'_>) -> String {
    let head = m.group(1);
    let var = m.group(2);
    let rel_type = m.group(3);

    if head.contains(&format!("-[{var}:")) {
        return m.as_str().to_string();
    }

    let anonymous = format!("-[:{rel_type}]->");
    if !head.contains(&anonymous) {
        return m.as_str().to_string();
    }

    let bound = head.replace(&anonymous, &format!("-[{var}:{rel_type}]->"));
    format!("{bound}{}", &m.as_str()[head.len()..])
}

// ============================================================================
// Filtered-relationship matcher
// ============================================================================

const MATCH_KEYWORD: &str = "MATCH";
const WHERE_KEYWORD: &str = "WHERE";

fn line_end(text: &str, from: usize) -> usize {
    text[from..].find('\n').map_or(text.len(), |i| from + i)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn find_filtered_relationships<'q>(relationship: &Regex, text: &'q str) -> Vec<RuleMatch<'q>> {
    let mut matches = Vec::new();
    let mut from = 0;
    while let Some(found) = text[from..].find(MATCH_KEYWORD) {
        let start = from + found;
        match filtered_relationship_at(relationship, text, start) {
            Some(m) => {
                from = m.span().end;
                matches.push(m);
            }
            None => from = start + MATCH_KEYWORD.len(),
        }
    }
    matches
}

/// Earliest relationship after the `MATCH` at `start` (same line) whose
/// variable is referenced as `var.prop` after a later `WHERE` on the line the
/// relationship ends on.
fn filtered_relationship_at<'q>(
    relationship: &Regex,
    text: &'q str,
    start: usize,
) -> Option<RuleMatch<'q>> {
    let head_limit = line_end(text, start);
    let mut pos = start + MATCH_KEYWORD.len();

    while pos <= head_limit {
        let offset = text[pos..head_limit].find("-[")?;
        let rel_start = pos + offset;
        pos = rel_start + 1;

        let Some(caps) = relationship.captures(&text[rel_start..]) else {
            continue;
        };
        let (Some(var), Some(rel_type), Some(whole)) = (caps.get(1), caps.get(2), caps.get(0))
        else {
            continue;
        };
        let rel_end = rel_start + whole.end();
        let var_range = rel_start + var.start()..rel_start + var.end();
        let type_range = rel_start + rel_type.start()..rel_start + rel_type.end();

        if let Some(prop_range) = find_property_reference(text, rel_end, var.as_str()) {
            return Some(RuleMatch::from_spans(
                text,
                start..prop_range.end,
                [start..rel_start, var_range, type_range, prop_range],
            ));
        }
    }
    None
}

/// Range of `prop` in the first `var.prop` that follows a `WHERE` between
/// `from` and the end of its line.
fn find_property_reference(text: &str, from: usize, var: &str) -> Option<std::ops::Range<usize>> {
    let limit = line_end(text, from);
    let line = &text[from..limit];
    let after_where = line.find(WHERE_KEYWORD)? + WHERE_KEYWORD.len();

    let needle = format!("{var}.");
    let mut search = after_where;
    while let Some(i) = line[search..].find(&needle) {
        let prop_start = search + i + needle.len();
        let prop_len: usize = line[prop_start..]
            .chars()
            .take_while(|c| is_word_char(*c))
            .map(char::len_utf8)
            .sum();
        if prop_len > 0 {
            return Some(from + prop_start..from + prop_start + prop_len);
        }
        search = prop_start;
    }
    None
}
