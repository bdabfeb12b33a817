//! Rule application primitives.
//!
//! Two ways of rewriting query text:
//!
//! - **Template substitution**: one left-to-right scan over the text producing
//!   non-overlapping replacements, with optional group-equality constraints.
//! - **Function splicing**: every match is collected up front from an immutable
//!   snapshot of the text, then replacements are spliced in from the last match
//!   to the first. Splicing rightmost-first keeps the byte offsets of the
//!   not-yet-processed (leftward) matches valid no matter how much each
//!   replacement grows or shrinks the text.

use regex::{Captures, Regex};
use std::ops::Range;

/// Pure function computing the replacement for one match.
pub type RepairFn = fn(&RuleMatch<'_>) -> String;

/// A single match found by a rule's matcher.
///
/// Group 0 is the whole match; the remaining groups mirror the capture groups
/// of the underlying pattern. Offsets are byte offsets into the text the match
/// was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch<'q> {
    text: &'q str,
    groups: Vec<Option<Range<usize>>>,
}

impl<'q> RuleMatch<'q> {
    pub(crate) fn from_captures(text: &'q str, caps: &Captures<'q>) -> Self {
        Self {
            text,
            groups: caps.iter().map(|m| m.map(|m| m.range())).collect(),
        }
    }

    /// Build a match from explicit spans. `span` becomes group 0.
    pub(crate) fn from_spans(
        text: &'q str,
        span: Range<usize>,
        groups: impl IntoIterator<Item = Range<usize>>,
    ) -> Self {
        let mut all = vec![Some(span)];
        all.extend(groups.into_iter().map(Some));
        Self { text, groups: all }
    }

    pub fn span(&self) -> Range<usize> {
        self.groups
            .first()
            .cloned()
            .flatten()
            .unwrap_or(0..0)
    }

    pub fn as_str(&self) -> &'q str {
        &self.text[self.span()]
    }

    /// Text of capture group `index`, or `""` when the group did not
    /// participate in the match.
    pub fn group(&self, index: usize) -> &'q str {
        match self.groups.get(index) {
            Some(Some(range)) => &self.text[range.clone()],
            _ => "",
        }
    }
}

/// Replace every non-overlapping match of `pattern` with `template`.
///
/// `equal_groups` lists capture-group pairs that must hold identical text for
/// a match to be rewritten. This stands in for back-references, which the
/// `regex` crate does not support: a candidate failing the check is dropped
/// and the search resumes one character after its start, so a qualifying
/// match beginning inside the rejected span is still found.
pub(crate) fn substitute_all(
    pattern: &Regex,
    text: &str,
    template: &str,
    equal_groups: &[(usize, usize)],
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut at = 0;

    while at <= text.len() {
        let Some(caps) = pattern.captures_at(text, at) else {
            break;
        };
        let Some(whole) = caps.get(0) else {
            break;
        };

        let group = |i: usize| caps.get(i).map(|m| m.as_str());
        if equal_groups.iter().all(|&(a, b)| group(a) == group(b)) {
            out.push_str(&text[copied..whole.start()]);
            caps.expand(template, &mut out);
            copied = whole.end();
            at = if whole.is_empty() {
                next_char_boundary(text, whole.end())
            } else {
                whole.end()
            };
        } else {
            at = next_char_boundary(text, whole.start());
        }
    }

    out.push_str(&text[copied..]);
    out
}

fn next_char_boundary(text: &str, from: usize) -> usize {
    text[from..]
        .chars()
        .next()
        .map_or(text.len() + 1, |c| from + c.len_utf8())
}

/// Splice `repair(m)` over every match, processing matches right-to-left.
///
/// `matches` must be non-overlapping and sorted by start offset, which is what
/// every matcher in this crate produces.
pub(crate) fn splice_right_to_left(
    text: &str,
    matches: &[RuleMatch<'_>],
    repair: RepairFn,
) -> String {
    let mut out = text.to_string();
    for m in matches.iter().rev() {
        let replacement = repair(m);
        out.replace_range(m.span(), &replacement);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shout(m: &RuleMatch<'_>) -> String {
        format!("<{}>", m.as_str().to_uppercase())
    }

    #[test]
    fn test_splice_keeps_leftward_offsets_valid() {
        let re = Regex::new(r"[a-z]+").unwrap();
        let text = "ab cd ef";
        let matches: Vec<_> = re
            .captures_iter(text)
            .map(|c| RuleMatch::from_captures(text, &c))
            .collect();
        assert_eq!(matches.len(), 3);

        let out = splice_right_to_left(text, &matches, shout);
        assert_eq!(out, "<AB> <CD> <EF>");
    }

    #[test]
    fn test_substitute_all_respects_equal_groups() {
        let re = Regex::new(r"(\w)=(\w)").unwrap();
        let out = substitute_all(&re, "a=a b=c", "same(${1})", &[(1, 2)]);
        assert_eq!(out, "same(a) b=c");
    }

    #[test]
    fn test_rejected_candidate_does_not_hide_later_match() {
        // "b=a" fails the check; the qualifying "a=a" starts inside it.
        let re = Regex::new(r"(\w)=(\w)=?").unwrap();
        let out = substitute_all(&re, "b=a=a ü=ü", "same(${1})", &[(1, 2)]);
        assert_eq!(out, "b=same(a) same(ü)");
    }

    #[test]
    fn test_missing_group_reads_as_empty() {
        let text = "xyz";
        let m = RuleMatch::from_spans(text, 0..3, [1..2]);
        assert_eq!(m.as_str(), "xyz");
        assert_eq!(m.group(1), "y");
        assert_eq!(m.group(7), "");
    }
}
