//! Matching a single text value against a single filter expression.
//!
//! Expression grammar (after trimming surrounding whitespace):
//! - empty: matches every value.
//! - `>bound` / `<bound`: the value must sort strictly after / before `bound`. The bound is
//!   trimmed; comparison is by code point on lower-cased text.
//! - anything else: case-insensitive substring containment.
//!
//! There is no malformed input. Unrecognised leading characters fall through to substring
//! matching, and an expression consisting of just `>` compares against the empty bound.

use std::borrow::Cow;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `>bound`
    GreaterThan,
    /// `<bound`
    LessThan,
}

impl Relation {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Relation::GreaterThan => ordering == Ordering::Greater,
            Relation::LessThan => ordering == Ordering::Less,
        }
    }
}

/// A parsed filter expression.
///
/// Patterns and bounds are stored case-folded so evaluation only folds the row value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpression {
    /// Empty expression; accepts every value.
    Any,
    Contains { pattern: String },
    Compare { relation: Relation, bound: String },
}

impl FilterExpression {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let mut chars = text.chars();
        let relation = match chars.next() {
            None => return FilterExpression::Any,
            Some('>') => Relation::GreaterThan,
            Some('<') => Relation::LessThan,
            Some(_) => {
                return FilterExpression::Contains {
                    pattern: casefold(text).into_owned(),
                }
            }
        };

        FilterExpression::Compare {
            relation,
            bound: casefold(chars.as_str().trim()).into_owned(),
        }
    }

    /// `true` for the empty expression, which the engine treats as "clear this column".
    pub fn is_any(&self) -> bool {
        matches!(self, FilterExpression::Any)
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            FilterExpression::Any => true,
            FilterExpression::Contains { pattern } => contains_folded(value, pattern),
            FilterExpression::Compare { relation, bound } => {
                let folded = casefold(value);
                relation.accepts(str::cmp(&folded, bound))
            }
        }
    }
}

/// Evaluates `value` against the raw `expression` text.
///
/// Hot loops should parse once with [`FilterExpression::parse`] instead.
pub fn matches(value: &str, expression: &str) -> bool {
    FilterExpression::parse(expression).matches(value)
}

/// Lower-cases `s`, borrowing when it is already folded ASCII.
pub(crate) fn casefold(s: &str) -> Cow<'_, str> {
    if s.is_ascii() {
        if s.bytes().any(|b| b.is_ascii_uppercase()) {
            Cow::Owned(s.to_ascii_lowercase())
        } else {
            Cow::Borrowed(s)
        }
    } else {
        Cow::Owned(s.to_lowercase())
    }
}

/// Substring test where `folded_needle` has already been passed through [`casefold`].
pub(crate) fn contains_folded(haystack: &str, folded_needle: &str) -> bool {
    if folded_needle.is_empty() {
        return true;
    }
    if haystack.is_ascii() && folded_needle.is_ascii() {
        return ascii_contains_case_insensitive(haystack, folded_needle);
    }
    casefold(haystack).contains(folded_needle)
}

fn ascii_contains_case_insensitive(haystack: &str, needle: &str) -> bool {
    if needle.len() > haystack.len() {
        return false;
    }
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    hay.windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}
