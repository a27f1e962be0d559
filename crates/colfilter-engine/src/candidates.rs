use std::cmp::Ordering;
use std::collections::HashSet;

use crate::config::CandidateOptions;
use crate::matcher::{casefold, contains_folded};

/// Case-insensitive ordering for candidate lists and text sorts.
///
/// Values equal ignoring case fall back to code point order so the ordering stays total.
pub fn cmp_case_insensitive(a: &str, b: &str) -> Ordering {
    fold_cmp(a, b).then_with(|| a.cmp(b))
}

fn fold_cmp(a: &str, b: &str) -> Ordering {
    if a.is_ascii() && b.is_ascii() {
        let a = a.bytes().map(|c| c.to_ascii_uppercase());
        let b = b.bytes().map(|c| c.to_ascii_uppercase());
        return a.cmp(b);
    }

    let a = a.chars().flat_map(char::to_uppercase);
    let b = b.chars().flat_map(char::to_uppercase);
    a.cmp(b)
}

/// Deduplicates and sorts extracted values into a candidate list.
pub(crate) fn distinct_sorted(
    values: impl IntoIterator<Item = String>,
    options: &CandidateOptions,
) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut distinct: Vec<String> = Vec::new();
    for value in values {
        if !options.include_blank && value.trim().is_empty() {
            continue;
        }
        let key = if options.fold_case_duplicates {
            casefold(&value).into_owned()
        } else {
            value.clone()
        };
        if seen.insert(key) {
            distinct.push(value);
        }
    }

    distinct.sort_by(|a, b| cmp_case_insensitive(a, b));
    if let Some(limit) = options.limit {
        distinct.truncate(limit);
    }
    distinct
}

/// Narrows a candidate list to the values containing `text`, ignoring case.
///
/// This is the live narrowing a filter dialog applies while the user types. It is purely
/// presentational: relational operators are not interpreted and no engine state changes.
pub fn narrow_candidates<'a>(values: &'a [String], text: &str) -> Vec<&'a str> {
    let needle = casefold(text);
    values
        .iter()
        .map(String::as_str)
        .filter(|value| contains_folded(value, &needle))
        .collect()
}
