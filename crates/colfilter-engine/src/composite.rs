use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::column::{ColumnKey, RowPredicate};

pub type SharedPredicate<S> = Rc<dyn RowPredicate<S>>;

/// Version stamp of a [`CompositePredicate`].
///
/// Every instance produced by [`CompositePredicate::new`] or one of the `with_*` / `without_*`
/// builders carries a fresh generation, so consumers detect a change by comparing stamps
/// rather than comparing predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Generation(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Conjunction of per-column row predicates.
///
/// Entries map a column to `Some(predicate)` or to `None`. A `None` entry is skipped during
/// evaluation; it records "this column is excluded" (used for candidate-value computation)
/// distinctly from a column that has no slot at all. With no entries, every row is accepted.
///
/// Instances are never mutated once built. Each builder returns a new value with a new
/// [`Generation`] and leaves the receiver untouched.
pub struct CompositePredicate<S, C> {
    entries: HashMap<C, Option<SharedPredicate<S>>>,
    generation: Generation,
}

impl<S, C: ColumnKey> CompositePredicate<S, C> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            generation: Generation::next(),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// `true` iff every non-`None` entry accepts `row`.
    pub fn evaluate(&self, row: &S) -> bool {
        self.entries
            .values()
            .flatten()
            .all(|predicate| predicate.test(row))
    }

    /// Returns a copy in which `column` maps to `predicate` (`None` = excluded).
    pub fn with_entry(&self, column: C, predicate: Option<SharedPredicate<S>>) -> Self {
        let mut entries = self.entries.clone();
        entries.insert(column, predicate);
        Self {
            entries,
            generation: Generation::next(),
        }
    }

    /// Returns a copy with `column`'s slot overridden to `None`.
    pub fn with_excluded(&self, column: C) -> Self {
        self.with_entry(column, None)
    }

    /// Returns a copy without any slot for `column`.
    pub fn without_entry(&self, column: &C) -> Self {
        let mut entries = self.entries.clone();
        entries.remove(column);
        Self {
            entries,
            generation: Generation::next(),
        }
    }

    /// `true` if `column` has a slot, including an excluded (`None`) one.
    pub fn has_entry(&self, column: &C) -> bool {
        self.entries.contains_key(column)
    }

    /// `true` if `column` carries a predicate that takes part in evaluation.
    pub fn is_active(&self, column: &C) -> bool {
        matches!(self.entries.get(column), Some(Some(_)))
    }

    pub fn active_columns(&self) -> impl Iterator<Item = &C> + '_ {
        self.entries
            .iter()
            .filter_map(|(column, predicate)| predicate.as_ref().map(|_| column))
    }

    pub fn active_count(&self) -> usize {
        self.entries.values().flatten().count()
    }

    /// Number of slots, excluded ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S, C: ColumnKey> Default for CompositePredicate<S, C> {
    fn default() -> Self {
        Self::new()
    }
}

// Cloning yields the same version: the entries are shared, not rebuilt.
impl<S, C: Clone> Clone for CompositePredicate<S, C> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            generation: self.generation,
        }
    }
}

impl<S, C: ColumnKey> RowPredicate<S> for CompositePredicate<S, C> {
    fn test(&self, row: &S) -> bool {
        self.evaluate(row)
    }
}

impl<S, C: fmt::Debug> fmt::Debug for CompositePredicate<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(column, predicate)| (format!("{column:?}"), predicate.is_some()))
            .collect();
        entries.sort();
        f.debug_struct("CompositePredicate")
            .field("generation", &self.generation)
            .field("entries", &entries)
            .finish()
    }
}
