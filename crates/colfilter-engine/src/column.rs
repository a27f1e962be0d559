use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use crate::matcher::FilterExpression;

/// Identifier of a column for filter-entry lookup.
///
/// Hosts must use the same key consistently when setting and clearing a column's filter;
/// otherwise a second entry is created instead of the first being replaced.
pub trait ColumnKey: Eq + Hash + Clone + fmt::Debug + 'static {}

impl<T> ColumnKey for T where T: Eq + Hash + Clone + fmt::Debug + 'static {}

/// Row-level boolean test.
pub trait RowPredicate<S> {
    fn test(&self, row: &S) -> bool;
}

impl<S, F> RowPredicate<S> for F
where
    F: Fn(&S) -> bool,
{
    fn test(&self, row: &S) -> bool {
        self(row)
    }
}

/// Maps a row to the string value displayed in one column.
///
/// Extractors must be deterministic and free of side effects; the engine calls them once per
/// row on every filter pass and every candidate computation.
pub struct Extractor<S> {
    f: Rc<dyn Fn(&S) -> String>,
}

impl<S> Extractor<S> {
    pub fn new(f: impl Fn(&S) -> String + 'static) -> Self {
        Self { f: Rc::new(f) }
    }

    pub fn extract(&self, row: &S) -> String {
        (self.f)(row)
    }
}

impl<S> Clone for Extractor<S> {
    fn clone(&self) -> Self {
        Self {
            f: Rc::clone(&self.f),
        }
    }
}

impl<S> fmt::Debug for Extractor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extractor").finish_non_exhaustive()
    }
}

/// A filter expression bound to a column and its value extractor.
///
/// Building one from an empty expression is legal (it accepts every row), but
/// [`crate::FilterEngine`] never stores such a predicate: an empty expression clears the
/// column's entry instead.
pub struct ColumnPredicate<S, C> {
    column: C,
    extractor: Extractor<S>,
    expression: FilterExpression,
}

impl<S, C> ColumnPredicate<S, C> {
    pub fn new(column: C, extractor: Extractor<S>, text: &str) -> Self {
        Self::from_expression(column, extractor, FilterExpression::parse(text))
    }

    pub fn from_expression(
        column: C,
        extractor: Extractor<S>,
        expression: FilterExpression,
    ) -> Self {
        Self {
            column,
            extractor,
            expression,
        }
    }

    pub fn column(&self) -> &C {
        &self.column
    }

    pub fn expression(&self) -> &FilterExpression {
        &self.expression
    }
}

impl<S, C> RowPredicate<S> for ColumnPredicate<S, C> {
    fn test(&self, row: &S) -> bool {
        if self.expression.is_any() {
            return true;
        }
        self.expression.matches(&self.extractor.extract(row))
    }
}

impl<S, C: fmt::Debug> fmt::Debug for ColumnPredicate<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnPredicate")
            .field("column", &self.column)
            .field("expression", &self.expression)
            .finish()
    }
}
