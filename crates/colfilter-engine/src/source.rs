use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared handle to the raw, unfiltered row collection.
///
/// Cloning the handle shares the collection. Every mutation bumps a change generation which
/// [`crate::RowPipeline`] uses to tell whether its projection is stale.
///
/// Rows are borrowed for the duration of [`RowSource::with_rows`]; mutating the source from
/// inside that closure (or from an extractor) panics.
pub struct RowSource<S> {
    inner: Rc<RefCell<SourceState<S>>>,
}

struct SourceState<S> {
    rows: Vec<S>,
    generation: u64,
}

impl<S> RowSource<S> {
    pub fn new(rows: Vec<S>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SourceState {
                rows,
                generation: 0,
            })),
        }
    }

    /// Replaces the whole collection (e.g. after a fresh data load).
    pub fn replace(&self, rows: Vec<S>) {
        self.mutate(|state| state.rows = rows);
    }

    pub fn push(&self, row: S) {
        self.mutate(|state| state.rows.push(row));
    }

    pub fn extend(&self, rows: impl IntoIterator<Item = S>) {
        self.mutate(|state| state.rows.extend(rows));
    }

    pub fn clear(&self) {
        self.mutate(|state| state.rows.clear());
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        self.inner.borrow().generation
    }

    pub fn with_rows<R>(&self, f: impl FnOnce(&[S]) -> R) -> R {
        f(self.inner.borrow().rows.as_slice())
    }

    /// `true` if both handles share one collection.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn mutate(&self, f: impl FnOnce(&mut SourceState<S>)) {
        let mut state = self.inner.borrow_mut();
        f(&mut *state);
        state.generation = state.generation.wrapping_add(1);
    }
}

impl<S: Clone> RowSource<S> {
    pub fn to_vec(&self) -> Vec<S> {
        self.inner.borrow().rows.clone()
    }
}

impl<S> Clone for RowSource<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S> Default for RowSource<S> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<S> From<Vec<S>> for RowSource<S> {
    fn from(rows: Vec<S>) -> Self {
        Self::new(rows)
    }
}

impl<S> fmt::Debug for RowSource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("RowSource")
            .field("len", &state.rows.len())
            .field("generation", &state.generation)
            .finish()
    }
}
