//! The three-stage row projection: raw source → filtered → ordered.
//!
//! - The filtered stage holds the source indices accepted by the latest published
//!   [`CompositePredicate`]. It re-evaluates only when the published generation differs from
//!   the one it last applied.
//! - The ordered stage is a stable permutation of the filtered stage under the caller's
//!   current sort request ([`RowOrder`]); without one, source order is kept.
//!
//! Reads always reflect the current source contents. A projection built before the source
//! last changed (push, extend, replace, clear) is re-evaluated on the next read.

use std::cell::{Ref, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::column::ColumnKey;
use crate::composite::{CompositePredicate, Generation, SharedPredicate};
use crate::source::RowSource;

/// Comparator tracking the caller's sort request.
pub struct RowOrder<S> {
    cmp: Rc<dyn Fn(&S, &S) -> Ordering>,
}

impl<S: 'static> RowOrder<S> {
    pub fn new(cmp: impl Fn(&S, &S) -> Ordering + 'static) -> Self {
        Self { cmp: Rc::new(cmp) }
    }

    pub fn reversed(self) -> Self {
        let cmp = self.cmp;
        Self::new(move |a, b| cmp(b, a))
    }
}

impl<S> RowOrder<S> {
    pub fn compare(&self, a: &S, b: &S) -> Ordering {
        (self.cmp)(a, b)
    }
}

impl<S> Clone for RowOrder<S> {
    fn clone(&self) -> Self {
        Self {
            cmp: Rc::clone(&self.cmp),
        }
    }
}

impl<S> fmt::Debug for RowOrder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowOrder").finish_non_exhaustive()
    }
}

enum FilterStage<S, C> {
    Composite(CompositePredicate<S, C>),
    /// A filter installed by someone other than the engine.
    Foreign(SharedPredicate<S>),
}

pub struct RowPipeline<S, C> {
    source: RowSource<S>,
    filter: FilterStage<S, C>,
    order: Option<RowOrder<S>>,
    applied: Option<Generation>,
    projection: RefCell<Projection>,
}

/// Cached output of the filtered and ordered stages.
#[derive(Debug, Default)]
struct Projection {
    filtered: Vec<usize>,
    ordered: Vec<usize>,
    synced_source: u64,
}

impl<S, C: ColumnKey> RowPipeline<S, C> {
    /// Wraps `source` with an empty composite filter and no ordering.
    pub fn new(source: RowSource<S>) -> Self {
        Self::with_stage(source, FilterStage::Composite(CompositePredicate::new()))
    }

    /// Wraps `source` with a filter the engine does not own.
    ///
    /// [`crate::FilterEngine::attach_pipeline`] rejects such a pipeline rather than silently
    /// replacing the caller's filter.
    pub fn with_foreign_filter(source: RowSource<S>, predicate: SharedPredicate<S>) -> Self {
        Self::with_stage(source, FilterStage::Foreign(predicate))
    }

    fn with_stage(source: RowSource<S>, filter: FilterStage<S, C>) -> Self {
        let mut pipeline = Self {
            source,
            filter,
            order: None,
            applied: None,
            projection: RefCell::default(),
        };
        pipeline.rebuild();
        pipeline
    }

    pub fn source(&self) -> &RowSource<S> {
        &self.source
    }

    /// The composite currently driving the filtered stage, if the engine owns it.
    pub fn predicate(&self) -> Option<&CompositePredicate<S, C>> {
        match &self.filter {
            FilterStage::Composite(composite) => Some(composite),
            FilterStage::Foreign(_) => None,
        }
    }

    pub fn has_foreign_filter(&self) -> bool {
        matches!(self.filter, FilterStage::Foreign(_))
    }

    /// Generation of the composite last applied to the filtered stage.
    pub fn applied_generation(&self) -> Option<Generation> {
        self.applied
    }

    /// Installs `composite` as the filter. Returns `false` (and does nothing) when the same
    /// generation is already applied.
    pub fn publish(&mut self, composite: CompositePredicate<S, C>) -> bool {
        if self.applied == Some(composite.generation()) && !self.is_stale() {
            return false;
        }
        self.filter = FilterStage::Composite(composite);
        self.rebuild();
        true
    }

    pub fn set_order(&mut self, order: Option<RowOrder<S>>) {
        self.order = order;
        if self.is_stale() {
            self.refresh();
            return;
        }
        let projection = self.projection.get_mut();
        projection.ordered = sorted(&self.source, self.order.as_ref(), &projection.filtered);
    }

    pub fn order(&self) -> Option<&RowOrder<S>> {
        self.order.as_ref()
    }

    /// Re-evaluates both stages against the current source contents, keeping the filter.
    pub fn resync(&mut self) {
        self.refresh();
    }

    /// `true` if the source changed since the projection was last built. The next read
    /// rebuilds it.
    pub fn is_stale(&self) -> bool {
        self.source.generation() != self.projection.borrow().synced_source
    }

    /// Number of visible rows.
    pub fn len(&self) -> usize {
        self.current().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().ordered.is_empty()
    }

    /// Source indices of the visible rows, in display order.
    pub fn source_indices(&self) -> Vec<usize> {
        self.current().ordered.clone()
    }

    /// Source indices accepted by the filter, in source order.
    pub fn filtered_indices(&self) -> Vec<usize> {
        self.current().filtered.clone()
    }

    pub fn map_visible<T>(&self, mut f: impl FnMut(&S) -> T) -> Vec<T> {
        let projection = self.current();
        self.source.with_rows(|rows| {
            projection
                .ordered
                .iter()
                .filter_map(|&idx| rows.get(idx))
                .map(&mut f)
                .collect()
        })
    }

    pub fn get_with<T>(&self, index: usize, f: impl FnOnce(&S) -> T) -> Option<T> {
        let idx = *self.current().ordered.get(index)?;
        self.source.with_rows(|rows| rows.get(idx).map(f))
    }

    fn current(&self) -> Ref<'_, Projection> {
        if self.is_stale() {
            self.refresh();
        }
        self.projection.borrow()
    }

    fn rebuild(&mut self) {
        self.applied = match &self.filter {
            FilterStage::Composite(composite) => Some(composite.generation()),
            FilterStage::Foreign(_) => None,
        };
        self.refresh();
    }

    fn refresh(&self) {
        let filter = &self.filter;
        let (filtered, total) = self.source.with_rows(|rows| {
            let filtered: Vec<usize> = rows
                .iter()
                .enumerate()
                .filter(|(_, row)| match filter {
                    FilterStage::Composite(composite) => composite.evaluate(row),
                    FilterStage::Foreign(predicate) => predicate.test(row),
                })
                .map(|(idx, _)| idx)
                .collect();
            (filtered, rows.len())
        });
        log::trace!("filtered stage kept {} of {total} rows", filtered.len());

        let ordered = sorted(&self.source, self.order.as_ref(), &filtered);
        *self.projection.borrow_mut() = Projection {
            filtered,
            ordered,
            synced_source: self.source.generation(),
        };
    }
}

fn sorted<S>(source: &RowSource<S>, order: Option<&RowOrder<S>>, filtered: &[usize]) -> Vec<usize> {
    let mut ordered = filtered.to_vec();
    if let Some(order) = order {
        source.with_rows(|rows| {
            // Stable: ties keep source order.
            ordered.sort_by(|&a, &b| match (rows.get(a), rows.get(b)) {
                (Some(a), Some(b)) => order.compare(a, b),
                _ => a.cmp(&b),
            });
        });
    }
    ordered
}

impl<S, C: fmt::Debug> fmt::Debug for RowPipeline<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowPipeline")
            .field("source", &self.source)
            .field("visible", &self.projection.borrow().ordered.len())
            .field("applied", &self.applied)
            .field("ordered", &self.order.is_some())
            .finish_non_exhaustive()
    }
}
