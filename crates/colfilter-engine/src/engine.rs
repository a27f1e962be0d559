use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::candidates::distinct_sorted;
use crate::column::{ColumnKey, ColumnPredicate, Extractor};
use crate::composite::{CompositePredicate, Generation, SharedPredicate};
use crate::config::EngineConfig;
use crate::error::{FilterError, FilterResult};
use crate::matcher::FilterExpression;
use crate::pipeline::{RowOrder, RowPipeline};
use crate::source::RowSource;

/// Receives the "this column is now filtered" signal after every column filter update.
///
/// Hosts use it to toggle a visual indicator on the column header.
pub trait FilterListener<C> {
    fn filter_state_changed(&mut self, column: &C, active: bool);
}

impl<C, F> FilterListener<C> for F
where
    F: FnMut(&C, bool),
{
    fn filter_state_changed(&mut self, column: &C, active: bool) {
        self(column, active)
    }
}

/// Outcome of a column filter update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterStatus {
    /// Whether the column now carries a filter.
    pub active: bool,
    /// Visible rows after the update.
    pub visible_rows: usize,
    /// Generation of the newly published composite.
    pub generation: Generation,
}

/// Orchestrates per-column filters over one managed row collection.
///
/// The engine owns the published [`CompositePredicate`] and the [`RowPipeline`] it drives.
/// Every filter update builds a new composite and republishes it; the pipeline detects the
/// change by generation.
pub struct FilterEngine<S, C> {
    config: EngineConfig,
    extractors: HashMap<C, Extractor<S>>,
    composite: CompositePredicate<S, C>,
    pipeline: Option<RowPipeline<S, C>>,
    listener: Option<Box<dyn FilterListener<C>>>,
}

impl<S: 'static, C: ColumnKey> FilterEngine<S, C> {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            extractors: HashMap::new(),
            composite: CompositePredicate::new(),
            pipeline: None,
            listener: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Attaches `source` as the managed collection, wrapping it in a fresh pipeline.
    ///
    /// Filters already set on the engine stay in force.
    pub fn attach(&mut self, source: RowSource<S>) -> FilterResult<()> {
        self.attach_pipeline(RowPipeline::new(source))
    }

    /// Attaches an existing pipeline.
    ///
    /// Fails with [`FilterError::UnexpectedWrapping`] if the pipeline's filtered stage is
    /// driven by a foreign predicate: taking it over would silently discard the caller's
    /// filter. A composite-driven pipeline is taken over and the engine's current composite
    /// is published into it.
    pub fn attach_pipeline(&mut self, mut pipeline: RowPipeline<S, C>) -> FilterResult<()> {
        if pipeline.has_foreign_filter() {
            log::warn!(
                "refusing to attach a row pipeline whose filter is not managed by the engine"
            );
            return Err(FilterError::UnexpectedWrapping {
                reason: "filtered stage is driven by a foreign predicate".to_string(),
            });
        }

        pipeline.publish(self.composite.clone());
        log::debug!(
            "attached {} rows; composite {} with {} active column(s)",
            pipeline.source().len(),
            self.composite.generation(),
            self.composite.active_count()
        );
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Detaches and returns the managed pipeline, keeping the filters on the engine.
    pub fn detach(&mut self) -> Option<RowPipeline<S, C>> {
        self.pipeline.take()
    }

    pub fn is_attached(&self) -> bool {
        self.pipeline.is_some()
    }

    /// The filtered and ordered projection of the managed collection.
    pub fn view(&self) -> FilterResult<&RowPipeline<S, C>> {
        self.pipeline.as_ref().ok_or(FilterError::NotAttached)
    }

    /// The currently published composite.
    pub fn composite(&self) -> &CompositePredicate<S, C> {
        &self.composite
    }

    pub fn set_listener(&mut self, listener: impl FilterListener<C> + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn register_column(&mut self, column: C, extractor: Extractor<S>) {
        self.extractors.insert(column, extractor);
    }

    pub fn is_registered(&self, column: &C) -> bool {
        self.extractors.contains_key(column)
    }

    /// Sets `column`'s filter to `text` using its registered extractor.
    ///
    /// Empty (after trim) text removes the column's entry entirely. Either way a new
    /// composite is published and the projection is re-evaluated. On error nothing changes.
    pub fn set_column_filter(&mut self, column: &C, text: &str) -> FilterResult<FilterStatus> {
        self.ensure_attached()?;
        let extractor = self
            .extractors
            .get(column)
            .cloned()
            .ok_or_else(|| FilterError::unknown_column(column))?;
        self.apply_filter(column.clone(), extractor, text)
    }

    /// Registers `extractor` for `column`, then sets the column's filter to `text`.
    pub fn set_column_filter_with(
        &mut self,
        column: C,
        extractor: Extractor<S>,
        text: &str,
    ) -> FilterResult<FilterStatus> {
        self.ensure_attached()?;
        self.extractors.insert(column.clone(), extractor.clone());
        self.apply_filter(column, extractor, text)
    }

    /// Same as setting empty text.
    pub fn clear_column_filter(&mut self, column: &C) -> FilterResult<FilterStatus> {
        self.set_column_filter(column, "")
    }

    pub fn is_column_filtered(&self, column: &C) -> bool {
        self.composite.is_active(column)
    }

    pub fn active_columns(&self) -> impl Iterator<Item = &C> + '_ {
        self.composite.active_columns()
    }

    /// Distinct values of `column` over the rows accepted by every *other* column's filter,
    /// sorted case-insensitively. Computed fresh on every call.
    pub fn distinct_values_for(&self, column: &C) -> FilterResult<Vec<String>> {
        let pipeline = self.view()?;
        let extractor = self
            .extractors
            .get(column)
            .ok_or_else(|| FilterError::unknown_column(column))?;
        Ok(self.candidates(pipeline, column, extractor))
    }

    /// As [`Self::distinct_values_for`] with an explicit extractor. Nothing is registered.
    pub fn distinct_values_with(
        &self,
        column: &C,
        extractor: &Extractor<S>,
    ) -> FilterResult<Vec<String>> {
        let pipeline = self.view()?;
        Ok(self.candidates(pipeline, column, extractor))
    }

    /// Rebuilds the projection after the managed collection was replaced wholesale,
    /// keeping the active filters.
    pub fn resync(&mut self) -> FilterResult<()> {
        let pipeline = self.pipeline.as_mut().ok_or(FilterError::NotAttached)?;
        if !pipeline.publish(self.composite.clone()) {
            pipeline.resync();
        }
        log::debug!(
            "resynced {} rows; {} visible under composite {}",
            pipeline.source().len(),
            pipeline.len(),
            self.composite.generation()
        );
        Ok(())
    }

    /// Follows the caller's sort request. `None` restores source order.
    pub fn set_order(&mut self, order: Option<RowOrder<S>>) -> FilterResult<()> {
        let pipeline = self.pipeline.as_mut().ok_or(FilterError::NotAttached)?;
        pipeline.set_order(order);
        Ok(())
    }

    /// Clears the underlying unfiltered collection, not just the visible projection.
    pub fn clear_rows(&mut self) -> FilterResult<()> {
        let pipeline = self.pipeline.as_mut().ok_or(FilterError::NotAttached)?;
        pipeline.source().clear();
        pipeline.resync();
        log::debug!("cleared managed collection");
        Ok(())
    }

    fn ensure_attached(&self) -> FilterResult<()> {
        self.view().map(|_| ())
    }

    fn apply_filter(
        &mut self,
        column: C,
        extractor: Extractor<S>,
        text: &str,
    ) -> FilterResult<FilterStatus> {
        let pipeline = self.pipeline.as_mut().ok_or(FilterError::NotAttached)?;

        let expression = FilterExpression::parse(text);
        let active = !expression.is_any();
        let next = if active {
            let predicate: SharedPredicate<S> = Rc::new(ColumnPredicate::from_expression(
                column.clone(),
                extractor,
                expression,
            ));
            self.composite.with_entry(column.clone(), Some(predicate))
        } else {
            self.composite.without_entry(&column)
        };

        pipeline.publish(next.clone());
        self.composite = next;
        log::debug!(
            "published composite {} ({:?} {}); {} active column(s), {} visible row(s)",
            self.composite.generation(),
            column,
            if active { "filtered" } else { "cleared" },
            self.composite.active_count(),
            pipeline.len()
        );

        if let Some(listener) = self.listener.as_mut() {
            listener.filter_state_changed(&column, active);
        }

        Ok(FilterStatus {
            active,
            visible_rows: pipeline.len(),
            generation: self.composite.generation(),
        })
    }

    fn candidates(
        &self,
        pipeline: &RowPipeline<S, C>,
        column: &C,
        extractor: &Extractor<S>,
    ) -> Vec<String> {
        // Excluded, not removed: the column's own filter never narrows its own candidates.
        let working = self.composite.with_excluded(column.clone());
        let values = pipeline.source().with_rows(|rows| {
            rows.iter()
                .filter(|row| working.evaluate(row))
                .map(|row| extractor.extract(row))
                .collect::<Vec<_>>()
        });
        let extracted = values.len();
        let candidates = distinct_sorted(values, &self.config.candidates);
        log::trace!(
            "{} candidate(s) for {column:?} from {extracted} surviving row(s)",
            candidates.len()
        );
        candidates
    }
}

impl<S: 'static, C: ColumnKey> Default for FilterEngine<S, C> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<S, C: fmt::Debug> fmt::Debug for FilterEngine<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterEngine")
            .field("config", &self.config)
            .field("columns", &self.extractors.keys().collect::<Vec<_>>())
            .field("composite", &self.composite)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        name: &'static str,
        city: &'static str,
    }

    fn row(name: &'static str, city: &'static str) -> Row {
        Row { name, city }
    }

    fn engine(rows: Vec<Row>) -> FilterEngine<Row, &'static str> {
        let mut engine = FilterEngine::default();
        engine.register_column("name", Extractor::new(|r: &Row| r.name.to_string()));
        engine.register_column("city", Extractor::new(|r: &Row| r.city.to_string()));
        engine.attach(RowSource::new(rows)).expect("attach");
        engine
    }

    fn visible(engine: &FilterEngine<Row, &'static str>) -> Vec<&'static str> {
        engine.view().expect("attached").map_visible(|r| r.name)
    }

    #[test]
    fn operations_fail_before_attach() {
        let mut engine: FilterEngine<Row, &str> = FilterEngine::default();
        engine.register_column("name", Extractor::new(|r: &Row| r.name.to_string()));

        assert_eq!(
            engine.set_column_filter(&"name", "x"),
            Err(FilterError::NotAttached)
        );
        assert_eq!(
            engine.distinct_values_for(&"name"),
            Err(FilterError::NotAttached)
        );
        assert_eq!(engine.resync(), Err(FilterError::NotAttached));
        assert_eq!(engine.clear_rows(), Err(FilterError::NotAttached));
        assert!(engine.view().is_err());
        assert!(engine.composite().is_empty());
    }

    #[test]
    fn unregistered_column_is_rejected_without_side_effects() {
        let mut engine = engine(vec![row("a", "x")]);
        let before = engine.composite().generation();

        let err = engine.set_column_filter(&"zip", "1").unwrap_err();
        assert_eq!(
            err,
            FilterError::UnknownColumn {
                column: "\"zip\"".to_string()
            }
        );
        assert!(err.is_configuration());
        assert_eq!(engine.composite().generation(), before);
        assert!(engine.distinct_values_for(&"zip").is_err());
    }

    #[test]
    fn set_with_registers_extractor_only_when_attached() {
        let mut detached: FilterEngine<Row, &str> = FilterEngine::default();
        let name = Extractor::new(|r: &Row| r.name.to_string());
        assert!(detached
            .set_column_filter_with("name", name.clone(), "a")
            .is_err());
        assert!(!detached.is_registered(&"name"));

        let mut engine: FilterEngine<Row, &str> = FilterEngine::default();
        engine
            .attach(RowSource::new(vec![row("ab", "x"), row("cd", "y")]))
            .expect("attach");
        let status = engine
            .set_column_filter_with("name", name, "a")
            .expect("filter");
        assert!(status.active);
        assert_eq!(status.visible_rows, 1);
        assert!(engine.is_registered(&"name"));
        assert_eq!(
            engine.distinct_values_for(&"name"),
            Ok(vec!["ab".to_string(), "cd".to_string()])
        );
    }

    #[test]
    fn empty_text_removes_the_entry() {
        let mut engine = engine(vec![row("Apple", "Oslo"), row("Banana", "Rome")]);
        engine.set_column_filter(&"name", "ap").expect("filter");
        assert!(engine.is_column_filtered(&"name"));

        let status = engine.set_column_filter(&"name", "   ").expect("clear");
        assert!(!status.active);
        assert!(!engine.composite().has_entry(&"name"));
        assert_eq!(visible(&engine), vec!["Apple", "Banana"]);
    }

    #[test]
    fn every_update_publishes_a_new_generation() {
        let mut engine = engine(vec![row("a", "x")]);
        let first = engine.set_column_filter(&"name", "a").expect("filter");
        let second = engine.set_column_filter(&"name", "a").expect("filter");
        let cleared = engine.clear_column_filter(&"city").expect("clear");

        assert_ne!(first.generation, second.generation);
        assert_ne!(second.generation, cleared.generation);
        assert_eq!(
            engine.view().expect("attached").applied_generation(),
            Some(cleared.generation)
        );
    }

    #[test]
    fn listener_receives_active_flag() {
        let log: Rc<RefCell<Vec<(&'static str, bool)>>> = Rc::default();
        let sink = Rc::clone(&log);

        let mut engine = engine(vec![row("a", "x")]);
        engine.set_listener(move |column: &&'static str, active: bool| {
            sink.borrow_mut().push((*column, active));
        });
        engine.set_column_filter(&"name", "a").expect("filter");
        engine.set_column_filter(&"city", "").expect("clear");

        assert_eq!(*log.borrow(), vec![("name", true), ("city", false)]);
    }

    #[test]
    fn candidates_ignore_own_filter_but_respect_others() {
        let mut engine = engine(vec![
            row("Apple", "Oslo"),
            row("Banana", "Rome"),
            row("apricot", "Oslo"),
        ]);
        engine.set_column_filter(&"name", "ap").expect("filter");

        assert_eq!(
            engine.distinct_values_for(&"name"),
            Ok(vec!["Apple".to_string(), "apricot".to_string(), "Banana".to_string()])
        );
        assert_eq!(
            engine.distinct_values_for(&"city"),
            Ok(vec!["Oslo".to_string()])
        );
    }

    #[test]
    fn candidates_use_explicit_extractor_without_registering() {
        let engine = engine(vec![row("a", "x"), row("b", "x")]);
        let upper = Extractor::new(|r: &Row| r.name.to_uppercase());

        assert_eq!(
            engine.distinct_values_with(&"shout", &upper),
            Ok(vec!["A".to_string(), "B".to_string()])
        );
        assert!(!engine.is_registered(&"shout"));
    }

    #[test]
    fn resync_keeps_filters_after_reload() {
        let source = RowSource::new(vec![row("Apple", "Oslo")]);
        let mut engine: FilterEngine<Row, &str> = FilterEngine::default();
        engine.register_column("name", Extractor::new(|r: &Row| r.name.to_string()));
        engine.attach(source.clone()).expect("attach");
        engine.set_column_filter(&"name", "an").expect("filter");
        assert_eq!(visible(&engine), Vec::<&str>::new());

        source.replace(vec![row("Banana", "Rome"), row("Mango", "Lima"), row("Fig", "Kyiv")]);
        engine.resync().expect("resync");

        assert_eq!(visible(&engine), vec!["Banana", "Mango"]);
        assert!(engine.is_column_filtered(&"name"));
    }

    #[test]
    fn clear_rows_empties_the_underlying_collection() {
        let source = RowSource::new(vec![row("Apple", "Oslo"), row("Banana", "Rome")]);
        let mut engine: FilterEngine<Row, &str> = FilterEngine::default();
        engine.register_column("name", Extractor::new(|r: &Row| r.name.to_string()));
        engine.attach(source.clone()).expect("attach");
        engine.set_column_filter(&"name", "ap").expect("filter");

        engine.clear_rows().expect("clear");
        assert!(source.is_empty());
        assert!(engine.view().expect("attached").is_empty());
        assert!(engine.is_column_filtered(&"name"));
    }

    #[test]
    fn foreign_pipeline_is_rejected() {
        let mut engine: FilterEngine<Row, &str> = FilterEngine::default();
        let predicate: SharedPredicate<Row> = Rc::new(|r: &Row| r.city == "Oslo");
        let pipeline =
            RowPipeline::with_foreign_filter(RowSource::new(vec![row("a", "Oslo")]), predicate);

        let err = engine.attach_pipeline(pipeline).unwrap_err();
        assert!(matches!(err, FilterError::UnexpectedWrapping { .. }));
        assert!(!err.is_configuration());
        assert!(!engine.is_attached());
    }

    #[test]
    fn filters_survive_detach_and_reattach() {
        let mut engine = engine(vec![row("Apple", "Oslo"), row("Banana", "Rome")]);
        engine.set_column_filter(&"city", "rome").expect("filter");
        let pipeline = engine.detach().expect("attached");
        assert!(!engine.is_attached());

        engine.attach(pipeline.source().clone()).expect("reattach");
        assert_eq!(visible(&engine), vec!["Banana"]);
    }

    #[test]
    fn set_order_sorts_the_projection() {
        let mut engine = engine(vec![row("b", "x"), row("C", "x"), row("a", "x")]);
        engine
            .set_order(Some(RowOrder::new(|a: &Row, b: &Row| {
                crate::cmp_case_insensitive(a.name, b.name)
            })))
            .expect("order");
        assert_eq!(visible(&engine), vec!["a", "b", "C"]);

        engine.set_column_filter(&"name", "<c").expect("filter");
        assert_eq!(visible(&engine), vec!["a", "b"]);
    }
}
