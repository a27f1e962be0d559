#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! Per-column filtering for tabular row collections.
//!
//! Every column of a table can carry one independent filter expression. The rows shown are
//! exactly those accepted by all active column filters at once (a [`CompositePredicate`]),
//! while the candidate values offered for a column are computed as if that column's own
//! filter were not applied.
//!
//! The crate is organised leaf-first:
//! - [`matcher`] evaluates one text value against one expression (substring or `>`/`<` bound).
//! - [`ColumnPredicate`] binds an expression to a column and a value [`Extractor`].
//! - [`CompositePredicate`] is the copy-on-write conjunction of all column predicates.
//! - [`RowPipeline`] is the three-stage projection (raw [`RowSource`] → filtered → ordered).
//! - [`FilterEngine`] orchestrates the above for a host UI (the "collaborator").
//!
//! ## Threading
//!
//! Everything here is single-threaded and synchronous. Shared handles use `Rc`/`RefCell`, so
//! none of the types are `Send`; hosts drive the engine from the thread that owns the view.

mod candidates;
mod column;
mod composite;
mod config;
mod engine;
mod error;
pub mod matcher;
mod pipeline;
mod source;

pub use crate::candidates::{cmp_case_insensitive, narrow_candidates};
pub use crate::column::{ColumnKey, ColumnPredicate, Extractor, RowPredicate};
pub use crate::composite::{CompositePredicate, Generation, SharedPredicate};
pub use crate::config::{CandidateOptions, EngineConfig};
pub use crate::engine::{FilterEngine, FilterListener, FilterStatus};
pub use crate::error::{ConfigError, FilterError, FilterResult};
pub use crate::matcher::{FilterExpression, Relation};
pub use crate::pipeline::{RowOrder, RowPipeline};
pub use crate::source::RowSource;
