use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("no row collection is attached to the filter engine")]
    NotAttached,
    #[error("no value extractor registered for column {column}")]
    UnknownColumn { column: String },
    #[error("unexpected row pipeline: {reason}")]
    UnexpectedWrapping { reason: String },
}

impl FilterError {
    pub(crate) fn unknown_column(column: &impl std::fmt::Debug) -> Self {
        FilterError::UnknownColumn {
            column: format!("{column:?}"),
        }
    }

    /// `true` for setup mistakes by the caller (missing collection or column registration),
    /// as opposed to a pipeline of the wrong shape.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FilterError::NotAttached | FilterError::UnknownColumn { .. }
        )
    }
}

pub type FilterResult<T> = Result<T, FilterError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid engine config: {0}")]
    Json(#[from] serde_json::Error),
}
