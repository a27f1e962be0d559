use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct EngineConfig {
    pub candidates: CandidateOptions,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// How candidate-value lists are built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CandidateOptions {
    /// Collapse values that differ only in case, keeping the first one in collection order.
    pub fold_case_duplicates: bool,
    /// Keep empty (after trim) values.
    pub include_blank: bool,
    /// Truncate the sorted list to at most this many values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Default for CandidateOptions {
    fn default() -> Self {
        Self {
            fold_case_duplicates: false,
            include_blank: true,
            limit: None,
        }
    }
}
