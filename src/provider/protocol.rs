use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::diagnostics::Diagnostics;
use crate::config::ProviderSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    #[default]
    Resource,
    DataSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Validate,
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Validate => "validate",
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Import => "import",
        };
        f.write_str(name)
    }
}

/// One operation requested by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Provider block; missing values fall back to the environment
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub kind: TargetKind,
    pub type_name: String,
    pub operation: Operation,
    /// Planned state for create/update, configuration for validate and data sources
    #[serde(default)]
    pub planned_state: Option<Value>,
    /// Current state for read/update/delete
    #[serde(default)]
    pub prior_state: Option<Value>,
    #[serde(default)]
    pub import_id: Option<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// Result of one operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub new_state: Option<Value>,
    /// The object no longer exists and should be dropped from state
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub diagnostics: Diagnostics,
}

impl ProviderResponse {
    pub fn failed(diagnostics: Diagnostics) -> Self {
        Self {
            new_state: None,
            removed: false,
            diagnostics,
        }
    }

    pub fn has_error(&self) -> bool {
        self.diagnostics.has_error()
    }
}
