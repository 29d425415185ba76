//! Session configuration.

use plwasm_runtime::{AllowAll, DangerousFunctionGate, DenyAll, RuntimeLimits};
use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Virtual directories searched by `#include` when nothing else is configured.
pub const DEFAULT_INCLUDE_PATHS: [&str; 2] = ["/sources/includes", "/sources/patterns"];

/// Configuration fixed when a session is initialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directories searched by `#include`, in priority order.
    #[serde(default = "default_include_paths")]
    pub include_paths: Vec<String>,

    /// What happens when a script calls a dangerous function.
    #[serde(default)]
    pub dangerous_functions: DangerousFunctionPolicy,

    /// Evaluation limits handed to the runtime.
    #[serde(default)]
    pub limits: RuntimeLimits,
}

fn default_include_paths() -> Vec<String> {
    DEFAULT_INCLUDE_PATHS.iter().map(|p| p.to_string()).collect()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            include_paths: default_include_paths(),
            dangerous_functions: DangerousFunctionPolicy::default(),
            limits: RuntimeLimits::default(),
        }
    }
}

impl SessionConfig {
    /// Parses configuration from a JSON string. Missing fields take their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        serde_json::from_str(json)
            .map_err(|e| SessionError::config(format!("Invalid JSON: {}", e)))
    }
}

/// Built-in policies for the dangerous function gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DangerousFunctionPolicy {
    /// Every dangerous call aborts the script.
    #[default]
    Deny,
    /// Every dangerous call proceeds.
    Allow,
}

impl DangerousFunctionPolicy {
    pub fn gate(self) -> Box<dyn DangerousFunctionGate> {
        match self {
            Self::Deny => Box::new(DenyAll),
            Self::Allow => Box::new(AllowAll),
        }
    }
}
