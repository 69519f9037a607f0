use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::focus_table::{Decision, FocusPolicyTable};
use crate::models::error::FocusError;
use crate::models::stream_info::StreamCategory;

/// One override row in a policy file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub existing: StreamCategory,
    pub incoming: StreamCategory,
    pub decision: Decision,
}

/// On-disk policy overrides.
///
/// ```json
/// { "rules": [ { "existing": "music", "incoming": "game", "decision": "coexist" } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTableConfig {
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

impl PolicyTableConfig {
    pub fn from_json(json: &str) -> Result<Self, FocusError> {
        serde_json::from_str(json)
            .map_err(|e| FocusError::InvalidParam(format!("failed to parse policy table: {}", e)))
    }

    pub fn to_json(&self) -> Result<String, FocusError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| FocusError::Operation(format!("failed to serialize policy table: {}", e)))
    }

    /// Later rules win when the same pair appears twice.
    pub fn into_table(self) -> FocusPolicyTable {
        let mut overrides = HashMap::with_capacity(self.rules.len());
        for rule in self.rules {
            if overrides
                .insert((rule.existing, rule.incoming), rule.decision)
                .is_some()
            {
                log::warn!(
                    "duplicate policy rule for ({:?}, {:?}), keeping the last one",
                    rule.existing,
                    rule.incoming
                );
            }
        }
        FocusPolicyTable::with_overrides(overrides)
    }
}

/// Load a policy table from a JSON override file.
pub fn load_policy_table(path: &Path) -> Result<FocusPolicyTable, FocusError> {
    let json = fs::read_to_string(path)
        .map_err(|e| FocusError::Operation(format!("failed to read policy table: {}", e)))?;
    let config = PolicyTableConfig::from_json(&json)?;
    log::info!(
        "loaded {} policy overrides from {}",
        config.rules.len(),
        path.display()
    );
    Ok(config.into_table())
}
