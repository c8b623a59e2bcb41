//! Pipeline definitions.
//!
//! A pipeline is an ordered list of action names. Actions run strictly in
//! that order and the first failure stops the rest.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::action::ActionSpec;

/// A configured pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,

    /// Actions to run, in order
    pub actions: Vec<String>,
}

impl PipelineSpec {
    /// Validate the pipeline against the defined actions
    pub fn validate(&self, name: &str, actions: &BTreeMap<String, ActionSpec>) -> Result<()> {
        if self.actions.is_empty() {
            anyhow::bail!("Pipeline '{}' must have at least one action", name);
        }

        for (i, action) in self.actions.iter().enumerate() {
            if action.trim().is_empty() {
                anyhow::bail!("Pipeline '{}': action {} has an empty name", name, i);
            }
            if !actions.contains_key(action) {
                anyhow::bail!(
                    "Pipeline '{}' references non-existent action '{}'",
                    name,
                    action
                );
            }
        }

        Ok(())
    }
}
