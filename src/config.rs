//! Engine configuration, loadable from TOML.
//!
//! ```toml
//! max_rule_steps = 64
//! check_invariants = true
//! max_system_moves = 8
//! clarification = "reprompt-relevant"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How the engine reacts to an answer that does not resolve the question
/// in focus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClarificationStrategy {
    /// Always push a clarification question above the original.
    #[default]
    AlwaysClarify,
    /// Clarify answers of the right shape; re-ask the original question
    /// when the answer is not even relevant.
    RepromptRelevant,
}

/// Tunables for the dialogue move engine and session loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmeConfig {
    /// Fixpoint guard: rule applications allowed per phase invocation.
    #[serde(default = "default_max_rule_steps")]
    pub max_rule_steps: usize,
    /// Check state invariants after every integrate and select.
    #[serde(default = "default_check_invariants")]
    pub check_invariants: bool,
    /// System moves allowed in one turn before the session gives up.
    #[serde(default = "default_max_system_moves")]
    pub max_system_moves: usize,
    #[serde(default)]
    pub clarification: ClarificationStrategy,
}

fn default_max_rule_steps() -> usize {
    64
}
fn default_check_invariants() -> bool {
    true
}
fn default_max_system_moves() -> usize {
    8
}

impl Default for DmeConfig {
    fn default() -> Self {
        Self {
            max_rule_steps: default_max_rule_steps(),
            check_invariants: default_check_invariants(),
            max_system_moves: default_max_system_moves(),
            clarification: ClarificationStrategy::default(),
        }
    }
}

impl DmeConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn with_clarification(mut self, strategy: ClarificationStrategy) -> Self {
        self.clarification = strategy;
        self
    }

    pub fn with_invariant_checks(mut self, enabled: bool) -> Self {
        self.check_invariants = enabled;
        self
    }
}
