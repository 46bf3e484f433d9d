use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grouping::GroupingPolicy;
use crate::sorting::SortingPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Host-facing knobs of the [`GroupManager`](crate::manager::GroupManager).
///
/// Every field can also be changed at runtime through the manager's setters;
/// this struct only captures the initial state, typically read from the
/// host's TOML configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GroupManagerSettings {
    /// Only show tasks on the current virtual desktop.
    #[serde(default)]
    pub show_only_current_desktop: bool,
    /// Only show tasks on the current screen.
    #[serde(default)]
    pub show_only_current_screen: bool,
    /// Only show minimized tasks.
    #[serde(default)]
    pub show_only_minimized: bool,
    /// Defer program grouping until `group_full_limit` tasks are known.
    #[serde(default)]
    pub only_group_when_full: bool,
    #[serde(default = "default_full_limit")]
    pub group_full_limit: usize,
    #[serde(default)]
    pub grouping_strategy: GroupingPolicy,
    #[serde(default)]
    pub sorting_strategy: SortingPolicy,
}

fn default_full_limit() -> usize {
    10
}

impl Default for GroupManagerSettings {
    fn default() -> Self {
        Self {
            show_only_current_desktop: false,
            show_only_current_screen: false,
            show_only_minimized: false,
            only_group_when_full: false,
            group_full_limit: default_full_limit(),
            grouping_strategy: GroupingPolicy::default(),
            sorting_strategy: SortingPolicy::default(),
        }
    }
}

impl GroupManagerSettings {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        Ok(Self::from_toml_str(&raw)?)
    }
}
