use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Resolved CLI configuration (SPEC_FULL.md §3, "Configuration"): store
/// paths, adapter capacity, task-scheduler tick interval, and the
/// role -> `provider_id/model` assignments a preset's nodes resolve
/// against. Mirrors `sa_domain::config::Config`'s per-section layout with
/// `#[serde(default)]` throughout, so a missing file or a partially
/// filled-in one both produce a usable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub adapter: AdapterConfig,
    #[serde(default)]
    pub tasks: TasksRuntimeConfig,
    /// `role -> "provider_id/model"`, the same shape
    /// `ProviderRegistry::assign_role` expects. No concrete provider
    /// adapters ship with this binary (out of scope, spec.md §1) — these
    /// assignments only take effect once a caller registers matching
    /// `LlmProvider` implementations before calling [`crate::run::run`].
    #[serde(default)]
    pub roles: HashMap<String, String>,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self { store: StoreConfig::default(), adapter: AdapterConfig::default(), tasks: TasksRuntimeConfig::default(), roles: HashMap::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./lab-data")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default = "default_max_concurrent_conversations")]
    pub max_concurrent_conversations: usize,
}

fn default_max_concurrent_conversations() -> usize {
    16
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self { max_concurrent_conversations: default_max_concurrent_conversations() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksRuntimeConfig {
    #[serde(default = "default_tick_interval_seconds")]
    pub tick_interval_seconds: u64,
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: u32,
}

fn default_tick_interval_seconds() -> u64 {
    60
}

fn default_max_concurrent_tasks() -> u32 {
    4
}

impl Default for TasksRuntimeConfig {
    fn default() -> Self {
        Self { tick_interval_seconds: default_tick_interval_seconds(), max_concurrent_tasks: default_max_concurrent_tasks() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Warning => "warning",
            ConfigSeverity::Error => "error",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

impl LabConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.adapter.max_concurrent_conversations == 0 {
            issues.push(ConfigIssue { severity: ConfigSeverity::Error, message: "adapter.max_concurrent_conversations must be > 0".into() });
        }
        if self.tasks.tick_interval_seconds == 0 {
            issues.push(ConfigIssue { severity: ConfigSeverity::Error, message: "tasks.tick_interval_seconds must be > 0".into() });
        }
        if self.tasks.max_concurrent_tasks == 0 {
            issues.push(ConfigIssue { severity: ConfigSeverity::Error, message: "tasks.max_concurrent_tasks must be > 0".into() });
        }
        if self.roles.is_empty() {
            issues.push(ConfigIssue { severity: ConfigSeverity::Warning, message: "no [roles] assigned — every node turn will record a provider-not-found error event".into() });
        }
        issues
    }
}

/// Loads the config at `LAB_CONFIG` (or `lab.toml` in the working
/// directory), falling back to defaults when the file is absent.
pub fn load_config() -> anyhow::Result<(LabConfig, String)> {
    let path = std::env::var("LAB_CONFIG").unwrap_or_else(|_| "lab.toml".into());
    let config = if std::path::Path::new(&path).exists() {
        let raw = std::fs::read_to_string(&path).map_err(|e| anyhow::anyhow!("reading {path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {path}: {e}"))?
    } else {
        LabConfig::default()
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_empty_toml() {
        let config: LabConfig = toml::from_str("").unwrap();
        assert_eq!(config.adapter.max_concurrent_conversations, 16);
        assert_eq!(config.tasks.tick_interval_seconds, 60);
    }

    #[test]
    fn zero_tick_interval_is_an_error() {
        let mut config = LabConfig::default();
        config.tasks.tick_interval_seconds = 0;
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn missing_roles_is_a_warning_not_an_error() {
        let config = LabConfig::default();
        let issues = config.validate();
        assert!(issues.iter().all(|i| i.severity != ConfigSeverity::Error));
        assert!(issues.iter().any(|i| i.severity == ConfigSeverity::Warning));
    }
}
