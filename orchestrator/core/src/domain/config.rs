// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Orchestrator Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) holding:
// - swarm execution bounds and repetitive-handoff detection
// - task graph timeouts and dispatch parallelism
// - human checkpoint expiry
// - knowledge access and logging settings

use crate::domain::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "vulnagent.dev/v1";
pub const KIND: &str = "OrchestratorConfig";
pub const CONFIG_PATH_ENV: &str = "VULNAGENT_CONFIG_PATH";

/// Top-level orchestrator configuration manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfigManifest {
    /// API version (must be "vulnagent.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "OrchestratorConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: OrchestratorSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorSpec {
    #[serde(default)]
    pub swarm: SwarmBounds,

    #[serde(default)]
    pub workflow: WorkflowLimits,

    #[serde(default)]
    pub checkpoints: CheckpointConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

/// Hard bounds on a handoff swarm.
///
/// A `repetitive_handoff_detection_window` of zero disables repetition
/// detection. `max_handoffs` may be zero, which turns a swarm into a single
/// agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmBounds {
    #[serde(default = "default_max_handoffs")]
    pub max_handoffs: u32,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_swarm_execution_timeout", with = "humantime_serde")]
    pub execution_timeout: Duration,

    #[serde(default = "default_node_timeout", with = "humantime_serde")]
    pub node_timeout: Duration,

    #[serde(default = "default_detection_window")]
    pub repetitive_handoff_detection_window: usize,

    #[serde(default = "default_min_unique_agents")]
    pub repetitive_handoff_min_unique_agents: usize,
}

impl Default for SwarmBounds {
    fn default() -> Self {
        Self {
            max_handoffs: default_max_handoffs(),
            max_iterations: default_max_iterations(),
            execution_timeout: default_swarm_execution_timeout(),
            node_timeout: default_node_timeout(),
            repetitive_handoff_detection_window: default_detection_window(),
            repetitive_handoff_min_unique_agents: default_min_unique_agents(),
        }
    }
}

impl SwarmBounds {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_iterations == 0 {
            return Err(ValidationError::InvalidBounds(
                "max_iterations must be at least 1".into(),
            ));
        }
        check_timeouts(self.node_timeout, self.execution_timeout)?;

        let window = self.repetitive_handoff_detection_window;
        let min_unique = self.repetitive_handoff_min_unique_agents;
        if window > 0 {
            if min_unique == 0 {
                return Err(ValidationError::InvalidBounds(
                    "repetitive_handoff_min_unique_agents must be at least 1 when detection is enabled".into(),
                ));
            }
            if min_unique > window {
                return Err(ValidationError::InvalidBounds(format!(
                    "detection window {window} cannot contain {min_unique} unique agents"
                )));
            }
        }
        Ok(())
    }

    pub fn detection_enabled(&self) -> bool {
        self.repetitive_handoff_detection_window > 0
    }
}

/// Bounds on a task graph run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowLimits {
    #[serde(default = "default_node_timeout", with = "humantime_serde")]
    pub node_timeout: Duration,

    #[serde(default = "default_workflow_execution_timeout", with = "humantime_serde")]
    pub execution_timeout: Duration,

    /// Upper bound on tasks dispatched concurrently.
    #[serde(default = "default_max_parallel_tasks")]
    pub max_parallel_tasks: usize,
}

impl Default for WorkflowLimits {
    fn default() -> Self {
        Self {
            node_timeout: default_node_timeout(),
            execution_timeout: default_workflow_execution_timeout(),
            max_parallel_tasks: default_max_parallel_tasks(),
        }
    }
}

impl WorkflowLimits {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_parallel_tasks == 0 {
            return Err(ValidationError::InvalidBounds(
                "max_parallel_tasks must be at least 1".into(),
            ));
        }
        check_timeouts(self.node_timeout, self.execution_timeout)
    }
}

fn check_timeouts(node: Duration, execution: Duration) -> Result<(), ValidationError> {
    if node.is_zero() || execution.is_zero() {
        return Err(ValidationError::InvalidBounds(
            "timeouts must be greater than zero".into(),
        ));
    }
    if node > execution {
        return Err(ValidationError::InvalidBounds(format!(
            "node_timeout {node:?} exceeds execution_timeout {execution:?}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Unanswered checkpoints older than this are discarded. `None` keeps
    /// them until resumed or abandoned.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Actor whose namespace records are read from and written to.
    #[serde(default = "default_actor_id")]
    pub actor_id: String,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            actor_id: default_actor_id(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Explicit values (command line or environment) win over the file.
    pub fn with_overrides(mut self, level: Option<String>, format: Option<String>) -> Self {
        if let Some(level) = level {
            self.level = level;
        }
        if let Some(format) = format {
            self.format = format;
        }
        self
    }
}

fn default_true() -> bool {
    true
}

fn default_max_handoffs() -> u32 {
    20
}

fn default_max_iterations() -> u32 {
    20
}

fn default_swarm_execution_timeout() -> Duration {
    Duration::from_secs(900)
}

fn default_workflow_execution_timeout() -> Duration {
    Duration::from_secs(1800)
}

fn default_node_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_detection_window() -> usize {
    8
}

fn default_min_unique_agents() -> usize {
    3
}

fn default_max_parallel_tasks() -> usize {
    4
}

fn default_actor_id() -> String {
    "default".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for OrchestratorConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "vulnagent".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: OrchestratorSpec::default(),
        }
    }
}

impl OrchestratorConfigManifest {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover a configuration file using precedence order
    /// 1. VULNAGENT_CONFIG_PATH environment variable
    /// 2. ./vulnagent-config.yaml (working directory)
    /// 3. ~/.vulnagent/config.yaml (user home)
    /// 4. /etc/vulnagent/config.yaml (Unix only)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./vulnagent-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".vulnagent").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/vulnagent/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, falling back to defaults.
    ///
    /// An explicit path must exist and parse.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?
        } else if let Some(path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", path);
            Self::from_yaml_file(path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Logging settings from `observability.logging`, or the defaults.
    pub fn logging(&self) -> LoggingConfig {
        self.spec
            .observability
            .as_ref()
            .map(|o| o.logging.clone())
            .unwrap_or_default()
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let override_u32 = |key: &str, slot: &mut u32| {
            if let Some(val) = lookup(key) {
                match val.trim().parse::<u32>() {
                    Ok(parsed) => {
                        tracing::info!("Environment override: {}={}", key, parsed);
                        *slot = parsed;
                    }
                    Err(_) => {
                        tracing::warn!("Invalid value for {}: '{}'. Expected an integer. Ignoring.", key, val);
                    }
                }
            }
        };
        override_u32("VULNAGENT_MAX_HANDOFFS", &mut self.spec.swarm.max_handoffs);
        override_u32("VULNAGENT_MAX_ITERATIONS", &mut self.spec.swarm.max_iterations);

        if let Some(val) = lookup("VULNAGENT_KNOWLEDGE_ENABLED") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => self.spec.knowledge.enabled = true,
                "false" | "0" | "no" | "off" => self.spec.knowledge.enabled = false,
                _ => tracing::warn!(
                    "Invalid value for VULNAGENT_KNOWLEDGE_ENABLED: '{}'. Expected true/false. Ignoring.",
                    val
                ),
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }
        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }
        if self.metadata.name.trim().is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }
        self.spec.swarm.validate()?;
        self.spec.workflow.validate()?;
        if self.spec.knowledge.actor_id.trim().is_empty() {
            anyhow::bail!("spec.knowledge.actor_id cannot be empty");
        }
        if let Some(obs) = &self.spec.observability {
            if !matches!(obs.logging.format.as_str(), "text" | "json") {
                anyhow::bail!(
                    "Invalid log format '{}'. Must be 'text' or 'json'",
                    obs.logging.format
                );
            }
        }
        Ok(())
    }
}
