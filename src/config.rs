use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub agents: AgentsConfig,
    #[serde(default)]
    pub launcher: LauncherConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub feasibility: FeasibilityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Front-facing API server
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    9000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_server_port(),
        }
    }
}

/// Agent fleet configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentsConfig {
    /// Directory scanned for agent entry points (non-recursive)
    #[serde(default = "default_agents_dir")]
    pub dir: PathBuf,
    /// File-stem suffix that marks an entry as an agent
    #[serde(default = "default_agent_suffix")]
    pub suffix: String,
    /// Interpreter used to run discovered entry points (e.g. "python3").
    /// When unset, the entry point is executed directly.
    #[serde(default)]
    pub runner: Option<String>,
    /// Port per agent name; a discovered entry with no port here is skipped
    #[serde(default)]
    pub ports: HashMap<String, u16>,
    /// Explicit registry entries (take precedence over filesystem discovery)
    #[serde(default)]
    pub entries: Vec<AgentEntry>,
    /// Environment passed to every agent, merged under descriptor overrides
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Host agents listen on, used to build endpoint URLs
    #[serde(default = "default_agent_host")]
    pub host: String,
}

fn default_agents_dir() -> PathBuf {
    PathBuf::from("agents")
}

fn default_agent_suffix() -> String {
    "_agent".to_string()
}

fn default_agent_host() -> String {
    "127.0.0.1".to_string()
}

/// One explicitly registered agent: identity -> port -> launch specification
#[derive(Debug, Clone, Deserialize)]
pub struct AgentEntry {
    pub name: String,
    pub port: u16,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Process launcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LauncherConfig {
    /// How a launched process is confirmed alive
    #[serde(default)]
    pub liveness: LivenessPolicy,
    /// Grace period for shutdown escalation, in seconds
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            liveness: LivenessPolicy::default(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

/// Deterministic liveness confirmation policy for a launched agent
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LivenessPolicy {
    /// Process still running after the window => Running
    GraceWindow {
        #[serde(default = "default_grace_window_ms")]
        ms: u64,
    },
    /// GET /health on the agent port must respond
    HealthProbe {
        #[serde(default = "default_probe_timeout_ms")]
        timeout_ms: u64,
    },
}

fn default_grace_window_ms() -> u64 {
    250
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        LivenessPolicy::GraceWindow {
            ms: default_grace_window_ms(),
        }
    }
}

/// Per-stage time budgets and session limits
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Budget for extraction / projection / classification calls
    #[serde(default = "default_short_budget_ms")]
    pub short_budget_ms: u64,
    /// Budget for generation / composition / publication calls
    #[serde(default = "default_medium_budget_ms")]
    pub medium_budget_ms: u64,
    /// Reference budget used when the caller supplies none
    #[serde(default = "default_reference_budget_ms")]
    pub reference_budget_ms: u64,
    /// Reference cap used when the caller supplies none
    #[serde(default = "default_max_references")]
    pub max_references: usize,
    /// Overall session deadline; partial results are returned at expiry
    #[serde(default = "default_session_deadline_ms")]
    pub session_deadline_ms: u64,
}

fn default_short_budget_ms() -> u64 {
    5_000
}

fn default_medium_budget_ms() -> u64 {
    30_000
}

fn default_reference_budget_ms() -> u64 {
    10_000
}

fn default_max_references() -> usize {
    6
}

fn default_session_deadline_ms() -> u64 {
    120_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            short_budget_ms: default_short_budget_ms(),
            medium_budget_ms: default_medium_budget_ms(),
            reference_budget_ms: default_reference_budget_ms(),
            max_references: default_max_references(),
            session_deadline_ms: default_session_deadline_ms(),
        }
    }
}

/// Feasibility scoring configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeasibilityConfig {
    /// Overall score at or above this passes
    #[serde(default = "default_feasibility_threshold")]
    pub threshold: f64,
    /// Weight per scoring parameter, normalized before use
    #[serde(default = "default_feasibility_weights")]
    pub weights: HashMap<String, f64>,
}

fn default_feasibility_threshold() -> f64 {
    75.0
}

fn default_feasibility_weights() -> HashMap<String, f64> {
    [
        ("cost", 0.2),
        ("ethics", 0.2),
        ("market", 0.25),
        ("tech", 0.2),
        ("timing", 0.15),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

impl Default for FeasibilityConfig {
    fn default() -> Self {
        Self {
            threshold: default_feasibility_threshold(),
            weights: default_feasibility_weights(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("agents.dir", "agents")?
            .set_default("agents.suffix", "_agent")?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("IDEAFORGE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (IDEAFORGE_SERVER__PORT, etc.)
            .add_source(
                Environment::with_prefix("IDEAFORGE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // Duplicate ports across the whole fleet are fatal before any spawn
        let mut seen: HashMap<u16, &str> = HashMap::new();
        for entry in &self.agents.entries {
            if let Some(other) = seen.insert(entry.port, &entry.name) {
                errors.push(format!(
                    "duplicate agent port {}: '{}' and '{}'",
                    entry.port, other, entry.name
                ));
            }
        }
        for (name, port) in &self.agents.ports {
            if self.agents.entries.iter().any(|e| &e.name == name) {
                continue; // explicit entry wins, already checked
            }
            if let Some(other) = seen.insert(*port, name) {
                errors.push(format!(
                    "duplicate agent port {}: '{}' and '{}'",
                    port, other, name
                ));
            }
        }

        if !(0.0..=100.0).contains(&self.feasibility.threshold) {
            errors.push("feasibility.threshold must be within [0, 100]".to_string());
        }

        if self.feasibility.weights.values().any(|w| *w < 0.0) {
            errors.push("feasibility.weights must be non-negative".to_string());
        }

        if self.launcher.shutdown_grace_secs == 0 {
            errors.push("launcher.shutdown_grace_secs must be positive".to_string());
        }

        if self.pipeline.max_references == 0 {
            errors.push("pipeline.max_references must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
