//! Agent descriptor registry
//!
//! Maps stable agent identities to ports and launch specifications. Descriptors
//! come either from explicit config entries or from a non-recursive scan of an
//! agents directory using a file-stem suffix convention. Both paths produce the
//! same deterministic lexicographic ordering, which is also the launch order.

use crate::config::AgentsConfig;
use crate::error::{ForgeError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// How to start an agent process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
}

/// Immutable description of one worker agent. Identity = `name`.
#[derive(Debug, Clone, Serialize)]
pub struct AgentDescriptor {
    pub name: String,
    /// Where the descriptor came from (entry-point path or "config")
    pub source_ref: String,
    pub port: u16,
    /// Per-agent environment overrides; win over the batch snapshot
    pub env: HashMap<String, String>,
    pub launch: LaunchSpec,
}

impl AgentDescriptor {
    /// Base URL of the agent's HTTP endpoint
    pub fn endpoint(&self, host: &str) -> String {
        format!("http://{}:{}", host, self.port)
    }
}

/// Ordered, duplicate-checked set of agent descriptors
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    descriptors: Vec<AgentDescriptor>,
}

impl AgentRegistry {
    /// Build the registry the way the config asks: explicit entries when any
    /// are present, otherwise a filesystem scan of the agents directory.
    pub fn from_config(config: &AgentsConfig) -> Result<Self> {
        if config.entries.is_empty() {
            Self::discover(&config.dir, &config.suffix, config)
        } else {
            Self::from_entries(config)
        }
    }

    /// Explicit startup-time registry: identity -> port -> launch spec.
    pub fn from_entries(config: &AgentsConfig) -> Result<Self> {
        let mut descriptors: Vec<AgentDescriptor> = config
            .entries
            .iter()
            .map(|entry| {
                let mut env = entry.env.clone();
                env.entry("PORT".to_string())
                    .or_insert_with(|| entry.port.to_string());
                AgentDescriptor {
                    name: entry.name.clone(),
                    source_ref: "config".to_string(),
                    port: entry.port,
                    env,
                    launch: LaunchSpec {
                        program: entry.program.clone(),
                        args: entry.args.clone(),
                    },
                }
            })
            .collect();

        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        Self::checked(descriptors)
    }

    /// Scan one directory (non-recursive) for entries whose file stem ends
    /// with `suffix`. Malformed entries are skipped and logged, never fatal;
    /// two descriptors resolving to the same port are a configuration error.
    pub fn discover(directory: &Path, suffix: &str, config: &AgentsConfig) -> Result<Self> {
        let mut names: Vec<(String, String)> = Vec::new();

        let entries = std::fs::read_dir(directory).map_err(|e| {
            ForgeError::ConfigInvalid(format!(
                "cannot read agents directory {}: {}",
                directory.display(),
                e
            ))
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!("Skipping agent entry with unreadable name: {:?}", path);
                continue;
            };
            if !stem.ends_with(suffix) {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            names.push((file_name, stem.to_string()));
        }

        // Launch order is the lexicographic file-name order, stable across runs
        names.sort_by(|a, b| a.0.cmp(&b.0));

        let mut descriptors = Vec::with_capacity(names.len());
        for (file_name, name) in names {
            let Some(port) = config.ports.get(&name).copied() else {
                warn!("Skipping agent '{}': no port configured", name);
                continue;
            };

            let source_ref = directory.join(&file_name).to_string_lossy().into_owned();
            let launch = match &config.runner {
                Some(runner) => LaunchSpec {
                    program: runner.clone(),
                    args: vec![source_ref.clone()],
                },
                None => LaunchSpec {
                    program: source_ref.clone(),
                    args: Vec::new(),
                },
            };

            let mut env = HashMap::new();
            env.insert("PORT".to_string(), port.to_string());

            debug!("Discovered agent '{}' on port {}", name, port);
            descriptors.push(AgentDescriptor {
                name,
                source_ref,
                port,
                env,
                launch,
            });
        }

        Self::checked(descriptors)
    }

    fn checked(descriptors: Vec<AgentDescriptor>) -> Result<Self> {
        let mut seen: HashMap<u16, &str> = HashMap::new();
        for d in &descriptors {
            if let Some(other) = seen.insert(d.port, &d.name) {
                return Err(ForgeError::ConfigInvalid(format!(
                    "agents '{}' and '{}' resolve to the same port {}",
                    other, d.name, d.port
                )));
            }
        }
        Ok(Self { descriptors })
    }

    /// Descriptors in launch order
    pub fn descriptors(&self) -> &[AgentDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<&AgentDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
