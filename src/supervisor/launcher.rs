//! Process launcher
//!
//! Starts one OS process per agent descriptor, each in its own process group
//! so the shutdown coordinator can signal the whole group. The environment is
//! an explicit snapshot assembled immediately before each launch batch and
//! passed by value; descriptor overrides win on conflict. A spawn failure is
//! isolated to its agent and never aborts the rest of the batch.

use crate::config::{AgentsConfig, LauncherConfig, LivenessPolicy};
use crate::supervisor::registry::{AgentDescriptor, AgentRegistry};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Lifecycle states of a managed agent process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    /// Spawned, liveness not yet confirmed
    Starting,
    /// Confirmed alive
    Running,
    /// Stop signal sent, waiting for exit
    Stopping,
    /// Exited (gracefully or force-killed)
    Stopped,
    /// Spawn failed or process died before confirmation
    Failed,
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Stopped | ProcessState::Failed)
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessState::Starting => write!(f, "starting"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Stopping => write!(f, "stopping"),
            ProcessState::Stopped => write!(f, "stopped"),
            ProcessState::Failed => write!(f, "failed"),
        }
    }
}

/// Handle to one managed agent process. Owned by the supervisor; mutated only
/// by the launcher (Starting -> Running|Failed) and the shutdown coordinator
/// (Running -> Stopping -> Stopped).
pub struct ProcessHandle {
    pub descriptor: AgentDescriptor,
    pub pid: u32,
    /// Process group id; equals the pid because the child leads its own group
    pub group_id: i32,
    state: ProcessState,
    pub(crate) child: Option<Child>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ProcessHandle {
    fn failed(descriptor: AgentDescriptor, error: String) -> Self {
        Self {
            descriptor,
            pid: 0,
            group_id: 0,
            state: ProcessState::Failed,
            child: None,
            started_at: None,
            stopped_at: Some(Utc::now()),
            last_error: Some(error),
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ProcessState) {
        let from = self.state;
        self.state = state;
        match state {
            ProcessState::Running => self.started_at = Some(Utc::now()),
            s if s.is_terminal() => self.stopped_at = Some(Utc::now()),
            _ => {}
        }
        info!(
            "Agent {} state: {} -> {}",
            self.descriptor.name, from, state
        );
    }
}

/// Environment for one launch batch, assembled fresh before the batch starts
/// and read-only afterwards.
#[derive(Debug, Clone)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the supervisor's environment merged with the config-declared
    /// agent environment. Called immediately before each launch batch.
    pub fn capture(config: &AgentsConfig) -> Self {
        let mut vars: HashMap<String, String> = std::env::vars().collect();
        vars.extend(config.env.clone());
        Self { vars }
    }

    #[cfg(test)]
    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }
}

/// Registry of live process handles, keyed by agent name. Exactly one handle
/// per descriptor name at any time.
pub type HandleRegistry = Arc<DashMap<String, Arc<Mutex<ProcessHandle>>>>;

/// Spawns agent processes and confirms their liveness
pub struct Launcher {
    config: LauncherConfig,
    agent_host: String,
}

impl Launcher {
    pub fn new(config: LauncherConfig, agent_host: impl Into<String>) -> Self {
        Self {
            config,
            agent_host: agent_host.into(),
        }
    }

    /// Launch every descriptor in registry order. Failures are isolated: a
    /// descriptor that fails to spawn is recorded as Failed and the batch
    /// continues.
    pub async fn launch_all(
        &self,
        registry: &AgentRegistry,
        env: EnvSnapshot,
    ) -> HandleRegistry {
        let handles: HandleRegistry = Arc::new(DashMap::new());

        for descriptor in registry.descriptors() {
            let handle = self.launch(descriptor.clone(), &env).await;
            if handle.state() == ProcessState::Failed {
                error!(
                    "Agent {} failed to start: {}",
                    descriptor.name,
                    handle.last_error.as_deref().unwrap_or("unknown")
                );
            }
            handles.insert(descriptor.name.clone(), Arc::new(Mutex::new(handle)));
        }

        let running = handles
            .iter()
            .filter(|e| {
                e.value()
                    .try_lock()
                    .map(|h| h.state() == ProcessState::Running)
                    .unwrap_or(false)
            })
            .count();
        info!("Launched {}/{} agents", running, registry.len());

        handles
    }

    /// Launch a single descriptor in a fresh process group
    pub async fn launch(&self, descriptor: AgentDescriptor, env: &EnvSnapshot) -> ProcessHandle {
        let mut cmd = Command::new(&descriptor.launch.program);
        cmd.args(&descriptor.launch.args)
            .env_clear()
            .envs(env.vars())
            .envs(&descriptor.env)
            .stdin(Stdio::null());

        // The child leads its own process group, distinct from the
        // supervisor's, so group-wide signalling reaches any grandchildren.
        #[cfg(unix)]
        cmd.process_group(0);

        debug!(
            "Spawning agent {}: {} {:?}",
            descriptor.name, descriptor.launch.program, descriptor.launch.args
        );

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ProcessHandle::failed(descriptor, e.to_string());
            }
        };

        let pid = child.id().unwrap_or(0);
        let mut handle = ProcessHandle {
            descriptor,
            pid,
            group_id: pid as i32,
            state: ProcessState::Starting,
            child: None,
            started_at: None,
            stopped_at: None,
            last_error: None,
        };

        match self.confirm_alive(&handle.descriptor, &mut child).await {
            Ok(()) => {
                handle.child = Some(child);
                handle.set_state(ProcessState::Running);
            }
            Err(reason) => {
                warn!(
                    "Agent {} did not come up: {}",
                    handle.descriptor.name, reason
                );
                // A Failed handle is invisible to the shutdown coordinator,
                // so the group must be taken down here before it is dropped.
                if let Err(e) = crate::supervisor::shutdown::signal_group(
                    handle.group_id,
                    crate::supervisor::shutdown::StopSignal::Kill,
                    &mut child,
                ) {
                    debug!(
                        "Agent {}: cleanup kill after failed launch: {}",
                        handle.descriptor.name, e
                    );
                }
                let _ = child.wait().await;
                handle.last_error = Some(reason);
                handle.set_state(ProcessState::Failed);
            }
        }

        handle
    }

    /// Apply the configured liveness policy. Deterministic by construction:
    /// either the process survives the grace window, or a health probe on the
    /// agent port responds before the probe deadline.
    async fn confirm_alive(
        &self,
        descriptor: &AgentDescriptor,
        child: &mut Child,
    ) -> std::result::Result<(), String> {
        match self.config.liveness {
            LivenessPolicy::GraceWindow { ms } => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                match child.try_wait() {
                    Ok(None) => Ok(()),
                    Ok(Some(status)) => Err(format!("exited during grace window: {status}")),
                    Err(e) => Err(format!("wait error: {e}")),
                }
            }
            LivenessPolicy::HealthProbe { timeout_ms } => {
                let url = format!("{}/health", descriptor.endpoint(&self.agent_host));
                let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
                let client = reqwest::Client::new();

                loop {
                    if let Ok(Some(status)) = child.try_wait() {
                        return Err(format!("exited before probe: {status}"));
                    }
                    match client.get(&url).send().await {
                        Ok(resp) if resp.status().is_success() => return Ok(()),
                        _ => {}
                    }
                    if tokio::time::Instant::now() >= deadline {
                        return Err(format!("health probe timed out after {timeout_ms}ms"));
                    }
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}
