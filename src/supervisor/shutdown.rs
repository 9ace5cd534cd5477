//! Shutdown coordinator
//!
//! On supervisor termination, signals every running agent's process group to
//! stop, waits up to a grace period, then escalates to a forced kill of the
//! same group. Shutdown is per-agent: outcomes are recorded individually and
//! one stubborn agent never blocks the others. Stop is always issued before
//! kill, never concurrently to the same group.

use crate::supervisor::launcher::{HandleRegistry, ProcessHandle, ProcessState};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// How one agent's shutdown concluded. A forced kill is still a successful
/// terminal outcome for supervisor purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// Exited within the grace period after the stop signal
    Graceful,
    /// Needed a kill signal after the grace period elapsed
    Forced,
    /// Was already gone when shutdown started
    AlreadyDead,
}

impl std::fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopOutcome::Graceful => write!(f, "graceful"),
            StopOutcome::Forced => write!(f, "forced"),
            StopOutcome::AlreadyDead => write!(f, "already_dead"),
        }
    }
}

/// Per-agent shutdown record
#[derive(Debug, Clone, Serialize)]
pub struct AgentStopReport {
    pub agent: String,
    pub outcome: StopOutcome,
}

/// Coordinates group-wide stop/kill escalation across the fleet
pub struct ShutdownCoordinator {
    grace_period: Duration,
}

impl ShutdownCoordinator {
    pub fn new(grace_period: Duration) -> Self {
        Self { grace_period }
    }

    /// Stop every running agent concurrently and report each outcome.
    pub async fn shutdown_all(&self, handles: &HandleRegistry) -> Vec<AgentStopReport> {
        let targets: Vec<(String, Arc<Mutex<ProcessHandle>>)> = handles
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        info!(
            "Shutting down {} agents (grace period: {:?})",
            targets.len(),
            self.grace_period
        );

        let grace = self.grace_period;
        let reports = join_all(targets.into_iter().map(|(agent, handle)| async move {
            let outcome = Self::stop_one(&handle, grace).await;
            info!("Agent {} shutdown: {}", agent, outcome);
            AgentStopReport { agent, outcome }
        }))
        .await;

        reports
    }

    /// Stop one agent: SIGTERM to its process group, wait up to the grace
    /// period, then exactly one SIGKILL to the same group if still alive.
    async fn stop_one(handle: &Arc<Mutex<ProcessHandle>>, grace: Duration) -> StopOutcome {
        let mut handle = handle.lock().await;

        if handle.state() != ProcessState::Running {
            return StopOutcome::AlreadyDead;
        }
        let Some(mut child) = handle.child.take() else {
            handle.set_state(ProcessState::Stopped);
            return StopOutcome::AlreadyDead;
        };

        handle.set_state(ProcessState::Stopping);
        let group_id = handle.group_id;
        let agent = handle.descriptor.name.clone();

        if let Err(e) = signal_group(group_id, StopSignal::Term, &mut child) {
            // Group already gone; reap and record.
            warn!("Agent {}: stop signal failed: {}", agent, e);
            let _ = child.wait().await;
            handle.set_state(ProcessState::Stopped);
            return StopOutcome::AlreadyDead;
        }

        let outcome = match tokio::time::timeout(grace, child.wait()).await {
            Ok(_) => StopOutcome::Graceful,
            Err(_) => {
                warn!(
                    "Agent {} unresponsive after {:?}, escalating to kill",
                    agent, grace
                );
                if let Err(e) = signal_group(group_id, StopSignal::Kill, &mut child) {
                    error!("Agent {}: kill signal failed: {}", agent, e);
                }
                // Reap so the group cannot linger as a zombie.
                let _ = child.wait().await;
                StopOutcome::Forced
            }
        };

        handle.set_state(ProcessState::Stopped);
        outcome
    }
}

pub(crate) enum StopSignal {
    Term,
    Kill,
}

/// Signal the entire process group, not just the leader, so any children an
/// agent spawned are reached as well.
#[cfg(unix)]
pub(crate) fn signal_group(
    group_id: i32,
    signal: StopSignal,
    _child: &mut tokio::process::Child,
) -> std::io::Result<()> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let sig = match signal {
        StopSignal::Term => Signal::SIGTERM,
        StopSignal::Kill => Signal::SIGKILL,
    };
    killpg(Pid::from_raw(group_id), sig).map_err(|e| std::io::Error::from_raw_os_error(e as i32))
}

#[cfg(not(unix))]
pub(crate) fn signal_group(
    _group_id: i32,
    signal: StopSignal,
    child: &mut tokio::process::Child,
) -> std::io::Result<()> {
    match signal {
        // No graceful signal on this platform; both rungs terminate.
        StopSignal::Term | StopSignal::Kill => child.start_kill(),
    }
}

/// Wait for an interactive interrupt or a termination request.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received interrupt"),
        _ = terminate => info!("Received termination request"),
    }
}
