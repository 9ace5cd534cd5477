//! Agent fleet supervision: descriptor registry, process launcher, and
//! shutdown coordination.

pub mod launcher;
pub mod registry;
pub mod shutdown;

pub use launcher::{EnvSnapshot, HandleRegistry, Launcher, ProcessHandle, ProcessState};
pub use registry::{AgentDescriptor, AgentRegistry, LaunchSpec};
pub use shutdown::{shutdown_signal, AgentStopReport, ShutdownCoordinator, StopOutcome};
