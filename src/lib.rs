pub mod agents;
pub mod api;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod supervisor;

pub use agents::{AgentFleet, HttpFleet};
pub use config::AppConfig;
pub use error::{ForgeError, Result};
pub use pipeline::{
    FinalResult, Idea, PipelineCoordinator, RunRequest, ScoringPolicy, StageName, StageStatus,
    WeightedAverage,
};
pub use supervisor::{
    AgentDescriptor, AgentRegistry, EnvSnapshot, Launcher, ProcessHandle, ProcessState,
    ShutdownCoordinator, StopOutcome,
};
