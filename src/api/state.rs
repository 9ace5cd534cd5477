use crate::agents::HttpFleet;
use crate::pipeline::coordinator::PipelineCoordinator;
use crate::supervisor::{AgentRegistry, HandleRegistry};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Pipeline coordinator over the launched fleet
    pub coordinator: Arc<PipelineCoordinator<HttpFleet>>,

    /// Descriptor registry, in launch order
    pub registry: Arc<AgentRegistry>,

    /// Live process handles, keyed by agent name
    pub handles: HandleRegistry,

    /// Supervisor start time
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        coordinator: Arc<PipelineCoordinator<HttpFleet>>,
        registry: Arc<AgentRegistry>,
        handles: HandleRegistry,
    ) -> Self {
        Self {
            coordinator,
            registry,
            handles,
            start_time: Utc::now(),
        }
    }

    /// Supervisor uptime in seconds
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds()
    }
}
