use thiserror::Error;

/// Main error type for the supervisor and pipeline coordinator
#[derive(Error, Debug)]
pub enum ForgeError {
    // Configuration errors (fatal to supervisor startup)
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration invalid: {0}")]
    ConfigInvalid(String),

    // Supervisor errors
    #[error("Agent start failure: {agent}: {reason}")]
    AgentStart { agent: String, reason: String },

    #[error("Agent unresponsive: {agent} did not stop within {grace_ms}ms")]
    AgentUnresponsive { agent: String, grace_ms: u64 },

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    // Pipeline errors (session-local, recorded in StageResult)
    #[error("Stage {stage} failed: {reason}")]
    Stage { stage: String, reason: String },

    #[error("Stage {stage} timed out after {budget_ms}ms")]
    StageTimeout { stage: String, budget_ms: u64 },

    // Validation errors (surfaced before any network call)
    #[error("Validation failed: {0}")]
    Validation(String),

    // Upstream third-party failures, passed through verbatim
    #[error("Upstream error: {0}")]
    Upstream(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for ForgeError
pub type Result<T> = std::result::Result<T, ForgeError>;

impl ForgeError {
    /// Whether this error stays inside the session that produced it.
    /// Stage and upstream errors land in a StageResult, never cross sessions.
    pub fn is_session_local(&self) -> bool {
        matches!(
            self,
            ForgeError::Stage { .. } | ForgeError::StageTimeout { .. } | ForgeError::Upstream(_)
        )
    }
}
