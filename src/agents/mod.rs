//! Worker agent HTTP contracts and the fleet client.

pub mod client;
pub mod types;

pub use client::{agent_names, AgentFleet, HttpFleet};
pub use types::{
    ExtractionRecord, FeasibilityRequest, FeasibilityResponse, GenerateRequest, GenerateResponse,
    GithubPushRequest, ProjectedPoint, ReferencesRequest, ReferencesResponse, RepoFile,
};
