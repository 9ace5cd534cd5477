//! Staged pipeline: session types, stage coordination, scoring, proposal
//! composition, and repository publication.

pub mod coordinator;
pub mod proposal;
pub mod publish;
pub mod scoring;
pub mod types;

pub use coordinator::{FeasibilityReport, PipelineCoordinator, ReferenceReport, RunRequest};
pub use publish::{build_push_request, PublishDoc};
pub use scoring::{ScoringPolicy, WeightedAverage};
pub use types::{
    Classification, FeasibilityAggregate, FeasibilityScore, FinalResult, Idea, PipelineSession,
    ResearchProposal, StageName, StageResult, StageStatus,
};
