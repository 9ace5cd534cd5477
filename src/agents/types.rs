//! Wire types for the worker agents' HTTP contracts.

use crate::pipeline::types::{FeasibilityScore, Idea};
use serde::{Deserialize, Serialize};

/// `POST /generate` request
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_stack: Option<String>,
    pub num_ideas: usize,
    pub num_research_titles: usize,
}

impl GenerateRequest {
    /// `num_ideas = 0` asks the generator only to classify the summary.
    pub fn classification_probe(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            preferred_stack: None,
            num_ideas: 0,
            num_research_titles: 0,
        }
    }
}

/// `POST /generate` response
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub coding_related: bool,
    pub classification: ClassificationDetail,
    #[serde(default)]
    pub research_titles: Vec<String>,
    #[serde(default)]
    pub ideas: Vec<Idea>,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationDetail {
    pub confidence: f64,
    pub reasons: String,
}

/// `POST /feasibility` request
#[derive(Debug, Clone, Serialize)]
pub struct FeasibilityRequest {
    pub title: String,
    pub summary: String,
}

/// `POST /feasibility` response
#[derive(Debug, Clone, Deserialize)]
pub struct FeasibilityResponse {
    pub aggregate: AggregateWire,
    #[serde(default)]
    pub breakdown: Vec<FeasibilityScore>,
}

/// Aggregate as the agent reports it. `passes_threshold` is recomputed
/// locally from `overall` and `threshold`, never trusted from the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregateWire {
    pub overall: f64,
    pub threshold: f64,
}

/// `POST /references` request
#[derive(Debug, Clone, Serialize)]
pub struct ReferencesRequest {
    pub text: String,
    pub max_references: usize,
    pub fast: bool,
    pub budget_ms: u64,
}

/// `POST /references` response
#[derive(Debug, Clone, Deserialize)]
pub struct ReferencesResponse {
    #[serde(default)]
    pub links: Vec<String>,
}

/// One file to commit during repository publication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFile {
    pub path: String,
    pub content: String,
}

/// `POST /github/push` request
#[derive(Debug, Clone, Serialize)]
pub struct GithubPushRequest {
    pub token: String,
    pub owner: String,
    pub repo_name: String,
    pub files: Vec<RepoFile>,
    pub visibility: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `POST /github/push` response
#[derive(Debug, Clone, Deserialize)]
pub struct GithubPushResponse {
    pub repo_url: String,
}

/// `POST /extractor` request
#[derive(Debug, Clone, Serialize)]
pub struct ExtractRequest {
    pub keywords: Vec<String>,
}

/// One retrieved document (paper or patent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Extraction results for one keyword. Per-source failures upstream surface
/// as empty lists here, never as an error for the whole keyword.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub keyword: String,
    #[serde(default)]
    pub papers: Vec<DocumentRecord>,
    #[serde(default)]
    pub patents: Vec<DocumentRecord>,
}

/// `POST /extractor` response
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractResponse {
    #[serde(default)]
    pub records: Vec<ExtractionRecord>,
}

/// `GET /findIdeas` response
#[derive(Debug, Clone, Deserialize)]
pub struct FindIdeasResponse {
    #[serde(default)]
    pub ideas: Vec<Idea>,
}

/// One extracted document projected into embedding space (`GET /get3Dpoints`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub label: String,
    pub coords: [f64; 3],
}

/// `GET /get3Dpoints` response
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectionResponse {
    #[serde(default)]
    pub points: Vec<ProjectedPoint>,
}
