//! HTTP client for the worker agent fleet
//!
//! `AgentFleet` is the seam the pipeline coordinator talks through; the
//! production implementation is `HttpFleet`, tests inject fakes. Non-2xx agent
//! responses are passed through verbatim as `Upstream` errors.

use crate::agents::types::{
    ExtractRequest, ExtractResponse, ExtractionRecord, FeasibilityRequest, FeasibilityResponse,
    FindIdeasResponse, GenerateRequest, GenerateResponse, GithubPushRequest, GithubPushResponse,
    ProjectedPoint, ProjectionResponse, ReferencesRequest, ReferencesResponse,
};
use crate::error::{ForgeError, Result};
use crate::pipeline::types::{Classification, Idea};
use crate::supervisor::AgentRegistry;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Well-known agent identities the coordinator addresses
pub mod agent_names {
    pub const EXTRACTOR: &str = "extractor_agent";
    pub const GENERATOR: &str = "generator_agent";
    pub const FEASIBILITY: &str = "feasibility_agent";
    pub const REFERENCE: &str = "reference_agent";
    pub const GITHUB: &str = "github_agent";
}

/// Everything the pipeline coordinator needs from the agent fleet
#[async_trait]
pub trait AgentFleet: Send + Sync {
    /// Liveness check of one agent
    async fn health(&self, agent: &str) -> Result<()>;

    /// Retrieve papers and patents for the given keywords
    async fn extract(&self, keywords: Vec<String>) -> Result<Vec<ExtractionRecord>>;

    /// Project the extracted corpus into 3D embedding coordinates
    async fn project(&self) -> Result<Vec<ProjectedPoint>>;

    /// Enhanced ideas derived from the extracted corpus
    async fn find_ideas(&self) -> Result<Vec<Idea>>;

    /// Classify a summary as coding-related or not
    async fn classify(&self, summary: &str) -> Result<Classification>;

    /// Generate ideas and research titles for a summary
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;

    /// Score the feasibility of one idea
    async fn feasibility(&self, request: FeasibilityRequest) -> Result<FeasibilityResponse>;

    /// Retrieve reference links within the given budget
    async fn references(&self, request: ReferencesRequest) -> Result<ReferencesResponse>;

    /// Publish files as a repository; returns the repo URL
    async fn github_push(&self, request: GithubPushRequest) -> Result<String>;
}

/// `AgentFleet` over HTTP against the launched agent processes
pub struct HttpFleet {
    client: reqwest::Client,
    endpoints: HashMap<String, String>,
}

impl HttpFleet {
    /// Build from the descriptor registry; endpoints follow the agent host
    /// and per-descriptor ports.
    pub fn from_registry(registry: &AgentRegistry, host: &str) -> Self {
        let endpoints = registry
            .descriptors()
            .iter()
            .map(|d| (d.name.clone(), d.endpoint(host)))
            .collect();
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }

    fn endpoint(&self, agent: &str) -> Result<&str> {
        self.endpoints
            .get(agent)
            .map(String::as_str)
            .ok_or_else(|| ForgeError::UnknownAgent(agent.to_string()))
    }

    async fn post_json<Req: Serialize + ?Sized, Resp: DeserializeOwned>(
        &self,
        agent: &str,
        path: &str,
        body: &Req,
    ) -> Result<Resp> {
        let url = format!("{}{}", self.endpoint(agent)?, path);
        debug!("POST {}", url);

        let response = self.client.post(&url).json(body).send().await?;
        Self::decode(response).await
    }

    async fn get_json<Resp: DeserializeOwned>(&self, agent: &str, path: &str) -> Result<Resp> {
        let url = format!("{}{}", self.endpoint(agent)?, path);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }

    /// Non-2xx bodies are carried through verbatim so the caller sees the
    /// agent's own error detail.
    async fn decode<Resp: DeserializeOwned>(response: reqwest::Response) -> Result<Resp> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ForgeError::Upstream(format!("{status}: {body}")));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl AgentFleet for HttpFleet {
    async fn health(&self, agent: &str) -> Result<()> {
        let url = format!("{}/health", self.endpoint(agent)?);
        let response = self.client.get(&url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ForgeError::Upstream(format!(
                "{}: health returned {}",
                agent,
                response.status()
            )))
        }
    }

    async fn extract(&self, keywords: Vec<String>) -> Result<Vec<ExtractionRecord>> {
        let response: ExtractResponse = self
            .post_json(agent_names::EXTRACTOR, "/extractor", &ExtractRequest { keywords })
            .await?;
        Ok(response.records)
    }

    async fn project(&self) -> Result<Vec<ProjectedPoint>> {
        let response: ProjectionResponse =
            self.get_json(agent_names::EXTRACTOR, "/get3Dpoints").await?;
        Ok(response.points)
    }

    async fn find_ideas(&self) -> Result<Vec<Idea>> {
        let response: FindIdeasResponse =
            self.get_json(agent_names::EXTRACTOR, "/findIdeas").await?;
        Ok(response.ideas)
    }

    async fn classify(&self, summary: &str) -> Result<Classification> {
        // The generator has no dedicated classify endpoint; a zero-idea
        // generate call returns only the classification.
        let response: GenerateResponse = self
            .post_json(
                agent_names::GENERATOR,
                "/generate",
                &GenerateRequest::classification_probe(summary),
            )
            .await?;
        Ok(Classification {
            coding_related: response.coding_related,
            confidence: response.classification.confidence,
            reasons: response.classification.reasons,
        })
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        self.post_json(agent_names::GENERATOR, "/generate", &request)
            .await
    }

    async fn feasibility(&self, request: FeasibilityRequest) -> Result<FeasibilityResponse> {
        self.post_json(agent_names::FEASIBILITY, "/feasibility", &request)
            .await
    }

    async fn references(&self, request: ReferencesRequest) -> Result<ReferencesResponse> {
        self.post_json(agent_names::REFERENCE, "/references", &request)
            .await
    }

    async fn github_push(&self, request: GithubPushRequest) -> Result<String> {
        let response: GithubPushResponse = self
            .post_json(agent_names::GITHUB, "/github/push", &request)
            .await?;
        Ok(response.repo_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentsConfig;
    use crate::config::AgentEntry;

    #[test]
    fn test_endpoints_follow_registry_ports() {
        let config = AgentsConfig {
            dir: std::path::PathBuf::from("agents"),
            suffix: "_agent".into(),
            runner: None,
            ports: HashMap::new(),
            entries: vec![AgentEntry {
                name: agent_names::GENERATOR.into(),
                port: 8004,
                program: "python3".into(),
                args: vec![],
                env: HashMap::new(),
            }],
            env: HashMap::new(),
            host: "127.0.0.1".into(),
        };
        let registry = AgentRegistry::from_config(&config).unwrap();
        let fleet = HttpFleet::from_registry(&registry, "127.0.0.1");

        assert_eq!(
            fleet.endpoint(agent_names::GENERATOR).unwrap(),
            "http://127.0.0.1:8004"
        );
        assert!(matches!(
            fleet.endpoint("missing_agent"),
            Err(ForgeError::UnknownAgent(_))
        ));
    }

    #[test]
    fn test_classification_probe_requests_zero_ideas() {
        let probe = GenerateRequest::classification_probe("a compiler for dna");
        assert_eq!(probe.num_ideas, 0);
        assert_eq!(probe.num_research_titles, 0);
    }
}
