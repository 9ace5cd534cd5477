//! Pipeline coordinator
//!
//! Drives the fixed stage sequence against the agent fleet: extraction and
//! classification fan out concurrently, projection follows extraction, idea
//! generation is gated on the classification verdict, then references and
//! proposal composition. Each stage has its own budget and failure policy;
//! the whole session races a deadline and returns partial results at expiry.

use crate::agents::client::AgentFleet;
use crate::agents::types::{FeasibilityRequest, GenerateRequest, ReferencesRequest};
use crate::config::{FeasibilityConfig, PipelineConfig};
use crate::error::{ForgeError, Result};
use crate::pipeline::proposal::compose_proposal;
use crate::pipeline::publish::{build_push_request, PublishDoc};
use crate::pipeline::scoring::{ScoringPolicy, WeightedAverage};
use crate::pipeline::types::{
    dedupe_and_cap, Classification, FeasibilityAggregate, FeasibilityScore, FinalResult, Idea,
    PipelineSession, StageName, StageResult, StageStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{info, warn};

/// One pipeline run as the caller requests it
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub topics: Vec<String>,
    #[serde(default)]
    pub preferred_stack: Option<String>,
    #[serde(default = "default_num_ideas")]
    pub num_ideas: usize,
    #[serde(default = "default_num_research_titles")]
    pub num_research_titles: usize,
    #[serde(default)]
    pub max_references: Option<usize>,
    #[serde(default)]
    pub budget_ms: Option<u64>,
    #[serde(default)]
    pub fast: bool,
}

fn default_num_ideas() -> usize {
    3
}

fn default_num_research_titles() -> usize {
    5
}

/// Feasibility verdict for one idea
#[derive(Debug, Clone, Serialize)]
pub struct FeasibilityReport {
    pub aggregate: FeasibilityAggregate,
    pub breakdown: Vec<FeasibilityScore>,
}

/// Standalone reference retrieval result
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceReport {
    pub links: Vec<String>,
    pub status: StageStatus,
}

/// Coordinates pipeline sessions over an agent fleet
pub struct PipelineCoordinator<F: AgentFleet> {
    fleet: Arc<F>,
    pipeline: PipelineConfig,
    feasibility: FeasibilityConfig,
    scoring: Arc<dyn ScoringPolicy>,
}

impl<F: AgentFleet> PipelineCoordinator<F> {
    pub fn new(fleet: Arc<F>, pipeline: PipelineConfig, feasibility: FeasibilityConfig) -> Self {
        let scoring = Arc::new(WeightedAverage::new(feasibility.weights.clone()));
        Self {
            fleet,
            pipeline,
            feasibility,
            scoring,
        }
    }

    /// Swap the feasibility aggregation policy
    pub fn with_scoring(mut self, scoring: Arc<dyn ScoringPolicy>) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn fleet(&self) -> &F {
        &self.fleet
    }

    /// Run one full session. Always resolves by the session deadline: at
    /// expiry the in-flight stage future is dropped and whatever results
    /// exist are returned.
    pub async fn run(&self, request: RunRequest) -> Result<FinalResult> {
        if request.topics.iter().all(|t| t.trim().is_empty()) {
            return Err(ForgeError::Validation(
                "at least one non-empty topic is required".into(),
            ));
        }

        let deadline = Duration::from_millis(self.pipeline.session_deadline_ms);
        let session = Mutex::new(PipelineSession::new(request.topics.clone(), deadline));
        {
            let s = session.lock().await;
            info!(
                "Session {} started: {} topic(s), deadline {:?}",
                s.session_id,
                s.topics.len(),
                deadline
            );
        }

        tokio::select! {
            _ = self.run_stages(&session, &request) => {}
            _ = tokio::time::sleep(deadline) => {
                let s = session.lock().await;
                warn!(
                    "Session {} hit its deadline after {:?}, returning partial results",
                    s.session_id, deadline
                );
            }
        }

        let s = session.lock().await;
        let result = FinalResult::from_session(&s);
        info!(
            "Session {} finished: {}/{} default stages complete",
            s.session_id,
            StageName::DEFAULT_SEQUENCE.len() - result.incomplete.len(),
            StageName::DEFAULT_SEQUENCE.len()
        );
        Ok(result)
    }

    async fn run_stages(&self, session: &Mutex<PipelineSession>, request: &RunRequest) {
        let (summary, topics) = {
            let s = session.lock().await;
            (s.summary(), s.topics.iter().cloned().collect::<Vec<_>>())
        };
        let short = Duration::from_millis(self.pipeline.short_budget_ms);

        // Extraction feeds projection; classification is independent of both.
        let extraction_chain = async {
            match timeout(short, self.fleet.extract(topics.clone())).await {
                Ok(Ok(records)) => {
                    session
                        .lock()
                        .await
                        .record(StageResult::ok(StageName::Extraction, to_value(&records)));
                }
                Ok(Err(e)) => {
                    session
                        .lock()
                        .await
                        .record(StageResult::failed(StageName::Extraction, e.to_string()));
                    return false;
                }
                Err(_) => {
                    session.lock().await.record(StageResult::failed(
                        StageName::Extraction,
                        format!("timed out after {}ms", self.pipeline.short_budget_ms),
                    ));
                    return false;
                }
            }

            match timeout(short, self.fleet.project()).await {
                Ok(Ok(points)) => {
                    session
                        .lock()
                        .await
                        .record(StageResult::ok(StageName::Projection, to_value(&points)));
                    true
                }
                Ok(Err(e)) => {
                    session
                        .lock()
                        .await
                        .record(StageResult::failed(StageName::Projection, e.to_string()));
                    false
                }
                Err(_) => {
                    session.lock().await.record(StageResult::failed(
                        StageName::Projection,
                        format!("timed out after {}ms", self.pipeline.short_budget_ms),
                    ));
                    false
                }
            }
        };

        // A failed classification never aborts; the summary is treated as
        // not coding-related, but the stage is still reported as degraded so
        // callers can tell the default apart from a real verdict.
        let classification_call = async {
            match timeout(short, self.fleet.classify(&summary)).await {
                Ok(Ok(classification)) => (classification, None),
                Ok(Err(e)) => {
                    warn!("Classification unavailable, defaulting: {}", e);
                    let reason = format!("classification unavailable: {e}");
                    (Classification::not_coding_related(reason.clone()), Some(reason))
                }
                Err(_) => {
                    warn!("Classification timed out, defaulting");
                    let reason = format!(
                        "classification timed out after {}ms",
                        self.pipeline.short_budget_ms
                    );
                    (Classification::not_coding_related(reason.clone()), Some(reason))
                }
            }
        };

        let (extracted, (classification, classify_error)) =
            tokio::join!(extraction_chain, classification_call);
        session.lock().await.record(match classify_error {
            None => StageResult::ok(StageName::Classification, to_value(&classification)),
            Some(reason) => StageResult {
                stage: StageName::Classification,
                status: StageStatus::Failed,
                payload: to_value(&classification),
                error: Some(reason),
            },
        });

        if !extracted {
            // Extraction or projection failed; nothing downstream can run.
            return;
        }

        let (ideas, research_titles) = self
            .generate_ideas(session, request, &summary, &classification)
            .await;

        let reference_text = if ideas.is_empty() {
            summary.clone()
        } else {
            let titles: Vec<&str> = ideas.iter().map(|i| i.title.as_str()).collect();
            format!("{summary}; {}", titles.join("; "))
        };
        let max = request.max_references.unwrap_or(self.pipeline.max_references);
        let budget = request.budget_ms.unwrap_or(self.pipeline.reference_budget_ms);
        let (status, links, error) = self
            .retrieve_references(&reference_text, max, request.fast, budget)
            .await;
        session.lock().await.record(StageResult {
            stage: StageName::ReferenceRetrieval,
            status,
            payload: json!({ "links": links }),
            error,
        });

        match ideas.first() {
            Some(idea) => {
                let proposal = compose_proposal(idea, &research_titles, &links);
                session.lock().await.record(StageResult::ok(
                    StageName::ProposalComposition,
                    to_value(&proposal),
                ));
            }
            None => {
                session.lock().await.record(StageResult::failed(
                    StageName::ProposalComposition,
                    "no ideas available to compose a proposal",
                ));
            }
        }
    }

    /// Idea generation, gated on the classification verdict. Generator
    /// failure degrades to an empty idea set and the session continues.
    async fn generate_ideas(
        &self,
        session: &Mutex<PipelineSession>,
        request: &RunRequest,
        summary: &str,
        classification: &Classification,
    ) -> (Vec<Idea>, Vec<String>) {
        if !classification.coding_related {
            session.lock().await.record(StageResult::ok(
                StageName::IdeaGeneration,
                json!({
                    "ideas": [],
                    "research_titles": [],
                    "count": 0,
                    "note": "summary not coding-related",
                }),
            ));
            return (Vec::new(), Vec::new());
        }

        let medium = Duration::from_millis(self.pipeline.medium_budget_ms);
        let generate = GenerateRequest {
            summary: summary.to_string(),
            preferred_stack: request.preferred_stack.clone(),
            num_ideas: request.num_ideas,
            num_research_titles: request.num_research_titles,
        };

        match timeout(medium, self.fleet.generate(generate)).await {
            Ok(Ok(response)) => {
                session.lock().await.record(StageResult::ok(
                    StageName::IdeaGeneration,
                    json!({
                        "ideas": response.ideas,
                        "research_titles": response.research_titles,
                        "count": response.count,
                    }),
                ));
                (response.ideas, response.research_titles)
            }
            Ok(Err(e)) => {
                warn!("Idea generation failed, continuing with none: {}", e);
                session
                    .lock()
                    .await
                    .record(StageResult::failed(StageName::IdeaGeneration, e.to_string()));
                (Vec::new(), Vec::new())
            }
            Err(_) => {
                session.lock().await.record(StageResult::failed(
                    StageName::IdeaGeneration,
                    format!("timed out after {}ms", self.pipeline.medium_budget_ms),
                ));
                (Vec::new(), Vec::new())
            }
        }
    }

    /// Reference retrieval under the caller's budget. Fewer links than the
    /// cap within budget is a partial success, never an error; only a
    /// transport failure is Failed.
    async fn retrieve_references(
        &self,
        text: &str,
        max_references: usize,
        fast: bool,
        budget_ms: u64,
    ) -> (StageStatus, Vec<String>, Option<String>) {
        let request = ReferencesRequest {
            text: text.to_string(),
            max_references,
            fast,
            budget_ms,
        };
        // The agent enforces the budget itself; the guard here only covers
        // an agent that stops responding entirely.
        let guard = Duration::from_millis(budget_ms) + Duration::from_millis(500);

        match timeout(guard, self.fleet.references(request)).await {
            Ok(Ok(response)) => {
                let links = dedupe_and_cap(response.links, max_references);
                let status = if links.len() < max_references {
                    StageStatus::PartialTimeout
                } else {
                    StageStatus::Ok
                };
                (status, links, None)
            }
            Ok(Err(e)) => (StageStatus::Failed, Vec::new(), Some(e.to_string())),
            Err(_) => {
                warn!("Reference agent unresponsive past {}ms budget", budget_ms);
                (StageStatus::PartialTimeout, Vec::new(), None)
            }
        }
    }

    /// Score one idea's feasibility on demand. The aggregate is always
    /// recomputed locally from the breakdown through the scoring policy.
    pub async fn score_feasibility(&self, title: &str, summary: &str) -> Result<FeasibilityReport> {
        let medium = Duration::from_millis(self.pipeline.medium_budget_ms);
        let request = FeasibilityRequest {
            title: title.to_string(),
            summary: summary.to_string(),
        };

        let response = timeout(medium, self.fleet.feasibility(request))
            .await
            .map_err(|_| ForgeError::StageTimeout {
                stage: StageName::FeasibilityScoring.to_string(),
                budget_ms: self.pipeline.medium_budget_ms,
            })??;

        let aggregate = if response.breakdown.is_empty() {
            FeasibilityAggregate::new(response.aggregate.overall, self.feasibility.threshold)
        } else {
            self.scoring
                .aggregate(&response.breakdown, self.feasibility.threshold)
        };

        Ok(FeasibilityReport {
            aggregate,
            breakdown: response.breakdown,
        })
    }

    /// Enhanced ideas derived from the extracted corpus, on demand.
    pub async fn enhanced_ideas(&self) -> Result<Vec<Idea>> {
        let medium = Duration::from_millis(self.pipeline.medium_budget_ms);
        timeout(medium, self.fleet.find_ideas())
            .await
            .map_err(|_| ForgeError::StageTimeout {
                stage: StageName::IdeaGeneration.to_string(),
                budget_ms: self.pipeline.medium_budget_ms,
            })?
    }

    /// Standalone reference retrieval for the front-facing API.
    pub async fn fetch_references(
        &self,
        text: &str,
        max_references: Option<usize>,
        fast: bool,
        budget_ms: Option<u64>,
    ) -> Result<ReferenceReport> {
        if text.trim().is_empty() {
            return Err(ForgeError::Validation("reference text is required".into()));
        }
        let max = max_references.unwrap_or(self.pipeline.max_references);
        let budget = budget_ms.unwrap_or(self.pipeline.reference_budget_ms);

        let (status, links, error) = self.retrieve_references(text, max, fast, budget).await;
        if status == StageStatus::Failed {
            return Err(ForgeError::Stage {
                stage: StageName::ReferenceRetrieval.to_string(),
                reason: error.unwrap_or_else(|| "reference retrieval failed".into()),
            });
        }
        Ok(ReferenceReport { links, status })
    }

    /// Publish a document set as a repository. All validation happens before
    /// any network call.
    pub async fn publish(&self, doc: PublishDoc) -> Result<String> {
        let request = build_push_request(doc)?;
        let medium = Duration::from_millis(self.pipeline.medium_budget_ms);

        timeout(medium, self.fleet.github_push(request))
            .await
            .map_err(|_| ForgeError::StageTimeout {
                stage: StageName::RepositoryPublication.to_string(),
                budget_ms: self.pipeline.medium_budget_ms,
            })?
    }
}

fn to_value<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
