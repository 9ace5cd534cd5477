//! Pipeline coordinator scenarios against an in-process fake fleet.

use async_trait::async_trait;
use ideaforge::agents::types::{
    AggregateWire, ClassificationDetail, ExtractionRecord, FeasibilityRequest,
    FeasibilityResponse, GenerateRequest, GenerateResponse, GithubPushRequest, ProjectedPoint,
    ReferencesRequest, ReferencesResponse,
};
use ideaforge::agents::AgentFleet;
use ideaforge::config::{FeasibilityConfig, PipelineConfig};
use ideaforge::error::{ForgeError, Result};
use ideaforge::pipeline::publish::PublishDoc;
use ideaforge::pipeline::types::{Classification, FeasibilityScore, Idea};
use ideaforge::pipeline::{PipelineCoordinator, RunRequest, StageName, StageStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct FakeFleet {
    coding_related: bool,
    extract_fail: bool,
    extract_delay_ms: u64,
    classify_fail: bool,
    reference_links: Vec<String>,
    references_fail: bool,
    push_calls: AtomicUsize,
}

impl FakeFleet {
    fn coding(reference_links: Vec<String>) -> Self {
        Self {
            coding_related: true,
            reference_links,
            ..Self::default()
        }
    }
}

#[async_trait]
impl AgentFleet for FakeFleet {
    async fn health(&self, _agent: &str) -> Result<()> {
        Ok(())
    }

    async fn extract(&self, keywords: Vec<String>) -> Result<Vec<ExtractionRecord>> {
        if self.extract_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.extract_delay_ms)).await;
        }
        if self.extract_fail {
            return Err(ForgeError::Upstream("502: extractor down".into()));
        }
        Ok(keywords
            .into_iter()
            .map(|keyword| ExtractionRecord {
                keyword,
                papers: vec![],
                patents: vec![],
            })
            .collect())
    }

    async fn project(&self) -> Result<Vec<ProjectedPoint>> {
        Ok(vec![ProjectedPoint {
            label: "doc-0".into(),
            coords: [0.1, 0.2, 0.3],
        }])
    }

    async fn find_ideas(&self) -> Result<Vec<Idea>> {
        Ok(vec![Idea {
            title: "Corpus-derived idea".into(),
            approach: "Cluster the embedding space.".into(),
            stack: "Rust".into(),
            documentation: "Found by similarity search.".into(),
            code_samples: vec![],
        }])
    }

    async fn classify(&self, _summary: &str) -> Result<Classification> {
        if self.classify_fail {
            return Err(ForgeError::Upstream("503: classifier down".into()));
        }
        Ok(Classification {
            coding_related: self.coding_related,
            confidence: 0.9,
            reasons: "keyword match".into(),
        })
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let ideas: Vec<Idea> = (0..request.num_ideas)
            .map(|i| Idea {
                title: format!("Idea {i}"),
                approach: "Iterate quickly.".into(),
                stack: "Rust".into(),
                documentation: "Does the thing. Well. Fast.".into(),
                code_samples: vec![],
            })
            .collect();
        Ok(GenerateResponse {
            coding_related: self.coding_related,
            classification: ClassificationDetail {
                confidence: 0.9,
                reasons: "keyword match".into(),
            },
            research_titles: vec!["Prior art survey".into()],
            count: ideas.len(),
            ideas,
        })
    }

    async fn feasibility(&self, _request: FeasibilityRequest) -> Result<FeasibilityResponse> {
        let breakdown = [
            ("cost", 80.0),
            ("ethics", 90.0),
            ("market", 70.0),
            ("tech", 85.0),
            ("timing", 60.0),
        ]
        .into_iter()
        .map(|(parameter, score)| FeasibilityScore {
            parameter: parameter.into(),
            score,
            confidence: 0.8,
            rationale: String::new(),
        })
        .collect();

        // The wire aggregate is deliberately wrong; the coordinator must
        // recompute from the breakdown.
        Ok(FeasibilityResponse {
            aggregate: AggregateWire {
                overall: 0.0,
                threshold: 75.0,
            },
            breakdown,
        })
    }

    async fn references(&self, request: ReferencesRequest) -> Result<ReferencesResponse> {
        if self.references_fail {
            return Err(ForgeError::Upstream("500: search provider down".into()));
        }
        let mut links = self.reference_links.clone();
        links.truncate(request.max_references + 2); // agent may over-return
        Ok(ReferencesResponse { links })
    }

    async fn github_push(&self, request: GithubPushRequest) -> Result<String> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://github.com/{}/{}",
            request.owner, request.repo_name
        ))
    }
}

fn coordinator(fleet: FakeFleet) -> PipelineCoordinator<FakeFleet> {
    PipelineCoordinator::new(
        Arc::new(fleet),
        PipelineConfig::default(),
        FeasibilityConfig::default(),
    )
}

fn run_request(num_ideas: usize) -> RunRequest {
    serde_json::from_value(serde_json::json!({
        "topics": ["distributed tracing"],
        "num_ideas": num_ideas,
    }))
    .unwrap()
}

#[tokio::test]
async fn coding_related_run_produces_requested_ideas() {
    let links: Vec<String> = (0..6).map(|i| format!("https://ref.org/{i}")).collect();
    let coordinator = coordinator(FakeFleet::coding(links));

    let result = coordinator.run(run_request(3)).await.unwrap();

    assert!(result.incomplete.is_empty());
    let generation = &result.stages[&StageName::IdeaGeneration];
    assert_eq!(generation.status, StageStatus::Ok);
    assert_eq!(generation.payload["count"], 3);
    assert_eq!(generation.payload["ideas"].as_array().unwrap().len(), 3);

    let references = &result.stages[&StageName::ReferenceRetrieval];
    assert_eq!(references.status, StageStatus::Ok);
    assert_eq!(references.payload["links"].as_array().unwrap().len(), 6);

    let proposal = &result.stages[&StageName::ProposalComposition];
    assert_eq!(proposal.status, StageStatus::Ok);
    assert!(proposal.payload["markdown"]
        .as_str()
        .unwrap()
        .contains("## Literature Review"));
}

#[tokio::test]
async fn short_reference_haul_is_partial_not_error() {
    // Upstream finds only 2 of the default 6 within budget.
    let links = vec![
        "https://ref.org/a".to_string(),
        "https://ref.org/b".to_string(),
    ];
    let coordinator = coordinator(FakeFleet::coding(links));

    let result = coordinator.run(run_request(2)).await.unwrap();

    let references = &result.stages[&StageName::ReferenceRetrieval];
    assert_eq!(references.status, StageStatus::PartialTimeout);
    assert!(references.error.is_none());
    assert_eq!(references.payload["links"].as_array().unwrap().len(), 2);

    // The rest of the session still completed.
    assert_eq!(
        result.stages[&StageName::ProposalComposition].status,
        StageStatus::Ok
    );
}

#[tokio::test]
async fn reference_links_never_exceed_cap_or_duplicate() {
    let links = vec![
        "https://ref.org/a".to_string(),
        "https://ref.org/a/".to_string(),
        "https://ref.org/b".to_string(),
        "https://ref.org/c".to_string(),
        "https://ref.org/d".to_string(),
    ];
    let coordinator = coordinator(FakeFleet::coding(links));

    let report = coordinator
        .fetch_references("observability", Some(3), false, Some(1000))
        .await
        .unwrap();

    assert_eq!(report.links.len(), 3);
    assert_eq!(
        report.links,
        vec!["https://ref.org/a", "https://ref.org/b", "https://ref.org/c"]
    );
}

#[tokio::test]
async fn reference_transport_failure_does_not_end_session() {
    let mut fleet = FakeFleet::coding(vec![]);
    fleet.references_fail = true;
    let coordinator = coordinator(fleet);

    let result = coordinator.run(run_request(1)).await.unwrap();

    let references = &result.stages[&StageName::ReferenceRetrieval];
    assert_eq!(references.status, StageStatus::Failed);
    assert!(references.error.as_deref().unwrap().contains("search provider"));

    // Proposal composes from ideas alone.
    assert_eq!(
        result.stages[&StageName::ProposalComposition].status,
        StageStatus::Ok
    );
}

#[tokio::test]
async fn non_coding_summary_skips_generation() {
    let fleet = FakeFleet {
        coding_related: false,
        ..FakeFleet::default()
    };
    let coordinator = coordinator(fleet);

    let result = coordinator.run(run_request(3)).await.unwrap();

    let generation = &result.stages[&StageName::IdeaGeneration];
    assert_eq!(generation.status, StageStatus::Ok);
    assert_eq!(generation.payload["count"], 0);

    // No ideas means composition has nothing to work with.
    assert_eq!(
        result.stages[&StageName::ProposalComposition].status,
        StageStatus::Failed
    );
}

#[tokio::test]
async fn unavailable_classifier_defaults_but_is_flagged_incomplete() {
    let mut fleet = FakeFleet::coding(vec![]);
    fleet.classify_fail = true;
    let coordinator = coordinator(fleet);

    let result = coordinator.run(run_request(3)).await.unwrap();

    // The default verdict is recorded, but not as a clean stage: a caller
    // can tell it apart from a genuine "not coding-related".
    let classification = &result.stages[&StageName::Classification];
    assert_eq!(classification.status, StageStatus::Failed);
    assert_eq!(classification.payload["coding_related"], false);
    assert!(classification
        .error
        .as_deref()
        .unwrap()
        .contains("classifier down"));
    assert!(result.incomplete.contains(&StageName::Classification));

    // The session continued on the default: no generation, no proposal.
    assert_eq!(result.stages[&StageName::IdeaGeneration].payload["count"], 0);
    assert_eq!(
        result.stages[&StageName::ProposalComposition].status,
        StageStatus::Failed
    );
}

#[tokio::test]
async fn extraction_failure_aborts_downstream_stages() {
    let mut fleet = FakeFleet::coding(vec![]);
    fleet.extract_fail = true;
    let coordinator = coordinator(fleet);

    let result = coordinator.run(run_request(3)).await.unwrap();

    assert_eq!(
        result.stages[&StageName::Extraction].status,
        StageStatus::Failed
    );
    // Classification ran in parallel and is still recorded.
    assert!(result.stages.contains_key(&StageName::Classification));
    // Nothing downstream of extraction ran.
    assert!(!result.stages.contains_key(&StageName::IdeaGeneration));
    assert!(!result.stages.contains_key(&StageName::ProposalComposition));
    assert!(result.incomplete.contains(&StageName::Projection));
}

#[tokio::test]
async fn session_deadline_returns_partial_results() {
    let mut fleet = FakeFleet::coding(vec![]);
    fleet.extract_delay_ms = 2_000;
    let pipeline = PipelineConfig {
        session_deadline_ms: 100,
        ..PipelineConfig::default()
    };
    let coordinator = PipelineCoordinator::new(
        Arc::new(fleet),
        pipeline,
        FeasibilityConfig::default(),
    );

    let started = std::time::Instant::now();
    let result = coordinator.run(run_request(1)).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    // Extraction never finished, so the session carries no extraction result.
    assert!(result.incomplete.contains(&StageName::Extraction));
}

#[tokio::test]
async fn feasibility_aggregate_recomputed_locally() {
    let coordinator = coordinator(FakeFleet::coding(vec![]));

    let report = coordinator
        .score_feasibility("Idea 0", "a coding project")
        .await
        .unwrap();

    // 0.2*80 + 0.2*90 + 0.25*70 + 0.2*85 + 0.15*60 = 77.5, not the wire's 0.0
    assert!((report.aggregate.overall() - 77.5).abs() < 1e-9);
    assert!(report.aggregate.passes_threshold());
    assert_eq!(
        report.aggregate.passes_threshold(),
        report.aggregate.overall() >= report.aggregate.threshold()
    );
}

#[tokio::test]
async fn publish_with_empty_files_fails_before_any_call() {
    let fleet = FakeFleet::coding(vec![]);
    let coordinator = PipelineCoordinator::new(
        Arc::new(fleet),
        PipelineConfig::default(),
        FeasibilityConfig::default(),
    );

    let doc: PublishDoc = serde_json::from_value(serde_json::json!({
        "token": "ghp_x",
        "owner": "octo",
        "title": "Empty Project",
        "files": [],
    }))
    .unwrap();

    let err = coordinator.publish(doc).await.unwrap_err();
    assert!(matches!(err, ForgeError::Validation(_)));
    assert_eq!(coordinator_fleet_pushes(&coordinator), 0);
}

#[tokio::test]
async fn publish_happy_path_reaches_fleet_once() {
    let fleet = FakeFleet::coding(vec![]);
    let coordinator = PipelineCoordinator::new(
        Arc::new(fleet),
        PipelineConfig::default(),
        FeasibilityConfig::default(),
    );

    let doc: PublishDoc = serde_json::from_value(serde_json::json!({
        "token": "ghp_x",
        "owner": "octo",
        "title": "Cache Warmer",
        "files": [{"path": "src/main.rs", "content": "fn main() {}"}],
    }))
    .unwrap();

    let url = coordinator.publish(doc).await.unwrap();
    assert_eq!(url, "https://github.com/octo/cache-warmer");
    assert_eq!(coordinator_fleet_pushes(&coordinator), 1);
}

#[tokio::test]
async fn enhanced_ideas_come_from_the_corpus() {
    let coordinator = coordinator(FakeFleet::coding(vec![]));
    let ideas = coordinator.enhanced_ideas().await.unwrap();
    assert_eq!(ideas.len(), 1);
    assert_eq!(ideas[0].title, "Corpus-derived idea");
}

#[tokio::test]
async fn empty_topics_rejected_before_any_stage() {
    let coordinator = coordinator(FakeFleet::coding(vec![]));
    let request: RunRequest =
        serde_json::from_value(serde_json::json!({"topics": ["  "]})).unwrap();

    let err = coordinator.run(request).await.unwrap_err();
    assert!(matches!(err, ForgeError::Validation(_)));
}

fn coordinator_fleet_pushes(coordinator: &PipelineCoordinator<FakeFleet>) -> usize {
    coordinator.fleet().push_calls.load(Ordering::SeqCst)
}
