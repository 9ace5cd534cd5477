//! Pipeline data model: sessions, stages, and the artifacts stages produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Fixed set of pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Extraction,
    Projection,
    Classification,
    IdeaGeneration,
    FeasibilityScoring,
    ReferenceRetrieval,
    ProposalComposition,
    RepositoryPublication,
}

impl StageName {
    /// Stages run by the default session sequence, in dependency order.
    /// Feasibility scoring and publication run on explicit demand only.
    pub const DEFAULT_SEQUENCE: [StageName; 6] = [
        StageName::Extraction,
        StageName::Projection,
        StageName::Classification,
        StageName::IdeaGeneration,
        StageName::ReferenceRetrieval,
        StageName::ProposalComposition,
    ];
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StageName::Extraction => "extraction",
            StageName::Projection => "projection",
            StageName::Classification => "classification",
            StageName::IdeaGeneration => "idea_generation",
            StageName::FeasibilityScoring => "feasibility_scoring",
            StageName::ReferenceRetrieval => "reference_retrieval",
            StageName::ProposalComposition => "proposal_composition",
            StageName::RepositoryPublication => "repository_publication",
        };
        write!(f, "{name}")
    }
}

/// Outcome of one stage call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Ok,
    /// Budget elapsed; the payload carries whatever was gathered in time
    PartialTimeout,
    Failed,
}

/// Result of one stage, recorded on the session
#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    pub stage: StageName,
    pub status: StageStatus,
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageResult {
    pub fn ok(stage: StageName, payload: serde_json::Value) -> Self {
        Self {
            stage,
            status: StageStatus::Ok,
            payload,
            error: None,
        }
    }

    pub fn partial(stage: StageName, payload: serde_json::Value) -> Self {
        Self {
            stage,
            status: StageStatus::PartialTimeout,
            payload,
            error: None,
        }
    }

    pub fn failed(stage: StageName, error: impl Into<String>) -> Self {
        Self {
            stage,
            status: StageStatus::Failed,
            payload: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == StageStatus::Ok
    }
}

/// One end-user request flowing through the pipeline. Never persisted;
/// destroyed once the final response is produced.
#[derive(Debug, Clone)]
pub struct PipelineSession {
    pub session_id: Uuid,
    pub topics: BTreeSet<String>,
    stage_results: BTreeMap<StageName, StageResult>,
    pub started_at: DateTime<Utc>,
    pub deadline_budget: Duration,
}

impl PipelineSession {
    pub fn new(topics: impl IntoIterator<Item = String>, deadline_budget: Duration) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            topics: topics.into_iter().collect(),
            stage_results: BTreeMap::new(),
            started_at: Utc::now(),
            deadline_budget,
        }
    }

    /// Summary text the generation stages work from
    pub fn summary(&self) -> String {
        self.topics.iter().cloned().collect::<Vec<_>>().join("; ")
    }

    /// Record a stage result. Results are append-only: a second record for
    /// the same stage is dropped, never replaces the first.
    pub fn record(&mut self, result: StageResult) {
        if self.stage_results.contains_key(&result.stage) {
            warn!(
                "Session {}: duplicate result for stage {} ignored",
                self.session_id, result.stage
            );
            return;
        }
        self.stage_results.insert(result.stage, result);
    }

    pub fn result(&self, stage: StageName) -> Option<&StageResult> {
        self.stage_results.get(&stage)
    }

    pub fn stage_results(&self) -> &BTreeMap<StageName, StageResult> {
        &self.stage_results
    }
}

/// Final response for a session: whatever stage results were available when
/// the pipeline finished or the session deadline elapsed.
#[derive(Debug, Clone, Serialize)]
pub struct FinalResult {
    pub session_id: Uuid,
    pub topics: Vec<String>,
    pub stages: BTreeMap<StageName, StageResult>,
    /// Default-sequence stages that are missing or did not complete cleanly
    pub incomplete: Vec<StageName>,
}

impl FinalResult {
    pub fn from_session(session: &PipelineSession) -> Self {
        let incomplete = StageName::DEFAULT_SEQUENCE
            .iter()
            .copied()
            .filter(|stage| {
                session
                    .result(*stage)
                    .map(|r| !r.is_ok())
                    .unwrap_or(true)
            })
            .collect();

        Self {
            session_id: session.session_id,
            topics: session.topics.iter().cloned().collect(),
            stages: session.stage_results().clone(),
            incomplete,
        }
    }
}

/// Coding-related classification of a summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub coding_related: bool,
    pub confidence: f64,
    pub reasons: String,
}

impl Classification {
    /// The never-abort default used when the classification call fails
    pub fn not_coding_related(reasons: impl Into<String>) -> Self {
        Self {
            coding_related: false,
            confidence: 0.0,
            reasons: reasons.into(),
        }
    }
}

/// One generated code file inside an idea
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSample {
    pub filename: String,
    pub language: String,
    pub content: String,
}

/// One generated project idea
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Idea {
    pub title: String,
    pub approach: String,
    pub stack: String,
    pub documentation: String,
    #[serde(default)]
    pub code_samples: Vec<CodeSample>,
}

/// Score for one feasibility parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeasibilityScore {
    pub parameter: String,
    /// 0..100
    pub score: f64,
    /// 0..1
    pub confidence: f64,
    pub rationale: String,
}

/// Aggregated feasibility verdict. `passes_threshold` is derived state,
/// recomputed whenever `overall` or `threshold` changes.
#[derive(Debug, Clone, Serialize)]
pub struct FeasibilityAggregate {
    overall: f64,
    threshold: f64,
    passes_threshold: bool,
}

impl FeasibilityAggregate {
    pub fn new(overall: f64, threshold: f64) -> Self {
        Self {
            overall,
            threshold,
            passes_threshold: overall >= threshold,
        }
    }

    pub fn overall(&self) -> f64 {
        self.overall
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn passes_threshold(&self) -> bool {
        self.passes_threshold
    }

    pub fn set_overall(&mut self, overall: f64) {
        self.overall = overall;
        self.passes_threshold = self.overall >= self.threshold;
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
        self.passes_threshold = self.overall >= self.threshold;
    }
}

/// Composed research proposal
#[derive(Debug, Clone, Serialize)]
pub struct ResearchProposal {
    pub title: String,
    pub markdown: String,
    pub references: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Strip tracking query parameters and the trailing slash so equivalent links
/// de-duplicate. Unparseable input is returned as-is.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(raw) else {
        return raw.to_string();
    };
    if !parsed.scheme().starts_with("http") {
        return raw.to_string();
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| {
            let k = k.to_ascii_lowercase();
            !(k.starts_with("utm_") || k == "gclid" || k == "fbclid")
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        let query = kept
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        parsed.set_query(Some(&query));
    }
    parsed.set_fragment(None);

    let mut out = parsed.to_string();
    if out.ends_with('/') && parsed.path() != "/" {
        out.pop();
    }
    out
}

/// De-duplicate by normalized URL (preserving first occurrence), then cap.
pub fn dedupe_and_cap(links: Vec<String>, max: usize) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for link in links {
        let key = normalize_url(&link);
        if seen.insert(key) {
            out.push(link);
        }
        if out.len() >= max {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_results_append_only() {
        let mut session = PipelineSession::new(["quantum".to_string()], Duration::from_secs(60));
        session.record(StageResult::ok(StageName::Extraction, json!({"n": 1})));
        session.record(StageResult::failed(StageName::Extraction, "late duplicate"));

        let kept = session.result(StageName::Extraction).unwrap();
        assert_eq!(kept.status, StageStatus::Ok);
        assert_eq!(session.stage_results().len(), 1);
    }

    #[test]
    fn test_final_result_marks_incomplete_stages() {
        let mut session = PipelineSession::new(["topic".to_string()], Duration::from_secs(60));
        session.record(StageResult::ok(StageName::Extraction, json!([])));
        session.record(StageResult::partial(StageName::ReferenceRetrieval, json!([])));

        let result = FinalResult::from_session(&session);
        assert!(!result.incomplete.contains(&StageName::Extraction));
        assert!(result.incomplete.contains(&StageName::ReferenceRetrieval));
        assert!(result.incomplete.contains(&StageName::ProposalComposition));
    }

    #[test]
    fn test_aggregate_invariant_on_construction_and_update() {
        let mut agg = FeasibilityAggregate::new(80.0, 75.0);
        assert!(agg.passes_threshold());
        assert_eq!(agg.passes_threshold(), agg.overall() >= agg.threshold());

        agg.set_threshold(90.0);
        assert!(!agg.passes_threshold());

        agg.set_overall(95.0);
        assert!(agg.passes_threshold());
        assert_eq!(agg.passes_threshold(), agg.overall() >= agg.threshold());
    }

    #[test]
    fn test_normalize_url_strips_tracking_params() {
        assert_eq!(
            normalize_url("https://example.org/paper/?utm_source=feed&id=7"),
            "https://example.org/paper?id=7"
        );
        assert_eq!(
            normalize_url("https://example.org/paper/"),
            "https://example.org/paper"
        );
        assert_eq!(normalize_url("not a url"), "not a url");
    }

    #[test]
    fn test_dedupe_and_cap() {
        let links = vec![
            "https://a.org/x".to_string(),
            "https://a.org/x/".to_string(),
            "https://b.org/y".to_string(),
            "https://c.org/z".to_string(),
        ];
        let out = dedupe_and_cap(links, 2);
        assert_eq!(out, vec!["https://a.org/x", "https://b.org/y"]);
    }
}
