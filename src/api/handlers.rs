use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::api::state::AppState;
use crate::error::ForgeError;
use crate::pipeline::coordinator::{FeasibilityReport, ReferenceReport, RunRequest};
use crate::pipeline::publish::PublishDoc;
use crate::pipeline::types::{FinalResult, Idea};
use crate::supervisor::ProcessState;

type HandlerResult<T> = std::result::Result<Json<T>, (StatusCode, String)>;

/// Map pipeline errors to HTTP status codes. Upstream agent bodies are
/// passed through verbatim.
fn map_error(err: ForgeError) -> (StatusCode, String) {
    let status = match &err {
        ForgeError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ForgeError::UnknownAgent(_) => StatusCode::NOT_FOUND,
        ForgeError::Upstream(_) | ForgeError::Stage { .. } => StatusCode::BAD_GATEWAY,
        ForgeError::StageTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ForgeError::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Internal error in API handler: {}", err);
    }
    (status, err.to_string())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: i64,
    pub version: String,
    pub agents: Vec<AgentStatus>,
}

#[derive(Debug, Serialize)]
pub struct AgentStatus {
    pub name: String,
    pub port: u16,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

async fn agent_statuses(state: &AppState) -> Vec<AgentStatus> {
    let mut statuses = Vec::with_capacity(state.registry.len());
    for descriptor in state.registry.descriptors() {
        // Clone the handle out so no map guard is held across the lock await.
        let entry = state
            .handles
            .get(&descriptor.name)
            .map(|e| std::sync::Arc::clone(e.value()));
        let status = match entry {
            Some(handle) => {
                let handle = handle.lock().await;
                AgentStatus {
                    name: descriptor.name.clone(),
                    port: descriptor.port,
                    state: handle.state().to_string(),
                    pid: (handle.pid > 0).then_some(handle.pid),
                    last_error: handle.last_error.clone(),
                }
            }
            None => AgentStatus {
                name: descriptor.name.clone(),
                port: descriptor.port,
                state: "not_launched".to_string(),
                pid: None,
                last_error: None,
            },
        };
        statuses.push(status);
    }
    statuses
}

/// GET /health -- supervisor liveness plus per-agent process state
pub async fn health_handler(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let agents = agent_statuses(&state).await;
    let all_running = agents
        .iter()
        .all(|a| a.state == ProcessState::Running.to_string());

    Ok(Json(HealthResponse {
        status: if all_running { "ok" } else { "degraded" }.to_string(),
        uptime_secs: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        agents,
    }))
}

/// GET /api/agents -- fleet status in launch order
pub async fn get_agents(State(state): State<AppState>) -> HandlerResult<Vec<AgentStatus>> {
    Ok(Json(agent_statuses(&state).await))
}

/// POST /api/pipeline/run -- run one full pipeline session
pub async fn run_pipeline(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> HandlerResult<FinalResult> {
    state
        .coordinator
        .run(request)
        .await
        .map(Json)
        .map_err(map_error)
}

/// GET /api/ideas -- enhanced ideas from the extracted corpus
pub async fn get_ideas(State(state): State<AppState>) -> HandlerResult<Vec<Idea>> {
    state
        .coordinator
        .enhanced_ideas()
        .await
        .map(Json)
        .map_err(map_error)
}

#[derive(Debug, Deserialize)]
pub struct FeasibilityApiRequest {
    pub title: String,
    pub summary: String,
}

/// POST /api/feasibility -- score one idea on demand
pub async fn score_feasibility(
    State(state): State<AppState>,
    Json(request): Json<FeasibilityApiRequest>,
) -> HandlerResult<FeasibilityReport> {
    state
        .coordinator
        .score_feasibility(&request.title, &request.summary)
        .await
        .map(Json)
        .map_err(map_error)
}

#[derive(Debug, Deserialize)]
pub struct ReferencesApiRequest {
    pub text: String,
    #[serde(default)]
    pub max_references: Option<usize>,
    #[serde(default)]
    pub fast: bool,
    #[serde(default)]
    pub budget_ms: Option<u64>,
}

/// POST /api/references -- budgeted reference retrieval
pub async fn get_references(
    State(state): State<AppState>,
    Json(request): Json<ReferencesApiRequest>,
) -> HandlerResult<ReferenceReport> {
    state
        .coordinator
        .fetch_references(
            &request.text,
            request.max_references,
            request.fast,
            request.budget_ms,
        )
        .await
        .map(Json)
        .map_err(map_error)
}

#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub repo_url: String,
}

/// POST /api/github/push -- publish a document set as a repository
pub async fn github_push(
    State(state): State<AppState>,
    Json(doc): Json<PublishDoc>,
) -> HandlerResult<PushResponse> {
    state
        .coordinator
        .publish(doc)
        .await
        .map(|repo_url| Json(PushResponse { repo_url }))
        .map_err(map_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let (status, _) = map_error(ForgeError::Validation("bad".into()));
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = map_error(ForgeError::Upstream("403: forbidden".into()));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.contains("403: forbidden"));

        let (status, _) = map_error(ForgeError::StageTimeout {
            stage: "reference_retrieval".into(),
            budget_ms: 1000,
        });
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }
}
