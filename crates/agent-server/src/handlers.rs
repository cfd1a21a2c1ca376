//! HTTP Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use agent_core::{
    AgentConfig, Message, Roster, RunMode, RunRequest, RunResult, SelectedSource, SessionId,
    SessionStore,
};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model_connected: bool,
    pub gateway: String,
    pub tools: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunApiRequest {
    pub message: String,
    /// Agents by id or name, in roster order; the first one leads
    #[serde(default)]
    pub agent_ids: Vec<String>,
    /// Inline roster, used instead of `agent_ids`
    #[serde(default)]
    pub roster: Option<Roster>,
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub knowledge_context: Option<String>,
    #[serde(default)]
    pub selected_source: Option<SelectedSource>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub result: RunResult,
}

#[derive(Debug, Serialize)]
pub struct SessionMessagesResponse {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let gateway = state.engine.gateway();
    let model_connected = gateway.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model_connected,
        gateway: gateway.name().to_string(),
        tools: state.engine.tools().names().into_iter().map(String::from).collect(),
    })
}

/// Agents known to the server
pub async fn list_agents(State(state): State<AppState>) -> Result<Json<Vec<AgentConfig>>, ApiError> {
    state.directory.list().await.map(Json).map_err(|e| {
        tracing::error!(error = %e, "Listing agents failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "DIRECTORY_ERROR", e.user_message())
    })
}

async fn resolve_roster(state: &AppState, payload: &mut RunApiRequest) -> Result<Roster, ApiError> {
    if let Some(roster) = payload.roster.take() {
        return Ok(roster);
    }
    if payload.agent_ids.is_empty() {
        return state.directory.list().await.map(Roster::new).map_err(|e| {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "DIRECTORY_ERROR", e.user_message())
        });
    }

    let mut agents = Vec::with_capacity(payload.agent_ids.len());
    for id in &payload.agent_ids {
        match state.directory.get(id).await {
            Ok(Some(agent)) => agents.push(agent),
            Ok(None) => {
                return Err(api_error(
                    StatusCode::NOT_FOUND,
                    "AGENT_NOT_FOUND",
                    format!("Agent '{id}' not found"),
                ));
            }
            Err(e) => {
                return Err(api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DIRECTORY_ERROR",
                    e.user_message(),
                ));
            }
        }
    }
    Ok(Roster::new(agents))
}

/// Execute one request
pub async fn run_handler(
    State(state): State<AppState>,
    Json(mut payload): Json<RunApiRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "EMPTY_MESSAGE", "Message must not be empty"));
    }

    let roster = resolve_roster(&state, &mut payload).await?;
    let session_id = payload
        .session_id
        .map_or_else(SessionId::new, SessionId::from_string);

    let mut request = RunRequest::new(payload.message, roster)
        .with_mode(payload.mode)
        .with_session(session_id.clone());
    if let Some(knowledge) = payload.knowledge_context.or_else(|| state.knowledge.clone()) {
        request = request.with_knowledge(knowledge);
    }
    if let Some(source) = payload.selected_source {
        request = request.with_selected_source(source);
    }

    tracing::info!(session_id = %session_id, mode = ?request.mode, agents = request.roster.len(), "Run requested");
    let result = state.engine.run(request).await;
    if let Some(error) = &result.error {
        tracing::warn!(session_id = %session_id, error = %error, "Run finished with error");
    }

    Ok(Json(RunResponse {
        session_id: session_id.to_string(),
        result,
    }))
}

/// Persisted trace of one session
pub async fn session_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionMessagesResponse>, ApiError> {
    let session_id = SessionId::from_string(id);
    let internal = |e: agent_core::AgentError| {
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "SESSION_ERROR", e.user_message())
    };

    let Some(session) = state.sessions.session(&session_id).map_err(internal)? else {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            "SESSION_NOT_FOUND",
            format!("Session '{session_id}' not found"),
        ));
    };
    let messages = state.sessions.messages(&session_id).await.map_err(internal)?;

    Ok(Json(SessionMessagesResponse {
        session_id: session_id.to_string(),
        title: session.title,
        messages,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use agent_core::{
        AgentError, EngineConfig, GenerationOptions, MemorySessionStore, ModelGateway,
        Orchestrator, Result, ToolRegistry, ToolSchema,
    };

    use super::*;
    use crate::state::default_roster;

    /// Answers every call with the same text
    struct EchoGateway {
        reply: Option<String>,
    }

    #[async_trait]
    impl ModelGateway for EchoGateway {
        fn name(&self) -> &str {
            "Echo"
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(self.reply.is_some())
        }

        async fn complete(
            &self,
            _system_prompt: &str,
            _history: &[Message],
            _tools: &[ToolSchema],
            _options: &GenerationOptions,
        ) -> Result<Message> {
            self.reply
                .clone()
                .map(Message::assistant)
                .ok_or_else(|| AgentError::ModelUnavailable("connection refused".into()))
        }
    }

    fn state(reply: Option<&str>) -> AppState {
        let sessions = Arc::new(MemorySessionStore::new());
        let gateway = Arc::new(EchoGateway {
            reply: reply.map(String::from),
        });
        AppState {
            engine: Orchestrator::new(gateway, ToolRegistry::new(), EngineConfig::default())
                .unwrap()
                .with_store(sessions.clone()),
            directory: Arc::new(default_roster()),
            sessions,
            knowledge: None,
        }
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = crate::app(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post_run(body: Value) -> Request<Body> {
        Request::post("/api/run")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_and_agents() {
        let (status, body) = send(state(Some("ok")), Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model_connected"], true);
        assert_eq!(body["gateway"], "Echo");

        let (status, body) =
            send(state(Some("ok")), Request::get("/api/agents").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[1]["name"], "Senior Data Analyst");
    }

    #[tokio::test]
    async fn test_run_persists_session() {
        let state = state(Some("The kickoff is on Monday."));
        let (status, body) = send(
            state.clone(),
            post_run(json!({"message": "When is the kickoff?", "session_id": "s-1"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["final_answer"], "The kickoff is on Monday.");
        assert_eq!(body["session_id"], "s-1");

        let (status, body) = send(
            state,
            Request::get("/api/sessions/s-1/messages").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "When is the kickoff?");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_run_reports_engine_error_in_body() {
        let (status, body) = send(state(None), post_run(json!({"message": "Status report"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
        assert!(body["trace"].as_array().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn test_unknown_agent_and_session() {
        let (status, body) = send(
            state(Some("ok")),
            post_run(json!({"message": "hi", "agent_ids": ["Nobody"]})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "AGENT_NOT_FOUND");

        let (status, _) = send(
            state(Some("ok")),
            Request::get("/api/sessions/missing/messages").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
