use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use sopforge_agent::schemas::{
    ChatAssembleRequest, ChatAssembleResponse, ChatMessageRequest, ChatMessageResponse,
    ChatStartRequest, ChatStartResponse,
};
use sopforge_agent::{AgentRuntime, ToolError};
use sopforge_db::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<AgentRuntime>,
    pub db_pool: DbPool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sop/chat/start", post(start_chat))
        .route("/sop/chat/message", post(post_message))
        .route("/sop/chat/assemble", post(assemble))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Clone, Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn error_response(error: ToolError) -> ApiError {
    let status = match &error {
        ToolError::NotFound(_) => StatusCode::NOT_FOUND,
        ToolError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ToolError::Storage(_) | ToolError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(event_name = "request_failed", error = %error, "request failed");
    }
    (status, Json(ErrorBody { error: error.to_string() }))
}

async fn start_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatStartRequest>,
) -> Result<Json<ChatStartResponse>, ApiError> {
    state.runtime.start(req).await.map(Json).map_err(error_response)
}

async fn post_message(
    State(state): State<AppState>,
    Json(req): Json<ChatMessageRequest>,
) -> Result<Json<ChatMessageResponse>, ApiError> {
    state.runtime.message(req).await.map(Json).map_err(error_response)
}

async fn assemble(
    State(state): State<AppState>,
    Json(req): Json<ChatAssembleRequest>,
) -> Result<Json<ChatAssembleResponse>, ApiError> {
    state.runtime.assemble(req).await.map(Json).map_err(error_response)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub checked_at: String,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "sopforge-server runtime initialized".to_string(),
        },
        database,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use sopforge_agent::AgentRuntime;
    use sopforge_db::{connect_with_settings, migrations};

    use super::{router, AppState};

    async fn test_router(artifacts_dir: &std::path::Path) -> Router {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let runtime = Arc::new(AgentRuntime::new(&pool, artifacts_dir));
        router(AppState { runtime, db_pool: pool })
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes =
            axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn health_reports_ready_with_reachable_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = test_router(dir.path()).await;

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let payload = body_json(response).await;
        assert_eq!(payload["status"], "ready");
        assert_eq!(payload["database"]["status"], "ready");
    }

    #[tokio::test]
    async fn start_returns_greeting_and_document_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = test_router(dir.path()).await;

        let response = app
            .oneshot(post_json(
                "/sop/chat/start",
                json!({"thread_id": "t-1", "org_id": "org-1", "user_id": "user-1"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let payload = body_json(response).await;
        assert_eq!(payload["assistant"], "Hi! Let's draft a new SOP. What is this process called?");
        assert!(!payload["document_id"].as_str().unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn message_turn_snapshots_document_blocks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = test_router(dir.path()).await;

        let start = app
            .clone()
            .oneshot(post_json(
                "/sop/chat/start",
                json!({"thread_id": "t-2", "org_id": "org-1", "user_id": "user-1"}),
            ))
            .await
            .expect("start");
        assert_eq!(start.status(), StatusCode::OK);

        let response = app
            .oneshot(post_json(
                "/sop/chat/message",
                json!({
                    "thread_id": "t-2",
                    "user_id": "user-1",
                    "text": "Call it Spill Cleanup Procedure."
                }),
            ))
            .await
            .expect("message");
        assert_eq!(response.status(), StatusCode::OK);

        let payload = body_json(response).await;
        assert_eq!(payload["assistant"], "Title captured. Please share a one-sentence description.");
        assert_eq!(payload["next"], "ask_clarification");
        let types: Vec<&str> = payload["blocks_snapshot"]
            .as_array()
            .expect("snapshot array")
            .iter()
            .filter_map(|b| b["type"].as_str())
            .collect();
        assert!(types.contains(&"title"));
    }

    #[tokio::test]
    async fn unknown_thread_maps_to_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = test_router(dir.path()).await;

        let response = app
            .oneshot(post_json(
                "/sop/chat/message",
                json!({"thread_id": "ghost", "user_id": "user-1", "text": "hello"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let payload = body_json(response).await;
        assert!(payload["error"].as_str().unwrap_or_default().contains("thread ghost"));
    }

    #[tokio::test]
    async fn unknown_assembly_format_maps_to_bad_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = test_router(dir.path()).await;

        let start = app
            .clone()
            .oneshot(post_json(
                "/sop/chat/start",
                json!({"thread_id": "t-3", "org_id": "org-1", "user_id": "user-1"}),
            ))
            .await
            .expect("start");
        let started = body_json(start).await;
        let document_id = started["document_id"].as_str().expect("document id").to_string();

        let response = app
            .oneshot(post_json(
                "/sop/chat/assemble",
                json!({"thread_id": "t-3", "document_id": document_id, "format": "docx"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_document_type_maps_to_bad_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = test_router(dir.path()).await;

        let response = app
            .oneshot(post_json(
                "/sop/chat/start",
                json!({
                    "thread_id": "t-4",
                    "org_id": "org-1",
                    "user_id": "user-1",
                    "document_type": "runbook"
                }),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
