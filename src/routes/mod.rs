//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Uploaded PDFs may be far larger than axum's 2 MB default.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Build the application router with:
/// - WebSocket at `/ws` (one quiz session per connection)
/// - adaptive quiz sessions under `/api/v1/quiz/...`
/// - quick revision under `/api/v1/revision/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/quiz/sessions", post(http::http_create_session))
        .route("/api/v1/quiz/sessions/:id", delete(http::http_delete_session))
        .route("/api/v1/quiz/sessions/:id/document", post(http::http_replace_document))
        .route("/api/v1/quiz/sessions/:id/question", get(http::http_get_question))
        .route("/api/v1/quiz/sessions/:id/answer", post(http::http_post_answer))
        .route("/api/v1/quiz/sessions/:id/metrics", get(http::http_get_metrics))
        .route("/api/v1/quiz/sessions/:id/reset", post(http::http_post_reset))
        .route("/api/v1/quiz/sessions/:id/finish", post(http::http_post_finish))
        .route("/api/v1/quiz/sessions/:id/report", get(http::http_get_report))
        .route("/api/v1/revision/upload", post(http::http_revision_upload))
        .route("/api/v1/revision/accuracy-check", get(http::http_accuracy_check))
        .route("/api/v1/revision/revise/:chunk_id", get(http::http_revise))
        .route("/api/v1/revision/quick-pdf/:doc", get(http::http_quick_pdf))
        // State + body limit + CORS + HTTP tracing
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::revision::index_document;
    use crate::session::QuizSession;

    fn app_state() -> Arc<AppState> {
        Arc::new(AppState::with_parts(None, AppConfig::default()))
    }

    async fn json_body(res: axum::response::Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn session_with_document(state: &AppState) -> String {
        let mut s = QuizSession::new();
        s.load_document("notes.pdf", "Cells are the basic unit of life.".into());
        state.sessions.insert(s).await.0
    }

    #[tokio::test]
    async fn health_reports_model_status() {
        let res = build_router(app_state()).oneshot(get("/api/v1/health")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let v = json_body(res).await;
        assert_eq!(v["ok"], true);
        assert_eq!(v["model"], false);
    }

    #[tokio::test]
    async fn unknown_session_is_404_with_error_body() {
        let res = build_router(app_state()).oneshot(get("/api/v1/quiz/sessions/nope/metrics")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(res).await["error"], "not_found");
    }

    #[tokio::test]
    async fn metrics_start_empty() {
        let state = app_state();
        let id = session_with_document(&state).await;
        let res = build_router(state).oneshot(get(&format!("/api/v1/quiz/sessions/{id}/metrics"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let v = json_body(res).await;
        assert_eq!(v["sessionId"], id.as_str());
        assert_eq!(v["metrics"]["total"], 0);
        assert_eq!(v["metrics"]["meanDifficulty"], 1.0);
        assert_eq!(v["metrics"]["currentDifficulty"], 1);
        assert_eq!(v["metrics"]["accuracyPct"], 0.0);
        assert!(v["metrics"].get("mean_difficulty").is_none());
    }

    #[tokio::test]
    async fn question_without_model_is_an_error_card() {
        let state = app_state();
        let id = session_with_document(&state).await;
        let res = build_router(state).oneshot(get(&format!("/api/v1/quiz/sessions/{id}/question"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let v = json_body(res).await;
        assert_eq!(v["status"], "error");
        assert_eq!(v["kind"], "invocation");
    }

    #[tokio::test]
    async fn answer_to_unknown_question_conflicts() {
        let state = app_state();
        let id = session_with_document(&state).await;
        let res = build_router(state)
            .oneshot(post_json(&format!("/api/v1/quiz/sessions/{id}/answer"), r#"{"questionId":"q1","choice":"A"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(res).await["error"], "conflict");
    }

    #[tokio::test]
    async fn report_is_a_pdf_attachment() {
        let state = app_state();
        let id = session_with_document(&state).await;
        let res = build_router(state).oneshot(get(&format!("/api/v1/quiz/sessions/{id}/report"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(res.headers()[header::CONTENT_DISPOSITION], "attachment; filename=\"Assessment_notes.pdf\"");
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn delete_removes_session() {
        let state = app_state();
        let id = session_with_document(&state).await;
        let app = build_router(state);
        let req = Request::builder().method("DELETE").uri(format!("/api/v1/quiz/sessions/{id}")).body(Body::empty()).unwrap();
        assert_eq!(app.clone().oneshot(req).await.unwrap().status(), StatusCode::NO_CONTENT);
        let res = app.oneshot(get(&format!("/api/v1/quiz/sessions/{id}/metrics"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_without_file_field_is_bad_request() {
        let boundary = "XBOUNDARY";
        let body = format!("--{boundary}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nhello\r\n--{boundary}--\r\n");
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/revision/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();
        let res = build_router(app_state()).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["error"], "bad_request");
    }

    #[tokio::test]
    async fn accuracy_check_and_missing_chunk() {
        let state = app_state();
        let text = "Osmosis moves water across a semipermeable membrane. ".repeat(10);
        index_document(&state.chunks, &state.config.revision, "bio.pdf", &text).await.unwrap();
        let app = build_router(state);

        let res = app.clone().oneshot(get("/api/v1/revision/accuracy-check?query=osmosis%20water")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let v = json_body(res).await;
        assert_eq!(v["ids"][0], "bio.pdf_0");

        let res = app.oneshot(get("/api/v1/revision/revise/missing_9")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
