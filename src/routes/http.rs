//! HTTP endpoint handlers. These are thin wrappers that forward to the quiz
//! session and revision modules. Each handler is instrumented; failures are
//! `ApiError`s and render as `{ "error", "message" }` JSON.

use std::sync::Arc;
use axum::{
  body::Bytes,
  extract::{Multipart, Path, Query, State},
  http::{header, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::domain::QuestionCard;
use crate::error::ApiError;
use crate::extract::extract_text_blocking;
use crate::protocol::*;
use crate::revision::{self, AccuracyReport, RevisionGuide, UploadSummary};
use crate::session::{AnswerOutcome, QuizSession, Summary};
use crate::state::AppState;

const UPLOAD_FIELD: &str = "file";

/// Reads the uploaded file from a multipart body: `(filename, bytes)`.
async fn read_upload(mut multipart: Multipart) -> Result<(String, Bytes), ApiError> {
  while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::BadRequest(e.to_string()))? {
    if field.name() != Some(UPLOAD_FIELD) {
      continue;
    }
    let filename = field.file_name()
      .map(str::to_string)
      .filter(|n| !n.trim().is_empty())
      .unwrap_or_else(|| "document.pdf".into());
    let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if bytes.is_empty() {
      return Err(ApiError::BadRequest("uploaded file is empty".into()));
    }
    return Ok((filename, bytes));
  }
  Err(ApiError::BadRequest(format!("multipart field {UPLOAD_FIELD:?} is required")))
}

/// `application/pdf` download response.
pub fn pdf_response(filename: &str, bytes: Vec<u8>) -> Response {
  let safe = filename.replace(|c: char| matches!(c, '"' | '\\' | '\r' | '\n'), "_");
  (
    [
      (header::CONTENT_TYPE, "application/pdf".to_string()),
      (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{safe}\"")),
    ],
    bytes,
  )
    .into_response()
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, model: state.llm.is_some() })
}

//
// Adaptive quiz
//

#[instrument(level = "info", skip(state, multipart))]
pub async fn http_create_session(
  State(state): State<Arc<AppState>>,
  multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentOut>), ApiError> {
  let (name, bytes) = read_upload(multipart).await?;
  let text = extract_text_blocking(bytes.to_vec()).await?;

  let mut session = QuizSession::new();
  let out = DocumentOut::new(&session.id, &name, &text);
  session.load_document(&name, text);
  state.sessions.insert(session).await;
  info!(target: "quiz", session = %out.session_id, document = %name, "HTTP session created");
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state, multipart))]
pub async fn http_replace_document(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  multipart: Multipart,
) -> Result<Json<DocumentOut>, ApiError> {
  let shared = state.sessions.get(&id).await?;
  let (name, bytes) = read_upload(multipart).await?;
  let text = extract_text_blocking(bytes.to_vec()).await?;

  let mut session = shared.lock().await;
  let out = DocumentOut::new(&session.id, &name, &text);
  session.load_document(&name, text);
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_question(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Query(q): Query<QuestionQuery>,
) -> Result<Json<QuestionCard>, ApiError> {
  let shared = state.sessions.get(&id).await?;
  let mut session = shared.lock().await;
  if q.topic.is_some() {
    session.set_topic_focus(q.topic);
  }
  let card = session.next_question(state.quiz_ctx()).await?;
  info!(target: "quiz", session = %id, question = %card.id(), error = card.is_error(), "HTTP question served");
  Ok(Json(card))
}

#[instrument(level = "info", skip(state, body), fields(question_id = %body.question_id))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<AnswerOutcome>, ApiError> {
  let shared = state.sessions.get(&id).await?;
  let mut session = shared.lock().await;
  let outcome = session.submit_answer(state.quiz_ctx(), &body.question_id, &body.choice).await?;
  Ok(Json(outcome))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_metrics(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<MetricsOut>, ApiError> {
  let shared = state.sessions.get(&id).await?;
  let session = shared.lock().await;
  Ok(Json(MetricsOut::of(&session)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_reset(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<MetricsOut>, ApiError> {
  let shared = state.sessions.get(&id).await?;
  let mut session = shared.lock().await;
  session.reset();
  Ok(Json(MetricsOut::of(&session)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_finish(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<Summary>, ApiError> {
  let shared = state.sessions.get(&id).await?;
  let mut session = shared.lock().await;
  Ok(Json(session.finish(state.quiz_ctx()).await))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_report(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Response, ApiError> {
  let shared = state.sessions.get(&id).await?;
  let session = shared.lock().await;
  let bytes = session.report_pdf()?;
  let stem = session.document_name().unwrap_or("session").trim_end_matches(".pdf").to_string();
  Ok(pdf_response(&format!("Assessment_{stem}.pdf"), bytes))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  state.sessions.remove(&id).await?;
  Ok(StatusCode::NO_CONTENT)
}

//
// Quick revision
//

#[instrument(level = "info", skip(state, multipart))]
pub async fn http_revision_upload(
  State(state): State<Arc<AppState>>,
  multipart: Multipart,
) -> Result<Json<UploadSummary>, ApiError> {
  let (name, bytes) = read_upload(multipart).await?;
  let summary = revision::upload(&state.chunks, &state.config.revision, &name, bytes.to_vec()).await?;
  Ok(Json(summary))
}

#[instrument(level = "info", skip(state), fields(query_len = q.query.len()))]
pub async fn http_accuracy_check(
  State(state): State<Arc<AppState>>,
  Query(q): Query<AccuracyQuery>,
) -> Result<Json<AccuracyReport>, ApiError> {
  let report = revision::accuracy_check(&state.chunks, &q.query, state.config.revision.top_k).await?;
  Ok(Json(report))
}

#[instrument(level = "info", skip(state))]
pub async fn http_revise(
  State(state): State<Arc<AppState>>,
  Path(chunk_id): Path<String>,
) -> Result<Json<RevisionOut<RevisionGuide>>, ApiError> {
  let guide = revision::revise(state.revision_ctx(), &state.chunks, &chunk_id).await?;
  Ok(Json(RevisionOut { analysis: guide }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_quick_pdf(
  State(state): State<Arc<AppState>>,
  Path(doc): Path<String>,
) -> Result<Response, ApiError> {
  let (filename, bytes) = revision::quick_pdf(state.revision_ctx(), &state.chunks, &doc).await?;
  Ok(pdf_response(&filename, bytes))
}
