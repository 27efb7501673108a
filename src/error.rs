//! Error types for collaborators (extraction, model, chunk store, renderer) and
//! the HTTP-facing `ApiError` that maps them to status codes.
//!
//! Every error is terminal for the operation that raised it. None of them is
//! retried internally and none of them touches already-recorded quiz state.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;

/// Document could not be turned into usable text.
#[derive(Debug, Error)]
pub enum ExtractionError {
  #[error("could not read PDF: {0}")]
  Unreadable(String),
  #[error("document contains no readable text")]
  NoText,
  #[error("document has only {found} readable characters (need at least {required})")]
  TooShort { found: usize, required: usize },
}

/// The external model call failed before producing any text.
#[derive(Debug, Error)]
pub enum InvocationError {
  #[error("language model is not configured (set OPENAI_API_KEY)")]
  NotConfigured,
  #[error("model transport error: {0}")]
  Transport(String),
  #[error("model HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("model returned an empty response")]
  Empty,
}

impl From<reqwest::Error> for InvocationError {
  fn from(e: reqwest::Error) -> Self {
    InvocationError::Transport(e.to_string())
  }
}

/// None of the recovery strategies produced a JSON value.
#[derive(Debug, Error)]
#[error("could not parse structured response: {reason}")]
pub struct ParseError {
  pub reason: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("not found: {0}")]
  NotFound(String),
  #[error("{0}")]
  Mismatch(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
  #[error("pdf encoding failed: {0}")]
  Pdf(#[from] lopdf::Error),
  #[error("pdf write failed: {0}")]
  Io(#[from] std::io::Error),
}

/// Error surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Extraction(#[from] ExtractionError),
  #[error(transparent)]
  Invocation(#[from] InvocationError),
  #[error(transparent)]
  Parse(#[from] ParseError),
  #[error("{0}")]
  Validation(String),
  #[error("{0}")]
  NotFound(String),
  #[error("{0}")]
  Conflict(String),
  #[error("{0}")]
  BadRequest(String),
  #[error(transparent)]
  Render(#[from] RenderError),
}

impl From<StoreError> for ApiError {
  fn from(e: StoreError) -> Self {
    match e {
      StoreError::NotFound(what) => ApiError::NotFound(format!("not found: {what}")),
      StoreError::Mismatch(msg) => ApiError::Validation(msg),
    }
  }
}

impl ApiError {
  pub fn kind(&self) -> &'static str {
    match self {
      ApiError::Extraction(_) => "extraction",
      ApiError::Invocation(_) => "invocation",
      ApiError::Parse(_) => "parse",
      ApiError::Validation(_) => "validation",
      ApiError::NotFound(_) => "not_found",
      ApiError::Conflict(_) => "conflict",
      ApiError::BadRequest(_) => "bad_request",
      ApiError::Render(_) => "render",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Extraction(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Invocation(_) | ApiError::Parse(_) => StatusCode::BAD_GATEWAY,
      ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

#[derive(Serialize)]
struct ErrorBody {
  error: &'static str,
  message: String,
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let body = ErrorBody { error: self.kind(), message: self.to_string() };
    (self.status(), Json(body)).into_response()
  }
}
