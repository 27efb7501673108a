//! WebSocket upgrade + message loop. Each connection owns one quiz session that
//! lives exactly as long as the socket. We reply with a single JSON message
//! per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use base64::Engine;
use tracing::{debug, error, info, instrument};

use crate::error::ApiError;
use crate::extract::extract_text_blocking;
use crate::protocol::{ClientWsMessage, DocumentOut, MetricsOut, ServerWsMessage};
use crate::session::QuizSession;
use crate::state::AppState;

#[instrument(level = "info", skip(state, ws))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "quicklearn_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let mut session = QuizSession::new();
  info!(target: "quicklearn_backend", session = %session.id, "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "quicklearn_backend", kind = message_kind(&incoming), "WS received");
            handle_client_ws(incoming, &mut session, &state).await
              .unwrap_or_else(|e| ServerWsMessage::Error { kind: e.kind().into(), message: e.to_string() })
          }
          Err(e) => ServerWsMessage::Error { kind: "bad_request".into(), message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "kind": "internal", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "quicklearn_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "quicklearn_backend", session = %session.id, answered = session.metrics().total, "WebSocket disconnected");
}

fn message_kind(msg: &ClientWsMessage) -> &'static str {
  match msg {
    ClientWsMessage::Ping => "ping",
    ClientWsMessage::LoadDocument { .. } => "load_document",
    ClientWsMessage::NextQuestion { .. } => "next_question",
    ClientWsMessage::SubmitAnswer { .. } => "submit_answer",
    ClientWsMessage::Metrics => "metrics",
    ClientWsMessage::Finish => "finish",
    ClientWsMessage::Reset => "reset",
  }
}

/// Accepts plain base64 or a `data:...;base64,` URL.
pub fn decode_pdf_base64(input: &str) -> Result<Vec<u8>, ApiError> {
  let payload = match input.split_once(";base64,") {
    Some((_, rest)) => rest,
    None => input,
  };
  base64::engine::general_purpose::STANDARD
    .decode(payload.trim())
    .map_err(|e| ApiError::BadRequest(format!("pdfBase64 is not valid base64: {e}")))
}

#[instrument(level = "info", skip(msg, session, state), fields(session = %session.id))]
async fn handle_client_ws(msg: ClientWsMessage, session: &mut QuizSession, state: &AppState) -> Result<ServerWsMessage, ApiError> {
  Ok(match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::LoadDocument { name, pdf_base64 } => {
      let bytes = decode_pdf_base64(&pdf_base64)?;
      let text = extract_text_blocking(bytes).await?;
      let document = DocumentOut::new(&session.id, &name, &text);
      session.load_document(&name, text);
      info!(target: "quiz", session = %session.id, document = %name, "WS document loaded");
      ServerWsMessage::DocumentLoaded { document }
    }

    ClientWsMessage::NextQuestion { topic } => {
      if topic.is_some() {
        session.set_topic_focus(topic);
      }
      let question = session.next_question(state.quiz_ctx()).await?;
      ServerWsMessage::Question { question }
    }

    ClientWsMessage::SubmitAnswer { question_id, choice } => {
      let result = session.submit_answer(state.quiz_ctx(), &question_id, &choice).await?;
      ServerWsMessage::AnswerResult { result }
    }

    ClientWsMessage::Metrics => ServerWsMessage::Metrics { metrics: MetricsOut::of(session) },

    ClientWsMessage::Finish => ServerWsMessage::Summary { summary: session.finish(state.quiz_ctx()).await },

    ClientWsMessage::Reset => {
      session.reset();
      ServerWsMessage::Metrics { metrics: MetricsOut::of(session) }
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;

  fn state() -> AppState { AppState::with_parts(None, AppConfig::default()) }

  #[test]
  fn data_urls_and_plain_base64_decode() {
    assert_eq!(decode_pdf_base64("JVBERi0=").unwrap(), b"%PDF-");
    assert_eq!(decode_pdf_base64("data:application/pdf;base64,JVBERi0=").unwrap(), b"%PDF-");
    assert!(matches!(decode_pdf_base64("***"), Err(ApiError::BadRequest(_))));
  }

  #[test]
  fn client_messages_parse() {
    let m: ClientWsMessage = serde_json::from_str(r#"{"type":"submit_answer","questionId":"q1","choice":"b"}"#).unwrap();
    assert!(matches!(m, ClientWsMessage::SubmitAnswer { ref question_id, .. } if question_id == "q1"));
    let m: ClientWsMessage = serde_json::from_str(r#"{"type":"next_question"}"#).unwrap();
    assert!(matches!(m, ClientWsMessage::NextQuestion { topic: None }));
  }

  #[tokio::test]
  async fn connection_session_flow_without_model() {
    let st = state();
    let mut session = QuizSession::new();

    let pong = handle_client_ws(ClientWsMessage::Ping, &mut session, &st).await.unwrap();
    assert_eq!(serde_json::to_value(&pong).unwrap()["type"], "pong");

    let err = handle_client_ws(ClientWsMessage::NextQuestion { topic: None }, &mut session, &st).await.unwrap_err();
    assert_eq!(err.kind(), "bad_request");

    session.load_document("notes.pdf", "Enzymes speed up reactions.".into());
    let card = handle_client_ws(ClientWsMessage::NextQuestion { topic: Some("Enzymes".into()) }, &mut session, &st).await.unwrap();
    let v = serde_json::to_value(&card).unwrap();
    assert_eq!(v["type"], "question");
    assert_eq!(v["question"]["status"], "error");
    assert_eq!(v["question"]["kind"], "invocation");

    let summary = handle_client_ws(ClientWsMessage::Finish, &mut session, &st).await.unwrap();
    let v = serde_json::to_value(&summary).unwrap();
    assert_eq!(v["type"], "summary");
    assert_eq!(v["summary"]["metrics"]["total"], 0);
    assert_eq!(v["summary"]["grade"], "Needs Improvement");

    let metrics = handle_client_ws(ClientWsMessage::Reset, &mut session, &st).await.unwrap();
    let v = serde_json::to_value(&metrics).unwrap();
    assert_eq!(v["metrics"]["complete"], false);
    assert_eq!(v["metrics"]["document"], "notes.pdf");
  }
}
