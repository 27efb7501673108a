//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Metrics, QuestionCard};
use crate::extract::preview;
use crate::session::{AnswerOutcome, QuizSession, Summary};

/// Characters of document text echoed back after a load.
pub const PREVIEW_CHARS: usize = 500;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    LoadDocument {
        name: String,
        #[serde(rename = "pdfBase64")]
        pdf_base64: String,
    },
    NextQuestion {
        #[serde(default)]
        topic: Option<String>,
    },
    SubmitAnswer {
        #[serde(rename = "questionId")]
        question_id: String,
        choice: String,
    },
    Metrics,
    Finish,
    Reset,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    DocumentLoaded {
        document: DocumentOut,
    },
    Question {
        question: QuestionCard,
    },
    AnswerResult {
        result: AnswerOutcome,
    },
    Metrics {
        metrics: MetricsOut,
    },
    Summary {
        summary: Summary,
    },
    Error {
        kind: String,
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOut {
    pub session_id: String,
    pub name: String,
    pub characters: usize,
    pub preview: String,
}

impl DocumentOut {
    pub fn new(session_id: &str, name: &str, text: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            name: name.to_string(),
            characters: text.chars().count(),
            preview: preview(text, PREVIEW_CHARS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct QuestionQuery {
    pub topic: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    #[serde(rename = "questionId")]
    pub question_id: String,
    pub choice: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsOut {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    pub started: bool,
    pub complete: bool,
    /// Id of the question still waiting for an answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_question: Option<String>,
    pub metrics: Metrics,
    pub weak_topics: Vec<String>,
}

impl MetricsOut {
    pub fn of(s: &QuizSession) -> Self {
        Self {
            session_id: s.id.clone(),
            document: s.document_name().map(str::to_string),
            started: s.is_started(),
            complete: s.is_complete(),
            pending_question: s.pending_question().map(|q| q.id.clone()),
            metrics: s.metrics(),
            weak_topics: s.weak_topics(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AccuracyQuery {
    pub query: String,
}

#[derive(Serialize)]
pub struct RevisionOut<T: Serialize> {
    pub analysis: T,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub model: bool,
}
