//! Quiz sessions and the store that keeps them.
//!
//! A `QuizSession` holds one learner's document, scoreboard and the single
//! question currently awaiting an answer. Each session sits behind its own
//! `tokio::sync::Mutex`, so requests for one session are serialized while
//! different sessions never contend.

use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::adaptive::Scoreboard;
use crate::config::{Prompts, QuizSettings};
use crate::domain::{Difficulty, DifficultyChange, Metrics, Question, QuestionCard};
use crate::error::ApiError;
use crate::llm::LlmClient;
use crate::quiz::{generate_question, improvement_recommendations, wrong_answer_feedback, QuestionRequest};
use crate::report::{grade, render_assessment_report, ReportInput, FALLBACK_RECOMMENDATIONS};

/// Model access and tuning handed to session operations.
#[derive(Clone, Copy)]
pub struct QuizContext<'a> {
  pub llm: Option<&'a LlmClient>,
  pub prompts: &'a Prompts,
  pub settings: &'a QuizSettings,
}

#[derive(Clone, Debug)]
struct Document {
  name: String,
  text: String,
}

/// Result of grading one answer.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
  pub question_id: String,
  pub correct: bool,
  pub feedback: String,
  pub explanation: String,
  pub correct_key: String,
  pub correct_text: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub suggestion: Option<String>,
  pub difficulty_change: DifficultyChange,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub difficulty_message: Option<String>,
  pub new_difficulty: Difficulty,
  pub metrics: Metrics,
}

/// End-of-quiz summary.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
  pub metrics: Metrics,
  /// Grade band for the final accuracy.
  pub grade: String,
  pub weak_topics: Vec<String>,
  pub recommendations: String,
}

#[derive(Debug)]
pub struct QuizSession {
  pub id: String,
  document: Option<Document>,
  board: Scoreboard,
  pending: Option<Question>,
  asked: Vec<String>,
  recommendation: Option<String>,
  started: bool,
  complete: bool,
  topic_focus: Option<String>,
}

impl QuizSession {
  pub fn new() -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      document: None,
      board: Scoreboard::new(),
      pending: None,
      asked: Vec::new(),
      recommendation: None,
      started: false,
      complete: false,
      topic_focus: None,
    }
  }

  pub fn document_name(&self) -> Option<&str> {
    self.document.as_ref().map(|d| d.name.as_str())
  }

  pub fn is_started(&self) -> bool { self.started }

  pub fn is_complete(&self) -> bool { self.complete }

  pub fn pending_question(&self) -> Option<&Question> { self.pending.as_ref() }

  /// Restricts future questions to one topic (`None` clears it).
  pub fn set_topic_focus(&mut self, topic: Option<String>) {
    self.topic_focus = topic.filter(|t| !t.trim().is_empty());
  }

  /// Replaces the document. A new document always starts a fresh quiz.
  #[instrument(level = "info", skip(self, text), fields(session = %self.id, chars = text.chars().count()))]
  pub fn load_document(&mut self, name: &str, text: String) {
    self.document = Some(Document { name: name.to_string(), text });
    self.reset();
  }

  /// Clears scoring state and any topic focus; the document stays loaded.
  #[instrument(level = "info", skip(self), fields(session = %self.id))]
  pub fn reset(&mut self) {
    self.board = Scoreboard::new();
    self.pending = None;
    self.asked.clear();
    self.recommendation = None;
    self.started = false;
    self.complete = false;
    self.topic_focus = None;
    info!(target: "quiz", session = %self.id, "Session reset");
  }

  pub fn metrics(&self) -> Metrics { self.board.metrics() }

  pub fn weak_topics(&self) -> Vec<String> { self.board.weak_topics() }

  pub fn current_difficulty(&self) -> Difficulty { self.board.current }

  /// The pending question if there is one, otherwise a freshly generated card
  /// at the current difficulty. Error cards are returned but never kept.
  #[instrument(level = "info", skip(self, ctx), fields(session = %self.id, difficulty = self.current_difficulty().level()))]
  pub async fn next_question(&mut self, ctx: QuizContext<'_>) -> Result<QuestionCard, ApiError> {
    if self.complete {
      return Err(ApiError::Conflict("quiz is finished; reset to start again".into()));
    }
    if let Some(q) = &self.pending {
      return Ok(QuestionCard::Ready(q.clone()));
    }
    let card = generate_question(ctx.llm, ctx.prompts, ctx.settings, &self.question_request()?).await;
    Ok(self.accept_card(card))
  }

  /// What the next question prompt is built from.
  fn question_request(&self) -> Result<QuestionRequest<'_>, ApiError> {
    let doc = self.document.as_ref().ok_or_else(|| ApiError::BadRequest("no document loaded".into()))?;
    Ok(QuestionRequest {
      content: &doc.text,
      difficulty: self.board.current,
      asked: &self.asked,
      topic_focus: self.topic_focus.as_deref(),
    })
  }

  /// Makes a ready card the pending question. Error cards pass through and
  /// leave every piece of scoring state as it was.
  fn accept_card(&mut self, card: QuestionCard) -> QuestionCard {
    if let QuestionCard::Ready(q) = &card {
      self.asked.push(q.text.clone());
      self.pending = Some(q.clone());
      self.started = true;
    }
    card
  }

  /// Grades `choice` against the pending question and moves the controller.
  ///
  /// Scoring state is replaced in one step after feedback is available, so a
  /// failed model call never leaves a half-recorded answer behind.
  #[instrument(level = "info", skip(self, ctx), fields(session = %self.id))]
  pub async fn submit_answer(&mut self, ctx: QuizContext<'_>, question_id: &str, choice: &str) -> Result<AnswerOutcome, ApiError> {
    let question = match &self.pending {
      Some(q) if q.id == question_id => q.clone(),
      _ => {
        warn!(target: "quiz", session = %self.id, %question_id, "Answer for a question that is not pending");
        return Err(ApiError::Conflict(format!("question {question_id} is not awaiting an answer")));
      }
    };
    let chosen = question.option(choice)
      .map(|o| o.key.clone())
      .ok_or_else(|| ApiError::Validation(format!("{choice:?} is not one of the offered options")))?;

    let correct = chosen.eq_ignore_ascii_case(&question.correct_key);
    let (feedback, suggestion) = if correct {
      ("Correct! Well done!".to_string(), None)
    } else {
      let fb = wrong_answer_feedback(ctx.llm, ctx.prompts, ctx.settings, &question, &chosen).await;
      (fb, Some(format!("Review the topic related to: {}", question.correct_text())))
    };

    let before = self.board.current;
    self.board = self.board.record_answer(&question, &chosen, correct);
    self.pending = None;
    let after = self.board.current;
    let change = DifficultyChange::between(before, after);

    info!(
      target: "quiz",
      session = %self.id,
      correct,
      from = before.level(),
      to = after.level(),
      total = self.board.history.len(),
      "Answer recorded"
    );

    Ok(AnswerOutcome {
      question_id: question.id.clone(),
      correct,
      feedback,
      explanation: question.explanation.clone(),
      correct_key: question.correct_key.clone(),
      correct_text: question.correct_text().to_string(),
      suggestion,
      difficulty_change: change,
      difficulty_message: change.message().map(str::to_string),
      new_difficulty: after,
      metrics: self.board.metrics(),
    })
  }

  /// Ends the quiz and caches study recommendations for the report.
  #[instrument(level = "info", skip(self, ctx), fields(session = %self.id, answered = self.board.history.len()))]
  pub async fn finish(&mut self, ctx: QuizContext<'_>) -> Summary {
    let metrics = self.board.metrics();
    let weak_topics = self.board.weak_topics();
    let recommendations = improvement_recommendations(ctx.llm, ctx.prompts, ctx.settings, &metrics, &weak_topics).await;

    self.pending = None;
    self.complete = true;
    self.recommendation = Some(recommendations.clone());
    info!(target: "quiz", session = %self.id, total = metrics.total, accuracy = metrics.accuracy_pct, "Quiz finished");

    let grade = grade(metrics.accuracy_pct).to_string();
    Summary { metrics, grade, weak_topics, recommendations }
  }

  /// Assessment report for the answers so far.
  #[instrument(level = "info", skip(self), fields(session = %self.id))]
  pub fn report_pdf(&self) -> Result<Vec<u8>, ApiError> {
    let title = match self.document_name() {
      Some(name) => format!("Assessment: {name}"),
      None => "Assessment".to_string(),
    };
    let metrics = self.board.metrics();
    let bytes = render_assessment_report(&ReportInput {
      title: &title,
      metrics: &metrics,
      history: &self.board.history,
      recommendations: self.recommendation.as_deref().unwrap_or(FALLBACK_RECOMMENDATIONS),
    })?;
    Ok(bytes)
  }
}

impl Default for QuizSession {
  fn default() -> Self { Self::new() }
}

pub type SharedSession = Arc<Mutex<QuizSession>>;

/// Live HTTP sessions by id.
#[derive(Clone, Default)]
pub struct SessionStore {
  inner: Arc<RwLock<HashMap<String, SharedSession>>>,
}

impl SessionStore {
  pub fn new() -> Self { Self::default() }

  pub async fn insert(&self, session: QuizSession) -> (String, SharedSession) {
    let id = session.id.clone();
    let shared = Arc::new(Mutex::new(session));
    self.inner.write().await.insert(id.clone(), shared.clone());
    info!(target: "quiz", session = %id, "Session created");
    (id, shared)
  }

  pub async fn get(&self, id: &str) -> Result<SharedSession, ApiError> {
    self.inner.read().await
      .get(id)
      .cloned()
      .ok_or_else(|| ApiError::NotFound(format!("session {id} not found")))
  }

  pub async fn remove(&self, id: &str) -> Result<(), ApiError> {
    match self.inner.write().await.remove(id) {
      Some(_) => {
        info!(target: "quiz", session = %id, "Session removed");
        Ok(())
      }
      None => Err(ApiError::NotFound(format!("session {id} not found"))),
    }
  }

  #[allow(dead_code)]
  pub async fn len(&self) -> usize { self.inner.read().await.len() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{AnswerOption, FailureKind};
  use crate::quiz::{build_question_prompt, question_from_response};

  fn question(topic: &str, difficulty: Difficulty) -> Question {
    Question {
      id: Uuid::new_v4().to_string(),
      text: format!("About {topic}?"),
      topic: topic.into(),
      difficulty,
      options: ["A", "B", "C", "D"].iter()
        .map(|k| AnswerOption { key: k.to_string(), text: format!("option {k}") })
        .collect(),
      correct_key: "B".into(),
      explanation: "because".into(),
    }
  }

  fn ctx<'a>(prompts: &'a Prompts, settings: &'a QuizSettings) -> QuizContext<'a> {
    QuizContext { llm: None, prompts, settings }
  }

  fn loaded() -> QuizSession {
    let mut s = QuizSession::new();
    s.load_document("notes.pdf", "Cells are the basic unit of life.".into());
    s
  }

  fn offer(s: &mut QuizSession, topic: &str) -> String {
    let q = question(topic, s.current_difficulty());
    let id = q.id.clone();
    s.asked.push(q.text.clone());
    s.pending = Some(q);
    id
  }

  #[tokio::test]
  async fn three_right_answers_raise_difficulty() {
    let (p, st) = (Prompts::default(), QuizSettings::default());
    let mut s = loaded();
    let mut last = None;
    for _ in 0..3 {
      let id = offer(&mut s, "Cells");
      last = Some(s.submit_answer(ctx(&p, &st), &id, "b").await.unwrap());
    }
    let out = last.unwrap();
    assert!(out.correct);
    assert_eq!(out.difficulty_change, DifficultyChange::Up);
    assert_eq!(out.new_difficulty, Difficulty::MEDIUM);
    assert_eq!(out.metrics.total, 3);
    assert_eq!(out.metrics.accuracy_pct, 100.0);
    assert!(out.suggestion.is_none());
  }

  #[tokio::test]
  async fn wrong_answer_uses_local_feedback_without_model() {
    let (p, st) = (Prompts::default(), QuizSettings::default());
    let mut s = loaded();
    let id = offer(&mut s, "Genetics");
    let out = s.submit_answer(ctx(&p, &st), &id, "A").await.unwrap();
    assert!(!out.correct);
    assert_eq!(out.feedback, "The correct answer was B: option B");
    assert_eq!(out.suggestion.as_deref(), Some("Review the topic related to: option B"));
    assert_eq!(s.weak_topics(), vec!["Genetics".to_string()]);
    assert!(s.pending_question().is_none());
  }

  #[tokio::test]
  async fn stale_and_invalid_answers_leave_state_alone() {
    let (p, st) = (Prompts::default(), QuizSettings::default());
    let mut s = loaded();
    let id = offer(&mut s, "Cells");

    let err = s.submit_answer(ctx(&p, &st), "someone-else", "B").await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
    let err = s.submit_answer(ctx(&p, &st), &id, "Z").await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
    assert_eq!(s.metrics().total, 0);

    s.reset();
    let err = s.submit_answer(ctx(&p, &st), &id, "B").await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
  }

  async fn answer_three_right(s: &mut QuizSession, p: &Prompts, st: &QuizSettings) {
    for _ in 0..3 {
      let id = offer(s, "Cells");
      s.submit_answer(ctx(p, st), &id, "B").await.unwrap();
    }
  }

  #[tokio::test]
  async fn failed_generation_is_returned_but_not_kept() {
    let (p, st) = (Prompts::default(), QuizSettings::default());
    let mut s = loaded();
    answer_three_right(&mut s, &p, &st).await;
    let (metrics, window, asked) = (s.metrics(), s.board.window.clone(), s.asked.len());

    let card = s.next_question(ctx(&p, &st)).await.unwrap();
    assert!(card.is_error());
    assert!(s.pending_question().is_none());
    assert_eq!(s.metrics(), metrics);
    assert_eq!(s.current_difficulty(), Difficulty::MEDIUM);
    assert_eq!(s.board.window, window);
    assert_eq!(s.asked.len(), asked);

    let err = s.submit_answer(ctx(&p, &st), card.id(), "A").await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
  }

  #[tokio::test]
  async fn unparseable_reply_leaves_scoring_untouched() {
    let (p, st) = (Prompts::default(), QuizSettings::default());
    let mut s = loaded();
    answer_three_right(&mut s, &p, &st).await;
    let (metrics, window) = (s.metrics(), s.board.window.clone());

    let raw = "Sorry, I cannot write a question about this text.";
    let card = s.accept_card(question_from_response(raw, s.current_difficulty(), st.option_count));
    match &card {
      QuestionCard::Error(f) => {
        assert_eq!(f.kind, FailureKind::Parse);
        assert_eq!(f.difficulty, Difficulty::MEDIUM);
      }
      QuestionCard::Ready(_) => panic!("prose must not become a question"),
    }
    assert!(s.pending_question().is_none());
    assert_eq!(s.metrics(), metrics);
    assert_eq!(s.current_difficulty(), Difficulty::MEDIUM);
    assert_eq!(s.board.window, window);
  }

  #[tokio::test]
  async fn ready_card_becomes_pending() {
    let (p, st) = (Prompts::default(), QuizSettings::default());
    let mut s = loaded();
    let raw = r#"{"question": "What is a cell?", "topic": "Cells",
      "options": {"A": "Unit of life", "B": "A rock", "C": "A gas", "D": "A star"},
      "correct_answer": "A", "explanation": "Cells are the basic unit."}"#;
    let card = s.accept_card(question_from_response(raw, s.current_difficulty(), st.option_count));
    assert!(!card.is_error());
    assert_eq!(s.pending_question().map(|q| q.id.as_str()), Some(card.id()));
    assert!(s.is_started());
    let out = s.submit_answer(ctx(&p, &st), card.id(), "A").await.unwrap();
    assert!(out.correct);
  }

  #[test]
  fn topic_focus_is_dropped_on_reset_and_new_document() {
    let (p, st) = (Prompts::default(), QuizSettings::default());
    let mut s = loaded();
    s.set_topic_focus(Some("Enzymes".into()));
    assert!(build_question_prompt(&p, &st, &s.question_request().unwrap()).contains("FOCUS ON THIS TOPIC: Enzymes"));

    s.load_document("history.pdf", "The French revolution began in 1789.".into());
    assert!(!build_question_prompt(&p, &st, &s.question_request().unwrap()).contains("FOCUS ON THIS TOPIC"));

    s.set_topic_focus(Some("Enzymes".into()));
    s.reset();
    assert!(!build_question_prompt(&p, &st, &s.question_request().unwrap()).contains("FOCUS ON THIS TOPIC"));
  }

  #[tokio::test]
  async fn pending_question_is_served_again() {
    let (p, st) = (Prompts::default(), QuizSettings::default());
    let mut s = loaded();
    let id = offer(&mut s, "Cells");
    let card = s.next_question(ctx(&p, &st)).await.unwrap();
    assert_eq!(card.id(), id);
  }

  #[tokio::test]
  async fn question_needs_a_document() {
    let (p, st) = (Prompts::default(), QuizSettings::default());
    let mut s = QuizSession::new();
    assert!(matches!(s.next_question(ctx(&p, &st)).await, Err(ApiError::BadRequest(_))));
  }

  #[tokio::test]
  async fn new_document_resets_scoring() {
    let (p, st) = (Prompts::default(), QuizSettings::default());
    let mut s = loaded();
    let id = offer(&mut s, "Cells");
    s.submit_answer(ctx(&p, &st), &id, "A").await.unwrap();
    s.load_document("other.pdf", "Different text entirely.".into());
    assert_eq!(s.metrics().total, 0);
    assert_eq!(s.current_difficulty(), Difficulty::EASY);
    assert!(s.weak_topics().is_empty());
    assert_eq!(s.document_name(), Some("other.pdf"));
  }

  #[tokio::test]
  async fn finish_caches_fallback_advice_and_renders_report() {
    let (p, st) = (Prompts::default(), QuizSettings::default());
    let mut s = loaded();
    let id = offer(&mut s, "Cells");
    s.submit_answer(ctx(&p, &st), &id, "C").await.unwrap();

    let summary = s.finish(ctx(&p, &st)).await;
    assert_eq!(summary.recommendations, FALLBACK_RECOMMENDATIONS);
    assert_eq!(summary.grade, "Needs Improvement");
    assert_eq!(summary.weak_topics, vec!["Cells".to_string()]);
    assert!(s.is_complete());
    assert!(matches!(s.next_question(ctx(&p, &st)).await, Err(ApiError::Conflict(_))));

    let pdf = s.report_pdf().unwrap();
    assert!(pdf.starts_with(b"%PDF-"));
  }

  #[tokio::test]
  async fn store_isolates_sessions() {
    let store = SessionStore::new();
    let (a, _) = store.insert(loaded()).await;
    let (b, _) = store.insert(loaded()).await;
    assert_ne!(a, b);
    assert_eq!(store.len().await, 2);

    {
      let shared = store.get(&a).await.unwrap();
      let mut s = shared.lock().await;
      let id = offer(&mut s, "Cells");
      let (p, st) = (Prompts::default(), QuizSettings::default());
      s.submit_answer(ctx(&p, &st), &id, "B").await.unwrap();
    }
    assert_eq!(store.get(&a).await.unwrap().lock().await.metrics().total, 1);
    assert_eq!(store.get(&b).await.unwrap().lock().await.metrics().total, 0);

    store.remove(&a).await.unwrap();
    assert!(matches!(store.get(&a).await, Err(ApiError::NotFound(_))));
    assert!(matches!(store.remove(&a).await, Err(ApiError::NotFound(_))));
  }
}
