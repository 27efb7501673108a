//! Model-facing quiz behaviors: question generation, wrong-answer feedback and
//! study recommendations.
//!
//! Model text is interpreted by pure functions (`question_from_response`,
//! `question_from_value`) so the recovery and validation rules can be tested
//! without a network.

use serde_json::Value;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{Prompts, QuizSettings};
use crate::domain::{AnswerOption, Difficulty, FailureKind, GenerationFailure, Metrics, Question, QuestionCard};
use crate::llm::{complete_with, LlmClient, Tier};
use crate::recovery::parse_structured_response;
use crate::report::FALLBACK_RECOMMENDATIONS;
use crate::util::{fill_template, take_chars, trunc_for_log};

/// Everything the question prompt is built from.
pub struct QuestionRequest<'a> {
  pub content: &'a str,
  pub difficulty: Difficulty,
  /// Most recent last.
  pub asked: &'a [String],
  pub topic_focus: Option<&'a str>,
}

pub fn build_question_prompt(prompts: &Prompts, settings: &QuizSettings, req: &QuestionRequest<'_>) -> String {
  let recent_start = req.asked.len().saturating_sub(settings.asked_memory);
  let recent = &req.asked[recent_start..];
  let avoid_block = if recent.is_empty() {
    String::new()
  } else {
    let list = recent.iter().map(|q| format!("- {q}")).collect::<Vec<_>>().join("\n");
    format!("\nAVOID THESE PREVIOUSLY ASKED QUESTIONS:\n{list}")
  };
  let focus_block = req.topic_focus
    .filter(|t| !t.trim().is_empty())
    .map(|t| format!("\nFOCUS ON THIS TOPIC: {}", t.trim()))
    .unwrap_or_default();
  let difficulty_upper = req.difficulty.name().to_uppercase();

  // Document text goes in last so its own braces are never treated as placeholders.
  fill_template(
    &prompts.question_template,
    &[
      ("difficulty_upper", &difficulty_upper),
      ("avoid_block", &avoid_block),
      ("focus_block", &focus_block),
      ("content", take_chars(req.content, settings.content_chars)),
    ],
  )
}

/// Turns recovered JSON into a question, or explains what is missing.
pub fn question_from_value(v: &Value, difficulty: Difficulty, option_count: usize) -> Result<Question, String> {
  let text = v.get("question").and_then(Value::as_str).map(str::trim).unwrap_or_default();
  if text.is_empty() {
    return Err("missing \"question\" text".into());
  }

  let options: Vec<AnswerOption> = match v.get("options") {
    Some(Value::Object(map)) => map.iter()
      .map(|(k, val)| AnswerOption { key: k.trim().to_string(), text: option_text(val) })
      .collect(),
    Some(_) => return Err("\"options\" must be an object of key -> text".into()),
    None => return Err("missing \"options\"".into()),
  };
  if options.len() != option_count {
    return Err(format!("expected {option_count} options, got {}", options.len()));
  }
  if options.iter().any(|o| o.key.is_empty() || o.text.trim().is_empty()) {
    return Err("options must have non-empty keys and text".into());
  }

  let correct = v.get("correct_answer").and_then(Value::as_str).map(str::trim).unwrap_or_default();
  let correct_key = options.iter()
    .find(|o| o.key.eq_ignore_ascii_case(correct))
    .map(|o| o.key.clone())
    .ok_or_else(|| format!("correct_answer {correct:?} is not one of the option keys"))?;

  let topic = v.get("topic").and_then(Value::as_str).map(str::trim).filter(|t| !t.is_empty()).unwrap_or("General");
  let explanation = v.get("explanation").and_then(Value::as_str).unwrap_or_default();

  Ok(Question {
    id: Uuid::new_v4().to_string(),
    text: text.to_string(),
    topic: topic.to_string(),
    difficulty,
    options,
    correct_key,
    explanation: explanation.trim().to_string(),
  })
}

fn option_text(v: &Value) -> String {
  match v {
    Value::String(s) => s.trim().to_string(),
    other => other.to_string(),
  }
}

fn failure(difficulty: Difficulty, kind: FailureKind, message: String, raw: Option<String>) -> QuestionCard {
  QuestionCard::Error(GenerationFailure { id: Uuid::new_v4().to_string(), difficulty, kind, message, raw })
}

/// Interprets raw model text as a question card. Never fabricates a question.
pub fn question_from_response(raw: &str, difficulty: Difficulty, option_count: usize) -> QuestionCard {
  let value = match parse_structured_response(raw) {
    Ok(v) => v,
    Err(e) => return failure(difficulty, FailureKind::Parse, e.to_string(), Some(raw.to_string())),
  };
  match question_from_value(&value, difficulty, option_count) {
    Ok(q) => QuestionCard::Ready(q),
    Err(msg) => failure(difficulty, FailureKind::Validation, format!("unusable question: {msg}"), Some(raw.to_string())),
  }
}

/// One model call, one card. Failures come back as `QuestionCard::Error`.
#[instrument(level = "info", skip(llm, prompts, settings, req), fields(difficulty = req.difficulty.level(), asked = req.asked.len()))]
pub async fn generate_question(
  llm: Option<&LlmClient>,
  prompts: &Prompts,
  settings: &QuizSettings,
  req: &QuestionRequest<'_>,
) -> QuestionCard {
  let prompt = build_question_prompt(prompts, settings, req);
  let raw = match complete_with(llm, Tier::Strong, &prompt, settings.question_max_tokens).await {
    Ok(raw) => raw,
    Err(e) => {
      error!(target: "quiz", error = %e, "Question generation call failed");
      return failure(req.difficulty, FailureKind::Invocation, e.to_string(), None);
    }
  };

  let card = question_from_response(&raw, req.difficulty, settings.option_count);
  match &card {
    QuestionCard::Ready(q) => info!(target: "quiz", id = %q.id, topic = %q.topic, "Question generated"),
    QuestionCard::Error(f) => warn!(target: "quiz", kind = ?f.kind, message = %f.message, raw = %trunc_for_log(&raw, 200), "Model output rejected"),
  }
  card
}

/// Local feedback when the model cannot be reached.
pub fn fallback_feedback(q: &Question) -> String {
  format!("The correct answer was {}: {}", q.correct_key, q.correct_text())
}

/// Encouraging explanation for a wrong answer; falls back to naming the right option.
#[instrument(level = "info", skip(llm, prompts, settings, q), fields(question_id = %q.id))]
pub async fn wrong_answer_feedback(
  llm: Option<&LlmClient>,
  prompts: &Prompts,
  settings: &QuizSettings,
  q: &Question,
  chosen: &str,
) -> String {
  let chosen_text = q.option(chosen).map(|o| o.text.as_str()).unwrap_or("Unknown");
  let prompt = fill_template(
    &prompts.wrong_answer_template,
    &[
      ("chosen_key", chosen),
      ("chosen_text", chosen_text),
      ("correct_key", &q.correct_key),
      ("correct_text", q.correct_text()),
      ("question", &q.text),
    ],
  );
  match complete_with(llm, Tier::Fast, &prompt, settings.feedback_max_tokens).await {
    Ok(text) => text,
    Err(e) => {
      warn!(target: "quiz", error = %e, "Feedback call failed; using local feedback");
      fallback_feedback(q)
    }
  }
}

pub fn build_recommendations_prompt(prompts: &Prompts, m: &Metrics, weak_topics: &[String]) -> String {
  let weak = if weak_topics.is_empty() {
    "- No specific weak areas identified".to_string()
  } else {
    weak_topics.iter().map(|t| format!("- {t}")).collect::<Vec<_>>().join("\n")
  };
  fill_template(
    &prompts.recommendations_template,
    &[
      ("total", &m.total.to_string()),
      ("correct", &m.correct.to_string()),
      ("accuracy", &format!("{:.1}", m.accuracy_pct)),
      ("mean_difficulty", &format!("{:.1}", m.mean_difficulty)),
      ("weak_topics", &weak),
    ],
  )
}

/// 3-5 study recommendations from the model, or generic advice.
#[instrument(level = "info", skip(llm, prompts, settings, m, weak_topics), fields(total = m.total, weak = weak_topics.len()))]
pub async fn improvement_recommendations(
  llm: Option<&LlmClient>,
  prompts: &Prompts,
  settings: &QuizSettings,
  m: &Metrics,
  weak_topics: &[String],
) -> String {
  let prompt = build_recommendations_prompt(prompts, m, weak_topics);
  match complete_with(llm, Tier::Fast, &prompt, settings.recommendation_max_tokens).await {
    Ok(text) => text,
    Err(e) => {
      warn!(target: "quiz", error = %e, "Recommendation call failed; using generic advice");
      FALLBACK_RECOMMENDATIONS.to_string()
    }
  }
}
