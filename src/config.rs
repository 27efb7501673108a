//! Loading configuration (prompts + quiz/revision tuning) from TOML.
//!
//! Every table and field is optional; anything missing keeps its default.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub quiz: QuizSettings,
  #[serde(default)]
  pub revision: RevisionSettings,
}

/// Adaptive quiz knobs.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct QuizSettings {
  /// Characters of the document sent along with each question request.
  pub content_chars: usize,
  /// How many previous questions are listed as "avoid".
  pub asked_memory: usize,
  pub option_count: usize,
  pub question_max_tokens: Option<u32>,
  pub feedback_max_tokens: Option<u32>,
  pub recommendation_max_tokens: Option<u32>,
}

impl Default for QuizSettings {
  fn default() -> Self {
    Self {
      content_chars: 6000,
      asked_memory: 10,
      option_count: 4,
      question_max_tokens: None,
      feedback_max_tokens: None,
      recommendation_max_tokens: None,
    }
  }
}

/// Quick revision knobs.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RevisionSettings {
  pub chunk_size: usize,
  pub chunk_stride: usize,
  pub min_document_chars: usize,
  pub revise_context_chars: usize,
  pub quick_chunks: usize,
  pub quick_context_chars: usize,
  pub mcq_count: usize,
  pub top_k: usize,
  pub revise_max_tokens: u32,
  pub mcq_max_tokens: u32,
  pub default_max_tokens: u32,
}

impl Default for RevisionSettings {
  fn default() -> Self {
    Self {
      chunk_size: 900,
      chunk_stride: 800,
      min_document_chars: 100,
      revise_context_chars: 1400,
      quick_chunks: 5,
      quick_context_chars: 2500,
      mcq_count: 10,
      top_k: 3,
      revise_max_tokens: 1800,
      mcq_max_tokens: 1500,
      default_max_tokens: 1000,
    }
  }
}

/// Prompt templates. Placeholders are `{name}` and filled with `util::fill_template`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Adaptive quiz
  pub question_template: String,
  pub wrong_answer_template: String,
  pub recommendations_template: String,
  // Quick revision
  pub revise_template: String,
  pub quick_concepts_template: String,
  pub quick_formulas_template: String,
  pub quick_mcq_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      question_template: r#"You are an expert educational assessment creator. Based on the following learning content, generate ONE {difficulty_upper} difficulty multiple-choice question.

CONTENT:
{content}

DIFFICULTY LEVEL: {difficulty_upper}
- EASY: Basic recall and understanding questions. Test fundamental concepts.
- MEDIUM: Application and analysis questions. Require connecting ideas.
- HARD: Synthesis and evaluation questions. Require deep understanding and critical thinking.
{avoid_block}{focus_block}

IMPORTANT: Generate a completely NEW question that tests understanding of the content.

Respond ONLY with a valid JSON object in this exact format (no markdown, no extra text):
{
    "question": "The question text here?",
    "options": {
        "A": "First option",
        "B": "Second option",
        "C": "Third option",
        "D": "Fourth option"
    },
    "correct_answer": "A",
    "explanation": "Explanation of why this is the correct answer.",
    "topic": "The main topic this question tests"
}"#.into(),
      wrong_answer_template: r#"The student answered a question incorrectly. Provide helpful, encouraging feedback.

QUESTION: {question}

STUDENT'S ANSWER: {chosen_key} - {chosen_text}
CORRECT ANSWER: {correct_key} - {correct_text}

Provide a brief, encouraging explanation (2-3 sentences) of:
1. Why the correct answer is right
2. A tip to remember this concept

Keep it supportive and educational. Do not be discouraging."#.into(),
      recommendations_template: r#"Based on a student's assessment performance, provide personalized study recommendations.

PERFORMANCE SUMMARY:
- Total Questions: {total}
- Correct Answers: {correct}
- Accuracy: {accuracy}%
- Average Difficulty Reached: {mean_difficulty}/3

TOPICS NEEDING IMPROVEMENT:
{weak_topics}

Provide 3-5 specific, actionable study recommendations. Include:
1. Which concepts to review
2. Study strategies for improvement
3. Practice suggestions

Keep it encouraging and constructive. Format with bullet points."#.into(),
      revise_template: r#"You are an academic tutor.

Return STRICT JSON only.

TASKS:
1. Extract ALL key concepts from the text.
2. Explain each concept clearly for exam revision.
3. Extract formulas if present.
4. Generate EXACTLY {mcq_count} MCQs strictly from this text.

JSON FORMAT:
{
  "key_concepts": [
    {
      "concept": "Concept title",
      "explanation": "Detailed explanation derived ONLY from the given text"
    }
  ],
  "formulas": ["formula1","formula2"],
  "mcqs": [
    {
      "question": "Question text",
      "options": ["A) option","B) option","C) option","D) option"],
      "correctAnswer": "A"
    }
  ]
}

RULES:
- key_concepts MUST include ALL important ideas from the text
- explanation MUST be multi-sentence, not one-line
- mcqs MUST be exactly {mcq_count}
- options MUST be exactly 4
- No markdown
- No extra text outside JSON

TEXT:
{context}"#.into(),
      quick_concepts_template: "Extract all key concepts for last minute exam revision:\n{context}".into(),
      quick_formulas_template: "Extract all formulas or symbols:\n{context}".into(),
      quick_mcq_template: r#"Return STRICT JSON only.
Do not include explanations.
Do not include markdown.
Do not include trailing commas.

Generate EXACTLY {mcq_count} MCQs.

JSON format:
{
 "q":[
  {
   "id":1,
   "q":"question text",
   "o":["A) option","B) option","C) option","D) option"],
   "a":"A"
  }
 ]
}

TEXT:
{context}"#.into(),
    }
  }
}

/// Attempt to load `AppConfig` from QUICKLEARN_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("QUICKLEARN_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "quicklearn_backend", %path, "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "quicklearn_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "quicklearn_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
