//! Domain models: difficulty levels, questions (ready vs. error sentinel),
//! history entries and derived session metrics.

use serde::{Deserialize, Serialize};

/// Question difficulty tier, always within 1..=3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
  pub const EASY: Difficulty = Difficulty(1);
  pub const MEDIUM: Difficulty = Difficulty(2);
  pub const HARD: Difficulty = Difficulty(3);

  pub fn new(level: u8) -> Option<Self> {
    (1..=3).contains(&level).then_some(Difficulty(level))
  }

  pub fn level(self) -> u8 { self.0 }

  /// One step harder, or `None` at the top.
  pub fn harder(self) -> Option<Self> { Difficulty::new(self.0 + 1) }

  /// One step easier, or `None` at the bottom.
  pub fn easier(self) -> Option<Self> { self.0.checked_sub(1).and_then(Difficulty::new) }

  /// Lowercase name used in prompts.
  pub fn name(self) -> &'static str {
    match self.0 {
      1 => "easy",
      2 => "medium",
      _ => "hard",
    }
  }

  /// Capitalized label used in reports.
  pub fn label(self) -> &'static str {
    match self.0 {
      1 => "Easy",
      2 => "Medium",
      _ => "Hard",
    }
  }
}

impl Default for Difficulty {
  fn default() -> Self { Difficulty::EASY }
}

impl TryFrom<u8> for Difficulty {
  type Error = String;
  fn try_from(v: u8) -> Result<Self, Self::Error> {
    Difficulty::new(v).ok_or_else(|| format!("difficulty must be 1..=3, got {v}"))
  }
}

impl From<Difficulty> for u8 {
  fn from(d: Difficulty) -> u8 { d.0 }
}

/// One offered answer. Options keep the order the model wrote them in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
  pub key: String,
  pub text: String,
}

/// A generated multiple-choice question. Immutable once created.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
  pub id: String,
  pub text: String,
  pub topic: String,
  pub difficulty: Difficulty,
  pub options: Vec<AnswerOption>,
  pub correct_key: String,
  pub explanation: String,
}

impl Question {
  /// Finds an option by key, ignoring ASCII case.
  pub fn option(&self, key: &str) -> Option<&AnswerOption> {
    self.options.iter().find(|o| o.key.eq_ignore_ascii_case(key.trim()))
  }

  pub fn correct_text(&self) -> &str {
    self.option(&self.correct_key).map(|o| o.text.as_str()).unwrap_or("")
  }
}

/// Why a question could not be produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  /// The model call itself failed.
  Invocation,
  /// The model answered but no JSON could be recovered.
  Parse,
  /// JSON was recovered but did not describe a usable question.
  Validation,
}

/// Sentinel returned in place of a question. Never answerable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationFailure {
  pub id: String,
  pub difficulty: Difficulty,
  pub kind: FailureKind,
  pub message: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub raw: Option<String>,
}

/// What a generation request yields: a question, or an explicit error record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuestionCard {
  Ready(Question),
  Error(GenerationFailure),
}

impl QuestionCard {
  pub fn id(&self) -> &str {
    match self {
      QuestionCard::Ready(q) => &q.id,
      QuestionCard::Error(f) => &f.id,
    }
  }

  pub fn is_error(&self) -> bool { matches!(self, QuestionCard::Error(_)) }
}

/// One answered question. Append-only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub question: String,
  pub topic: String,
  pub difficulty: Difficulty,
  pub chosen: String,
  pub correct_key: String,
  pub is_correct: bool,
  pub explanation: String,
}

/// Point-in-time session metrics, derived from history + watermark.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
  pub total: usize,
  pub correct: usize,
  pub incorrect: usize,
  pub accuracy_pct: f64,
  pub mean_difficulty: f64,
  pub peak_difficulty: Difficulty,
  pub current_difficulty: Difficulty,
}

/// Which way the controller moved after an answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyChange {
  Up,
  Down,
  None,
}

impl DifficultyChange {
  pub fn between(before: Difficulty, after: Difficulty) -> Self {
    match after.cmp(&before) {
      std::cmp::Ordering::Greater => DifficultyChange::Up,
      std::cmp::Ordering::Less => DifficultyChange::Down,
      std::cmp::Ordering::Equal => DifficultyChange::None,
    }
  }

  pub fn message(self) -> Option<&'static str> {
    match self {
      DifficultyChange::Up => Some("Great job! Difficulty increased!"),
      DifficultyChange::Down => Some("Don't worry! Adjusting difficulty to help you learn."),
      DifficultyChange::None => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn difficulty_is_bounded() {
    assert!(Difficulty::new(0).is_none());
    assert!(Difficulty::new(4).is_none());
    assert_eq!(Difficulty::HARD.harder(), None);
    assert_eq!(Difficulty::EASY.easier(), None);
    assert_eq!(Difficulty::MEDIUM.harder(), Some(Difficulty::HARD));
  }

  #[test]
  fn difficulty_serializes_as_integer() {
    assert_eq!(serde_json::to_string(&Difficulty::MEDIUM).unwrap(), "2");
    assert!(serde_json::from_str::<Difficulty>("7").is_err());
  }

  #[test]
  fn error_card_is_tagged() {
    let card = QuestionCard::Error(GenerationFailure {
      id: "q1".into(),
      difficulty: Difficulty::EASY,
      kind: FailureKind::Parse,
      message: "no JSON".into(),
      raw: None,
    });
    let v = serde_json::to_value(&card).unwrap();
    assert_eq!(v["status"], "error");
    assert_eq!(v["kind"], "parse");
    assert!(v.get("raw").is_none());
  }

  #[test]
  fn option_lookup_ignores_case() {
    let q = Question {
      id: "q".into(),
      text: "?".into(),
      topic: "t".into(),
      difficulty: Difficulty::EASY,
      options: vec![
        AnswerOption { key: "A".into(), text: "one".into() },
        AnswerOption { key: "B".into(), text: "two".into() },
      ],
      correct_key: "B".into(),
      explanation: String::new(),
    };
    assert_eq!(q.option(" b").map(|o| o.text.as_str()), Some("two"));
    assert_eq!(q.correct_text(), "two");
  }
}
