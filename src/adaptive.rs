//! Adaptive difficulty controller and session scoring.
//!
//! The controller only looks at the three most recent answers:
//!   - 2 or 3 correct  => one level harder (unless already hard)
//!   - 0 or 1 correct  => one level easier (unless already easy)
//!   - fewer than three answers recorded => hold
//!
//! Scoring state (history, correctness window, current level, peak watermark)
//! is kept together in `Scoreboard` and only replaced as a whole.

use serde::Serialize;

use crate::domain::{Difficulty, HistoryEntry, Metrics, Question};

/// Number of trailing answers the controller consults.
pub const WINDOW: usize = 3;

/// Next difficulty from the recent correctness window.
///
/// Pure. Call once per answered question, after its correctness bit was pushed.
pub fn next_difficulty(window: &[bool], current: Difficulty) -> Difficulty {
  if window.len() < WINDOW {
    return current;
  }
  let recent = &window[window.len() - WINDOW..];
  let correct_count = recent.iter().filter(|c| **c).count();

  if correct_count >= 2 {
    current.harder().unwrap_or(current)
  } else {
    current.easier().unwrap_or(current)
  }
}

/// Scoring state of one quiz session.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Scoreboard {
  pub history: Vec<HistoryEntry>,
  pub window: Vec<bool>,
  pub current: Difficulty,
  pub peak: Difficulty,
}

impl Scoreboard {
  pub fn new() -> Self { Self::default() }

  /// Returns the board after one answer; `self` is left untouched.
  pub fn record_answer(&self, question: &Question, chosen: &str, is_correct: bool) -> Scoreboard {
    let mut history = self.history.clone();
    history.push(HistoryEntry {
      question: question.text.clone(),
      topic: question.topic.clone(),
      difficulty: question.difficulty,
      chosen: chosen.to_string(),
      correct_key: question.correct_key.clone(),
      is_correct,
      explanation: question.explanation.clone(),
    });

    let mut window = self.window.clone();
    window.push(is_correct);

    let current = next_difficulty(&window, self.current);
    let peak = self.peak.max(current);

    Scoreboard { history, window, current, peak }
  }

  pub fn metrics(&self) -> Metrics {
    metrics(&self.history, self.current, self.peak)
  }

  pub fn weak_topics(&self) -> Vec<String> {
    weak_topics(&self.history)
  }
}

/// Aggregate metrics derived from history. `mean_difficulty` is 1.0 with no data.
pub fn metrics(history: &[HistoryEntry], current: Difficulty, peak: Difficulty) -> Metrics {
  let total = history.len();
  let correct = history.iter().filter(|h| h.is_correct).count();

  let (accuracy_pct, mean_difficulty) = if total == 0 {
    (0.0, 1.0)
  } else {
    let sum: u32 = history.iter().map(|h| u32::from(h.difficulty.level())).sum();
    (100.0 * correct as f64 / total as f64, sum as f64 / total as f64)
  };

  Metrics {
    total,
    correct,
    incorrect: total - correct,
    accuracy_pct,
    mean_difficulty,
    peak_difficulty: peak,
    current_difficulty: current,
  }
}

/// Topics with at least one wrong answer, in order of their first miss.
pub fn weak_topics(history: &[HistoryEntry]) -> Vec<String> {
  let mut out: Vec<String> = Vec::new();
  for h in history.iter().filter(|h| !h.is_correct) {
    if !out.iter().any(|t| t == &h.topic) {
      out.push(h.topic.clone());
    }
  }
  out
}

/// Incorrect-answer count per weak topic, most frequent first.
/// Ties keep first-miss order.
pub fn weak_topic_counts(history: &[HistoryEntry]) -> Vec<(String, usize)> {
  let mut counts: Vec<(String, usize)> = weak_topics(history).into_iter().map(|t| (t, 0)).collect();
  for h in history.iter().filter(|h| !h.is_correct) {
    if let Some(slot) = counts.iter_mut().find(|(t, _)| t == &h.topic) {
      slot.1 += 1;
    }
  }
  counts.sort_by(|a, b| b.1.cmp(&a.1));
  counts
}
