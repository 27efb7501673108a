//! Assessment report rendering (PDF).

use chrono::Local;
use tracing::{debug, instrument};

use crate::adaptive::weak_topic_counts;
use crate::domain::{Difficulty, HistoryEntry, Metrics};
use crate::error::RenderError;
use crate::pdf::{Font, PdfBuilder};
use crate::util::strip_markdown_line;

/// Used when no model-written recommendation is available.
pub const FALLBACK_RECOMMENDATIONS: &str = "Based on your assessment, here are some general recommendations:\n\
\u{2022} Review the topics where you had incorrect answers\n\
\u{2022} Practice more questions at medium difficulty level\n\
\u{2022} Focus on understanding concepts rather than memorizing\n\
\u{2022} Consider revisiting the source material for weak areas";

pub struct ReportInput<'a> {
  pub title: &'a str,
  pub metrics: &'a Metrics,
  pub history: &'a [HistoryEntry],
  pub recommendations: &'a str,
}

/// Overall grade band for an accuracy percentage.
pub fn grade(accuracy_pct: f64) -> &'static str {
  if accuracy_pct >= 90.0 {
    "Excellent"
  } else if accuracy_pct >= 75.0 {
    "Good"
  } else if accuracy_pct >= 60.0 {
    "Satisfactory"
  } else {
    "Needs Improvement"
  }
}

/// Label of the level nearest to a mean difficulty.
fn mean_label(mean: f64) -> &'static str {
  Difficulty::new(mean.round().clamp(1.0, 3.0) as u8).map(Difficulty::label).unwrap_or("Medium")
}

#[instrument(level = "info", skip(input), fields(title = %input.title, answered = input.history.len()))]
pub fn render_assessment_report(input: &ReportInput<'_>) -> Result<Vec<u8>, RenderError> {
  let m = input.metrics;
  let mut pdf = PdfBuilder::new(input.title);

  pdf.title("Adaptive Assessment Report");
  pdf.centered(input.title, Font::Regular, 12);
  pdf.centered(&format!("Generated on: {}", Local::now().format("%B %d, %Y at %I:%M %p")), Font::Regular, 9);

  pdf.heading("Performance Summary");
  pdf.table(
    &[28, 24],
    &["Metric", "Value"],
    &[
      vec!["Total Questions Attempted".into(), m.total.to_string()],
      vec!["Correct Answers".into(), m.correct.to_string()],
      vec!["Incorrect Answers".into(), m.incorrect.to_string()],
      vec!["Accuracy Rate".into(), format!("{:.1}%", m.accuracy_pct)],
      vec!["Average Difficulty".into(), format!("{:.1}/3 ({})", m.mean_difficulty, mean_label(m.mean_difficulty))],
      vec!["Highest Difficulty Reached".into(), m.peak_difficulty.label().into()],
    ],
  );
  pdf.centered(&format!("Overall Grade: {}", grade(m.accuracy_pct)), Font::Bold, 14);

  pdf.heading("Question-by-Question Analysis");
  if input.history.is_empty() {
    pdf.paragraph("No questions answered yet.");
  } else {
    let rows: Vec<Vec<String>> = input.history.iter().enumerate()
      .map(|(i, h)| vec![
        (i + 1).to_string(),
        h.topic.chars().take(30).collect(),
        h.difficulty.label().to_string(),
        if h.is_correct { "Correct".into() } else { "Incorrect".into() },
      ])
      .collect();
    pdf.table(&[4, 30, 10, 10], &["#", "Topic", "Difficulty", "Result"], &rows);
  }

  let weak = weak_topic_counts(input.history);
  if !weak.is_empty() {
    pdf.heading("Topics Needing Review");
    for (topic, count) in &weak {
      pdf.bullet(&format!("{topic} - {count} incorrect answer(s)"));
    }
  }

  pdf.heading("Personalized Recommendations");
  for line in input.recommendations.lines().filter_map(strip_markdown_line) {
    pdf.bullet(&line);
  }

  pdf.spacer(20);
  pdf.centered(&"-".repeat(50), Font::Regular, 9);
  pdf.centered("Generated by Quick Learn - Adaptive Assessment Platform", Font::Regular, 9);
  pdf.centered("Keep learning, keep growing!", Font::Regular, 9);

  debug!(target: "quiz", pages = pdf.page_count(), "Assessment report laid out");
  pdf.finish()
}
