//! PDF text extraction and cleanup.
//!
//! `pdf-extract` returns all pages as one string with form feeds between pages.
//! Non-blank pages are tagged `--- Page N ---` so the model can cite them.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, instrument};

use crate::error::ExtractionError;
use crate::util::take_chars;

/// Extracts and cleans the text of an in-memory PDF.
#[instrument(level = "info", skip(bytes), fields(bytes = bytes.len()))]
pub fn extract_text(bytes: &[u8]) -> Result<String, ExtractionError> {
  let raw = pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractionError::Unreadable(e.to_string()))?;
  let text = clean_text(&join_pages(&raw));
  if text.is_empty() {
    return Err(ExtractionError::NoText);
  }
  debug!(target: "quicklearn_backend", chars = text.chars().count(), "Extracted document text");
  Ok(text)
}

/// `extract_text` on the blocking pool; PDF parsing is CPU bound.
pub async fn extract_text_blocking(bytes: Vec<u8>) -> Result<String, ExtractionError> {
  tokio::task::spawn_blocking(move || extract_text(&bytes))
    .await
    .map_err(|e| ExtractionError::Unreadable(format!("extraction task failed: {e}")))?
}

/// Tags each non-blank page and joins them with a blank line.
pub fn join_pages(raw: &str) -> String {
  raw.split('\x0C')
    .enumerate()
    .filter(|(_, page)| !page.trim().is_empty())
    .map(|(i, page)| format!("--- Page {} ---\n{}", i + 1, page))
    .collect::<Vec<_>>()
    .join("\n\n")
}

fn newline_runs() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"\n{3,}").expect("static regex"))
}

fn space_runs() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r" {2,}").expect("static regex"))
}

/// Collapses blank-line and space runs, trims every line and the whole text.
pub fn clean_text(text: &str) -> String {
  let text = newline_runs().replace_all(text, "\n\n");
  let text = space_runs().replace_all(&text, " ");
  text.split('\n').map(str::trim).collect::<Vec<_>>().join("\n").trim().to_string()
}

/// Short preview of a document for the UI.
pub fn preview(text: &str, max_chars: usize) -> String {
  let head = take_chars(text, max_chars);
  if head.len() == text.len() { text.to_string() } else { format!("{head}...") }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn invalid_bytes_are_unreadable() {
    let err = extract_text(b"not a valid pdf").unwrap_err();
    assert!(matches!(err, ExtractionError::Unreadable(_)));
  }

  #[tokio::test]
  async fn blocking_wrapper_reports_the_same_error() {
    let err = extract_text_blocking(b"%PDF-1.4 truncated".to_vec()).await.unwrap_err();
    assert!(matches!(err, ExtractionError::Unreadable(_)));
  }

  #[test]
  fn pages_keep_their_original_numbers() {
    let joined = join_pages("first\x0C   \x0Cthird");
    assert_eq!(joined, "--- Page 1 ---\nfirst\n\n--- Page 3 ---\nthird");
  }

  #[test]
  fn cleaning_collapses_whitespace() {
    let cleaned = clean_text("  Title   here \n\n\n\n  body  text\t\n");
    assert_eq!(cleaned, "Title here\n\nbody text");
  }

  #[test]
  fn preview_appends_ellipsis_only_when_cut() {
    assert_eq!(preview("abc", 5), "abc");
    assert_eq!(preview("abcdef", 3), "abc...");
  }
}
