//! Recovering a JSON object from free-form model output.
//!
//! Models are asked for bare JSON but often wrap it in prose or code fences.
//! Strategies run in a fixed order and the first one that parses wins:
//!   1. the whole text
//!   2. the first fenced code block (``` or ```json)
//!   3. the span from the first `{` to the last `}`

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ParseError;

/// One way of cutting a JSON candidate out of raw text.
pub struct Strategy {
  pub name: &'static str,
  pub extract: fn(&str) -> Option<&str>,
}

pub const STRATEGIES: [Strategy; 3] = [
  Strategy { name: "direct", extract: whole_text },
  Strategy { name: "fenced_block", extract: fenced_block },
  Strategy { name: "brace_span", extract: brace_span },
];

fn whole_text(raw: &str) -> Option<&str> {
  Some(raw)
}

fn fence_regex() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("static regex"))
}

/// Interior of the first fenced code block, optionally tagged `json`.
pub fn fenced_block(raw: &str) -> Option<&str> {
  fence_regex().captures(raw).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// From the first `{` through the last `}`.
pub fn brace_span(raw: &str) -> Option<&str> {
  let start = raw.find('{')?;
  let end = raw.rfind('}')?;
  (end > start).then(|| &raw[start..=end])
}

/// Runs the strategies in order and returns the first parsed value.
pub fn parse_structured_response(raw: &str) -> Result<Value, ParseError> {
  let mut last_reason = String::from("empty response");
  for strategy in &STRATEGIES {
    let Some(candidate) = (strategy.extract)(raw) else {
      last_reason = format!("{}: no candidate found", strategy.name);
      continue;
    };
    match serde_json::from_str::<Value>(candidate) {
      Ok(v) => {
        tracing::debug!(target: "quicklearn_backend", strategy = strategy.name, "Recovered structured response");
        return Ok(v);
      }
      Err(e) => last_reason = format!("{}: {}", strategy.name, e),
    }
  }
  Err(ParseError { reason: last_reason })
}

/// Recovers a value and then deserializes it into `T`.
pub fn parse_structured_as<T: DeserializeOwned>(raw: &str) -> Result<T, ParseError> {
  let v = parse_structured_response(raw)?;
  serde_json::from_value(v).map_err(|e| ParseError { reason: format!("unexpected shape: {e}") })
}
