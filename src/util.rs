//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// First `max` characters of `s` (char-boundary safe).
pub fn take_chars(s: &str, max: usize) -> &str {
  match s.char_indices().nth(max) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge model responses.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  let head = take_chars(s, max);
  if head.len() == s.len() { s.to_string() } else { format!("{}… ({} bytes total)", head, s.len()) }
}

/// Strips the markdown decoration models like to add to bullet lists.
/// Returns `None` for lines that end up empty.
pub fn strip_markdown_line(line: &str) -> Option<String> {
  let mut l = line.trim().replace("**", "").replace('*', "").replace('•', "");
  if let Some(rest) = l.trim_start().strip_prefix('-') {
    l = rest.to_string();
  }
  let l = l.trim();
  if l.is_empty() { None } else { Some(l.to_string()) }
}
