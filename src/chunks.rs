//! In-memory chunk store with bag-of-words similarity search.
//!
//! Chunks are tagged with the document they came from. `query` ranks by
//! cosine distance over lowercase alphanumeric term frequencies.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::StoreError;

/// Fixed-size character windows: `text[i..i+size]` for i = 0, stride, 2*stride, ...
/// A stride smaller than the size gives overlapping chunks.
pub fn chunk_text(text: &str, size: usize, stride: usize) -> Vec<String> {
  let chars: Vec<char> = text.chars().collect();
  let stride = stride.max(1);
  let mut out = Vec::new();
  let mut start = 0;
  while start < chars.len() {
    let end = (start + size).min(chars.len());
    out.push(chars[start..end].iter().collect());
    start += stride;
  }
  out
}

#[derive(Clone, Debug, Serialize)]
pub struct ChunkRecord {
  pub id: String,
  pub text: String,
  pub tag: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChunkMatch {
  pub id: String,
  pub text: String,
  pub distance: f64,
}

struct StoredChunk {
  record: ChunkRecord,
  terms: HashMap<String, f64>,
  norm: f64,
}

#[derive(Default)]
pub struct ChunkStore {
  chunks: Vec<StoredChunk>,
  by_id: HashMap<String, usize>,
}

impl ChunkStore {
  pub fn new() -> Self { Self::default() }

  pub fn len(&self) -> usize { self.chunks.len() }

  #[allow(dead_code)]
  pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

  /// Drops every chunk carrying `tag`; returns how many went.
  pub fn remove_tag(&mut self, tag: &str) -> usize {
    let before = self.chunks.len();
    self.chunks.retain(|c| c.record.tag != tag);
    self.by_id = self.chunks.iter()
      .enumerate()
      .map(|(idx, c)| (c.record.id.clone(), idx))
      .collect();
    before - self.chunks.len()
  }

  /// Adds chunks under `tag`. Re-adding an existing id replaces it in place.
  pub fn add(&mut self, texts: Vec<String>, ids: Vec<String>, tag: &str) -> Result<usize, StoreError> {
    if texts.len() != ids.len() {
      return Err(StoreError::Mismatch(format!("{} texts but {} ids", texts.len(), ids.len())));
    }
    let n = texts.len();
    for (text, id) in texts.into_iter().zip(ids) {
      let (terms, norm) = term_vector(&text);
      let chunk = StoredChunk {
        record: ChunkRecord { id: id.clone(), text, tag: tag.to_string() },
        terms,
        norm,
      };
      match self.by_id.get(&id) {
        Some(&idx) => self.chunks[idx] = chunk,
        None => {
          self.by_id.insert(id, self.chunks.len());
          self.chunks.push(chunk);
        }
      }
    }
    Ok(n)
  }

  /// Up to `k` nearest chunks, closest first. Equal distances keep insertion order.
  pub fn query(&self, text: &str, k: usize) -> Vec<ChunkMatch> {
    let (q_terms, q_norm) = term_vector(text);
    let mut scored: Vec<(f64, &StoredChunk)> = self.chunks.iter()
      .map(|c| ((1.0 - cosine(&q_terms, q_norm, &c.terms, c.norm)).clamp(0.0, 1.0), c))
      .collect();
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter()
      .take(k)
      .map(|(distance, c)| ChunkMatch { id: c.record.id.clone(), text: c.record.text.clone(), distance })
      .collect()
  }

  /// Chunks for the given ids, in the order requested. Unknown ids are skipped;
  /// nothing at all found is `NotFound`.
  pub fn get_by_ids(&self, ids: &[&str]) -> Result<Vec<ChunkRecord>, StoreError> {
    let found: Vec<ChunkRecord> = ids.iter()
      .filter_map(|id| self.by_id.get(*id))
      .map(|&idx| self.chunks[idx].record.clone())
      .collect();
    if found.is_empty() {
      return Err(StoreError::NotFound(format!("chunk {}", ids.join(", "))));
    }
    Ok(found)
  }

  /// All chunks carrying `tag`, in insertion order.
  pub fn get_by_tag(&self, tag: &str) -> Result<Vec<ChunkRecord>, StoreError> {
    let found: Vec<ChunkRecord> = self.chunks.iter()
      .filter(|c| c.record.tag == tag)
      .map(|c| c.record.clone())
      .collect();
    if found.is_empty() {
      return Err(StoreError::NotFound(format!("document {tag}")));
    }
    Ok(found)
  }
}

fn term_vector(text: &str) -> (HashMap<String, f64>, f64) {
  let mut terms: HashMap<String, f64> = HashMap::new();
  for tok in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
    *terms.entry(tok.to_lowercase()).or_insert(0.0) += 1.0;
  }
  let norm = terms.values().map(|v| v * v).sum::<f64>().sqrt();
  (terms, norm)
}

fn cosine(a: &HashMap<String, f64>, a_norm: f64, b: &HashMap<String, f64>, b_norm: f64) -> f64 {
  if a_norm == 0.0 || b_norm == 0.0 {
    return 0.0;
  }
  let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
  let dot: f64 = small.iter().filter_map(|(t, v)| large.get(t).map(|w| v * w)).sum();
  dot / (a_norm * b_norm)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn store() -> ChunkStore {
    let mut s = ChunkStore::new();
    s.add(
      vec![
        "Photosynthesis converts light energy into chemical energy.".into(),
        "Mitochondria produce ATP through cellular respiration.".into(),
        "The French revolution began in 1789.".into(),
      ],
      vec!["bio.pdf_0".into(), "bio.pdf_1".into(), "bio.pdf_2".into()],
      "bio.pdf",
    )
    .unwrap();
    s
  }

  #[test]
  fn chunks_overlap_by_size_minus_stride() {
    let text: String = std::iter::repeat('x').take(1000).collect();
    let chunks = chunk_text(&text, 900, 800);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].chars().count(), 900);
    assert_eq!(chunks[1].chars().count(), 200);
  }

  #[test]
  fn chunking_counts_characters_not_bytes() {
    let chunks = chunk_text("ééééé", 2, 2);
    assert_eq!(chunks, vec!["éé", "éé", "é"]);
    assert!(chunk_text("", 10, 5).is_empty());
  }

  #[test]
  fn query_ranks_by_shared_terms() {
    let s = store();
    let hits = s.query("how does photosynthesis store light energy", 2);
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "bio.pdf_0");
    assert!(hits[0].distance < hits[1].distance);
    assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.distance)));
  }

  #[test]
  fn get_by_tag_and_ids() {
    let s = store();
    assert_eq!(s.get_by_tag("bio.pdf").unwrap().len(), 3);
    let one = s.get_by_ids(&["bio.pdf_1"]).unwrap();
    assert!(one[0].text.starts_with("Mitochondria"));
    assert!(matches!(s.get_by_ids(&["nope"]), Err(StoreError::NotFound(_))));
    assert!(matches!(s.get_by_tag("other.pdf"), Err(StoreError::NotFound(_))));
  }

  #[test]
  fn remove_tag_keeps_other_documents_addressable() {
    let mut s = store();
    s.add(vec!["Volcanoes erupt magma.".into()], vec!["geo.pdf_0".into()], "geo.pdf").unwrap();
    assert_eq!(s.remove_tag("bio.pdf"), 3);
    assert_eq!(s.len(), 1);
    assert!(matches!(s.get_by_tag("bio.pdf"), Err(StoreError::NotFound(_))));
    assert!(matches!(s.get_by_ids(&["bio.pdf_0"]), Err(StoreError::NotFound(_))));
    assert_eq!(s.get_by_ids(&["geo.pdf_0"]).unwrap()[0].tag, "geo.pdf");
    assert_eq!(s.remove_tag("bio.pdf"), 0);
  }

  #[test]
  fn re_adding_an_id_replaces_it() {
    let mut s = store();
    s.add(vec!["replaced".into()], vec!["bio.pdf_1".into()], "bio.pdf").unwrap();
    assert_eq!(s.len(), 3);
    assert_eq!(s.get_by_ids(&["bio.pdf_1"]).unwrap()[0].text, "replaced");
  }

  #[test]
  fn mismatched_lengths_are_rejected() {
    let mut s = ChunkStore::new();
    assert!(matches!(s.add(vec!["a".into()], vec![], "t"), Err(StoreError::Mismatch(_))));
    assert!(s.is_empty());
  }
}
