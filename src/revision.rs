//! Quick revision: chunk a document into the store, look chunks up by
//! similarity, and turn them into study material (a JSON revision guide per
//! chunk, or a printable guide per document).

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::chunks::{chunk_text, ChunkStore};
use crate::config::{Prompts, RevisionSettings};
use crate::error::{ApiError, ExtractionError, RenderError};
use crate::extract::extract_text_blocking;
use crate::llm::{complete_with, LlmClient, Tier};
use crate::pdf::PdfBuilder;
use crate::recovery::parse_structured_as;
use crate::util::{fill_template, take_chars, trunc_for_log};

const OPTIONS_PER_MCQ: usize = 4;
const PREVIEW_CHARS: usize = 60;

#[derive(Clone, Copy)]
pub struct RevisionContext<'a> {
  pub llm: Option<&'a LlmClient>,
  pub prompts: &'a Prompts,
  pub settings: &'a RevisionSettings,
}

#[derive(Debug, Serialize)]
pub struct ChunkPreview {
  pub id: String,
  pub text: String,
}

#[derive(Debug, Serialize)]
pub struct UploadSummary {
  pub document: String,
  pub total_chunks: usize,
  pub chunks: Vec<ChunkPreview>,
}

#[derive(Debug, Serialize)]
pub struct AccuracyReport {
  pub ids: Vec<String>,
  pub text_found: Vec<String>,
  pub distance: Vec<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyConcept {
  pub concept: String,
  #[serde(default)]
  pub explanation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RevisionMcq {
  pub question: String,
  pub options: Vec<String>,
  #[serde(rename = "correctAnswer")]
  pub correct_answer: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RevisionGuide {
  #[serde(default)]
  pub key_concepts: Vec<KeyConcept>,
  #[serde(default)]
  pub formulas: Vec<String>,
  #[serde(default)]
  pub mcqs: Vec<RevisionMcq>,
}

/// Practice question in the compact shape used for the printable guide.
#[derive(Clone, Debug, Deserialize)]
pub struct QuickMcq {
  pub q: String,
  pub o: Vec<String>,
  pub a: String,
}

#[derive(Debug, Deserialize)]
struct QuickMcqSet {
  #[serde(default)]
  q: Vec<QuickMcq>,
}

/// Extracts a PDF and indexes it.
#[instrument(level = "info", skip(store, settings, bytes), fields(bytes = bytes.len()))]
pub async fn upload(store: &RwLock<ChunkStore>, settings: &RevisionSettings, filename: &str, bytes: Vec<u8>) -> Result<UploadSummary, ApiError> {
  let text = extract_text_blocking(bytes).await?;
  index_document(store, settings, filename, &text).await
}

/// Chunks `text` and stores it under `filename`; ids are `<filename>_<n>`.
pub async fn index_document(store: &RwLock<ChunkStore>, settings: &RevisionSettings, filename: &str, text: &str) -> Result<UploadSummary, ApiError> {
  let found = text.trim().chars().count();
  if found < settings.min_document_chars {
    return Err(ExtractionError::TooShort { found, required: settings.min_document_chars }.into());
  }

  let chunks = chunk_text(text, settings.chunk_size, settings.chunk_stride);
  let ids: Vec<String> = (0..chunks.len()).map(|i| format!("{filename}_{i}")).collect();
  let previews = chunks.iter().zip(&ids)
    .map(|(c, id)| ChunkPreview { id: id.clone(), text: format!("{}...", take_chars(c, PREVIEW_CHARS)) })
    .collect();

  let (total_chunks, stored) = {
    let mut store = store.write().await;
    let replaced = store.remove_tag(filename);
    if replaced > 0 {
      debug!(target: "revision", document = %filename, replaced, "Dropped chunks of previous upload");
    }
    let added = store.add(chunks, ids, filename)?;
    (added, store.len())
  };
  info!(target: "revision", document = %filename, total_chunks, stored, "Document indexed");
  Ok(UploadSummary { document: filename.to_string(), total_chunks, chunks: previews })
}

/// Nearest chunks to `query`, closest first.
#[instrument(level = "info", skip(store))]
pub async fn accuracy_check(store: &RwLock<ChunkStore>, query: &str, top_k: usize) -> Result<AccuracyReport, ApiError> {
  if query.trim().is_empty() {
    return Err(ApiError::BadRequest("query must not be empty".into()));
  }
  let hits = store.read().await.query(query, top_k);
  let mut report = AccuracyReport { ids: Vec::new(), text_found: Vec::new(), distance: Vec::new() };
  for hit in hits {
    report.ids.push(hit.id);
    report.text_found.push(hit.text);
    report.distance.push(hit.distance);
  }
  Ok(report)
}

/// Checks a recovered guide and cuts its MCQs to `mcq_count`.
pub fn validate_guide(mut guide: RevisionGuide, mcq_count: usize) -> Result<RevisionGuide, ApiError> {
  if guide.key_concepts.is_empty() {
    return Err(ApiError::Validation("no key concepts generated".into()));
  }
  if guide.mcqs.len() < mcq_count {
    return Err(ApiError::Validation(format!("model returned only {} MCQs", guide.mcqs.len())));
  }
  guide.mcqs.truncate(mcq_count);
  if let Some(i) = guide.mcqs.iter().position(|m| m.options.len() != OPTIONS_PER_MCQ) {
    return Err(ApiError::Validation(format!("MCQ {} does not have {OPTIONS_PER_MCQ} options", i + 1)));
  }
  Ok(guide)
}

/// Concepts, formulas and practice questions for one chunk.
#[instrument(level = "info", skip(ctx, store))]
pub async fn revise(ctx: RevisionContext<'_>, store: &RwLock<ChunkStore>, chunk_id: &str) -> Result<RevisionGuide, ApiError> {
  let chunk = store.read().await
    .get_by_ids(&[chunk_id])?
    .into_iter()
    .next()
    .ok_or_else(|| ApiError::NotFound(format!("chunk {chunk_id} not found")))?;

  let mcq_count = ctx.settings.mcq_count.to_string();
  let prompt = fill_template(
    &ctx.prompts.revise_template,
    &[("mcq_count", &mcq_count), ("context", take_chars(&chunk.text, ctx.settings.revise_context_chars))],
  );
  let raw = complete_with(ctx.llm, Tier::Strong, &prompt, Some(ctx.settings.revise_max_tokens)).await?;

  let guide = parse_structured_as::<RevisionGuide>(&raw).map_err(|e| {
    warn!(target: "revision", %chunk_id, error = %e, raw = %trunc_for_log(&raw, 200), "Revision guide unreadable");
    e
  })?;
  let guide = validate_guide(guide, ctx.settings.mcq_count)?;
  info!(target: "revision", %chunk_id, concepts = guide.key_concepts.len(), mcqs = guide.mcqs.len(), "Revision guide ready");
  Ok(guide)
}

/// First `n` chunk texts joined by a space, cut to `max_chars`.
pub fn quick_context(texts: &[String], n: usize, max_chars: usize) -> String {
  let joined = texts.iter().take(n).map(String::as_str).collect::<Vec<_>>().join(" ");
  take_chars(&joined, max_chars).to_string()
}

/// Parses and checks the compact MCQ set.
pub fn interpret_quick_mcqs(raw: &str, mcq_count: usize) -> Result<Vec<QuickMcq>, ApiError> {
  let mut set = parse_structured_as::<QuickMcqSet>(raw)?;
  if set.q.len() < mcq_count {
    return Err(ApiError::Validation(format!("model returned only {} MCQs", set.q.len())));
  }
  set.q.truncate(mcq_count);
  if let Some(i) = set.q.iter().position(|m| m.o.len() != OPTIONS_PER_MCQ) {
    return Err(ApiError::Validation(format!("MCQ {} does not have {OPTIONS_PER_MCQ} options", i + 1)));
  }
  Ok(set.q)
}

/// Four pages: concepts, formulas, questions, answer key.
pub fn render_quick_guide(doc: &str, concepts: &str, formulas: &str, mcqs: &[QuickMcq]) -> Result<Vec<u8>, RenderError> {
  let mut pdf = PdfBuilder::new(&format!("Quick Revision: {doc}")).with_header("Quick Revision Guide");

  pdf.heading("Key Concepts");
  pdf.paragraph(concepts);
  pdf.page_break();

  pdf.heading("Formulas and Symbols");
  pdf.paragraph(formulas);
  pdf.page_break();

  pdf.heading("Practice Questions");
  for (i, m) in mcqs.iter().enumerate() {
    pdf.paragraph(&format!("Q{}. {}", i + 1, m.q.trim()));
    for option in &m.o {
      pdf.indented(option, 20);
    }
    pdf.spacer(6);
  }
  pdf.page_break();

  pdf.heading("Answer Key");
  let key = mcqs.iter().enumerate()
    .map(|(i, m)| format!("{}:{}", i + 1, m.a.trim()))
    .collect::<Vec<_>>()
    .join(" ");
  pdf.paragraph(&key);

  debug!(target: "revision", pages = pdf.page_count(), "Quick guide laid out");
  pdf.finish()
}

/// Printable guide for a whole document. Returns the download name and the PDF.
#[instrument(level = "info", skip(ctx, store))]
pub async fn quick_pdf(ctx: RevisionContext<'_>, store: &RwLock<ChunkStore>, doc: &str) -> Result<(String, Vec<u8>), ApiError> {
  let texts: Vec<String> = store.read().await
    .get_by_tag(doc)?
    .into_iter()
    .map(|c| c.text)
    .collect();
  let context = quick_context(&texts, ctx.settings.quick_chunks, ctx.settings.quick_context_chars);

  let plain = Some(ctx.settings.default_max_tokens);
  let concepts = complete_with(ctx.llm, Tier::Fast, &fill_template(&ctx.prompts.quick_concepts_template, &[("context", &context)]), plain).await?;
  let formulas = complete_with(ctx.llm, Tier::Fast, &fill_template(&ctx.prompts.quick_formulas_template, &[("context", &context)]), plain).await?;

  let mcq_count = ctx.settings.mcq_count.to_string();
  let mcq_prompt = fill_template(&ctx.prompts.quick_mcq_template, &[("mcq_count", &mcq_count), ("context", &context)]);
  let mcq_raw = complete_with(ctx.llm, Tier::Strong, &mcq_prompt, Some(ctx.settings.mcq_max_tokens)).await?;
  let mcqs = interpret_quick_mcqs(&mcq_raw, ctx.settings.mcq_count)?;

  let bytes = render_quick_guide(doc, &concepts, &formulas, &mcqs)?;
  info!(target: "revision", %doc, mcqs = mcqs.len(), bytes = bytes.len(), "Quick revision guide rendered");
  Ok((format!("QuickRevision_{doc}.pdf"), bytes))
}
