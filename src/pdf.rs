//! Tiny A4 page-layout writer on top of `lopdf`.
//!
//! Only the standard Type1 fonts are used (no embedding), so text is encoded
//! as WinAnsi; characters outside it become `?`. Layout is line based:
//! every call wraps its text, breaks pages when needed and moves the cursor down.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::RenderError;

const PAGE_W: i64 = 595;
const PAGE_H: i64 = 842;
const MARGIN: i64 = 72;

#[derive(Clone, Copy, Debug)]
pub enum Font {
  Regular,
  Bold,
  Mono,
  MonoBold,
}

impl Font {
  fn resource(self) -> &'static [u8] {
    match self {
      Font::Regular => b"F1",
      Font::Bold => b"F2",
      Font::Mono => b"F3",
      Font::MonoBold => b"F4",
    }
  }

  /// Average glyph width as a fraction of the font size.
  fn width_factor(self) -> f64 {
    match self {
      Font::Regular => 0.5,
      Font::Bold => 0.56,
      Font::Mono | Font::MonoBold => 0.6,
    }
  }
}

pub struct PdfBuilder {
  title: String,
  header: Option<String>,
  pages: Vec<Vec<Operation>>,
  ops: Vec<Operation>,
  y: i64,
  started: bool,
}

impl PdfBuilder {
  pub fn new(title: &str) -> Self {
    Self { title: title.to_string(), header: None, pages: Vec::new(), ops: Vec::new(), y: PAGE_H - MARGIN, started: false }
  }

  /// Running header printed at the top of every page.
  pub fn with_header(mut self, header: &str) -> Self {
    self.header = Some(header.to_string());
    self
  }

  pub fn page_count(&self) -> usize {
    (self.pages.len() + usize::from(self.started)).max(1)
  }

  pub fn title(&mut self, text: &str) -> &mut Self {
    self.centered(text, Font::Bold, 20);
    self.spacer(10)
  }

  pub fn heading(&mut self, text: &str) -> &mut Self {
    self.spacer(12);
    self.wrapped(text, Font::Bold, 14, 0, 18);
    self.spacer(4)
  }

  pub fn paragraph(&mut self, text: &str) -> &mut Self {
    for line in text.lines() {
      if line.trim().is_empty() {
        self.spacer(6);
      } else {
        self.wrapped(line.trim(), Font::Regular, 10, 0, 14);
      }
    }
    self.spacer(4)
  }

  pub fn bullet(&mut self, text: &str) -> &mut Self {
    self.wrapped(&format!("\u{2022} {}", text.trim()), Font::Regular, 10, 10, 14)
  }

  /// Wrapped text shifted right by `indent` points.
  pub fn indented(&mut self, text: &str, indent: i64) -> &mut Self {
    self.wrapped(text.trim(), Font::Regular, 10, indent, 14)
  }

  pub fn centered(&mut self, text: &str, font: Font, size: i64) -> &mut Self {
    let leading = size + size / 2;
    self.ensure_room(leading);
    let width = (text.chars().count() as f64 * size as f64 * font.width_factor()) as i64;
    let x = ((PAGE_W - width) / 2).max(MARGIN);
    self.y -= leading;
    self.show(text, font, size, x);
    self
  }

  /// Fixed-width table in Courier. `widths` are column widths in characters;
  /// longer cells are cut.
  pub fn table(&mut self, widths: &[usize], header: &[&str], rows: &[Vec<String>]) -> &mut Self {
    let rule: String = "-".repeat(widths.iter().sum::<usize>() + widths.len().saturating_sub(1) * 2);
    let head: Vec<String> = header.iter().map(|h| h.to_string()).collect();
    self.table_row(widths, &head, Font::MonoBold);
    self.line(&rule, Font::Mono, 9, 0, 12);
    for row in rows {
      self.table_row(widths, row, Font::Mono);
    }
    self.spacer(6)
  }

  pub fn spacer(&mut self, points: i64) -> &mut Self {
    self.y -= points;
    self
  }

  pub fn page_break(&mut self) -> &mut Self {
    if self.started {
      self.pages.push(std::mem::take(&mut self.ops));
      self.started = false;
    }
    self.y = PAGE_H - MARGIN;
    self
  }

  pub fn finish(mut self) -> Result<Vec<u8>, RenderError> {
    if self.started || self.pages.is_empty() {
      if !self.started {
        self.start_page();
      }
      self.pages.push(std::mem::take(&mut self.ops));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font = |doc: &mut Document, base: &str| -> ObjectId {
      doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
      })
    };
    let regular = font(&mut doc, "Helvetica");
    let bold = font(&mut doc, "Helvetica-Bold");
    let mono = font(&mut doc, "Courier");
    let mono_bold = font(&mut doc, "Courier-Bold");
    let resources_id = doc.add_object(dictionary! {
      "Font" => dictionary! { "F1" => regular, "F2" => bold, "F3" => mono, "F4" => mono_bold },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(self.pages.len());
    for operations in std::mem::take(&mut self.pages) {
      let content = Content { operations };
      let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
      let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
      });
      kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(pages_id, Object::Dictionary(dictionary! {
      "Type" => "Pages",
      "Kids" => kids,
      "Count" => count,
      "Resources" => resources_id,
      "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(PAGE_W), Object::Integer(PAGE_H)],
    }));
    let catalog_id = doc.add_object(dictionary! {
      "Type" => "Catalog",
      "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
      "Title" => Object::string_literal(to_winansi(&self.title)),
      "Producer" => Object::string_literal("quicklearn-backend"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
  }

  fn table_row(&mut self, widths: &[usize], cells: &[String], font: Font) {
    let text = widths.iter().enumerate()
      .map(|(i, w)| {
        let cell: String = cells.get(i).map(|c| c.chars().take(*w).collect()).unwrap_or_default();
        format!("{cell:<w$}", w = *w)
      })
      .collect::<Vec<_>>()
      .join("  ");
    self.line(text.trim_end(), font, 9, 0, 12);
  }

  fn wrapped(&mut self, text: &str, font: Font, size: i64, indent: i64, leading: i64) -> &mut Self {
    let usable = (PAGE_W - 2 * MARGIN - indent) as f64;
    let max_chars = ((usable / (size as f64 * font.width_factor())) as usize).max(8);
    for line in wrap(text, max_chars) {
      self.line(&line, font, size, indent, leading);
    }
    self
  }

  fn line(&mut self, text: &str, font: Font, size: i64, indent: i64, leading: i64) {
    self.ensure_room(leading);
    self.y -= leading;
    self.show(text, font, size, MARGIN + indent);
  }

  fn show(&mut self, text: &str, font: Font, size: i64, x: i64) {
    self.ops.push(Operation::new("BT", vec![]));
    self.ops.push(Operation::new("Tf", vec![Object::Name(font.resource().to_vec()), size.into()]));
    self.ops.push(Operation::new("Td", vec![x.into(), self.y.into()]));
    self.ops.push(Operation::new("Tj", vec![Object::string_literal(to_winansi(text))]));
    self.ops.push(Operation::new("ET", vec![]));
  }

  fn ensure_room(&mut self, leading: i64) {
    if !self.started {
      self.start_page();
    } else if self.y - leading < MARGIN {
      self.page_break();
      self.start_page();
    }
  }

  fn start_page(&mut self) {
    self.started = true;
    self.y = PAGE_H - MARGIN;
    if let Some(header) = self.header.clone() {
      let width = (header.chars().count() as f64 * 14.0 * Font::Bold.width_factor()) as i64;
      self.y = PAGE_H - MARGIN + 24;
      self.show(&header, Font::Bold, 14, ((PAGE_W - width) / 2).max(MARGIN));
      self.y = PAGE_H - MARGIN - 8;
    }
  }
}

/// Greedy word wrap; words longer than a line are split.
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
  let mut lines = Vec::new();
  let mut current = String::new();
  for word in text.split_whitespace() {
    let mut word: Vec<char> = word.chars().collect();
    while word.len() > max_chars {
      if !current.is_empty() {
        lines.push(std::mem::take(&mut current));
      }
      let rest = word.split_off(max_chars);
      lines.push(word.into_iter().collect());
      word = rest;
    }
    let word: String = word.into_iter().collect();
    let needed = if current.is_empty() { word.chars().count() } else { current.chars().count() + 1 + word.chars().count() };
    if needed > max_chars && !current.is_empty() {
      lines.push(std::mem::take(&mut current));
    }
    if !current.is_empty() {
      current.push(' ');
    }
    current.push_str(&word);
  }
  if !current.is_empty() {
    lines.push(current);
  }
  lines
}

/// Encodes text for the standard fonts' WinAnsi encoding.
pub fn to_winansi(text: &str) -> Vec<u8> {
  text.chars()
    .map(|c| match c {
      '\t' | '\n' | '\r' => b' ',
      c if (c as u32) < 0x20 => b' ',
      c if (c as u32) < 0x7F => c as u8,
      c if (0xA0..=0xFF).contains(&(c as u32)) => c as u32 as u8,
      '\u{2022}' => 0x95,
      '\u{2013}' => 0x96,
      '\u{2014}' => 0x97,
      '\u{2018}' => 0x91,
      '\u{2019}' => 0x92,
      '\u{201C}' => 0x93,
      '\u{201D}' => 0x94,
      '\u{2026}' => 0x85,
      '\u{20AC}' => 0x80,
      _ => b'?',
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wrap_respects_width() {
    let lines = wrap("the quick brown fox jumps over the lazy dog", 10);
    assert!(lines.iter().all(|l| l.chars().count() <= 10));
    assert_eq!(lines.join(" "), "the quick brown fox jumps over the lazy dog");
  }

  #[test]
  fn wrap_splits_long_words() {
    assert_eq!(wrap("abcdefghij xy", 4), vec!["abcd", "efgh", "ij", "xy"]);
  }

  #[test]
  fn winansi_maps_typography_and_replaces_the_rest() {
    assert_eq!(to_winansi("a\u{2019}b"), vec![b'a', 0x92, b'b']);
    assert_eq!(to_winansi("é"), vec![0xE9]);
    assert_eq!(to_winansi("✓"), vec![b'?']);
  }

  #[test]
  fn empty_document_still_has_one_page() {
    let bytes = PdfBuilder::new("empty").finish().unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
    let doc = Document::load_mem(&bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
  }

  #[test]
  fn long_content_flows_onto_new_pages() {
    let mut b = PdfBuilder::new("long").with_header("Header");
    b.title("Title");
    for i in 0..120 {
      b.paragraph(&format!("Paragraph number {i} with some filler words to wrap around."));
    }
    b.page_break();
    b.table(&[3, 10], &["#", "Topic"], &[vec!["1".into(), "Cells".into()]]);
    let expected = b.page_count();
    let bytes = b.finish().unwrap();
    let doc = Document::load_mem(&bytes).unwrap();
    assert!(expected > 2);
    assert_eq!(doc.get_pages().len(), expected);
  }
}
