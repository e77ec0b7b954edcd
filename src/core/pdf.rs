//! Line-oriented A4 page writer over `printpdf`.
//!
//! Text flows top to bottom; a new page starts automatically when the cursor reaches
//! the bottom margin. DejaVu Sans is embedded in every document, and text that would
//! run past its column is cut short with an ellipsis.

use crate::errors::{Error, Result};
use printpdf::{IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use std::borrow::Cow;
use std::io::Cursor;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 18.0;
const LINE_HEIGHT: f32 = 6.0;
const COLUMN_GAP: f32 = 3.0;
/// Upper bound of the average DejaVu Sans advance, in em.
const AVERAGE_ADVANCE: f32 = 0.62;
const MM_PER_POINT: f32 = 0.3528;

static REGULAR_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
static BOLD_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// Horizontal position of right-hand value columns.
pub const VALUE_COLUMN: f32 = 150.0;
/// Left margin in millimetres.
pub const LEFT: f32 = MARGIN;

/// Builds a PDF one line at a time.
pub struct PdfWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    cursor: f32,
    pages: usize,
}

impl PdfWriter {
    /// Opens a document with one empty A4 page.
    pub fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc
            .add_external_font(Cursor::new(REGULAR_FONT))
            .map_err(Error::pdf)?;
        let bold = doc
            .add_external_font(Cursor::new(BOLD_FONT))
            .map_err(Error::pdf)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            cursor: PAGE_HEIGHT - MARGIN,
            pages: 1,
        })
    }

    /// Starts a fresh page and moves the cursor to its top.
    pub fn new_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("Layer {}", self.pages + 1));
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor = PAGE_HEIGHT - MARGIN;
        self.pages += 1;
    }

    fn reserve(&mut self, height: f32) {
        if self.cursor - height < MARGIN {
            self.new_page();
        }
        self.cursor -= height;
    }

    fn font(&self, bold: bool) -> &IndirectFontRef {
        if bold { &self.bold } else { &self.regular }
    }

    /// Large bold title line.
    pub fn title(&mut self, text: &str, size: f32) {
        self.reserve(size * 0.5);
        self.layer
            .use_text(text, size, Mm(LEFT), Mm(self.cursor), &self.bold);
        self.cursor -= LINE_HEIGHT * 0.5;
    }

    /// One line of text starting `indent` mm right of the margin.
    pub fn text(&mut self, indent: f32, text: &str, size: f32, bold: bool) {
        self.reserve(LINE_HEIGHT);
        let text = fit_width(text, size, PAGE_WIDTH - MARGIN - LEFT - indent);
        self.layer
            .use_text(text, size, Mm(LEFT + indent), Mm(self.cursor), self.font(bold));
    }

    /// A label and a value on the same line. The label stops short of the value column.
    pub fn row(&mut self, indent: f32, label: &str, value: &str, size: f32, bold: bool) {
        self.reserve(LINE_HEIGHT);
        let font = self.font(bold).clone();
        let label = fit_width(label, size, VALUE_COLUMN - COLUMN_GAP - LEFT - indent);
        let value = fit_width(value, size, PAGE_WIDTH - MARGIN - VALUE_COLUMN);
        self.layer
            .use_text(label, size, Mm(LEFT + indent), Mm(self.cursor), &font);
        self.layer
            .use_text(value, size, Mm(VALUE_COLUMN), Mm(self.cursor), &font);
    }

    /// Text pinned to the bottom margin of the current page.
    pub fn footer(&mut self, text: &str) {
        self.layer
            .use_text(text, 8.0, Mm(LEFT), Mm(MARGIN * 0.6), &self.regular);
    }

    /// Vertical whitespace.
    pub fn gap(&mut self, height: f32) {
        self.cursor -= height;
    }

    /// Pages emitted so far.
    #[must_use]
    pub const fn page_count(&self) -> usize {
        self.pages
    }

    /// Serializes the document.
    pub fn finish(self) -> Result<Vec<u8>> {
        self.doc.save_to_bytes().map_err(Error::pdf)
    }
}

/// Cuts `text` so it fits `width` mm at `size` points, ending it with `...` when cut.
fn fit_width(text: &str, size: f32, width: f32) -> Cow<'_, str> {
    let per_char = size * AVERAGE_ADVANCE * MM_PER_POINT;
    // Cast safety: the quotient is a small non-negative character count.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let capacity = (width.max(0.0) / per_char).floor() as usize;
    if text.chars().count() <= capacity {
        return Cow::Borrowed(text);
    }
    let kept: String = text.chars().take(capacity.saturating_sub(3)).collect();
    Cow::Owned(format!("{}...", kept.trim_end()))
}
