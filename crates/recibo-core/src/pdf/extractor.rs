//! Positioned text runs from PDF content streams using lopdf.

use std::collections::BTreeMap;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace};

use super::{PageRuns, PdfTextSource, Result, TextRun};
use crate::error::PdfError;

type Matrix = [f64; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// US Letter, used when a page has no usable MediaBox.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// TJ adjustments below this (thousandths of an em) read as a word gap.
const WORD_GAP: f64 = -200.0;

/// Text source backed by lopdf.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfTextSource;

impl PdfTextSource for LopdfTextSource {
    fn page_runs(&self, data: &[u8], page: u32) -> Result<PageRuns> {
        let doc = load(data)?;
        let pages = doc.get_pages();
        let page_count = pages.len() as u32;
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }
        let page_id = *pages.get(&page).ok_or(PdfError::InvalidPage(page))?;

        let media_box = media_box(&doc, page_id);
        let fonts = page_fonts(&doc, page_id);
        let content = doc
            .get_page_content(page_id)
            .map_err(|e| PdfError::Parse(e.to_string()))?;
        let content = Content::decode(&content).map_err(|e| PdfError::Parse(e.to_string()))?;

        let mut runs = interpret_content(&doc, &content, &fonts);
        for run in &mut runs {
            run.x -= media_box[0];
            run.y = media_box[3] - run.y;
        }

        debug!("Read {} text runs from page {} of {}", runs.len(), page, page_count);
        Ok(PageRuns { page_count, runs })
    }
}

fn load(data: &[u8]) -> Result<Document> {
    let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

    // Owner-password-only PDFs open with an empty user password
    if doc.is_encrypted() {
        if doc.decrypt("").is_err() {
            return Err(PdfError::Encrypted);
        }
        debug!("Decrypted PDF with empty password");
    }
    Ok(doc)
}

/// Look up a page attribute, walking up the page tree for inherited ones.
fn inherited<'a>(doc: &'a Document, node_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(node_id).ok()?;
    // Bounded walk in case of a cyclic Parent chain
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return doc.dereference(value).ok().map(|(_, obj)| obj);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let values: Option<Vec<f64>> = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .map(|arr| arr.iter().filter_map(number).collect());

    match values.as_deref() {
        Some([x0, y0, x1, y1]) => [x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)],
        _ => DEFAULT_MEDIA_BOX,
    }
}

/// Font dictionaries of the page resources, keyed by resource name.
fn page_fonts<'a>(doc: &'a Document, page_id: ObjectId) -> BTreeMap<Vec<u8>, &'a Dictionary> {
    let mut fonts = BTreeMap::new();

    let font_dict = inherited(doc, page_id, b"Resources")
        .and_then(|res| res.as_dict().ok())
        .and_then(|res| res.get(b"Font").ok())
        .and_then(|f| doc.dereference(f).ok())
        .and_then(|(_, f)| f.as_dict().ok());

    if let Some(font_dict) = font_dict {
        for (name, value) in font_dict.iter() {
            if let Ok((_, Object::Dictionary(font))) = doc.dereference(value) {
                fonts.insert(name.clone(), font);
            }
        }
    }
    fonts
}

/// Text positioning state inside a BT/ET block.
struct TextState {
    font: Vec<u8>,
    font_size: f64,
    leading: f64,
    text_matrix: Matrix,
    line_matrix: Matrix,
}

impl TextState {
    fn new() -> Self {
        Self {
            font: Vec::new(),
            font_size: 12.0,
            leading: 0.0,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        let translate = [1.0, 0.0, 0.0, 1.0, tx, ty];
        self.line_matrix = multiply(&translate, &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = if self.leading != 0.0 {
            self.leading
        } else {
            self.font_size * 1.2
        };
        self.move_line(0.0, -leading);
    }
}

fn interpret_content(
    doc: &Document,
    content: &Content,
    fonts: &BTreeMap<Vec<u8>, &Dictionary>,
) -> Vec<TextRun> {
    let mut runs = Vec::new();
    let mut ctm = IDENTITY;
    let mut ctm_stack: Vec<Matrix> = Vec::new();
    let mut state = TextState::new();

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => ctm_stack.push(ctm),
            "Q" => {
                if let Some(saved) = ctm_stack.pop() {
                    ctm = saved;
                }
            }
            "cm" => {
                if let Some(m) = matrix(operands) {
                    ctm = multiply(&m, &ctm);
                }
            }
            "BT" => {
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "Tf" => {
                if let [name, size, ..] = operands.as_slice() {
                    if let Ok(name) = name.as_name() {
                        state.font = name.to_vec();
                    }
                    if let Some(size) = number(size) {
                        state.font_size = size;
                    }
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    state.leading = leading;
                }
            }
            "Td" | "TD" => {
                if let [tx, ty, ..] = operands.as_slice() {
                    let (tx, ty) = (number(tx).unwrap_or(0.0), number(ty).unwrap_or(0.0));
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = matrix(operands) {
                    state.text_matrix = m;
                    state.line_matrix = m;
                }
            }
            "T*" => state.next_line(),
            "Tj" => {
                if let Some(text) = operands.first().and_then(|o| decode(doc, fonts, &state.font, o)) {
                    push_run(&mut runs, text, &state, &ctm);
                }
            }
            "'" => {
                state.next_line();
                if let Some(text) = operands.first().and_then(|o| decode(doc, fonts, &state.font, o)) {
                    push_run(&mut runs, text, &state, &ctm);
                }
            }
            "\"" => {
                state.next_line();
                if let Some(text) = operands.get(2).and_then(|o| decode(doc, fonts, &state.font, o)) {
                    push_run(&mut runs, text, &state, &ctm);
                }
            }
            "TJ" => {
                if let Some(Ok(parts)) = operands.first().map(Object::as_array) {
                    let mut text = String::new();
                    for part in parts {
                        match number(part) {
                            Some(adjust) if adjust < WORD_GAP => text.push(' '),
                            Some(_) => {}
                            None => {
                                if let Some(s) = decode(doc, fonts, &state.font, part) {
                                    text.push_str(&s);
                                }
                            }
                        }
                    }
                    push_run(&mut runs, text, &state, &ctm);
                }
            }
            _ => {}
        }
    }

    runs
}

fn push_run(runs: &mut Vec<TextRun>, text: String, state: &TextState, ctm: &Matrix) {
    if text.trim().is_empty() {
        return;
    }
    let position = multiply(&state.text_matrix, ctm);
    trace!("Run at ({:.1}, {:.1}): {}", position[4], position[5], text);
    runs.push(TextRun {
        text,
        x: position[4],
        y: position[5],
    });
}

/// Decode a string operand through the font encoding, falling back to
/// UTF-16BE with BOM, then Latin-1.
fn decode(
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &Dictionary>,
    font: &[u8],
    obj: &Object,
) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };

    if let Some(font_dict) = fonts.get(font) {
        if let Ok(encoding) = font_dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return Some(text);
            }
        }
    }

    if let [0xFE, 0xFF, rest @ ..] = bytes.as_slice() {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }

    Some(bytes.iter().map(|&b| b as char).collect())
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn matrix(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = IDENTITY;
    for (slot, operand) in m.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(m)
}

/// Row-vector product `m1 × m2` of two PDF matrices `[a b c d e f]`.
fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}
