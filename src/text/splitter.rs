//! Text Flow Splitter: wraps one paragraph into line rectangles.
//!
//! The paragraph is first force-wrapped so that no single word is wider than
//! the column. Lines are then taken one at a time: a line grows whitespace by
//! whitespace until the next word would overflow the column, a newline is
//! reached, or the text runs out. Each line occupies one element-height
//! slot below the previous one. The caller decides when a page is full and
//! restarts the vertical cursor with [`TextFlowSplitter::new_page`].

use super::TextMeasurer;
use crate::model::{Font, Rect};

/// Tolerance for width comparisons.
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct TextFlowSplitter {
    remaining: String,
    current: String,
    font: Font,
    /// Element rectangle in inches, left margin applied, band-relative y.
    base: Rect,
    clip_width: f64,
    y_offset: f64,
    page_bottom: f64,
    bottompad: f64,
    line_counter: usize,
}

impl TextFlowSplitter {
    /// `rect` is the element rectangle in hundredths of an inch,
    /// `left_margin`, `y_offset` and `page_bottom` are in inches.
    /// `bottompad` is in hundredths of an inch.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        text: &str,
        rect: Rect,
        font: &Font,
        bottompad: f64,
        left_margin: f64,
        y_offset: f64,
        page_bottom: f64,
        measurer: &dyn TextMeasurer,
    ) -> Self {
        let base = rect.to_inches().translated(left_margin, 0.0);
        let clip_width = base.width;
        let remaining = if text.is_empty() {
            String::new()
        } else {
            force_wrap(text, clip_width, font, measurer)
        };
        Self {
            remaining,
            current: String::new(),
            font: font.clone(),
            base,
            clip_width,
            y_offset,
            page_bottom,
            bottompad,
            line_counter: 0,
        }
    }

    /// Take the next line off the remaining text.
    pub fn next_line(&mut self, measurer: &dyn TextMeasurer) {
        let text = self.remaining.as_str();
        let overflows = |s: &str| measurer.text_width(s, &self.font) > self.clip_width + EPSILON;

        let mut last_break: Option<usize> = None;
        let mut search_from = 0;
        let (line_end, rest_start) = loop {
            let ws = text[search_from..]
                .char_indices()
                .find(|(_, c)| c.is_whitespace())
                .map(|(i, c)| (search_from + i, c));
            let candidate_end = ws.map_or(text.len(), |(i, _)| i);

            if overflows(&text[..candidate_end]) {
                match last_break {
                    Some(b) => break (b, next_char_boundary(text, b)),
                    // The first word alone is wider than the column; it
                    // becomes a line of its own.
                    None => break (candidate_end, ws.map_or(text.len(), |(i, c)| i + c.len_utf8())),
                }
            }
            match ws {
                None => break (text.len(), text.len()),
                Some((i, '\n')) => break (i, i + 1),
                Some((i, c)) => {
                    last_break = Some(i);
                    search_from = i + c.len_utf8();
                }
            }
        };

        self.current = text[..line_end].to_string();
        self.remaining = text[rest_start..].to_string();
        self.line_counter += 1;
        log::trace!("text line {}: {:?}", self.line_counter, self.current);
    }

    /// Restart the vertical cursor at `offset` on a fresh page. The
    /// remaining text is untouched.
    pub fn new_page(&mut self, offset: f64) {
        self.y_offset = offset;
        self.line_counter = 0;
    }

    pub fn current_line(&self) -> &str {
        &self.current
    }

    /// Rectangle of the line last taken, in page inches. Before the first
    /// line of a page this is the slot just above the element.
    pub fn current_line_rect(&self) -> Rect {
        let slot = self.line_counter as f64 - 1.0;
        self.base
            .translated(0.0, self.y_offset + self.base.height * slot)
    }

    /// Bottom of the last line plus padding, relative to the band origin.
    pub fn text_bottom_relative_pos(&self) -> f64 {
        self.current_line_rect().bottom() + self.bottompad / 100.0 - self.y_offset
    }

    /// True when one more line would cross the page bottom.
    pub fn end_of_page(&self) -> bool {
        self.current_line_rect().bottom() + self.base.height > self.page_bottom
    }

    pub fn end_of_text(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn font(&self) -> &Font {
        &self.font
    }
}

fn next_char_boundary(text: &str, at: usize) -> usize {
    text[at..]
        .chars()
        .next()
        .map_or(text.len(), |c| at + c.len_utf8())
}

/// Insert spaces into every word wider than `width` so that each piece
/// fits. Each piece keeps at least one character.
pub fn force_wrap(text: &str, width: f64, font: &Font, measurer: &dyn TextMeasurer) -> String {
    let measure = |cs: &[char]| measurer.text_width(&cs.iter().collect::<String>(), font);
    let mut chars: Vec<char> = text.chars().collect();
    let mut pos = 0;

    loop {
        while pos < chars.len() && chars[pos].is_whitespace() {
            pos += 1;
        }
        if pos >= chars.len() {
            break;
        }
        let end = (pos..chars.len())
            .find(|&i| chars[i].is_whitespace())
            .unwrap_or(chars.len());
        let word = &chars[pos..end];
        let word_width = measure(word);
        if word_width <= width + EPSILON || word.len() < 2 {
            pos = end;
            continue;
        }

        let len = word.len();
        let mut i = ((len as f64 * width / word_width) as usize).clamp(2, len);
        while i > 2 && measure(&word[..i]) >= width {
            i -= 1;
        }
        while i < len && measure(&word[..i]) < width {
            i += 1;
        }
        // `i` is the first prefix length that reaches the column edge.
        let cut = (i - 1).max(1);
        chars.insert(pos + cut, ' ');
        pos += cut + 1;
    }

    chars.into_iter().collect()
}
