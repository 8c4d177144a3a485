//! Character/Layout Model
//!
//! Pure functions mapping text to the display's fixed alphabet of character codes and
//! laying text out on the fixed 6×22 grid. All widths are measured in grapheme clusters,
//! so a multi-codepoint color symbol occupies exactly one display cell.
//!
//! The code table is the device wire format and must not be reordered: digits 1–9 are
//! codes 27–35 and `0` follows them at 36.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Index into the display's glyph/color alphabet, in `0..=70`.
pub type CharacterCode = u8;

/// Grid rows.
pub const ROWS: usize = 6;
/// Grid columns.
pub const COLS: usize = 22;
/// Blank cell.
pub const BLANK: CharacterCode = 0;
/// Highest valid code (explicit off/black block).
pub const MAX_CODE: CharacterCode = 70;

const VARIATION_SELECTOR: char = '\u{FE0F}';

/// Glyph for every code. Unassigned slots render as a space.
const GLYPHS: [&str; 71] = [
    " ", // 0
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", // 1-13
    "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z", // 14-26
    "1", "2", "3", "4", "5", "6", "7", "8", "9", // 27-35
    "0",  // 36
    "!",  // 37
    "@",  // 38
    "#",  // 39
    "$",  // 40
    "(",  // 41
    ")",  // 42
    " ",  // 43
    "-",  // 44
    " ",  // 45
    "+",  // 46
    "&",  // 47
    "=",  // 48
    ";",  // 49
    ":",  // 50
    " ",  // 51
    "'",  // 52
    "\"", // 53
    "%",  // 54
    ",",  // 55
    ".",  // 56
    " ",  // 57
    " ",  // 58
    "/",  // 59
    "?",  // 60
    " ",  // 61
    " ",  // 62
    "\u{1F7E5}", // 63 red
    "\u{1F7E7}", // 64 orange
    "\u{1F7E8}", // 65 yellow
    "\u{1F7E9}", // 66 green
    "\u{1F7E6}", // 67 blue
    "\u{1F7EA}", // 68 violet
    "\u{2B1C}",  // 69 white
    "\u{2B1B}",  // 70 black (off)
];

/// Named color blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Violet,
    White,
    Black,
}

impl Color {
    /// Hard-coded color column sequence used when no palette is available.
    pub const DEFAULT_SEQUENCE: [Color; 6] = [
        Color::Red,
        Color::Orange,
        Color::Yellow,
        Color::Green,
        Color::Blue,
        Color::Violet,
    ];

    const ALL: [Color; 8] = [
        Color::Red,
        Color::Orange,
        Color::Yellow,
        Color::Green,
        Color::Blue,
        Color::Violet,
        Color::White,
        Color::Black,
    ];

    pub fn code(self) -> CharacterCode {
        match self {
            Color::Red => 63,
            Color::Orange => 64,
            Color::Yellow => 65,
            Color::Green => 66,
            Color::Blue => 67,
            Color::Violet => 68,
            Color::White => 69,
            Color::Black => 70,
        }
    }

    pub fn from_code(code: CharacterCode) -> Option<Color> {
        Self::ALL.into_iter().find(|color| color.code() == code)
    }

    /// Emoji alias accepted in text input.
    pub fn emoji(self) -> &'static str {
        GLYPHS[self.code() as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Orange => "orange",
            Color::Yellow => "yellow",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Violet => "violet",
            Color::White => "white",
            Color::Black => "black",
        }
    }
}

/// Recognise a color emoji, with or without a trailing variation selector.
fn color_alias(grapheme: &str) -> Option<Color> {
    let base = grapheme
        .strip_suffix(VARIATION_SELECTOR)
        .unwrap_or(grapheme);
    Color::ALL.into_iter().find(|color| color.emoji() == base)
}

/// Map one grapheme to its character code. Case-insensitive; unmapped graphemes are blank.
pub fn char_to_code(grapheme: &str) -> CharacterCode {
    if let Some(color) = color_alias(grapheme) {
        return color.code();
    }

    let mut chars = grapheme.chars();
    let ch = match (chars.next(), chars.next()) {
        (Some(ch), None) => ch.to_ascii_uppercase(),
        _ => return BLANK,
    };
    if ch == ' ' {
        return BLANK;
    }

    let mut buf = [0u8; 4];
    let key: &str = ch.encode_utf8(&mut buf);
    GLYPHS[1..=60]
        .iter()
        .position(|glyph| *glyph == key)
        .map(|idx| (idx + 1) as CharacterCode)
        .unwrap_or(BLANK)
}

/// Inverse of [`char_to_code`]. Unknown codes render as a space.
pub fn code_to_char(code: CharacterCode) -> &'static str {
    GLYPHS.get(code as usize).copied().unwrap_or(" ")
}

/// Whether a grapheme can be shown: the alphabet, color aliases, or a space.
pub fn is_supported(grapheme: &str) -> bool {
    grapheme == " " || char_to_code(grapheme) != BLANK
}

/// Length in grapheme clusters (display cells).
pub fn grapheme_len(text: &str) -> usize {
    text.graphemes(true).count()
}

/// First `max` graphemes of `text`.
pub fn truncate_graphemes(text: &str, max: usize) -> String {
    text.graphemes(true).take(max).collect()
}

/// Greedy grapheme-aware word wrap.
///
/// Explicit line breaks are honoured first and every empty line is kept as its own
/// output line. A token longer than `max_width` is hard-truncated to exactly `max_width`.
pub fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    wrap_paragraphs(text, max_width, true)
}

/// Word wrap without truncating overlong tokens; used to measure how badly text overflows.
pub(crate) fn wrap_untruncated(text: &str, max_width: usize) -> Vec<String> {
    wrap_paragraphs(text, max_width, false)
}

fn wrap_paragraphs(text: &str, max_width: usize, truncate: bool) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = paragraph.strip_suffix('\r').unwrap_or(paragraph);
        let mut current = String::new();
        let mut current_len = 0usize;

        for word in paragraph.split_whitespace() {
            let word = if truncate {
                truncate_graphemes(word, max_width)
            } else {
                word.to_string()
            };
            let word_len = grapheme_len(&word);

            if current_len == 0 {
                current = word;
                current_len = word_len;
            } else if current_len + 1 + word_len <= max_width {
                current.push(' ');
                current.push_str(&word);
                current_len += 1 + word_len;
            } else {
                lines.push(std::mem::take(&mut current));
                current = word;
                current_len = word_len;
            }
        }

        lines.push(current);
    }

    lines
}

/// Center `text` in `width` cells. Text at least `width` long is truncated instead.
pub fn center_text(text: &str, width: usize) -> String {
    let len = grapheme_len(text);
    if len >= width {
        return truncate_graphemes(text, width);
    }
    let remaining = width - len;
    let left = remaining / 2;
    let right = remaining - left;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}

/// Fixed 6×22 grid of character codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<CharacterCode>>", into = "Vec<Vec<CharacterCode>>")]
pub struct Layout {
    rows: [[CharacterCode; COLS]; ROWS],
}

impl Layout {
    pub fn blank() -> Self {
        Self {
            rows: [[BLANK; COLS]; ROWS],
        }
    }

    /// Build a layout from nested rows, rejecting wrong dimensions or out-of-range codes.
    pub fn from_rows(rows: Vec<Vec<CharacterCode>>) -> Result<Self, ApiError> {
        if rows.len() != ROWS {
            return Err(ApiError::InvalidLayout(format!(
                "expected {} rows, got {}",
                ROWS,
                rows.len()
            )));
        }
        let mut layout = Self::blank();
        for (r, row) in rows.iter().enumerate() {
            if row.len() != COLS {
                return Err(ApiError::InvalidLayout(format!(
                    "row {} has {} cells, expected {}",
                    r,
                    row.len(),
                    COLS
                )));
            }
            for (c, &code) in row.iter().enumerate() {
                if code > MAX_CODE {
                    return Err(ApiError::InvalidLayout(format!(
                        "code {} at row {} column {} is out of range",
                        code, r, c
                    )));
                }
                layout.rows[r][c] = code;
            }
        }
        Ok(layout)
    }

    pub fn rows(&self) -> &[[CharacterCode; COLS]; ROWS] {
        &self.rows
    }

    /// The code at (`row`, `col`), or `None` outside the grid.
    pub fn get(&self, row: usize, col: usize) -> Option<CharacterCode> {
        self.rows.get(row)?.get(col).copied()
    }

    /// Set one cell. Out-of-range codes are stored as blank; returns false and leaves the
    /// grid untouched when (`row`, `col`) is outside it.
    pub fn set(&mut self, row: usize, col: usize, code: CharacterCode) -> bool {
        match self.rows.get_mut(row).and_then(|cells| cells.get_mut(col)) {
            Some(cell) => {
                *cell = if code > MAX_CODE { BLANK } else { code };
                true
            }
            None => false,
        }
    }

    /// Copy a region into the grid at (`top`, `left`), clipping at the edges.
    pub fn paste(&mut self, region: &[Vec<CharacterCode>], top: usize, left: usize) {
        for (r, row) in region.iter().enumerate() {
            let target = top + r;
            if target >= ROWS {
                break;
            }
            for (c, &code) in row.iter().enumerate() {
                if left + c >= COLS {
                    break;
                }
                self.set(target, left + c, code);
            }
        }
    }

    pub fn is_blank_row(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .is_some_and(|cells| cells.iter().all(|&code| code == BLANK))
    }

    pub fn to_vec(&self) -> Vec<Vec<CharacterCode>> {
        self.rows.iter().map(|row| row.to_vec()).collect()
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::blank()
    }
}

impl TryFrom<Vec<Vec<CharacterCode>>> for Layout {
    type Error = ApiError;

    fn try_from(rows: Vec<Vec<CharacterCode>>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<Layout> for Vec<Vec<CharacterCode>> {
    fn from(layout: Layout) -> Self {
        layout.to_vec()
    }
}

/// Text laid out into a `lines × width` region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutRegion {
    pub rows: Vec<Vec<CharacterCode>>,
    /// Wrapped line count before truncation to the region height.
    pub line_count: usize,
    pub truncated: bool,
    /// Distinct graphemes replaced with blank, in order of appearance.
    pub unsupported: Vec<String>,
}

/// Lay `text` out into a region of `max_lines` rows by `width` columns.
///
/// Letters are uppercased, text is wrapped, blank lines at the top and bottom are dropped,
/// the first `max_lines` lines are kept, then the block is centered vertically and every
/// line horizontally. Overflow is dropped silently here and reported via `truncated`.
pub fn layout_region(text: &str, max_lines: usize, width: usize) -> LayoutRegion {
    let upper = text.to_ascii_uppercase();
    let wrapped = trim_blank_edges(wrap_text(&upper, width));
    let line_count = wrapped.len();
    let kept = &wrapped[..line_count.min(max_lines)];
    let top = (max_lines - kept.len()) / 2;

    let mut rows = vec![vec![BLANK; width]; max_lines];
    let mut unsupported: Vec<String> = Vec::new();

    for (i, line) in kept.iter().enumerate() {
        let centered = center_text(line, width);
        for (col, grapheme) in centered.graphemes(true).take(width).enumerate() {
            let code = char_to_code(grapheme);
            if code == BLANK && grapheme != " " && !unsupported.iter().any(|u| u == grapheme) {
                unsupported.push(grapheme.to_string());
            }
            rows[top + i][col] = code;
        }
    }

    LayoutRegion {
        rows,
        line_count,
        truncated: line_count > max_lines,
        unsupported,
    }
}

pub(crate) fn trim_blank_edges(mut lines: Vec<String>) -> Vec<String> {
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    let leading = lines
        .iter()
        .take_while(|line| line.trim().is_empty())
        .count();
    lines.drain(..leading);
    lines
}

/// Lay text out over the whole unframed 6×22 grid.
pub fn text_to_layout(text: &str) -> Layout {
    let region = layout_region(text, ROWS, COLS);
    let mut layout = Layout::blank();
    layout.paste(&region.rows, 0, 0);
    layout
}

/// Inverse of [`text_to_layout`]: rows right-trimmed, trailing blank rows dropped.
pub fn layout_to_text(layout: &Layout) -> String {
    let mut lines: Vec<String> = layout
        .rows()
        .iter()
        .map(|row| {
            let line: String = row.iter().map(|&code| code_to_char(code)).collect();
            line.trim_end().to_string()
        })
        .collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
