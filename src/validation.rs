//! Display constraint validation.
//!
//! Measures text against the display bounds the way the renderer will lay it out:
//! simulated word wrap, per-line grapheme width, and alphabet membership. Rejections are
//! plain data with exact, actionable messages; the tool-validation loop feeds them back to
//! the upstream model.

use crate::charset::{self, COLS, ROWS};
use crate::frame::{CONTENT_COLS, CONTENT_ROWS};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

pub mod tool_loop;

pub use tool_loop::{ExhaustionPolicy, ToolLoopConfig, ToolValidationLoop, Validator};

/// Name of the structured action the model uses to propose content.
pub const SUBMIT_CONTENT_TOOL: &str = "submit_content";

/// Per-source format overrides. They can only narrow the display bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOverrides {
    #[serde(default)]
    pub max_lines: Option<usize>,
    #[serde(default)]
    pub max_line_length: Option<usize>,
}

/// Bounds text must fit in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayLimits {
    pub max_lines: usize,
    pub max_line_length: usize,
}

impl DisplayLimits {
    /// Content region of a framed layout.
    pub const FRAMED: DisplayLimits = DisplayLimits {
        max_lines: CONTENT_ROWS,
        max_line_length: CONTENT_COLS,
    };

    /// Whole grid.
    pub const UNFRAMED: DisplayLimits = DisplayLimits {
        max_lines: ROWS,
        max_line_length: COLS,
    };

    pub fn for_source(framed: bool, overrides: &FormatOverrides) -> Self {
        let base = if framed { Self::FRAMED } else { Self::UNFRAMED };
        Self {
            max_lines: overrides
                .max_lines
                .map_or(base.max_lines, |n| n.clamp(1, base.max_lines)),
            max_line_length: overrides
                .max_line_length
                .map_or(base.max_line_length, |n| n.clamp(1, base.max_line_length)),
        }
    }
}

/// Outcome of validating text against display limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub line_count: usize,
    pub max_line_length: usize,
    pub invalid_characters: Vec<String>,
    /// Whether any paragraph had to be wrapped across lines
    pub wrapped: bool,
    pub errors: Vec<String>,
    /// Lines as they would wrap
    pub preview: Vec<String>,
}

impl ValidationResult {
    /// Feedback for the model: every problem plus a wrap preview.
    pub fn feedback(&self, limits: DisplayLimits) -> String {
        let mut out = String::from("Content rejected:\n");
        for error in &self.errors {
            out.push_str(&format!("- {}\n", error));
        }
        out.push_str(&format!(
            "Preview after word-wrapping ({} columns, {} lines max):\n",
            limits.max_line_length, limits.max_lines
        ));
        for (idx, line) in self.preview.iter().enumerate() {
            let marker = if idx >= limits.max_lines { " (cut)" } else { "" };
            out.push_str(&format!("{:>2} | {}{}\n", idx + 1, line, marker));
        }
        out.push_str(&format!(
            "Revise the text and call {} again.",
            SUBMIT_CONTENT_TOOL
        ));
        out
    }
}

/// Validate `text` against `limits`.
pub fn validate_display_text(text: &str, limits: DisplayLimits) -> ValidationResult {
    let preview =
        charset::trim_blank_edges(charset::wrap_untruncated(text, limits.max_line_length));
    let line_count = preview.len();
    let max_line_length = preview
        .iter()
        .map(|line| charset::grapheme_len(line))
        .max()
        .unwrap_or(0);
    let wrapped = text
        .split('\n')
        .any(|paragraph| charset::grapheme_len(paragraph.trim()) > limits.max_line_length);

    let mut invalid_characters: Vec<String> = Vec::new();
    for grapheme in text.graphemes(true) {
        if grapheme.chars().all(char::is_whitespace) || charset::is_supported(grapheme) {
            continue;
        }
        if !invalid_characters.iter().any(|c| c == grapheme) {
            invalid_characters.push(grapheme.to_string());
        }
    }

    let mut errors = Vec::new();
    if line_count == 0 {
        errors.push("content is empty".to_string());
    }
    if line_count > limits.max_lines {
        let excess = line_count - limits.max_lines;
        errors.push(format!(
            "{} lines after word-wrapping, maximum {} — remove {} line{}",
            line_count,
            limits.max_lines,
            excess,
            if excess == 1 { "" } else { "s" }
        ));
    }
    for (idx, line) in preview.iter().enumerate() {
        let len = charset::grapheme_len(line);
        if len > limits.max_line_length {
            errors.push(format!(
                "line {} is {} characters, maximum {} — shorten \"{}\" by {}",
                idx + 1,
                len,
                limits.max_line_length,
                line,
                len - limits.max_line_length
            ));
        }
    }
    if !invalid_characters.is_empty() {
        let listed: Vec<String> = invalid_characters
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect();
        errors.push(format!("unsupported characters: {}", listed.join(", ")));
    }

    ValidationResult {
        valid: errors.is_empty(),
        line_count,
        max_line_length,
        invalid_characters,
        wrapped,
        errors,
        preview,
    }
}
