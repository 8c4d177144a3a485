//! Display Frames
//!
//! Renders approved content into the final 6×22 grid. Framed content occupies a 5×21
//! region; column 21 carries the color indicator on every row and row 5 carries the
//! date/time/weather info line. Missing or failed auxiliary data degrades the frame and
//! adds a warning, but rendering never fails for text content: the result is always a
//! structurally valid grid.

pub mod info;

pub use info::{format_info_line, WeatherSnapshot};

use crate::charset::{self, CharacterCode, Color, Layout, ROWS};
use crate::error::ApiError;
use crate::source::{GeneratedContent, OutputMode};
use chrono::{DateTime, FixedOffset};

/// Rows available to content in a framed layout.
pub const CONTENT_ROWS: usize = 5;
/// Columns available to content in a framed layout.
pub const CONTENT_COLS: usize = 21;
/// Column reserved for the color indicator.
pub const COLOR_COLUMN: usize = 21;
/// Row reserved for the info line.
pub const INFO_ROW: usize = 5;

/// Auxiliary data for one frame feature.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FeatureData<T> {
    /// Feature not configured; degrade silently
    #[default]
    NotRequested,
    Available(T),
    /// Feature requested but the fetch failed
    Unavailable(String),
}

impl<T> FeatureData<T> {
    pub fn is_requested(&self) -> bool {
        !matches!(self, FeatureData::NotRequested)
    }

    pub fn available(&self) -> Option<&T> {
        match self {
            FeatureData::Available(value) => Some(value),
            _ => None,
        }
    }
}

/// Pre-fetched data the frame draws on.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuxiliaryData {
    pub weather: FeatureData<WeatherSnapshot>,
    /// Six color codes for the color column, top to bottom
    pub palette: FeatureData<Vec<CharacterCode>>,
}

/// A rendered grid plus any degradation warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    pub layout: Layout,
    pub warnings: Vec<String>,
}

/// Stateless renderer for framed and unframed content.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameRenderer;

impl FrameRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render generated content. Layout-mode content passes through unchanged and must
    /// carry its grid.
    pub fn render_content(
        &self,
        source_id: &str,
        content: &GeneratedContent,
        framed: bool,
        aux: &AuxiliaryData,
        timestamp: &DateTime<FixedOffset>,
    ) -> Result<RenderedFrame, ApiError> {
        match content.mode {
            OutputMode::Layout => {
                let layout = content
                    .layout
                    .ok_or_else(|| ApiError::MissingLayout(source_id.to_string()))?;
                Ok(RenderedFrame {
                    layout,
                    warnings: Vec::new(),
                })
            }
            OutputMode::Text => Ok(if framed {
                self.render_framed(&content.text, aux, timestamp)
            } else {
                self.render_unframed(&content.text)
            }),
        }
    }

    /// Text over the whole grid, no frame.
    pub fn render_unframed(&self, text: &str) -> RenderedFrame {
        let region = charset::layout_region(text, ROWS, charset::COLS);
        let mut layout = Layout::blank();
        layout.paste(&region.rows, 0, 0);
        let mut warnings = Vec::new();
        region_warnings(&region, ROWS, &mut warnings);
        RenderedFrame { layout, warnings }
    }

    /// Text in the 5×21 region with color column and info row.
    pub fn render_framed(
        &self,
        text: &str,
        aux: &AuxiliaryData,
        timestamp: &DateTime<FixedOffset>,
    ) -> RenderedFrame {
        let region = charset::layout_region(text, CONTENT_ROWS, CONTENT_COLS);
        let mut layout = Layout::blank();
        layout.paste(&region.rows, 0, 0);

        let mut warnings = Vec::new();
        region_warnings(&region, CONTENT_ROWS, &mut warnings);
        self.draw_frame(&mut layout, aux, timestamp, &mut warnings);

        RenderedFrame { layout, warnings }
    }

    /// Redraw only the info row and color column of an already framed layout.
    pub fn refresh_frame(
        &self,
        layout: &Layout,
        aux: &AuxiliaryData,
        timestamp: &DateTime<FixedOffset>,
    ) -> RenderedFrame {
        let mut layout = *layout;
        let mut warnings = Vec::new();
        self.draw_frame(&mut layout, aux, timestamp, &mut warnings);
        RenderedFrame { layout, warnings }
    }

    fn draw_frame(
        &self,
        layout: &mut Layout,
        aux: &AuxiliaryData,
        timestamp: &DateTime<FixedOffset>,
        warnings: &mut Vec<String>,
    ) {
        let palette = resolve_palette(&aux.palette, warnings);
        for (row, code) in palette.iter().enumerate() {
            layout.set(row, COLOR_COLUMN, *code);
        }

        let weather = match &aux.weather {
            FeatureData::NotRequested => None,
            FeatureData::Available(weather) => Some(weather),
            FeatureData::Unavailable(reason) => {
                warnings.push(format!("weather unavailable: {}", reason));
                None
            }
        };
        let info = format_info_line(timestamp, weather, CONTENT_COLS);
        let mut cells = vec![charset::BLANK; CONTENT_COLS];
        for (col, grapheme) in
            unicode_segmentation::UnicodeSegmentation::graphemes(info.as_str(), true)
                .take(CONTENT_COLS)
                .enumerate()
        {
            cells[col] = charset::char_to_code(grapheme);
        }
        layout.paste(&[cells], INFO_ROW, 0);
    }
}

fn region_warnings(region: &charset::LayoutRegion, max_lines: usize, warnings: &mut Vec<String>) {
    if region.truncated {
        warnings.push(format!(
            "content truncated: {} lines after word-wrapping, maximum {}",
            region.line_count, max_lines
        ));
    }
    if !region.unsupported.is_empty() {
        let listed: Vec<String> = region
            .unsupported
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect();
        warnings.push(format!(
            "unsupported characters replaced with blank: {}",
            listed.join(", ")
        ));
    }
}

fn default_palette() -> [CharacterCode; ROWS] {
    Color::DEFAULT_SEQUENCE.map(Color::code)
}

fn resolve_palette(
    palette: &FeatureData<Vec<CharacterCode>>,
    warnings: &mut Vec<String>,
) -> [CharacterCode; ROWS] {
    match palette {
        FeatureData::NotRequested => default_palette(),
        FeatureData::Unavailable(reason) => {
            warnings.push(format!("color palette unavailable: {}", reason));
            default_palette()
        }
        FeatureData::Available(codes) => {
            if codes.len() != ROWS {
                warnings.push(format!(
                    "color palette unavailable: expected {} colors, got {}",
                    ROWS,
                    codes.len()
                ));
                return default_palette();
            }
            if let Some(bad) = codes.iter().find(|code| Color::from_code(**code).is_none()) {
                warnings.push(format!(
                    "color palette unavailable: code {} is not a color",
                    bad
                ));
                return default_palette();
            }
            let mut resolved = default_palette();
            resolved.copy_from_slice(codes);
            resolved
        }
    }
}
