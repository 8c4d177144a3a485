//! Layout invariants: grid shape, wrap width, code range.

use chrono::{FixedOffset, TimeZone};
use proptest::prelude::*;
use splitflap::charset::{self, Color, COLS, MAX_CODE, ROWS};
use splitflap::frame::{AuxiliaryData, FrameRenderer, COLOR_COLUMN, CONTENT_COLS, CONTENT_ROWS};

fn display_text() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9 !?.,:\\-\n]{0,160}").unwrap()
}

/// Words separated by single spaces, exactly `width` graphemes long.
fn exact_line(width: usize) -> impl Strategy<Value = String> {
    proptest::string::string_regex(&format!("[A-Z0-9 ]{{{}}}", width))
        .unwrap()
        .prop_map(|raw| {
            let last = raw.chars().count().saturating_sub(1);
            let mut line = String::with_capacity(raw.len());
            let mut after_space = true;
            for (i, c) in raw.chars().enumerate() {
                let c = if c == ' ' && (after_space || i == last) { 'X' } else { c };
                after_space = c == ' ';
                line.push(c);
            }
            line
        })
}

fn row_text(layout: &splitflap::Layout, row: usize, width: usize) -> String {
    layout.rows()[row][..width]
        .iter()
        .map(|&code| charset::code_to_char(code))
        .collect()
}

proptest! {
    #[test]
    fn wrapped_lines_respect_width(text in display_text(), width in 1usize..=COLS) {
        for line in charset::wrap_text(&text, width) {
            prop_assert!(charset::grapheme_len(&line) <= width);
        }
    }

    #[test]
    fn every_layout_is_a_valid_grid(text in any::<String>()) {
        let layout = charset::text_to_layout(&text);
        prop_assert_eq!(layout.rows().len(), ROWS);
        for row in layout.rows() {
            prop_assert_eq!(row.len(), COLS);
            prop_assert!(row.iter().all(|&code| code <= MAX_CODE));
        }
    }

    #[test]
    fn framed_layout_keeps_color_column(text in display_text(), hour in 0u32..24, minute in 0u32..60) {
        let ts = FixedOffset::west_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 3, 9, hour, minute, 0)
            .unwrap();
        let rendered = FrameRenderer::new().render_framed(&text, &AuxiliaryData::default(), &ts);
        for row in 0..ROWS {
            prop_assert!(rendered.layout.get(row, COLOR_COLUMN).and_then(Color::from_code).is_some());
        }
        for row in rendered.layout.rows() {
            prop_assert!(row[..CONTENT_COLS].iter().all(|&code| Color::from_code(code).is_none()));
        }
    }

    #[test]
    fn layout_text_round_trip_is_stable(text in display_text()) {
        let once = charset::layout_to_text(&charset::text_to_layout(&text));
        let twice = charset::layout_to_text(&charset::text_to_layout(&once));
        prop_assert_eq!(
            charset::text_to_layout(&once),
            charset::text_to_layout(&twice)
        );
    }

    #[test]
    fn supported_characters_round_trip(code in 1u8..=MAX_CODE) {
        let grapheme = charset::code_to_char(code);
        prop_assume!(grapheme != " ");
        prop_assert_eq!(charset::char_to_code(grapheme), code);
    }

    #[test]
    fn exact_width_line_stays_whole(
        (width, line) in (1usize..=COLS).prop_flat_map(|w| (Just(w), exact_line(w)))
    ) {
        prop_assert_eq!(charset::grapheme_len(&line), width);
        prop_assert_eq!(charset::wrap_text(&line, width), vec![line.clone()]);
        let overflow = format!("{} Z", line);
        prop_assert_eq!(charset::wrap_text(&overflow, width), vec![line, "Z".to_string()]);
    }

    #[test]
    fn full_width_lines_round_trip(
        lines in proptest::collection::vec(exact_line(COLS), 1..=ROWS)
    ) {
        let text = lines.join("\n");
        let back = charset::layout_to_text(&charset::text_to_layout(&text));
        let back: Vec<&str> = back.lines().skip_while(|line| line.is_empty()).collect();
        prop_assert_eq!(back, lines.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn full_width_framed_lines_fit(
        lines in proptest::collection::vec(exact_line(CONTENT_COLS), 1..=CONTENT_ROWS)
    ) {
        let ts = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 10, 16, 9, 5, 0)
            .unwrap();
        let rendered = FrameRenderer::new().render_framed(&lines.join("\n"), &AuxiliaryData::default(), &ts);
        prop_assert!(rendered.warnings.is_empty(), "warnings: {:?}", rendered.warnings);
        let shown: Vec<String> = (0..CONTENT_ROWS)
            .map(|row| row_text(&rendered.layout, row, CONTENT_COLS))
            .filter(|text| !text.trim().is_empty())
            .collect();
        prop_assert_eq!(shown, lines);
    }
}
