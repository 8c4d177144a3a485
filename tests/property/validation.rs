//! Validation agrees with rendering: valid text renders without warnings.

use proptest::prelude::*;
use splitflap::frame::FrameRenderer;
use splitflap::validation::{validate_display_text, DisplayLimits};

proptest! {
    #[test]
    fn valid_text_renders_without_truncation(
        words in proptest::collection::vec("[A-Z]{1,8}", 1..12)
    ) {
        let text = words.join(" ");
        let result = validate_display_text(&text, DisplayLimits::UNFRAMED);
        let rendered = FrameRenderer::new().render_unframed(&text);
        if result.valid {
            prop_assert!(rendered.warnings.is_empty());
            prop_assert!(result.line_count <= DisplayLimits::UNFRAMED.max_lines);
        } else {
            prop_assert!(!result.errors.is_empty());
        }
    }

    #[test]
    fn line_count_matches_preview(text in "[A-Z ]{0,120}") {
        let result = validate_display_text(&text, DisplayLimits::FRAMED);
        prop_assert_eq!(result.line_count, result.preview.len());
    }
}
