//! CLI presentation: text formatting for command results.

use crate::display::render_preview;
use crate::frame::RenderedFrame;
use crate::orchestrator::CycleOutcome;
use crate::source::selector::SelectionReason;
use crate::source::SourceRegistry;
use crate::validation::{DisplayLimits, ValidationResult};
use comfy_table::Table;

/// Layout preview followed by any render warnings.
pub fn format_rendered(rendered: &RenderedFrame, color: bool) -> String {
    let mut out = render_preview(&rendered.layout, color);
    for warning in &rendered.warnings {
        out.push_str(&format!("warning: {}\n", warning));
    }
    out.trim_end().to_string()
}

pub fn format_check_result(result: &ValidationResult, limits: DisplayLimits) -> String {
    if result.valid {
        let mut out = format!(
            "OK: {} line{}, longest {} of {} columns\n",
            result.line_count,
            if result.line_count == 1 { "" } else { "s" },
            result.max_line_length,
            limits.max_line_length
        );
        for line in &result.preview {
            out.push_str(&format!("  {}\n", line));
        }
        out.trim_end().to_string()
    } else {
        result.feedback(limits)
    }
}

/// Registered sources as a table, in registration order.
pub fn format_sources_table(registry: &SourceRegistry) -> String {
    if registry.is_empty() {
        return "No sources configured.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["ID", "Name", "Priority", "Kind", "Tier", "Framed", "Trigger"]);
    for entry in registry.list_all() {
        let meta = &entry.meta;
        table.add_row(vec![
            meta.id.clone(),
            meta.display_name.clone(),
            meta.priority.as_str().to_string(),
            meta.kind.as_str().to_string(),
            meta.tier.as_str().to_string(),
            if meta.framed { "yes" } else { "no" }.to_string(),
            meta.trigger
                .as_ref()
                .map(|r| r.as_str().to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.to_string()
}

/// One-paragraph summary of a cycle; the preview is included when `preview` is set.
pub fn format_cycle_outcome(outcome: &CycleOutcome, preview: bool, color: bool) -> String {
    match outcome {
        CycleOutcome::Blocked { circuit, reason } => {
            format!("Cycle blocked by {} circuit: {}", circuit.as_str(), reason)
        }
        CycleOutcome::Delivered(report) => {
            let mut out = String::new();
            if preview {
                out.push_str(&render_preview(&report.layout, color));
            }
            let how = if report.refreshed_only {
                "frame refresh"
            } else {
                match report.reason {
                    Some(SelectionReason::Notification) => "notification",
                    Some(SelectionReason::Explicit) => "explicit",
                    Some(SelectionReason::Strategy) | None => "selected",
                }
            };
            out.push_str(&format!("Source: {} ({})\n", report.source_id, how));
            if report.used_fallback {
                out.push_str("Fallback content delivered\n");
            }
            let meta = &report.content.metadata;
            if let (Some(provider), Some(model)) = (&meta.provider, &meta.model) {
                out.push_str(&format!(
                    "Model: {}/{}{}\n",
                    provider,
                    model,
                    if meta.failover { " (failover)" } else { "" }
                ));
            }
            for warning in &report.warnings {
                out.push_str(&format!("warning: {}\n", warning));
            }
            out.trim_end().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Circuit;
    use crate::frame::FrameRenderer;
    use crate::validation::validate_display_text;

    #[test]
    fn test_format_rendered_includes_warnings() {
        let rendered = FrameRenderer::new().render_unframed("A\nB\nC\nD\nE\nF\nG");
        let out = format_rendered(&rendered, false);
        assert!(out.contains("warning: content truncated"));
        assert_eq!(out.lines().filter(|l| l.starts_with('|')).count(), 6);
    }

    #[test]
    fn test_format_check_ok_and_rejected() {
        let limits = DisplayLimits::FRAMED;
        let ok = format_check_result(&validate_display_text("HELLO", limits), limits);
        assert!(ok.starts_with("OK: 1 line,"));
        let rejected = format_check_result(&validate_display_text("A<B", limits), limits);
        assert!(rejected.starts_with("Content rejected:"));
    }

    #[test]
    fn test_format_blocked() {
        let outcome = CycleOutcome::Blocked {
            circuit: Circuit::Sleep,
            reason: Circuit::Sleep.blocked_reason().to_string(),
        };
        assert_eq!(
            format_cycle_outcome(&outcome, true, false),
            "Cycle blocked by sleep circuit: sleep mode active"
        );
    }

    #[test]
    fn test_empty_sources_table() {
        assert_eq!(format_sources_table(&SourceRegistry::new()), "No sources configured.");
    }
}
