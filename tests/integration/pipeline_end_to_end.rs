//! End-to-end cycles: selection, generation, rendering, delivery and records.

use splitflap::charset::{self, Color, COLS, ROWS};
use splitflap::frame::{COLOR_COLUMN, CONTENT_COLS, INFO_ROW};
use splitflap::orchestrator::CycleOutcome;
use splitflap::persistence::RecordStatus;
use async_trait::async_trait;
use splitflap::error::ApiError;
use splitflap::provider::{ModelProviderClient, ScriptedProvider};
use splitflap::source::{
    ContentSource, GeneratedContent, GenerationContext, RegisteredSource, SourceEntry, SourceKind,
};
use std::sync::Arc;
use std::time::Duration;

use crate::integration::{cycle_time, harness, prompt_entry, static_entry};

fn row_text(layout: &splitflap::Layout, row: usize) -> String {
    layout.rows()[row]
        .iter()
        .map(|&code| charset::code_to_char(code))
        .collect()
}

#[test]
fn test_hello_world_centered_on_grid() {
    let layout = charset::text_to_layout("hello world");
    let expected = format!("{}HELLO WORLD{}", " ".repeat(5), " ".repeat(6));
    assert_eq!(row_text(&layout, 2), expected);
    for row in [0, 1, 3, 4, 5] {
        assert!(layout.is_blank_row(row));
    }
    assert_eq!(charset::layout_to_text(&layout).trim(), "HELLO WORLD");
}

#[test]
fn test_long_text_wraps_across_rows() {
    let text = "THE QUICK BROWN FOX JUMPS OVER THE LAZY";
    assert_eq!(text.len(), 39);
    let layout = charset::text_to_layout(text);
    let non_blank = (0..ROWS).filter(|&row| !layout.is_blank_row(row)).count();
    assert!(non_blank >= 2);
    for row in layout.rows() {
        assert_eq!(row.len(), COLS);
    }
}

#[tokio::test]
async fn test_framed_cycle_layout() {
    let h = harness(vec![static_entry("greeting", "good morning", true)], None, None);
    let outcome = h
        .orchestrator
        .run_cycle(GenerationContext::major(cycle_time()))
        .await
        .unwrap();
    let CycleOutcome::Delivered(report) = outcome else {
        panic!("expected delivery");
    };
    assert!(!report.used_fallback);
    assert!(report.warnings.is_empty());

    let layout = h.display.last().unwrap();
    assert_eq!(layout, report.layout);
    for row in 0..ROWS {
        assert!(layout.get(row, COLOR_COLUMN).and_then(Color::from_code).is_some());
    }
    assert!(row_text(&layout, INFO_ROW).starts_with("THU OCT 16 9:05AM"));
    assert!(row_text(&layout, 2)[..CONTENT_COLS].contains("GOOD MORNING"));
}

#[tokio::test]
async fn test_truncation_framed_and_unframed() {
    let eight_lines = "ONE\nTWO\nTHREE\nFOUR\nFIVE\nSIX\nSEVEN\nEIGHT";

    let framed = harness(vec![static_entry("long", eight_lines, true)], None, None);
    let CycleOutcome::Delivered(report) = framed
        .orchestrator
        .run_cycle(GenerationContext::major(cycle_time()))
        .await
        .unwrap()
    else {
        panic!("expected delivery");
    };
    assert_eq!(
        report.warnings,
        vec!["content truncated: 8 lines after word-wrapping, maximum 5".to_string()]
    );
    assert!(row_text(&report.layout, 4).contains("FIVE"));
    assert!(row_text(&report.layout, INFO_ROW).starts_with("THU"));

    let unframed = harness(vec![static_entry("long", eight_lines, false)], None, None);
    let CycleOutcome::Delivered(report) = unframed
        .orchestrator
        .run_cycle(GenerationContext::major(cycle_time()))
        .await
        .unwrap()
    else {
        panic!("expected delivery");
    };
    assert_eq!(
        report.warnings,
        vec!["content truncated: 8 lines after word-wrapping, maximum 6".to_string()]
    );
    assert!(row_text(&report.layout, 5).contains("SIX"));
}

#[tokio::test]
async fn test_generative_cycle_records_provenance() {
    let provider = Arc::new(ScriptedProvider::new("primary", "small-model").with_submissions(["RISE AND SHINE"]));
    let h = harness(vec![prompt_entry("poem")], Some(provider.clone()), None);

    let CycleOutcome::Delivered(report) = h
        .orchestrator
        .run_cycle(GenerationContext::major(cycle_time()))
        .await
        .unwrap()
    else {
        panic!("expected delivery");
    };
    assert_eq!(report.content.text, "RISE AND SHINE");
    assert_eq!(report.content.metadata.provider.as_deref(), Some("primary"));
    assert_eq!(report.content.metadata.model.as_deref(), Some("small-model"));
    assert!(!report.content.metadata.failover);
    assert_eq!(provider.call_count(), 1);

    h.orchestrator.persistence().unwrap().flush().await;
    let records = h.sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, RecordStatus::Success);
    assert_eq!(records[0].source_id, "poem");
}

#[tokio::test]
async fn test_minor_cycle_refreshes_frame_only() {
    let h = harness(vec![static_entry("greeting", "HELLO", true)], None, None);
    h.orchestrator
        .run_cycle(GenerationContext::major(cycle_time()))
        .await
        .unwrap();
    let first = h.display.last().unwrap();

    let later = cycle_time() + chrono::Duration::minutes(1);
    let CycleOutcome::Delivered(report) = h
        .orchestrator
        .run_cycle(GenerationContext::minor(later))
        .await
        .unwrap()
    else {
        panic!("expected delivery");
    };
    assert!(report.refreshed_only);
    let second = h.display.last().unwrap();
    for row in 0..INFO_ROW {
        assert_eq!(first.rows()[row][..CONTENT_COLS], second.rows()[row][..CONTENT_COLS]);
    }
    assert!(row_text(&second, INFO_ROW).starts_with("THU OCT 16 9:06AM"));
}

/// Static text that takes `delay` to produce.
struct DelayedSource {
    text: &'static str,
    delay: Duration,
}

#[async_trait]
impl ContentSource for DelayedSource {
    async fn generate(
        &self,
        _ctx: &GenerationContext,
        _model: Option<&dyn ModelProviderClient>,
    ) -> Result<GeneratedContent, ApiError> {
        tokio::time::sleep(self.delay).await;
        Ok(GeneratedContent::text(self.text))
    }
}

fn delayed_entry(id: &str, text: &'static str, delay_ms: u64) -> SourceEntry {
    SourceEntry::new(
        RegisteredSource::new(id, SourceKind::Programmatic).framed(false),
        Arc::new(DelayedSource {
            text,
            delay: Duration::from_millis(delay_ms),
        }),
    )
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_cycles_cache_last_write() {
    let h = harness(
        vec![
            delayed_entry("slow", "SLOW FINISH", 50),
            delayed_entry("quick", "QUICK FINISH", 10),
        ],
        None,
        None,
    );

    let (slow, quick) = tokio::join!(
        h.orchestrator
            .run_cycle_with_source(GenerationContext::major(cycle_time()), "slow"),
        h.orchestrator
            .run_cycle_with_source(GenerationContext::major(cycle_time()), "quick"),
    );
    let CycleOutcome::Delivered(slow) = slow.unwrap() else {
        panic!("expected delivery");
    };
    let CycleOutcome::Delivered(quick) = quick.unwrap() else {
        panic!("expected delivery");
    };

    // The quick cycle finished first, so the slow one wrote the cache last.
    assert_eq!(h.display.sent(), vec![quick.layout, slow.layout]);
    let cached = h.orchestrator.cached().unwrap();
    assert_eq!(cached.source_id, "slow");
    assert_eq!(cached.content.text, "SLOW FINISH");
    assert_eq!(cached.layout, slow.layout);

    let CycleOutcome::Delivered(refresh) = h
        .orchestrator
        .run_cycle(GenerationContext::minor(cycle_time()))
        .await
        .unwrap()
    else {
        panic!("expected delivery");
    };
    assert!(refresh.refreshed_only);
    assert_eq!(refresh.source_id, "slow");
    assert_eq!(refresh.layout, slow.layout);
    assert_eq!(h.display.sent().len(), 3);
}
