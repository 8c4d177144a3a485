//! Notification sources preempt normal selection when their trigger matches.

use regex::Regex;
use splitflap::orchestrator::CycleOutcome;
use splitflap::source::{
    GenerationContext, PriorityClass, RegisteredSource, SelectionReason, SourceEntry, SourceKind,
    TemplateSource, TriggerEvent,
};
use std::sync::Arc;

use crate::integration::{cycle_time, harness, static_entry};

fn doorbell() -> SourceEntry {
    SourceEntry::new(
        RegisteredSource::new("doorbell", SourceKind::Programmatic)
            .priority(PriorityClass::Notification)
            .trigger(Regex::new("^doorbell(_.*)?$").unwrap())
            .framed(false),
        Arc::new(TemplateSource::new("{who} AT THE DOOR")),
    )
}

#[tokio::test]
async fn test_matching_event_preempts_normal_sources() {
    let h = harness(vec![static_entry("clock", "TICK", true), doorbell()], None, None);
    let ctx = GenerationContext::major(cycle_time()).with_event(
        TriggerEvent::new("doorbell_front").with_payload(serde_json::json!({ "who": "AMY" })),
    );

    let CycleOutcome::Delivered(report) = h.orchestrator.run_cycle(ctx).await.unwrap() else {
        panic!("expected delivery");
    };
    assert_eq!(report.source_id, "doorbell");
    assert_eq!(report.reason, Some(SelectionReason::Notification));
    assert_eq!(report.content.text, "AMY AT THE DOOR");
}

#[tokio::test]
async fn test_unmatched_event_falls_back_to_strategy() {
    let h = harness(vec![static_entry("clock", "TICK", true), doorbell()], None, None);
    let ctx = GenerationContext::major(cycle_time()).with_event(TriggerEvent::new("mail"));

    let CycleOutcome::Delivered(report) = h.orchestrator.run_cycle(ctx).await.unwrap() else {
        panic!("expected delivery");
    };
    assert_eq!(report.source_id, "clock");
    assert_eq!(report.reason, Some(SelectionReason::Strategy));
}

#[tokio::test]
async fn test_notification_never_chosen_without_event() {
    let h = harness(vec![doorbell()], None, None);
    let err = h
        .orchestrator
        .run_cycle(GenerationContext::major(cycle_time()))
        .await
        .unwrap_err();
    assert!(matches!(err, splitflap::ApiError::NoEligibleSource));
    assert!(h.display.sent().is_empty());
}
