//! Circuit gating and provider failover through full cycles.

use splitflap::circuit::Circuit;
use splitflap::error::ApiError;
use splitflap::orchestrator::CycleOutcome;
use splitflap::persistence::RecordStatus;
use splitflap::provider::ScriptedProvider;
use splitflap::source::{FallbackSource, GenerationContext};
use splitflap::validation::ExhaustionPolicy;
use std::sync::Arc;

use crate::integration::{cycle_time, harness, harness_with_policy, prompt_entry};

fn rate_limited(name: &str) -> ScriptedProvider {
    ScriptedProvider::new(name, "m").with_error(ApiError::ProviderRateLimit {
        provider: name.to_string(),
        status: 429,
        message: "too many requests".to_string(),
    })
}

#[tokio::test]
async fn test_master_circuit_off_blocks_everything() {
    let provider = Arc::new(ScriptedProvider::new("primary", "m").with_submissions(["HI"]));
    let h = harness(vec![prompt_entry("poem")], Some(provider.clone()), None);
    h.board.set_circuit(Circuit::Master, false);

    let outcome = h
        .orchestrator
        .run_cycle(GenerationContext::major(cycle_time()))
        .await
        .unwrap();
    match outcome {
        CycleOutcome::Blocked { circuit, reason } => {
            assert_eq!(circuit, Circuit::Master);
            assert_eq!(reason, "master circuit off");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(provider.call_count(), 0);
    assert!(h.display.sent().is_empty());
    assert!(h.orchestrator.cached().is_none());
}

#[tokio::test]
async fn test_master_checked_before_sleep() {
    let h = harness(vec![prompt_entry("poem")], None, None);
    h.board.set_circuit(Circuit::Sleep, false);
    h.board.set_circuit(Circuit::Master, false);
    let outcome = h
        .orchestrator
        .run_cycle(GenerationContext::major(cycle_time()))
        .await
        .unwrap();
    assert!(matches!(outcome, CycleOutcome::Blocked { circuit: Circuit::Master, .. }));
}

#[tokio::test]
async fn test_rate_limit_fails_over_to_alternate() {
    let preferred = Arc::new(rate_limited("primary"));
    let alternate = Arc::new(ScriptedProvider::new("backup", "big").with_submissions(["BACKUP SPEAKING"]));
    let h = harness(vec![prompt_entry("poem")], Some(preferred.clone()), Some(alternate.clone()));

    let CycleOutcome::Delivered(report) = h
        .orchestrator
        .run_cycle(GenerationContext::major(cycle_time()))
        .await
        .unwrap()
    else {
        panic!("expected delivery");
    };
    assert!(!report.used_fallback);
    assert!(report.content.metadata.failover);
    assert_eq!(report.content.text, "BACKUP SPEAKING");
    assert_eq!(report.content.metadata.provider.as_deref(), Some("backup"));
    assert_eq!(preferred.call_count(), 1);
    assert_eq!(alternate.call_count(), 1);

    h.orchestrator.persistence().unwrap().flush().await;
    let statuses: Vec<RecordStatus> = h.sink.records().iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![RecordStatus::Failed, RecordStatus::Success]);
}

#[tokio::test]
async fn test_validation_exhaustion_delivers_fallback() {
    let preferred = Arc::new(
        ScriptedProvider::new("primary", "m").with_submissions(["A\nB\nC\nD\nE\nF\nG\nH"]),
    );
    let alternate = Arc::new(ScriptedProvider::new("backup", "m").with_submissions(["FINE"]));
    let h = harness(vec![prompt_entry("poem")], Some(preferred.clone()), Some(alternate.clone()));

    let ctx = GenerationContext::major(cycle_time());
    let expected = FallbackSource::new().produce(&ctx).text;
    let CycleOutcome::Delivered(report) = h.orchestrator.run_cycle(ctx).await.unwrap() else {
        panic!("expected delivery");
    };
    assert!(report.used_fallback);
    assert_eq!(report.content.text, expected);
    assert_eq!(preferred.call_count(), 3);
    assert_eq!(alternate.call_count(), 0);

    h.orchestrator.persistence().unwrap().flush().await;
    let records = h.sink.records();
    assert_eq!(records.last().unwrap().status, RecordStatus::Fallback);
    assert!(records[0]
        .error
        .as_deref()
        .unwrap()
        .contains("rejected after 3 attempts"));
}

#[tokio::test]
async fn test_best_effort_content_is_truncated_not_replaced() {
    let preferred = Arc::new(
        ScriptedProvider::new("primary", "m").with_submissions(["A\nB\nC\nD\nE\nF\nG\nH"]),
    );
    let alternate = Arc::new(ScriptedProvider::new("backup", "m").with_submissions(["FINE"]));
    let h = harness_with_policy(
        vec![prompt_entry("poem")],
        Some(preferred.clone()),
        Some(alternate.clone()),
        ExhaustionPolicy::AcceptBestEffort,
    );

    let CycleOutcome::Delivered(report) = h
        .orchestrator
        .run_cycle(GenerationContext::major(cycle_time()))
        .await
        .unwrap()
    else {
        panic!("expected delivery");
    };
    assert!(!report.used_fallback);
    assert_eq!(report.source_id, "poem");
    assert_eq!(report.content.text, "A\nB\nC\nD\nE\nF\nG\nH");
    assert_eq!(report.content.metadata.validation_attempts, Some(3));
    assert_eq!(
        report.warnings,
        vec!["content truncated: 8 lines after word-wrapping, maximum 5".to_string()]
    );
    assert_eq!(preferred.call_count(), 3);
    assert_eq!(alternate.call_count(), 0);
    assert_eq!(h.display.last(), Some(report.layout));

    h.orchestrator.persistence().unwrap().flush().await;
    let records = h.sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, RecordStatus::Success);
}

#[tokio::test]
async fn test_unavailable_preferred_goes_to_fallback() {
    let preferred = Arc::new(ScriptedProvider::new("primary", "m").with_submissions(["HI"]));
    let h = harness(vec![prompt_entry("poem")], Some(preferred.clone()), None);
    h.board.set_provider_available("primary", false);

    let CycleOutcome::Delivered(report) = h
        .orchestrator
        .run_cycle(GenerationContext::major(cycle_time()))
        .await
        .unwrap()
    else {
        panic!("expected delivery");
    };
    assert!(report.used_fallback);
    assert_eq!(preferred.call_count(), 0);
}

#[tokio::test]
async fn test_delivery_failure_is_fatal_but_cached() {
    let h = harness(vec![crate::integration::static_entry("a", "HELLO", true)], None, None);
    h.display.set_failure(Some("board offline".to_string()));

    let err = h
        .orchestrator
        .run_cycle(GenerationContext::major(cycle_time()))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::DeliveryFailed(_)));
    assert_eq!(h.orchestrator.cached().unwrap().source_id, "a");

    h.orchestrator.persistence().unwrap().flush().await;
    assert_eq!(h.sink.records()[0].status, RecordStatus::Failed);
}
