//! Shared test utilities for integration tests
//!
//! Builds an orchestrator around in-memory collaborators and serializes access to the
//! XDG environment variables used by config loading.

use chrono::{DateTime, FixedOffset, TimeZone};
use splitflap::circuit::SwitchBoard;
use splitflap::display::MemoryDisplay;
use splitflap::failover::{FailoverCoordinator, ProviderSlot};
use splitflap::orchestrator::Orchestrator;
use splitflap::persistence::{MemorySink, PersistenceWorker};
use splitflap::provider::ScriptedProvider;
use splitflap::source::{
    PromptSource, RegisteredSource, SequenceRandom, SourceEntry, SourceKind, SourceRegistry,
    SourceSelector, StaticSource,
};
use splitflap::validation::{ExhaustionPolicy, ToolLoopConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

static XDG_ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Fixed cycle timestamp: Thursday October 16 2025, 9:05 AM UTC.
pub fn cycle_time() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2025, 10, 16, 9, 5, 0)
        .unwrap()
}

pub fn static_entry(id: &str, text: &str, framed: bool) -> SourceEntry {
    SourceEntry::new(
        RegisteredSource::new(id, SourceKind::Programmatic).framed(framed),
        Arc::new(StaticSource::new(text)),
    )
}

pub fn prompt_entry(id: &str) -> SourceEntry {
    SourceEntry::new(
        RegisteredSource::new(id, SourceKind::Generative),
        Arc::new(PromptSource::new(
            "You write for a split-flap display.",
            "Write something for {date}.",
        )),
    )
}

/// Orchestrator with memory display and sink; the selector always picks index 0.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub board: Arc<SwitchBoard>,
    pub display: Arc<MemoryDisplay>,
    pub sink: Arc<MemorySink>,
}

pub fn harness(
    entries: Vec<SourceEntry>,
    preferred: Option<Arc<ScriptedProvider>>,
    alternate: Option<Arc<ScriptedProvider>>,
) -> Harness {
    harness_with_policy(entries, preferred, alternate, ExhaustionPolicy::Raise)
}

/// Like `harness`, with the tool loop's exhaustion policy chosen by the caller.
pub fn harness_with_policy(
    entries: Vec<SourceEntry>,
    preferred: Option<Arc<ScriptedProvider>>,
    alternate: Option<Arc<ScriptedProvider>>,
    exhaustion_policy: ExhaustionPolicy,
) -> Harness {
    let mut registry = SourceRegistry::new();
    for entry in entries {
        registry.register(entry).unwrap();
    }
    let board = Arc::new(SwitchBoard::new());
    let display = Arc::new(MemoryDisplay::new());
    let sink = Arc::new(MemorySink::new());

    let mut coordinator = FailoverCoordinator::new(board.clone()).with_loop_config(ToolLoopConfig {
        max_attempts: 3,
        exhaustion_policy,
        request_timeout: Duration::from_secs(5),
    });
    if let Some(provider) = preferred {
        coordinator = coordinator.with_preferred(ProviderSlot::new("primary", provider));
    }
    if let Some(provider) = alternate {
        coordinator = coordinator.with_alternate(ProviderSlot::new("backup", provider));
    }

    let orchestrator =
        Orchestrator::new(Arc::new(registry), coordinator, board.clone(), display.clone())
            .with_selector(SourceSelector::new().with_random(Arc::new(SequenceRandom::new([0]))))
            .with_persistence(PersistenceWorker::spawn(sink.clone()));

    Harness {
        orchestrator,
        board,
        display,
        sink,
    }
}

/// Run `f` with XDG_CONFIG_HOME and HOME pointed into `test_dir`, restoring them afterwards.
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = XDG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let home = std::env::var_os("HOME");
    let xdg = std::env::var_os("XDG_CONFIG_HOME");

    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_home).unwrap();
    std::env::set_var("HOME", &test_home);
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path());

    let result = f();

    match home {
        Some(v) => std::env::set_var("HOME", v),
        None => std::env::remove_var("HOME"),
    }
    match xdg {
        Some(v) => std::env::set_var("XDG_CONFIG_HOME", v),
        None => std::env::remove_var("XDG_CONFIG_HOME"),
    }
    result
}
