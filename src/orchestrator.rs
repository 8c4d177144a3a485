//! Orchestrator
//!
//! Sequences one cycle: circuit gates, auxiliary pre-fetch, selection, generation with
//! failover, rendering, caching, delivery and background persistence. Delivery failures and
//! wiring errors are returned; everything upstream of rendering degrades to the fallback.
//!
//! The only state shared across cycles is the last successful render, kept behind a mutex
//! that is never held across an await. Overlapping cycles overwrite it last-write-wins.

use crate::auxiliary::{fetch_auxiliary, PaletteProvider, WeatherProvider};
use crate::charset::Layout;
use crate::circuit::{Circuit, CircuitBoard};
use crate::error::ApiError;
use crate::failover::{Attempted, FailoverCoordinator};
use crate::display::DisplayClient;
use crate::frame::{FrameRenderer, RenderedFrame};
use crate::persistence::{GenerationRecord, PersistenceWorker, RecordStatus};
use crate::source::{
    GeneratedContent, GenerationContext, OutputMode, Selection, SelectionReason,
    SourceRegistry, SourceSelector, UpdateClass,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Most recent successful render.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRender {
    pub source_id: String,
    pub content: GeneratedContent,
    pub layout: Layout,
    pub framed: bool,
}

/// What a delivered cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub source_id: String,
    /// `None` for minor refreshes of cached content
    pub reason: Option<SelectionReason>,
    pub content: GeneratedContent,
    pub layout: Layout,
    pub warnings: Vec<String>,
    pub used_fallback: bool,
    pub refreshed_only: bool,
}

/// Result of one cycle.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// A circuit was closed; nothing was generated or delivered
    Blocked { circuit: Circuit, reason: String },
    Delivered(CycleReport),
}

impl CycleOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, CycleOutcome::Blocked { .. })
    }
}

/// Per-cycle driver.
pub struct Orchestrator {
    registry: Arc<SourceRegistry>,
    selector: SourceSelector,
    coordinator: FailoverCoordinator,
    renderer: FrameRenderer,
    circuits: Arc<dyn CircuitBoard>,
    display: Arc<dyn DisplayClient>,
    persistence: Option<PersistenceWorker>,
    weather: Option<Arc<dyn WeatherProvider>>,
    palette: Option<Arc<dyn PaletteProvider>>,
    aux_timeout: Duration,
    cache: Mutex<Option<CachedRender>>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        coordinator: FailoverCoordinator,
        circuits: Arc<dyn CircuitBoard>,
        display: Arc<dyn DisplayClient>,
    ) -> Self {
        Self {
            registry,
            selector: SourceSelector::new(),
            coordinator,
            renderer: FrameRenderer::new(),
            circuits,
            display,
            persistence: None,
            weather: None,
            palette: None,
            aux_timeout: Duration::from_secs(5),
            cache: Mutex::new(None),
        }
    }

    pub fn with_selector(mut self, selector: SourceSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_persistence(mut self, worker: PersistenceWorker) -> Self {
        self.persistence = Some(worker);
        self
    }

    pub fn with_weather(mut self, provider: Arc<dyn WeatherProvider>) -> Self {
        self.weather = Some(provider);
        self
    }

    pub fn with_palette(mut self, provider: Arc<dyn PaletteProvider>) -> Self {
        self.palette = Some(provider);
        self
    }

    pub fn with_aux_timeout(mut self, timeout: Duration) -> Self {
        self.aux_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn persistence(&self) -> Option<&PersistenceWorker> {
        self.persistence.as_ref()
    }

    /// Last successful render, if any.
    pub fn cached(&self) -> Option<CachedRender> {
        self.cache.lock().clone()
    }

    pub fn clear_cache(&self) {
        *self.cache.lock() = None;
    }

    /// Run one cycle, selecting the source automatically.
    pub async fn run_cycle(&self, ctx: GenerationContext) -> Result<CycleOutcome, ApiError> {
        if let Some(blocked) = self.check_circuits() {
            return Ok(blocked);
        }
        let ctx = self.prepare_context(ctx).await;

        if ctx.update == UpdateClass::Minor {
            if let Some(cached) = self.cached() {
                return self.refresh_cached(cached, &ctx).await;
            }
            debug!("No cached render; running minor cycle as a full cycle");
        }

        let selection = self.selector.select(&self.registry, &ctx).map_err(|e| {
            error!(error = %e, "Source selection failed");
            e
        })?;
        self.run_selected(selection, &ctx).await
    }

    /// Run one full cycle for an explicitly requested source.
    pub async fn run_cycle_with_source(
        &self,
        ctx: GenerationContext,
        source_id: &str,
    ) -> Result<CycleOutcome, ApiError> {
        if let Some(blocked) = self.check_circuits() {
            return Ok(blocked);
        }
        let ctx = self.prepare_context(ctx).await;
        let selection = self.selector.select_by_id(&self.registry, source_id)?;
        self.run_selected(selection, &ctx).await
    }

    fn check_circuits(&self) -> Option<CycleOutcome> {
        for circuit in [Circuit::Master, Circuit::Sleep] {
            if !self.circuits.is_circuit_open(circuit) {
                info!(circuit = circuit.as_str(), "Cycle blocked");
                return Some(CycleOutcome::Blocked {
                    circuit,
                    reason: circuit.blocked_reason().to_string(),
                });
            }
        }
        None
    }

    async fn prepare_context(&self, mut ctx: GenerationContext) -> GenerationContext {
        ctx.aux = fetch_auxiliary(
            &ctx.aux,
            self.weather.as_deref(),
            self.palette.as_deref(),
            self.aux_timeout,
        )
        .await;
        if ctx.cached.is_none() {
            ctx.cached = self.cached().map(|cached| cached.content);
        }
        ctx
    }

    async fn refresh_cached(
        &self,
        cached: CachedRender,
        ctx: &GenerationContext,
    ) -> Result<CycleOutcome, ApiError> {
        let rendered = if cached.framed && cached.content.mode == OutputMode::Text {
            self.renderer.refresh_frame(&cached.layout, &ctx.aux, &ctx.timestamp)
        } else {
            RenderedFrame {
                layout: cached.layout,
                warnings: Vec::new(),
            }
        };

        self.display.send_layout(&rendered.layout).await.map_err(|e| {
            error!(source = %cached.source_id, error = %e, "Delivery failed");
            e
        })?;
        self.store_cache(CachedRender {
            layout: rendered.layout,
            ..cached.clone()
        });
        debug!(source = %cached.source_id, "Refreshed cached render");

        Ok(CycleOutcome::Delivered(CycleReport {
            source_id: cached.source_id,
            reason: None,
            content: cached.content,
            layout: rendered.layout,
            warnings: rendered.warnings,
            used_fallback: false,
            refreshed_only: true,
        }))
    }

    async fn run_selected(
        &self,
        selection: Selection,
        ctx: &GenerationContext,
    ) -> Result<CycleOutcome, ApiError> {
        let entry = selection.entry;
        let source_id = entry.id().to_string();
        info!(source = %source_id, reason = ?selection.reason, "Starting cycle");

        let attempted = self.coordinator.generate(&entry, ctx).await;
        let framed = attempted.used_fallback || entry.meta.framed;
        let record_id = if attempted.used_fallback {
            crate::source::fallback::FALLBACK_SOURCE_ID
        } else {
            source_id.as_str()
        };

        let rendered = match self.renderer.render_content(
            record_id,
            &attempted.content,
            framed,
            &ctx.aux,
            &ctx.timestamp,
        ) {
            Ok(rendered) => rendered,
            Err(e) => {
                error!(source = %source_id, error = %e, "Rendering failed");
                self.record(&source_id, &attempted, None, Some(&e));
                return Err(e);
            }
        };
        for warning in &rendered.warnings {
            warn!(source = %source_id, warning = %warning, "Render warning");
        }

        // Cached even when delivery fails; the next minor cycle resends it.
        self.store_cache(CachedRender {
            source_id: source_id.clone(),
            content: attempted.content.clone(),
            layout: rendered.layout,
            framed,
        });

        if let Err(e) = self.display.send_layout(&rendered.layout).await {
            error!(source = %source_id, error = %e, "Delivery failed");
            self.record(&source_id, &attempted, Some(&rendered), Some(&e));
            return Err(e);
        }
        self.record(&source_id, &attempted, Some(&rendered), None);

        info!(
            source = %source_id,
            fallback = attempted.used_fallback,
            failover = attempted.content.metadata.failover,
            "Cycle delivered"
        );
        Ok(CycleOutcome::Delivered(CycleReport {
            source_id,
            reason: Some(selection.reason),
            content: attempted.content,
            layout: rendered.layout,
            warnings: rendered.warnings,
            used_fallback: attempted.used_fallback,
            refreshed_only: false,
        }))
    }

    fn store_cache(&self, render: CachedRender) {
        *self.cache.lock() = Some(render);
    }

    /// Queue one record per failed attempt plus the final outcome.
    fn record(
        &self,
        source_id: &str,
        attempted: &Attempted,
        rendered: Option<&RenderedFrame>,
        fatal: Option<&ApiError>,
    ) {
        let Some(worker) = &self.persistence else {
            return;
        };

        for failure in &attempted.failures {
            let mut record = GenerationRecord::new(source_id, RecordStatus::Failed);
            record.provider = failure.provider.clone();
            record.error = Some(failure.error.to_string());
            worker.submit(record);
        }

        let status = match (fatal, attempted.used_fallback) {
            (Some(_), _) => RecordStatus::Failed,
            (None, true) => RecordStatus::Fallback,
            (None, false) => RecordStatus::Success,
        };
        let metadata = &attempted.content.metadata;
        let mut record = GenerationRecord::new(source_id, status);
        record.text = Some(attempted.content.text.clone());
        record.error = fatal.map(|e| e.to_string());
        record.model = metadata.model.clone();
        record.provider = metadata.provider.clone();
        record.failover = metadata.failover;
        record.warnings = rendered.map(|r| r.warnings.clone()).unwrap_or_default();
        worker.submit(record);
    }
}
