//! CLI route: single route table and run context. Builds the pipeline from configuration
//! and dispatches each command.

use crate::auxiliary::{
    fetch_auxiliary, HttpWeatherProvider, PaletteProvider, StaticPalette, WeatherProvider,
};
use crate::circuit::{CircuitBoard, SwitchBoard};
use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_check_result, format_cycle_outcome, format_rendered, format_sources_table,
};
use crate::config::{ConfigLoader, SplitflapConfig};
use crate::display::{ConsoleDisplay, DisplayClient, HttpDisplayClient, MemoryDisplay};
use crate::error::ApiError;
use crate::failover::{FailoverCoordinator, ProviderSlot};
use crate::frame::{AuxiliaryData, FrameRenderer};
use crate::orchestrator::Orchestrator;
use crate::persistence::{JsonlSink, PersistenceWorker};
use crate::provider::ProviderFactory;
use crate::source::{
    GenerationContext, SeededRandom, SourceRegistry, SourceSelector, TriggerEvent,
};
use crate::validation::{validate_display_text, DisplayLimits, FormatOverrides};
use chrono::{DateTime, FixedOffset, Utc};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded configuration plus the source registry built from it.
pub struct RunContext {
    config: SplitflapConfig,
    registry: Arc<SourceRegistry>,
    color: bool,
}

impl RunContext {
    /// Load configuration (explicit file over global file and defaults) and register sources.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = ConfigLoader::new().load(config_path.as_deref())?;
        Self::from_config(config)
    }

    pub fn from_config(config: SplitflapConfig) -> Result<Self, ApiError> {
        config.ensure_valid()?;
        let mut registry = SourceRegistry::new();
        registry.load_from_config(&config)?;
        let color = config.logging.color && std::io::stdout().is_terminal();
        Ok(Self {
            config,
            registry: Arc::new(registry),
            color,
        })
    }

    pub fn config(&self) -> &SplitflapConfig {
        &self.config
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Execute a command and return its printable output.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Render { text, unframed } => self.handle_render(text, *unframed).await,
            Commands::Check { text, unframed } => {
                let limits = DisplayLimits::for_source(!unframed, &FormatOverrides::default());
                Ok(format_check_result(&validate_display_text(text, limits), limits))
            }
            Commands::Sources => Ok(format_sources_table(&self.registry)),
            Commands::Cycle {
                source,
                minor,
                dry_run,
                event,
                seed,
            } => {
                self.handle_cycle(source.as_deref(), *minor, *dry_run, event.as_deref(), *seed)
                    .await
            }
        }
    }

    async fn handle_render(&self, text: &str, unframed: bool) -> Result<String, ApiError> {
        let renderer = FrameRenderer::new();
        let rendered = if unframed {
            renderer.render_unframed(text)
        } else {
            let weather = self.weather_provider()?;
            let palette = self.palette_provider();
            let aux = fetch_auxiliary(
                &AuxiliaryData::default(),
                weather.as_deref(),
                palette.as_deref(),
                self.config.timeouts.aux(),
            )
            .await;
            renderer.render_framed(text, &aux, &self.timestamp_now()?)
        };
        Ok(format_rendered(&rendered, self.color))
    }

    async fn handle_cycle(
        &self,
        source: Option<&str>,
        minor: bool,
        dry_run: bool,
        event: Option<&str>,
        seed: Option<u64>,
    ) -> Result<String, ApiError> {
        let display: Arc<dyn DisplayClient> = match (&self.config.display.endpoint, dry_run) {
            (_, true) => Arc::new(MemoryDisplay::new()),
            (Some(endpoint), false) => Arc::new(HttpDisplayClient::new(
                endpoint.clone(),
                self.config.display.api_key.clone(),
                self.config.timeouts.request(),
            )?),
            (None, false) => Arc::new(ConsoleDisplay::new(self.color)),
        };
        let orchestrator = self.build_orchestrator(Arc::new(SwitchBoard::new()), display, seed)?;

        let timestamp = self.timestamp_now()?;
        let mut ctx = if minor {
            GenerationContext::minor(timestamp)
        } else {
            GenerationContext::major(timestamp)
        };
        if let Some(event_type) = event {
            ctx = ctx.with_event(TriggerEvent::new(event_type));
        }

        let outcome = match source {
            Some(id) => orchestrator.run_cycle_with_source(ctx, id).await,
            None => orchestrator.run_cycle(ctx).await,
        };
        if let Some(worker) = orchestrator.persistence() {
            worker.flush().await;
        }
        let outcome = outcome?;
        info!(blocked = outcome.is_blocked(), "Cycle finished");
        Ok(format_cycle_outcome(&outcome, dry_run, self.color))
    }

    /// Wire an orchestrator from configuration around the given circuits and display.
    pub fn build_orchestrator(
        &self,
        circuits: Arc<dyn CircuitBoard>,
        display: Arc<dyn DisplayClient>,
        seed: Option<u64>,
    ) -> Result<Orchestrator, ApiError> {
        let mut coordinator =
            FailoverCoordinator::new(Arc::clone(&circuits)).with_loop_config(self.config.tool_loop());
        if let Some(name) = &self.config.failover.preferred {
            coordinator = coordinator.with_preferred(self.provider_slot(name)?);
        }
        if let Some(name) = &self.config.failover.alternate {
            coordinator = coordinator.with_alternate(self.provider_slot(name)?);
        }

        let mut orchestrator =
            Orchestrator::new(Arc::clone(&self.registry), coordinator, circuits, display)
                .with_aux_timeout(self.config.timeouts.aux());
        if let Some(seed) = seed {
            orchestrator = orchestrator
                .with_selector(SourceSelector::new().with_random(Arc::new(SeededRandom::new(seed))));
        }
        if let Some(path) = &self.config.persistence.records_path {
            debug!(path = %path.display(), "Recording generations");
            orchestrator =
                orchestrator.with_persistence(PersistenceWorker::spawn(Arc::new(JsonlSink::new(path))));
        }
        if let Some(weather) = self.weather_provider()? {
            orchestrator = orchestrator.with_weather(weather);
        }
        if let Some(palette) = self.palette_provider() {
            orchestrator = orchestrator.with_palette(palette);
        }
        Ok(orchestrator)
    }

    fn provider_slot(&self, name: &str) -> Result<ProviderSlot, ApiError> {
        let provider = self.config.providers.get(name).ok_or_else(|| {
            ApiError::ProviderNotConfigured(format!("provider '{}' is not defined", name))
        })?;
        let client = ProviderFactory::create_client(name, provider, self.config.timeouts.request())?;
        Ok(ProviderSlot::new(name, client))
    }

    fn weather_provider(&self) -> Result<Option<Arc<dyn WeatherProvider>>, ApiError> {
        match &self.config.frame.weather {
            Some(weather) => Ok(Some(Arc::new(HttpWeatherProvider::new(
                weather.endpoint.clone(),
                self.config.timeouts.aux(),
            )?))),
            None => Ok(None),
        }
    }

    fn palette_provider(&self) -> Option<Arc<dyn PaletteProvider>> {
        self.config.frame.color.as_ref().map(|color| {
            Arc::new(StaticPalette::new(color.palette.clone())) as Arc<dyn PaletteProvider>
        })
    }

    /// Current time in the configured display offset.
    fn timestamp_now(&self) -> Result<DateTime<FixedOffset>, ApiError> {
        let minutes = self.config.frame.utc_offset_minutes;
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ApiError::ConfigError(format!("invalid utc offset: {} minutes", minutes))
            })?;
        Ok(Utc::now().with_timezone(&offset))
    }
}
