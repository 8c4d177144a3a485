//! Retry/Failover Coordinator
//!
//! Drives one generation for the selected source: at most one attempt with the preferred
//! provider and, on a classified upstream failure, exactly one more with a distinct
//! alternate. Anything that survives both routes to the guaranteed fallback, whose output
//! is trusted as-is. Generation never fails from the caller's point of view; every failed
//! attempt is reported alongside the content so it can be recorded.

use crate::circuit::CircuitBoard;
use crate::error::ApiError;
use crate::provider::ModelProviderClient;
use crate::source::{FallbackSource, GeneratedContent, GenerationContext, SourceEntry, SourceKind};
use crate::validation::{ToolLoopConfig, ToolValidationLoop, Validator};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A named upstream provider.
#[derive(Clone)]
pub struct ProviderSlot {
    pub name: String,
    pub client: Arc<dyn ModelProviderClient>,
}

impl ProviderSlot {
    pub fn new(name: impl Into<String>, client: Arc<dyn ModelProviderClient>) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

/// One failed generation attempt.
#[derive(Debug, Clone)]
pub struct FailedAttempt {
    /// Provider used, `None` for programmatic sources
    pub provider: Option<String>,
    pub error: ApiError,
}

/// Result of driving one source through the coordinator.
#[derive(Debug, Clone)]
pub struct Attempted {
    pub content: GeneratedContent,
    /// Content came from the guaranteed fallback
    pub used_fallback: bool,
    pub failures: Vec<FailedAttempt>,
}

/// Two-provider failover with circuit gating and a guaranteed fallback.
pub struct FailoverCoordinator {
    preferred: Option<ProviderSlot>,
    alternate: Option<ProviderSlot>,
    circuits: Arc<dyn CircuitBoard>,
    fallback: FallbackSource,
    loop_config: ToolLoopConfig,
}

impl FailoverCoordinator {
    pub fn new(circuits: Arc<dyn CircuitBoard>) -> Self {
        Self {
            preferred: None,
            alternate: None,
            circuits,
            fallback: FallbackSource::new(),
            loop_config: ToolLoopConfig::default(),
        }
    }

    pub fn with_preferred(mut self, slot: ProviderSlot) -> Self {
        self.preferred = Some(slot);
        self
    }

    pub fn with_alternate(mut self, slot: ProviderSlot) -> Self {
        self.alternate = Some(slot);
        self
    }

    pub fn with_loop_config(mut self, config: ToolLoopConfig) -> Self {
        self.loop_config = config;
        self
    }

    pub fn fallback(&self) -> &FallbackSource {
        &self.fallback
    }

    /// Generate content for `entry`.
    pub async fn generate(&self, entry: &SourceEntry, ctx: &GenerationContext) -> Attempted {
        let mut failures = Vec::new();

        let generated = match entry.meta.kind {
            SourceKind::Programmatic => match entry.source.generate(ctx, None).await {
                Ok(content) => Some(content),
                Err(error) => {
                    warn!(source = %entry.id(), error = %error, "Programmatic source failed");
                    failures.push(FailedAttempt {
                        provider: None,
                        error,
                    });
                    None
                }
            },
            SourceKind::Generative => self.generate_with_failover(entry, ctx, &mut failures).await,
        };

        match generated {
            Some(content) => Attempted {
                content,
                used_fallback: false,
                failures,
            },
            None => {
                info!(source = %entry.id(), failures = failures.len(), "Using fallback content");
                Attempted {
                    content: self.fallback.produce(ctx),
                    used_fallback: true,
                    failures,
                }
            }
        }
    }

    async fn generate_with_failover(
        &self,
        entry: &SourceEntry,
        ctx: &GenerationContext,
        failures: &mut Vec<FailedAttempt>,
    ) -> Option<GeneratedContent> {
        let preferred = match &self.preferred {
            Some(slot) => slot,
            None => {
                failures.push(FailedAttempt {
                    provider: None,
                    error: ApiError::ProviderNotConfigured("no preferred provider".to_string()),
                });
                return None;
            }
        };

        if !self.circuits.is_provider_available(&preferred.name) {
            info!(
                source = %entry.id(),
                provider = %preferred.name,
                "Preferred provider unavailable; skipping generation"
            );
            return None;
        }

        let error = match self.attempt(entry, ctx, preferred).await {
            Ok(content) => return Some(content),
            Err(error) => error,
        };
        let kind = error.failure_kind();
        warn!(
            source = %entry.id(),
            provider = %preferred.name,
            kind = ?kind,
            error = %error,
            "Generation attempt failed"
        );
        failures.push(FailedAttempt {
            provider: Some(preferred.name.clone()),
            error,
        });

        // Only classified upstream failures earn the single retry.
        if kind.is_none() {
            return None;
        }
        let alternate = self.alternate.as_ref().filter(|slot| {
            slot.name != preferred.name && self.circuits.is_provider_available(&slot.name)
        })?;

        info!(
            source = %entry.id(),
            from = %preferred.name,
            to = %alternate.name,
            "Failing over to alternate provider"
        );
        match self.attempt(entry, ctx, alternate).await {
            Ok(mut content) => {
                content.metadata.failover = true;
                Some(content)
            }
            Err(error) => {
                warn!(
                    source = %entry.id(),
                    provider = %alternate.name,
                    error = %error,
                    "Alternate provider failed"
                );
                failures.push(FailedAttempt {
                    provider: Some(alternate.name.clone()),
                    error,
                });
                None
            }
        }
    }

    async fn attempt(
        &self,
        entry: &SourceEntry,
        ctx: &GenerationContext,
        slot: &ProviderSlot,
    ) -> Result<GeneratedContent, ApiError> {
        let limits = entry.meta.limits();
        let source = entry.source.clone();
        let validator: Validator = Arc::new(move |text: &str| source.validate(text, limits));
        let looped = ToolValidationLoop::new(
            slot.client.clone(),
            validator,
            limits,
            self.loop_config.clone(),
        );

        let mut content = entry.source.generate(ctx, Some(&looped)).await?;
        content.metadata.validation_attempts = Some(looped.attempts_used());
        if content.metadata.provider.is_none() {
            content.metadata.provider = Some(slot.name.clone());
        }
        debug!(
            source = %entry.id(),
            provider = %slot.name,
            attempts = looped.attempts_used(),
            "Generation attempt succeeded"
        );
        Ok(content)
    }
}
