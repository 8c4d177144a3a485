//! Guaranteed fallback: I/O-free content that cannot fail.

use crate::error::ApiError;
use crate::provider::ModelProviderClient;
use crate::source::{
    ContentMetadata, ContentSource, GeneratedContent, GenerationContext, PriorityClass,
    RegisteredSource, SourceKind,
};
use async_trait::async_trait;
use chrono::{Datelike, Timelike};

/// Registry id used for fallback records.
pub const FALLBACK_SOURCE_ID: &str = "fallback";

/// Every entry fits the framed 5×21 region using only the display alphabet.
const MESSAGES: &[&str] = &[
    "GOOD THINGS TAKE TIME",
    "STAY CURIOUS",
    "ONE DAY AT A TIME",
    "MAKE TODAY COUNT",
    "BREATHE IN\nBREATHE OUT",
    "KEEP IT SIMPLE",
    "SMALL STEPS\nADD UP",
    "BE KIND TODAY",
    "\u{1F7E9} ALL IS WELL \u{1F7E9}",
    "DRINK SOME WATER",
    "LOOK UP AT THE SKY",
    "HELLO FROM THE BOARD",
];

/// Deterministic last-resort source.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackSource;

impl FallbackSource {
    pub fn new() -> Self {
        Self
    }

    /// Registration metadata, should the fallback also be listed in a registry.
    pub fn registration() -> RegisteredSource {
        RegisteredSource::new(FALLBACK_SOURCE_ID, SourceKind::Programmatic)
            .display_name("Fallback")
            .priority(PriorityClass::Fallback)
    }

    /// Content for `ctx`, chosen by day of year and hour.
    pub fn produce(&self, ctx: &GenerationContext) -> GeneratedContent {
        let slot = ctx.timestamp.ordinal() as usize * 24 + ctx.timestamp.hour() as usize;
        let mut metadata = ContentMetadata::default();
        metadata
            .extra
            .insert("fallback".to_string(), serde_json::Value::Bool(true));
        GeneratedContent::text(MESSAGES[slot % MESSAGES.len()]).with_metadata(metadata)
    }
}

#[async_trait]
impl ContentSource for FallbackSource {
    async fn generate(
        &self,
        ctx: &GenerationContext,
        _model: Option<&dyn ModelProviderClient>,
    ) -> Result<GeneratedContent, ApiError> {
        Ok(self.produce(ctx))
    }
}
