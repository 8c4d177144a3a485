//! Auxiliary frame data: weather and color palette collaborators.
//!
//! Fetched once per cycle before generation. Each fetch carries its own timeout and any
//! failure becomes `FeatureData::Unavailable`, which the renderer turns into a warning.

use crate::charset::{CharacterCode, Color};
use crate::error::ApiError;
use crate::frame::{AuxiliaryData, FeatureData, WeatherSnapshot};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Current-conditions collaborator.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self) -> Result<WeatherSnapshot, ApiError>;
}

/// Color column collaborator; returns six color codes, top to bottom.
#[async_trait]
pub trait PaletteProvider: Send + Sync {
    async fn palette(&self) -> Result<Vec<CharacterCode>, ApiError>;
}

/// Weather service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// URL returning `{"temperature": 72, "condition": "SUNNY"}`
    pub endpoint: String,
}

/// Fixed color column configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorConfig {
    pub palette: Vec<Color>,
}

/// Fetches weather as JSON over HTTP.
pub struct HttpWeatherProvider {
    client: Client,
    endpoint: String,
}

impl HttpWeatherProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl WeatherProvider for HttpWeatherProvider {
    async fn current(&self) -> Result<WeatherSnapshot, ApiError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| ApiError::ProviderError(format!("weather request failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::ProviderError(format!("weather HTTP {}", status.as_u16())));
        }
        response
            .json::<WeatherSnapshot>()
            .await
            .map_err(|e| ApiError::ProviderError(format!("weather response: {}", e)))
    }
}

/// Fixed weather, for offline runs and tests.
#[derive(Debug, Clone)]
pub struct StaticWeather(pub WeatherSnapshot);

#[async_trait]
impl WeatherProvider for StaticWeather {
    async fn current(&self) -> Result<WeatherSnapshot, ApiError> {
        Ok(self.0.clone())
    }
}

/// Fixed color column.
#[derive(Debug, Clone)]
pub struct StaticPalette {
    colors: Vec<Color>,
}

impl StaticPalette {
    pub fn new(colors: Vec<Color>) -> Self {
        Self { colors }
    }
}

#[async_trait]
impl PaletteProvider for StaticPalette {
    async fn palette(&self) -> Result<Vec<CharacterCode>, ApiError> {
        Ok(self.colors.iter().map(|color| color.code()).collect())
    }
}

async fn fetch_feature<T, F>(feature: &str, timeout: Duration, fetch: F) -> FeatureData<T>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match tokio::time::timeout(timeout, fetch).await {
        Ok(Ok(value)) => FeatureData::Available(value),
        Ok(Err(e)) => {
            warn!(feature, error = %e, "Auxiliary fetch failed");
            FeatureData::Unavailable(e.to_string())
        }
        Err(_) => {
            warn!(feature, timeout_ms = timeout.as_millis() as u64, "Auxiliary fetch timed out");
            FeatureData::Unavailable(format!("timed out after {}ms", timeout.as_millis()))
        }
    }
}

/// Fetch every configured feature concurrently. Unconfigured features stay
/// `NotRequested`; anything already present in `existing` is kept.
pub async fn fetch_auxiliary(
    existing: &AuxiliaryData,
    weather: Option<&dyn WeatherProvider>,
    palette: Option<&dyn PaletteProvider>,
    timeout: Duration,
) -> AuxiliaryData {
    let weather_fetch = async {
        match (weather, existing.weather.is_requested()) {
            (Some(provider), false) => fetch_feature("weather", timeout, provider.current()).await,
            _ => existing.weather.clone(),
        }
    };
    let palette_fetch = async {
        match (palette, existing.palette.is_requested()) {
            (Some(provider), false) => fetch_feature("palette", timeout, provider.palette()).await,
            _ => existing.palette.clone(),
        }
    };
    let (weather, palette) = tokio::join!(weather_fetch, palette_fetch);
    AuxiliaryData { weather, palette }
}
