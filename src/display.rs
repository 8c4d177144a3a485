//! Physical display delivery.
//!
//! Delivery is the one pipeline step whose failure is fatal for the cycle.

use crate::charset::{self, Color, Layout};
use crate::error::ApiError;
use async_trait::async_trait;
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Sends a finished grid to the display.
#[async_trait]
pub trait DisplayClient: Send + Sync {
    async fn send_layout(&self, layout: &Layout) -> Result<(), ApiError>;
}

/// Posts the 6×22 code grid as JSON.
pub struct HttpDisplayClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpDisplayClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl DisplayClient for HttpDisplayClient {
    async fn send_layout(&self, layout: &Layout) -> Result<(), ApiError> {
        let mut request = self.client.post(&self.endpoint).json(layout);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::DeliveryFailed(format!("{}: {}", self.endpoint, e)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::DeliveryFailed(format!(
                "{} returned HTTP {}: {}",
                self.endpoint,
                status.as_u16(),
                body
            )));
        }
        debug!(endpoint = %self.endpoint, "Layout delivered");
        Ok(())
    }
}

/// Terminal preview of a grid, one bracketed row per line.
pub fn render_preview(layout: &Layout, color: bool) -> String {
    let mut out = String::new();
    for row in layout.rows() {
        out.push('|');
        for &code in row {
            match Color::from_code(code) {
                Some(c) if color => out.push_str(&paint(c)),
                Some(c) => out.push(c.name().chars().next().unwrap_or('#').to_ascii_uppercase()),
                None => out.push_str(charset::code_to_char(code)),
            }
        }
        out.push_str("|\n");
    }
    out
}

fn paint(color: Color) -> String {
    let block = "\u{2588}";
    match color {
        Color::Red => block.red().to_string(),
        Color::Orange => block.truecolor(255, 140, 0).to_string(),
        Color::Yellow => block.yellow().to_string(),
        Color::Green => block.green().to_string(),
        Color::Blue => block.blue().to_string(),
        Color::Violet => block.magenta().to_string(),
        Color::White => block.white().to_string(),
        Color::Black => block.black().to_string(),
    }
}

/// Prints each grid to stdout instead of a device.
#[derive(Debug, Default)]
pub struct ConsoleDisplay {
    color: bool,
}

impl ConsoleDisplay {
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

#[async_trait]
impl DisplayClient for ConsoleDisplay {
    async fn send_layout(&self, layout: &Layout) -> Result<(), ApiError> {
        info!("Delivering layout to console");
        print!("{}", render_preview(layout, self.color));
        Ok(())
    }
}

/// Keeps delivered grids in memory; can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryDisplay {
    sent: Mutex<Vec<Layout>>,
    failure: Mutex<Option<String>>,
}

impl MemoryDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every delivery with `reason` until cleared with `None`.
    pub fn set_failure(&self, reason: Option<String>) {
        *self.failure.lock() = reason;
    }

    pub fn sent(&self) -> Vec<Layout> {
        self.sent.lock().clone()
    }

    pub fn last(&self) -> Option<Layout> {
        self.sent.lock().last().copied()
    }
}

#[async_trait]
impl DisplayClient for MemoryDisplay {
    async fn send_layout(&self, layout: &Layout) -> Result<(), ApiError> {
        if let Some(reason) = self.failure.lock().clone() {
            return Err(ApiError::DeliveryFailed(reason));
        }
        self.sent.lock().push(*layout);
        Ok(())
    }
}
