//! Splitflap: content delivery pipeline for a 6×22 split-flap display.
//!
//! Each cycle selects one content source, generates text (model-backed sources negotiate
//! through a tool-validation loop with provider failover), renders it into a character-code
//! grid with an optional frame, and delivers the grid to the display. Generation never
//! leaves the display empty: every failure path ends in fallback content.

pub mod auxiliary;
pub mod charset;
pub mod circuit;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod failover;
pub mod frame;
pub mod logging;
pub mod orchestrator;
pub mod persistence;
pub mod provider;
pub mod source;
pub mod validation;

pub use charset::{text_to_layout, Layout};
pub use error::ApiError;
pub use orchestrator::{CycleOutcome, Orchestrator};
