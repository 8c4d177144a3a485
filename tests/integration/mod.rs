//! Integration tests for the splitflap content pipeline

mod circuits_and_failover;
mod config_loading;
mod notification_preemption;
mod pipeline_end_to_end;
mod test_utils;

pub use test_utils::*;
