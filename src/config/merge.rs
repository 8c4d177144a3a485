//! Merge policy for the layered configuration.

pub mod merge_policy;
