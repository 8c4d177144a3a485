//! Property-based tests for layout and validation guarantees

mod layout;
mod validation;
