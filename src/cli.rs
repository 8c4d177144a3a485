//! CLI domain: parse, route, output, and presentation only.
//! Pipeline wiring lives in `RunContext`; formatting lives in `presentation`.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{
    format_check_result, format_cycle_outcome, format_rendered, format_sources_table,
};
pub use route::RunContext;
