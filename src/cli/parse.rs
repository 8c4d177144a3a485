//! CLI parse: clap types for splitflap. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// splitflap - content pipeline for a 6x22 split-flap display
#[derive(Parser, Debug)]
#[command(name = "splitflap")]
#[command(about = "Generate, validate, frame and deliver content to a split-flap display")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render text into a layout and print a preview
    Render {
        text: String,
        /// Use the whole grid instead of the framed content region
        #[arg(long)]
        unframed: bool,
    },
    /// Validate text against the display limits
    Check {
        text: String,
        #[arg(long)]
        unframed: bool,
    },
    /// List configured content sources
    Sources,
    /// Run one update cycle
    Cycle {
        /// Generate from this source instead of selecting one
        #[arg(long)]
        source: Option<String>,
        /// Minor cycle: refresh the frame of cached content
        #[arg(long)]
        minor: bool,
        /// Print the layout instead of sending it to the display
        #[arg(long)]
        dry_run: bool,
        /// Trigger event type for notification sources
        #[arg(long)]
        event: Option<String>,
        /// Seed for source selection
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cycle_flags() {
        let cli = Cli::try_parse_from([
            "splitflap",
            "--log-level",
            "debug",
            "cycle",
            "--source",
            "morning",
            "--dry-run",
            "--seed",
            "7",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Commands::Cycle {
                source,
                minor,
                dry_run,
                event,
                seed,
            } => {
                assert_eq!(source.as_deref(), Some("morning"));
                assert!(!minor);
                assert!(dry_run);
                assert!(event.is_none());
                assert_eq!(seed, Some(7));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_render_requires_text() {
        assert!(Cli::try_parse_from(["splitflap", "render"]).is_err());
        let cli = Cli::try_parse_from(["splitflap", "render", "HELLO", "--unframed"]).unwrap();
        assert!(matches!(cli.command, Commands::Render { unframed: true, .. }));
    }
}
