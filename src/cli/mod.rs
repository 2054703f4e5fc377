// CLI module
// Command-line interface and argument parsing

mod args;

pub use args::{CliArgs, StrategyType};

use clap::Parser;

/// Parse command-line arguments (and their environment fallbacks)
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
