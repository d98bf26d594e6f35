//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use confgraph::output::ColorChoice;

/// confgraph - Resolve annotation-driven configuration graphs
#[derive(Parser, Debug)]
#[command(name = "confgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Decorate report markers with emoji
    #[arg(
        long,
        global = true,
        value_name = "WHEN",
        value_enum,
        default_value_t = ColorChoice::Auto
    )]
    color: ColorChoice,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a descriptor and report the configuration model
    Resolve(commands::resolve::ResolveArgs),

    /// Display the import provenance tree of a descriptor
    Tree(commands::tree::TreeArgs),

    /// Resolve leniently and report every problem found
    Validate(commands::validate::ValidateArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        match self.command {
            Commands::Resolve(args) => commands::resolve::execute(args, self.color),
            Commands::Tree(args) => commands::tree::execute(args, self.color),
            Commands::Validate(args) => commands::validate::execute(args, self.color),
        }
    }
}

/// Initialise `env_logger` at `level`; `RUST_LOG` wins when set.
fn init_logging(level: &str) {
    let filter = level
        .parse::<log::LevelFilter>()
        .unwrap_or(log::LevelFilter::Warn);
    let mut builder = env_logger::Builder::new();
    builder.filter_level(filter).format_timestamp(None);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    // a logger may already be installed when embedded in tests
    let _ = builder.try_init();
}
