//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which resolves a
//! descriptor leniently and reports every problem found instead of
//! stopping at the first.
//!
//! ## Functionality
//!
//! - **Descriptor Validation**: Parses the descriptor and checks its
//!   structure and class declarations.
//! - **Cycle Detection**: Reports circular imports with the import chain.
//! - **Class Validation**: Reports final configuration classes and bean
//!   methods that cannot be overridden.
//!
//! Exits with an error when any problem was found. This command is a safe,
//! read-only operation that does not modify any files.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use confgraph::config;
use confgraph::defaults::DEFAULT_DESCRIPTOR;
use confgraph::output::{ColorChoice, Marker, ReportStyle};

/// Validate a descriptor and report its problems
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the descriptor file to validate.
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "CONFGRAPH_DESCRIPTOR",
        default_value = DEFAULT_DESCRIPTOR
    )]
    pub descriptor: PathBuf,
}

/// Execute the `validate` command.
///
/// # Arguments
/// * `args` - The command arguments
/// * `color` - The global `--color` choice
pub fn execute(args: ValidateArgs, color: ColorChoice) -> Result<()> {
    let style = ReportStyle::for_choice(color);
    let path = &args.descriptor;
    println!(
        "{}",
        style.line(Marker::Scan, format_args!("Validating descriptor: {}", path.display()))
    );

    if let Err(e) = config::from_file(path) {
        println!(
            "{}",
            style.line(Marker::Failed, format_args!("Descriptor parsing failed: {}", e))
        );
        return Err(anyhow::anyhow!("Descriptor validation failed"));
    }
    println!("{}", style.line(Marker::Ok, "Descriptor parsed successfully"));

    let resolution = match super::load_and_resolve(path, true) {
        Ok(resolution) => resolution,
        Err(e) => {
            println!("{}", style.line(Marker::Failed, e));
            return Err(anyhow::anyhow!("Descriptor validation failed"));
        }
    };
    println!(
        "{}",
        style.line(
            Marker::Ok,
            format_args!(
                "Resolved {} configuration classes",
                resolution.model.configuration_classes.len()
            )
        )
    );

    let problems = &resolution.model.problems;
    if problems.is_empty() {
        println!("{}", style.line(Marker::Done, "Descriptor is valid"));
        return Ok(());
    }

    println!(
        "{}",
        style.line(Marker::Failed, format_args!("Found {} problem(s):", problems.len()))
    );
    for problem in problems {
        println!("  - {}", problem);
    }
    Err(anyhow::anyhow!(
        "Descriptor validation failed with {} problem(s)",
        problems.len()
    ))
}
