//! # CLI Command Implementations
//!
//! Each subcommand of the `confgraph` tool lives in its own file with an
//! `Args` struct derived using `clap` and an `execute` function that calls
//! into the `confgraph` library.
//!
//! All commands are read-only: they load a descriptor, resolve it, and
//! report on the result.

use anyhow::Result;
use std::path::Path;

use confgraph::bootstrap::{self, Resolution};
use confgraph::config::{self, ProblemPolicy};

pub mod resolve;
pub mod tree;
pub mod validate;

/// Loads the descriptor at `path` and resolves it. `lenient` forces
/// problems to be collected instead of aborting the run.
pub(crate) fn load_and_resolve(path: &Path, lenient: bool) -> Result<Resolution> {
    let mut descriptor = config::from_file(path).map_err(|e| {
        anyhow::anyhow!("Failed to load descriptor from {}: {}", path.display(), e)
    })?;
    if lenient {
        descriptor.settings.problem_policy = ProblemPolicy::Lenient;
    }
    bootstrap::resolve(&descriptor, bootstrap::descriptor_dir(path))
        .map_err(|e| anyhow::anyhow!("Resolution failed: {}", e))
}
