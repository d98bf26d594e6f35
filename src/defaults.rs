//! Default values for confgraph settings.
//!
//! This module provides centralized default values used by the descriptor
//! schema and the CLI, ensuring consistency and avoiding duplication.

/// Default descriptor file looked up by the CLI.
///
/// This can be overridden by the `--descriptor` CLI flag or the
/// `CONFGRAPH_DESCRIPTOR` environment variable.
pub const DEFAULT_DESCRIPTOR: &str = "confgraph.yaml";

/// Maximum depth of the import stack before resolution aborts.
pub const DEFAULT_MAX_IMPORT_DEPTH: usize = 256;

/// Type-name prefixes of foundational runtime types.
///
/// Superclasses, interfaces and annotations under these prefixes are never
/// walked.
pub fn default_foundational_prefixes() -> Vec<String> {
    vec!["java.".to_string(), "javax.".to_string()]
}

pub fn default_max_import_depth() -> usize {
    DEFAULT_MAX_IMPORT_DEPTH
}

pub fn default_allow_definition_overriding() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foundational_prefixes_end_with_dot() {
        assert!(default_foundational_prefixes()
            .iter()
            .all(|prefix| prefix.ends_with('.')));
    }

    #[test]
    fn test_default_depth_is_positive() {
        assert!(default_max_import_depth() > 0);
    }
}
