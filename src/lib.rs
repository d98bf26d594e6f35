//! # confgraph
//!
//! This library resolves annotation-driven configuration graphs. Starting
//! from a set of root definitions, it walks configuration classes through
//! their imports, member classes, superclasses and interfaces, evaluates
//! conditions, merges declared property sources into an environment, and
//! registers the definitions the classes contribute. It is designed to be
//! used by the `confgraph` command-line tool but can also be embedded.
//!
//! ## Quick Example
//!
//! ```
//! use std::path::Path;
//! use confgraph::bootstrap;
//! use confgraph::config::{self, DescriptorFormat};
//!
//! let descriptor = config::parse(
//!     r#"
//! roots: [com.acme.App]
//! classes:
//!   - name: com.acme.App
//!     annotations:
//!       - type: Configuration
//!       - type: Import
//!         attributes:
//!           value: [com.acme.Child]
//!   - name: com.acme.Child
//!     annotations:
//!       - type: Configuration
//! "#,
//!     DescriptorFormat::Yaml,
//! )
//! .unwrap();
//!
//! let resolution = bootstrap::resolve(&descriptor, Path::new(".")).unwrap();
//! assert_eq!(
//!     resolution.model.class_names(),
//!     vec!["com.acme.Child", "com.acme.App"]
//! );
//! ```
//!
//! ## Core Concepts
//!
//! - **Metadata (`metadata`, `annotations`)**: Structural descriptions of
//!   classes and methods, and the annotation types the resolver understands.
//! - **Environment (`environment`, `profiles`, `placeholder`, `resource`)**:
//!   Profile expressions, ordered property sources with placeholder
//!   resolution, and the loaders that fetch property files.
//! - **Registry (`registry`, `candidate`, `scan`)**: The definition store,
//!   the check deciding which definitions are configuration classes, and
//!   component scanning.
//! - **Plugins (`plugin`, `builtin`)**: Conditions, import selectors and
//!   registrars instantiated by class name.
//! - **Resolution (`resolution`, `loader`)**: The graph walk, deferred
//!   imports, diagnostics, and the fixed-point loop that loads definitions
//!   after each pass.
//! - **Descriptors (`config`, `bootstrap`)**: The YAML, JSON or TOML file
//!   that declares classes, roots, environment and plugins, and the glue
//!   that turns it into a runnable context.
//!
//! ## Execution Flow
//!
//! 1.  **Bootstrap**: Build the metadata provider, environment, resource
//!     loader, plugin factory and registry from a descriptor.
//! 2.  **Candidates**: Pick the registered definitions that qualify as
//!     configuration classes, sorted by their order hint.
//! 3.  **Parse**: Walk each candidate and everything it reaches, settling
//!     deferred imports last.
//! 4.  **Validate**: Report final classes and unoverridable bean methods.
//! 5.  **Load**: Register imported classes, bean methods and registrar
//!     output, then repeat from step 2 with any new candidates.

pub mod annotations;
pub mod bootstrap;
pub mod builtin;
pub mod candidate;
pub mod config;
pub mod defaults;
pub mod environment;
pub mod error;
pub mod loader;
pub mod metadata;
pub mod ordering;
pub mod output;
pub mod placeholder;
pub mod plugin;
pub mod profiles;
pub mod registry;
pub mod resolution;
pub mod resource;
pub mod scan;
